use serde::{Deserialize, Serialize};

pub mod book;
pub mod rating;

pub use book::Book;
pub use rating::{Isbn, Rating, UserId};

/// Which branch of the request state machine produced a recommendation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecommendationSource {
    /// Books similar to what the user rated positively
    User { user_id: UserId },
    /// Books similar to a resolved title
    SimilarTo { isbn: Isbn, title: String },
    /// Catalog titles containing the query, used when the resolved book has no ratings
    TitleSearch { query: String },
    /// Popularity ranking
    TopRated,
}

/// A recommended book resolved to its catalog metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedBook {
    pub isbn: Isbn,
    pub title: String,
    pub author: String,
    pub cover_image_url: Option<String>,
    pub average_rating: Option<f64>,
    pub rating_count: usize,
}

/// Outcome of a single recommendation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub heading: String,
    pub source: RecommendationSource,
    /// Set when the request fell back or produced nothing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub books: Vec<RecommendedBook>,
}

impl Recommendation {
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

/// Catalog entry enriched with its rating statistics
#[derive(Debug, Clone, Serialize)]
pub struct BookDetails {
    #[serde(flatten)]
    pub book: Book,
    pub average_rating: Option<f64>,
    pub rating_count: usize,
    /// Whether the book takes part in the similarity matrix
    pub modeled: bool,
}
