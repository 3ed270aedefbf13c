use std::collections::BTreeSet;

use serde::Deserialize;

use crate::models::{
    BookDetails, Isbn, Recommendation, RecommendationSource, RecommendedBook, UserId,
};
use crate::services::candidates::{CandidateGenerator, NoMatchReason, TitleRecommendation};
use crate::services::fallback::DEFAULT_MIN_RATING_COUNT;
use crate::services::snapshot::Snapshot;
use crate::services::title_matcher::TitleMatcher;

const NO_RECOMMENDATIONS: &str = "No recommendations found.";
const FALLBACK_HEADING: &str = "Top Rated Books";

/// What to serve when a title resolves to a book nobody rated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmodeledStrategy {
    /// Fall back to the popularity ranking
    #[default]
    TopRated,
    /// Search catalog titles containing the query first
    SubstringSearch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommenderSettings {
    pub min_rating_count: usize,
    /// Minimum title match confidence, 0-100
    pub match_threshold: f64,
    pub unmodeled_strategy: UnmodeledStrategy,
}

impl Default for RecommenderSettings {
    fn default() -> Self {
        Self {
            min_rating_count: DEFAULT_MIN_RATING_COUNT,
            match_threshold: 70.0,
            unmodeled_strategy: UnmodeledStrategy::default(),
        }
    }
}

/// A single recommendation request
#[derive(Debug, Clone, PartialEq)]
pub enum RecommendationQuery {
    User(UserId),
    /// A user id that could not be parsed
    InvalidUser(String),
    Title(String),
    None,
}

/// Serves recommendation requests over an immutable snapshot
pub struct Recommender {
    snapshot: Snapshot,
    matcher: Box<dyn TitleMatcher>,
    settings: RecommenderSettings,
}

impl Recommender {
    pub fn new(
        snapshot: Snapshot,
        matcher: Box<dyn TitleMatcher>,
        settings: RecommenderSettings,
    ) -> Self {
        Self {
            snapshot,
            matcher,
            settings,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    fn generator(&self) -> CandidateGenerator<'_> {
        CandidateGenerator::new(
            &self.snapshot,
            self.matcher.as_ref(),
            self.settings.match_threshold,
        )
    }

    pub fn recommend_for_user(&self, user_id: UserId, n: usize) -> Vec<Isbn> {
        self.generator().recommend_for_user(user_id, n)
    }

    pub fn recommend_for_book(&self, title: &str, n: usize) -> TitleRecommendation {
        self.generator().recommend_for_book(title, n)
    }

    /// Popularity ranking, using the configured floor unless one is given
    pub fn top_rated(&self, n: usize, min_rating_count: Option<usize>) -> Vec<Isbn> {
        let min_count = min_rating_count.unwrap_or(self.settings.min_rating_count);
        self.snapshot.stats.top_rated(n, min_count)
    }

    /// Runs one request through the user / title / no-query paths
    ///
    /// Every branch ends in a ranked list or the top-rated fallback. A
    /// warning is attached whenever the request fell back, and an empty
    /// result carries the "no recommendations" warning instead.
    pub fn recommend(&self, query: RecommendationQuery, n: usize) -> Recommendation {
        match query {
            RecommendationQuery::User(user_id) => self.recommend_user_path(user_id, n),
            RecommendationQuery::InvalidUser(raw) => {
                tracing::info!(user_id = %raw, "Invalid user id, serving fallback");
                self.fallback(
                    n,
                    Some(format!(
                        "Invalid user ID '{}'. Showing top rated books instead.",
                        raw
                    )),
                )
            }
            RecommendationQuery::Title(title) if title.trim().is_empty() => {
                tracing::info!("Empty title, serving fallback");
                self.fallback(
                    n,
                    Some("Empty title. Showing top rated books instead.".to_string()),
                )
            }
            RecommendationQuery::Title(title) => self.recommend_title_path(title.trim(), n),
            RecommendationQuery::None => self.fallback(n, None),
        }
    }

    fn recommend_user_path(&self, user_id: UserId, n: usize) -> Recommendation {
        if !self.snapshot.user_items.contains_user(user_id) {
            tracing::info!(user_id = %user_id, "Unknown user, serving fallback");
            return self.fallback(
                n,
                Some(format!(
                    "User ID {} not found. Showing top rated books instead.",
                    user_id
                )),
            );
        }

        let isbns = self.recommend_for_user(user_id, n);
        if isbns.is_empty() {
            tracing::info!(user_id = %user_id, "No candidates for user, serving fallback");
            return self.fallback(
                n,
                Some(format!(
                    "No recommendations for user ID {}. Showing top rated books instead.",
                    user_id
                )),
            );
        }

        tracing::info!(user_id = %user_id, count = isbns.len(), "Recommended for user");
        self.finish(
            format!("Top {} Recommendations for User ID {}", n, user_id),
            RecommendationSource::User { user_id },
            None,
            isbns,
        )
    }

    fn recommend_title_path(&self, title: &str, n: usize) -> Recommendation {
        match self.recommend_for_book(title, n) {
            TitleRecommendation::Similar { isbn, candidates } if !candidates.is_empty() => {
                tracing::info!(
                    title = %title,
                    isbn = %isbn,
                    count = candidates.len(),
                    "Recommended similar books"
                );
                let matched_title = self
                    .snapshot
                    .catalog
                    .lookup(isbn.as_str())
                    .map(|b| b.title.clone())
                    .unwrap_or_else(|| title.to_string());
                self.finish(
                    format!("Top {} Books Similar to '{}'", n, title),
                    RecommendationSource::SimilarTo {
                        isbn,
                        title: matched_title,
                    },
                    None,
                    candidates,
                )
            }
            TitleRecommendation::Similar { isbn, .. } => {
                tracing::info!(
                    title = %title,
                    isbn = %isbn,
                    "No other rated books, serving fallback"
                );
                self.fallback(
                    n,
                    Some(format!(
                        "No books similar to '{}'. Showing top rated books instead.",
                        title
                    )),
                )
            }
            TitleRecommendation::NoMatch(NoMatchReason::Unresolved { best_confidence }) => {
                tracing::info!(
                    title = %title,
                    best_confidence = ?best_confidence,
                    "Title not found, serving fallback"
                );
                self.fallback(
                    n,
                    Some(format!(
                        "No book matching '{}' found. Showing top rated books instead.",
                        title
                    )),
                )
            }
            TitleRecommendation::NoMatch(NoMatchReason::Unmodeled { isbn }) => {
                self.recommend_unmodeled(title, &isbn, n)
            }
        }
    }

    fn recommend_unmodeled(&self, title: &str, isbn: &Isbn, n: usize) -> Recommendation {
        tracing::info!(
            title = %title,
            isbn = %isbn,
            strategy = ?self.settings.unmodeled_strategy,
            "Resolved book has no ratings"
        );

        if self.settings.unmodeled_strategy == UnmodeledStrategy::SubstringSearch {
            let found = self.generator().search_by_title(title, isbn, n);
            if !found.is_empty() {
                return self.finish(
                    format!("Books with Titles Like '{}'", title),
                    RecommendationSource::TitleSearch {
                        query: title.to_string(),
                    },
                    Some(format!(
                        "'{}' has no ratings yet. Showing books with similar titles instead.",
                        title
                    )),
                    found,
                );
            }
        }

        self.fallback(
            n,
            Some(format!(
                "'{}' has no ratings yet. Showing top rated books instead.",
                title
            )),
        )
    }

    fn fallback(&self, n: usize, warning: Option<String>) -> Recommendation {
        let isbns = self.top_rated(n, None);
        self.finish(
            FALLBACK_HEADING.to_string(),
            RecommendationSource::TopRated,
            warning,
            isbns,
        )
    }

    fn finish(
        &self,
        heading: String,
        source: RecommendationSource,
        warning: Option<String>,
        isbns: Vec<Isbn>,
    ) -> Recommendation {
        let books = self.render(&isbns);
        let warning = if books.is_empty() {
            tracing::warn!(heading = %heading, "No recommendations to show");
            Some(NO_RECOMMENDATIONS.to_string())
        } else {
            warning
        };

        Recommendation {
            heading,
            source,
            warning,
            books,
        }
    }

    /// Resolves isbns to catalog entries, silently skipping unknown ones
    pub fn render(&self, isbns: &[Isbn]) -> Vec<RecommendedBook> {
        isbns
            .iter()
            .filter_map(|isbn| {
                let Some(book) = self.snapshot.catalog.lookup(isbn.as_str()) else {
                    tracing::debug!(isbn = %isbn, "Recommended book missing from catalog");
                    return None;
                };
                let stats = self.snapshot.stats.get(isbn.as_str());
                Some(RecommendedBook {
                    isbn: isbn.clone(),
                    title: book.title.clone(),
                    author: book.author.clone(),
                    cover_image_url: book.cover_image_url().map(str::to_string),
                    average_rating: stats.map(|s| s.mean),
                    rating_count: stats.map(|s| s.count).unwrap_or(0),
                })
            })
            .collect()
    }

    pub fn book_details(&self, isbn: &str) -> Option<BookDetails> {
        let book = self.snapshot.catalog.lookup(isbn)?;
        let stats = self.snapshot.stats.get(isbn);
        Some(BookDetails {
            book: book.clone(),
            average_rating: stats.map(|s| s.mean),
            rating_count: stats.map(|s| s.count).unwrap_or(0),
            modeled: self.snapshot.similarity.contains(isbn),
        })
    }

    /// Distinct, sorted titles of the most-rated books
    pub fn popular_titles(&self, limit: usize) -> Vec<String> {
        self.snapshot
            .stats
            .most_rated(limit)
            .iter()
            .filter_map(|isbn| self.snapshot.catalog.lookup(isbn.as_str()))
            .map(|book| book.title.trim().to_string())
            .filter(|title| !title.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Book, Rating};
    use crate::services::title_matcher::{ExactMatcher, FuzzyMatcher};

    /// `count` ratings of `value` for `isbn` from users starting at `first_user`
    fn ratings_for(isbn: &str, count: usize, value: f64, first_user: i64) -> Vec<Rating> {
        (0..count)
            .map(|i| Rating::new(first_user + i as i64, isbn, value))
            .collect()
    }

    /// P1 and P2 are popular (>= 20 ratings), R is rare. User 1 co-rates P1 and R.
    fn snapshot() -> Snapshot {
        let mut ratings = ratings_for("P1", 25, 7.0, 100);
        ratings.extend(ratings_for("P2", 20, 9.0, 200));
        ratings.extend(ratings_for("R", 3, 10.0, 300));
        ratings.push(Rating::new(1, "P1", 8.0));
        ratings.push(Rating::new(1, "R", 6.0));
        ratings.push(Rating::new(2, "P2", 0.0));

        let books = vec![
            Book::new("P1", "Moby Dick", "Herman Melville"),
            Book::new("P2", "Dracula", "Bram Stoker"),
            Book::new("R", "The Rare Book", "Someone"),
            Book::new("U", "Dracula's Guest", "Bram Stoker"),
            Book::new("V", "Unrated Volume", "Someone"),
        ];
        Snapshot::build(&ratings, books)
    }

    fn recommender(strategy: UnmodeledStrategy) -> Recommender {
        Recommender::new(
            snapshot(),
            Box::new(FuzzyMatcher),
            RecommenderSettings {
                unmodeled_strategy: strategy,
                ..RecommenderSettings::default()
            },
        )
    }

    fn isbns(recommendation: &Recommendation) -> Vec<&str> {
        recommendation
            .books
            .iter()
            .map(|b| b.isbn.as_str())
            .collect()
    }

    #[test]
    fn test_known_user_gets_personalized_list() {
        let recommendation = recommender(UnmodeledStrategy::TopRated)
            .recommend(RecommendationQuery::User(UserId(1)), 5);

        assert_eq!(
            recommendation.source,
            RecommendationSource::User { user_id: UserId(1) }
        );
        assert!(recommendation.warning.is_none());
        assert_eq!(isbns(&recommendation), vec!["P2"]);
    }

    #[test]
    fn test_unknown_user_falls_back() {
        let recommendation = recommender(UnmodeledStrategy::TopRated)
            .recommend(RecommendationQuery::User(UserId(424242)), 5);

        assert_eq!(recommendation.source, RecommendationSource::TopRated);
        assert!(recommendation.warning.as_ref().unwrap().contains("not found"));
        assert_eq!(isbns(&recommendation), vec!["P2", "P1"]);
    }

    #[test]
    fn test_user_without_seeds_falls_back() {
        let recommendation = recommender(UnmodeledStrategy::TopRated)
            .recommend(RecommendationQuery::User(UserId(2)), 5);

        assert_eq!(recommendation.source, RecommendationSource::TopRated);
        assert!(recommendation.warning.is_some());
    }

    #[test]
    fn test_no_query_serves_top_rated_without_warning() {
        let recommendation =
            recommender(UnmodeledStrategy::TopRated).recommend(RecommendationQuery::None, 5);

        assert_eq!(recommendation.heading, "Top Rated Books");
        assert!(recommendation.warning.is_none());
        assert_eq!(isbns(&recommendation), vec!["P2", "P1"]);
    }

    #[test]
    fn test_unmatched_title_falls_back_to_floor() {
        let service = recommender(UnmodeledStrategy::TopRated);
        let recommendation =
            service.recommend(RecommendationQuery::Title("zzz-nonexistent-book".to_string()), 5);

        assert_eq!(recommendation.source, RecommendationSource::TopRated);
        assert!(recommendation.warning.is_some());
        for book in &recommendation.books {
            assert!(book.rating_count >= 20);
        }
        assert_eq!(isbns(&recommendation), vec!["P2", "P1"]);
    }

    #[test]
    fn test_title_path_ranks_similar_books() {
        let recommendation = recommender(UnmodeledStrategy::TopRated)
            .recommend(RecommendationQuery::Title("the rare book".to_string()), 5);

        assert_eq!(
            recommendation.source,
            RecommendationSource::SimilarTo {
                isbn: Isbn::new("R"),
                title: "The Rare Book".to_string()
            }
        );
        assert_eq!(isbns(&recommendation)[0], "P1");
        assert!(!isbns(&recommendation).contains(&"R"));
    }

    #[test]
    fn test_unmodeled_title_uses_top_rated_by_default() {
        let recommendation = recommender(UnmodeledStrategy::TopRated)
            .recommend(RecommendationQuery::Title("Dracula's Guest".to_string()), 5);

        assert_eq!(recommendation.source, RecommendationSource::TopRated);
        assert!(recommendation.warning.as_ref().unwrap().contains("no ratings"));
    }

    #[test]
    fn test_unmodeled_title_can_search_titles() {
        let recommendation = recommender(UnmodeledStrategy::SubstringSearch)
            .recommend(RecommendationQuery::Title("Dracula's Guest".to_string()), 5);

        // Only the book itself contains the full query; the search comes up empty.
        assert_eq!(recommendation.source, RecommendationSource::TopRated);

        let service = recommender(UnmodeledStrategy::SubstringSearch);
        let found = service.generator().search_by_title("dracula", &Isbn::new("U"), 5);
        assert_eq!(found, vec![Isbn::new("P2")]);
    }

    #[test]
    fn test_substring_search_result_is_labelled() {
        // Two editions share the title; the unrated one comes first in the catalog.
        let snapshot = Snapshot::build(
            &ratings_for("P2", 20, 9.0, 0),
            vec![
                Book::new("U", "Dracula", "Bram Stoker"),
                Book::new("P2", "Dracula", "Bram Stoker"),
                Book::new("W", "Dracula Annotated", "Bram Stoker"),
            ],
        );
        let service = Recommender::new(
            snapshot,
            Box::new(ExactMatcher),
            RecommenderSettings {
                unmodeled_strategy: UnmodeledStrategy::SubstringSearch,
                ..RecommenderSettings::default()
            },
        );

        let recommendation = service.recommend(RecommendationQuery::Title("dracula".to_string()), 5);
        assert_eq!(
            recommendation.source,
            RecommendationSource::TitleSearch {
                query: "dracula".to_string()
            }
        );
        assert_eq!(isbns(&recommendation), vec!["P2", "W"]);
        assert!(recommendation.warning.is_some());
    }

    #[test]
    fn test_blank_title_and_invalid_user_fall_back() {
        let service = recommender(UnmodeledStrategy::TopRated);

        let blank = service.recommend(RecommendationQuery::Title("   ".to_string()), 5);
        assert_eq!(blank.source, RecommendationSource::TopRated);
        assert!(blank.warning.as_ref().unwrap().contains("Empty title"));

        let invalid = service.recommend(RecommendationQuery::InvalidUser("abc".to_string()), 5);
        assert_eq!(invalid.source, RecommendationSource::TopRated);
        assert!(invalid.warning.as_ref().unwrap().contains("abc"));
    }

    #[test]
    fn test_fallback_respects_requested_length_and_floor() {
        let service = recommender(UnmodeledStrategy::TopRated);
        assert_eq!(service.top_rated(5, None).len(), 2);
        assert_eq!(service.top_rated(1, None), vec![Isbn::new("P2")]);
        assert_eq!(service.top_rated(5, Some(1)).len(), 3);
    }

    #[test]
    fn test_empty_result_is_explicit() {
        let service = Recommender::new(
            Snapshot::build(&[], vec![]),
            Box::new(FuzzyMatcher),
            RecommenderSettings::default(),
        );

        let recommendation = service.recommend(RecommendationQuery::None, 5);
        assert!(recommendation.is_empty());
        assert_eq!(recommendation.warning.as_deref(), Some(NO_RECOMMENDATIONS));
    }

    #[test]
    fn test_render_skips_books_missing_from_catalog() {
        let service = recommender(UnmodeledStrategy::TopRated);
        let rendered = service.render(&[Isbn::new("P1"), Isbn::new("missing"), Isbn::new("R")]);

        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0].title, "Moby Dick");
        assert_eq!(rendered[0].rating_count, 26);
        assert_eq!(rendered[1].isbn, Isbn::new("R"));
    }

    #[test]
    fn test_popular_titles_are_distinct_and_sorted() {
        let service = recommender(UnmodeledStrategy::TopRated);
        assert_eq!(
            service.popular_titles(100),
            vec!["Dracula", "Moby Dick", "The Rare Book"]
        );
        assert_eq!(service.popular_titles(1), vec!["Moby Dick"]);
    }

    #[test]
    fn test_book_details() {
        let service = recommender(UnmodeledStrategy::TopRated);

        let details = service.book_details("P2").unwrap();
        assert_eq!(details.rating_count, 21);
        assert!(details.modeled);

        let details = service.book_details("V").unwrap();
        assert_eq!(details.rating_count, 0);
        assert!(!details.modeled);

        assert!(service.book_details("nope").is_none());
    }
}
