use chrono::{DateTime, Utc};

use crate::models::{Book, Rating};
use crate::services::catalog::BookCatalog;
use crate::services::fallback::RatingStats;
use crate::services::matrix::{self, ItemSimilarityMatrix, UserItemMatrix};

/// Everything derived from one ratings/books snapshot
///
/// Built once before the service accepts requests and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub user_items: UserItemMatrix,
    pub similarity: ItemSimilarityMatrix,
    pub stats: RatingStats,
    pub catalog: BookCatalog,
    pub built_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn build(ratings: &[Rating], books: Vec<Book>) -> Self {
        let (user_items, similarity) = matrix::build(ratings);
        let stats = RatingStats::from_ratings(ratings);
        let catalog = BookCatalog::new(books);
        if catalog.is_empty() {
            tracing::warn!("Book catalog is empty; recommendations will have nothing to show");
        }

        let unmodeled = catalog.len().saturating_sub(
            similarity
                .books()
                .iter()
                .filter(|isbn| catalog.lookup(isbn.as_str()).is_some())
                .count(),
        );
        tracing::info!(
            books = catalog.len(),
            rated_books = similarity.len(),
            unmodeled_books = unmodeled,
            "Snapshot ready"
        );

        Self {
            user_items,
            similarity,
            stats,
            catalog,
            built_at: Utc::now(),
        }
    }
}
