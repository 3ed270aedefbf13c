use std::collections::HashMap;

use crate::models::{Isbn, Rating};

/// Default floor on the number of ratings a book needs to be ranked by popularity
pub const DEFAULT_MIN_RATING_COUNT: usize = 20;

/// Mean and count of the raw ratings of one book
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookStats {
    pub mean: f64,
    pub count: usize,
}

/// Per-book rating statistics over the raw rating records
///
/// Also used as the tie-breaker of the candidate ranking.
#[derive(Debug, Clone, Default)]
pub struct RatingStats {
    stats: HashMap<Isbn, BookStats>,
}

impl RatingStats {
    pub fn from_ratings(ratings: &[Rating]) -> Self {
        let mut totals: HashMap<Isbn, (f64, usize)> = HashMap::new();
        for rating in ratings.iter().filter(|r| r.rating.is_finite()) {
            let entry = totals.entry(rating.isbn.clone()).or_insert((0.0, 0));
            entry.0 += rating.rating;
            entry.1 += 1;
        }

        let stats = totals
            .into_iter()
            .map(|(isbn, (sum, count))| {
                (
                    isbn,
                    BookStats {
                        mean: sum / count as f64,
                        count,
                    },
                )
            })
            .collect();

        Self { stats }
    }

    pub fn get(&self, isbn: &str) -> Option<BookStats> {
        self.stats.get(isbn).copied()
    }

    pub fn mean(&self, isbn: &str) -> Option<f64> {
        self.get(isbn).map(|s| s.mean)
    }

    pub fn count(&self, isbn: &str) -> usize {
        self.get(isbn).map(|s| s.count).unwrap_or(0)
    }

    /// Books with at least `min_count` ratings, best mean first
    ///
    /// Ties on the mean go to the more-rated book, then to the lower isbn.
    /// Returns an empty list when no book meets the floor.
    pub fn top_rated(&self, n: usize, min_count: usize) -> Vec<Isbn> {
        let mut eligible: Vec<(&Isbn, &BookStats)> = self
            .stats
            .iter()
            .filter(|(_, stats)| stats.count >= min_count)
            .collect();

        eligible.sort_by(|(a_isbn, a), (b_isbn, b)| {
            b.mean
                .total_cmp(&a.mean)
                .then_with(|| b.count.cmp(&a.count))
                .then_with(|| a_isbn.cmp(b_isbn))
        });

        tracing::debug!(
            eligible = eligible.len(),
            min_count,
            requested = n,
            "Ranked top-rated books"
        );

        eligible
            .into_iter()
            .take(n)
            .map(|(isbn, _)| isbn.clone())
            .collect()
    }

    /// Books ordered by number of ratings, most-rated first
    pub fn most_rated(&self, limit: usize) -> Vec<Isbn> {
        let mut books: Vec<(&Isbn, usize)> =
            self.stats.iter().map(|(isbn, s)| (isbn, s.count)).collect();
        books.sort_by(|(a_isbn, a), (b_isbn, b)| b.cmp(a).then_with(|| a_isbn.cmp(b_isbn)));
        books
            .into_iter()
            .take(limit)
            .map(|(isbn, _)| isbn.clone())
            .collect()
    }
}
