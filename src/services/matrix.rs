use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use ndarray::{Array2, ArrayView1, Axis};

use crate::models::{Isbn, Rating, UserId};

/// Dense users × books rating matrix, 0 standing in for "unrated"
///
/// Rows and columns are sorted by id so that every build over the same
/// snapshot yields the same layout.
#[derive(Debug, Clone)]
pub struct UserItemMatrix {
    users: Vec<UserId>,
    user_index: HashMap<UserId, usize>,
    books: Vec<Isbn>,
    book_index: HashMap<Isbn, usize>,
    values: Array2<f64>,
}

impl UserItemMatrix {
    /// Pivots rating records into the matrix, averaging duplicated (user, book) pairs
    pub fn from_ratings(ratings: &[Rating]) -> Self {
        let valid: Vec<&Rating> = ratings.iter().filter(|r| r.rating.is_finite()).collect();

        let users: Vec<UserId> = valid
            .iter()
            .map(|r| r.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let books: Vec<Isbn> = valid
            .iter()
            .map(|r| r.isbn.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let user_index: HashMap<UserId, usize> =
            users.iter().enumerate().map(|(i, u)| (*u, i)).collect();
        let book_index: HashMap<Isbn, usize> = books
            .iter()
            .enumerate()
            .map(|(i, b)| (b.clone(), i))
            .collect();

        // (sum, count) per rated cell
        let mut cells: HashMap<(usize, usize), (f64, u32)> = HashMap::with_capacity(valid.len());
        for rating in valid {
            let row = user_index[&rating.user_id];
            let col = book_index[&rating.isbn];
            let cell = cells.entry((row, col)).or_insert((0.0, 0));
            cell.0 += rating.rating;
            cell.1 += 1;
        }

        let mut values = Array2::<f64>::zeros((users.len(), books.len()));
        for ((row, col), (sum, count)) in cells {
            values[[row, col]] = sum / f64::from(count);
        }

        Self {
            users,
            user_index,
            books,
            book_index,
            values,
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    /// Column order, shared with the similarity matrix built from this matrix
    pub fn books(&self) -> &[Isbn] {
        &self.books
    }

    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.user_index.contains_key(&user_id)
    }

    /// The user's rating vector across all books
    pub fn user_row(&self, user_id: UserId) -> Option<ArrayView1<'_, f64>> {
        self.user_index
            .get(&user_id)
            .map(|&row| self.values.row(row))
    }

    /// Rating of one (user, book) pair, 0 when the user never rated the book
    pub fn get(&self, user_id: UserId, isbn: &str) -> Option<f64> {
        let row = *self.user_index.get(&user_id)?;
        let col = *self.book_index.get(isbn)?;
        Some(self.values[[row, col]])
    }

    /// Column indices of the books the user rated with a positive score
    pub fn positively_rated(&self, user_id: UserId) -> Option<Vec<usize>> {
        let row = self.user_row(user_id)?;
        Some(
            row.iter()
                .enumerate()
                .filter(|(_, &value)| value > 0.0)
                .map(|(col, _)| col)
                .collect(),
        )
    }

    pub(crate) fn values(&self) -> &Array2<f64> {
        &self.values
    }
}

/// Square books × books cosine similarity matrix
#[derive(Debug, Clone)]
pub struct ItemSimilarityMatrix {
    books: Vec<Isbn>,
    book_index: HashMap<Isbn, usize>,
    values: Array2<f64>,
}

impl ItemSimilarityMatrix {
    /// Cosine similarity between every pair of book columns
    ///
    /// Columns are scaled to unit length and multiplied with their transpose.
    /// A column with no positive signal stays all-zero, so its similarity to
    /// every book (itself included) is 0.
    pub fn from_user_items(user_items: &UserItemMatrix) -> Self {
        let mut normalized = user_items.values().clone();
        for mut column in normalized.axis_iter_mut(Axis(1)) {
            let norm = column.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                column.mapv_inplace(|v| v / norm);
            }
        }

        let mut values = normalized.t().dot(&normalized);

        // The product is symmetric in exact arithmetic only; mirror the upper triangle.
        let size = values.nrows();
        for a in 0..size {
            for b in (a + 1)..size {
                let sim = values[[a, b]].clamp(-1.0, 1.0);
                values[[a, b]] = sim;
                values[[b, a]] = sim;
            }
            values[[a, a]] = values[[a, a]].clamp(-1.0, 1.0);
        }

        let books = user_items.books().to_vec();
        let book_index = books
            .iter()
            .enumerate()
            .map(|(i, b)| (b.clone(), i))
            .collect();

        Self {
            books,
            book_index,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn books(&self) -> &[Isbn] {
        &self.books
    }

    pub fn contains(&self, isbn: &str) -> bool {
        self.book_index.contains_key(isbn)
    }

    pub fn position(&self, isbn: &str) -> Option<usize> {
        self.book_index.get(isbn).copied()
    }

    pub fn isbn_at(&self, index: usize) -> &Isbn {
        &self.books[index]
    }

    /// Similarity row of the book at `index`
    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.row(index)
    }

    pub fn similarity(&self, a: &str, b: &str) -> Option<f64> {
        let a = self.position(a)?;
        let b = self.position(b)?;
        Some(self.values[[a, b]])
    }
}

/// Builds both matrices from a ratings snapshot
///
/// This is a one-time batch cost, quadratic in the number of rated books.
pub fn build(ratings: &[Rating]) -> (UserItemMatrix, ItemSimilarityMatrix) {
    let started = Instant::now();

    let user_items = UserItemMatrix::from_ratings(ratings);
    let similarity = ItemSimilarityMatrix::from_user_items(&user_items);

    tracing::info!(
        ratings = ratings.len(),
        users = user_items.user_count(),
        books = similarity.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Built user-item and item-similarity matrices"
    );

    (user_items, similarity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ratings() -> Vec<Rating> {
        vec![
            Rating::new(1, "A", 5.0),
            Rating::new(1, "B", 5.0),
            Rating::new(2, "A", 3.0),
            Rating::new(2, "C", 8.0),
            Rating::new(3, "B", 2.0),
            Rating::new(3, "C", 4.0),
            Rating::new(3, "D", 0.0),
        ]
    }

    #[test]
    fn test_pivot_fills_unrated_with_zero() {
        let (user_items, _) = build(&sample_ratings());

        assert_eq!(user_items.user_count(), 3);
        assert_eq!(user_items.book_count(), 4);
        assert_eq!(user_items.get(UserId(1), "A"), Some(5.0));
        assert_eq!(user_items.get(UserId(1), "C"), Some(0.0));
        assert_eq!(user_items.get(UserId(9), "A"), None);
        assert_eq!(user_items.get(UserId(1), "Z"), None);
    }

    #[test]
    fn test_duplicate_pairs_are_averaged() {
        let ratings = vec![
            Rating::new(1, "A", 4.0),
            Rating::new(1, "A", 8.0),
            Rating::new(2, "A", 1.0),
        ];
        let matrix = UserItemMatrix::from_ratings(&ratings);
        assert_eq!(matrix.get(UserId(1), "A"), Some(6.0));
        assert_eq!(matrix.get(UserId(2), "A"), Some(1.0));
        assert_eq!(matrix.user_count(), 2);
    }

    #[test]
    fn test_non_finite_ratings_are_dropped() {
        let ratings = vec![Rating::new(1, "A", f64::NAN), Rating::new(2, "B", 3.0)];
        let matrix = UserItemMatrix::from_ratings(&ratings);
        assert_eq!(matrix.user_count(), 1);
        assert_eq!(matrix.books(), &[Isbn::new("B")]);
    }

    #[test]
    fn test_cosine_similarity_value() {
        let ratings = vec![
            Rating::new(1, "A", 5.0),
            Rating::new(1, "B", 5.0),
            Rating::new(2, "A", 3.0),
        ];
        let (_, similarity) = build(&ratings);

        // A = (5, 3), B = (5, 0)
        let expected = 25.0 / (34f64.sqrt() * 5.0);
        let actual = similarity.similarity("A", "B").unwrap();
        assert!((actual - expected).abs() < 1e-12);
        assert!((similarity.similarity("A", "A").unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let (_, similarity) = build(&sample_ratings());

        for a in similarity.books() {
            for b in similarity.books() {
                assert_eq!(
                    similarity.similarity(a.as_str(), b.as_str()),
                    similarity.similarity(b.as_str(), a.as_str())
                );
            }
        }
    }

    #[test]
    fn test_index_set_matches_rated_books() {
        let (_, similarity) = build(&sample_ratings());
        let books: Vec<&str> = similarity.books().iter().map(|b| b.as_str()).collect();
        assert_eq!(books, vec!["A", "B", "C", "D"]);
        assert!(!similarity.contains("E"));
    }

    #[test]
    fn test_zero_column_has_zero_similarity() {
        let (_, similarity) = build(&sample_ratings());
        for other in ["A", "B", "C", "D"] {
            assert_eq!(similarity.similarity("D", other), Some(0.0));
        }
    }

    #[test]
    fn test_empty_ratings_give_empty_matrices() {
        let (user_items, similarity) = build(&[]);
        assert_eq!(user_items.user_count(), 0);
        assert!(similarity.is_empty());
        assert!(!user_items.contains_user(UserId(1)));
        assert!(similarity.position("A").is_none());
    }

    #[test]
    fn test_positively_rated_skips_zero_scores() {
        let (user_items, _) = build(&sample_ratings());
        let seeds = user_items.positively_rated(UserId(3)).unwrap();
        let isbns: Vec<&str> = seeds
            .iter()
            .map(|&i| user_items.books()[i].as_str())
            .collect();
        assert_eq!(isbns, vec!["B", "C"]);
        assert!(user_items.positively_rated(UserId(42)).is_none());
    }
}
