use std::collections::HashMap;

use crate::models::{Book, Isbn};
use crate::services::title_matcher::TitleMatcher;

/// Normalizes a title for comparison: trimmed and lowercased
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Outcome of resolving free text to a single catalog entry
#[derive(Debug, Clone, PartialEq)]
pub enum TitleResolution {
    Resolved {
        isbn: Isbn,
        confidence: f64,
    },
    /// No candidate reached the threshold; carries the best score seen, if any
    Unresolved {
        best_confidence: Option<f64>,
    },
}

/// In-memory book catalog keyed by ISBN
#[derive(Debug, Clone, Default)]
pub struct BookCatalog {
    books: Vec<Book>,
    index: HashMap<Isbn, usize>,
    normalized_titles: Vec<String>,
}

impl BookCatalog {
    /// Builds the catalog, keeping the first record of any repeated ISBN
    pub fn new(books: Vec<Book>) -> Self {
        let mut catalog = Self::default();
        let mut duplicates = 0usize;

        for book in books {
            if catalog.index.contains_key(&book.isbn) {
                duplicates += 1;
                continue;
            }
            catalog.index.insert(book.isbn.clone(), catalog.books.len());
            catalog.normalized_titles.push(normalize_title(&book.title));
            catalog.books.push(book);
        }

        if duplicates > 0 {
            tracing::warn!(duplicates, "Dropped books with a repeated ISBN");
        }

        catalog
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn lookup(&self, isbn: &str) -> Option<&Book> {
        self.index.get(isbn).map(|&i| &self.books[i])
    }

    /// Resolves a user-typed title to one ISBN
    ///
    /// The best candidate is accepted only when its confidence reaches
    /// `threshold`. Several editions can share a title; the first one in
    /// catalog order wins.
    pub fn resolve_title(
        &self,
        title: &str,
        matcher: &dyn TitleMatcher,
        threshold: f64,
    ) -> TitleResolution {
        let query = normalize_title(title);
        if query.is_empty() {
            return TitleResolution::Unresolved {
                best_confidence: None,
            };
        }

        match matcher.best_match(&query, &self.normalized_titles) {
            Some(found) if found.confidence >= threshold => {
                let Some(book) = self.books.get(found.index) else {
                    tracing::warn!(
                        matcher = matcher.name(),
                        index = found.index,
                        "Title matcher returned an out-of-range candidate"
                    );
                    return TitleResolution::Unresolved {
                        best_confidence: Some(found.confidence),
                    };
                };

                tracing::debug!(
                    query = %query,
                    matched = %book.title,
                    isbn = %book.isbn,
                    confidence = found.confidence,
                    matcher = matcher.name(),
                    "Resolved title"
                );

                TitleResolution::Resolved {
                    isbn: book.isbn.clone(),
                    confidence: found.confidence,
                }
            }
            other => {
                tracing::debug!(
                    query = %query,
                    best_confidence = ?other.map(|m| m.confidence),
                    threshold,
                    matcher = matcher.name(),
                    "Title did not resolve"
                );
                TitleResolution::Unresolved {
                    best_confidence: other.map(|m| m.confidence),
                }
            }
        }
    }

    /// ISBNs whose normalized title contains the normalized query, in catalog order
    pub fn search_titles(&self, query: &str) -> Vec<Isbn> {
        let query = normalize_title(query);
        if query.is_empty() {
            return Vec::new();
        }

        self.normalized_titles
            .iter()
            .zip(&self.books)
            .filter(|(title, _)| title.contains(&query))
            .map(|(_, book)| book.isbn.clone())
            .collect()
    }
}
