use serde::{Deserialize, Serialize};

use super::Isbn;

/// A catalog entry describing one book edition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Primary key of the catalog
    pub isbn: Isbn,
    pub title: String,
    pub author: String,
    pub year_of_publication: Option<i32>,
    pub publisher: Option<String>,
    pub image_url_small: Option<String>,
    /// Cover image shown next to a recommendation
    pub image_url_medium: Option<String>,
    pub image_url_large: Option<String>,
}

impl Book {
    /// Creates a book with only the fields needed for display
    pub fn new(isbn: impl AsRef<str>, title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            isbn: Isbn::new(isbn),
            title: title.into(),
            author: author.into(),
            year_of_publication: None,
            publisher: None,
            image_url_small: None,
            image_url_medium: None,
            image_url_large: None,
        }
    }

    pub fn cover_image_url(&self) -> Option<&str> {
        self.image_url_medium.as_deref()
    }
}
