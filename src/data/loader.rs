use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{Book, Isbn, Rating, UserId},
};

/// Options for reading the ratings and books CSV files
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub delimiter: u8,
    /// Ratings above this value, or below zero, are dropped
    pub rating_scale_max: f64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            rating_scale_max: 10.0,
        }
    }
}

/// Raw row of the ratings file
#[derive(Debug, Deserialize)]
struct RatingRow {
    #[serde(rename = "User-ID")]
    user_id: i64,
    #[serde(rename = "ISBN")]
    isbn: String,
    #[serde(rename = "Book-Rating", deserialize_with = "csv::invalid_option")]
    rating: Option<f64>,
}

/// Raw row of the books file
#[derive(Debug, Deserialize)]
struct BookRow {
    #[serde(rename = "ISBN")]
    isbn: String,
    #[serde(rename = "Book-Title", default)]
    title: String,
    #[serde(rename = "Book-Author", default)]
    author: String,
    #[serde(
        rename = "Year-Of-Publication",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    year_of_publication: Option<i32>,
    #[serde(rename = "Publisher", default)]
    publisher: Option<String>,
    #[serde(rename = "Image-URL-S", default)]
    image_url_small: Option<String>,
    #[serde(rename = "Image-URL-M", default)]
    image_url_medium: Option<String>,
    #[serde(rename = "Image-URL-L", default)]
    image_url_large: Option<String>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Book {
            isbn: Isbn::new(&row.isbn),
            title: row.title.trim().to_string(),
            author: row.author.trim().to_string(),
            year_of_publication: row.year_of_publication,
            publisher: non_empty(row.publisher),
            image_url_small: non_empty(row.image_url_small),
            image_url_medium: non_empty(row.image_url_medium),
            image_url_large: non_empty(row.image_url_large),
        }
    }
}

fn csv_reader<R: Read>(reader: R, options: &LoadOptions) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader)
}

/// Counts why rows were dropped while loading
#[derive(Debug, Default)]
struct Dropped {
    malformed: usize,
    missing_rating: usize,
    out_of_scale: usize,
}

/// Reads rating records, dropping unusable rows
///
/// Rows with a missing or unparsable rating, a rating outside
/// `[0, rating_scale_max]`, or an empty ISBN are dropped. Repeated rows are
/// kept; every row counts towards a book's statistics. I/O errors abort the
/// load.
pub fn read_ratings<R: Read>(reader: R, options: &LoadOptions) -> AppResult<Vec<Rating>> {
    let mut reader = csv_reader(reader, options);
    let mut dropped = Dropped::default();
    let mut ratings = Vec::new();

    for result in reader.deserialize::<RatingRow>() {
        let row = match result {
            Ok(row) => row,
            Err(e) if e.is_io_error() => return Err(AppError::from(e)),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed rating row");
                dropped.malformed += 1;
                continue;
            }
        };

        let Some(rating) = row.rating.filter(|r| r.is_finite()) else {
            dropped.missing_rating += 1;
            continue;
        };
        if !(0.0..=options.rating_scale_max).contains(&rating) {
            dropped.out_of_scale += 1;
            continue;
        }

        let isbn = Isbn::new(&row.isbn);
        if isbn.as_str().is_empty() {
            dropped.malformed += 1;
            continue;
        }

        ratings.push(Rating {
            user_id: UserId(row.user_id),
            isbn,
            rating,
        });
    }

    tracing::info!(
        loaded = ratings.len(),
        malformed = dropped.malformed,
        missing_rating = dropped.missing_rating,
        out_of_scale = dropped.out_of_scale,
        "Loaded ratings"
    );

    Ok(ratings)
}

/// Reads book records, skipping rows without an ISBN
pub fn read_books<R: Read>(reader: R, options: &LoadOptions) -> AppResult<Vec<Book>> {
    let mut reader = csv_reader(reader, options);
    let mut books = Vec::new();
    let mut skipped = 0usize;

    for result in reader.deserialize::<BookRow>() {
        match result {
            Ok(row) if !row.isbn.trim().is_empty() => books.push(Book::from(row)),
            Ok(_) => skipped += 1,
            Err(e) if e.is_io_error() => return Err(AppError::from(e)),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed book row");
                skipped += 1;
            }
        }
    }

    tracing::info!(loaded = books.len(), skipped, "Loaded books");

    Ok(books)
}

pub fn load_ratings(path: &Path, options: &LoadOptions) -> AppResult<Vec<Rating>> {
    let file = File::open(path).map_err(|e| {
        AppError::Data(format!(
            "Cannot open ratings file {}: {}",
            path.display(),
            e
        ))
    })?;
    read_ratings(file, options)
}

pub fn load_books(path: &Path, options: &LoadOptions) -> AppResult<Vec<Book>> {
    let file = File::open(path).map_err(|e| {
        AppError::Data(format!(
            "Cannot open books file {}: {}",
            path.display(),
            e
        ))
    })?;
    read_books(file, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RatingStats;

    #[test]
    fn test_read_ratings_drops_unusable_rows() {
        let data = "\
User-ID,ISBN,Book-Rating
276725,034545104X,7
276726,0155061224,
276727,0446520802,abc
276728,0446520802,11
276729,0446520802,-1
276725,034545104X,7
not-a-number,0446520802,5
276730,,5
276731,0521795028,0
";
        let ratings = read_ratings(data.as_bytes(), &LoadOptions::default()).unwrap();

        assert_eq!(
            ratings,
            vec![
                Rating::new(276725, "034545104X", 7.0),
                Rating::new(276725, "034545104X", 7.0),
                Rating::new(276731, "0521795028", 0.0),
            ]
        );
    }

    #[test]
    fn test_read_ratings_keeps_conflicting_duplicates() {
        let data = "User-ID,ISBN,Book-Rating\n1,A,4\n1,A,8\n";
        let ratings = read_ratings(data.as_bytes(), &LoadOptions::default()).unwrap();
        assert_eq!(ratings.len(), 2);
    }

    #[test]
    fn test_repeated_rows_count_towards_the_floor() {
        let mut data = String::from("User-ID,ISBN,Book-Rating\n");
        for user in 0..19 {
            data.push_str(&format!("{},A,8\n", user));
        }
        data.push_str("0,A,8\n");

        let ratings = read_ratings(data.as_bytes(), &LoadOptions::default()).unwrap();
        assert_eq!(ratings.len(), 20);

        let stats = RatingStats::from_ratings(&ratings);
        assert_eq!(stats.count("A"), 20);
        assert_eq!(stats.top_rated(5, 20), vec![Isbn::new("A")]);
    }

    #[test]
    fn test_read_ratings_with_semicolon_delimiter() {
        let data = "User-ID;ISBN;Book-Rating\n1;A;4\n";
        let options = LoadOptions {
            delimiter: b';',
            ..LoadOptions::default()
        };
        let ratings = read_ratings(data.as_bytes(), &options).unwrap();
        assert_eq!(ratings, vec![Rating::new(1, "A", 4.0)]);
    }

    #[test]
    fn test_read_books() {
        let data = "\
ISBN,Book-Title,Book-Author,Year-Of-Publication,Publisher,Image-URL-S,Image-URL-M,Image-URL-L
0195153448,Classical Mythology,Mark P. O. Morford,2002,Oxford University Press,http://s,http://m,http://l
0002005018,Clara Callan,Richard Bruce Wright,unknown,,,,
,No Isbn,Someone,2001,,,,
";
        let books = read_books(data.as_bytes(), &LoadOptions::default()).unwrap();

        assert_eq!(books.len(), 2);
        assert_eq!(books[0].title, "Classical Mythology");
        assert_eq!(books[0].year_of_publication, Some(2002));
        assert_eq!(books[0].cover_image_url(), Some("http://m"));
        assert_eq!(books[1].year_of_publication, None);
        assert_eq!(books[1].publisher, None);
        assert_eq!(books[1].cover_image_url(), None);
    }

    #[test]
    fn test_missing_file_is_a_data_error() {
        let result = load_ratings(Path::new("/nonexistent/ratings.csv"), &LoadOptions::default());
        assert!(matches!(result, Err(AppError::Data(_))));
    }
}
