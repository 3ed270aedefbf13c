pub mod loader;

pub use loader::{load_books, load_ratings, read_books, read_ratings, LoadOptions};
