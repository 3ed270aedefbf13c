use serde::Deserialize;
use std::path::PathBuf;

use crate::data::LoadOptions;
use crate::services::{RecommenderSettings, TitleMatching, UnmodeledStrategy};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// CSV file with `User-ID`, `ISBN`, `Book-Rating` columns
    #[serde(default = "default_ratings_path")]
    pub ratings_path: PathBuf,

    /// CSV file with the book catalog
    #[serde(default = "default_books_path")]
    pub books_path: PathBuf,

    /// Field delimiter of both CSV files
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: String,

    /// Highest valid rating; anything above it is dropped at load time
    #[serde(default = "default_rating_scale_max")]
    pub rating_scale_max: f64,

    /// Number of books returned when a request does not say
    #[serde(default = "default_results")]
    pub default_results: usize,

    /// Ratings a book needs before it can appear in the top-rated fallback
    #[serde(default = "default_min_rating_count")]
    pub min_rating_count: usize,

    /// Title match confidence (0-100) needed to accept a title
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    #[serde(default = "default_title_matching")]
    pub title_matching: TitleMatching,

    #[serde(default)]
    pub unmodeled_strategy: UnmodeledStrategy,

    /// Size of the popular-titles list
    #[serde(default = "default_popular_titles_limit")]
    pub popular_titles_limit: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_ratings_path() -> PathBuf {
    PathBuf::from("data/ratings.csv")
}

fn default_books_path() -> PathBuf {
    PathBuf::from("data/books.csv")
}

fn default_csv_delimiter() -> String {
    ",".to_string()
}

fn default_rating_scale_max() -> f64 {
    10.0
}

fn default_results() -> usize {
    5
}

fn default_min_rating_count() -> usize {
    20
}

fn default_match_threshold() -> f64 {
    70.0
}

fn default_title_matching() -> TitleMatching {
    TitleMatching::Fuzzy
}

fn default_popular_titles_limit() -> usize {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ratings_path: default_ratings_path(),
            books_path: default_books_path(),
            csv_delimiter: default_csv_delimiter(),
            rating_scale_max: default_rating_scale_max(),
            default_results: default_results(),
            min_rating_count: default_min_rating_count(),
            match_threshold: default_match_threshold(),
            title_matching: default_title_matching(),
            unmodeled_strategy: UnmodeledStrategy::default(),
            popular_titles_limit: default_popular_titles_limit(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.csv_delimiter.len() != 1 || !self.csv_delimiter.is_ascii() {
            anyhow::bail!("CSV_DELIMITER must be a single ASCII character");
        }
        if !(0.0..=100.0).contains(&self.match_threshold) {
            anyhow::bail!("MATCH_THRESHOLD must be between 0 and 100");
        }
        if self.default_results == 0 {
            anyhow::bail!("DEFAULT_RESULTS must be at least 1");
        }
        Ok(())
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            delimiter: self.csv_delimiter.bytes().next().unwrap_or(b','),
            rating_scale_max: self.rating_scale_max,
        }
    }

    pub fn recommender_settings(&self) -> RecommenderSettings {
        RecommenderSettings {
            min_rating_count: self.min_rating_count,
            match_threshold: self.match_threshold,
            unmodeled_strategy: self.unmodeled_strategy,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string()));
        envy::from_iter::<_, Config>(vars).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.default_results, 5);
        assert_eq!(config.min_rating_count, 20);
        assert_eq!(config.match_threshold, 70.0);
        assert_eq!(config.title_matching, TitleMatching::Fuzzy);
        assert_eq!(config.unmodeled_strategy, UnmodeledStrategy::TopRated);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("CSV_DELIMITER", ";"),
            ("TITLE_MATCHING", "exact"),
            ("UNMODELED_STRATEGY", "substring_search"),
            ("MIN_RATING_COUNT", "50"),
        ]);
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.load_options().delimiter, b';');
        assert_eq!(config.title_matching, TitleMatching::Exact);
        assert_eq!(
            config.recommender_settings().unmodeled_strategy,
            UnmodeledStrategy::SubstringSearch
        );
        assert_eq!(config.recommender_settings().min_rating_count, 50);
    }

    #[test]
    fn test_threshold_out_of_range_is_rejected() {
        let config = Config {
            match_threshold: 150.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
