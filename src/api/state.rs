use std::sync::Arc;

use crate::config::Config;
use crate::services::Recommender;

/// Shared application state
///
/// The recommender is built before the server starts and never mutated, so
/// handlers share it without locking.
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
    /// Result count used when a request does not give `n`
    pub default_results: usize,
    pub popular_titles_limit: usize,
}

impl AppState {
    pub fn new(recommender: Recommender) -> Self {
        Self {
            recommender: Arc::new(recommender),
            default_results: 5,
            popular_titles_limit: 100,
        }
    }

    pub fn from_config(recommender: Recommender, config: &Config) -> Self {
        Self {
            default_results: config.default_results,
            popular_titles_limit: config.popular_titles_limit,
            ..Self::new(recommender)
        }
    }
}
