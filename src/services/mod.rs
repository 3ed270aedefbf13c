pub mod candidates;
pub mod catalog;
pub mod fallback;
pub mod matrix;
pub mod recommender;
pub mod snapshot;
pub mod title_matcher;

pub use candidates::{CandidateGenerator, NoMatchReason, TitleRecommendation};
pub use catalog::{BookCatalog, TitleResolution};
pub use fallback::{RatingStats, DEFAULT_MIN_RATING_COUNT};
pub use matrix::{ItemSimilarityMatrix, UserItemMatrix};
pub use recommender::{RecommendationQuery, Recommender, RecommenderSettings, UnmodeledStrategy};
pub use snapshot::Snapshot;
pub use title_matcher::{ExactMatcher, FuzzyMatcher, TitleMatch, TitleMatcher, TitleMatching};
