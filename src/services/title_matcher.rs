//! Title matching oracles
//!
//! Free-text titles typed by a user are compared against every catalog title.
//! Matchers only score; accepting or rejecting a match against the configured
//! confidence threshold is left to the caller.

use serde::Deserialize;
use strsim::normalized_levenshtein;

/// Best catalog candidate for a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TitleMatch {
    /// Position of the candidate in the slice handed to the matcher
    pub index: usize,
    /// Match confidence on a 0-100 scale
    pub confidence: f64,
}

/// Trait for title matching strategies
///
/// Both the query and the candidates are already normalized (trimmed and
/// lowercased). Implementations return the single best candidate, preferring
/// the earliest one on equal confidence, or `None` if nothing scores at all.
#[cfg_attr(test, mockall::automock)]
pub trait TitleMatcher: Send + Sync {
    fn best_match(&self, query: &str, candidates: &[String]) -> Option<TitleMatch>;

    /// Matcher name for logging
    fn name(&self) -> &'static str;
}

/// Which matcher the service resolves titles with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleMatching {
    Exact,
    Fuzzy,
}

impl TitleMatching {
    pub fn matcher(self) -> Box<dyn TitleMatcher> {
        match self {
            TitleMatching::Exact => Box::new(ExactMatcher),
            TitleMatching::Fuzzy => Box::new(FuzzyMatcher),
        }
    }
}

/// Accepts only titles equal to the query
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl TitleMatcher for ExactMatcher {
    fn best_match(&self, query: &str, candidates: &[String]) -> Option<TitleMatch> {
        candidates
            .iter()
            .position(|candidate| candidate == query)
            .map(|index| TitleMatch {
                index,
                confidence: 100.0,
            })
    }

    fn name(&self) -> &'static str {
        "exact"
    }
}

/// Scores candidates by normalized Levenshtein similarity
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyMatcher;

impl TitleMatcher for FuzzyMatcher {
    fn best_match(&self, query: &str, candidates: &[String]) -> Option<TitleMatch> {
        let mut best: Option<TitleMatch> = None;

        for (index, candidate) in candidates.iter().enumerate() {
            if candidate == query {
                return Some(TitleMatch {
                    index,
                    confidence: 100.0,
                });
            }

            let confidence = (normalized_levenshtein(query, candidate) * 100.0).round();
            if best.map_or(true, |b| confidence > b.confidence) {
                best = Some(TitleMatch { index, confidence });
            }
        }

        best.filter(|b| b.confidence > 0.0)
    }

    fn name(&self) -> &'static str {
        "fuzzy"
    }
}
