use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{Isbn, UserId};
use crate::services::catalog::TitleResolution;
use crate::services::snapshot::Snapshot;
use crate::services::title_matcher::TitleMatcher;

/// Why a title query produced no similarity ranking
#[derive(Debug, Clone, PartialEq)]
pub enum NoMatchReason {
    /// No catalog title reached the confidence threshold
    Unresolved { best_confidence: Option<f64> },
    /// The title resolved to a book that nobody rated
    Unmodeled { isbn: Isbn },
}

/// Result of a title query
#[derive(Debug, Clone, PartialEq)]
pub enum TitleRecommendation {
    Similar { isbn: Isbn, candidates: Vec<Isbn> },
    NoMatch(NoMatchReason),
}

/// Item-based candidate generation over a snapshot
pub struct CandidateGenerator<'a> {
    snapshot: &'a Snapshot,
    matcher: &'a dyn TitleMatcher,
    match_threshold: f64,
}

impl<'a> CandidateGenerator<'a> {
    pub fn new(
        snapshot: &'a Snapshot,
        matcher: &'a dyn TitleMatcher,
        match_threshold: f64,
    ) -> Self {
        Self {
            snapshot,
            matcher,
            match_threshold,
        }
    }

    /// Books similar to everything the user rated positively
    ///
    /// Similarities are summed across the seed books, so a book close to
    /// several of them outranks a book close to only one. Seed books are
    /// never recommended back. Unknown users and users without a positive
    /// rating get an empty list.
    pub fn recommend_for_user(&self, user_id: UserId, n: usize) -> Vec<Isbn> {
        let Some(seeds) = self.snapshot.user_items.positively_rated(user_id) else {
            tracing::debug!(user_id = %user_id, "User not in rating matrix");
            return Vec::new();
        };

        if seeds.is_empty() {
            tracing::debug!(user_id = %user_id, "User has no positive ratings");
            return Vec::new();
        }

        let similarity = &self.snapshot.similarity;
        let seed_set: HashSet<usize> = seeds.iter().copied().collect();
        let mut scores = vec![0.0f64; similarity.len()];

        for &seed in &seeds {
            for (candidate, sim) in similarity.row(seed).iter().enumerate() {
                if !seed_set.contains(&candidate) {
                    scores[candidate] += sim;
                }
            }
        }

        tracing::debug!(
            user_id = %user_id,
            seeds = seeds.len(),
            candidates = similarity.len() - seed_set.len(),
            "Scored candidates for user"
        );

        let candidates = scores
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !seed_set.contains(index));

        self.rank(candidates, n)
    }

    /// Books most similar to the one a free-text title resolves to
    pub fn recommend_for_book(&self, title: &str, n: usize) -> TitleRecommendation {
        let catalog = &self.snapshot.catalog;
        let isbn = match catalog.resolve_title(title, self.matcher, self.match_threshold) {
            TitleResolution::Resolved { isbn, .. } => isbn,
            TitleResolution::Unresolved { best_confidence } => {
                let reason = NoMatchReason::Unresolved { best_confidence };
                return TitleRecommendation::NoMatch(reason);
            }
        };

        match self.similar_to(&isbn, n) {
            Some(candidates) => TitleRecommendation::Similar { isbn, candidates },
            None => {
                tracing::debug!(isbn = %isbn, "Resolved book has no ratings");
                TitleRecommendation::NoMatch(NoMatchReason::Unmodeled { isbn })
            }
        }
    }

    /// Books most similar to `isbn`, or `None` when it is not in the similarity matrix
    pub fn similar_to(&self, isbn: &Isbn, n: usize) -> Option<Vec<Isbn>> {
        let similarity = &self.snapshot.similarity;
        let position = similarity.position(isbn.as_str())?;

        let candidates = similarity
            .row(position)
            .iter()
            .copied()
            .enumerate()
            .filter(|(index, _)| *index != position)
            .collect::<Vec<_>>();

        Some(self.rank(candidates.into_iter(), n))
    }

    /// Catalog books whose title contains `query`, best average rating first
    ///
    /// Books without ratings come last; otherwise catalog order is kept.
    pub fn search_by_title(&self, query: &str, exclude: &Isbn, n: usize) -> Vec<Isbn> {
        let stats = &self.snapshot.stats;
        let mut found: Vec<(Isbn, Option<f64>)> = self
            .snapshot
            .catalog
            .search_titles(query)
            .into_iter()
            .filter(|isbn| isbn != exclude)
            .map(|isbn| {
                let mean = stats.mean(isbn.as_str());
                (isbn, mean)
            })
            .collect();

        found.sort_by(|(_, a), (_, b)| match (a, b) {
            (Some(a), Some(b)) => b.total_cmp(a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        found.into_iter().take(n).map(|(isbn, _)| isbn).collect()
    }

    /// Orders candidates by score, then by their own average rating, then by isbn
    fn rank(&self, candidates: impl Iterator<Item = (usize, f64)>, n: usize) -> Vec<Isbn> {
        let similarity = &self.snapshot.similarity;
        let stats = &self.snapshot.stats;

        let mut ranked: Vec<(&Isbn, f64, f64)> = candidates
            .map(|(index, score)| {
                let isbn = similarity.isbn_at(index);
                let mean = stats.mean(isbn.as_str()).unwrap_or(f64::NEG_INFINITY);
                (isbn, score, mean)
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| b.2.total_cmp(&a.2))
                .then_with(|| a.0.cmp(b.0))
        });

        ranked
            .into_iter()
            .take(n)
            .map(|(isbn, _, _)| isbn.clone())
            .collect()
    }
}
