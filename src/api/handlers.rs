use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::request_id::RequestId;
use crate::models::{BookDetails, Isbn, Recommendation, RecommendedBook, UserId};
use crate::services::{NoMatchReason, RecommendationQuery, TitleRecommendation};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct RecommendationParams {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub n: Option<usize>,
}

impl RecommendationParams {
    /// A user id wins over a title; blank parameters count as absent
    fn query(&self) -> RecommendationQuery {
        let user_id = self
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(raw) = user_id {
            return match raw.parse::<i64>() {
                Ok(id) => RecommendationQuery::User(UserId(id)),
                Err(_) => RecommendationQuery::InvalidUser(raw.to_string()),
            };
        }

        match &self.title {
            Some(title) => RecommendationQuery::Title(title.clone()),
            None => RecommendationQuery::None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CountParams {
    pub n: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TitleParams {
    pub title: String,
    pub n: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TopRatedParams {
    pub n: Option<usize>,
    pub min_ratings: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PopularParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub users: usize,
    pub books: usize,
    pub rated_books: usize,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserRecommendationsResponse {
    pub user_id: UserId,
    pub books: Vec<RecommendedBook>,
}

#[derive(Debug, Serialize)]
pub struct SimilarBooksResponse {
    pub isbn: Isbn,
    pub title: Option<String>,
    pub books: Vec<RecommendedBook>,
}

fn result_count(n: Option<usize>, default: usize) -> AppResult<usize> {
    match n {
        Some(0) => Err(AppError::InvalidInput("n must be at least 1".to_string())),
        Some(n) => Ok(n),
        None => Ok(default),
    }
}

// Handlers

/// Health check endpoint with snapshot sizes
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.recommender.snapshot();
    Json(HealthResponse {
        status: "healthy",
        users: snapshot.user_items.user_count(),
        books: snapshot.catalog.len(),
        rated_books: snapshot.similarity.len(),
        built_at: snapshot.built_at,
    })
}

/// Recommendations by user id or title, falling back to top-rated books
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<RecommendationParams>,
) -> AppResult<Json<Recommendation>> {
    let n = result_count(params.n, state.default_results)?;
    let query = params.query();

    tracing::info!(
        request_id = %request_id,
        query = ?query,
        n,
        "Processing recommendation request"
    );

    let recommendation = state.recommender.recommend(query, n);

    tracing::info!(
        request_id = %request_id,
        source = ?recommendation.source,
        count = recommendation.books.len(),
        fell_back = recommendation.warning.is_some(),
        "Recommendation completed"
    );

    Ok(Json(recommendation))
}

/// Personalized recommendations only; unknown users get an empty list
pub async fn recommend_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<CountParams>,
) -> AppResult<Json<UserRecommendationsResponse>> {
    let n = result_count(params.n, state.default_results)?;
    let user_id = UserId(user_id);

    let isbns = state.recommender.recommend_for_user(user_id, n);
    let books = state.recommender.render(&isbns);

    Ok(Json(UserRecommendationsResponse { user_id, books }))
}

/// Books similar to a title, without falling back
pub async fn recommend_for_book(
    State(state): State<AppState>,
    Query(params): Query<TitleParams>,
) -> AppResult<Json<SimilarBooksResponse>> {
    let n = result_count(params.n, state.default_results)?;

    match state.recommender.recommend_for_book(&params.title, n) {
        TitleRecommendation::Similar { isbn, candidates } => {
            let title = state
                .recommender
                .snapshot()
                .catalog
                .lookup(isbn.as_str())
                .map(|b| b.title.clone());
            let books = state.recommender.render(&candidates);
            Ok(Json(SimilarBooksResponse { isbn, title, books }))
        }
        TitleRecommendation::NoMatch(reason) => {
            let message = match reason {
                NoMatchReason::Unresolved { .. } => {
                    format!("No book matching '{}'", params.title.trim())
                }
                NoMatchReason::Unmodeled { isbn } => {
                    format!("Book {} has no ratings to compare with", isbn)
                }
            };
            Err(AppError::NotFound(message))
        }
    }
}

/// Most popular books by average rating
pub async fn top_rated(
    State(state): State<AppState>,
    Query(params): Query<TopRatedParams>,
) -> AppResult<Json<Vec<RecommendedBook>>> {
    let n = result_count(params.n, state.default_results)?;
    let isbns = state.recommender.top_rated(n, params.min_ratings);
    Ok(Json(state.recommender.render(&isbns)))
}

/// Sorted titles of the most-rated books, for title pickers
pub async fn popular_titles(
    State(state): State<AppState>,
    Query(params): Query<PopularParams>,
) -> Json<Vec<String>> {
    let limit = params.limit.unwrap_or(state.popular_titles_limit);
    Json(state.recommender.popular_titles(limit))
}

/// Look up one book by ISBN
pub async fn get_book(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
) -> AppResult<Json<BookDetails>> {
    state
        .recommender
        .book_details(isbn.trim())
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Book {}", isbn)))
}
