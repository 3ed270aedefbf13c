use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Recommendations
        .route("/recommendations", get(handlers::recommend))
        .route(
            "/recommendations/users/:user_id",
            get(handlers::recommend_for_user),
        )
        .route("/recommendations/books", get(handlers::recommend_for_book))
        .route("/recommendations/top-rated", get(handlers::top_rated))
        // Catalog
        .route("/books/popular", get(handlers::popular_titles))
        .route("/books/:isbn", get(handlers::get_book))
}
