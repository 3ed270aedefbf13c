use anyhow::Context;
use tracing_subscriber::EnvFilter;

use bookrec_api::api::{create_router, AppState};
use bookrec_api::config::Config;
use bookrec_api::data;
use bookrec_api::services::{Recommender, Snapshot};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bookrec_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let options = config.load_options();

    // The snapshot is built before the listener binds; no request sees a partial build.
    let ratings = data::load_ratings(&config.ratings_path, &options)
        .with_context(|| format!("loading ratings from {}", config.ratings_path.display()))?;
    let books = data::load_books(&config.books_path, &options)
        .with_context(|| format!("loading books from {}", config.books_path.display()))?;

    let snapshot = tokio::task::spawn_blocking(move || Snapshot::build(&ratings, books))
        .await
        .context("building recommendation snapshot")?;

    let recommender = Recommender::new(
        snapshot,
        config.title_matching.matcher(),
        config.recommender_settings(),
    );
    let app = create_router(AppState::from_config(recommender, &config));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {}", address))?;

    tracing::info!(
        address = %address,
        title_matching = ?config.title_matching,
        unmodeled_strategy = ?config.unmodeled_strategy,
        "Server running"
    );
    axum::serve(listener, app).await?;

    Ok(())
}
