use std::sync::Arc;

use aniseek_api::{
    api::{create_router, AppState},
    cache::FileStore,
    config::Config,
    services::{
        providers::{anilist::AniListClient, jikan::JikanClient},
        recommend::{Recommender, RecommenderOptions},
    },
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let cache = Arc::new(FileStore::new(&config.cache_dir)?);
    let primary = Arc::new(JikanClient::new(config.jikan_api_url.clone()).await);
    let fallback = Arc::new(AniListClient::new(config.anilist_api_url.clone()));

    let options = RecommenderOptions {
        sparsity_threshold: config.sparsity_threshold,
        top_n: config.top_n,
        cache_ttl_secs: config.cache_ttl_secs,
        hidden_gem_max_score: config.hidden_gem_max_score,
    };
    let recommender = Arc::new(Recommender::new(
        primary.clone(),
        fallback,
        cache,
        options,
    ));

    let state = AppState::new(recommender, primary);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
