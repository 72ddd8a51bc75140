use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{AnimeRecord, Source};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    /// Free-text preferences; empty text yields top-chart defaults
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct RecommendationItem {
    pub title: String,
    pub genres: Vec<String>,
    pub episodes: Option<u32>,
    pub score: Option<f32>,
    pub source: Source,
    pub url: Option<String>,
}

impl From<&AnimeRecord> for RecommendationItem {
    fn from(record: &AnimeRecord) -> Self {
        Self {
            title: record.title.clone(),
            genres: record.genres.clone(),
            episodes: record.episodes,
            score: record.score,
            source: record.source,
            url: record.url.clone(),
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Recommendation endpoint: free text in, ranked records out
///
/// Always responds 200. Total source failure surfaces as an empty list; the
/// presentation layer owns the "no results" message.
pub async fn recommendations(
    State(state): State<AppState>,
    Query(params): Query<RecommendationQuery>,
) -> Json<Vec<RecommendationItem>> {
    let records = state.recommender.recommend(&params.q).await;
    Json(records.iter().map(RecommendationItem::from).collect())
}

/// Genre names known to the primary source, for client-side genre pickers
pub async fn genres(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    let names = state.primary.genre_names();
    if names.is_empty() {
        return Err(AppError::ExternalApi(
            "Genre table unavailable".to_string(),
        ));
    }
    Ok(Json(names))
}
