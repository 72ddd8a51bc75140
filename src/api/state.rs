use std::sync::Arc;

use crate::services::{providers::jikan::JikanClient, recommend::Recommender};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
    /// Kept alongside the recommender for the genre listing endpoint
    pub primary: Arc<JikanClient>,
}

impl AppState {
    pub fn new(recommender: Arc<Recommender>, primary: Arc<JikanClient>) -> Self {
        Self {
            recommender,
            primary,
        }
    }
}
