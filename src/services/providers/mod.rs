/// Anime metadata source abstraction
///
/// Both the primary REST source and the fallback GraphQL source implement
/// the same filter-driven fetch so the assembler can treat them uniformly.
/// Each client maps its raw response shape into `AnimeRecord` at its own
/// boundary; heterogeneous payloads never travel downstream.
use crate::{
    error::AppResult,
    models::{AnimeRecord, Filter},
};

pub mod anilist;
pub mod jikan;

/// Trait for anime metadata sources
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AnimeSource: Send + Sync {
    /// Fetch records matching the filter
    ///
    /// An empty filter means "no constraints" and should return the source's
    /// top-ranked defaults. Errors are non-fatal to the pipeline; the
    /// assembler degrades to whatever the other source produced.
    async fn fetch_by_filter(&self, filter: &Filter) -> AppResult<Vec<AnimeRecord>>;

    /// Source name for logging and the source-of-origin tag
    fn name(&self) -> &'static str;
}
