use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Lower-cases and collapses whitespace. Used both for cache signatures and
/// for title identity during cross-source dedupe.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Identifier for a record, native to the source that produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordId {
    /// MyAnimeList ID as reported by the primary source
    Mal(u64),
    /// AniList media ID from the fallback source
    Anilist(u64),
}

impl Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Mal(id) => write!(f, "mal:{}", id),
            RecordId::Anilist(id) => write!(f, "anilist:{}", id),
        }
    }
}

/// Which source a record came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Primary,
    Fallback,
}

/// A single anime title as returned to the client
///
/// Scores are on a 0-10 scale regardless of origin; the fallback source's
/// 0-100 scale is converted at the adapter boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnimeRecord {
    pub id: RecordId,
    pub title: String,
    pub genres: Vec<String>,
    pub episodes: Option<u32>,
    pub score: Option<f32>,
    pub url: Option<String>,
    pub source: Source,
}

impl AnimeRecord {
    /// Case- and whitespace-insensitive identity key for dedupe
    pub fn normalized_title(&self) -> String {
        normalize_text(&self.title)
    }
}

/// Structured constraints derived from free text
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    /// Descriptor tokens in first-seen order, multi-word phrases included
    pub descriptors: Vec<String>,
    /// Inclusive upper bound on episode count
    pub episode_bound: Option<u32>,
    /// Bias toward low-score, under-the-radar titles
    pub hidden_gem: bool,
}

impl Filter {
    /// True when the filter imposes no constraints at all
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty() && self.episode_bound.is_none() && !self.hidden_gem
    }
}

/// A per-query snapshot persisted by the cache store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub cached_at: DateTime<Utc>,
    pub filter: Filter,
    pub records: Vec<AnimeRecord>,
}

impl CacheEntry {
    pub fn new(filter: Filter, records: Vec<AnimeRecord>) -> Self {
        Self {
            cached_at: Utc::now(),
            filter,
            records,
        }
    }

    /// Whether the entry may be served without a network fetch
    pub fn is_fresh(&self, ttl_secs: u64) -> bool {
        Utc::now().signed_duration_since(self.cached_at) <= chrono::Duration::seconds(ttl_secs as i64)
    }
}

// ============================================================================
// Primary Source (Jikan-style REST) API Types
// ============================================================================

/// Genre descriptor from the primary source's genre listing
#[derive(Debug, Clone, Deserialize)]
pub struct JikanGenre {
    pub mal_id: u64,
    pub name: String,
}

/// Raw anime payload from the primary source
#[derive(Debug, Clone, Deserialize)]
pub struct JikanAnime {
    pub mal_id: u64,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub genres: Vec<JikanGenre>,
}

impl From<JikanAnime> for AnimeRecord {
    fn from(anime: JikanAnime) -> Self {
        AnimeRecord {
            id: RecordId::Mal(anime.mal_id),
            title: anime.title,
            genres: anime.genres.into_iter().map(|g| g.name).collect(),
            episodes: anime.episodes,
            score: anime.score,
            url: anime.url,
            source: Source::Primary,
        }
    }
}

// ============================================================================
// Fallback Source (AniList-style GraphQL) API Types
// ============================================================================

/// Raw media payload from the fallback source's graph query interface
#[derive(Debug, Clone, Deserialize)]
pub struct AniListMedia {
    pub id: u64,
    pub title: AniListTitle,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub episodes: Option<u32>,
    /// 0-100 scale, converted to 0-10 in the adapter
    #[serde(rename = "averageScore", default)]
    pub average_score: Option<u32>,
    #[serde(rename = "siteUrl", default)]
    pub site_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AniListTitle {
    pub romaji: String,
}

impl From<AniListMedia> for AnimeRecord {
    fn from(media: AniListMedia) -> Self {
        AnimeRecord {
            id: RecordId::Anilist(media.id),
            title: media.title.romaji,
            genres: media.genres,
            episodes: media.episodes,
            score: media.average_score.map(|s| s as f32 / 10.0),
            url: media.site_url,
            source: Source::Fallback,
        }
    }
}
