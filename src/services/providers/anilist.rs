/// Fallback anime metadata source (AniList-style GraphQL API)
///
/// One endpoint, one query document. Descriptors that match the source's
/// fixed genre vocabulary become `genre_in` values; the rest are joined into
/// the free-text `search` variable.
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    models::{AniListMedia, AnimeRecord, Filter},
    services::providers::AnimeSource,
};

const PER_PAGE: u32 = 10;

const MEDIA_QUERY: &str = r#"
query ($search: String, $genres: [String], $perPage: Int) {
  Page(perPage: $perPage) {
    media(search: $search, genre_in: $genres, type: ANIME, sort: POPULARITY_DESC) {
      id
      title { romaji }
      genres
      episodes
      averageScore
      siteUrl
    }
  }
}
"#;

/// The fallback source's genre vocabulary is a fixed list, not a lookup
/// endpoint
const FALLBACK_GENRES: &[&str] = &[
    "Action",
    "Adventure",
    "Comedy",
    "Drama",
    "Ecchi",
    "Fantasy",
    "Horror",
    "Mahou Shoujo",
    "Mecha",
    "Music",
    "Mystery",
    "Psychological",
    "Romance",
    "Sci-Fi",
    "Slice of Life",
    "Sports",
    "Supernatural",
    "Thriller",
];

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<PageData>,
}

#[derive(Debug, Deserialize)]
struct PageData {
    #[serde(rename = "Page")]
    page: Page,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    media: Vec<AniListMedia>,
}

#[derive(Clone)]
pub struct AniListClient {
    http_client: HttpClient,
    api_url: String,
}

impl AniListClient {
    pub fn new(api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url,
        }
    }

    /// Splits descriptors into the source's tag vocabulary and a residual
    /// search string
    fn translate_descriptors(filter: &Filter) -> (Vec<String>, Option<String>) {
        let mut genres = Vec::new();
        let mut search_terms = Vec::new();

        for descriptor in &filter.descriptors {
            match FALLBACK_GENRES
                .iter()
                .find(|g| g.eq_ignore_ascii_case(descriptor))
            {
                Some(genre) => genres.push((*genre).to_string()),
                None => search_terms.push(descriptor.clone()),
            }
        }

        let search = if search_terms.is_empty() {
            None
        } else {
            Some(search_terms.join(" "))
        };
        (genres, search)
    }
}

#[async_trait::async_trait]
impl AnimeSource for AniListClient {
    async fn fetch_by_filter(&self, filter: &Filter) -> AppResult<Vec<AnimeRecord>> {
        let (genres, search) = Self::translate_descriptors(filter);

        let variables = json!({
            "search": search,
            "genres": if genres.is_empty() { serde_json::Value::Null } else { json!(genres) },
            "perPage": PER_PAGE,
        });

        let response = self
            .http_client
            .post(&self.api_url)
            .json(&json!({ "query": MEDIA_QUERY, "variables": variables }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Fallback source returned status {}: {}",
                status, body
            )));
        }

        let parsed: GraphQlResponse = response.json().await?;
        let media = parsed
            .data
            .ok_or_else(|| {
                AppError::ExternalApi("Fallback source response missing data".to_string())
            })?
            .page
            .media;

        let records: Vec<AnimeRecord> = media.into_iter().map(AnimeRecord::from).collect();

        tracing::info!(
            results = records.len(),
            provider = self.name(),
            "Fallback fetch completed"
        );

        Ok(records)
    }

    fn name(&self) -> &'static str {
        "anilist"
    }
}
