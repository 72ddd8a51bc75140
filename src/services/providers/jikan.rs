/// Primary anime metadata source (Jikan-style REST API)
///
/// Three lookup shapes, chosen from the filter:
/// 1. Genre lookup: /anime?genres={id} when descriptors map to the genre
///    table loaded at construction
/// 2. Keyword search: /anime?q={terms} for descriptors with no genre mapping
/// 3. Top chart: /top/anime when the filter is empty
use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{AnimeRecord, Filter, JikanAnime, JikanGenre},
    services::providers::AnimeSource,
};

const GENRE_PAGES: u32 = 2;
const TOP_PAGES: u32 = 2;
/// Courtesy delay between consecutive requests; the public API rate-limits
/// aggressively.
const PAGE_DELAY: Duration = Duration::from_millis(400);

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: Vec<JikanAnime>,
}

#[derive(Debug, Deserialize)]
struct GenreResponse {
    #[serde(default)]
    data: Vec<JikanGenre>,
}

#[derive(Clone)]
pub struct JikanClient {
    http_client: HttpClient,
    api_url: String,
    /// Lower-cased genre name -> source-native genre ID, loaded once at
    /// construction
    genre_table: HashMap<String, u64>,
}

impl JikanClient {
    /// Creates the client and loads the source's genre table
    ///
    /// A failed genre load is not fatal: the table stays empty and every
    /// descriptor falls through to keyword search.
    pub async fn new(api_url: String) -> Self {
        let http_client = HttpClient::new();
        let genre_table = match Self::load_genre_table(&http_client, &api_url).await {
            Ok(table) => {
                tracing::info!(genres = table.len(), "Loaded genre table from primary source");
                table
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load genre table; genre lookups disabled");
                HashMap::new()
            }
        };

        Self {
            http_client,
            api_url,
            genre_table,
        }
    }

    async fn load_genre_table(
        http_client: &HttpClient,
        api_url: &str,
    ) -> AppResult<HashMap<String, u64>> {
        let url = format!("{}/genres/anime", api_url);
        let response = http_client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Primary source returned status {}: {}",
                status, body
            )));
        }

        let genres: GenreResponse = response.json().await?;
        Ok(genres
            .data
            .into_iter()
            .map(|g| (g.name.to_lowercase(), g.mal_id))
            .collect())
    }

    /// Genre names known to the source, sorted for stable presentation
    pub fn genre_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.genre_table.keys().cloned().collect();
        names.sort();
        names
    }

    fn genre_ids_for(&self, filter: &Filter) -> Vec<u64> {
        filter
            .descriptors
            .iter()
            .filter_map(|d| self.genre_table.get(d.as_str()).copied())
            .collect()
    }

    /// Paginated list fetch; stops early when a page comes back empty
    async fn fetch_list(
        &self,
        path: &str,
        params: &[(&str, String)],
        pages: u32,
    ) -> AppResult<Vec<AnimeRecord>> {
        let mut records = Vec::new();
        for page in 1..=pages {
            if page > 1 {
                tokio::time::sleep(PAGE_DELAY).await;
            }

            let url = format!("{}{}", self.api_url, path);
            let response = self
                .http_client
                .get(&url)
                .query(params)
                .query(&[("page", page.to_string())])
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::ExternalApi(format!(
                    "Primary source returned status {}: {}",
                    status, body
                )));
            }

            let parsed: ListResponse = response.json().await?;
            if parsed.data.is_empty() {
                break;
            }
            records.extend(parsed.data.into_iter().map(AnimeRecord::from));
        }
        Ok(records)
    }
}

#[async_trait::async_trait]
impl AnimeSource for JikanClient {
    async fn fetch_by_filter(&self, filter: &Filter) -> AppResult<Vec<AnimeRecord>> {
        let genre_ids = self.genre_ids_for(filter);

        let records = if !genre_ids.is_empty() {
            let mut all = Vec::new();
            for (i, genre_id) in genre_ids.iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(PAGE_DELAY).await;
                }
                all.extend(
                    self.fetch_list("/anime", &[("genres", genre_id.to_string())], GENRE_PAGES)
                        .await?,
                );
            }
            all
        } else if !filter.descriptors.is_empty() {
            self.fetch_list("/anime", &[("q", filter.descriptors.join(" "))], 1)
                .await?
        } else {
            self.fetch_list("/top/anime", &[], TOP_PAGES).await?
        };

        tracing::info!(
            results = records.len(),
            provider = self.name(),
            "Primary fetch completed"
        );

        Ok(records)
    }

    fn name(&self) -> &'static str {
        "jikan"
    }
}
