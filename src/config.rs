use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Primary anime metadata source base URL
    #[serde(default = "default_jikan_api_url")]
    pub jikan_api_url: String,

    /// Fallback anime metadata source GraphQL endpoint
    #[serde(default = "default_anilist_api_url")]
    pub anilist_api_url: String,

    /// Root directory for per-query cache snapshots
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Freshness window for cached entries, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Primary result count below which the fallback source is consulted
    #[serde(default = "default_sparsity_threshold")]
    pub sparsity_threshold: usize,

    /// Maximum number of records returned per request
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Records at or above this score are excluded from hidden-gem requests
    #[serde(default = "default_hidden_gem_max_score")]
    pub hidden_gem_max_score: f32,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_jikan_api_url() -> String {
    "https://api.jikan.moe/v4".to_string()
}

fn default_anilist_api_url() -> String {
    "https://graphql.anilist.co".to_string()
}

fn default_cache_dir() -> String {
    "data/cache".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    86400
}

fn default_sparsity_threshold() -> usize {
    5
}

fn default_top_n() -> usize {
    10
}

fn default_hidden_gem_max_score() -> f32 {
    7.0
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}
