//! TMDB API client.
//!
//! Only used in split mode, to decide whether a resolved title is anime and
//! belongs under the anime destination roots.

use crate::models::media::{ExternalId, MediaKind};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// TMDB genre id for Animation.
const ANIMATION_GENRE_ID: u64 = 16;

/// Decides whether a title routes to the anime roots.
#[async_trait]
pub trait AnimeClassifier: Send + Sync {
    async fn is_anime(&self, kind: MediaKind, id: &ExternalId) -> Result<bool>;
}

/// TMDB client configuration.
#[derive(Debug, Clone)]
pub struct TmdbConfig {
    /// API key or Bearer token (JWT)
    pub api_key: String,
    /// Whether to use Bearer token authentication (API v4 style)
    pub use_bearer: bool,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl TmdbConfig {
    /// Create config from an API key.
    /// Supports both API key (v3) and Bearer token (v4) formats.
    pub fn new(api_key: &str, timeout_secs: u64) -> Self {
        // Bearer tokens start with "eyJ" (base64 encoded JWT header)
        let use_bearer = api_key.starts_with("eyJ");
        Self {
            api_key: api_key.to_string(),
            use_bearer,
            timeout_secs,
        }
    }
}

/// TMDB API client.
pub struct TmdbClient {
    config: TmdbConfig,
    client: reqwest::Client,
}

/// Result of `/find/{external_id}`.
#[derive(Debug, Deserialize)]
pub struct FindResult {
    #[serde(default)]
    pub movie_results: Vec<FindItem>,
    #[serde(default)]
    pub tv_results: Vec<FindItem>,
}

/// Movie or TV record in a find result.
#[derive(Debug, Deserialize)]
pub struct FindItem {
    pub id: u64,
    #[serde(default)]
    pub genre_ids: Vec<u64>,
    #[serde(default)]
    pub original_language: Option<String>,
}

impl FindItem {
    /// Japanese-language animation.
    pub fn is_anime(&self) -> bool {
        self.genre_ids.contains(&ANIMATION_GENRE_ID)
            && self.original_language.as_deref() == Some("ja")
    }
}

impl TmdbClient {
    /// Create a new TMDB client.
    pub fn new(config: TmdbConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    /// Build a request with proper authentication.
    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        if self.config.use_bearer {
            request.header("Authorization", format!("Bearer {}", self.config.api_key))
        } else {
            request
        }
    }

    /// Build URL with optional api_key parameter (only for v3 style).
    fn build_url(&self, path: &str, extra_params: &str) -> String {
        if self.config.use_bearer {
            format!("{}/{}?{}", TMDB_BASE_URL, path, extra_params)
        } else {
            format!(
                "{}/{}?api_key={}&{}",
                TMDB_BASE_URL, path, self.config.api_key, extra_params
            )
        }
    }

    /// Verify API key is valid.
    pub async fn verify_api_key(&self) -> Result<bool> {
        let url = if self.config.use_bearer {
            format!("{}/authentication", TMDB_BASE_URL)
        } else {
            format!(
                "{}/authentication?api_key={}",
                TMDB_BASE_URL, self.config.api_key
            )
        };

        match self.build_request(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Look up TMDB records by IMDb id.
    pub async fn find_by_imdb_id(&self, imdb_id: &str) -> Result<FindResult> {
        let url = self.build_url(&format!("find/{}", imdb_id), "external_source=imdb_id");
        let resp = self
            .build_request(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp)
    }
}

#[async_trait]
impl AnimeClassifier for TmdbClient {
    async fn is_anime(&self, kind: MediaKind, id: &ExternalId) -> Result<bool> {
        if !id.is_imdb() {
            return Ok(false);
        }
        let found = self.find_by_imdb_id(&id.value).await?;
        let items = match kind {
            MediaKind::Series => &found.tv_results,
            MediaKind::Movie => &found.movie_results,
        };
        Ok(items.first().map(FindItem::is_anime).unwrap_or(false))
    }
}
