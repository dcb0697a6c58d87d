//! Catalog search client (Cinemeta-compatible API).

use crate::error::ResolutionFailure;
use crate::models::config::CatalogServiceConfig;
use crate::models::media::{Candidate, ExternalId, MediaKind};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Free-text search and id lookup against an external metadata catalog.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    /// Candidates for a title, best first.
    async fn search(&self, kind: MediaKind, query: &str, year: Option<u16>) -> Result<Vec<Candidate>>;

    /// Full record for a namespaced id.
    async fn details(&self, kind: MediaKind, id: &ExternalId) -> Result<Option<Candidate>>;
}

/// Search response.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    metas: Vec<Meta>,
}

/// Detail response.
#[derive(Debug, Deserialize)]
struct DetailResponse {
    meta: Option<Meta>,
}

/// One catalog record.
#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    imdb_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "releaseInfo")]
    release_info: Option<String>,
    #[serde(default)]
    year: Option<serde_json::Value>,
}

impl Meta {
    fn into_candidate(self) -> Option<Candidate> {
        let id = self
            .imdb_id
            .as_deref()
            .or(self.id.as_deref())
            .and_then(ExternalId::parse)?;
        let name = self.name.filter(|n| !n.trim().is_empty())?;
        let year = self
            .release_info
            .as_deref()
            .and_then(parse_release_year)
            .or_else(|| match self.year {
                Some(serde_json::Value::String(ref s)) => parse_release_year(s),
                Some(serde_json::Value::Number(ref n)) => {
                    n.as_u64().and_then(|y| u16::try_from(y).ok()).filter(|y| *y >= 1800)
                }
                _ => None,
            });
        Some(Candidate { name, year, id })
    }
}

/// Leading 4-digit year of a release string such as `2008-2013` or `2019–`.
/// Anything else is treated as absent.
pub fn parse_release_year(info: &str) -> Option<u16> {
    let info = info.trim();
    let digits: String = info.chars().take(4).collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if info.chars().nth(4).map_or(false, |c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|y| *y >= 1800)
}

/// Cinemeta API client.
pub struct CinemetaClient {
    base_url: String,
    client: reqwest::Client,
}

impl CinemetaClient {
    /// Create a new client with the configured timeout.
    pub fn new(config: &CatalogServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn kind_path(kind: MediaKind) -> &'static str {
        match kind {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
        }
    }

    fn search_url(&self, kind: MediaKind, query: &str) -> String {
        format!(
            "{}/catalog/{}/top/search={}.json",
            self.base_url,
            Self::kind_path(kind),
            urlencoding::encode(query)
        )
    }

    fn detail_url(&self, kind: MediaKind, id: &ExternalId) -> String {
        format!("{}/meta/{}/{}.json", self.base_url, Self::kind_path(kind), id.value)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, query: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolutionFailure::from_request(query, e))?;

        if !resp.status().is_success() {
            return Err(ResolutionFailure::Status {
                query: query.to_string(),
                status: resp.status().as_u16(),
            }
            .into());
        }

        let body = resp
            .json()
            .await
            .map_err(|e| ResolutionFailure::from_request(query, e))?;
        Ok(body)
    }

    /// Check that the service answers.
    pub async fn ping(&self) -> bool {
        match self.client.get(self.search_url(MediaKind::Series, "test")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl CatalogSearch for CinemetaClient {
    async fn search(&self, kind: MediaKind, query: &str, year: Option<u16>) -> Result<Vec<Candidate>> {
        // Cinemeta has no year filter; the resolver applies the year itself.
        let url = self.search_url(kind, query);
        tracing::debug!("Catalog search: {} (year: {:?})", url, year);

        let resp: SearchResponse = self.get_json(&url, query).await?;
        Ok(resp
            .metas
            .into_iter()
            .filter_map(Meta::into_candidate)
            .collect())
    }

    async fn details(&self, kind: MediaKind, id: &ExternalId) -> Result<Option<Candidate>> {
        if !id.is_imdb() {
            return Err(ResolutionFailure::UnknownId(id.to_string()).into());
        }
        let url = self.detail_url(kind, id);
        tracing::debug!("Catalog details: {}", url);

        let resp: DetailResponse = self.get_json(&url, &id.to_string()).await?;
        Ok(resp.meta.and_then(Meta::into_candidate))
    }
}
