//! Catalog search service preflight check.

use super::CheckResult;
use crate::models::config::CatalogServiceConfig;
use crate::services::cinemeta::CinemetaClient;

/// Check that the catalog search service answers.
pub async fn check(config: &CatalogServiceConfig) -> CheckResult {
    let client = match CinemetaClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            return CheckResult::fail(
                "Catalog service",
                &format!("client setup failed: {}", e),
                "Check the catalog.base_url setting",
            )
        }
    };

    if client.ping().await {
        CheckResult::ok("Catalog service", &format!("reachable ({})", config.base_url))
    } else {
        CheckResult::fail(
            "Catalog service",
            &format!("{} did not answer", config.base_url),
            "Check your network connection or set CINEMETA_URL",
        )
    }
}
