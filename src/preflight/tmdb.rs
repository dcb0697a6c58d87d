//! TMDB API preflight check.
//!
//! TMDB is only consulted in split mode, so the check is skipped otherwise.

use super::CheckResult;
use crate::models::config::Config;
use crate::services::tmdb::{TmdbClient, TmdbConfig};

/// Check the TMDB key when anime routing is enabled.
pub async fn check(config: &Config) -> Option<CheckResult> {
    if !config.resolver.split {
        return None;
    }

    let Some(api_key) = config.tmdb.api_key.as_deref().filter(|k| !k.is_empty()) else {
        return Some(CheckResult::fail(
            "TMDB API",
            "API key not configured (required in split mode)",
            "Set TMDB_API_KEY environment variable",
        ));
    };

    let client = match TmdbClient::new(TmdbConfig::new(api_key, config.catalog.timeout)) {
        Ok(client) => client,
        Err(e) => {
            return Some(CheckResult::fail(
                "TMDB API",
                &format!("client setup failed: {}", e),
                "Check your TLS setup",
            ))
        }
    };

    Some(match client.verify_api_key().await {
        Ok(true) => CheckResult::ok("TMDB API", "connected"),
        Ok(false) => CheckResult::fail(
            "TMDB API",
            "invalid API key or unreachable",
            "Check your TMDB_API_KEY environment variable",
        ),
        Err(_) => CheckResult::fail(
            "TMDB API",
            "connection failed",
            "Check your network connection",
        ),
    })
}
