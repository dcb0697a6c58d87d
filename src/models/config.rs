//! Configuration model.

use crate::models::media::DestinationRoot;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the downloaded media.
    pub source_dir: PathBuf,
    /// Destination roots.
    pub destination: DestinationConfig,
    /// SQLite state database.
    pub database_path: PathBuf,
    /// Catalog search service configuration.
    pub catalog: CatalogServiceConfig,
    /// TMDB configuration.
    pub tmdb: TmdbConfig,
    /// Resolver behavior.
    pub resolver: ResolverConfig,
    /// Watch loop configuration.
    pub watch: WatchConfig,
}

/// Destination roots for each media kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub shows: PathBuf,
    pub movies: PathBuf,
    pub anime_shows: PathBuf,
    pub anime_movies: PathBuf,
}

impl DestinationConfig {
    /// Directories rooted at `base` using the conventional names.
    pub fn under(base: &Path) -> Self {
        Self {
            shows: base.join("shows"),
            movies: base.join("movies"),
            anime_shows: base.join("anime_shows"),
            anime_movies: base.join("anime_movies"),
        }
    }

    /// Path of a destination root.
    pub fn root(&self, root: DestinationRoot) -> &Path {
        match root {
            DestinationRoot::Shows => &self.shows,
            DestinationRoot::Movies => &self.movies,
            DestinationRoot::AnimeShows => &self.anime_shows,
            DestinationRoot::AnimeMovies => &self.anime_movies,
        }
    }
}

/// Catalog search service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogServiceConfig {
    /// Base URL of the Cinemeta-compatible service.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout: u64,
}

/// TMDB configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    /// API key.
    pub api_key: Option<String>,
}

/// How ambiguous titles are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisambiguationMode {
    /// Prompt on the terminal.
    Interactive,
    /// Queue for `pending resolve`.
    Deferred,
}

/// Resolver behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Never prompt; take the year match or the first candidate.
    pub force: bool,
    /// Route anime to separate roots.
    pub split: bool,
    /// Disambiguation mode.
    pub disambiguation: DisambiguationMode,
}

/// Watch loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period before a triggered pass starts, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let base = PathBuf::from("/data");
        Self {
            source_dir: base.join("torrents"),
            destination: DestinationConfig::under(&base),
            database_path: base.join("media_database.db"),
            catalog: CatalogServiceConfig::default(),
            tmdb: TmdbConfig::default(),
            resolver: ResolverConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self::under(Path::new("/data"))
    }
}

impl Default for CatalogServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://v3-cinemeta.strem.io".to_string(),
            timeout: 10,
        }
    }
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("TMDB_API_KEY").ok(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            force: false,
            split: false,
            disambiguation: DisambiguationMode::Deferred,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 2000 }
    }
}

impl Config {
    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("SRC_DIR") {
            self.source_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DEST_DIR") {
            self.destination.shows = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DEST_DIR_MOVIES") {
            self.destination.movies = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("CINEMETA_URL") {
            self.catalog.base_url = v;
        }
        if let Ok(v) = std::env::var("TMDB_API_KEY") {
            self.tmdb.api_key = Some(v);
        }
    }

    /// Reject values no pass can run with.
    pub fn validate(&self) -> Result<()> {
        if self.source_dir.as_os_str().is_empty() {
            return Err(crate::Error::Config("source_dir is empty".to_string()));
        }
        if self.catalog.base_url.trim().is_empty() {
            return Err(crate::Error::Config("catalog.base_url is empty".to_string()));
        }
        if self.catalog.timeout == 0 {
            return Err(crate::Error::Config(
                "catalog.timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}

/// Get the configuration directory path.
fn dirs_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("media_symlinker")
}

/// Load configuration from an explicit file or the default location.
///
/// A missing default file yields the defaults; an explicit path must exist
/// and parse.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p)
                .map_err(|_| crate::Error::PathNotFound(p.display().to_string()))?;
            toml::from_str(&content)?
        }
        None => {
            let config_path = dirs_config_path().join("config.toml");
            if config_path.exists() {
                let content = std::fs::read_to_string(&config_path)?;
                toml::from_str(&content)?
            } else {
                Config::default()
            }
        }
    };

    config.apply_env();
    config.validate()?;
    Ok(config)
}
