//! Error types for the media symlinker.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media symlinker.
#[derive(Error, Debug)]
pub enum Error {
    // Preflight errors
    #[error("ffprobe not found. Install FFmpeg: sudo apt install ffmpeg")]
    FfprobeNotFound,

    #[error("TMDB API key not configured. Set TMDB_API_KEY environment variable")]
    TmdbApiKeyMissing,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    // File system errors
    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    // Pipeline errors
    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error(transparent)]
    Resolution(#[from] ResolutionFailure),

    #[error(transparent)]
    Materialization(#[from] MaterializationFailure),

    // State store errors
    #[error("State store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("State store lock poisoned")]
    StoreLock,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Whether this error must abort the current pass.
    ///
    /// Only state store failures are fatal; everything else is scoped to the
    /// item that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Store(_) | Error::StoreLock)
    }
}

/// A name yielded no usable tokens.
#[derive(Error, Debug)]
pub enum ParseFailure {
    #[error("no title could be derived from '{0}'")]
    NoTitle(String),

    #[error("no season/episode token in '{0}'")]
    NoEpisode(String),
}

/// A title could not be mapped to a catalog identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    #[error("catalog request for '{query}' failed: {message}")]
    Request { query: String, message: String },

    #[error("catalog request for '{query}' timed out")]
    Timeout { query: String },

    #[error("catalog returned HTTP {status} for '{query}'")]
    Status { query: String, status: u16 },

    #[error("no catalog candidates for '{0}'")]
    NoCandidates(String),

    #[error("'{title}' is ambiguous and was queued for review (pending #{pending_id})")]
    Deferred { title: String, pending_id: i64 },

    #[error("invalid disambiguation answer '{0}'")]
    InvalidChoice(String),

    #[error("no catalog entry for id {0}")]
    UnknownId(String),
}

impl ResolutionFailure {
    /// Transport failures that say nothing about the title itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ResolutionFailure::Request { .. }
                | ResolutionFailure::Timeout { .. }
                | ResolutionFailure::Status { .. }
        )
    }

    /// Classify a transport error for the given query.
    pub fn from_request(query: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ResolutionFailure::Timeout {
                query: query.to_string(),
            }
        } else if let Some(status) = err.status() {
            ResolutionFailure::Status {
                query: query.to_string(),
                status: status.as_u16(),
            }
        } else {
            ResolutionFailure::Request {
                query: query.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// A symlink or its destination directory could not be created.
#[derive(Error, Debug)]
pub enum MaterializationFailure {
    #[error("failed to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to link {destination:?} -> {target:?}: {source}")]
    Link {
        target: PathBuf,
        destination: PathBuf,
        source: std::io::Error,
    },

    #[error("no linkable files in {0:?}")]
    NoSourceFiles(PathBuf),
}
