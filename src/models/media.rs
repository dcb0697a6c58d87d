//! Media-related data models.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Media kind enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[serde(alias = "film")]
    Movie,
    #[serde(alias = "show", alias = "tv", alias = "season", alias = "episode")]
    Series,
}

impl MediaKind {
    /// Name used by the catalog service and the state store.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
        }
    }

    /// Parse a stored kind. Upstream catalogs also use "show" and "episode".
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "movie" | "movies" | "film" => Some(MediaKind::Movie),
            "series" | "show" | "shows" | "tv" | "season" | "episode" => Some(MediaKind::Series),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider that scopes an external id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Imdb,
    Tmdb,
}

/// Provider-scoped identifier, rendered as `imdb-tt1234567` or `tmdb-98765`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalId {
    pub namespace: Namespace,
    pub value: String,
}

impl ExternalId {
    pub fn imdb<S: Into<String>>(value: S) -> Self {
        Self {
            namespace: Namespace::Imdb,
            value: value.into(),
        }
    }

    pub fn tmdb<S: Into<String>>(value: S) -> Self {
        Self {
            namespace: Namespace::Tmdb,
            value: value.into(),
        }
    }

    /// Parse a bare or namespaced id.
    ///
    /// Accepts `tt123`, `imdb-tt123`, `tmdb-456` and the braced folder form
    /// `{imdb-tt123}`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('{').trim_end_matches('}').trim();
        let lower = s.to_lowercase();

        if let Some(rest) = lower.strip_prefix("imdb-") {
            return is_imdb_value(rest).then(|| Self::imdb(rest));
        }
        if let Some(rest) = lower.strip_prefix("tmdb-") {
            return (!rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
                .then(|| Self::tmdb(rest));
        }
        is_imdb_value(&lower).then(|| Self::imdb(lower))
    }

    /// Whether the value can be looked up on the search service.
    pub fn is_imdb(&self) -> bool {
        self.namespace == Namespace::Imdb
    }
}

fn is_imdb_value(s: &str) -> bool {
    s.len() > 2 && s.starts_with("tt") && s[2..].chars().all(|c| c.is_ascii_digit())
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.namespace {
            Namespace::Imdb => write!(f, "imdb-{}", self.value),
            Namespace::Tmdb => write!(f, "tmdb-{}", self.value),
        }
    }
}

/// Kind of a scanned source entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Directory,
}

/// A file or directory found under the source root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    /// Full path to the entry.
    pub path: PathBuf,
    /// File or directory.
    pub kind: SourceKind,
    /// File name without path.
    pub name: String,
    /// Size in bytes (0 for directories).
    pub size: u64,
}

impl SourceItem {
    /// Build a source item from an existing path.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let kind = if metadata.is_dir() {
            SourceKind::Directory
        } else {
            SourceKind::File
        };
        Ok(Self {
            path: path.to_path_buf(),
            kind,
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
        })
    }
}

/// Structured tokens parsed out of a release name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedName {
    /// Best title guess.
    pub title: String,
    /// Release year.
    pub year: Option<u16>,
    /// Season number.
    pub season: Option<u16>,
    /// Episode number (leading episode for multi-episode files).
    pub episode: Option<u16>,
    /// Last episode of a multi-episode range.
    pub last_episode: Option<u16>,
    /// Resolution tag such as "1080p" or "1440x1080".
    pub resolution: Option<String>,
    /// File extension including the dot.
    pub extension: Option<String>,
    /// Parsed through the anime grammar.
    pub is_anime: bool,
}

impl ParsedName {
    /// Whether the name identifies a single episode.
    pub fn is_episode(&self) -> bool {
        self.season.is_some() && self.episode.is_some()
    }

    /// Canonical `SxxExx` token.
    pub fn episode_tag(&self) -> Option<String> {
        match (self.season, self.episode) {
            (Some(s), Some(e)) => Some(format!("S{:02}E{:02}", s, e)),
            _ => None,
        }
    }
}

/// Destination tree a resolved item is linked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationRoot {
    Shows,
    Movies,
    AnimeShows,
    AnimeMovies,
}

impl DestinationRoot {
    /// Default root for a media kind.
    pub fn for_kind(kind: MediaKind, anime: bool) -> Self {
        match (kind, anime) {
            (MediaKind::Series, false) => DestinationRoot::Shows,
            (MediaKind::Series, true) => DestinationRoot::AnimeShows,
            (MediaKind::Movie, false) => DestinationRoot::Movies,
            (MediaKind::Movie, true) => DestinationRoot::AnimeMovies,
        }
    }
}

/// Canonical identity returned by the metadata resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    /// Canonical title.
    pub title: String,
    /// Canonical year.
    pub year: Option<u16>,
    /// Namespaced id; `None` when the catalog had no candidates.
    pub id: Option<ExternalId>,
    /// Movie or series.
    pub kind: MediaKind,
    /// Destination root routing.
    pub root: DestinationRoot,
}

impl ResolvedMedia {
    /// Unidentified result carrying the input title unchanged.
    pub fn unidentified(title: &str, year: Option<u16>, kind: MediaKind) -> Self {
        Self {
            title: title.to_string(),
            year,
            id: None,
            kind,
            root: DestinationRoot::for_kind(kind, false),
        }
    }

    pub fn is_identified(&self) -> bool {
        self.id.is_some()
    }

    /// Folder-style display string: `Title (Year) {imdb-tt123}`.
    pub fn display(&self) -> String {
        let mut out = self.title.clone();
        if let Some(year) = self.year {
            if !self.title.contains(&format!("({})", year)) {
                out.push_str(&format!(" ({})", year));
            }
        }
        if let Some(ref id) = self.id {
            out.push_str(&format!(" {{{}}}", id));
        }
        out
    }
}

/// A candidate record returned by the catalog search service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub year: Option<u16>,
    pub id: ExternalId,
}

/// Pixel dimensions reported by the media probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoDimensions {
    pub width: u32,
    pub height: u32,
}

impl VideoDimensions {
    /// Map to a resolution tag.
    pub fn resolution_tag(&self) -> String {
        match self.width {
            1280 => "720p".to_string(),
            1920 => "1080p".to_string(),
            3840 => "2160p".to_string(),
            w => format!("{}x{}", w, self.height),
        }
    }
}
