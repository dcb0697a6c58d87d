//! Symlink materializer.
//!
//! Builds destination paths for resolved media and places relative symlinks
//! there. Placement is idempotent: a link that already points at the same
//! source is left alone, a link to a different source gets a numbered sibling,
//! and a regular file is never touched.

use crate::core::store::Store;
use crate::error::MaterializationFailure;
use crate::models::catalog::LinkRecord;
use crate::models::config::DestinationConfig;
use crate::models::media::{ParsedName, ResolvedMedia};
use crate::utils::fs as fsutil;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Numbered siblings tried before giving up on a destination.
const MAX_SUFFIX: u32 = 100;

static REPEATED_SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid regex"));
static REPEATED_DASHES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").expect("valid regex"));
static REPEATED_DOTS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").expect("valid regex"));

/// Remove characters that are unsafe in file names.
///
/// Strips `<>:"/\|?*` and control characters, then collapses repeated spaces,
/// dashes and dots.
pub fn sanitize_filename(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .collect();
    let collapsed = REPEATED_SPACES_RE.replace_all(&stripped, " ");
    let collapsed = REPEATED_DASHES_RE.replace_all(&collapsed, "-");
    let collapsed = REPEATED_DOTS_RE.replace_all(&collapsed, ".");
    collapsed.trim().to_string()
}

/// Insert ` (n)` before the extension.
fn numbered(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{} ({})", stem, n),
    };
    path.with_file_name(name)
}

fn resolution_suffix(resolution: Option<&str>) -> String {
    resolution
        .filter(|r| !r.is_empty())
        .map(|r| format!(" [{}]", r))
        .unwrap_or_default()
}

/// What happened at one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// New link at the requested path.
    Created,
    /// A link to the same source was already there.
    Exists,
    /// The requested path held another link; placed at a numbered sibling.
    Renamed,
    /// A regular file occupies the destination; the source is now ignored.
    SkippedConflict,
}

impl LinkOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkOutcome::Created => "created",
            LinkOutcome::Exists => "exists",
            LinkOutcome::Renamed => "renamed",
            LinkOutcome::SkippedConflict => "skipped-conflict",
        }
    }

    /// Whether the source is reachable through a link afterwards.
    pub fn is_linked(&self) -> bool {
        !matches!(self, LinkOutcome::SkippedConflict)
    }
}

/// Result of placing one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkResult {
    pub source: PathBuf,
    /// Path actually used (differs from the requested one when renamed).
    pub destination: PathBuf,
    pub outcome: LinkOutcome,
}

/// Places symlinks under the destination roots and records them in the store.
#[derive(Debug, Clone)]
pub struct Materializer {
    store: Store,
    destinations: DestinationConfig,
}

impl Materializer {
    pub fn new(store: Store, destinations: DestinationConfig) -> Self {
        Self {
            store,
            destinations,
        }
    }

    /// `{root}/{Title (Year) {ns-id}}`
    pub fn media_folder(&self, media: &ResolvedMedia) -> PathBuf {
        self.destinations
            .root(media.root)
            .join(sanitize_filename(&media.display()))
    }

    /// `{root}/{display}/{display} [{res}]{ext}`
    pub fn movie_destination(
        &self,
        media: &ResolvedMedia,
        resolution: Option<&str>,
        extension: &str,
    ) -> PathBuf {
        let name = format!(
            "{}{}{}",
            media.display(),
            resolution_suffix(resolution),
            extension
        );
        self.media_folder(media).join(sanitize_filename(&name))
    }

    /// `{root}/{display}/Season {NN}/{display} - SxxExx [{res}]{ext}`
    pub fn episode_destination(
        &self,
        media: &ResolvedMedia,
        season: u16,
        episode: u16,
        resolution: Option<&str>,
        extension: &str,
    ) -> PathBuf {
        let name = format!(
            "{} - S{:02}E{:02}{}{}",
            media.display(),
            season,
            episode,
            resolution_suffix(resolution),
            extension
        );
        self.media_folder(media)
            .join(format!("Season {:02}", season))
            .join(sanitize_filename(&name))
    }

    /// Link a movie file.
    pub fn link_movie(
        &self,
        media: &ResolvedMedia,
        source: &Path,
        parsed: &ParsedName,
    ) -> Result<LinkResult> {
        let extension = extension_of(source, parsed);
        let destination = self.movie_destination(media, parsed.resolution.as_deref(), &extension);
        self.link(source, &destination, media)
    }

    /// Link an episode file. `parsed` must carry season and episode.
    pub fn link_episode(
        &self,
        media: &ResolvedMedia,
        source: &Path,
        parsed: &ParsedName,
    ) -> Result<LinkResult> {
        let (season, episode) = match (parsed.season, parsed.episode) {
            (Some(s), Some(e)) => (s, e),
            _ => {
                return Err(crate::error::ParseFailure::NoEpisode(
                    source.display().to_string(),
                )
                .into())
            }
        };
        let extension = extension_of(source, parsed);
        let destination = self.episode_destination(
            media,
            season,
            episode,
            parsed.resolution.as_deref(),
            &extension,
        );
        self.link(source, &destination, media)
    }

    /// Place a relative symlink to `source` at `destination`.
    pub fn link(
        &self,
        source: &Path,
        destination: &Path,
        media: &ResolvedMedia,
    ) -> Result<LinkResult> {
        let source = fsutil::absolute(source)?;
        let destination = fsutil::absolute(destination)?;
        let source_key = source.display().to_string();

        if self.store.is_ignored(&source_key)? {
            tracing::debug!("Ignored source, skipping: {:?}", source);
            return Ok(LinkResult {
                source,
                destination,
                outcome: LinkOutcome::SkippedConflict,
            });
        }

        let parent = destination
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        std::fs::create_dir_all(&parent).map_err(|e| MaterializationFailure::CreateDir {
            path: parent.clone(),
            source: e,
        })?;

        let mut candidate = destination.clone();
        let mut n = 0;
        let outcome = loop {
            match std::fs::symlink_metadata(&candidate) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    let target = fsutil::relative_path(&parent, &source)?;
                    make_symlink(&target, &candidate).map_err(|e| MaterializationFailure::Link {
                        target: target.clone(),
                        destination: candidate.clone(),
                        source: e,
                    })?;
                    break if n == 0 {
                        LinkOutcome::Created
                    } else {
                        LinkOutcome::Renamed
                    };
                }
                Err(e) => return Err(e.into()),
                Ok(meta) if meta.file_type().is_symlink() => {
                    if points_to(&candidate, &source)? {
                        break LinkOutcome::Exists;
                    }
                }
                Ok(_) if n == 0 => {
                    self.store
                        .mark_ignored(&source_key, "destination occupied by a regular file")?;
                    break LinkOutcome::SkippedConflict;
                }
                Ok(_) => {}
            }
            n += 1;
            if n > MAX_SUFFIX {
                return Err(crate::Error::other(format!(
                    "no free destination name for {:?}",
                    destination
                )));
            }
            candidate = numbered(&destination, n);
        };

        tracing::info!(
            source = %source.display(),
            destination = %candidate.display(),
            outcome = outcome.as_str(),
            "link"
        );

        if outcome.is_linked() {
            self.store.record_link(&LinkRecord {
                source: source_key,
                destination: candidate.display().to_string(),
                media_id: media.id.as_ref().map(|id| id.to_string()),
                year: media.year,
                symlink_folder: parent.display().to_string(),
                symlink_filename: candidate
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            })?;
        }

        Ok(LinkResult {
            source,
            destination: candidate,
            outcome,
        })
    }

    /// Mirror a directory as real directories whose leaves are relative
    /// symlinks. Individual link failures are logged and skipped.
    pub fn clone_tree(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        media: &ResolvedMedia,
    ) -> Result<Vec<LinkResult>> {
        let mut results = Vec::new();
        for entry in WalkDir::new(source_dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| crate::Error::other(e.to_string()))?;
            let rel = entry
                .path()
                .strip_prefix(source_dir)
                .map_err(|e| crate::Error::other(e.to_string()))?;
            let target = dest_dir.join(rel);

            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target).map_err(|e| {
                    MaterializationFailure::CreateDir {
                        path: target.clone(),
                        source: e,
                    }
                })?;
                continue;
            }

            match self.link(entry.path(), &target, media) {
                Ok(result) => results.push(result),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!("Failed to link {:?}: {}", entry.path(), e),
            }
        }
        Ok(results)
    }
}

fn extension_of(source: &Path, parsed: &ParsedName) -> String {
    parsed.extension.clone().unwrap_or_else(|| {
        fsutil::get_extension(source)
            .map(|e| format!(".{}", e))
            .unwrap_or_default()
    })
}

/// Whether the symlink at `link` resolves to `source`.
fn points_to(link: &Path, source: &Path) -> Result<bool> {
    let target = std::fs::read_link(link)?;
    let resolved = match link.parent() {
        Some(parent) if target.is_relative() => parent.join(&target),
        _ => target,
    };
    Ok(fsutil::absolute(&resolved)? == source)
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media::{DestinationRoot, ExternalId, MediaKind};

    fn show() -> ResolvedMedia {
        ResolvedMedia {
            title: "The Show Name".to_string(),
            year: Some(2020),
            id: Some(ExternalId::imdb("tt123")),
            kind: MediaKind::Series,
            root: DestinationRoot::Shows,
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Mission: Impossible"), "Mission Impossible");
        assert_eq!(sanitize_filename("What?  If*..."), "What If.");
        assert_eq!(sanitize_filename("A -- B\u{7}"), "A - B");
        assert_eq!(sanitize_filename("Show (2020) {imdb-tt1}"), "Show (2020) {imdb-tt1}");
    }

    #[test]
    fn test_numbered() {
        assert_eq!(
            numbered(Path::new("/d/Movie (2020).mkv"), 1),
            PathBuf::from("/d/Movie (2020) (1).mkv")
        );
        assert_eq!(numbered(Path::new("/d/noext"), 2), PathBuf::from("/d/noext (2)"));
    }

    #[test]
    fn test_episode_destination_layout() {
        let materializer = Materializer::new(
            Store::open_in_memory().unwrap(),
            DestinationConfig::under(Path::new("/dest")),
        );
        let path = materializer.episode_destination(&show(), 1, 1, Some("720p"), ".mkv");
        assert_eq!(
            path,
            PathBuf::from(
                "/dest/shows/The Show Name (2020) {imdb-tt123}/Season 01/The Show Name (2020) {imdb-tt123} - S01E01 [720p].mkv"
            )
        );

        let no_res = materializer.episode_destination(&show(), 2, 10, None, ".mp4");
        assert!(no_res.ends_with("Season 02/The Show Name (2020) {imdb-tt123} - S02E10.mp4"));
    }

    #[test]
    fn test_movie_destination_layout() {
        let materializer = Materializer::new(
            Store::open_in_memory().unwrap(),
            DestinationConfig::under(Path::new("/dest")),
        );
        let movie = ResolvedMedia {
            title: "Heat".to_string(),
            year: Some(1995),
            id: Some(ExternalId::imdb("tt0113277")),
            kind: MediaKind::Movie,
            root: DestinationRoot::Movies,
        };
        assert_eq!(
            materializer.movie_destination(&movie, Some("1080p"), ".mkv"),
            PathBuf::from("/dest/movies/Heat (1995) {imdb-tt0113277}/Heat (1995) {imdb-tt0113277} [1080p].mkv")
        );
    }
}
