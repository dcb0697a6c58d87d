//! Placing a resolved source directory.
//!
//! Shared by the catalog-driven pass and the unaccounted handler: series
//! directories link every episode file, movie directories link their largest
//! video file (or clone a disc structure wholesale).

use crate::core::linker::{LinkOutcome, LinkResult, Materializer};
use crate::core::parser;
use crate::core::scanner;
use crate::error::MaterializationFailure;
use crate::models::media::{ParsedName, ResolvedMedia};
use crate::services::ffprobe::MediaProbe;
use crate::Result;
use std::path::{Path, PathBuf};

/// Directory names that mark a disc structure.
const DISC_MARKERS: &[&str] = &["BDMV", "VIDEO_TS"];

/// Counts of link outcomes for one source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementReport {
    pub created: usize,
    pub existing: usize,
    pub renamed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Files that could not be parsed as episodes.
    pub unparsed: usize,
    /// Last destination written or confirmed.
    pub last_destination: Option<PathBuf>,
}

impl PlacementReport {
    fn record(&mut self, result: &LinkResult) {
        match result.outcome {
            LinkOutcome::Created => self.created += 1,
            LinkOutcome::Exists => self.existing += 1,
            LinkOutcome::Renamed => self.renamed += 1,
            LinkOutcome::SkippedConflict => self.skipped += 1,
        }
        if result.outcome.is_linked() {
            self.last_destination = Some(result.destination.clone());
        }
    }

    /// Links present after placement.
    pub fn linked(&self) -> usize {
        self.created + self.existing + self.renamed
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: &PlacementReport) {
        self.created += other.created;
        self.existing += other.existing;
        self.renamed += other.renamed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.unparsed += other.unparsed;
        if other.last_destination.is_some() {
            self.last_destination = other.last_destination.clone();
        }
    }
}

/// Whether `dir` holds a `BDMV` or `VIDEO_TS` folder.
pub fn is_disc_structure(dir: &Path) -> bool {
    DISC_MARKERS.iter().any(|m| dir.join(m).is_dir())
}

fn handle_link(report: &mut PlacementReport, file: &Path, result: Result<LinkResult>) -> Result<()> {
    match result {
        Ok(r) => {
            report.record(&r);
            Ok(())
        }
        // A directory that cannot be created aborts the whole item.
        Err(e @ crate::Error::Materialization(MaterializationFailure::CreateDir { .. })) => Err(e),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::warn!("Failed to link {:?}: {}", file, e);
            report.failed += 1;
            Ok(())
        }
    }
}

/// Link every episode file under a series directory.
pub fn place_series(
    materializer: &Materializer,
    probe: &dyn MediaProbe,
    media: &ResolvedMedia,
    dir: &Path,
) -> Result<PlacementReport> {
    let files = scanner::video_files(dir);
    if files.is_empty() {
        return Err(MaterializationFailure::NoSourceFiles(dir.to_path_buf()).into());
    }

    let mut report = PlacementReport::default();
    for file in files {
        let parsed = match parser::parse_file(&file, probe) {
            Ok(p) if p.is_episode() => p,
            Ok(_) => {
                tracing::debug!("No episode token, skipping: {:?}", file);
                report.unparsed += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", file, e);
                report.unparsed += 1;
                continue;
            }
        };
        if let Some(last) = parsed.last_episode {
            tracing::debug!(
                "Multi-episode file {:?} covers E{:02}-E{:02}, linked as {}",
                file,
                parsed.episode.unwrap_or(0),
                last,
                parsed.episode_tag().unwrap_or_default()
            );
        }
        let result = materializer.link_episode(media, &file, &parsed);
        handle_link(&mut report, &file, result)?;
    }
    Ok(report)
}

/// Resolution and extension for a movie file: folder name, then file name,
/// then the media probe.
pub fn movie_tokens(file: &Path, folder: Option<&str>, probe: &dyn MediaProbe) -> ParsedName {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let (stem, extension) = parser::split_extension(&name);

    let resolution = folder
        .and_then(parser::extract_resolution)
        .or_else(|| parser::extract_resolution(stem))
        .or_else(|| match probe.dimensions(file) {
            Ok(dims) => dims.map(|d| d.resolution_tag()),
            Err(e) => {
                tracing::debug!("Media probe failed for {:?}: {}", file, e);
                None
            }
        });

    ParsedName {
        title: parser::title_guess(stem),
        year: folder
            .and_then(parser::extract_year)
            .or_else(|| parser::extract_year(stem)),
        resolution,
        extension,
        ..Default::default()
    }
}

/// Link a movie: the largest video file, or a disc structure cloned wholesale.
pub fn place_movie(
    materializer: &Materializer,
    probe: &dyn MediaProbe,
    media: &ResolvedMedia,
    source: &Path,
) -> Result<PlacementReport> {
    let mut report = PlacementReport::default();

    if source.is_dir() && is_disc_structure(source) {
        let dest = materializer.media_folder(media);
        for result in materializer.clone_tree(source, &dest, media)? {
            report.record(&result);
        }
        return Ok(report);
    }

    let file = if source.is_dir() {
        scanner::largest_video(source)
            .ok_or_else(|| MaterializationFailure::NoSourceFiles(source.to_path_buf()))?
    } else {
        source.to_path_buf()
    };

    let folder = file
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string());
    let parsed = movie_tokens(&file, folder.as_deref(), probe);

    let result = materializer.link_movie(media, &file, &parsed);
    handle_link(&mut report, &file, result)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ffprobe::NoProbe;
    use tempfile::TempDir;

    #[test]
    fn test_movie_tokens_prefers_folder_resolution() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("Heat.1995.2160p");
        std::fs::create_dir(&folder).unwrap();
        let file = folder.join("heat.720p.mkv");
        std::fs::write(&file, b"x").unwrap();

        let parsed = movie_tokens(&file, Some("Heat.1995.2160p"), &NoProbe);
        assert_eq!(parsed.resolution.as_deref(), Some("2160p"));
        assert_eq!(parsed.year, Some(1995));
        assert_eq!(parsed.extension.as_deref(), Some(".mkv"));
    }
}
