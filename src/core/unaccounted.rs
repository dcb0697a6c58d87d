//! Handler for source directories absent from the upstream catalog.
//!
//! Classifies the directory as series or movie from its own name and the
//! names of the files inside, resolves the title, and places it. The outcome
//! is always recorded. Settled outcomes are not attempted again; a catalog
//! outage is recorded as retryable and picked up by the next pass.

use crate::core::linker::Materializer;
use crate::core::parser;
use crate::core::placement::{self, PlacementReport};
use crate::core::scanner;
use crate::core::resolver::Resolver;
use crate::core::store::Store;
use crate::error::{MaterializationFailure, ParseFailure, ResolutionFailure};
use crate::models::catalog::UnaccountedOutcome;
use crate::models::media::MediaKind;
use crate::services::ffprobe::MediaProbe;
use crate::{Error, Result};
use std::path::Path;

/// Series when the directory name or any contained video name carries a
/// season/episode token or a `Season N` marker.
pub fn classify_directory(dir: &Path) -> MediaKind {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if parser::looks_like_series(&name) {
        return MediaKind::Series;
    }

    let series_files = scanner::video_files(dir).iter().any(|f| {
        f.file_name()
            .map(|n| parser::contains_episode(&n.to_string_lossy()))
            .unwrap_or(false)
            || f.parent()
                .filter(|p| *p != dir)
                .and_then(|p| p.file_name())
                .map(|n| parser::looks_like_series(&n.to_string_lossy()))
                .unwrap_or(false)
    });
    if series_files {
        MediaKind::Series
    } else {
        MediaKind::Movie
    }
}

/// Series title and year: the folder name first, then the first episode file.
fn series_query(dir: &Path, dir_name: &str) -> Result<(String, Option<u16>)> {
    let title = parser::folder_title_guess(dir_name);
    let year = parser::extract_year(dir_name);
    if !title.is_empty() {
        return Ok((title, year));
    }

    for file in scanner::video_files(dir) {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if let Ok(parsed) = parser::parse_name(&name, None) {
            if parsed.is_episode() {
                return Ok((parsed.title, year.or(parsed.year)));
            }
        }
    }
    Err(ParseFailure::NoTitle(dir_name.to_string()).into())
}

/// Movie title and year from the largest file and its folder.
fn movie_query(dir: &Path, dir_name: &str) -> Result<(String, Option<u16>)> {
    let file = scanner::largest_video(dir)
        .ok_or_else(|| MaterializationFailure::NoSourceFiles(dir.to_path_buf()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let folder_title = parser::title_guess(dir_name);
    let title = if folder_title.is_empty() {
        parser::parse_name(&name, None)?.title
    } else {
        folder_title
    };
    let year = parser::extract_year(dir_name).or_else(|| parser::extract_year(&name));
    Ok((title, year))
}

/// Drives one unaccounted directory through resolve and place.
pub struct UnaccountedHandler<'a> {
    pub store: &'a Store,
    pub resolver: &'a Resolver,
    pub materializer: &'a Materializer,
    pub probe: &'a dyn MediaProbe,
}

impl UnaccountedHandler<'_> {
    /// Process `dir` and record the attempt. Only fatal errors are returned.
    pub async fn handle(&self, dir: &Path) -> Result<(UnaccountedOutcome, PlacementReport)> {
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let (outcome, report, error) = match self.place(dir, &dir_name).await {
            Ok(report) if report.linked() > 0 => (UnaccountedOutcome::Linked, report, None),
            Ok(report) => {
                let message = format!(
                    "no links placed ({} skipped, {} failed)",
                    report.skipped, report.failed
                );
                (UnaccountedOutcome::Failed, report, Some(message))
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(Error::Resolution(failure)) if failure.is_transient() => (
                UnaccountedOutcome::Retryable,
                PlacementReport::default(),
                Some(failure.to_string()),
            ),
            Err(e @ Error::Resolution(_)) => (
                UnaccountedOutcome::Unresolved,
                PlacementReport::default(),
                Some(e.to_string()),
            ),
            Err(e) => (
                UnaccountedOutcome::Failed,
                PlacementReport::default(),
                Some(e.to_string()),
            ),
        };

        match &error {
            Some(message) => tracing::warn!(
                dir = %dir_name,
                outcome = outcome.as_str(),
                "Unaccounted directory not placed: {}",
                message
            ),
            None => tracing::info!(
                dir = %dir_name,
                outcome = outcome.as_str(),
                links = report.linked(),
                "Unaccounted directory placed"
            ),
        }

        self.store
            .record_unaccounted(&dir_name, outcome, error.as_deref())?;
        Ok((outcome, report))
    }

    async fn place(&self, dir: &Path, dir_name: &str) -> Result<PlacementReport> {
        let kind = classify_directory(dir);
        let (title, year) = match kind {
            MediaKind::Series => series_query(dir, dir_name)?,
            MediaKind::Movie => movie_query(dir, dir_name)?,
        };
        tracing::debug!("Unaccounted {} '{}' ({:?}) [{}]", dir_name, title, year, kind);

        let media = self.resolver.resolve(&title, year, kind).await?;
        if !media.is_identified() {
            return Err(ResolutionFailure::NoCandidates(title).into());
        }

        match kind {
            MediaKind::Series => {
                placement::place_series(self.materializer, self.probe, &media, dir)
            }
            MediaKind::Movie => placement::place_movie(self.materializer, self.probe, &media, dir),
        }
    }
}
