//! Source tree scanner.
//!
//! Lists the top-level source directories a pass works on and the video files
//! inside each of them, leaving out samples and bonus material.

use crate::models::media::SourceItem;
use crate::utils::fs as fsutil;
use crate::Result;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Folder names holding bonus material rather than the feature itself.
const EXTRAS_NAMES: &[&str] = &[
    "extras",
    "extra",
    "featurettes",
    "featurette",
    "behind the scenes",
    "behindthescenes",
    "deleted scenes",
    "deletedscenes",
    "making of",
    "makingof",
    "bonus",
    "bonuses",
    "special features",
    "specialfeatures",
    "sample",
    "samples",
];

/// Result of scanning the source root.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Directories holding at least one video file.
    pub directories: Vec<SourceItem>,
    /// Directories without any video file.
    pub empty_dirs: Vec<PathBuf>,
    /// Video files sitting directly in the source root.
    pub loose_files: Vec<PathBuf>,
}

/// Whether a path runs through an extras or sample folder.
///
/// Also matches suffixed names such as `The.Movie.Extras-Grp`.
pub fn is_in_extras_directory(path: &Path) -> bool {
    path.components().any(|component| {
        let Component::Normal(name) = component else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        EXTRAS_NAMES.contains(&name.as_str())
            || [".extras", "-extras", "_extras", ".featurette", "-featurette"]
                .iter()
                .any(|p| name.contains(p))
    })
}

/// Video files under `dir`, recursively and sorted, without samples or extras.
pub fn video_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            let rel = p.strip_prefix(dir).unwrap_or(p);
            fsutil::is_video_file(p) && !fsutil::is_sample(p) && !is_in_extras_directory(rel)
        })
        .collect()
}

/// Largest video file under `dir`.
pub fn largest_video(dir: &Path) -> Option<PathBuf> {
    video_files(dir)
        .into_iter()
        .filter_map(|p| std::fs::metadata(&p).ok().map(|m| (p, m.len())))
        .fold(None, |best: Option<(PathBuf, u64)>, (p, size)| match best {
            Some((_, s)) if s >= size => best,
            _ => Some((p, size)),
        })
        .map(|(p, _)| p)
}

/// Scan the source root one level deep.
pub fn scan_source_root(path: &Path) -> Result<ScanResult> {
    fsutil::ensure_directory(path)?;

    let mut result = ScanResult::default();
    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            continue;
        }

        // Debrid mounts expose directories as symlinks; follow one level.
        let entry_path = entry.path();
        if entry_path.is_dir() {
            if video_files(entry_path).is_empty() {
                tracing::debug!("No video files in {}", entry_path.display());
                result.empty_dirs.push(entry_path.to_path_buf());
                continue;
            }
            match SourceItem::from_path(entry_path) {
                Ok(item) => result.directories.push(item),
                Err(e) => tracing::warn!("Failed to read {:?}: {}", entry_path, e),
            }
        } else if fsutil::is_video_file(entry_path) {
            result.loose_files.push(entry_path.to_path_buf());
        }
    }

    tracing::info!(
        "Scanned {}: {} directories, {} without video, {} loose files",
        path.display(),
        result.directories.len(),
        result.empty_dirs.len(),
        result.loose_files.len()
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_in_extras_directory() {
        assert!(is_in_extras_directory(Path::new("Movie/Extras/clip.mkv")));
        assert!(is_in_extras_directory(Path::new("Movie/Sample/clip.mkv")));
        assert!(is_in_extras_directory(Path::new("The.Movie.Extras-Grp/clip.mkv")));
        assert!(!is_in_extras_directory(Path::new("Movie/movie.mkv")));
        assert!(!is_in_extras_directory(Path::new("Extraordinary.2019/e.mkv")));
    }

    // Directory scans are covered in tests/scanner_tests.rs
}
