//! FFprobe service for reading coded video dimensions.
//!
//! Only used when neither the file name nor its folder carries a
//! resolution token.

use crate::models::media::VideoDimensions;
use crate::Result;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

/// Source of pixel dimensions for a media file.
pub trait MediaProbe: Send + Sync {
    /// Dimensions of the first video stream, if any.
    fn dimensions(&self, path: &Path) -> Result<Option<VideoDimensions>>;
}

/// FFprobe output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

/// FFprobe stream information.
#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    coded_width: Option<u32>,
    coded_height: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Probe backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct Ffprobe {
    binary: String,
}

impl Ffprobe {
    pub fn new() -> Self {
        Self {
            binary: "ffprobe".to_string(),
        }
    }
}

impl Default for Ffprobe {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaProbe for Ffprobe {
    fn dimensions(&self, path: &Path) -> Result<Option<VideoDimensions>> {
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-select_streams",
                "v:0",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .map_err(|_| crate::Error::FfprobeNotFound)?;

        if !output.status.success() {
            return Err(crate::Error::other(format!(
                "ffprobe failed for: {:?}",
                path
            )));
        }

        parse_output(&output.stdout)
    }
}

/// Extract dimensions from ffprobe JSON, preferring coded dimensions.
fn parse_output(stdout: &[u8]) -> Result<Option<VideoDimensions>> {
    let ffprobe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let dims = ffprobe
        .streams
        .iter()
        .filter(|s| s.codec_type == "video")
        .find_map(|s| {
            let width = s.coded_width.filter(|w| *w > 0).or(s.width)?;
            let height = s.coded_height.filter(|h| *h > 0).or(s.height)?;
            Some(VideoDimensions { width, height })
        });

    Ok(dims)
}

/// Probe that never reports dimensions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl MediaProbe for NoProbe {
    fn dimensions(&self, _path: &Path) -> Result<Option<VideoDimensions>> {
        Ok(None)
    }
}

/// Check if ffprobe is installed.
pub fn is_installed() -> bool {
    Command::new("ffprobe")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Get ffprobe version.
pub fn get_version() -> Result<String> {
    let output = Command::new("ffprobe").arg("-version").output()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().unwrap_or("unknown");

    Ok(first_line.to_string())
}
