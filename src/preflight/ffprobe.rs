//! FFprobe preflight check.

use super::CheckResult;
use crate::services::ffprobe;

/// ffprobe is only a resolution fallback, so a missing binary is a warning.
pub fn check() -> CheckResult {
    if !ffprobe::is_installed() {
        return CheckResult::warn(
            "ffprobe",
            "not found, resolution tags come from names only",
            "Install FFmpeg: sudo apt install ffmpeg",
        );
    }
    match ffprobe::get_version() {
        Ok(version) => CheckResult::ok("ffprobe", &format!("installed ({})", version)),
        Err(_) => CheckResult::ok("ffprobe", "installed"),
    }
}
