//! Preflight checks module.
//!
//! Verifies the environment a pass depends on before any directory is
//! touched. Failures of required checks stop the command; optional ones only
//! print a warning.

mod catalog;
mod ffprobe;
mod paths;
mod tmdb;

use crate::models::config::Config;
use colored::Colorize;

/// How a check ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    /// Degraded but usable.
    Warn,
    Fail,
}

/// Result of a preflight check.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

impl CheckResult {
    pub fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    pub fn warn(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warn,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    pub fn fail(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Fail,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    pub fn passed(&self) -> bool {
        self.status != CheckStatus::Fail
    }
}

/// Run all preflight checks for a configuration.
pub async fn run_preflight_checks(config: &Config) -> Vec<CheckResult> {
    let mut results = paths::check(config);
    results.push(ffprobe::check());
    results.push(catalog::check(&config.catalog).await);
    if let Some(result) = tmdb::check(config).await {
        results.push(result);
    }
    results
}

/// Print preflight check results.
pub fn print_results(results: &[CheckResult]) {
    for result in results {
        let tag = match result.status {
            CheckStatus::Ok => "[OK]".green(),
            CheckStatus::Warn => "[WARN]".yellow(),
            CheckStatus::Fail => "[FAIL]".red(),
        };
        println!("{} {}: {}", tag, result.name.bold(), result.message);
        if let Some(ref hint) = result.hint {
            println!("  {} {}", "->".yellow(), hint);
        }
    }
}

/// Check if all required preflight checks passed.
pub fn all_passed(results: &[CheckResult]) -> bool {
    results.iter().all(CheckResult::passed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_do_not_fail() {
        let results = vec![
            CheckResult::ok("a", "fine"),
            CheckResult::warn("b", "degraded", "install it"),
        ];
        assert!(all_passed(&results));

        let failed = vec![CheckResult::fail("c", "broken", "fix it")];
        assert!(!all_passed(&failed));
    }
}
