//! Source and destination path checks.

use super::CheckResult;
use crate::models::config::Config;
use crate::models::media::DestinationRoot;

const ROOTS: &[DestinationRoot] = &[
    DestinationRoot::Shows,
    DestinationRoot::Movies,
    DestinationRoot::AnimeShows,
    DestinationRoot::AnimeMovies,
];

/// The source root must exist; each destination root, or its nearest
/// existing ancestor, must be a writable directory.
pub fn check(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let source = &config.source_dir;
    results.push(if source.is_dir() {
        CheckResult::ok("Source", &source.display().to_string())
    } else {
        CheckResult::fail(
            "Source",
            &format!("{} is not a directory", source.display()),
            "Set source_dir in config.toml or SRC_DIR",
        )
    });

    let roots: &[DestinationRoot] = if config.resolver.split {
        ROOTS
    } else {
        &ROOTS[..2]
    };
    for root in roots {
        let path = config.destination.root(*root);
        let usable = path
            .ancestors()
            .find(|a| a.exists())
            .and_then(|a| std::fs::metadata(a).ok())
            .map(|m| m.is_dir() && !m.permissions().readonly())
            .unwrap_or(false);
        let name = format!("Destination ({:?})", root);
        results.push(if usable {
            CheckResult::ok(&name, &path.display().to_string())
        } else {
            CheckResult::fail(
                &name,
                &format!("{} cannot be created", path.display()),
                "Set DEST_DIR / DEST_DIR_MOVIES or the destination section of config.toml",
            )
        });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::DestinationConfig;
    use tempfile::TempDir;

    #[test]
    fn test_missing_source_fails() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            source_dir: tmp.path().join("missing"),
            destination: DestinationConfig::under(tmp.path()),
            ..Config::default()
        };
        let results = check(&config);
        assert!(!results[0].passed());
        assert_eq!(results.len(), 3);
        assert!(results[1..].iter().all(|r| r.passed()));
    }
}
