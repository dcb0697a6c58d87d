//! `catalog` command implementation.

use crate::cli::args::CatalogAction;
use crate::core::store::Store;
use crate::models::catalog::CatalogEntry;
use crate::models::config::Config;
use anyhow::{Context, Result};
use colored::Colorize;
use serde::Deserialize;
use std::path::Path;

/// Accepted file shapes: a bare array, or `{"entries": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Entries(Vec<CatalogEntry>),
    Wrapped { entries: Vec<CatalogEntry> },
}

impl CatalogFile {
    fn into_entries(self) -> Vec<CatalogEntry> {
        match self {
            CatalogFile::Entries(entries) | CatalogFile::Wrapped { entries } => entries,
        }
    }
}

/// Execute catalog subcommand.
pub async fn execute_catalog(action: CatalogAction, config: &Config) -> Result<()> {
    match action {
        CatalogAction::Import { file } => import(&file, config),
    }
}

/// Parse a catalog file.
pub fn read_catalog_file(path: &Path) -> Result<Vec<CatalogEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed: CatalogFile = serde_json::from_str(&content)
        .with_context(|| format!("Invalid catalog file {}", path.display()))?;
    Ok(parsed.into_entries())
}

fn import(path: &Path, config: &Config) -> Result<()> {
    let entries = read_catalog_file(path)?;
    let store = Store::open(&config.database_path)?;

    let mut imported = 0;
    for entry in &entries {
        if entry.item_key.is_empty() || entry.source_dir_name.is_empty() {
            tracing::warn!("Skipping catalog row without key or source directory");
            continue;
        }
        store.upsert_entry(entry)?;
        imported += 1;
    }

    println!(
        "{} {} of {} rows from {}",
        "Imported".green().bold(),
        imported,
        entries.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_catalog_file_shapes() {
        let tmp = TempDir::new().unwrap();
        let row = r#"{"item_key":"a","kind":"episode","item":{"title":"Pilot"},
            "grandparent":{"title":"Breaking Bad","year":2008,"id":"imdb-tt0903747"},
            "source_dir_name":"Breaking.Bad.S01"}"#;

        let bare = tmp.path().join("bare.json");
        std::fs::write(&bare, format!("[{}]", row)).unwrap();
        let wrapped = tmp.path().join("wrapped.json");
        std::fs::write(&wrapped, format!(r#"{{"entries":[{}]}}"#, row)).unwrap();

        for path in [bare, wrapped] {
            let entries = read_catalog_file(&path).unwrap();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].base_level().title, "Breaking Bad");
        }
    }
}
