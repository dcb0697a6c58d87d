//! Pass orchestration.
//!
//! A pass has two phases:
//! 1. Catalog-driven: every unprocessed catalog row is matched to a source
//!    directory and placed using the ids the catalog already carries
//! 2. Unaccounted: every remaining source directory goes through the
//!    unaccounted handler
//!
//! Per-item failures are logged and recorded; only state store failures end
//! the pass early.

use crate::core::linker::Materializer;
use crate::core::parser;
use crate::core::placement::{self, PlacementReport};
use crate::core::resolver::Resolver;
use crate::core::scanner;
use crate::core::store::Store;
use crate::core::unaccounted::UnaccountedHandler;
use crate::error::ResolutionFailure;
use crate::models::catalog::{CatalogEntry, UnaccountedOutcome};
use crate::models::media::{MediaKind, ResolvedMedia, SourceItem};
use crate::services::ffprobe::MediaProbe;
use crate::utils::similarity;
use crate::Result;
use colored::Colorize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Similarity needed to match a catalog row to a differently-named directory.
pub const DIRECTORY_MATCH_THRESHOLD: f64 = 0.8;

/// Totals for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub catalog_placed: usize,
    pub catalog_failed: usize,
    pub catalog_missing: usize,
    pub unaccounted_linked: usize,
    pub unaccounted_unresolved: usize,
    pub unaccounted_retryable: usize,
    pub unaccounted_failed: usize,
    pub links: PlacementReport,
    pub cancelled: bool,
}

impl PassSummary {
    /// Print a colored summary to stdout.
    pub fn print(&self) {
        println!();
        println!("{}", "Pass complete".bold());
        println!(
            "  Catalog:     {} placed, {} failed, {} without source",
            self.catalog_placed.to_string().green(),
            self.catalog_failed.to_string().red(),
            self.catalog_missing.to_string().yellow()
        );
        println!(
            "  Unaccounted: {} linked, {} unresolved, {} retry next pass, {} failed",
            self.unaccounted_linked.to_string().green(),
            self.unaccounted_unresolved.to_string().yellow(),
            self.unaccounted_retryable.to_string().yellow(),
            self.unaccounted_failed.to_string().red()
        );
        println!(
            "  Links:       {} created, {} existing, {} renamed, {} skipped, {} failed",
            self.links.created.to_string().green(),
            self.links.existing,
            self.links.renamed.to_string().yellow(),
            self.links.skipped.to_string().yellow(),
            self.links.failed.to_string().red()
        );
        if self.cancelled {
            println!("  {}", "Cancelled before completion".yellow());
        }
    }
}

fn dir_key(name: &str) -> String {
    similarity::normalize_title(&parser::normalize_separators(name))
}

/// Best source directory for a catalog row: exact name, then normalized
/// name, then the most similar name at or above the threshold.
pub fn find_best_match<'a>(entry: &CatalogEntry, dirs: &'a [SourceItem]) -> Option<&'a SourceItem> {
    let targets: Vec<&str> = [
        entry.source_dir_name.as_str(),
        entry.display_title.as_str(),
        entry.base_level().title.as_str(),
    ]
    .into_iter()
    .filter(|t| !t.is_empty())
    .collect();

    for target in &targets {
        if let Some(dir) = dirs.iter().find(|d| d.name == *target) {
            return Some(dir);
        }
    }

    for target in &targets {
        let wanted = dir_key(target);
        if let Some(dir) = dirs.iter().find(|d| dir_key(&d.name) == wanted) {
            return Some(dir);
        }
    }

    targets
        .iter()
        .flat_map(|target| {
            let wanted = dir_key(target);
            dirs.iter()
                .map(move |d| (d, similarity::ratio(&wanted, &dir_key(&d.name))))
        })
        .filter(|(_, score)| *score >= DIRECTORY_MATCH_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(d, _)| d)
}

/// Runs passes over the source root.
pub struct Orchestrator {
    source_dir: std::path::PathBuf,
    store: Store,
    resolver: Resolver,
    materializer: Materializer,
    probe: Arc<dyn MediaProbe>,
    cancel: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        source_dir: &Path,
        store: Store,
        resolver: Resolver,
        materializer: Materializer,
        probe: Arc<dyn MediaProbe>,
    ) -> Self {
        Self {
            source_dir: source_dir.to_path_buf(),
            store,
            resolver,
            materializer,
            probe,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between items; set it to stop the pass early.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Run one full pass.
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let scan = scanner::scan_source_root(&self.source_dir)?;
        self.resolver.begin_pass()?;
        let mut summary = PassSummary::default();
        let mut claimed: HashSet<String> = HashSet::new();

        self.catalog_pass(&scan.directories, &mut claimed, &mut summary)
            .await?;
        if !summary.cancelled {
            self.unaccounted_pass(&scan.directories, &claimed, &mut summary)
                .await?;
        }
        for file in &scan.loose_files {
            tracing::debug!("Loose file in source root not handled: {:?}", file);
        }

        tracing::info!(
            catalog_placed = summary.catalog_placed,
            unaccounted_linked = summary.unaccounted_linked,
            links_created = summary.links.created,
            "Pass finished"
        );
        Ok(summary)
    }

    async fn catalog_pass(
        &self,
        dirs: &[SourceItem],
        claimed: &mut HashSet<String>,
        summary: &mut PassSummary,
    ) -> Result<()> {
        let entries = self.store.pending_entries()?;
        if !entries.is_empty() {
            tracing::info!("{} catalog rows to process", entries.len());
        }

        for entry in entries {
            if self.cancelled() {
                summary.cancelled = true;
                return Ok(());
            }

            let Some(dir) = find_best_match(&entry, dirs) else {
                tracing::debug!("No source directory for catalog row {}", entry.item_key);
                self.store
                    .mark_entry_failed(entry.row_id, "source directory not found")?;
                summary.catalog_missing += 1;
                continue;
            };
            claimed.insert(dir.name.clone());

            match self.place_entry(&entry, &dir.path).await {
                Ok(report) if report.linked() > 0 => {
                    let symlink = report
                        .last_destination
                        .as_ref()
                        .map(|p| p.display().to_string());
                    self.store
                        .mark_entry_processed(entry.row_id, &dir.name, symlink.as_deref())?;
                    summary.links.merge(&report);
                    summary.catalog_placed += 1;
                }
                Ok(report) => {
                    summary.links.merge(&report);
                    self.store
                        .mark_entry_failed(entry.row_id, "no links placed")?;
                    summary.catalog_failed += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(item = %entry.item_key, dir = %dir.name, "Catalog row not placed: {}", e);
                    self.store.mark_entry_failed(entry.row_id, &e.to_string())?;
                    summary.catalog_failed += 1;
                }
            }
        }
        Ok(())
    }

    /// Identity for a catalog row: the row's own ids when present, otherwise
    /// a resolver lookup of the base title.
    async fn entry_media(&self, entry: &CatalogEntry) -> Result<ResolvedMedia> {
        let base = entry.base_level();
        if let Some(id) = entry.base_id() {
            let root = self.resolver.route(entry.kind, &id).await;
            return Ok(ResolvedMedia {
                title: base.title.clone(),
                year: base.year,
                id: Some(id),
                kind: entry.kind,
                root,
            });
        }

        let media = self
            .resolver
            .resolve(&base.title, base.year, entry.kind)
            .await?;
        if !media.is_identified() {
            return Err(ResolutionFailure::NoCandidates(base.title.clone()).into());
        }
        Ok(media)
    }

    async fn place_entry(&self, entry: &CatalogEntry, dir: &Path) -> Result<PlacementReport> {
        let media = self.entry_media(entry).await?;
        match entry.kind {
            MediaKind::Series => {
                placement::place_series(&self.materializer, self.probe.as_ref(), &media, dir)
            }
            MediaKind::Movie => {
                placement::place_movie(&self.materializer, self.probe.as_ref(), &media, dir)
            }
        }
    }

    async fn unaccounted_pass(
        &self,
        dirs: &[SourceItem],
        claimed: &HashSet<String>,
        summary: &mut PassSummary,
    ) -> Result<()> {
        let accounted = self.store.accounted_dirs()?;
        let remaining: Vec<&SourceItem> = dirs
            .iter()
            .filter(|d| !accounted.contains(&d.name) && !claimed.contains(&d.name))
            .collect();
        if remaining.is_empty() {
            return Ok(());
        }
        tracing::info!("{} unaccounted directories", remaining.len());

        let handler = UnaccountedHandler {
            store: &self.store,
            resolver: &self.resolver,
            materializer: &self.materializer,
            probe: self.probe.as_ref(),
        };

        for dir in remaining {
            if self.cancelled() {
                summary.cancelled = true;
                return Ok(());
            }
            let (outcome, report) = handler.handle(&dir.path).await?;
            summary.links.merge(&report);
            match outcome {
                UnaccountedOutcome::Linked => summary.unaccounted_linked += 1,
                UnaccountedOutcome::Unresolved => summary.unaccounted_unresolved += 1,
                UnaccountedOutcome::Retryable => summary.unaccounted_retryable += 1,
                UnaccountedOutcome::Failed => summary.unaccounted_failed += 1,
            }
        }
        Ok(())
    }
}
