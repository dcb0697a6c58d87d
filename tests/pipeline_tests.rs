//! End-to-end pass tests over a temporary source tree.
//!
//! Tests cover:
//! - Unaccounted series and movie directories
//! - Catalog-driven placement without catalog searches
//! - Idempotent re-runs
//! - Settled unaccounted attempts recorded once, outages retried
//! - Deferred disambiguation answered between passes

mod common;

use common::{candidate, link_target, resolver, FakeCatalog, Library, ScriptedDisambiguator};
use media_symlinker::core::disambiguation::{Choice, DeferredDisambiguator};
use media_symlinker::core::store::Store;
use media_symlinker::models::catalog::{CatalogEntry, HierarchyLevel, PendingAnswer, UnaccountedOutcome};
use media_symlinker::models::media::MediaKind;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn show_catalog() -> FakeCatalog {
    FakeCatalog::new()
        .with("The Show Name", vec![candidate("The Show Name", Some(2020), "tt123")])
        .with("Heat", vec![candidate("Heat", Some(1995), "tt0113277")])
}

fn scripted() -> Arc<ScriptedDisambiguator> {
    Arc::new(ScriptedDisambiguator::new(Choice::Index(0)))
}

// ========== UNACCOUNTED ==========

#[tokio::test]
async fn test_series_directory_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let library = Library::new(temp_dir.path());
    let source = library.add_file("The.Show.Name.S01.720p/The.Show.Name.S01E01.720p.mkv", 100);

    let store = Store::open_in_memory().unwrap();
    let catalog = Arc::new(show_catalog());
    let orchestrator = library.orchestrator(&store, resolver(catalog.clone(), scripted(), false));

    let summary = orchestrator.run_pass().await.unwrap();
    assert_eq!(summary.unaccounted_linked, 1);
    assert_eq!(summary.links.created, 1);

    let link = library.dest.join(
        "shows/The Show Name (2020) {imdb-tt123}/Season 01/The Show Name (2020) {imdb-tt123} - S01E01 [720p].mkv",
    );
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(link_target(&link), source.canonicalize().unwrap());

    let records = store.unaccounted().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].dir_name, "The.Show.Name.S01.720p");
    assert_eq!(records[0].outcome, UnaccountedOutcome::Linked);
}

#[tokio::test]
async fn test_movie_directory_links_largest_file_only() {
    let temp_dir = TempDir::new().unwrap();
    let library = Library::new(temp_dir.path());
    let feature = library.add_file("Heat.1995.1080p.BluRay/heat.1080p.mkv", 1000);
    library.add_file("Heat.1995.1080p.BluRay/heat.sample.mkv", 5000);
    library.add_file("Heat.1995.1080p.BluRay/trailer.mkv", 10);

    let store = Store::open_in_memory().unwrap();
    let orchestrator = library.orchestrator(&store, resolver(Arc::new(show_catalog()), scripted(), false));
    let summary = orchestrator.run_pass().await.unwrap();
    assert_eq!(summary.unaccounted_linked, 1);

    let folder = library.dest.join("movies/Heat (1995) {imdb-tt0113277}");
    let names: Vec<String> = fs::read_dir(&folder)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["Heat (1995) {imdb-tt0113277} [1080p].mkv".to_string()]);
    assert_eq!(link_target(&folder.join(&names[0])), feature.canonicalize().unwrap());
}

#[tokio::test]
async fn test_second_pass_changes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let library = Library::new(temp_dir.path());
    library.add_file("The.Show.Name.S01.720p/The.Show.Name.S01E01.720p.mkv", 100);
    library.add_file("The.Show.Name.S01.720p/The.Show.Name.S01E02.720p.mkv", 100);
    library.add_file("Heat.1995.1080p.BluRay/heat.mkv", 1000);

    let store = Store::open_in_memory().unwrap();
    let catalog = Arc::new(show_catalog());
    let orchestrator = library.orchestrator(&store, resolver(catalog.clone(), scripted(), false));

    let first = orchestrator.run_pass().await.unwrap();
    assert_eq!(first.links.created, 3);
    let before = library.snapshot();
    let searches = catalog.calls();

    let second = orchestrator.run_pass().await.unwrap();
    assert_eq!(second.links.linked(), 0);
    assert_eq!(library.snapshot(), before);
    assert_eq!(catalog.calls(), searches);
}

#[tokio::test]
async fn test_rerun_with_fresh_state_only_finds_existing_links() {
    let temp_dir = TempDir::new().unwrap();
    let library = Library::new(temp_dir.path());
    library.add_file("The.Show.Name.S01.720p/The.Show.Name.S01E01.720p.mkv", 100);
    library.add_file("Heat.1995.1080p.BluRay/heat.mkv", 1000);

    let first_store = Store::open_in_memory().unwrap();
    library
        .orchestrator(&first_store, resolver(Arc::new(show_catalog()), scripted(), false))
        .run_pass()
        .await
        .unwrap();
    let before = library.snapshot();

    let second_store = Store::open_in_memory().unwrap();
    let summary = library
        .orchestrator(&second_store, resolver(Arc::new(show_catalog()), scripted(), false))
        .run_pass()
        .await
        .unwrap();

    assert_eq!(summary.links.created, 0);
    assert_eq!(summary.links.renamed, 0);
    assert_eq!(summary.links.existing, 2);
    assert_eq!(library.snapshot(), before);
}

#[tokio::test]
async fn test_unresolved_directory_not_retried() {
    let temp_dir = TempDir::new().unwrap();
    let library = Library::new(temp_dir.path());
    library.add_file("Mystery.Film.2011.720p/mystery.mkv", 100);
    fs::create_dir_all(library.source.join("Empty.Folder")).unwrap();

    let store = Store::open_in_memory().unwrap();
    let catalog = Arc::new(FakeCatalog::new());
    let orchestrator = library.orchestrator(&store, resolver(catalog.clone(), scripted(), false));

    let first = orchestrator.run_pass().await.unwrap();
    assert_eq!(first.unaccounted_unresolved, 1);
    assert_eq!(catalog.calls(), 1);

    let second = orchestrator.run_pass().await.unwrap();
    assert_eq!(second.unaccounted_unresolved, 0);
    assert_eq!(catalog.calls(), 1);

    let records = store.unaccounted().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, UnaccountedOutcome::Unresolved);
    assert!(records[0].error.is_some());
    assert!(library.snapshot().is_empty());
}

#[tokio::test]
async fn test_catalog_outage_retried_next_pass() {
    let temp_dir = TempDir::new().unwrap();
    let library = Library::new(temp_dir.path());
    library.add_file("Heat.1995.1080p/heat.mkv", 100);

    let store = Store::open_in_memory().unwrap();
    let catalog = Arc::new(show_catalog());
    catalog.set_failing(true);
    let orchestrator = library.orchestrator(&store, resolver(catalog.clone(), scripted(), false));

    let first = orchestrator.run_pass().await.unwrap();
    assert_eq!(first.unaccounted_retryable, 1);
    assert_eq!(first.unaccounted_unresolved, 0);
    let records = store.unaccounted().unwrap();
    assert_eq!(records[0].outcome, UnaccountedOutcome::Retryable);
    assert!(!store.accounted_dirs().unwrap().contains("Heat.1995.1080p"));

    catalog.set_failing(false);
    let second = orchestrator.run_pass().await.unwrap();
    assert_eq!(second.unaccounted_linked, 1);
    assert_eq!(store.unaccounted().unwrap()[0].outcome, UnaccountedOutcome::Linked);
    assert!(library
        .dest
        .join("movies/Heat (1995) {imdb-tt0113277}")
        .is_dir());

    let calls = catalog.calls();
    let third = orchestrator.run_pass().await.unwrap();
    assert_eq!(third.unaccounted_linked + third.unaccounted_retryable, 0);
    assert_eq!(catalog.calls(), calls);
}

// ========== CATALOG ==========

fn catalog_episode(key: &str, source_dir_name: &str) -> CatalogEntry {
    CatalogEntry {
        row_id: 0,
        item_key: key.to_string(),
        kind: MediaKind::Series,
        item: HierarchyLevel {
            title: "Pilot".to_string(),
            year: Some(2020),
            id: None,
        },
        parent: None,
        grandparent: Some(HierarchyLevel {
            title: "The Show Name".to_string(),
            year: Some(2020),
            id: Some("imdb-tt123".to_string()),
        }),
        source_dir_name: source_dir_name.to_string(),
        display_title: "The Show Name".to_string(),
        processed_dir: None,
        symlink_path: None,
        error: None,
    }
}

#[tokio::test]
async fn test_catalog_rows_use_their_own_ids() {
    let temp_dir = TempDir::new().unwrap();
    let library = Library::new(temp_dir.path());
    library.add_file("The.Show.Name.S01.720p/The.Show.Name.S01E01.720p.mkv", 100);

    let store = Store::open_in_memory().unwrap();
    store
        .upsert_entry(&catalog_episode("show-s01e01", "The.Show.Name.S01.720p"))
        .unwrap();
    store
        .upsert_entry(&catalog_episode("other-s01e01", "Another.Show.2019"))
        .unwrap();

    let catalog = Arc::new(FakeCatalog::new());
    let orchestrator = library.orchestrator(&store, resolver(catalog.clone(), scripted(), false));
    let summary = orchestrator.run_pass().await.unwrap();

    assert_eq!(summary.catalog_placed, 1);
    assert_eq!(summary.catalog_missing, 1);
    assert_eq!(summary.unaccounted_linked, 0);
    assert_eq!(catalog.calls(), 0);
    assert!(library
        .dest
        .join("shows/The Show Name (2020) {imdb-tt123}/Season 01")
        .is_dir());

    let entries = store.entries().unwrap();
    assert_eq!(entries[0].processed_dir.as_deref(), Some("The.Show.Name.S01.720p"));
    assert!(entries[0].symlink_path.is_some());
    assert!(entries[1].is_pending());
    assert!(entries[1].error.is_some());

    // The placed row is done; the directory is not picked up as unaccounted.
    let second = orchestrator.run_pass().await.unwrap();
    assert_eq!(second.catalog_placed, 0);
    assert_eq!(second.unaccounted_linked + second.unaccounted_unresolved, 0);
    assert!(store.unaccounted().unwrap().is_empty());
}

// ========== DEFERRED ==========

#[tokio::test]
async fn test_deferred_title_placed_after_answer() {
    let temp_dir = TempDir::new().unwrap();
    let library = Library::new(temp_dir.path());
    library.add_file("Office.S01/Office.S01E01.mkv", 100);

    let store = Store::open_in_memory().unwrap();
    let catalog = Arc::new(FakeCatalog::new().with(
        "Office",
        vec![
            candidate("The Office US", Some(2005), "tt0386676"),
            candidate("The Office UK", Some(2001), "tt0290978"),
        ],
    ));
    let deferred = Arc::new(DeferredDisambiguator::new(store.clone()));

    let orchestrator = library.orchestrator(&store, resolver(catalog, deferred, false));

    let first = orchestrator.run_pass().await.unwrap();
    assert_eq!(first.unaccounted_unresolved, 1);
    assert!(library.snapshot().is_empty());

    let pending = store.pending_matches().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].title, "Office");
    store.answer_pending(pending[0].id, &PendingAnswer::Index(1)).unwrap();

    let second = orchestrator.run_pass().await.unwrap();
    assert_eq!(second.unaccounted_linked, 1);
    assert!(library
        .dest
        .join("shows/The Office UK (2001) {imdb-tt0290978}/Season 01/The Office UK (2001) {imdb-tt0290978} - S01E01.mkv")
        .exists());
}
