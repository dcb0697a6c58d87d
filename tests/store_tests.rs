//! Integration tests for the on-disk state store.
//!
//! Tests cover:
//! - Persistence across reopen
//! - Catalog row lifecycle
//! - Pending disambiguation queue
//! - Store statistics

mod common;

use common::candidate;
use media_symlinker::core::store::Store;
use media_symlinker::models::catalog::{CatalogEntry, HierarchyLevel, PendingAnswer, UnaccountedOutcome};
use media_symlinker::models::media::{ExternalId, MediaKind};
use tempfile::TempDir;

fn episode_entry(key: &str) -> CatalogEntry {
    CatalogEntry {
        row_id: 0,
        item_key: key.to_string(),
        kind: MediaKind::Series,
        item: HierarchyLevel {
            title: "Pilot".to_string(),
            year: Some(2008),
            id: None,
        },
        parent: Some(HierarchyLevel {
            title: "Season 1".to_string(),
            year: Some(2008),
            id: None,
        }),
        grandparent: Some(HierarchyLevel {
            title: "Breaking Bad".to_string(),
            year: Some(2008),
            id: Some("imdb-tt0903747".to_string()),
        }),
        source_dir_name: "Breaking.Bad.S01.1080p".to_string(),
        display_title: "Breaking Bad".to_string(),
        processed_dir: None,
        symlink_path: None,
        error: None,
    }
}

#[test]
fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("state/media_symlinker.db");

    {
        let store = Store::open(&db).unwrap();
        let row_id = store.upsert_entry(&episode_entry("bb-s01e01")).unwrap();
        store
            .mark_entry_processed(row_id, "Breaking.Bad.S01.1080p", Some("/dest/shows/Breaking Bad"))
            .unwrap();
        store
            .record_unaccounted("Unknown.Thing", UnaccountedOutcome::Unresolved, Some("no catalog candidates"))
            .unwrap();
        store
            .record_unaccounted("Heat.1995", UnaccountedOutcome::Retryable, Some("timed out"))
            .unwrap();
        store.mark_ignored("/src/a.mkv", "destination occupied").unwrap();
    }

    let store = Store::open(&db).unwrap();
    let entries = store.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].base_level().title, "Breaking Bad");
    assert_eq!(entries[0].base_id(), Some(ExternalId::imdb("tt0903747")));
    assert_eq!(entries[0].processed_dir.as_deref(), Some("Breaking.Bad.S01.1080p"));
    assert!(store.pending_entries().unwrap().is_empty());
    assert!(store.is_ignored("/src/a.mkv").unwrap());

    let accounted = store.accounted_dirs().unwrap();
    assert!(accounted.contains("Breaking.Bad.S01.1080p"));
    assert!(accounted.contains("Unknown.Thing"));
    assert!(!accounted.contains("Heat.1995"));
    assert_eq!(store.unaccounted().unwrap()[0].outcome, UnaccountedOutcome::Retryable);
}

#[test]
fn test_reimport_keeps_processed_state() {
    let store = Store::open_in_memory().unwrap();
    let row_id = store.upsert_entry(&episode_entry("bb-s01e01")).unwrap();
    store.mark_entry_processed(row_id, "Breaking.Bad.S01.1080p", None).unwrap();

    let mut refreshed = episode_entry("bb-s01e01");
    refreshed.display_title = "Breaking Bad (2008)".to_string();
    assert_eq!(store.upsert_entry(&refreshed).unwrap(), row_id);

    let entries = store.entries().unwrap();
    assert_eq!(entries[0].display_title, "Breaking Bad (2008)");
    assert!(!entries[0].is_pending());
}

#[test]
fn test_pending_answer_reopens_unresolved_dirs() {
    let store = Store::open_in_memory().unwrap();
    let shortlist = vec![
        candidate("The Office US", Some(2005), "tt0386676"),
        candidate("The Office UK", Some(2001), "tt0290978"),
    ];
    let id = store.queue_pending("Office", None, MediaKind::Series, &shortlist).unwrap();
    store
        .record_unaccounted("Office.S01", UnaccountedOutcome::Unresolved, Some("ambiguous"))
        .unwrap();
    store.record_unaccounted("Heat.1995", UnaccountedOutcome::Linked, None).unwrap();

    let answer = PendingAnswer::parse("imdb-tt0290978", shortlist.len()).unwrap();
    assert!(store.answer_pending(id, &answer).unwrap());
    assert!(!store.answer_pending(id + 100, &answer).unwrap());

    let accounted = store.accounted_dirs().unwrap();
    assert!(!accounted.contains("Office.S01"));
    assert!(accounted.contains("Heat.1995"));

    let answered = store.answered_pending("office", None, MediaKind::Series).unwrap().unwrap();
    assert_eq!(answered.answer, Some(PendingAnswer::Id(ExternalId::imdb("tt0290978"))));
}

#[test]
fn test_stats() {
    let store = Store::open_in_memory().unwrap();
    store.upsert_entry(&episode_entry("a")).unwrap();
    store.upsert_entry(&episode_entry("b")).unwrap();
    store.record_unaccounted("X", UnaccountedOutcome::Failed, Some("boom")).unwrap();
    store
        .queue_pending("Office", None, MediaKind::Series, &[candidate("The Office", None, "tt1")])
        .unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.catalog_total, 2);
    assert_eq!(stats.catalog_pending, 2);
    assert_eq!(stats.unaccounted, 1);
    assert_eq!(stats.links, 0);
    assert_eq!(stats.ignored, 0);
    assert_eq!(stats.pending_matches, 1);
}
