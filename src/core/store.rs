//! SQLite-backed catalog and state store.
//!
//! Owns every durable record: upstream catalog rows and their processing
//! outcome, unaccounted directory attempts, created links, ignored sources and
//! queued disambiguations. Each public method is one critical section over a
//! single connection; multi-statement writes run inside a transaction.

use crate::models::catalog::{
    CatalogEntry, HierarchyLevel, LinkRecord, PendingAnswer, PendingMatch, UnaccountedOutcome,
    UnaccountedRecord,
};
use crate::models::media::{Candidate, MediaKind};
use crate::utils::similarity;
use crate::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS catalog (
    row_id            INTEGER PRIMARY KEY AUTOINCREMENT,
    item_key          TEXT NOT NULL UNIQUE,
    kind              TEXT NOT NULL,
    title             TEXT NOT NULL,
    year              INTEGER,
    item_id           TEXT,
    parent_title      TEXT,
    parent_year       INTEGER,
    parent_id         TEXT,
    grandparent_title TEXT,
    grandparent_year  INTEGER,
    grandparent_id    TEXT,
    source_dir_name   TEXT NOT NULL,
    display_title     TEXT NOT NULL DEFAULT '',
    processed_dir     TEXT,
    symlink_path      TEXT,
    error             TEXT,
    updated_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS unaccounted (
    dir_name     TEXT PRIMARY KEY,
    outcome      TEXT NOT NULL,
    error        TEXT,
    processed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS links (
    source           TEXT PRIMARY KEY,
    destination      TEXT NOT NULL,
    media_id         TEXT,
    year             INTEGER,
    symlink_folder   TEXT NOT NULL,
    symlink_filename TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ignored (
    path       TEXT PRIMARY KEY,
    reason     TEXT NOT NULL,
    ignored_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pending (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    title_key  TEXT NOT NULL,
    title      TEXT NOT NULL,
    year       INTEGER,
    kind       TEXT NOT NULL,
    shortlist  TEXT NOT NULL,
    answer     TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS pending_lookup ON pending (title_key, kind);
"#;

/// Row counts for `status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub catalog_total: usize,
    pub catalog_pending: usize,
    pub unaccounted: usize,
    pub links: usize,
    pub ignored: usize,
    pub pending_matches: usize,
}

/// Durable state store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn kind_column(row: &Row, idx: usize) -> rusqlite::Result<MediaKind> {
    let raw: String = row.get(idx)?;
    MediaKind::parse(&raw).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(idx, raw, rusqlite::types::Type::Text)
    })
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn level_columns(row: &Row, start: usize) -> rusqlite::Result<Option<HierarchyLevel>> {
    let title: Option<String> = row.get(start)?;
    Ok(match title {
        Some(title) => Some(HierarchyLevel {
            title,
            year: row.get(start + 1)?,
            id: row.get(start + 2)?,
        }),
        None => None,
    })
}

const CATALOG_COLUMNS: &str = "row_id, item_key, kind, title, year, item_id, \
     parent_title, parent_year, parent_id, grandparent_title, grandparent_year, grandparent_id, \
     source_dir_name, display_title, processed_dir, symlink_path, error";

fn catalog_row(row: &Row) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        row_id: row.get(0)?,
        item_key: row.get(1)?,
        kind: kind_column(row, 2)?,
        item: HierarchyLevel {
            title: row.get(3)?,
            year: row.get(4)?,
            id: row.get(5)?,
        },
        parent: level_columns(row, 6)?,
        grandparent: level_columns(row, 9)?,
        source_dir_name: row.get(12)?,
        display_title: row.get(13)?,
        processed_dir: row.get(14)?,
        symlink_path: row.get(15)?,
        error: row.get(16)?,
    })
}

const PENDING_COLUMNS: &str = "id, title, year, kind, shortlist, answer, created_at";

fn pending_row(row: &Row) -> rusqlite::Result<PendingMatch> {
    let answer: Option<String> = row.get(5)?;
    let answer = match answer {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };
    Ok(PendingMatch {
        id: row.get(0)?,
        title: row.get(1)?,
        year: row.get(2)?,
        kind: kind_column(row, 3)?,
        shortlist: json_column(row, 4)?,
        answer,
        created_at: row.get(6)?,
    })
}

impl Store {
    /// Open (or create) the database file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// In-memory database, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| crate::Error::StoreLock)
    }

    // =========================================================================
    // Catalog rows
    // =========================================================================

    /// Insert or refresh an upstream catalog row.
    ///
    /// Processed fields of an existing row are left untouched.
    pub fn upsert_entry(&self, entry: &CatalogEntry) -> Result<i64> {
        let conn = self.lock()?;
        let parent = entry.parent.clone().unwrap_or_default();
        let grandparent = entry.grandparent.clone().unwrap_or_default();
        let opt = |l: &Option<HierarchyLevel>, s: String| l.as_ref().map(|_| s);

        conn.execute(
            "INSERT INTO catalog (item_key, kind, title, year, item_id, \
                 parent_title, parent_year, parent_id, grandparent_title, grandparent_year, grandparent_id, \
                 source_dir_name, display_title, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) \
             ON CONFLICT(item_key) DO UPDATE SET \
                 kind = excluded.kind, title = excluded.title, year = excluded.year, \
                 item_id = excluded.item_id, parent_title = excluded.parent_title, \
                 parent_year = excluded.parent_year, parent_id = excluded.parent_id, \
                 grandparent_title = excluded.grandparent_title, \
                 grandparent_year = excluded.grandparent_year, \
                 grandparent_id = excluded.grandparent_id, \
                 source_dir_name = excluded.source_dir_name, \
                 display_title = excluded.display_title, updated_at = excluded.updated_at",
            params![
                entry.item_key,
                entry.kind.as_str(),
                entry.item.title,
                entry.item.year,
                entry.item.id,
                opt(&entry.parent, parent.title),
                parent.year,
                parent.id,
                opt(&entry.grandparent, grandparent.title),
                grandparent.year,
                grandparent.id,
                entry.source_dir_name,
                entry.display_title,
                now(),
            ],
        )?;

        let row_id = conn.query_row(
            "SELECT row_id FROM catalog WHERE item_key = ?1",
            params![entry.item_key],
            |r| r.get(0),
        )?;
        Ok(row_id)
    }

    /// All catalog rows.
    pub fn entries(&self) -> Result<Vec<CatalogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM catalog ORDER BY row_id",
            CATALOG_COLUMNS
        ))?;
        let rows = stmt.query_map([], catalog_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Rows with empty processed fields.
    pub fn pending_entries(&self) -> Result<Vec<CatalogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM catalog WHERE processed_dir IS NULL OR processed_dir = '' ORDER BY row_id",
            CATALOG_COLUMNS
        ))?;
        let rows = stmt.query_map([], catalog_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Record a materialization attempt that linked the row.
    pub fn mark_entry_processed(
        &self,
        row_id: i64,
        processed_dir: &str,
        symlink_path: Option<&str>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE catalog SET processed_dir = ?1, symlink_path = COALESCE(?2, symlink_path), \
                 error = NULL, updated_at = ?3 WHERE row_id = ?4",
            params![processed_dir, symlink_path, now(), row_id],
        )?;
        Ok(())
    }

    /// Record a failed attempt. The row stays eligible for reprocessing.
    pub fn mark_entry_failed(&self, row_id: i64, error: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE catalog SET error = ?1, updated_at = ?2 WHERE row_id = ?3",
            params![error, now(), row_id],
        )?;
        Ok(())
    }

    /// Source directory names already represented by a processed row or a
    /// settled unaccounted attempt. Retryable attempts are left out.
    pub fn accounted_dirs(&self) -> Result<HashSet<String>> {
        let conn = self.lock()?;
        let mut dirs = HashSet::new();

        let mut stmt = conn.prepare(
            "SELECT processed_dir FROM catalog WHERE processed_dir IS NOT NULL AND processed_dir != '' \
             UNION SELECT dir_name FROM unaccounted WHERE outcome != ?1",
        )?;
        let rows = stmt.query_map(params![UnaccountedOutcome::Retryable.as_str()], |r| {
            r.get::<_, String>(0)
        })?;
        for dir in rows {
            dirs.insert(dir?);
        }
        Ok(dirs)
    }

    // =========================================================================
    // Unaccounted directories
    // =========================================================================

    /// Mark an unaccounted directory as processed for this attempt.
    pub fn record_unaccounted(
        &self,
        dir_name: &str,
        outcome: UnaccountedOutcome,
        error: Option<&str>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO unaccounted (dir_name, outcome, error, processed_at) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(dir_name) DO UPDATE SET outcome = excluded.outcome, \
                 error = excluded.error, processed_at = excluded.processed_at",
            params![dir_name, outcome.as_str(), error, now()],
        )?;
        Ok(())
    }

    /// All unaccounted directory records.
    pub fn unaccounted(&self) -> Result<Vec<UnaccountedRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT dir_name, outcome, error, processed_at FROM unaccounted ORDER BY dir_name",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(UnaccountedRecord {
                dir_name: r.get(0)?,
                outcome: UnaccountedOutcome::parse(&r.get::<_, String>(1)?),
                error: r.get(2)?,
                processed_at: r.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // =========================================================================
    // Links and ignored sources
    // =========================================================================

    /// Remember a created link.
    pub fn record_link(&self, link: &LinkRecord) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO links (source, destination, media_id, year, symlink_folder, symlink_filename, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(source) DO UPDATE SET destination = excluded.destination, \
                 media_id = excluded.media_id, year = excluded.year, \
                 symlink_folder = excluded.symlink_folder, symlink_filename = excluded.symlink_filename",
            params![
                link.source,
                link.destination,
                link.media_id,
                link.year,
                link.symlink_folder,
                link.symlink_filename,
                now(),
            ],
        )?;
        Ok(())
    }

    /// All created links.
    pub fn links(&self) -> Result<Vec<LinkRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT source, destination, media_id, year, symlink_folder, symlink_filename \
             FROM links ORDER BY destination",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(LinkRecord {
                source: r.get(0)?,
                destination: r.get(1)?,
                media_id: r.get(2)?,
                year: r.get(3)?,
                symlink_folder: r.get(4)?,
                symlink_filename: r.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Flag a source whose destination is occupied by a regular file.
    pub fn mark_ignored(&self, path: &str, reason: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO ignored (path, reason, ignored_at) VALUES (?1, ?2, ?3)",
            params![path, reason, now()],
        )?;
        Ok(())
    }

    pub fn is_ignored(&self, path: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM ignored WHERE path = ?1", params![path], |r| {
                r.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    // =========================================================================
    // Deferred disambiguation
    // =========================================================================

    /// Queue an ambiguous title. An existing unanswered entry for the same
    /// query is reused.
    pub fn queue_pending(
        &self,
        title: &str,
        year: Option<u16>,
        kind: MediaKind,
        shortlist: &[Candidate],
    ) -> Result<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let key = similarity::normalize_title(title);

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM pending WHERE title_key = ?1 AND kind = ?2 AND year IS ?3 \
                 AND answer IS NULL",
                params![key, kind.as_str(), year],
                |r| r.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                tx.execute(
                    "INSERT INTO pending (title_key, title, year, kind, shortlist, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        key,
                        title,
                        year,
                        kind.as_str(),
                        serde_json::to_string(shortlist)?,
                        now()
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };
        tx.commit()?;
        Ok(id)
    }

    /// Most recent answered entry for a query.
    pub fn answered_pending(
        &self,
        title: &str,
        year: Option<u16>,
        kind: MediaKind,
    ) -> Result<Option<PendingMatch>> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                &format!(
                    "SELECT {} FROM pending WHERE title_key = ?1 AND kind = ?2 AND year IS ?3 \
                     AND answer IS NOT NULL ORDER BY id DESC LIMIT 1",
                    PENDING_COLUMNS
                ),
                params![similarity::normalize_title(title), kind.as_str(), year],
                pending_row,
            )
            .optional()?;
        Ok(found)
    }

    /// Unanswered entries.
    pub fn pending_matches(&self) -> Result<Vec<PendingMatch>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM pending WHERE answer IS NULL ORDER BY id",
            PENDING_COLUMNS
        ))?;
        let rows = stmt.query_map([], pending_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_pending(&self, id: i64) -> Result<Option<PendingMatch>> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                &format!("SELECT {} FROM pending WHERE id = ?1", PENDING_COLUMNS),
                params![id],
                pending_row,
            )
            .optional()?;
        Ok(found)
    }

    /// Store an answer and re-open unresolved unaccounted directories so the
    /// next pass applies it.
    pub fn answer_pending(&self, id: i64, answer: &PendingAnswer) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE pending SET answer = ?1 WHERE id = ?2",
            params![serde_json::to_string(answer)?, id],
        )?;
        if updated > 0 {
            tx.execute(
                "DELETE FROM unaccounted WHERE outcome = ?1",
                params![UnaccountedOutcome::Unresolved.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(updated > 0)
    }

    // =========================================================================
    // Stats
    // =========================================================================

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;
        let count = |sql: &str| -> rusqlite::Result<usize> {
            conn.query_row(sql, [], |r| r.get::<_, i64>(0))
                .map(|n| n as usize)
        };
        Ok(StoreStats {
            catalog_total: count("SELECT COUNT(*) FROM catalog")?,
            catalog_pending: count(
                "SELECT COUNT(*) FROM catalog WHERE processed_dir IS NULL OR processed_dir = ''",
            )?,
            unaccounted: count("SELECT COUNT(*) FROM unaccounted")?,
            links: count("SELECT COUNT(*) FROM links")?,
            ignored: count("SELECT COUNT(*) FROM ignored")?,
            pending_matches: count("SELECT COUNT(*) FROM pending WHERE answer IS NULL")?,
        })
    }
}
