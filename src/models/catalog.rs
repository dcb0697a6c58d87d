//! Records persisted by the state store.

use super::media::{Candidate, ExternalId, MediaKind};
use serde::{Deserialize, Serialize};

/// Title, year and id at one level of the episode → season → series hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyLevel {
    pub title: String,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub id: Option<String>,
}

/// One known source item from the upstream catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Row id (0 before insertion).
    #[serde(default)]
    pub row_id: i64,
    /// Upstream identity of the item.
    pub item_key: String,
    /// Movie or series.
    pub kind: MediaKind,
    /// Item level (movie, or episode).
    pub item: HierarchyLevel,
    /// Parent level (season).
    #[serde(default)]
    pub parent: Option<HierarchyLevel>,
    /// Grandparent level (series).
    #[serde(default)]
    pub grandparent: Option<HierarchyLevel>,
    /// Original source directory name.
    pub source_dir_name: String,
    /// Display title reported upstream.
    #[serde(default)]
    pub display_title: String,
    /// Source directory the last materialization used.
    #[serde(default)]
    pub processed_dir: Option<String>,
    /// Last symlink (or show folder) written for this item.
    #[serde(default)]
    pub symlink_path: Option<String>,
    /// Error recorded by the last attempt.
    #[serde(default)]
    pub error: Option<String>,
}

impl CatalogEntry {
    /// Whether the row still needs a materialization attempt.
    pub fn is_pending(&self) -> bool {
        self.processed_dir.as_deref().unwrap_or("").is_empty()
    }

    /// Outermost level available: grandparent, then parent, then item.
    pub fn base_level(&self) -> &HierarchyLevel {
        self.grandparent
            .as_ref()
            .filter(|l| !l.title.is_empty())
            .or_else(|| self.parent.as_ref().filter(|l| !l.title.is_empty()))
            .unwrap_or(&self.item)
    }

    /// Outermost namespaced id available.
    pub fn base_id(&self) -> Option<ExternalId> {
        [self.grandparent.as_ref(), self.parent.as_ref(), Some(&self.item)]
            .into_iter()
            .flatten()
            .filter_map(|l| l.id.as_deref())
            .find_map(ExternalId::parse)
    }
}

/// Outcome of an unaccounted directory attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnaccountedOutcome {
    Linked,
    Unresolved,
    /// The catalog service could not be reached; tried again next pass.
    Retryable,
    Failed,
}

impl UnaccountedOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaccountedOutcome::Linked => "linked",
            UnaccountedOutcome::Unresolved => "unresolved",
            UnaccountedOutcome::Retryable => "retryable",
            UnaccountedOutcome::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "linked" => UnaccountedOutcome::Linked,
            "unresolved" => UnaccountedOutcome::Unresolved,
            "retryable" => UnaccountedOutcome::Retryable,
            _ => UnaccountedOutcome::Failed,
        }
    }
}

/// A processed source directory that had no catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnaccountedRecord {
    pub dir_name: String,
    pub outcome: UnaccountedOutcome,
    pub error: Option<String>,
    pub processed_at: String,
}

/// A symlink created by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub source: String,
    pub destination: String,
    pub media_id: Option<String>,
    pub year: Option<u16>,
    pub symlink_folder: String,
    pub symlink_filename: String,
}

/// Answer to a deferred disambiguation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "value")]
pub enum PendingAnswer {
    /// Zero-based index into the shortlist.
    Index(usize),
    /// Direct namespaced id.
    Id(ExternalId),
}

impl PendingAnswer {
    /// Parse a user answer: a one-based index or a namespaced id.
    pub fn parse(input: &str, shortlist_len: usize) -> Option<Self> {
        let input = input.trim();
        if let Ok(n) = input.parse::<usize>() {
            return (1..=shortlist_len)
                .contains(&n)
                .then_some(PendingAnswer::Index(n - 1));
        }
        ExternalId::parse(input).map(PendingAnswer::Id)
    }
}

/// An ambiguous title waiting for human review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMatch {
    pub id: i64,
    pub title: String,
    pub year: Option<u16>,
    pub kind: MediaKind,
    pub shortlist: Vec<Candidate>,
    pub answer: Option<PendingAnswer>,
    pub created_at: String,
}
