//! Domain models for archival passes.
//!
//! # Design
//! - Items and reports are plain values; no IO handles are embedded.
//! - Per-item failures are data, aggregated into reports rather than raised.

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Filesystem entry type of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Regular file.
    File,
    /// Directory tracked as one opaque unit.
    Directory,
    /// Symbolic link; never followed.
    Symlink,
}

/// A named entry tracked as one unit for moves and eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    /// `/`-separated path relative to the containing location.
    pub identifier: String,
    /// Storage consumed; recursive for directories.
    pub size_bytes: u64,
    /// Modification time observed at scan time.
    pub age_marker: DateTime<Utc>,
    /// Entry type.
    pub kind: ItemKind,
}

impl Item {
    /// Absolute path of the item inside `location`.
    #[must_use]
    pub fn path_in(&self, location: &Path) -> PathBuf {
        self.identifier
            .split('/')
            .fold(location.to_path_buf(), |path, segment| path.join(segment))
    }

    /// Final identifier component; the name the item takes at the destination.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.identifier
            .rsplit('/')
            .next()
            .unwrap_or(self.identifier.as_str())
    }

    /// Oldest first, ties broken by ascending identifier.
    #[must_use]
    pub fn eviction_order(&self, other: &Self) -> Ordering {
        self.age_marker
            .cmp(&other.age_marker)
            .then_with(|| self.identifier.cmp(&other.identifier))
    }
}

/// Entry skipped during a scan because it could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanWarning {
    /// Path of the unreadable entry.
    pub path: PathBuf,
    /// Human-readable cause.
    pub reason: String,
}

/// Tagged reason an individual item could not be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The destination already holds an entry with the same name.
    NameCollision,
    /// Copy, rename, or cleanup failed while moving.
    MoveFailure,
    /// Deleting a destination item during eviction failed.
    DeleteFailure,
    /// Deleting a purge-selected source item failed.
    PurgeFailure,
}

impl FailureKind {
    /// Render the kind as its `snake_case` string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NameCollision => "name_collision",
            Self::MoveFailure => "move_failure",
            Self::DeleteFailure => "delete_failure",
            Self::PurgeFailure => "purge_failure",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Failure outcome for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Identifier of the item at its location.
    pub identifier: String,
    /// Failure category.
    pub kind: FailureKind,
    /// Step that failed (for example `copy_file` or `remove_source`).
    pub operation: &'static str,
    /// Human-readable cause.
    pub detail: String,
}

impl ItemFailure {
    pub(crate) fn new(
        identifier: impl Into<String>,
        kind: FailureKind,
        operation: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            kind,
            operation,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} {} during {}: {}",
            self.kind, self.identifier, self.operation, self.detail
        )
    }
}

impl std::error::Error for ItemFailure {}

/// How an item reached the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMethod {
    /// Atomic rename on the same volume.
    Rename,
    /// Staged copy across volumes followed by source removal.
    Copy,
    /// Dry run; nothing was transferred.
    Planned,
}

/// Successful (or planned) move of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovedItem {
    /// Identifier at the source.
    pub identifier: String,
    /// Name the item holds at the destination.
    pub destination_name: String,
    /// Bytes transferred.
    pub size_bytes: u64,
    /// Transfer method used.
    pub method: TransferMethod,
}

/// Item removed from the destination by eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvictedItem {
    /// Identifier at the destination.
    pub identifier: String,
    /// Bytes freed.
    pub size_bytes: u64,
    /// Age marker that placed the item in the eviction order.
    pub age_marker: DateTime<Utc>,
}

impl From<&Item> for EvictedItem {
    fn from(item: &Item) -> Self {
        Self {
            identifier: item.identifier.clone(),
            size_bytes: item.size_bytes,
            age_marker: item.age_marker,
        }
    }
}

/// Source item deleted without archiving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgedItem {
    /// Identifier at the source.
    pub identifier: String,
    /// Bytes released.
    pub size_bytes: u64,
}

/// Which side effects a pass is allowed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DryRun {
    /// Perform every move, purge, and eviction.
    #[default]
    Off,
    /// Plan everything, change nothing, mount nothing.
    All,
    /// Move and purge for real but only plan evictions.
    EvictionOnly,
}

impl DryRun {
    /// Whether moves, purges, and device mounts are performed.
    #[must_use]
    pub const fn moves_enabled(self) -> bool {
        !matches!(self, Self::All)
    }

    /// Whether evictions are performed.
    #[must_use]
    pub const fn evictions_enabled(self) -> bool {
        matches!(self, Self::Off)
    }

    /// Render the mode as its `snake_case` string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::All => "all",
            Self::EvictionOnly => "eviction_only",
        }
    }
}

impl fmt::Display for DryRun {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Overall outcome for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SourceStatus {
    /// The source was scanned and drained.
    Processed,
    /// The source was intentionally left alone.
    Skipped {
        /// Why the source was skipped.
        reason: String,
    },
    /// The source could not be processed at all.
    Failed {
        /// Why the source failed.
        reason: String,
    },
}

/// Outcome for one configured source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    /// Configured label (path or device).
    pub source: String,
    /// Directory actually scanned, once resolved.
    pub location: Option<PathBuf>,
    /// Overall outcome.
    pub status: SourceStatus,
    /// Items moved to the destination.
    pub moved: Vec<MovedItem>,
    /// Items that would have moved under a dry run.
    pub planned_moves: Vec<MovedItem>,
    /// Items deleted by purge patterns.
    pub purged: Vec<PurgedItem>,
    /// Items that would have been purged under a dry run.
    pub planned_purges: Vec<PurgedItem>,
    /// Per-item failures.
    pub failures: Vec<ItemFailure>,
    /// Entries skipped while scanning.
    pub warnings: Vec<ScanWarning>,
}

impl SourceReport {
    /// Empty report for the source labelled `source`.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            location: None,
            status: SourceStatus::Processed,
            moved: Vec::new(),
            planned_moves: Vec::new(),
            purged: Vec::new(),
            planned_purges: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record a move outcome in the matching list.
    pub fn record_move(&mut self, moved: MovedItem) {
        if moved.method == TransferMethod::Planned {
            self.planned_moves.push(moved);
        } else {
            self.moved.push(moved);
        }
    }

    /// Number of items moved.
    #[must_use]
    pub fn items_moved(&self) -> usize {
        self.moved.len()
    }

    /// Bytes transferred to the destination.
    #[must_use]
    pub fn bytes_moved(&self) -> u64 {
        self.moved.iter().map(|item| item.size_bytes).sum()
    }

    /// Whether anything went wrong for this source.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || matches!(self.status, SourceStatus::Failed { .. })
    }
}

/// Outcome of enforcing the capacity budget on the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Configured capacity budget in bytes.
    pub budget: u64,
    /// Destination usage before eviction.
    pub usage_before: u64,
    /// Destination usage after eviction.
    pub usage_after: u64,
    /// Items deleted, in deletion order.
    pub evicted: Vec<EvictedItem>,
    /// Items that would have been deleted under a dry run, in order.
    pub planned: Vec<EvictedItem>,
    /// Per-item deletion failures.
    pub failures: Vec<ItemFailure>,
    /// Entries skipped while scanning the destination.
    pub warnings: Vec<ScanWarning>,
    /// Set when the destination could not be scanned.
    pub error: Option<String>,
}

impl EvictionReport {
    /// Report for a destination holding `usage_before` bytes.
    #[must_use]
    pub const fn new(budget: u64, usage_before: u64) -> Self {
        Self {
            budget,
            usage_before,
            usage_after: usage_before,
            evicted: Vec::new(),
            planned: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
            error: None,
        }
    }

    /// Report for a destination that could not be inventoried.
    #[must_use]
    pub fn failed(budget: u64, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(budget, 0)
        }
    }

    /// Number of items evicted.
    #[must_use]
    pub fn items_evicted(&self) -> usize {
        self.evicted.len()
    }

    /// Bytes freed by eviction.
    #[must_use]
    pub fn bytes_freed(&self) -> u64 {
        self.evicted.iter().map(|item| item.size_bytes).sum()
    }

    /// Whether the destination ended within budget.
    #[must_use]
    pub const fn within_budget(&self) -> bool {
        self.usage_after <= self.budget
    }
}

/// Aggregated result of one archival pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Identifier recorded on the pass span.
    pub run_id: Uuid,
    /// When the pass began.
    pub started_at: DateTime<Utc>,
    /// When the pass ended.
    pub finished_at: DateTime<Utc>,
    /// Dry-run mode the pass ran under.
    pub dry_run: DryRun,
    /// Destination directory.
    pub destination: PathBuf,
    /// Stale staging entries removed before work began.
    pub recovered_partials: Vec<String>,
    /// Per-source outcomes in configuration order.
    pub sources: Vec<SourceReport>,
    /// Destination eviction outcome.
    pub eviction: EvictionReport,
}

impl RunReport {
    /// Items moved across all sources.
    #[must_use]
    pub fn items_moved(&self) -> usize {
        self.sources.iter().map(SourceReport::items_moved).sum()
    }

    /// Bytes transferred across all sources.
    #[must_use]
    pub fn bytes_moved(&self) -> u64 {
        self.sources.iter().map(SourceReport::bytes_moved).sum()
    }

    /// Every per-item failure, sources first, then eviction.
    pub fn failures(&self) -> impl Iterator<Item = &ItemFailure> {
        self.sources
            .iter()
            .flat_map(|source| source.failures.iter())
            .chain(self.eviction.failures.iter())
    }

    /// Whether any item, source, or the destination scan failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.sources.iter().any(SourceReport::has_failures)
            || !self.eviction.failures.is_empty()
            || self.eviction.error.is_some()
    }
}
