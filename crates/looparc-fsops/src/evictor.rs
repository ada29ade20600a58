//! Oldest-first eviction against the destination capacity budget.

use std::path::Path;

use tracing::{info, warn};

use crate::fs::FileSystem;
use crate::model::{EvictedItem, EvictionReport, FailureKind, Item, ItemFailure, ItemKind};
use crate::scanner::Inventory;

/// Deletion order needed to bring a location within budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionPlan {
    /// Budget in bytes.
    pub budget: u64,
    /// Usage before any deletion.
    pub usage_before: u64,
    /// Items to delete, in order.
    pub candidates: Vec<Item>,
    /// Usage once every candidate is gone.
    pub projected_usage: u64,
}

impl EvictionPlan {
    /// Whether no deletion is needed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Pick items oldest first until the remaining total fits `budget`.
///
/// Pure: the filesystem is not touched. Items newer than the point where the
/// budget is met are never candidates, whatever their size.
#[must_use]
pub fn plan_eviction(items: &[Item], budget: u64) -> EvictionPlan {
    let usage_before: u64 = items.iter().map(|item| item.size_bytes).sum();
    let mut ordered: Vec<&Item> = items.iter().collect();
    ordered.sort_by(|left, right| left.eviction_order(right));

    let mut usage = usage_before;
    let mut candidates = Vec::new();
    for item in ordered {
        if usage <= budget {
            break;
        }
        usage = usage.saturating_sub(item.size_bytes);
        candidates.push(item.clone());
    }
    EvictionPlan {
        budget,
        usage_before,
        candidates,
        projected_usage: usage,
    }
}

/// Deletes destination items until usage fits the budget.
pub struct Evictor<'a> {
    fs: &'a dyn FileSystem,
    dry_run: bool,
}

impl<'a> Evictor<'a> {
    /// Evictor deleting through `fs`; a dry run only records the plan.
    #[must_use]
    pub const fn new(fs: &'a dyn FileSystem, dry_run: bool) -> Self {
        Self { fs, dry_run }
    }

    /// Bring `inventory` of `location` within `budget`.
    ///
    /// Usage is re-checked after every deletion. An item that cannot be
    /// deleted is recorded and skipped; later items are still tried.
    #[must_use]
    pub fn enforce(&self, location: &Path, inventory: &Inventory, budget: u64) -> EvictionReport {
        let usage_before = inventory.total_bytes();
        let mut report = EvictionReport::new(budget, usage_before);
        report.warnings.clone_from(&inventory.warnings);
        if usage_before <= budget {
            return report;
        }

        if self.dry_run {
            let plan = plan_eviction(&inventory.items, budget);
            report.planned = plan.candidates.iter().map(EvictedItem::from).collect();
            info!(
                planned = report.planned.len(),
                projected_usage = plan.projected_usage,
                budget,
                "eviction planned"
            );
            return report;
        }

        let mut usage = usage_before;
        for item in inventory.oldest_first() {
            if usage <= budget {
                break;
            }
            let path = item.path_in(location);
            let removed = match item.kind {
                ItemKind::Directory => self.fs.remove_dir_all(&path),
                ItemKind::File | ItemKind::Symlink => self.fs.remove_file(&path),
            };
            match removed {
                Ok(()) => {
                    usage = usage.saturating_sub(item.size_bytes);
                    info!(
                        item = %item.identifier,
                        size_bytes = item.size_bytes,
                        usage,
                        "evicted"
                    );
                    report.evicted.push(EvictedItem::from(item));
                }
                Err(err) => {
                    warn!(item = %item.identifier, error = %err, "eviction failed");
                    report.failures.push(ItemFailure::new(
                        &item.identifier,
                        FailureKind::DeleteFailure,
                        "remove_item",
                        err.to_string(),
                    ));
                }
            }
        }
        report.usage_after = usage;
        if usage > budget {
            warn!(usage, budget, "destination still over budget");
        }
        report
    }
}
