//! Archival pass orchestration.
//!
//! # Design
//! - One pass: verify the destination, clear stale staging entries, drain every
//!   source in configuration order, then enforce the capacity budget.
//! - Only an unusable destination (or an invalid glob at construction) aborts a
//!   pass; every other failure lands in the returned [`RunReport`].
//! - All moves finish before eviction starts, so eviction sees a settled destination.

use std::fs;
use std::io;
use std::mem;
use std::path::Path;

use chrono::Utc;
use looparc_config::{ArchiveConfig, SourceLocation};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::{ArchiveError, ArchiveResult};
use crate::evictor::{EvictionPlan, Evictor, plan_eviction};
use crate::fs::{FileSystem, LocalFs};
use crate::model::{
    DryRun, EvictionReport, FailureKind, Item, ItemFailure, ItemKind, PurgedItem, RunReport,
    SourceReport, SourceStatus, TransferMethod,
};
use crate::mount::{CommandRunner, MountedSource, SystemCommandRunner};
use crate::mover::Mover;
use crate::scanner::{Inventory, ItemSelector, STAGING_PREFIX, Scanner};

/// Per-pass switches supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Which side effects are suppressed.
    pub dry_run: DryRun,
}

struct SourcePlan {
    scanner: Scanner,
    purge: Option<Scanner>,
}

/// Drives archival passes for one configuration.
pub struct ArchiveService {
    config: ArchiveConfig,
    plans: Vec<SourcePlan>,
    fs: Box<dyn FileSystem>,
    runner: Box<dyn CommandRunner>,
    options: RunOptions,
}

impl ArchiveService {
    /// Build a service for `config`, compiling every source's patterns up front.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Glob` when any pattern is malformed.
    pub fn new(config: ArchiveConfig) -> ArchiveResult<Self> {
        let plans = config
            .sources
            .iter()
            .map(|spec| {
                let scanner = Scanner::new(ItemSelector::new(&spec.patterns)?);
                let purge = if spec.purge_patterns.is_empty() {
                    None
                } else {
                    Some(Scanner::new(ItemSelector::new(&spec.purge_patterns)?))
                };
                Ok(SourcePlan { scanner, purge })
            })
            .collect::<ArchiveResult<Vec<_>>>()?;
        Ok(Self {
            config,
            plans,
            fs: Box::new(LocalFs),
            runner: Box::new(SystemCommandRunner),
            options: RunOptions::default(),
        })
    }

    /// Replace the run options.
    #[must_use]
    pub const fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Route filesystem mutations through `fs`.
    #[must_use]
    pub fn with_filesystem(mut self, fs: impl FileSystem + 'static) -> Self {
        self.fs = Box::new(fs);
        self
    }

    /// Route mount commands through `runner`.
    #[must_use]
    pub fn with_command_runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    /// Configuration the service was built from.
    #[must_use]
    pub const fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Run options in effect.
    #[must_use]
    pub const fn options(&self) -> RunOptions {
        self.options
    }

    /// Execute one archival pass.
    ///
    /// # Errors
    ///
    /// Returns an error only when the destination is missing, not a directory,
    /// not writable, or cannot be listed. Per-item and per-source failures are
    /// reported in the returned [`RunReport`].
    pub fn run(&self) -> ArchiveResult<RunReport> {
        let run_id = Uuid::new_v4();
        let dry_run = self.options.dry_run;
        let span = info_span!("archive_pass", %run_id, %dry_run);
        let _entered = span.enter();
        let started_at = Utc::now();
        info!(
            destination = %self.config.destination.display(),
            sources = self.plans.len(),
            "archive pass started"
        );

        self.verify_destination()?;
        let recovered_partials = self.recover_partials()?;

        let mut arrivals = Vec::new();
        let sources: Vec<SourceReport> = self
            .config
            .sources
            .iter()
            .zip(&self.plans)
            .map(|(spec, plan)| {
                let span = info_span!("source", source = %spec.label());
                let _entered = span.enter();
                self.process_source(&spec.location, plan, &mut arrivals)
            })
            .collect();

        let eviction = self.enforce_budget(arrivals);
        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            dry_run,
            destination: self.config.destination.clone(),
            recovered_partials,
            sources,
            eviction,
        };
        info!(
            items_moved = report.items_moved(),
            bytes_moved = report.bytes_moved(),
            items_evicted = report.eviction.items_evicted(),
            bytes_freed = report.eviction.bytes_freed(),
            usage = report.eviction.usage_after,
            failures = report.failures().count(),
            "archive pass finished"
        );
        Ok(report)
    }

    /// Inventory of the destination's immediate children.
    ///
    /// # Errors
    ///
    /// Returns an error when the destination cannot be listed.
    pub fn destination_inventory(&self) -> ArchiveResult<Inventory> {
        Scanner::children()?.scan(&self.config.destination)
    }

    /// Inventory of the path source at `index`, using its configured patterns.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::InvalidInput` for an unknown index or a device
    /// source, and a scan error when the source cannot be listed.
    pub fn source_inventory(&self, index: usize) -> ArchiveResult<Inventory> {
        let (spec, plan) = self
            .config
            .sources
            .get(index)
            .zip(self.plans.get(index))
            .ok_or_else(|| ArchiveError::InvalidInput {
                field: "source",
                reason: "out_of_range",
                value: Some(index.to_string()),
            })?;
        match &spec.location {
            SourceLocation::Path(path) => plan.scanner.scan(path),
            SourceLocation::Device(_) => Err(ArchiveError::InvalidInput {
                field: "source",
                reason: "device_requires_mount",
                value: Some(spec.label()),
            }),
        }
    }

    /// Evictions needed to bring `inventory` within the configured budget.
    #[must_use]
    pub fn eviction_plan(&self, inventory: &Inventory) -> EvictionPlan {
        plan_eviction(&inventory.items, self.config.capacity_budget.bytes())
    }

    fn verify_destination(&self) -> ArchiveResult<()> {
        let destination = &self.config.destination;
        let unavailable = |reason| ArchiveError::DestinationUnavailable {
            path: destination.clone(),
            reason,
        };
        let metadata = match fs::metadata(destination) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(unavailable("missing"));
            }
            Err(err) => return Err(ArchiveError::io("verify_destination", destination, err)),
        };
        if !metadata.is_dir() {
            return Err(unavailable("not_directory"));
        }
        if !self.options.dry_run.moves_enabled() {
            return Ok(());
        }
        // The probe is deleted when dropped.
        tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(destination)
            .map(drop)
            .map_err(|err| {
                warn!(error = %err, "destination write probe failed");
                unavailable("not_writable")
            })
    }

    fn recover_partials(&self) -> ArchiveResult<Vec<String>> {
        let destination = &self.config.destination;
        let entries = fs::read_dir(destination)
            .map_err(|err| ArchiveError::io("recover.read_destination", destination, err))?;
        let mut recovered = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|err| ArchiveError::io("recover.read_entry", destination, err))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(STAGING_PREFIX) {
                continue;
            }
            if !self.options.dry_run.moves_enabled() {
                info!(entry = %name, "stale staging entry left in place by dry run");
                continue;
            }
            let path = entry.path();
            let removed = match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => self.fs.remove_dir_all(&path),
                Ok(_) => self.fs.remove_file(&path),
                Err(err) => Err(err),
            };
            match removed {
                Ok(()) => {
                    info!(entry = %name, "removed stale staging entry");
                    recovered.push(name);
                }
                Err(err) => warn!(entry = %name, error = %err, "failed to remove stale staging entry"),
            }
        }
        recovered.sort();
        Ok(recovered)
    }

    fn process_source(
        &self,
        location: &SourceLocation,
        plan: &SourcePlan,
        arrivals: &mut Vec<Item>,
    ) -> SourceReport {
        let mut report = SourceReport::new(location.to_string());
        match location {
            SourceLocation::Path(path) => {
                report.location = Some(path.clone());
                self.drain(plan, path, &mut report, arrivals);
            }
            SourceLocation::Device(device) => {
                if !self.options.dry_run.moves_enabled() {
                    info!("dry run does not mount devices; source skipped");
                    report.status = SourceStatus::Skipped {
                        reason: "dry run does not mount devices".to_string(),
                    };
                    return report;
                }
                match MountedSource::mount(self.runner.as_ref(), device) {
                    Ok(mounted) => {
                        report.location = Some(mounted.path().to_path_buf());
                        self.drain(plan, mounted.path(), &mut report, arrivals);
                        if let Err(err) = mounted.unmount() {
                            warn!(error = %err.detail(), "failed to unmount source device");
                        }
                    }
                    Err(err) => {
                        warn!(error = %err.detail(), "failed to mount source device");
                        report.status = SourceStatus::Failed {
                            reason: err.detail(),
                        };
                    }
                }
            }
        }
        report
    }

    fn drain(
        &self,
        plan: &SourcePlan,
        location: &Path,
        report: &mut SourceReport,
        arrivals: &mut Vec<Item>,
    ) {
        let mut inventory = match plan.scanner.scan(location) {
            Ok(inventory) => inventory,
            Err(err) => {
                warn!(error = %err.detail(), "source scan failed");
                report.status = SourceStatus::Failed {
                    reason: err.detail(),
                };
                return;
            }
        };
        report.warnings = mem::take(&mut inventory.warnings);
        for warning in &report.warnings {
            warn!(path = %warning.path.display(), reason = %warning.reason, "entry skipped");
        }

        let mover = Mover::new(self.fs.as_ref(), !self.options.dry_run.moves_enabled());
        for item in inventory.oldest_first() {
            match mover.move_item(item, location, &self.config.destination) {
                Ok(moved) => {
                    if moved.method == TransferMethod::Planned {
                        if arrivals
                            .iter()
                            .any(|arrival| arrival.identifier == moved.destination_name)
                        {
                            warn!(
                                item = %item.identifier,
                                "planned move collides with an earlier planned move"
                            );
                            report.failures.push(ItemFailure::new(
                                &item.identifier,
                                FailureKind::NameCollision,
                                "plan_destination",
                                format!("{} is already planned to arrive", moved.destination_name),
                            ));
                            continue;
                        }
                        info!(item = %item.identifier, size_bytes = item.size_bytes, "move planned");
                        arrivals.push(Item {
                            identifier: moved.destination_name.clone(),
                            ..item.clone()
                        });
                    } else {
                        info!(
                            item = %item.identifier,
                            size_bytes = item.size_bytes,
                            method = ?moved.method,
                            "moved"
                        );
                    }
                    report.record_move(moved);
                }
                Err(failure) => {
                    warn!(
                        item = %failure.identifier,
                        kind = %failure.kind,
                        operation = failure.operation,
                        detail = %failure.detail,
                        "move failed"
                    );
                    report.failures.push(failure);
                }
            }
        }

        if let Some(purge) = &plan.purge {
            let selected: Vec<&str> = inventory
                .items
                .iter()
                .map(|item| item.identifier.as_str())
                .collect();
            self.purge(purge, location, &selected, report);
        }
    }

    /// Delete purge-selected items, leaving alone anything the archive patterns
    /// selected in this pass. Items whose move failed stay in the source.
    fn purge(
        &self,
        scanner: &Scanner,
        location: &Path,
        selected: &[&str],
        report: &mut SourceReport,
    ) {
        let inventory = match scanner.scan(location) {
            Ok(inventory) => inventory,
            Err(err) => {
                warn!(error = %err.detail(), "purge scan failed");
                report.failures.push(ItemFailure::new(
                    location.display().to_string(),
                    FailureKind::PurgeFailure,
                    "purge_scan",
                    err.detail(),
                ));
                return;
            }
        };
        for item in &inventory.items {
            if selected
                .iter()
                .any(|archived| overlaps(archived, &item.identifier))
            {
                debug!(item = %item.identifier, "purge skipped; item is selected for archiving");
                continue;
            }
            let purged = PurgedItem {
                identifier: item.identifier.clone(),
                size_bytes: item.size_bytes,
            };
            if !self.options.dry_run.moves_enabled() {
                report.planned_purges.push(purged);
                continue;
            }
            let path = item.path_in(location);
            let removed = match item.kind {
                ItemKind::Directory => self.fs.remove_dir_all(&path),
                ItemKind::File | ItemKind::Symlink => self.fs.remove_file(&path),
            };
            match removed {
                Ok(()) => {
                    info!(item = %item.identifier, size_bytes = item.size_bytes, "purged");
                    report.purged.push(purged);
                }
                Err(err) => {
                    warn!(item = %item.identifier, error = %err, "purge failed");
                    report.failures.push(ItemFailure::new(
                        &item.identifier,
                        FailureKind::PurgeFailure,
                        "remove_item",
                        err.to_string(),
                    ));
                }
            }
        }
    }

    fn enforce_budget(&self, arrivals: Vec<Item>) -> EvictionReport {
        let budget = self.config.capacity_budget.bytes();
        let mut inventory = match self.destination_inventory() {
            Ok(inventory) => inventory,
            Err(err) => {
                warn!(error = %err.detail(), "destination scan failed; eviction skipped");
                return EvictionReport::failed(budget, err.detail());
            }
        };
        // Planned arrivals only exist under a full dry run; count them so the plan is realistic.
        inventory.items.extend(arrivals);
        Evictor::new(self.fs.as_ref(), !self.options.dry_run.evictions_enabled()).enforce(
            &self.config.destination,
            &inventory,
            budget,
        )
    }
}

/// Whether one identifier equals the other or lies inside it.
fn overlaps(left: &str, right: &str) -> bool {
    let nested = |outer: &str, inner: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.starts_with('/'))
    };
    left == right || nested(left, right) || nested(right, left)
}
