#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Quota-enforced archival: drain source locations into one destination and
//! evict the oldest archived items until the destination fits its budget.
//!
//! Layout:
//! - `scanner.rs`: item selection and inventory scans
//! - `mover.rs`: single-item transfer with staged cross-volume copies
//! - `evictor.rs`: oldest-first eviction against the capacity budget
//! - `service.rs`: `ArchiveService`, which drives one pass end to end
//! - `mount.rs`: device-backed sources mounted for the duration of a pass
//! - `fs.rs`: the `FileSystem` seam used for every mutating call

pub mod error;
pub mod evictor;
pub mod fs;
pub mod model;
pub mod mount;
pub mod mover;
pub mod scanner;
pub mod service;

pub use error::{ArchiveError, ArchiveResult};
pub use evictor::{EvictionPlan, Evictor, plan_eviction};
pub use fs::{FileSystem, LocalFs};
pub use model::{
    DryRun, EvictedItem, EvictionReport, FailureKind, Item, ItemFailure, ItemKind, MovedItem,
    PurgedItem, RunReport, ScanWarning, SourceReport, SourceStatus, TransferMethod,
};
pub use mount::{CommandOutput, CommandRunner, MountedSource, SystemCommandRunner};
pub use mover::Mover;
pub use scanner::{Inventory, InventoryIter, ItemSelector, STAGING_PREFIX, Scanner};
pub use service::{ArchiveService, RunOptions};
