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

//! File-backed configuration for loop archival runs.
//!
//! Layout: `model.rs` (typed config models), `validate.rs` (validation and
//! parsing helpers), `loader.rs` (YAML loading and path resolution).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use defaults::{DEFAULT_DEVICE_PATH_FORMAT, DEFAULT_LOG_LEVEL, DEFAULT_PATTERN};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_from_path, parse_yaml};
pub use model::{
    ArchiveConfig, ByteSize, DeviceSpec, LogFormatSetting, LoggingSettings, SourceLocation,
    SourceSpec,
};
pub use validate::parse_byte_size;
