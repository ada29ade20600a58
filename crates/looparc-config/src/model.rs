//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers consumed by the archival core; no IO here.
//! - Lenient input shapes (plain path sources, human byte sizes) are
//!   normalised during deserialisation so callers only see one form.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_DEVICE_PATH_FORMAT, DEFAULT_LOG_LEVEL, DEFAULT_PATTERN, UUID_PLACEHOLDER,
};
use crate::error::ConfigError;
use crate::validate::parse_byte_size;

/// Resolved configuration for one archival pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Locations drained into the destination, processed in order.
    pub sources: Vec<SourceSpec>,
    /// Directory receiving archived items.
    pub destination: PathBuf,
    /// Maximum total size the destination may hold after eviction.
    pub capacity_budget: ByteSize,
    /// Logging preferences for the binary.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl ArchiveConfig {
    /// Resolve relative source and destination paths against `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        if self.destination.is_relative() {
            self.destination = base.join(&self.destination);
        }
        for source in &mut self.sources {
            if let SourceLocation::Path(path) = &mut source.location
                && path.is_relative()
            {
                *path = base.join(&*path);
            }
        }
    }
}

/// One configured source and the rules selecting its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSourceSpec")]
pub struct SourceSpec {
    /// Where the source lives.
    #[serde(flatten)]
    pub location: SourceLocation,
    /// Glob patterns selecting items to archive.
    pub patterns: Vec<String>,
    /// Glob patterns selecting items deleted from the source without archiving.
    pub purge_patterns: Vec<String>,
}

impl SourceSpec {
    /// Source rooted at a plain directory with the default selection.
    #[must_use]
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            location: SourceLocation::Path(path.into()),
            patterns: default_patterns(),
            purge_patterns: Vec::new(),
        }
    }

    /// Short human-readable label for logs and reports.
    #[must_use]
    pub fn label(&self) -> String {
        self.location.to_string()
    }
}

/// Location kinds a source may name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLocation {
    /// Directory already present on the local filesystem.
    Path(PathBuf),
    /// Block device mounted for the duration of the pass.
    Device(DeviceSpec),
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(formatter, "{}", path.display()),
            Self::Device(device) => write!(formatter, "device:{}", device.uuid),
        }
    }
}

/// Block device identified by filesystem UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSpec {
    /// Filesystem UUID of the device.
    pub uuid: String,
    /// Template producing the device node; `{uuid}` is substituted.
    #[serde(default = "default_path_format")]
    pub path_format: String,
    /// Options joined with commas and passed to `mount -o`.
    #[serde(default)]
    pub mount_options: Vec<String>,
}

impl DeviceSpec {
    /// Device node path derived from `path_format`.
    #[must_use]
    pub fn device_path(&self) -> PathBuf {
        PathBuf::from(self.path_format.replace(UUID_PLACEHOLDER, &self.uuid))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSourceSpec {
    Path(PathBuf),
    Detailed(DetailedSource),
}

#[derive(Deserialize)]
struct DetailedSource {
    #[serde(flatten)]
    location: SourceLocation,
    #[serde(default = "default_patterns")]
    patterns: Vec<String>,
    #[serde(default)]
    purge_patterns: Vec<String>,
}

impl From<RawSourceSpec> for SourceSpec {
    fn from(raw: RawSourceSpec) -> Self {
        match raw {
            RawSourceSpec::Path(path) => Self::path(path),
            RawSourceSpec::Detailed(detailed) => Self {
                location: detailed.location,
                patterns: detailed.patterns,
                purge_patterns: detailed.purge_patterns,
            },
        }
    }
}

/// Storage quantity in bytes, accepting integers or unit-suffixed strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawByteSize", into = "u64")]
pub struct ByteSize(pub u64);

impl ByteSize {
    /// Number of bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl From<ByteSize> for u64 {
    fn from(value: ByteSize) -> Self {
        value.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawByteSize {
    Bytes(u64),
    Text(String),
}

impl TryFrom<RawByteSize> for ByteSize {
    type Error = String;

    fn try_from(raw: RawByteSize) -> Result<Self, Self::Error> {
        match raw {
            RawByteSize::Bytes(bytes) => Ok(Self(bytes)),
            RawByteSize::Text(text) => parse_byte_size(&text)
                .map(Self)
                .map_err(|err: ConfigError| err.detail()),
        }
    }
}

/// Logging preferences carried in the configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format; inferred from the build profile when absent.
    #[serde(default)]
    pub format: Option<LogFormatSetting>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

/// Log output formats selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

fn default_patterns() -> Vec<String> {
    vec![DEFAULT_PATTERN.to_string()]
}

fn default_path_format() -> String {
    DEFAULT_DEVICE_PATH_FORMAT.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
