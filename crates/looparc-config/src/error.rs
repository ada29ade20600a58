//! Error types for configuration loading and validation.
//!
//! # Design
//! - Constant messages; the offending field, value, and path travel as context.
//! - Source errors are preserved rather than interpolated.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("configuration file unreadable")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// File that could not be read.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The document was not valid YAML for the configuration schema.
    #[error("configuration document malformed")]
    Parse {
        /// File the document came from, when loaded from disk.
        path: Option<PathBuf>,
        /// Source YAML error.
        source: serde_yaml::Error,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        field: impl Into<String>,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason,
            value,
        }
    }

    /// Render the error together with its structured context on one line.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Io {
                operation,
                path,
                source,
            } => format!("{self}: {operation} {} ({source})", path.display()),
            Self::Parse { path, source } => path.as_ref().map_or_else(
                || format!("{self}: {source}"),
                |path| format!("{self}: {} ({source})", path.display()),
            ),
            Self::InvalidField {
                field,
                reason,
                value,
            } => value.as_ref().map_or_else(
                || format!("{self}: {field} {reason}"),
                |value| format!("{self}: {field} {reason} (value: {value})"),
            ),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
