//! # Design
//!
//! - Provide structured, constant-message errors for the archival core.
//! - Capture operation context (paths, patterns, commands) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for archival operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors produced by the archival core.
///
/// Only a few of these abort a pass (an unusable destination, an invalid glob);
/// the rest are folded into per-item or per-source outcomes by the caller.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// IO failures while interacting with the filesystem.
    #[error("archive io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Walkdir traversal failures.
    #[error("archive walkdir failure")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Globset compilation failures.
    #[error("archive glob failure")]
    Glob {
        /// Operation that triggered the glob failure.
        operation: &'static str,
        /// Glob pattern that failed to compile.
        pattern: String,
        /// Underlying globset error.
        source: globset::Error,
    },
    /// The destination cannot receive items at all.
    #[error("archive destination unavailable")]
    DestinationUnavailable {
        /// Destination path.
        path: PathBuf,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// Input validation failures.
    #[error("archive invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// An external command exited unsuccessfully.
    #[error("archive command failed")]
    Command {
        /// Operation the command was part of.
        operation: &'static str,
        /// Full argument vector.
        args: Vec<String>,
        /// Exit status, absent when terminated by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
}

impl ArchiveError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn glob(
        operation: &'static str,
        pattern: String,
        source: globset::Error,
    ) -> Self {
        Self::Glob {
            operation,
            pattern,
            source,
        }
    }

    /// Operation identifier carried by the error, when it has one.
    #[must_use]
    pub const fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Io { operation, .. }
            | Self::Walkdir { operation, .. }
            | Self::Glob { operation, .. }
            | Self::Command { operation, .. } => Some(*operation),
            Self::DestinationUnavailable { .. } | Self::InvalidInput { .. } => None,
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
            Self::Walkdir {
                operation,
                path,
                source,
            } => format!("{self}: {operation} {} ({source})", path.display()),
            Self::Glob {
                operation,
                pattern,
                source,
            } => format!("{self}: {operation} {pattern:?} ({source})"),
            Self::DestinationUnavailable { path, reason } => {
                format!("{self}: {} {reason}", path.display())
            }
            Self::InvalidInput {
                field,
                reason,
                value,
            } => value.as_ref().map_or_else(
                || format!("{self}: {field} {reason}"),
                |value| format!("{self}: {field} {reason} (value: {value})"),
            ),
            Self::Command {
                operation,
                args,
                status,
                stderr,
            } => {
                let status = status.map_or_else(|| "signal".to_string(), |code| code.to_string());
                format!(
                    "{self}: {operation} `{}` exited with {status}: {}",
                    args.join(" "),
                    stderr.trim()
                )
            }
        }
    }
}
