//! CLI error type and exit codes.

use std::fmt::{self, Display, Formatter};

use anyhow::anyhow;
use looparc_config::ConfigError;
use looparc_fsops::ArchiveError;

/// Error type used by CLI commands.
#[derive(Debug)]
pub(crate) enum CliError {
    /// Bad input or configuration; nothing was attempted.
    Validation(String),
    /// The command could not complete.
    Failure(anyhow::Error),
    /// The pass completed but some items or sources failed.
    Incomplete(usize),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) fn from_config(err: &ConfigError) -> Self {
        Self::validation(err.detail())
    }

    /// Invalid patterns and arguments are configuration problems; everything
    /// else aborted the pass.
    pub(crate) fn from_archive(err: &ArchiveError) -> Self {
        match err {
            ArchiveError::Glob { .. } | ArchiveError::InvalidInput { .. } => {
                Self::validation(err.detail())
            }
            _ => Self::failure(anyhow!(err.detail())),
        }
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
            Self::Incomplete(_) => 4,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
            Self::Incomplete(count) => {
                format!("pass completed with {count} failure(s); see the report above")
            }
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}
