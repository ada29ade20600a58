//! YAML loading for archive configuration documents.
//!
//! # Design
//! - Parsing and validation happen together so callers never hold an
//!   unvalidated `ArchiveConfig`.
//! - Relative paths resolve against the directory containing the file.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::ArchiveConfig;

/// Parse and validate a configuration document held in memory.
///
/// # Errors
///
/// Returns `ConfigError::Parse` for malformed YAML and
/// `ConfigError::InvalidField` when validation fails.
pub fn parse_yaml(text: &str) -> ConfigResult<ArchiveConfig> {
    let config: ArchiveConfig =
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse { path: None, source })?;
    config.validate()?;
    Ok(config)
}

/// Load, resolve, and validate the configuration file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid YAML for the
/// schema, or fails validation.
pub fn load_from_path(path: &Path) -> ConfigResult<ArchiveConfig> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: ArchiveConfig =
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
    if let Some(base) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        config.resolve_relative_to(base);
    }
    config.validate()?;
    debug!(
        path = %path.display(),
        sources = config.sources.len(),
        capacity_budget = config.capacity_budget.bytes(),
        "loaded archive configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogFormatSetting, SourceLocation};
    use anyhow::Result;
    use std::path::PathBuf;

    #[test]
    fn parse_yaml_reads_full_document() -> Result<()> {
        let config = parse_yaml(
            "
sources:
  - /var/spool/camera
destination: /srv/archive
capacity_budget: 500MiB
logging:
  level: debug
  format: json
",
        )?;
        assert_eq!(config.capacity_budget.bytes(), 500 * 1024 * 1024);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, Some(LogFormatSetting::Json));
        Ok(())
    }

    #[test]
    fn parse_yaml_rejects_unknown_fields() {
        let result = parse_yaml(
            "
sources: [/a]
destination: /b
capacity_budget: 1
loop_size: 3
",
        );
        assert!(matches!(result, Err(ConfigError::Parse { path: None, .. })));
    }

    #[test]
    fn load_from_path_resolves_relative_paths() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("looparc.yaml");
        fs::write(
            &file,
            "sources: [inbox]\ndestination: archive\ncapacity_budget: 10\n",
        )?;

        let config = load_from_path(&file)?;
        assert_eq!(config.destination, temp.path().join("archive"));
        assert_eq!(
            config.sources[0].location,
            SourceLocation::Path(temp.path().join("inbox"))
        );
        Ok(())
    }

    #[test]
    fn load_from_path_reports_missing_file() {
        let missing = PathBuf::from("/definitely/missing/looparc.yaml");
        let result = load_from_path(&missing);
        assert!(
            matches!(result, Err(ConfigError::Io { ref path, .. }) if *path == missing),
            "unexpected result: {result:?}"
        );
    }
}
