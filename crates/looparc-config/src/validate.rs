//! Validation helpers and parsing utilities for configuration documents.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::defaults::UUID_PLACEHOLDER;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{ArchiveConfig, SourceLocation, SourceSpec};

const UNITS: &[(&str, u64)] = &[
    ("", 1),
    ("b", 1),
    ("k", 1_000),
    ("kb", 1_000),
    ("kib", 1 << 10),
    ("m", 1_000_000),
    ("mb", 1_000_000),
    ("mib", 1 << 20),
    ("g", 1_000_000_000),
    ("gb", 1_000_000_000),
    ("gib", 1 << 30),
    ("t", 1_000_000_000_000),
    ("tb", 1_000_000_000_000),
    ("tib", 1 << 40),
];

/// Parse a byte quantity such as `1048576`, `"500MiB"`, or `"2 GB"`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidField` when the text has no leading integer,
/// an unknown unit, or overflows `u64`.
pub fn parse_byte_size(text: &str) -> ConfigResult<u64> {
    let invalid = |reason| ConfigError::invalid("capacity_budget", reason, Some(text.to_string()));
    let trimmed = text.trim();
    let digits_end = trimmed
        .find(|ch: char| !ch.is_ascii_digit() && ch != '_')
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(digits_end);
    let digits: String = digits.chars().filter(|ch| *ch != '_').collect();
    if digits.is_empty() {
        return Err(invalid("missing_number"));
    }
    let value: u64 = digits.parse().map_err(|_| invalid("invalid_number"))?;
    let unit = unit.trim().to_ascii_lowercase();
    let multiplier = UNITS
        .iter()
        .find(|(suffix, _)| *suffix == unit)
        .map(|(_, multiplier)| *multiplier)
        .ok_or_else(|| invalid("unknown_unit"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| invalid("overflow"))
}

impl ArchiveConfig {
    /// Check structural invariants the archival core relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant as `ConfigError::InvalidField`.
    pub fn validate(&self) -> ConfigResult<()> {
        if is_blank(&self.destination) {
            return Err(ConfigError::invalid("destination", "empty", None));
        }
        if self.sources.is_empty() {
            return Err(ConfigError::invalid("sources", "empty", None));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "empty", None));
        }

        let destination = normalise(&self.destination);
        let mut seen = HashSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            validate_source(index, source, &destination, &mut seen)?;
        }
        Ok(())
    }
}

fn validate_source(
    index: usize,
    source: &SourceSpec,
    destination: &Path,
    seen: &mut HashSet<String>,
) -> ConfigResult<()> {
    let field = |name: &str| format!("sources[{index}].{name}");

    match &source.location {
        SourceLocation::Path(path) => {
            if is_blank(path) {
                return Err(ConfigError::invalid(field("path"), "empty", None));
            }
            let normalised = normalise(path);
            let display = Some(path.display().to_string());
            if normalised == destination {
                return Err(ConfigError::invalid(field("path"), "equals_destination", display));
            }
            if destination.starts_with(&normalised) {
                return Err(ConfigError::invalid(field("path"), "contains_destination", display));
            }
            if normalised.starts_with(destination) {
                return Err(ConfigError::invalid(field("path"), "inside_destination", display));
            }
            if !seen.insert(normalised.display().to_string()) {
                return Err(ConfigError::invalid(field("path"), "duplicate", display));
            }
        }
        SourceLocation::Device(device) => {
            if device.uuid.trim().is_empty() {
                return Err(ConfigError::invalid(field("device.uuid"), "empty", None));
            }
            if !device.path_format.contains(UUID_PLACEHOLDER) {
                return Err(ConfigError::invalid(
                    field("device.path_format"),
                    "missing_uuid_placeholder",
                    Some(device.path_format.clone()),
                ));
            }
            if !seen.insert(format!("device:{}", device.uuid)) {
                return Err(ConfigError::invalid(
                    field("device.uuid"),
                    "duplicate",
                    Some(device.uuid.clone()),
                ));
            }
        }
    }

    if source.patterns.is_empty() {
        return Err(ConfigError::invalid(field("patterns"), "empty", None));
    }
    for (list, patterns) in [
        ("patterns", &source.patterns),
        ("purge_patterns", &source.purge_patterns),
    ] {
        if let Some(blank) = patterns.iter().position(|pattern| pattern.trim().is_empty()) {
            return Err(ConfigError::invalid(
                format!("sources[{index}].{list}[{blank}]"),
                "empty",
                None,
            ));
        }
    }
    Ok(())
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}

/// Lexical normalisation: drops `.` components and trailing separators.
fn normalise(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}
