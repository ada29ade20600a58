//! Inventory scans over source and destination locations.
//!
//! # Design
//! - Scans are restartable: every call walks the filesystem again, nothing is cached.
//! - One unreadable entry becomes a `ScanWarning`; only an unreadable root fails the scan.
//! - Sizes are computed eagerly so eviction never re-walks directories.

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use looparc_config::DEFAULT_PATTERN;
use walkdir::{DirEntry, WalkDir};

use crate::error::{ArchiveError, ArchiveResult};
use crate::model::{Item, ItemKind, ScanWarning};

/// Name prefix of in-flight copies inside the destination. Never reported as items.
pub const STAGING_PREFIX: &str = ".looparc-partial-";

/// Compiled glob patterns deciding which entries are items.
#[derive(Debug, Clone)]
pub struct ItemSelector {
    patterns: Vec<String>,
    set: GlobSet,
    max_depth: usize,
}

impl ItemSelector {
    /// Compile `patterns`; `*` never crosses a `/`.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Glob` for a malformed pattern and
    /// `ArchiveError::InvalidInput` when no patterns are given.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> ArchiveResult<Self> {
        if patterns.is_empty() {
            return Err(ArchiveError::InvalidInput {
                field: "patterns",
                reason: "empty",
                value: None,
            });
        }
        let mut builder = GlobSetBuilder::new();
        let mut owned = Vec::with_capacity(patterns.len());
        let mut max_depth = 1;
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|source| {
                    ArchiveError::glob("selector.compile", pattern.to_string(), source)
                })?;
            builder.add(glob);
            max_depth = max_depth.max(pattern_depth(pattern));
            owned.push(pattern.to_string());
        }
        let set = builder.build().map_err(|source| {
            ArchiveError::glob("selector.build", owned.join(","), source)
        })?;
        Ok(Self {
            patterns: owned,
            set,
            max_depth,
        })
    }

    /// Selector matching every immediate child of a location.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature mirrors [`ItemSelector::new`].
    pub fn children() -> ArchiveResult<Self> {
        Self::new(&[DEFAULT_PATTERN])
    }

    /// Whether `identifier` is selected.
    #[must_use]
    pub fn is_match(&self, identifier: &str) -> bool {
        self.set.is_match(identifier)
    }

    /// Patterns the selector was compiled from.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Deepest level a pattern can match; `usize::MAX` once `**` appears.
fn pattern_depth(pattern: &str) -> usize {
    if pattern.contains("**") {
        return usize::MAX;
    }
    pattern.trim_matches('/').split('/').count()
}

/// Items found at a location plus the entries that could not be read.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    /// Location that was scanned.
    pub location: PathBuf,
    /// Items sorted by identifier.
    pub items: Vec<Item>,
    /// Entries skipped during the scan.
    pub warnings: Vec<ScanWarning>,
}

impl Inventory {
    /// Sum of item sizes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.items.iter().map(|item| item.size_bytes).sum()
    }

    /// Items ordered oldest first, ties broken by identifier.
    #[must_use]
    pub fn oldest_first(&self) -> Vec<&Item> {
        let mut ordered: Vec<&Item> = self.items.iter().collect();
        ordered.sort_by(|left, right| left.eviction_order(right));
        ordered
    }
}

/// Enumerates the items a selector picks out of a location.
#[derive(Debug, Clone)]
pub struct Scanner {
    selector: ItemSelector,
}

impl Scanner {
    /// Scanner using `selector`.
    #[must_use]
    pub const fn new(selector: ItemSelector) -> Self {
        Self { selector }
    }

    /// Scanner reporting every immediate child; used for the destination.
    ///
    /// # Errors
    ///
    /// Never fails in practice; see [`ItemSelector::children`].
    pub fn children() -> ArchiveResult<Self> {
        ItemSelector::children().map(Self::new)
    }

    /// Selector backing the scanner.
    #[must_use]
    pub const fn selector(&self) -> &ItemSelector {
        &self.selector
    }

    /// Lazily enumerate items under `location`.
    ///
    /// # Errors
    ///
    /// Returns an error when `location` is missing, not a directory, or cannot be listed.
    pub fn iter(&self, location: &Path) -> ArchiveResult<InventoryIter> {
        let metadata = fs::metadata(location)
            .map_err(|source| ArchiveError::io("scan.stat_root", location, source))?;
        if !metadata.is_dir() {
            return Err(ArchiveError::InvalidInput {
                field: "location",
                reason: "not_directory",
                value: Some(location.display().to_string()),
            });
        }
        fs::read_dir(location)
            .map_err(|source| ArchiveError::io("scan.open_root", location, source))?;

        let walker = WalkDir::new(location)
            .min_depth(1)
            .max_depth(self.selector.max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        Ok(InventoryIter {
            root: location.to_path_buf(),
            selector: self.selector.clone(),
            walker,
        })
    }

    /// Enumerate every item under `location`, sorted by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`Scanner::iter`].
    pub fn scan(&self, location: &Path) -> ArchiveResult<Inventory> {
        let mut inventory = Inventory {
            location: location.to_path_buf(),
            ..Inventory::default()
        };
        for entry in self.iter(location)? {
            match entry {
                Ok(item) => inventory.items.push(item),
                Err(warning) => inventory.warnings.push(warning),
            }
        }
        inventory
            .items
            .sort_by(|left, right| left.identifier.cmp(&right.identifier));
        Ok(inventory)
    }
}

/// Lazy item enumeration produced by [`Scanner::iter`].
#[derive(Debug)]
pub struct InventoryIter {
    root: PathBuf,
    selector: ItemSelector,
    walker: walkdir::IntoIter,
}

impl Iterator for InventoryIter {
    type Item = Result<Item, ScanWarning>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    return Some(Err(ScanWarning {
                        path,
                        reason: err.to_string(),
                    }));
                }
            };
            let is_dir = entry.file_type().is_dir();

            if entry
                .file_name()
                .to_string_lossy()
                .starts_with(STAGING_PREFIX)
            {
                if is_dir {
                    self.walker.skip_current_dir();
                }
                continue;
            }

            let identifier = match identifier_for(&self.root, entry.path()) {
                Ok(identifier) => identifier,
                Err(warning) => {
                    if is_dir {
                        self.walker.skip_current_dir();
                    }
                    return Some(Err(warning));
                }
            };

            if self.selector.is_match(&identifier) {
                if is_dir {
                    self.walker.skip_current_dir();
                }
                return Some(build_item(&entry, identifier));
            }
        }
    }
}

fn identifier_for(root: &Path, path: &Path) -> Result<String, ScanWarning> {
    let warning = |reason: &str| ScanWarning {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    let relative = path
        .strip_prefix(root)
        .map_err(|_| warning("entry outside scanned location"))?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(
                segment
                    .to_str()
                    .ok_or_else(|| warning("name is not valid UTF-8"))?,
            ),
            _ => return Err(warning("unexpected path component")),
        }
    }
    Ok(segments.join("/"))
}

fn build_item(entry: &DirEntry, identifier: String) -> Result<Item, ScanWarning> {
    let warning = |reason: String| ScanWarning {
        path: entry.path().to_path_buf(),
        reason,
    };
    let metadata = entry.metadata().map_err(|err| warning(err.to_string()))?;
    let modified = metadata.modified().map_err(|err| warning(err.to_string()))?;
    let file_type = entry.file_type();
    let (kind, size_bytes) = if file_type.is_dir() {
        (ItemKind::Directory, directory_size(entry.path())?)
    } else if file_type.is_symlink() {
        (ItemKind::Symlink, metadata.len())
    } else {
        (ItemKind::File, metadata.len())
    };
    Ok(Item {
        identifier,
        size_bytes,
        age_marker: DateTime::<Utc>::from(modified),
        kind,
    })
}

/// Sum of file and symlink lengths below `path`; any unreadable child fails the whole item.
fn directory_size(path: &Path) -> Result<u64, ScanWarning> {
    let mut total = 0u64;
    for entry in WalkDir::new(path).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|err| ScanWarning {
            path: err
                .path()
                .map_or_else(|| path.to_path_buf(), Path::to_path_buf),
            reason: err.to_string(),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let metadata = entry.metadata().map_err(|err| ScanWarning {
            path: entry.path().to_path_buf(),
            reason: err.to_string(),
        })?;
        total = total.saturating_add(metadata.len());
    }
    Ok(total)
}
