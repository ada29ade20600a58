//! Temporary directory trees for archival tests.
//!
//! Modification times are given in whole seconds since the Unix epoch so tests
//! can state eviction order directly.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tempfile::TempDir;

/// Create a fresh temporary directory whose name starts with `looparc-<label>-`.
///
/// # Errors
///
/// Returns an error when the directory cannot be created.
pub fn temp_dir(label: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(&format!("looparc-{label}-"))
        .tempdir()
        .context("failed to create temporary directory")
}

/// Write `size` bytes to `root/relative`, creating parent directories, and
/// stamp the file with `mtime_secs`.
///
/// Returns the path of the written file.
///
/// # Errors
///
/// Returns an error when any directory or the file cannot be written.
pub fn write_file(root: &Path, relative: &str, size: usize, mtime_secs: u64) -> Result<PathBuf> {
    let path = relative
        .split('/')
        .fold(root.to_path_buf(), |path, segment| path.join(segment));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, vec![b'x'; size])
        .with_context(|| format!("failed to write {}", path.display()))?;
    set_mtime(&path, mtime_secs)?;
    Ok(path)
}

/// Set the modification time of a file or directory to `secs` after the epoch.
///
/// # Errors
///
/// Returns an error when the entry cannot be opened or stamped.
pub fn set_mtime(path: &Path, secs: u64) -> Result<()> {
    let stamp = epoch_secs(secs);
    let handle = if path.is_dir() {
        File::open(path)
    } else {
        File::options().write(true).open(path)
    }
    .with_context(|| format!("failed to open {}", path.display()))?;
    handle
        .set_modified(stamp)
        .with_context(|| format!("failed to stamp {}", path.display()))
}

/// `SystemTime` for `secs` after the Unix epoch.
#[must_use]
pub fn epoch_secs(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

/// Sorted names of the immediate children of `dir`.
///
/// # Errors
///
/// Returns an error when the directory cannot be listed.
pub fn entry_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .map(|entry| {
            entry
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .context("failed to read directory entry")
        })
        .collect::<Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_file_creates_parents_and_stamps_mtime() -> Result<()> {
        let temp = temp_dir("fixtures")?;
        let path = write_file(temp.path(), "a/b/c.bin", 12, 42)?;
        assert_eq!(path, temp.path().join("a").join("b").join("c.bin"));
        assert_eq!(fs::metadata(&path)?.len(), 12);
        assert_eq!(fs::metadata(&path)?.modified()?, epoch_secs(42));
        Ok(())
    }

    #[test]
    fn set_mtime_handles_directories() -> Result<()> {
        let temp = temp_dir("fixtures-dir")?;
        write_file(temp.path(), "dir/inner", 1, 1)?;
        let dir = temp.path().join("dir");
        set_mtime(&dir, 7)?;
        assert_eq!(fs::metadata(&dir)?.modified()?, epoch_secs(7));
        Ok(())
    }

    #[test]
    fn entry_names_are_sorted() -> Result<()> {
        let temp = temp_dir("fixtures-names")?;
        write_file(temp.path(), "b", 1, 1)?;
        write_file(temp.path(), "a", 1, 1)?;
        assert_eq!(entry_names(temp.path())?, vec!["a", "b"]);
        Ok(())
    }
}
