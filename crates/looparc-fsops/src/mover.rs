//! Single-item transfer from a source into the destination.
//!
//! # Design
//! - Same volume: one atomic rename.
//! - Across volumes: copy into a `STAGING_PREFIX` entry, publish it with a rename,
//!   sync the destination directory, and only then remove the source.
//! - Any failure before publication removes the staging entry; the source is never
//!   touched until the published copy is durable.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ArchiveError, ArchiveResult};
use crate::fs::FileSystem;
use crate::model::{FailureKind, Item, ItemFailure, ItemKind, MovedItem, TransferMethod};
use crate::scanner::STAGING_PREFIX;

/// Moves items into a destination through a [`FileSystem`].
pub struct Mover<'a> {
    fs: &'a dyn FileSystem,
    dry_run: bool,
}

impl<'a> Mover<'a> {
    /// Mover writing through `fs`; a dry run stops after the collision check.
    #[must_use]
    pub const fn new(fs: &'a dyn FileSystem, dry_run: bool) -> Self {
        Self { fs, dry_run }
    }

    /// Move `item` from the `from` location into the `to` location.
    ///
    /// The item keeps its final name component. Existing destination entries are
    /// never replaced.
    ///
    /// # Errors
    ///
    /// Returns an [`ItemFailure`] tagged `name_collision` or `move_failure`; the
    /// source is left in place in every failure case except a failed source removal,
    /// where both copies remain.
    pub fn move_item(&self, item: &Item, from: &Path, to: &Path) -> Result<MovedItem, ItemFailure> {
        let source = item.path_in(from);
        let name = item.file_name();
        let target = to.join(name);
        ensure_vacant(item, &target)?;

        let moved = |method| MovedItem {
            identifier: item.identifier.clone(),
            destination_name: name.to_string(),
            size_bytes: item.size_bytes,
            method,
        };
        if self.dry_run {
            return Ok(moved(TransferMethod::Planned));
        }

        match self.fs.rename(&source, &target) {
            Ok(()) => {
                self.sync_best_effort(to);
                if let Some(parent) = source.parent() {
                    self.sync_best_effort(parent);
                }
                debug!(item = %item.identifier, "renamed into destination");
                Ok(moved(TransferMethod::Rename))
            }
            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                self.copy_across(item, &source, &target, to)?;
                debug!(item = %item.identifier, "copied into destination");
                Ok(moved(TransferMethod::Copy))
            }
            Err(err) => Err(move_failure(item, "rename", err.to_string())),
        }
    }

    fn copy_across(
        &self,
        item: &Item,
        source: &Path,
        target: &Path,
        to: &Path,
    ) -> Result<(), ItemFailure> {
        let staging = to.join(format!("{STAGING_PREFIX}{}", item.file_name()));
        if let Err(err) = self.stage(item.kind, source, &staging) {
            self.discard(&staging);
            return Err(move_failure(
                item,
                err.operation().unwrap_or("stage"),
                err.detail(),
            ));
        }

        // Something may have claimed the name while the copy ran.
        if let Err(failure) = ensure_vacant(item, target) {
            self.discard(&staging);
            return Err(failure);
        }
        if let Err(err) = self.fs.rename(&staging, target) {
            self.discard(&staging);
            return Err(move_failure(item, "publish", err.to_string()));
        }
        if let Err(err) = self.fs.sync_dir(to) {
            return Err(move_failure(item, "sync_destination", err.to_string()));
        }

        let removed = match item.kind {
            ItemKind::Directory => self.fs.remove_dir_all(source),
            ItemKind::File | ItemKind::Symlink => self.fs.remove_file(source),
        };
        if let Err(err) = removed {
            return Err(move_failure(item, "remove_source", err.to_string()));
        }
        if let Some(parent) = source.parent() {
            self.sync_best_effort(parent);
        }
        Ok(())
    }

    fn stage(&self, kind: ItemKind, source: &Path, staging: &Path) -> ArchiveResult<()> {
        if fs::symlink_metadata(staging).is_ok() {
            self.remove_entry(staging)
                .map_err(|err| ArchiveError::io("stage.clear_leftover", staging, err))?;
        }
        match kind {
            ItemKind::File => self.copy_file(source, staging),
            ItemKind::Symlink => self
                .fs
                .copy_symlink(source, staging)
                .map_err(|err| ArchiveError::io("stage.copy_symlink", staging, err)),
            ItemKind::Directory => self.copy_tree(source, staging),
        }
    }

    fn copy_file(&self, source: &Path, target: &Path) -> ArchiveResult<()> {
        let modified = fs::metadata(source)
            .and_then(|metadata| metadata.modified())
            .map_err(|err| ArchiveError::io("stage.read_metadata", source, err))?;
        self.fs
            .copy_file(source, target)
            .map_err(|err| ArchiveError::io("stage.copy_file", target, err))?;
        self.fs
            .set_modified(target, modified)
            .map_err(|err| ArchiveError::io("stage.preserve_mtime", target, err))
    }

    fn copy_tree(&self, source: &Path, staging: &Path) -> ArchiveResult<()> {
        let mut directories: Vec<(PathBuf, SystemTime)> = Vec::new();
        for entry in WalkDir::new(source).follow_links(false) {
            let entry = entry.map_err(|err| ArchiveError::walkdir("stage.walk", source, err))?;
            let relative =
                entry
                    .path()
                    .strip_prefix(source)
                    .map_err(|_| ArchiveError::InvalidInput {
                        field: "source_path",
                        reason: "strip_prefix",
                        value: Some(entry.path().to_string_lossy().into_owned()),
                    })?;
            let target = staging.join(relative);
            let file_type = entry.file_type();
            if file_type.is_dir() {
                let modified = entry
                    .metadata()
                    .map_err(|err| ArchiveError::walkdir("stage.read_metadata", entry.path(), err))?
                    .modified()
                    .map_err(|err| ArchiveError::io("stage.read_metadata", entry.path(), err))?;
                self.fs
                    .create_dir(&target)
                    .map_err(|err| ArchiveError::io("stage.create_dir", &target, err))?;
                directories.push((target, modified));
            } else if file_type.is_symlink() {
                self.fs
                    .copy_symlink(entry.path(), &target)
                    .map_err(|err| ArchiveError::io("stage.copy_symlink", &target, err))?;
            } else {
                self.copy_file(entry.path(), &target)?;
            }
        }

        // Children first; creating entries bumps the parent's mtime.
        for (directory, modified) in directories.iter().rev() {
            self.fs
                .set_modified(directory, *modified)
                .map_err(|err| ArchiveError::io("stage.preserve_mtime", directory, err))?;
        }
        Ok(())
    }

    fn remove_entry(&self, path: &Path) -> io::Result<()> {
        if fs::symlink_metadata(path)?.is_dir() {
            self.fs.remove_dir_all(path)
        } else {
            self.fs.remove_file(path)
        }
    }

    fn discard(&self, staging: &Path) {
        match self.remove_entry(staging) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %staging.display(), error = %err, "failed to discard staging entry");
            }
        }
    }

    fn sync_best_effort(&self, directory: &Path) {
        if let Err(err) = self.fs.sync_dir(directory) {
            warn!(path = %directory.display(), error = %err, "directory sync failed");
        }
    }
}

/// Fail with `NameCollision` when `target` already exists.
///
/// `rename` replaces an existing file or empty directory on unix, so this check
/// is the only thing keeping destination entries intact. It holds as long as no
/// other writer creates entries in the destination during a pass; concurrent
/// passes against one destination must be serialized by the caller.
fn ensure_vacant(item: &Item, target: &Path) -> Result<(), ItemFailure> {
    match fs::symlink_metadata(target) {
        Ok(_) => Err(ItemFailure::new(
            &item.identifier,
            FailureKind::NameCollision,
            "inspect_destination",
            format!("{} already exists", target.display()),
        )),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(move_failure(item, "inspect_destination", err.to_string())),
    }
}

fn move_failure(item: &Item, operation: &'static str, detail: String) -> ItemFailure {
    ItemFailure::new(&item.identifier, FailureKind::MoveFailure, operation, detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFs;
    use crate::fs::fault::FaultyFs;
    use crate::scanner::{ItemSelector, Scanner};
    use looparc_test_support::fixtures::{entry_names, set_mtime, temp_dir, write_file};
    use std::time::{Duration, UNIX_EPOCH};

    struct Locations {
        _root: tempfile::TempDir,
        source: PathBuf,
        destination: PathBuf,
    }

    fn locations() -> anyhow::Result<Locations> {
        let root = temp_dir("mover")?;
        let source = root.path().join("source");
        let destination = root.path().join("destination");
        fs::create_dir(&source)?;
        fs::create_dir(&destination)?;
        Ok(Locations {
            _root: root,
            source,
            destination,
        })
    }

    fn only_item(location: &Path, pattern: &str) -> anyhow::Result<Item> {
        let inventory = Scanner::new(ItemSelector::new(&[pattern])?).scan(location)?;
        inventory
            .items
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no item matched {pattern}"))
    }

    fn mtime(path: &Path) -> anyhow::Result<SystemTime> {
        Ok(fs::metadata(path)?.modified()?)
    }

    #[test]
    fn same_volume_move_renames() -> anyhow::Result<()> {
        let loc = locations()?;
        write_file(&loc.source, "a.bin", 10, 1_000)?;
        let item = only_item(&loc.source, "*")?;

        let moved = Mover::new(&LocalFs, false).move_item(&item, &loc.source, &loc.destination)?;
        assert_eq!(moved.method, TransferMethod::Rename);
        assert_eq!(moved.destination_name, "a.bin");
        assert!(entry_names(&loc.source)?.is_empty());
        assert_eq!(
            mtime(&loc.destination.join("a.bin"))?,
            UNIX_EPOCH + Duration::from_secs(1_000)
        );
        Ok(())
    }

    #[test]
    fn nested_items_keep_their_final_name() -> anyhow::Result<()> {
        let loc = locations()?;
        write_file(&loc.source, "DCIM/100/clip.mp4", 4, 5)?;
        let item = only_item(&loc.source, "**/*.mp4")?;

        let moved = Mover::new(&LocalFs, false).move_item(&item, &loc.source, &loc.destination)?;
        assert_eq!(moved.identifier, "DCIM/100/clip.mp4");
        assert_eq!(entry_names(&loc.destination)?, vec!["clip.mp4".to_string()]);
        assert!(loc.source.join("DCIM/100").is_dir());
        Ok(())
    }

    #[test]
    fn cross_volume_directory_copy_preserves_tree_and_mtimes() -> anyhow::Result<()> {
        let loc = locations()?;
        write_file(&loc.source, "album/a.jpg", 3, 100)?;
        write_file(&loc.source, "album/raw/b.cr2", 7, 150)?;
        set_mtime(&loc.source.join("album/raw"), 180)?;
        set_mtime(&loc.source.join("album"), 200)?;
        let item = only_item(&loc.source, "*")?;

        let fs = FaultyFs::cross_device();
        let moved = Mover::new(&fs, false).move_item(&item, &loc.source, &loc.destination)?;
        assert_eq!(moved.method, TransferMethod::Copy);
        assert_eq!(moved.size_bytes, 10);

        let album = loc.destination.join("album");
        assert_eq!(fs::read(album.join("a.jpg"))?.len(), 3);
        assert_eq!(fs::read(album.join("raw/b.cr2"))?.len(), 7);
        assert_eq!(mtime(&album)?, UNIX_EPOCH + Duration::from_secs(200));
        assert_eq!(mtime(&album.join("raw"))?, UNIX_EPOCH + Duration::from_secs(180));
        assert_eq!(mtime(&album.join("a.jpg"))?, UNIX_EPOCH + Duration::from_secs(100));
        assert_eq!(entry_names(&loc.destination)?, vec!["album".to_string()]);
        assert!(entry_names(&loc.source)?.is_empty());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn cross_volume_copy_handles_read_only_files() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let loc = locations()?;
        let source_file = write_file(&loc.source, "a.log", 6, 300)?;
        fs::set_permissions(&source_file, fs::Permissions::from_mode(0o444))?;
        let item = only_item(&loc.source, "*")?;

        let fs = FaultyFs::cross_device();
        let moved = Mover::new(&fs, false).move_item(&item, &loc.source, &loc.destination)?;
        assert_eq!(moved.method, TransferMethod::Copy);

        let archived = loc.destination.join("a.log");
        assert_eq!(fs::read(&archived)?.len(), 6);
        assert_eq!(mtime(&archived)?, UNIX_EPOCH + Duration::from_secs(300));
        assert_eq!(fs::metadata(&archived)?.permissions().mode() & 0o777, 0o444);
        assert!(entry_names(&loc.source)?.is_empty());
        Ok(())
    }

    #[test]
    fn interrupted_copy_removes_staging_and_keeps_source()-> anyhow::Result<()> {
        let loc = locations()?;
        write_file(&loc.source, "album/a.jpg", 3, 100)?;
        write_file(&loc.source, "album/b.jpg", 3, 100)?;
        let item = only_item(&loc.source, "*")?;

        let fs = FaultyFs::cross_device();
        fs.fail_copy_after.set(Some(1));
        let failure = Mover::new(&fs, false)
            .move_item(&item, &loc.source, &loc.destination)
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected copy failure"))?;

        assert_eq!(failure.kind, FailureKind::MoveFailure);
        assert_eq!(failure.operation, "stage.copy_file");
        assert!(entry_names(&loc.destination)?.is_empty());
        assert_eq!(
            entry_names(&loc.source.join("album"))?,
            vec!["a.jpg".to_string(), "b.jpg".to_string()]
        );
        Ok(())
    }

    #[test]
    fn existing_destination_entry_is_a_collision() -> anyhow::Result<()> {
        let loc = locations()?;
        write_file(&loc.source, "a.bin", 10, 1)?;
        write_file(&loc.destination, "a.bin", 3, 2)?;
        let item = only_item(&loc.source, "*")?;

        let failure = Mover::new(&LocalFs, false)
            .move_item(&item, &loc.source, &loc.destination)
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected collision"))?;
        assert_eq!(failure.kind, FailureKind::NameCollision);
        assert_eq!(fs::read(loc.source.join("a.bin"))?.len(), 10);
        assert_eq!(fs::read(loc.destination.join("a.bin"))?.len(), 3);
        Ok(())
    }

    #[test]
    fn failed_source_removal_leaves_both_copies() -> anyhow::Result<()> {
        let loc = locations()?;
        let source_file = write_file(&loc.source, "a.bin", 10, 1)?;
        let item = only_item(&loc.source, "*")?;

        let fs = FaultyFs::cross_device();
        fs.fail_removal_of(&source_file);
        let failure = Mover::new(&fs, false)
            .move_item(&item, &loc.source, &loc.destination)
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected removal failure"))?;
        assert_eq!(failure.operation, "remove_source");
        assert!(source_file.exists());
        assert_eq!(fs::read(loc.destination.join("a.bin"))?.len(), 10);
        Ok(())
    }

    #[test]
    fn unsynced_destination_keeps_source() -> anyhow::Result<()> {
        let loc = locations()?;
        let source_file = write_file(&loc.source, "a.bin", 10, 1)?;
        let item = only_item(&loc.source, "*")?;

        let fs = FaultyFs::cross_device();
        fs.fail_sync.set(true);
        let failure = Mover::new(&fs, false)
            .move_item(&item, &loc.source, &loc.destination)
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected sync failure"))?;
        assert_eq!(failure.operation, "sync_destination");
        assert!(source_file.exists());
        assert!(fs.removed.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn other_rename_errors_do_not_fall_back_to_copy() -> anyhow::Result<()> {
        let loc = locations()?;
        let source_file = write_file(&loc.source, "a.bin", 10, 1)?;
        let item = only_item(&loc.source, "*")?;

        let fs = FaultyFs::default();
        fs.rename_error.set(Some(io::ErrorKind::PermissionDenied));
        let failure = Mover::new(&fs, false)
            .move_item(&item, &loc.source, &loc.destination)
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected rename failure"))?;
        assert_eq!(failure.operation, "rename");
        assert!(source_file.exists());
        assert!(entry_names(&loc.destination)?.is_empty());
        Ok(())
    }

    #[test]
    fn dry_run_plans_without_touching_anything() -> anyhow::Result<()> {
        let loc = locations()?;
        let source_file = write_file(&loc.source, "a.bin", 10, 1)?;
        let item = only_item(&loc.source, "*")?;

        let moved = Mover::new(&LocalFs, true).move_item(&item, &loc.source, &loc.destination)?;
        assert_eq!(moved.method, TransferMethod::Planned);
        assert!(source_file.exists());
        assert!(entry_names(&loc.destination)?.is_empty());
        Ok(())
    }
}
