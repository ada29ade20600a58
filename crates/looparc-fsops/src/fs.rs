//! Mutating filesystem calls used by the mover and evictor.
//!
//! Reads (directory walks, metadata) go straight to `std::fs`/`walkdir`; every
//! call that changes a location goes through [`FileSystem`] so tests can
//! inject failures at a precise step.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Filesystem mutations required by an archival pass.
pub trait FileSystem {
    /// Atomically rename `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns the underlying error; `ErrorKind::CrossesDevices` signals that
    /// a copy is required instead.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Create a single directory.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when the directory cannot be created.
    fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// Copy a regular file and flush it to stable storage.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when the copy or flush fails.
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64>;

    /// Recreate the symbolic link `from` at `to` without following it.
    ///
    /// # Errors
    ///
    /// Returns the underlying error, or `Unsupported` on platforms without
    /// symlink creation.
    fn copy_symlink(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Set the modification time of a file or directory.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when the timestamp cannot be applied.
    fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()>;

    /// Remove a file or symbolic link.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when removal fails.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove a directory and everything below it.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when removal fails.
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Flush directory entries (renames, creations) to stable storage.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when the directory cannot be synced.
    fn sync_dir(&self, path: &Path) -> io::Result<()>;
}

/// [`FileSystem`] backed by the local operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        let copied = fs::copy(from, to)?;
        // `fs::copy` carries the permission bits over, so the copy may be read-only.
        File::open(to)?.sync_all()?;
        Ok(copied)
    }

    #[cfg(unix)]
    fn copy_symlink(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(fs::read_link(from)?, to)
    }

    #[cfg(not(unix))]
    fn copy_symlink(&self, _from: &Path, _to: &Path) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symlink copies are only supported on unix",
        ))
    }

    fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()> {
        // Setting explicit times needs ownership, not write access.
        File::open(path)?.set_modified(modified)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }

    #[cfg(unix)]
    fn sync_dir(&self, path: &Path) -> io::Result<()> {
        File::open(path)?.sync_all()
    }

    #[cfg(not(unix))]
    fn sync_dir(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fault {
    //! Fault-injecting wrapper around [`LocalFs`] for unit tests.

    use super::{FileSystem, LocalFs};
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::time::SystemTime;

    #[derive(Default)]
    pub(crate) struct FaultyFs {
        inner: LocalFs,
        pub(crate) rename_error: Cell<Option<io::ErrorKind>>,
        pub(crate) fail_copy_after: Cell<Option<usize>>,
        pub(crate) fail_sync: Cell<bool>,
        pub(crate) fail_remove: RefCell<HashSet<PathBuf>>,
        copies: Cell<usize>,
        pub(crate) removed: RefCell<Vec<PathBuf>>,
    }

    impl FaultyFs {
        pub(crate) fn cross_device() -> Self {
            let fs = Self::default();
            fs.rename_error.set(Some(io::ErrorKind::CrossesDevices));
            fs
        }

        pub(crate) fn fail_removal_of(&self, path: impl Into<PathBuf>) {
            self.fail_remove.borrow_mut().insert(path.into());
        }

        fn check_remove(&self, path: &Path) -> io::Result<()> {
            if self.fail_remove.borrow().contains(path) {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "injected removal failure",
                ));
            }
            self.removed.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    impl FileSystem for FaultyFs {
        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            // Only the first rename is faulted; publishing a staged copy must succeed.
            if let Some(kind) = self.rename_error.take() {
                return Err(io::Error::new(kind, "injected rename failure"));
            }
            self.inner.rename(from, to)
        }

        fn create_dir(&self, path: &Path) -> io::Result<()> {
            self.inner.create_dir(path)
        }

        fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
            let attempt = self.copies.get();
            self.copies.set(attempt + 1);
            if self.fail_copy_after.get().is_some_and(|limit| attempt >= limit) {
                // Leave a truncated file behind, as an interrupted copy would.
                std::fs::write(to, b"partial")?;
                return Err(io::Error::new(io::ErrorKind::StorageFull, "injected copy failure"));
            }
            self.inner.copy_file(from, to)
        }

        fn copy_symlink(&self, from: &Path, to: &Path) -> io::Result<()> {
            self.inner.copy_symlink(from, to)
        }

        fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()> {
            self.inner.set_modified(path, modified)
        }

        fn remove_file(&self, path: &Path) -> io::Result<()> {
            self.check_remove(path)?;
            self.inner.remove_file(path)
        }

        fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
            self.check_remove(path)?;
            self.inner.remove_dir_all(path)
        }

        fn sync_dir(&self, path: &Path) -> io::Result<()> {
            if self.fail_sync.get() {
                return Err(io::Error::other("injected sync failure"));
            }
            self.inner.sync_dir(path)
        }
    }
}
