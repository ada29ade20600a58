//! Device-backed sources mounted for the duration of a pass.
//!
//! Mount and unmount go through [`CommandRunner`] so tests never need root.
//! The mount point is a fresh temporary directory that is removed with a
//! non-recursive `remove_dir` once the device is unmounted; a still-mounted
//! filesystem is never deleted through it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use looparc_config::DeviceSpec;
use tracing::{info, warn};

use crate::error::{ArchiveError, ArchiveResult};

const MOUNT_POINT_PREFIX: &str = "looparc-mount-";

/// Captured result of an external command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub status: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0))
    }
}

/// Runs external commands, given as a full argument vector.
pub trait CommandRunner {
    /// Run `args[0]` with the remaining arguments and wait for it.
    ///
    /// # Errors
    ///
    /// Returns an error when the process cannot be spawned. A non-zero exit is
    /// reported through [`CommandOutput::status`], not as an error.
    fn run(&self, args: &[String]) -> io::Result<CommandOutput>;
}

/// [`CommandRunner`] that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, args: &[String]) -> io::Result<CommandOutput> {
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
        let output = Command::new(program).args(rest).output()?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn mount_args(device: &Path, mount_point: &Path, options: &[String]) -> Vec<String> {
    let mut args = vec!["sudo".to_string(), "mount".to_string()];
    if !options.is_empty() {
        args.push("-o".to_string());
        args.push(options.join(","));
    }
    args.push(device.display().to_string());
    args.push(mount_point.display().to_string());
    args
}

fn unmount_args(mount_point: &Path) -> Vec<String> {
    vec![
        "sudo".to_string(),
        "umount".to_string(),
        mount_point.display().to_string(),
    ]
}

fn run_checked(
    runner: &dyn CommandRunner,
    operation: &'static str,
    path: &Path,
    args: Vec<String>,
) -> ArchiveResult<()> {
    let output = runner
        .run(&args)
        .map_err(|err| ArchiveError::io(operation, path, err))?;
    if output.success() {
        return Ok(());
    }
    Err(ArchiveError::Command {
        operation,
        args,
        status: output.status,
        stderr: output.stderr,
    })
}

/// A device mounted on a temporary directory; unmounted on drop.
pub struct MountedSource<'a> {
    runner: &'a dyn CommandRunner,
    mount_point: PathBuf,
    mounted: bool,
}

impl<'a> MountedSource<'a> {
    /// Mount `device` on a new temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the mount point cannot be created or the mount
    /// command fails. The mount point is removed again in either case.
    pub fn mount(runner: &'a dyn CommandRunner, device: &DeviceSpec) -> ArchiveResult<Self> {
        let mount_point = tempfile::Builder::new()
            .prefix(MOUNT_POINT_PREFIX)
            .tempdir()
            .map_err(|err| ArchiveError::io("mount.create_mount_point", std::env::temp_dir(), err))?
            .keep();
        let device_path = device.device_path();
        if let Err(err) = run_checked(
            runner,
            "mount",
            &mount_point,
            mount_args(&device_path, &mount_point, &device.mount_options),
        ) {
            remove_mount_point(&mount_point);
            return Err(err);
        }
        info!(
            device = %device_path.display(),
            mount_point = %mount_point.display(),
            "mounted source device"
        );
        Ok(Self {
            runner,
            mount_point,
            mounted: true,
        })
    }

    /// Directory the device is mounted on.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.mount_point
    }

    /// Unmount the device and remove the mount point.
    ///
    /// # Errors
    ///
    /// Returns an error when `umount` fails; the mount point is then left in place.
    pub fn unmount(mut self) -> ArchiveResult<()> {
        self.release()
    }

    fn release(&mut self) -> ArchiveResult<()> {
        if !self.mounted {
            return Ok(());
        }
        self.mounted = false;
        run_checked(
            self.runner,
            "unmount",
            &self.mount_point,
            unmount_args(&self.mount_point),
        )?;
        remove_mount_point(&self.mount_point);
        info!(mount_point = %self.mount_point.display(), "unmounted source device");
        Ok(())
    }
}

impl Drop for MountedSource<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(error = %err.detail(), "failed to unmount source device");
        }
    }
}

fn remove_mount_point(mount_point: &Path) {
    if let Err(err) = fs::remove_dir(mount_point) {
        warn!(
            mount_point = %mount_point.display(),
            error = %err,
            "failed to remove mount point"
        );
    }
}


#[cfg(test)]
mod tests {
    use super::recording::{RecordingRunner, subcommands};
    use super::*;

    fn device() -> DeviceSpec {
        DeviceSpec {
            uuid: "1234-ABCD".to_string(),
            path_format: looparc_config::DEFAULT_DEVICE_PATH_FORMAT.to_string(),
            mount_options: vec!["umask=000".to_string(), "ro".to_string()],
        }
    }

    #[test]
    fn mount_args_include_joined_options() {
        let args = mount_args(
            Path::new("/dev/sdb1"),
            Path::new("/tmp/mp"),
            &["umask=000".to_string(), "ro".to_string()],
        );
        assert_eq!(
            args,
            vec!["sudo", "mount", "-o", "umask=000,ro", "/dev/sdb1", "/tmp/mp"]
        );
        assert_eq!(
            mount_args(Path::new("/dev/sdb1"), Path::new("/tmp/mp"), &[]),
            vec!["sudo", "mount", "/dev/sdb1", "/tmp/mp"]
        );
    }

    #[test]
    fn mount_then_unmount_cleans_up() -> anyhow::Result<()> {
        let runner = RecordingRunner::default();
        let mounted = MountedSource::mount(&runner, &device())?;
        let mount_point = mounted.path().to_path_buf();
        assert!(mount_point.is_dir());

        mounted.unmount()?;
        assert!(!mount_point.exists());
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0][4], "/dev/disk/by-uuid/1234-ABCD");
        assert_eq!(calls[0][5], mount_point.display().to_string());
        assert_eq!(calls[1], unmount_args(&mount_point));
        Ok(())
    }

    #[test]
    fn failed_mount_removes_mount_point() {
        let runner = RecordingRunner::failing();
        let result = MountedSource::mount(&runner, &device());
        assert!(matches!(
            result,
            Err(ArchiveError::Command {
                operation: "mount",
                status: Some(32),
                ..
            })
        ));
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(!Path::new(&calls[0][5]).exists());
    }

    #[test]
    fn drop_unmounts() -> anyhow::Result<()> {
        let runner = RecordingRunner::default();
        {
            let _mounted = MountedSource::mount(&runner, &device())?;
        }
        assert_eq!(subcommands(&runner.calls), vec!["mount", "umount"]);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_status_and_output() -> anyhow::Result<()> {
        let args: Vec<String> = ["sh", "-c", "echo out; echo err >&2; exit 3"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let output = SystemCommandRunner.run(&args)?;
        assert_eq!(output.status, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(SystemCommandRunner.run(&[]).is_err());
        Ok(())
    }
}
