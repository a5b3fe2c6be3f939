//! Error types shared across the snapdisk crates.
//!
//! Errors are grouped by when they surface:
//! - construction and snapshot errors are fatal to the current operation
//!   and propagate to the caller
//! - release errors ([`SnapdiskError::ResourceBusy`], [`SnapdiskError::Command`]
//!   raised while unwinding) are logged per ledger entry and never abort cleanup

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout snapdisk.
pub type SnapdiskResult<T> = Result<T, SnapdiskError>;

/// Step of snapshot construction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStep {
    /// Probing the on-disk image format.
    ProbeFormat,
    /// Creating a derived (qcow2 child) snapshot for a non-raw image.
    DerivedSnapshot,
    /// Attaching the origin file to a loop device.
    AttachOrigin,
    /// Querying the origin device size in sectors.
    QuerySize,
    /// Allocating the sparse copy-on-write backing file.
    AllocateCow,
    /// Attaching the copy-on-write file to a loop device.
    AttachCow,
    /// Creating the device-mapper snapshot target.
    CreateMapping,
}

impl SnapshotStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotStep::ProbeFormat => "probe format",
            SnapshotStep::DerivedSnapshot => "derived snapshot",
            SnapshotStep::AttachOrigin => "attach origin",
            SnapshotStep::QuerySize => "query size",
            SnapshotStep::AllocateCow => "allocate cow",
            SnapshotStep::AttachCow => "attach cow",
            SnapshotStep::CreateMapping => "create mapping",
        }
    }
}

impl fmt::Display for SnapshotStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by snapdisk.
#[derive(Debug, Error)]
pub enum SnapdiskError {
    /// Source is neither a directory, a regular file nor a block device.
    #[error(
        "unsupported media source {}: only block devices, regular files and directories are supported",
        .path.display()
    )]
    UnsupportedMediaSource { path: PathBuf },

    /// Directory source other than the live root filesystem.
    #[error(
        "unsupported directory source {}: only the live root filesystem (/) can be used",
        .path.display()
    )]
    UnsupportedDirectorySource { path: PathBuf },

    /// None of the temporary location candidates is writable.
    #[error("no usable temporary location among [{}]", join_paths(.candidates))]
    NoUsableTempLocation { candidates: Vec<PathBuf> },

    /// A step of loop/device-mapper setup failed.
    #[error("snapshot construction failed at {step}: {reason}")]
    SnapshotConstructionFailed { step: SnapshotStep, reason: String },

    /// Operation attempted after the disk was cleaned up.
    #[error("disk has already been cleaned up")]
    DiskAlreadyCleanedUp,

    /// Device is still in use (typically a device-mapper remove racing in-flight I/O).
    #[error("resource busy: {0}")]
    ResourceBusy(String),

    /// Image handle is not owned by this disk.
    #[error("image {0} is not tracked by this disk")]
    ImageNotTracked(u64),

    /// External tool is not installed.
    #[error("required tool '{0}' not found in PATH")]
    ToolNotFound(String),

    /// External tool exited unsuccessfully.
    #[error("{program} failed (exit {}): {stderr}", exit_code(.status))]
    Command {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    /// Path cannot be passed to an external tool.
    #[error("invalid path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("storage: {0}")]
    Storage(String),

    #[error("config: {0}")]
    Config(String),

    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl SnapdiskError {
    /// Wrap an error as a snapshot construction failure at `step`.
    ///
    /// Already-wrapped failures and cleanup-state errors pass through unchanged.
    pub fn at_step(self, step: SnapshotStep) -> Self {
        match self {
            e @ SnapdiskError::SnapshotConstructionFailed { .. } => e,
            e @ SnapdiskError::DiskAlreadyCleanedUp => e,
            other => SnapdiskError::SnapshotConstructionFailed {
                step,
                reason: other.to_string(),
            },
        }
    }
}

fn exit_code(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
