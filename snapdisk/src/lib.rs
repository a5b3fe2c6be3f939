//! Snapdisk library.
//!
//! Turns a disk source (a raw or structured image file, a block device, or the
//! live root filesystem) into a safely writable device without ever writing
//! to the source, and tracks every kernel resource acquired along the way so
//! that [`Disk::cleanup`] can release all of it in reverse order.

pub mod disk;
pub mod ledger;
pub mod options;
pub mod runner;
pub mod util;

pub use disk::{
    BundleContext, Disk, DiskBuilder, Ext4Bundler, Image, ImageFormat, ImageOptions,
    InspectSession, Inspector, PassthroughInspector, SourceKind, SpaceProbe, StatvfsProbe,
    VolumeBundler, classify_source, probe_format, select_tmp_dir,
};
pub use ledger::{CleanupAction, CleanupFailure, CleanupReport, LedgerEntry, ResourceLedger};
pub use options::SnapdiskOptions;
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use snapdisk_shared::errors::{SnapdiskError, SnapdiskResult, SnapshotStep};

/// Snapdisk library version (from CARGO_PKG_VERSION at compile time).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
