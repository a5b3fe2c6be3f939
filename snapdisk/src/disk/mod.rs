//! Disk sources and the overlays derived from them.
//!
//! - `Disk` - handle owning a source's scratch space, snapshots and images
//! - `Image` - derived device bound to an introspection session
//! - `SnapshotBuilder` - loop + device-mapper overlays for raw media
//! - `select_tmp_dir` - scratch space selection
//! - `classify_source` - source media classification
//! - `probe_format` - image format detection

pub mod bundle;
pub mod constants;
mod ext4;
pub mod format;
mod handle;
pub mod image;
pub mod qcow2;
pub mod snapshot;
pub mod source;
pub mod tmp;

pub use bundle::{BundleContext, VolumeBundler};
pub use ext4::Ext4Bundler;
pub use format::{ImageFormat, probe_format};
pub use handle::{Disk, DiskBuilder};
pub use image::{Image, ImageOptions, InspectSession, Inspector, PassthroughInspector};
pub use snapshot::{DmSnapshotTable, Persistence, SnapshotBuilder};
pub use source::{SourceKind, classify_source};
pub use tmp::{SpaceProbe, StatvfsProbe, select_tmp_dir};
