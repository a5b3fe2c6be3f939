//! snapdisk shared - common types for the snapdisk crates
//!
//! Holds the error enum and the constants that the library and the CLI
//! must agree on (tool names, device-mapper naming, environment variables).

pub mod constants;
pub mod errors;

pub use errors::{SnapdiskError, SnapdiskResult, SnapshotStep};
