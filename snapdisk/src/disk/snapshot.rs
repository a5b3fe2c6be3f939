//! Copy-on-write snapshots of raw images and block devices.
//!
//! Raw sources are exposed through a device-mapper `snapshot` target whose
//! origin is the source device and whose exception store is a sparse file in
//! the scratch directory, attached through a loop device. Non-raw images get a
//! derived qcow2 child instead.
//!
//! Every acquired resource is registered with the ledger before the next step
//! starts. A failing step leaves earlier registrations in place; the disk's
//! cleanup releases them.

use std::fmt;
use std::path::{Path, PathBuf};

use snapdisk_shared::constants::{mapper, scratch, tools};
use snapdisk_shared::errors::{SnapdiskError, SnapdiskResult, SnapshotStep};

use super::constants::snapshot::SECTOR_SIZE;
use super::format::{ImageFormat, probe_format};
use super::qcow2::create_derived_snapshot;
use super::source::is_block_device;
use crate::ledger::{CleanupAction, ResourceLedger, path_arg};
use crate::runner::{CommandRunner, run_checked};
use crate::util::unique_hex;

/// Exception store persistence of a device-mapper snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Survives reboots (`p`).
    Persistent,
    /// Discarded when the target is removed (`n`).
    Transient,
}

impl Persistence {
    pub fn as_flag(&self) -> &'static str {
        match self {
            Persistence::Persistent => "p",
            Persistence::Transient => "n",
        }
    }
}

/// Table line of a device-mapper `snapshot` target.
///
/// Renders as `<start> <length> snapshot <origin> <cow> <p|n> <chunk>`, with
/// start and length in 512-byte sectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmSnapshotTable {
    pub length_sectors: u64,
    pub origin: PathBuf,
    pub cow: PathBuf,
    pub persistence: Persistence,
    pub chunk_sectors: u64,
}

impl fmt::Display for DmSnapshotTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0 {} snapshot {} {} {} {}",
            self.length_sectors,
            self.origin.display(),
            self.cow.display(),
            self.persistence.as_flag(),
            self.chunk_sectors
        )
    }
}

/// Globally unique device-mapper target name.
pub fn unique_snapshot_name() -> String {
    format!("{}{}", mapper::SNAPSHOT_PREFIX, unique_hex())
}

/// Builds overlays over a working file, registering every resource with `ledger`.
pub struct SnapshotBuilder<'a> {
    runner: &'a dyn CommandRunner,
    ledger: &'a ResourceLedger,
    scratch: &'a Path,
    chunk_sectors: u64,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        ledger: &'a ResourceLedger,
        scratch: &'a Path,
        chunk_sectors: u64,
    ) -> Self {
        Self {
            runner,
            ledger,
            scratch,
            chunk_sectors,
        }
    }

    /// Build a writable overlay of `working` and return its path.
    pub fn build(&self, working: &Path) -> SnapdiskResult<PathBuf> {
        let format = probe_format(self.runner, working)
            .map_err(|e| e.at_step(SnapshotStep::ProbeFormat))?;

        tracing::info!(source = %working.display(), %format, "Snapshotting media source");

        match format {
            ImageFormat::Raw => self.build_mapped(working),
            other => create_derived_snapshot(working, &other, self.scratch, self.runner, self.ledger)
                .map_err(|e| e.at_step(SnapshotStep::DerivedSnapshot)),
        }
    }

    fn build_mapped(&self, working: &Path) -> SnapdiskResult<PathBuf> {
        // a. origin device
        let origin = if is_block_device(working) {
            working.to_path_buf()
        } else {
            self.attach_loop(working)
                .map_err(|e| e.at_step(SnapshotStep::AttachOrigin))?
        };

        // b. size in sectors, same unit as the table line
        let sectors = self
            .size_in_sectors(&origin)
            .map_err(|e| e.at_step(SnapshotStep::QuerySize))?;

        // c. sparse exception store
        let cow_file = self
            .allocate_cow(sectors)
            .map_err(|e| e.at_step(SnapshotStep::AllocateCow))?;

        // d.
        let cow = self
            .attach_loop(&cow_file)
            .map_err(|e| e.at_step(SnapshotStep::AttachCow))?;

        // e-f.
        let table = DmSnapshotTable {
            length_sectors: sectors,
            origin,
            cow,
            persistence: Persistence::Transient,
            chunk_sectors: self.chunk_sectors,
        };
        let name = unique_snapshot_name();
        self.create_mapping(&name, &table)
            .map_err(|e| e.at_step(SnapshotStep::CreateMapping))?;

        let device = Path::new(mapper::DEV_DIR).join(&name);
        tracing::info!(device = %device.display(), sectors, "Snapshot ready");
        Ok(device)
    }

    /// Attach `file` to the first free loop device and register its detach.
    fn attach_loop(&self, file: &Path) -> SnapdiskResult<PathBuf> {
        let device = run_checked(
            self.runner,
            tools::LOSETUP,
            &["-f", "--show", path_arg(file)?],
        )?;
        if device.is_empty() {
            return Err(SnapdiskError::Storage(format!(
                "losetup returned no device for {}",
                file.display()
            )));
        }

        let device = PathBuf::from(device);
        self.ledger.register(CleanupAction::DetachLoop {
            device: device.clone(),
        })?;
        tracing::debug!(file = %file.display(), device = %device.display(), "Attached loop device");
        Ok(device)
    }

    fn size_in_sectors(&self, device: &Path) -> SnapdiskResult<u64> {
        let out = run_checked(
            self.runner,
            tools::BLOCKDEV,
            &["--getsz", path_arg(device)?],
        )?;
        out.parse::<u64>().map_err(|e| {
            SnapdiskError::Storage(format!(
                "Unexpected blockdev output for {}: {:?} ({})",
                device.display(),
                out,
                e
            ))
        })
    }

    /// Create an empty file of `sectors` logical sectors without writing data.
    fn allocate_cow(&self, sectors: u64) -> SnapdiskResult<PathBuf> {
        let (cow, path) = tempfile::Builder::new()
            .prefix(scratch::COW_PREFIX)
            .tempfile_in(self.scratch)?
            .keep()
            .map_err(|e| e.error)?;
        self.ledger
            .register(CleanupAction::RemoveFile { path: path.clone() })?;

        let bytes = sectors.checked_mul(SECTOR_SIZE).ok_or_else(|| {
            SnapdiskError::Storage(format!("Device size of {} sectors overflows", sectors))
        })?;
        cow.set_len(bytes)?;
        tracing::debug!(cow = %path.display(), bytes, "Allocated sparse cow file");
        Ok(path)
    }

    fn create_mapping(&self, name: &str, table: &DmSnapshotTable) -> SnapdiskResult<()> {
        let line = table.to_string();
        tracing::debug!(name, table = %line, "Creating device-mapper snapshot");
        run_checked(
            self.runner,
            tools::DMSETUP,
            &["create", name, "--table", line.as_str()],
        )?;
        self.ledger.register(CleanupAction::RemoveMapping {
            name: name.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_table_line_matches_template() {
        let table = DmSnapshotTable {
            length_sectors: 2_000_000,
            origin: PathBuf::from("/dev/loop0"),
            cow: PathBuf::from("/dev/loop1"),
            persistence: Persistence::Transient,
            chunk_sectors: 8,
        };
        assert_eq!(
            table.to_string(),
            "0 2000000 snapshot /dev/loop0 /dev/loop1 n 8"
        );
    }

    #[test]
    fn test_persistence_flags() {
        assert_eq!(Persistence::Persistent.as_flag(), "p");
        assert_eq!(Persistence::Transient.as_flag(), "n");
    }

    #[test]
    fn test_snapshot_names_are_unique() {
        let a = unique_snapshot_name();
        let b = unique_snapshot_name();
        assert_ne!(a, b);

        let id = a.strip_prefix("snf-image-creator-snapshot-").unwrap();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    proptest! {
        #[test]
        fn prop_table_fields_in_order(length in 1u64..u64::MAX / 512, chunk in 1u64..1024) {
            let table = DmSnapshotTable {
                length_sectors: length,
                origin: PathBuf::from("/dev/sda"),
                cow: PathBuf::from("/dev/loop9"),
                persistence: Persistence::Transient,
                chunk_sectors: chunk,
            };
            let line = table.to_string();
            let fields: Vec<&str> = line.split(' ').collect();
            let length_str = length.to_string();
            let chunk_str = chunk.to_string();
            prop_assert_eq!(
                fields,
                vec!["0", length_str.as_str(), "snapshot", "/dev/sda", "/dev/loop9", "n", chunk_str.as_str()]
            );
        }
    }
}
