//! Derived qcow2 snapshots for non-raw images.
//!
//! A derived snapshot is a new qcow2 file whose backing file is the origin
//! image. Reads fall through to the origin, writes land in the child, and the
//! origin itself is never opened for writing.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use snapdisk_shared::constants::tools;
use snapdisk_shared::errors::{SnapdiskError, SnapdiskResult};

use super::constants::qcow2::{
    BACKING_FILE_OFFSET, CLUSTER_BITS, EXT_BACKING_FORMAT, MAGIC, REFCOUNT_ORDER,
    V3_HEADER_LENGTH,
};
use super::format::ImageFormat;
use crate::ledger::{CleanupAction, ResourceLedger, path_arg};
use crate::runner::{CommandRunner, run_checked};

/// Parsed qcow2 header information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qcow2HeaderInfo {
    pub version: u32,
    pub size: u64,
    pub cluster_bits: u32,
}

/// Read qcow2 header from disk file.
pub fn read_qcow2_header(path: &Path) -> SnapdiskResult<Qcow2HeaderInfo> {
    let mut file = File::open(path).map_err(|e| {
        SnapdiskError::Storage(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let mut header = [0u8; 32];
    file.read_exact(&mut header).map_err(|e| {
        SnapdiskError::Storage(format!(
            "Failed to read header from {}: {}",
            path.display(),
            e
        ))
    })?;

    // Parse qcow2 header (big-endian)
    let magic = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    if magic != MAGIC {
        return Err(SnapdiskError::Storage(format!(
            "Invalid qcow2 magic in {}: 0x{:08x}",
            path.display(),
            magic
        )));
    }

    let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let cluster_bits = u32::from_be_bytes([header[20], header[21], header[22], header[23]]);
    let mut size = [0u8; 8];
    size.copy_from_slice(&header[24..32]);

    Ok(Qcow2HeaderInfo {
        version,
        size: u64::from_be_bytes(size),
        cluster_bits,
    })
}

/// Create a qcow2 child of `origin` inside `dest_dir` and return its path.
///
/// The child path is registered for deletion before anything is written to it.
/// qcow2 origins get a natively written header; other formats go through
/// `qemu-img create`.
pub fn create_derived_snapshot(
    origin: &Path,
    format: &ImageFormat,
    dest_dir: &Path,
    runner: &dyn CommandRunner,
    ledger: &ResourceLedger,
) -> SnapdiskResult<PathBuf> {
    let child = dest_dir.join(format!("{}.qcow2", crate::util::unique_hex()));
    ledger.register(CleanupAction::RemoveFile {
        path: child.clone(),
    })?;

    tracing::info!(
        origin = %origin.display(),
        child = %child.display(),
        backing_format = %format,
        "Creating derived qcow2 snapshot"
    );

    match format {
        ImageFormat::Qcow2 => {
            let header = read_qcow2_header(origin)?;
            write_cow_child_header(&child, origin, format.as_str(), header.size)?;
        }
        _ => {
            let backing = origin.canonicalize().map_err(|e| {
                SnapdiskError::Storage(format!(
                    "Failed to canonicalize backing path {}: {}",
                    origin.display(),
                    e
                ))
            })?;
            // Equivalent to: qemu-img create -f qcow2 -b origin -F fmt child
            run_checked(
                runner,
                tools::QEMU_IMG,
                &[
                    "create",
                    "-f",
                    "qcow2",
                    "-b",
                    path_arg(&backing)?,
                    "-F",
                    format.as_str(),
                    path_arg(&child)?,
                ],
            )?;
        }
    }

    Ok(child)
}

/// On-disk layout of a freshly written child image, in clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChildLayout {
    l1_entries: u32,
    l1_clusters: u64,
    refcount_table_cluster: u64,
    refcount_block_cluster: u64,
    total_clusters: u64,
}

impl ChildLayout {
    fn for_size(virtual_size: u64) -> Self {
        let cluster_size = 1u64 << CLUSTER_BITS;
        // Each L2 table holds cluster_size / 8 entries, each mapping one cluster
        let bytes_per_l2 = cluster_size * (cluster_size / 8);
        let l1_entries = virtual_size.div_ceil(bytes_per_l2).max(1);
        let l1_clusters = (l1_entries * 8).div_ceil(cluster_size);
        let refcount_table_cluster = 1 + l1_clusters;
        let refcount_block_cluster = refcount_table_cluster + 1;

        Self {
            l1_entries: l1_entries as u32,
            l1_clusters,
            refcount_table_cluster,
            refcount_block_cluster,
            total_clusters: refcount_block_cluster + 1,
        }
    }
}

/// Write a qcow2 v3 header with backing file reference.
///
/// Creates a qcow2 file that uses another file as backing store for COW.
/// The child starts empty - all reads go to backing file.
fn write_cow_child_header(
    child_path: &Path,
    backing_path: &Path,
    backing_format: &str,
    virtual_size: u64,
) -> SnapdiskResult<()> {
    // Get absolute path for backing file
    let backing_str = backing_path
        .canonicalize()
        .map_err(|e| {
            SnapdiskError::Storage(format!(
                "Failed to canonicalize backing path {}: {}",
                backing_path.display(),
                e
            ))
        })?
        .to_string_lossy()
        .to_string();

    let backing_bytes = backing_str.as_bytes();
    let format_bytes = backing_format.as_bytes();

    let cluster_size: u64 = 1u64 << CLUSTER_BITS;
    let layout = ChildLayout::for_size(virtual_size);

    // The backing name must fit between its offset and the end of cluster 0
    if BACKING_FILE_OFFSET + backing_bytes.len() as u64 > cluster_size {
        return Err(SnapdiskError::Storage(format!(
            "Backing path too long for qcow2 header: {}",
            backing_str
        )));
    }

    let l1_offset = cluster_size;
    let refcount_offset = layout.refcount_table_cluster * cluster_size;
    let refcount_block_offset = layout.refcount_block_cluster * cluster_size;

    let mut header = vec![0u8; (layout.total_clusters * cluster_size) as usize];

    // qcow2 v3 header layout:
    // 0-3:   magic (QFI\xfb)
    // 4-7:   version (3)
    // 8-15:  backing_file_offset
    // 16-19: backing_file_size
    // 20-23: cluster_bits
    // 24-31: size (virtual disk size)
    // 32-35: crypt_method (0 = none)
    // 36-39: l1_size
    // 40-47: l1_table_offset
    // 48-55: refcount_table_offset
    // 56-59: refcount_table_clusters
    // 60-63: nb_snapshots
    // 64-71: snapshots_offset
    // 72-95: incompatible/compatible/autoclear features (0)
    // 96-99: refcount_order
    // 100-103: header_length
    header[0..4].copy_from_slice(&MAGIC.to_be_bytes());
    header[4..8].copy_from_slice(&3u32.to_be_bytes());
    header[8..16].copy_from_slice(&BACKING_FILE_OFFSET.to_be_bytes());
    header[16..20].copy_from_slice(&(backing_bytes.len() as u32).to_be_bytes());
    header[20..24].copy_from_slice(&CLUSTER_BITS.to_be_bytes());
    header[24..32].copy_from_slice(&virtual_size.to_be_bytes());
    header[36..40].copy_from_slice(&layout.l1_entries.to_be_bytes());
    header[40..48].copy_from_slice(&l1_offset.to_be_bytes());
    header[48..56].copy_from_slice(&refcount_offset.to_be_bytes());
    header[56..60].copy_from_slice(&1u32.to_be_bytes());
    header[96..100].copy_from_slice(&REFCOUNT_ORDER.to_be_bytes());
    header[100..104].copy_from_slice(&V3_HEADER_LENGTH.to_be_bytes());

    // Backing format extension, data padded to 8 bytes, then end marker (type 0)
    let ext = V3_HEADER_LENGTH as usize;
    header[ext..ext + 4].copy_from_slice(&EXT_BACKING_FORMAT.to_be_bytes());
    header[ext + 4..ext + 8].copy_from_slice(&(format_bytes.len() as u32).to_be_bytes());
    header[ext + 8..ext + 8 + format_bytes.len()].copy_from_slice(format_bytes);

    // Backing file path, right after the extensions
    let backing_offset = BACKING_FILE_OFFSET as usize;
    header[backing_offset..backing_offset + backing_bytes.len()].copy_from_slice(backing_bytes);

    // L1 table stays zeroed: every read goes to the backing file

    let rt_offset = refcount_offset as usize;
    header[rt_offset..rt_offset + 8].copy_from_slice(&refcount_block_offset.to_be_bytes());

    // 16-bit refcount of 1 for every cluster written here
    let rb_offset = refcount_block_offset as usize;
    for i in 0..layout.total_clusters as usize {
        header[rb_offset + i * 2..rb_offset + i * 2 + 2].copy_from_slice(&1u16.to_be_bytes());
    }

    let mut file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(child_path)
        .map_err(|e| {
            SnapdiskError::Storage(format!(
                "Failed to create child disk {}: {}",
                child_path.display(),
                e
            ))
        })?;

    file.write_all(&header).map_err(|e| {
        SnapdiskError::Storage(format!(
            "Failed to write COW child header to {}: {}",
            child_path.display(),
            e
        ))
    })?;

    Ok(())
}
