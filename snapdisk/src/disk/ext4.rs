//! Ext4 bundling of the live root filesystem.
//!
//! The root filesystem is bind-mounted (non-recursively) onto a staging
//! directory, so pseudo filesystems and other mounts are absent from the view.
//! The scratch directory is hidden inside that view under an empty tmpfs, and
//! the staging tree is then packed with `mke2fs -d`.

use std::path::{Path, PathBuf};

use snapdisk_shared::constants::tools;
use snapdisk_shared::errors::{SnapdiskError, SnapdiskResult};
use walkdir::WalkDir;

use super::bundle::{BundleContext, VolumeBundler};
use super::constants::ext4::{
    BLOCK_SIZE, INODE_SIZE, JOURNAL_OVERHEAD_BYTES, MIN_DISK_SIZE_BYTES, SIZE_MULTIPLIER_DEN,
    SIZE_MULTIPLIER_NUM,
};
use crate::ledger::{CleanupAction, path_arg};
use crate::runner::run_checked;

/// Name of the staging directory inside the scratch directory.
const STAGING_DIR: &str = "root";

/// [`VolumeBundler`] producing an ext4 image with `mke2fs -d`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ext4Bundler;

impl Ext4Bundler {
    pub fn new() -> Self {
        Self
    }

    /// Bind-mount the source onto a fresh staging directory and hide the
    /// scratch directory inside it. Returns the staging path.
    fn stage(&self, ctx: &BundleContext<'_>) -> SnapdiskResult<PathBuf> {
        let staging = ctx.scratch.join(STAGING_DIR);
        std::fs::create_dir(&staging).map_err(|e| {
            SnapdiskError::Storage(format!(
                "Failed to create staging dir {}: {}",
                staging.display(),
                e
            ))
        })?;
        ctx.ledger.register(CleanupAction::RemoveDir {
            path: staging.clone(),
        })?;

        run_checked(
            ctx.runner,
            tools::MOUNT,
            &["--bind", path_arg(ctx.source)?, path_arg(&staging)?],
        )?;
        ctx.ledger.register(CleanupAction::Unmount {
            target: staging.clone(),
        })?;

        // The scratch dir shows up in the view only when it lives on the
        // same filesystem as the source
        if let Some(hidden) = hidden_scratch(&staging, ctx.source, ctx.scratch)?
            && hidden.is_dir()
        {
            run_checked(
                ctx.runner,
                tools::MOUNT,
                &["-t", "tmpfs", "-o", "size=1m", "tmpfs", path_arg(&hidden)?],
            )?;
            ctx.ledger
                .register(CleanupAction::Unmount { target: hidden.clone() })?;
            tracing::debug!(hidden = %hidden.display(), "Hid scratch directory from bundle");
        }

        Ok(staging)
    }
}

impl VolumeBundler for Ext4Bundler {
    fn create_image(&self, ctx: &BundleContext<'_>) -> SnapdiskResult<()> {
        tracing::info!(
            source = %ctx.source.display(),
            image = %ctx.image.display(),
            "Bundling directory into ext4 image"
        );

        let staging = self.stage(ctx)?;
        let size_bytes = calculate_disk_size(&staging);

        // With -b 4096, mke2fs expects size in 4KB blocks
        let size_blocks = size_bytes / BLOCK_SIZE;

        // https://man7.org/linux/man-pages/man8/mke2fs.8.html
        // -d dir: populate from directory
        // -m 0: no reserved blocks
        // -E root_owner=0:0: root inode owned by root, not by the caller
        run_checked(
            ctx.runner,
            tools::MKE2FS,
            &[
                "-t",
                "ext4",
                "-b",
                "4096",
                "-d",
                path_arg(&staging)?,
                "-m",
                "0",
                "-E",
                "root_owner=0:0",
                "-F",
                "-q",
                path_arg(ctx.image)?,
                &size_blocks.to_string(),
            ],
        )?;

        tracing::info!(
            image = %ctx.image.display(),
            size_mb = size_bytes / (1024 * 1024),
            "Bundled directory"
        );
        Ok(())
    }
}

/// Where the scratch directory appears inside the staging view of `source`.
///
/// Both paths are resolved first; mountinfo and the bind mount only know
/// canonical paths.
fn hidden_scratch(
    staging: &Path,
    source: &Path,
    scratch: &Path,
) -> SnapdiskResult<Option<PathBuf>> {
    let resolve = |path: &Path| {
        path.canonicalize().map_err(|e| {
            SnapdiskError::Storage(format!("Failed to resolve {}: {}", path.display(), e))
        })
    };
    Ok(view_path(staging, &resolve(source)?, &resolve(scratch)?))
}

/// Where `path` (under `source`) appears inside the staging view.
fn view_path(staging: &Path, source: &Path, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(source)
        .ok()
        .map(|relative| staging.join(relative))
}

/// Calculate the total size needed for a directory tree on ext4.
///
/// This accounts for:
/// - File content sizes (rounded up to 4KB blocks)
/// - Inode overhead (256 bytes per file/dir/symlink)
///
/// Entries that vanish or cannot be read during the walk are skipped; a live
/// system changes underneath us.
fn calculate_dir_size(dir: &Path) -> u64 {
    let mut total_blocks = 0u64;
    let mut entry_count = 0u64;
    let mut skipped = 0u64;

    for entry in WalkDir::new(dir).follow_links(false).same_file_system(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };

        entry_count += 1;

        if let Ok(metadata) = entry.metadata() {
            if metadata.is_file() {
                // Each file needs at least one block, round up
                total_blocks += metadata.len().div_ceil(BLOCK_SIZE).max(1);
            } else if metadata.is_dir() {
                total_blocks += 1;
            }
        }
    }

    if skipped > 0 {
        tracing::debug!(dir = %dir.display(), skipped, "Skipped unreadable entries while sizing");
    }

    total_blocks * BLOCK_SIZE + entry_count * INODE_SIZE
}

/// Calculate appropriate disk size with ext4 overhead.
fn calculate_disk_size(source: &Path) -> u64 {
    let dir_size = calculate_dir_size(source);

    // 10% for metadata (superblock, block groups, inode tables) plus the journal
    let size_with_overhead =
        dir_size * SIZE_MULTIPLIER_NUM / SIZE_MULTIPLIER_DEN + JOURNAL_OVERHEAD_BYTES;
    let final_size = size_with_overhead.max(MIN_DISK_SIZE_BYTES);

    tracing::debug!(
        "Calculated disk size: dir_size={}MB, with_overhead={}MB, final={}MB",
        dir_size / (1024 * 1024),
        size_with_overhead / (1024 * 1024),
        final_size / (1024 * 1024)
    );

    final_size
}
