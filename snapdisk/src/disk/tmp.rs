//! Scratch space selection.
//!
//! Picks the parent directory for a disk's scratch directory: a pinned
//! directory wins unconditionally, otherwise the writable candidate with the
//! most free space (ties go to the earliest candidate).

use std::path::{Path, PathBuf};

use nix::sys::statvfs::statvfs;
use nix::unistd::{AccessFlags, access};
use snapdisk_shared::errors::{SnapdiskError, SnapdiskResult};

use super::constants::tmp::{MNT, VAR_TMP};

/// Filesystem queries used by the selector.
pub trait SpaceProbe: Send + Sync {
    /// True if `path` exists and the current process may write to it.
    fn is_writable(&self, path: &Path) -> bool;

    /// Bytes available to unprivileged users on the filesystem holding `path`.
    fn free_bytes(&self, path: &Path) -> SnapdiskResult<u64>;
}

/// [`SpaceProbe`] backed by `access(2)` and `statvfs(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsProbe;

impl SpaceProbe for StatvfsProbe {
    fn is_writable(&self, path: &Path) -> bool {
        path.is_dir() && access(path, AccessFlags::W_OK).is_ok()
    }

    fn free_bytes(&self, path: &Path) -> SnapdiskResult<u64> {
        let stat = statvfs(path).map_err(|e| {
            SnapdiskError::Storage(format!("statvfs {} failed: {}", path.display(), e))
        })?;
        Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64)
    }
}

/// Default candidates: `/var/tmp`, the user's home directory, `/mnt`.
pub fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(VAR_TMP)];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home);
    }
    candidates.push(PathBuf::from(MNT));
    candidates
}

/// Choose the scratch parent directory.
///
/// A candidate whose free space cannot be measured is skipped.
pub fn select_tmp_dir(
    pinned: Option<&Path>,
    candidates: &[PathBuf],
    probe: &dyn SpaceProbe,
) -> SnapdiskResult<PathBuf> {
    if let Some(dir) = pinned {
        tracing::debug!(dir = %dir.display(), "Using pinned temporary directory");
        return Ok(dir.to_path_buf());
    }

    let mut best: Option<(&PathBuf, u64)> = None;
    for candidate in candidates {
        if !probe.is_writable(candidate) {
            tracing::debug!(candidate = %candidate.display(), "Temporary candidate not writable");
            continue;
        }

        let free = match probe.free_bytes(candidate) {
            Ok(free) => free,
            Err(e) => {
                tracing::warn!(candidate = %candidate.display(), error = %e, "Cannot measure free space");
                continue;
            }
        };
        tracing::debug!(candidate = %candidate.display(), free, "Temporary candidate");

        // Strictly greater keeps the first of equal candidates
        if best.is_none_or(|(_, best_free)| free > best_free) {
            best = Some((candidate, free));
        }
    }

    match best {
        Some((dir, free)) => {
            tracing::info!(dir = %dir.display(), free_mb = free / (1024 * 1024), "Selected temporary directory");
            Ok(dir.clone())
        }
        None => Err(SnapdiskError::NoUsableTempLocation {
            candidates: candidates.to_vec(),
        }),
    }
}
