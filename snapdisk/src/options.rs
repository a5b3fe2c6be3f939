//! Configuration for snapdisk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use snapdisk_shared::constants::envs as const_envs;
use snapdisk_shared::errors::{SnapdiskError, SnapdiskResult};

use crate::disk::constants::snapshot::{
    DEFAULT_CHUNK_SECTORS, DEFAULT_RELEASE_ATTEMPTS, DEFAULT_RELEASE_BACKOFF_MS,
};
use crate::disk::tmp::default_candidates;
use crate::ledger::RetryPolicy;

// ============================================================================
// Disk Options
// ============================================================================

/// Options applied to every [`Disk`](crate::Disk) built with them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapdiskOptions {
    /// Pinned parent directory for the scratch directory.
    ///
    /// When set, free-space selection is skipped entirely.
    /// Default: `$SNAPDISK_TMPDIR` if set, otherwise none
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: Option<PathBuf>,

    /// Candidate parents for the scratch directory, in tie-break order.
    ///
    /// Default: ["/var/tmp", "$HOME", "/mnt"]
    #[serde(default = "default_candidates")]
    pub tmp_candidates: Vec<PathBuf>,

    /// Device-mapper snapshot chunk size in 512-byte sectors.
    ///
    /// Must be a power of two.
    /// Default: 8
    #[serde(default = "default_chunk_sectors")]
    pub chunk_sectors: u64,

    /// Attempts for loop detach, unmount and device-mapper removal.
    ///
    /// Default: 5
    #[serde(default = "default_release_attempts")]
    pub release_attempts: u32,

    /// Initial delay between release attempts, doubled after each failure.
    ///
    /// Default: 250
    #[serde(default = "default_release_backoff_ms")]
    pub release_backoff_ms: u64,
}

fn default_tmp_dir() -> Option<PathBuf> {
    std::env::var_os(const_envs::SNAPDISK_TMPDIR)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
}

fn default_chunk_sectors() -> u64 {
    DEFAULT_CHUNK_SECTORS
}

fn default_release_attempts() -> u32 {
    DEFAULT_RELEASE_ATTEMPTS
}

fn default_release_backoff_ms() -> u64 {
    DEFAULT_RELEASE_BACKOFF_MS
}

impl Default for SnapdiskOptions {
    fn default() -> Self {
        Self {
            tmp_dir: default_tmp_dir(),
            tmp_candidates: default_candidates(),
            chunk_sectors: default_chunk_sectors(),
            release_attempts: default_release_attempts(),
            release_backoff_ms: default_release_backoff_ms(),
        }
    }
}

impl SnapdiskOptions {
    /// Load options from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> SnapdiskResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SnapdiskError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let options: Self = serde_json::from_str(&content).map_err(|e| {
            SnapdiskError::Config(format!("Invalid config {}: {}", path.display(), e))
        })?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> SnapdiskResult<()> {
        if !self.chunk_sectors.is_power_of_two() {
            return Err(SnapdiskError::Config(format!(
                "chunk_sectors must be a power of two, got {}",
                self.chunk_sectors
            )));
        }
        if self.release_attempts == 0 {
            return Err(SnapdiskError::Config(
                "release_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.release_attempts,
            backoff: Duration::from_millis(self.release_backoff_ms),
        }
    }
}
