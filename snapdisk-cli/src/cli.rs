//! CLI definition and argument parsing for snapdisk-cli.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use snapdisk::SnapdiskOptions;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "snapdisk",
    author,
    version,
    about = "Copy-on-write snapshots of disk images, block devices and the live root filesystem"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a source and probe its image format
    Inspect(crate::commands::inspect::InspectArgs),

    /// Print the directory scratch space would be allocated in
    Tmpdir,

    /// Snapshot a source and hold the overlay until interrupted or a command exits
    Snapshot(crate::commands::snapshot::SnapshotArgs),
}

// ============================================================================
// GLOBAL FLAGS
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true, env = "SNAPDISK_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// JSON options file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Pin the scratch parent directory, skipping free-space selection
    #[arg(long, global = true)]
    pub tmp: Option<PathBuf>,
}

impl GlobalFlags {
    /// Options from `--config` (or defaults), with `--tmp` applied on top.
    pub fn options(&self) -> anyhow::Result<SnapdiskOptions> {
        let mut options = match &self.config {
            Some(path) => SnapdiskOptions::from_json_file(path)?,
            None => SnapdiskOptions::default(),
        };
        if let Some(tmp) = &self.tmp {
            options.tmp_dir = Some(tmp.clone());
        }
        Ok(options)
    }

    pub fn log_level(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

// ============================================================================
// Tests
// ============================================================================
