#![allow(dead_code)]

use assert_cmd::Command;
use std::time::Duration;
use tempfile::TempDir;

pub struct TestContext {
    /// Pinned scratch parent for every command built from this context
    pub scratch: TempDir,
    /// Where test sources live
    pub media: TempDir,
}

impl TestContext {
    pub fn new_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_snapdisk");
        let mut cmd = Command::new(bin_path);
        cmd.timeout(Duration::from_secs(30));
        cmd.env_remove("SNAPDISK_TMPDIR");
        cmd.env_remove("SNAPDISK_LOG_DIR");
        cmd.arg("--tmp").arg(self.scratch.path());
        cmd
    }

    /// Entries left in the scratch parent.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}

pub fn snapdisk() -> TestContext {
    TestContext {
        scratch: TempDir::new().expect("Failed to create scratch dir"),
        media: TempDir::new().expect("Failed to create media dir"),
    }
}
