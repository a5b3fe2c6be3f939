//! Shared test helpers for snapdisk integration tests.
//!
//! [`FakeRunner`] stands in for the system tools: it records every invocation
//! and answers the way `losetup`, `blockdev`, `dmsetup`, `qemu-img`, `mount`
//! and `mke2fs` would on success, unless a failure is scripted.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use snapdisk::{CommandOutput, CommandRunner, SnapdiskOptions};
use snapdisk_shared::errors::{SnapdiskError, SnapdiskResult};

/// Sector count reported by `blockdev --getsz` unless overridden.
pub const DEFAULT_SECTORS: u64 = 2_000_000;

struct Failure {
    program: String,
    first_arg: Option<String>,
    stderr: String,
}

/// Recording fake for [`CommandRunner`].
pub struct FakeRunner {
    calls: Mutex<Vec<String>>,
    failures: Mutex<Vec<Failure>>,
    missing: Mutex<Vec<String>>,
    next_loop: AtomicU32,
    sectors: Mutex<u64>,
    format: Mutex<String>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            missing: Mutex::new(Vec::new()),
            next_loop: AtomicU32::new(0),
            sectors: Mutex::new(DEFAULT_SECTORS),
            format: Mutex::new("raw".to_string()),
        }
    }
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `program` fail when its first argument equals `first_arg`
    /// (any invocation when `None`).
    pub fn fail_on(&self, program: &str, first_arg: Option<&str>, stderr: &str) {
        self.failures.lock().push(Failure {
            program: program.to_string(),
            first_arg: first_arg.map(str::to_string),
            stderr: stderr.to_string(),
        });
    }

    /// Pretend `program` is not installed.
    pub fn missing(&self, program: &str) {
        self.missing.lock().push(program.to_string());
    }

    /// Format reported by `qemu-img info`.
    pub fn set_format(&self, format: &str) {
        *self.format.lock() = format.to_string();
    }

    pub fn set_sectors(&self, sectors: u64) {
        *self.sectors.lock() = sectors;
    }

    /// Every invocation as `program arg1 arg2 ...`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Invocations of `program` only.
    pub fn calls_to(&self, program: &str) -> Vec<String> {
        let prefix = format!("{} ", program);
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(&prefix) || call == program)
            .collect()
    }

    fn scripted_failure(&self, program: &str, args: &[&str]) -> Option<CommandOutput> {
        self.failures
            .lock()
            .iter()
            .find(|f| {
                f.program == program
                    && f.first_arg
                        .as_deref()
                        .is_none_or(|arg| args.first() == Some(&arg))
            })
            .map(|f| CommandOutput::failed(1, f.stderr.clone()))
    }

    fn respond(&self, program: &str, args: &[&str]) -> CommandOutput {
        match (program, args.first().copied()) {
            ("losetup", Some("-f")) => {
                let n = self.next_loop.fetch_add(1, Ordering::SeqCst);
                CommandOutput::ok(format!("/dev/loop{}\n", n))
            }
            ("blockdev", Some("--getsz")) => {
                CommandOutput::ok(format!("{}\n", *self.sectors.lock()))
            }
            ("qemu-img", Some("info")) => CommandOutput::ok(format!(
                r#"{{"virtual-size": 1073741824, "format": "{}"}}"#,
                self.format.lock()
            )),
            _ => CommandOutput::ok(""),
        }
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, program: &str, args: &[&str]) -> SnapdiskResult<CommandOutput> {
        let line = if args.is_empty() {
            program.to_string()
        } else {
            format!("{} {}", program, args.join(" "))
        };
        self.calls.lock().push(line);

        if self.missing.lock().iter().any(|m| m == program) {
            return Err(SnapdiskError::ToolNotFound(program.to_string()));
        }
        if let Some(failure) = self.scripted_failure(program, args) {
            return Ok(failure);
        }
        Ok(self.respond(program, args))
    }
}

/// Options pinning scratch space to `dir`, with no release backoff.
pub fn pinned_options(dir: &Path) -> SnapdiskOptions {
    SnapdiskOptions {
        tmp_dir: Some(dir.to_path_buf()),
        release_attempts: 3,
        release_backoff_ms: 0,
        ..SnapdiskOptions::default()
    }
}

/// Write a zero-filled raw image of `len` bytes.
pub fn raw_image(dir: &Path, name: &str, len: u64) -> std::path::PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).expect("create raw image");
    file.set_len(len).expect("size raw image");
    path
}
