//! Resource ledger: the ordered stack of pending cleanup actions.
//!
//! Every kernel-visible resource acquired while building a snapshot (loop
//! devices, device-mapper targets, mounts, temporary files and directories)
//! is registered here right after it is acquired. [`ResourceLedger::unwind`]
//! releases them in strict reverse order of registration, because later
//! resources depend on earlier ones staying valid (a mapping must go before
//! its cow loop device, the loop device before its backing file, the file
//! before the scratch directory).
//!
//! The ledger is `Send + Sync`. Its lock is held only to push or pop a single
//! entry, never while a release action runs, so a watcher thread reacting to
//! SIGINT can unwind while the main thread is blocked in a long operation.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use snapdisk_shared::constants::tools;
use snapdisk_shared::errors::{SnapdiskError, SnapdiskResult};

use crate::disk::constants::snapshot::{DEFAULT_RELEASE_ATTEMPTS, DEFAULT_RELEASE_BACKOFF_MS};
use crate::runner::CommandRunner;

const MOUNTINFO: &str = "/proc/self/mountinfo";

/// A release operation together with the operands captured at acquisition time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupAction {
    /// Detach a loop device (`losetup -d`).
    DetachLoop { device: PathBuf },
    /// Remove a device-mapper target (`dmsetup remove`).
    RemoveMapping { name: String },
    /// Unmount a mount point.
    Unmount { target: PathBuf },
    /// Delete a file. A missing file counts as released.
    RemoveFile { path: PathBuf },
    /// Delete an empty directory. A missing directory counts as released.
    RemoveDir { path: PathBuf },
    /// Delete a directory tree. Refused while anything is mounted beneath it.
    RemoveTree { path: PathBuf },
}

impl CleanupAction {
    /// Short name of the action kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CleanupAction::DetachLoop { .. } => "detach-loop",
            CleanupAction::RemoveMapping { .. } => "remove-mapping",
            CleanupAction::Unmount { .. } => "unmount",
            CleanupAction::RemoveFile { .. } => "remove-file",
            CleanupAction::RemoveDir { .. } => "remove-dir",
            CleanupAction::RemoveTree { .. } => "remove-tree",
        }
    }
}

impl fmt::Display for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupAction::DetachLoop { device } => write!(f, "detach-loop {}", device.display()),
            CleanupAction::RemoveMapping { name } => write!(f, "remove-mapping {}", name),
            CleanupAction::Unmount { target } => write!(f, "unmount {}", target.display()),
            CleanupAction::RemoveFile { path } => write!(f, "remove-file {}", path.display()),
            CleanupAction::RemoveDir { path } => write!(f, "remove-dir {}", path.display()),
            CleanupAction::RemoveTree { path } => write!(f, "remove-tree {}", path.display()),
        }
    }
}

/// One registered cleanup action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Acquisition order, starting at 0 for each ledger.
    pub seq: u64,
    pub action: CleanupAction,
}

/// Release action that could not be completed.
#[derive(Debug, Clone)]
pub struct CleanupFailure {
    pub entry: LedgerEntry,
    pub error: String,
}

/// Outcome of an unwind. Cleanup never fails as a whole.
#[derive(Debug, Default, Clone)]
pub struct CleanupReport {
    /// Entries released successfully, in release order.
    pub released: Vec<LedgerEntry>,
    /// Entries whose release failed, in release order.
    pub failures: Vec<CleanupFailure>,
    /// Sequence numbers of every attempted entry, in the order they were attempted.
    pub attempted: Vec<u64>,
}

impl CleanupReport {
    /// True when nothing was released or attempted.
    pub fn is_empty(&self) -> bool {
        self.attempted.is_empty()
    }
}

/// Bounded retry with exponential backoff for releases that are transiently busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RELEASE_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_RELEASE_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails with anything but
    /// [`SnapdiskError::ResourceBusy`], or the attempts are exhausted.
    pub fn run<F>(&self, what: &str, mut op: F) -> SnapdiskResult<()>
    where
        F: FnMut() -> SnapdiskResult<()>,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.backoff;
        let mut attempt = 1;
        loop {
            match op() {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e @ SnapdiskError::ResourceBusy(_)) => {
                    tracing::debug!(what, attempt, error = %e, "Resource busy, retrying");
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LedgerState {
    Open,
    Unwinding,
    Closed,
}

struct LedgerInner {
    entries: Vec<LedgerEntry>,
    next_seq: u64,
    state: LedgerState,
}

/// LIFO stack of cleanup actions.
pub struct ResourceLedger {
    inner: Mutex<LedgerInner>,
    runner: Arc<dyn CommandRunner>,
    retry: RetryPolicy,
}

impl ResourceLedger {
    pub fn new(runner: Arc<dyn CommandRunner>, retry: RetryPolicy) -> Self {
        Self {
            inner: Mutex::new(LedgerInner {
                entries: Vec::new(),
                next_seq: 0,
                state: LedgerState::Open,
            }),
            runner,
            retry,
        }
    }

    /// Register the release of a resource that was just acquired.
    ///
    /// Returns the acquisition sequence number. If the ledger has already been
    /// unwound, the action runs immediately and `DiskAlreadyCleanedUp` is
    /// returned, so the resource is not leaked.
    pub fn register(&self, action: CleanupAction) -> SnapdiskResult<u64> {
        let mut inner = self.inner.lock();
        if inner.state == LedgerState::Closed {
            drop(inner);
            tracing::warn!(%action, "Resource acquired after cleanup, releasing immediately");
            if let Err(e) = self.release(&action) {
                tracing::warn!(%action, error = %e, "Failed to release late resource");
            }
            return Err(SnapdiskError::DiskAlreadyCleanedUp);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        tracing::debug!(seq, %action, "Registered cleanup action");
        inner.entries.push(LedgerEntry { seq, action });
        Ok(seq)
    }

    /// True until [`unwind`](Self::unwind) has started.
    pub fn is_open(&self) -> bool {
        self.inner.lock().state == LedgerState::Open
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the pending entries, oldest first.
    pub fn pending(&self) -> Vec<LedgerEntry> {
        self.inner.lock().entries.clone()
    }

    /// Pop and release every entry, newest first.
    ///
    /// A failing release is logged and recorded; the remaining entries are
    /// still released. Calling this again, or concurrently, is a no-op.
    pub fn unwind(&self) -> CleanupReport {
        {
            let mut inner = self.inner.lock();
            if inner.state != LedgerState::Open {
                tracing::debug!("Ledger already unwound or unwinding, skipping");
                return CleanupReport::default();
            }
            inner.state = LedgerState::Unwinding;
        }

        let mut report = CleanupReport::default();
        loop {
            let entry = {
                let mut inner = self.inner.lock();
                match inner.entries.pop() {
                    Some(entry) => entry,
                    None => {
                        inner.state = LedgerState::Closed;
                        break;
                    }
                }
            };

            report.attempted.push(entry.seq);
            match self.release(&entry.action) {
                Ok(()) => {
                    tracing::debug!(seq = entry.seq, action = %entry.action, "Released");
                    report.released.push(entry);
                }
                Err(e) => {
                    tracing::warn!(
                        seq = entry.seq,
                        action = %entry.action,
                        error = %e,
                        "Cleanup action failed, continuing"
                    );
                    report.failures.push(CleanupFailure {
                        entry,
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    fn release(&self, action: &CleanupAction) -> SnapdiskResult<()> {
        match action {
            CleanupAction::DetachLoop { device } => {
                let device = path_arg(device)?;
                self.retry.run(action.kind(), || {
                    self.run_release(tools::LOSETUP, &["-d", device], &["No such device"])
                })
            }
            CleanupAction::RemoveMapping { name } => self.retry.run(action.kind(), || {
                self.run_release(
                    tools::DMSETUP,
                    &["remove", name.as_str()],
                    &["No such device or address", "not found"],
                )
            }),
            CleanupAction::Unmount { target } => {
                let target = path_arg(target)?;
                self.retry.run(action.kind(), || {
                    self.run_release(
                        tools::UMOUNT,
                        &[target],
                        &["not mounted", "no mount point specified", "No such file"],
                    )
                })
            }
            CleanupAction::RemoveFile { path } => ignore_missing(std::fs::remove_file(path)),
            CleanupAction::RemoveDir { path } => ignore_missing(std::fs::remove_dir(path)),
            CleanupAction::RemoveTree { path } => {
                let mounted = mounts_under(path)?;
                if !mounted.is_empty() {
                    return Err(SnapdiskError::ResourceBusy(format!(
                        "{} still has active mounts: {}",
                        path.display(),
                        mounted
                            .iter()
                            .map(|p| p.display().to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )));
                }
                ignore_missing(std::fs::remove_dir_all(path))
            }
        }
    }

    /// Run a release command. Stderr matching `gone` means the resource is
    /// already released; stderr mentioning "busy" maps to `ResourceBusy`.
    fn run_release(&self, program: &str, args: &[&str], gone: &[&str]) -> SnapdiskResult<()> {
        let output = self.runner.run(program, args)?;
        if output.success() {
            return Ok(());
        }

        let stderr = output.stderr.trim();
        if gone.iter().any(|marker| stderr.contains(marker)) {
            tracing::debug!(program, ?args, stderr, "Resource already released");
            return Ok(());
        }
        if stderr.to_ascii_lowercase().contains("busy") {
            return Err(SnapdiskError::ResourceBusy(format!(
                "{} {}: {}",
                program,
                args.join(" "),
                stderr
            )));
        }
        Err(SnapdiskError::Command {
            program: program.to_string(),
            status: output.status,
            stderr: stderr.to_string(),
        })
    }
}

impl fmt::Debug for ResourceLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ResourceLedger")
            .field("entries", &inner.entries)
            .field("state", &inner.state)
            .field("retry", &self.retry)
            .finish()
    }
}

pub(crate) fn path_arg(path: &Path) -> SnapdiskResult<&str> {
    path.to_str()
        .ok_or_else(|| SnapdiskError::InvalidPath(path.to_path_buf()))
}

fn ignore_missing(result: io::Result<()>) -> SnapdiskResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Mount points at or beneath `path`, read from `/proc/self/mountinfo`.
///
/// A tree that is already gone has none. Anything that prevents an answer is
/// reported as busy, so the tree is left in place.
fn mounts_under(path: &Path) -> SnapdiskResult<Vec<PathBuf>> {
    let mountinfo = std::fs::read_to_string(MOUNTINFO).map_err(|e| {
        SnapdiskError::ResourceBusy(format!("Cannot read {}: {}", MOUNTINFO, e))
    })?;
    mounts_under_in(&mountinfo, path)
}

/// Mount points from `mountinfo` at or beneath `path`, compared after
/// resolving `path`; mountinfo lists canonical absolute paths only.
fn mounts_under_in(mountinfo: &str, path: &Path) -> SnapdiskResult<Vec<PathBuf>> {
    let resolved = match path.canonicalize() {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(SnapdiskError::ResourceBusy(format!(
                "Cannot resolve {}: {}",
                path.display(),
                e
            )));
        }
    };
    Ok(parse_mount_points(mountinfo)
        .into_iter()
        .filter(|mount_point| mount_point.starts_with(&resolved))
        .collect())
}

/// Extract mount points (field 5) from mountinfo text, decoding octal escapes.
fn parse_mount_points(mountinfo: &str) -> Vec<PathBuf> {
    mountinfo
        .lines()
        .filter_map(|line| line.split(' ').nth(4))
        .map(|field| PathBuf::from(unescape_mountinfo(field)))
        .collect()
}

fn unescape_mountinfo(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..i + 4].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let value = u32::from(bytes[i + 1] - b'0') * 64
                + u32::from(bytes[i + 2] - b'0') * 8
                + u32::from(bytes[i + 3] - b'0');
            out.push(value as u8);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandOutput;
    use tempfile::TempDir;

    /// Records every command and answers from a fixed closure.
    struct ScriptedRunner {
        calls: Mutex<Vec<String>>,
        respond: Box<dyn Fn(&str) -> CommandOutput + Send + Sync>,
    }

    impl ScriptedRunner {
        fn ok() -> Arc<Self> {
            Self::with(|_| CommandOutput::ok(""))
        }

        fn with(respond: impl Fn(&str) -> CommandOutput + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, program: &str, args: &[&str]) -> SnapdiskResult<CommandOutput> {
            let line = format!("{} {}", program, args.join(" "));
            self.calls.lock().push(line.clone());
            Ok((self.respond)(&line))
        }
    }

    fn no_wait() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn test_unwind_is_lifo() {
        let runner = ScriptedRunner::ok();
        let ledger = ResourceLedger::new(runner.clone(), no_wait());

        for i in 0..5 {
            let seq = ledger
                .register(CleanupAction::RemoveMapping {
                    name: format!("m{}", i),
                })
                .unwrap();
            assert_eq!(seq, i);
        }

        let report = ledger.unwind();
        assert!(report.failures.is_empty());
        let order: Vec<u64> = report.released.iter().map(|e| e.seq).collect();
        assert_eq!(order, vec![4, 3, 2, 1, 0]);
        assert_eq!(
            runner.calls(),
            vec![
                "dmsetup remove m4",
                "dmsetup remove m3",
                "dmsetup remove m2",
                "dmsetup remove m1",
                "dmsetup remove m0",
            ]
        );
    }

    #[test]
    fn test_unwind_twice_is_noop() {
        let runner = ScriptedRunner::ok();
        let ledger = ResourceLedger::new(runner.clone(), no_wait());
        ledger
            .register(CleanupAction::DetachLoop {
                device: PathBuf::from("/dev/loop7"),
            })
            .unwrap();

        assert_eq!(ledger.unwind().released.len(), 1);
        assert!(ledger.unwind().is_empty());
        assert_eq!(runner.calls().len(), 1);
        assert!(!ledger.is_open());
    }

    #[test]
    fn test_failure_does_not_stop_unwind() {
        let runner = ScriptedRunner::with(|line| {
            if line.contains("/dev/loop1") {
                CommandOutput::failed(1, "losetup: /dev/loop1: detach failed: permission denied")
            } else {
                CommandOutput::ok("")
            }
        });
        let ledger = ResourceLedger::new(runner.clone(), no_wait());
        for dev in ["/dev/loop0", "/dev/loop1", "/dev/loop2"] {
            ledger
                .register(CleanupAction::DetachLoop {
                    device: PathBuf::from(dev),
                })
                .unwrap();
        }

        let report = ledger.unwind();
        assert_eq!(report.released.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].entry.seq, 1);
        assert_eq!(report.attempted, vec![2, 1, 0]);
        // Permanent failures are not retried
        let loop1_calls = runner
            .calls()
            .iter()
            .filter(|c| c.contains("/dev/loop1"))
            .count();
        assert_eq!(loop1_calls, 1);
    }

    #[test]
    fn test_retry_only_on_busy() {
        let policy = no_wait();

        let mut busy = 0;
        let err = policy
            .run("busy", || {
                busy += 1;
                Err(SnapdiskError::ResourceBusy("held".into()))
            })
            .unwrap_err();
        assert!(matches!(err, SnapdiskError::ResourceBusy(_)));
        assert_eq!(busy, 3);

        let mut denied = 0;
        let err = policy
            .run("denied", || {
                denied += 1;
                Err(SnapdiskError::Storage("permission denied".into()))
            })
            .unwrap_err();
        assert!(matches!(err, SnapdiskError::Storage(_)));
        assert_eq!(denied, 1);
    }

    #[test]
    fn test_entry_registered_during_unwind_is_released() {
        // The runner registers a new resource while the first one is released,
        // as a builder racing cleanup on another thread would.
        let slot: Arc<Mutex<Option<Arc<ResourceLedger>>>> = Arc::new(Mutex::new(None));
        let hook = slot.clone();
        let runner = ScriptedRunner::with(move |line| {
            if line == "dmsetup remove first"
                && let Some(ledger) = hook.lock().take()
            {
                ledger
                    .register(CleanupAction::DetachLoop {
                        device: PathBuf::from("/dev/loop9"),
                    })
                    .unwrap();
            }
            CommandOutput::ok("")
        });
        let ledger = Arc::new(ResourceLedger::new(runner.clone(), no_wait()));
        ledger
            .register(CleanupAction::RemoveMapping {
                name: "first".into(),
            })
            .unwrap();
        *slot.lock() = Some(ledger.clone());

        let report = ledger.unwind();
        assert!(report.failures.is_empty());
        let order: Vec<u64> = report.released.iter().map(|e| e.seq).collect();
        assert_eq!(order, vec![0, 1]);
        assert_eq!(
            runner.calls(),
            vec!["dmsetup remove first", "losetup -d /dev/loop9"]
        );
        assert!(ledger.is_empty());
        assert!(!ledger.is_open());
    }

    #[test]
    fn test_busy_mapping_reported_as_resource_busy() {
        let runner = ScriptedRunner::with(|_| {
            CommandOutput::failed(1, "device-mapper: remove ioctl failed: Device or resource busy")
        });
        let ledger = ResourceLedger::new(runner, no_wait());
        ledger
            .register(CleanupAction::RemoveMapping {
                name: "snap".into(),
            })
            .unwrap();

        let report = ledger.unwind();
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("resource busy"));
    }

    #[test]
    fn test_transient_busy_recovers_within_retries() {
        let attempts = Arc::new(Mutex::new(0));
        let counter = attempts.clone();
        let runner = ScriptedRunner::with(move |_| {
            let mut n = counter.lock();
            *n += 1;
            if *n < 3 {
                CommandOutput::failed(1, "Device or resource busy")
            } else {
                CommandOutput::ok("")
            }
        });
        let ledger = ResourceLedger::new(runner, no_wait());
        ledger
            .register(CleanupAction::RemoveMapping {
                name: "snap".into(),
            })
            .unwrap();

        let report = ledger.unwind();
        assert!(report.failures.is_empty());
        assert_eq!(*attempts.lock(), 3);
    }

    #[test]
    fn test_already_released_loop_counts_as_released() {
        let runner = ScriptedRunner::with(|_| {
            CommandOutput::failed(1, "losetup: /dev/loop3: detach failed: No such device or address")
        });
        let ledger = ResourceLedger::new(runner, no_wait());
        ledger
            .register(CleanupAction::DetachLoop {
                device: PathBuf::from("/dev/loop3"),
            })
            .unwrap();
        assert!(ledger.unwind().failures.is_empty());
    }

    #[test]
    fn test_register_after_unwind_releases_immediately() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("late.cow");
        std::fs::write(&file, b"x").unwrap();

        let ledger = ResourceLedger::new(ScriptedRunner::ok(), no_wait());
        ledger.unwind();

        let err = ledger
            .register(CleanupAction::RemoveFile { path: file.clone() })
            .unwrap_err();
        assert!(matches!(err, SnapdiskError::DiskAlreadyCleanedUp));
        assert!(!file.exists());
    }

    #[test]
    fn test_file_and_tree_removal() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir(&scratch).unwrap();
        let cow = scratch.join("cow-1");
        std::fs::write(&cow, b"").unwrap();

        let ledger = ResourceLedger::new(ScriptedRunner::ok(), no_wait());
        ledger
            .register(CleanupAction::RemoveTree {
                path: scratch.clone(),
            })
            .unwrap();
        ledger
            .register(CleanupAction::RemoveFile { path: cow.clone() })
            .unwrap();
        // Missing file is tolerated
        ledger
            .register(CleanupAction::RemoveFile {
                path: scratch.join("never-created"),
            })
            .unwrap();

        let report = ledger.unwind();
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert!(!scratch.exists());
    }

    #[test]
    fn test_mounts_under_resolves_path() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(scratch.join("root")).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&scratch, &link).unwrap();

        let staging = scratch.canonicalize().unwrap().join("root");
        let mountinfo = format!(
            "22 1 8:1 / / rw - ext4 /dev/sda1 rw\n40 22 8:1 / {} rw - ext4 /dev/sda1 rw\n",
            staging.display()
        );

        let dotted = dir.path().join("scratch").join("..").join("scratch");
        for path in [&scratch, &dotted, &link] {
            assert_eq!(
                mounts_under_in(&mountinfo, path).unwrap(),
                vec![staging.clone()],
                "{}",
                path.display()
            );
        }
        assert!(
            mounts_under_in(&mountinfo, &dir.path().join("missing"))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_mounts_under_dotted_proc() {
        let mounted = mounts_under(Path::new("/proc/../proc")).unwrap();
        assert!(mounted.contains(&PathBuf::from("/proc")), "{:?}", mounted);
    }

    #[test]
    fn test_parse_mount_points() {
        let mountinfo = "\
22 1 8:1 / / rw,relatime shared:1 - ext4 /dev/sda1 rw
35 22 0:31 / /var/tmp/with\\040space rw shared:2 - tmpfs tmpfs rw
36 22 0:32 / /proc rw - proc proc rw
";
        let points = parse_mount_points(mountinfo);
        assert_eq!(
            points,
            vec![
                PathBuf::from("/"),
                PathBuf::from("/var/tmp/with space"),
                PathBuf::from("/proc"),
            ]
        );
    }
}
