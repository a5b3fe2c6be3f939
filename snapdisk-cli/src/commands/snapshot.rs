use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, Thread};
use std::time::Duration;

use clap::Args;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use snapdisk::{Disk, ImageOptions};
use snapdisk_shared::constants::envs;

/// Exit code after cleanup on SIGINT/SIGTERM.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// How long an interrupt waits for the session to notice cleanup and return.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Image file, block device or the live root (/)
    pub source: PathBuf,

    /// Open the image without write access
    #[arg(long)]
    pub read_only: bool,

    /// Command to run against the overlay (exposed as $SNAPDISK_DEVICE)
    #[arg(last = true)]
    pub command: Vec<String>,
}

pub fn execute(args: SnapshotArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<i32> {
    let options = global.options()?;
    let disk = Arc::new(Disk::new(&args.source, options)?);

    // Interrupts clean up from a watcher thread; the main thread may be
    // blocked in a tool or in the user's command at that point
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let signals_handle = signals.handle();
    let (session_done, session_rx) = mpsc::channel::<()>();
    let watcher = {
        let disk = disk.clone();
        let session = thread::current();
        thread::spawn(move || {
            if let Some(signal) = signals.forever().next() {
                tracing::warn!(signal, "Interrupted, cleaning up");
                interrupt(&disk, &session, &session_rx, SESSION_DRAIN_TIMEOUT);
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        })
    };

    let result = run_session(&disk, &args);

    let _ = session_done.send(());
    signals_handle.close();
    let _ = watcher.join();

    let report = disk.cleanup();
    if !report.failures.is_empty() {
        for failure in &report.failures {
            eprintln!(
                "Warning: failed to release {}: {}",
                failure.entry.action, failure.error
            );
        }
    }
    result
}

/// Clean up on interrupt, then give the session thread a bounded chance to
/// return. A resource it acquires after cleanup is released when it tries to
/// register it, which only happens if the process is still alive.
///
/// Returns false if the session did not finish within `timeout`.
fn interrupt(disk: &Disk, session: &Thread, done: &Receiver<()>, timeout: Duration) -> bool {
    disk.cleanup();
    session.unpark();
    match done.recv_timeout(timeout) {
        Ok(()) => true,
        Err(mpsc::RecvTimeoutError::Disconnected) => true,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::warn!(?timeout, "Session still busy after cleanup, exiting anyway");
            false
        }
    }
}

fn run_session(disk: &Disk, args: &SnapshotArgs) -> anyhow::Result<i32> {
    let device = disk.snapshot()?;
    let image = disk.get_image(
        &device,
        ImageOptions {
            read_only: args.read_only,
        },
    )?;
    println!("{}", device.display());

    let code = match args.command.split_first() {
        Some((program, rest)) => {
            tracing::info!(program, device = %device.display(), "Running command against snapshot");
            let status = Command::new(program)
                .args(rest)
                .env(envs::SNAPDISK_DEVICE, &device)
                .status()
                .map_err(|e| anyhow::anyhow!("Failed to run {}: {}", program, e))?;
            status.code().unwrap_or(INTERRUPTED_EXIT_CODE)
        }
        None => {
            tracing::info!(device = %device.display(), "Snapshot ready, waiting for SIGINT or SIGTERM");
            while !disk.is_cleaned_up() {
                thread::park();
            }
            return Ok(INTERRUPTED_EXIT_CODE);
        }
    };

    disk.destroy_image(&image)?;
    Ok(code)
}
