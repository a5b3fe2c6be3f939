//! The disk handle: owner of a source's scratch space, snapshots and images.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use snapdisk_shared::constants::scratch;
use snapdisk_shared::errors::{SnapdiskError, SnapdiskResult};

use super::bundle::{BundleContext, VolumeBundler, is_live_root};
use super::ext4::Ext4Bundler;
use super::format::probe_format;
use super::image::{Image, ImageOptions, Inspector, PassthroughInspector};
use super::snapshot::SnapshotBuilder;
use super::source::{SourceKind, classify_source};
use super::tmp::{SpaceProbe, StatvfsProbe, select_tmp_dir};
use crate::ledger::{CleanupAction, CleanupReport, ResourceLedger};
use crate::options::SnapdiskOptions;
use crate::runner::{CommandRunner, SystemRunner};
use crate::util::unique_hex;

/// Builder for [`Disk`] with injectable collaborators.
pub struct DiskBuilder {
    source: PathBuf,
    options: SnapdiskOptions,
    runner: Arc<dyn CommandRunner>,
    bundler: Arc<dyn VolumeBundler>,
    probe: Arc<dyn SpaceProbe>,
    inspector: Arc<dyn Inspector>,
}

impl DiskBuilder {
    pub fn options(mut self, options: SnapdiskOptions) -> Self {
        self.options = options;
        self
    }

    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn bundler(mut self, bundler: Arc<dyn VolumeBundler>) -> Self {
        self.bundler = bundler;
        self
    }

    pub fn space_probe(mut self, probe: Arc<dyn SpaceProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn inspector(mut self, inspector: Arc<dyn Inspector>) -> Self {
        self.inspector = inspector;
        self
    }

    /// Select scratch space and create the disk's scratch directory.
    ///
    /// The source is not examined yet.
    pub fn build(self) -> SnapdiskResult<Disk> {
        self.options.validate()?;

        let parent = select_tmp_dir(
            self.options.tmp_dir.as_deref(),
            &self.options.tmp_candidates,
            self.probe.as_ref(),
        )?;
        // Mount bookkeeping compares against canonical paths
        let parent = parent.canonicalize().map_err(|e| {
            SnapdiskError::Storage(format!("Failed to resolve {}: {}", parent.display(), e))
        })?;

        let ledger = ResourceLedger::new(self.runner.clone(), self.options.retry_policy());
        let tmp_dir = parent.join(format!("{}{}", scratch::DIR_PREFIX, unique_hex()));
        std::fs::create_dir(&tmp_dir).map_err(|e| {
            SnapdiskError::Storage(format!(
                "Failed to create scratch directory in {}: {}",
                parent.display(),
                e
            ))
        })?;
        ledger.register(CleanupAction::RemoveTree {
            path: tmp_dir.clone(),
        })?;

        tracing::debug!(
            source = %self.source.display(),
            tmp_dir = %tmp_dir.display(),
            "Disk created"
        );

        Ok(Disk {
            live_root: is_live_root(&self.source),
            source: self.source,
            tmp_dir,
            options: self.options,
            runner: self.runner,
            bundler: self.bundler,
            inspector: self.inspector,
            ledger,
            file: Mutex::new(None),
            images: Mutex::new(Vec::new()),
            next_image_id: AtomicU64::new(0),
            meta: Mutex::new(BTreeMap::new()),
            cleaning: AtomicBool::new(false),
        })
    }
}

/// A source medium and everything derived from it.
///
/// All operations take `&self`, so an `Arc<Disk>` can be shared with a thread
/// that calls [`cleanup`](Disk::cleanup) on interrupt. Dropping the disk
/// cleans it up.
pub struct Disk {
    source: PathBuf,
    tmp_dir: PathBuf,
    live_root: bool,
    options: SnapdiskOptions,
    runner: Arc<dyn CommandRunner>,
    bundler: Arc<dyn VolumeBundler>,
    inspector: Arc<dyn Inspector>,
    ledger: ResourceLedger,
    /// Working file, resolved once.
    file: Mutex<Option<PathBuf>>,
    /// Live images, oldest first.
    images: Mutex<Vec<Arc<Image>>>,
    next_image_id: AtomicU64,
    meta: Mutex<BTreeMap<String, String>>,
    cleaning: AtomicBool,
}

impl Disk {
    /// Create a disk with default collaborators.
    pub fn new(source: impl Into<PathBuf>, options: SnapdiskOptions) -> SnapdiskResult<Self> {
        Self::builder(source).options(options).build()
    }

    pub fn builder(source: impl Into<PathBuf>) -> DiskBuilder {
        DiskBuilder {
            source: source.into(),
            options: SnapdiskOptions::default(),
            runner: Arc::new(SystemRunner::new()),
            bundler: Arc::new(Ext4Bundler::new()),
            probe: Arc::new(StatvfsProbe),
            inspector: Arc::new(PassthroughInspector),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The disk's exclusively owned scratch directory. Always absolute.
    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// True once [`cleanup`](Self::cleanup) has started.
    pub fn is_cleaned_up(&self) -> bool {
        self.cleaning.load(Ordering::SeqCst)
    }

    /// Metadata collected by collaborators.
    pub fn meta(&self) -> BTreeMap<String, String> {
        self.meta.lock().clone()
    }

    pub fn set_meta(&self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.lock().insert(key.into(), value.into());
    }

    fn ensure_open(&self) -> SnapdiskResult<()> {
        if self.is_cleaned_up() {
            return Err(SnapdiskError::DiskAlreadyCleanedUp);
        }
        Ok(())
    }

    /// The source as a regular file or block device.
    ///
    /// Directories are bundled into a raw image on first use. Resolved once;
    /// a failure is not remembered.
    pub fn file(&self) -> SnapdiskResult<PathBuf> {
        self.ensure_open()?;
        let mut file = self.file.lock();
        if let Some(path) = file.as_ref() {
            return Ok(path.clone());
        }

        tracing::info!(source = %self.source.display(), "Examining source media");
        let kind = classify_source(&self.source);
        let resolved = match kind {
            SourceKind::Directory => {
                tracing::info!(source = %self.source.display(), "Source looks like a directory");
                self.dir_to_disk()?
            }
            SourceKind::RegularFile | SourceKind::BlockDevice => {
                tracing::info!(source = %self.source.display(), %kind, "Source looks like an image");
                self.source.clone()
            }
            SourceKind::Invalid => {
                return Err(SnapdiskError::UnsupportedMediaSource {
                    path: self.source.clone(),
                });
            }
        };

        *file = Some(resolved.clone());
        Ok(resolved)
    }

    fn dir_to_disk(&self) -> SnapdiskResult<PathBuf> {
        if !self.live_root {
            return Err(SnapdiskError::UnsupportedDirectorySource {
                path: self.source.clone(),
            });
        }

        let image = self.tmp_dir.join(format!("{}.raw", unique_hex()));
        self.ledger
            .register(CleanupAction::RemoveFile { path: image.clone() })?;

        self.bundler.create_image(&BundleContext {
            source: &self.source,
            image: &image,
            scratch: &self.tmp_dir,
            ledger: &self.ledger,
            runner: self.runner.as_ref(),
        })?;
        Ok(image)
    }

    /// Create a writable copy-on-write overlay of the source.
    ///
    /// Each call creates an independent overlay. Writing to two overlays of
    /// the same origin at once is unsupported.
    pub fn snapshot(&self) -> SnapdiskResult<PathBuf> {
        self.ensure_open()?;
        if self.live_root {
            tracing::warn!("Snapshotting ignored for host bundling mode");
            return self.file();
        }

        let working = self.file()?;
        SnapshotBuilder::new(
            self.runner.as_ref(),
            &self.ledger,
            &self.tmp_dir,
            self.options.chunk_sectors,
        )
        .build(&working)
    }

    /// Wrap `media` in an enabled, tracked image handle.
    pub fn get_image(&self, media: &Path, options: ImageOptions) -> SnapdiskResult<Arc<Image>> {
        self.ensure_open()?;
        let format = probe_format(self.runner.as_ref(), media)?;
        let id = self.next_image_id.fetch_add(1, Ordering::SeqCst);
        let image = Arc::new(Image::new(
            id,
            media.to_path_buf(),
            format,
            options,
            self.inspector.clone(),
        ));

        {
            let mut images = self.images.lock();
            // cleanup() may have drained the images while the format was probed
            if self.is_cleaned_up() {
                return Err(SnapdiskError::DiskAlreadyCleanedUp);
            }
            images.push(image.clone());
        }
        image.enable()?;
        tracing::debug!(image = id, device = %media.display(), "Image created");
        Ok(image)
    }

    /// Destroy an image created by this disk before the disk itself is cleaned up.
    ///
    /// Once cleanup has started this fails with `DiskAlreadyCleanedUp`; cleanup
    /// destroys every image itself.
    pub fn destroy_image(&self, image: &Image) -> SnapdiskResult<()> {
        self.ensure_open()?;
        let removed = {
            let mut images = self.images.lock();
            let position = images
                .iter()
                .position(|tracked| std::ptr::eq(Arc::as_ptr(tracked), image))
                .ok_or(SnapdiskError::ImageNotTracked(image.id()))?;
            images.remove(position)
        };
        removed.destroy()
    }

    /// Number of images currently tracked.
    pub fn image_count(&self) -> usize {
        self.images.lock().len()
    }

    /// Destroy every image, newest first, then unwind the ledger.
    ///
    /// Never fails: individual failures are logged and reported. A second or
    /// concurrent call returns an empty report.
    pub fn cleanup(&self) -> CleanupReport {
        if self.cleaning.swap(true, Ordering::SeqCst) {
            tracing::debug!(source = %self.source.display(), "Cleanup already done or in progress");
            return CleanupReport::default();
        }

        tracing::info!(source = %self.source.display(), "Cleaning up disk");
        loop {
            let Some(image) = self.images.lock().pop() else {
                break;
            };
            if let Err(e) = image.destroy() {
                tracing::warn!(image = image.id(), error = %e, "Failed to destroy image");
            }
        }

        let report = self.ledger.unwind();
        if report.failures.is_empty() {
            tracing::debug!(released = report.released.len(), "Disk cleaned up");
        } else {
            tracing::warn!(
                released = report.released.len(),
                failed = report.failures.len(),
                "Disk cleaned up with failures"
            );
        }
        report
    }
}

impl Drop for Disk {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl fmt::Debug for Disk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disk")
            .field("source", &self.source)
            .field("tmp_dir", &self.tmp_dir)
            .field("live_root", &self.live_root)
            .field("cleaned_up", &self.is_cleaned_up())
            .finish()
    }
}
