//! Image handles: derived devices handed to an introspection collaborator.
//!
//! An [`Image`] never owns the loop or device-mapper resources behind its
//! device. Those stay in the parent disk's ledger. The image only owns the
//! introspection session bound to the device while it is enabled.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use snapdisk_shared::errors::{SnapdiskError, SnapdiskResult};

use super::format::ImageFormat;

/// Options for opening an image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOptions {
    /// Open the introspection session without write access.
    #[serde(default)]
    pub read_only: bool,
}

/// Live introspection session bound to a device.
pub trait InspectSession: Send {
    fn close(&mut self) -> SnapdiskResult<()>;
}

/// Opens introspection sessions on devices.
pub trait Inspector: Send + Sync {
    fn open(
        &self,
        device: &Path,
        format: &ImageFormat,
        options: &ImageOptions,
    ) -> SnapdiskResult<Box<dyn InspectSession>>;
}

/// [`Inspector`] whose sessions only check that the device exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughInspector;

struct PassthroughSession {
    device: PathBuf,
}

impl Inspector for PassthroughInspector {
    fn open(
        &self,
        device: &Path,
        format: &ImageFormat,
        options: &ImageOptions,
    ) -> SnapdiskResult<Box<dyn InspectSession>> {
        if !device.exists() {
            return Err(SnapdiskError::Storage(format!(
                "Image device {} does not exist",
                device.display()
            )));
        }
        tracing::debug!(
            device = %device.display(),
            %format,
            read_only = options.read_only,
            "Opened passthrough session"
        );
        Ok(Box::new(PassthroughSession {
            device: device.to_path_buf(),
        }))
    }
}

impl InspectSession for PassthroughSession {
    fn close(&mut self) -> SnapdiskResult<()> {
        tracing::debug!(device = %self.device.display(), "Closed passthrough session");
        Ok(())
    }
}

struct ImageState {
    session: Option<Box<dyn InspectSession>>,
    destroyed: bool,
}

/// A derived block device or file ready for inspection.
///
/// Created only by [`Disk::get_image`](crate::Disk::get_image).
pub struct Image {
    id: u64,
    device: PathBuf,
    format: ImageFormat,
    options: ImageOptions,
    inspector: Arc<dyn Inspector>,
    state: Mutex<ImageState>,
}

impl Image {
    pub(crate) fn new(
        id: u64,
        device: PathBuf,
        format: ImageFormat,
        options: ImageOptions,
        inspector: Arc<dyn Inspector>,
    ) -> Self {
        Self {
            id,
            device,
            format,
            options,
            inspector,
            state: Mutex::new(ImageState {
                session: None,
                destroyed: false,
            }),
        }
    }

    /// Identifier, unique within the parent disk.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    pub fn format(&self) -> &ImageFormat {
        &self.format
    }

    pub fn options(&self) -> ImageOptions {
        self.options
    }

    /// True while an introspection session is bound to the device.
    pub fn is_enabled(&self) -> bool {
        self.state.lock().session.is_some()
    }

    /// Open the introspection session. No-op when already enabled.
    pub fn enable(&self) -> SnapdiskResult<()> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(SnapdiskError::ImageNotTracked(self.id));
        }
        if state.session.is_none() {
            let session = self
                .inspector
                .open(&self.device, &self.format, &self.options)?;
            state.session = Some(session);
            tracing::debug!(image = self.id, device = %self.device.display(), "Image enabled");
        }
        Ok(())
    }

    /// Close the introspection session, keeping the device in place.
    pub fn disable(&self) -> SnapdiskResult<()> {
        let session = self.state.lock().session.take();
        if let Some(mut session) = session {
            session.close()?;
            tracing::debug!(image = self.id, device = %self.device.display(), "Image disabled");
        }
        Ok(())
    }

    /// Release this image's claim on its device. Idempotent.
    pub(crate) fn destroy(&self) -> SnapdiskResult<()> {
        let session = {
            let mut state = self.state.lock();
            state.destroyed = true;
            state.session.take()
        };
        if let Some(mut session) = session {
            session.close()?;
        }
        tracing::debug!(image = self.id, device = %self.device.display(), "Image destroyed");
        Ok(())
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("format", &self.format)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingInspector {
        opened: AtomicUsize,
        closed: Arc<AtomicUsize>,
    }

    struct CountingSession(Arc<AtomicUsize>);

    impl InspectSession for CountingSession {
        fn close(&mut self) -> SnapdiskResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Inspector for CountingInspector {
        fn open(
            &self,
            _device: &Path,
            _format: &ImageFormat,
            _options: &ImageOptions,
        ) -> SnapdiskResult<Box<dyn InspectSession>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingSession(self.closed.clone())))
        }
    }

    fn image(inspector: Arc<dyn Inspector>) -> Image {
        Image::new(
            7,
            PathBuf::from("/dev/mapper/snap"),
            ImageFormat::Raw,
            ImageOptions::default(),
            inspector,
        )
    }

    #[test]
    fn test_enable_disable_toggles_session() {
        let inspector = Arc::new(CountingInspector::default());
        let image = image(inspector.clone());

        assert!(!image.is_enabled());
        image.enable().unwrap();
        image.enable().unwrap();
        assert!(image.is_enabled());
        assert_eq!(inspector.opened.load(Ordering::SeqCst), 1);

        image.disable().unwrap();
        assert!(!image.is_enabled());
        assert_eq!(inspector.closed.load(Ordering::SeqCst), 1);

        image.enable().unwrap();
        assert_eq!(inspector.opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_destroy_closes_and_blocks_enable() {
        let inspector = Arc::new(CountingInspector::default());
        let image = image(inspector.clone());
        image.enable().unwrap();

        image.destroy().unwrap();
        image.destroy().unwrap();
        assert_eq!(inspector.closed.load(Ordering::SeqCst), 1);
        assert!(matches!(
            image.enable(),
            Err(SnapdiskError::ImageNotTracked(7))
        ));
    }

    #[test]
    fn test_passthrough_requires_device() {
        let dir = TempDir::new().unwrap();
        let device = dir.path().join("disk.raw");
        let options = ImageOptions { read_only: true };

        assert!(
            PassthroughInspector
                .open(&device, &ImageFormat::Raw, &options)
                .is_err()
        );

        std::fs::write(&device, b"").unwrap();
        let mut session = PassthroughInspector
            .open(&device, &ImageFormat::Raw, &options)
            .unwrap();
        session.close().unwrap();
    }
}
