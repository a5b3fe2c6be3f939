//! Directory sources turned into raw image files.

use std::path::Path;

use snapdisk_shared::errors::SnapdiskResult;

use crate::ledger::ResourceLedger;
use crate::runner::CommandRunner;

/// Everything a bundler needs to materialize a directory as an image.
pub struct BundleContext<'a> {
    /// Directory to bundle. Always the live root in practice.
    pub source: &'a Path,
    /// Raw image to produce. Already registered for deletion.
    pub image: &'a Path,
    /// The disk's scratch directory. Bundlers keep their own temporaries here
    /// and must leave it out of the produced image.
    pub scratch: &'a Path,
    /// Ledger to register every mount and temporary with.
    pub ledger: &'a ResourceLedger,
    pub runner: &'a dyn CommandRunner,
}

/// Produces a raw image file at `ctx.image` representing `ctx.source`, or fails.
pub trait VolumeBundler: Send + Sync {
    fn create_image(&self, ctx: &BundleContext<'_>) -> SnapdiskResult<()>;
}

/// True if `path` resolves to the root of the running system.
pub fn is_live_root(path: &Path) -> bool {
    path.canonicalize()
        .map(|p| p == Path::new("/"))
        .unwrap_or(false)
}
