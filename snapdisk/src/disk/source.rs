//! Source media classification.

use std::fmt;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

use serde::Serialize;

/// Kind of media a disk is created from, judged from file-type metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Directory,
    RegularFile,
    BlockDevice,
    /// Anything else: missing paths, dangling symlinks, sockets, FIFOs,
    /// character devices.
    Invalid,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Directory => "directory",
            SourceKind::RegularFile => "regular file",
            SourceKind::BlockDevice => "block device",
            SourceKind::Invalid => "invalid",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify `path`. Symlinks are followed.
pub fn classify_source(path: &Path) -> SourceKind {
    let Ok(metadata) = std::fs::metadata(path) else {
        return SourceKind::Invalid;
    };

    let file_type = metadata.file_type();
    if file_type.is_dir() {
        SourceKind::Directory
    } else if file_type.is_file() {
        SourceKind::RegularFile
    } else if file_type.is_block_device() {
        SourceKind::BlockDevice
    } else {
        SourceKind::Invalid
    }
}

/// True if `path` is a block device.
pub fn is_block_device(path: &Path) -> bool {
    classify_source(path) == SourceKind::BlockDevice
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_regular_file() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("disk.raw");
        std::fs::write(&image, b"data").unwrap();
        assert_eq!(classify_source(&image), SourceKind::RegularFile);
    }

    #[test]
    fn test_directory() {
        let dir = TempDir::new().unwrap();
        assert_eq!(classify_source(dir.path()), SourceKind::Directory);
    }

    #[test]
    fn test_fifo_is_invalid() {
        let dir = TempDir::new().unwrap();
        let fifo = dir.path().join("pipe");
        nix::unistd::mkfifo(&fifo, nix::sys::stat::Mode::S_IRWXU).unwrap();
        assert_eq!(classify_source(&fifo), SourceKind::Invalid);
    }

    #[test]
    fn test_char_device_is_invalid() {
        assert_eq!(classify_source(Path::new("/dev/null")), SourceKind::Invalid);
    }

    #[test]
    fn test_missing_and_dangling() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            classify_source(&dir.path().join("missing")),
            SourceKind::Invalid
        );

        let link = dir.path().join("dangling");
        std::os::unix::fs::symlink(dir.path().join("nowhere"), &link).unwrap();
        assert_eq!(classify_source(&link), SourceKind::Invalid);
    }

    #[test]
    fn test_symlink_to_file_follows() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("disk.img");
        std::fs::write(&image, b"").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&image, &link).unwrap();
        assert_eq!(classify_source(&link), SourceKind::RegularFile);
    }
}
