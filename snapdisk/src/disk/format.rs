//! Disk image format detection.
//!
//! The format is always probed from content, never from the file extension.
//! `qemu-img info` is authoritative; when it is not installed a small magic
//! number table is consulted instead.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Serialize, Serializer};
use snapdisk_shared::constants::tools;
use snapdisk_shared::errors::{SnapdiskError, SnapdiskResult};

use super::constants::qcow2::MAGIC as QCOW2_MAGIC;
use crate::ledger::path_arg;
use crate::runner::{CommandRunner, run_checked};

/// Disk image format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFormat {
    /// Raw image or block device; snapshotted through device-mapper.
    Raw,
    /// QCOW2 (QEMU Copy-On-Write v2/v3).
    Qcow2,
    /// Any other structured format reported by the probe (vmdk, vdi, vhdx, ...).
    Other(String),
}

impl ImageFormat {
    /// Map a probe's format name to a variant.
    pub fn from_name(name: &str) -> Self {
        match name {
            "raw" => ImageFormat::Raw,
            "qcow2" => ImageFormat::Qcow2,
            other => ImageFormat::Other(other.to_string()),
        }
    }

    /// Get string representation of this format.
    pub fn as_str(&self) -> &str {
        match self {
            ImageFormat::Raw => "raw",
            ImageFormat::Qcow2 => "qcow2",
            ImageFormat::Other(name) => name,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, ImageFormat::Raw)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ImageFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Probe the format of the image or device at `path`.
pub fn probe_format(runner: &dyn CommandRunner, path: &Path) -> SnapdiskResult<ImageFormat> {
    let arg = path_arg(path)?;
    match run_checked(runner, tools::QEMU_IMG, &["info", "--output=json", arg]) {
        Ok(json) => {
            let format = parse_qemu_img_format(&json)?;
            tracing::debug!(path = %path.display(), %format, "Probed image format");
            Ok(format)
        }
        Err(SnapdiskError::ToolNotFound(_)) => {
            tracing::debug!(
                path = %path.display(),
                "qemu-img not available, falling back to magic number detection"
            );
            sniff_format(path)
        }
        Err(e) => Err(e),
    }
}

/// Extract the `format` field from `qemu-img info --output=json` output.
fn parse_qemu_img_format(json: &str) -> SnapdiskResult<ImageFormat> {
    let info: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| SnapdiskError::Storage(format!("Invalid qemu-img info output: {}", e)))?;
    info.get("format")
        .and_then(|f| f.as_str())
        .map(ImageFormat::from_name)
        .ok_or_else(|| SnapdiskError::Storage("qemu-img info output has no format".to_string()))
}

/// Detect the format from the leading bytes of the image.
pub fn sniff_format(path: &Path) -> SnapdiskResult<ImageFormat> {
    let mut header = [0u8; 72];
    let mut file = File::open(path).map_err(|e| {
        SnapdiskError::Storage(format!("Failed to open {}: {}", path.display(), e))
    })?;
    let read = read_up_to(&mut file, &mut header)?;
    Ok(format_from_header(&header[..read]))
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> SnapdiskResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn format_from_header(header: &[u8]) -> ImageFormat {
    // VDI: signature 0xbeda107f at offset 64
    const VDI_SIGNATURE: [u8; 4] = [0x7f, 0x10, 0xda, 0xbe];

    if header.len() >= 4 && u32::from_be_bytes([header[0], header[1], header[2], header[3]]) == QCOW2_MAGIC {
        ImageFormat::Qcow2
    } else if header.starts_with(b"KDMV") {
        ImageFormat::Other("vmdk".to_string())
    } else if header.starts_with(b"vhdxfile") {
        ImageFormat::Other("vhdx".to_string())
    } else if header.len() >= 68 && header[64..68] == VDI_SIGNATURE {
        ImageFormat::Other("vdi".to_string())
    } else {
        ImageFormat::Raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandOutput;
    use tempfile::TempDir;

    struct CannedRunner(SnapdiskResult<CommandOutput>);

    impl CommandRunner for CannedRunner {
        fn run(&self, _program: &str, _args: &[&str]) -> SnapdiskResult<CommandOutput> {
            match &self.0 {
                Ok(out) => Ok(out.clone()),
                Err(SnapdiskError::ToolNotFound(t)) => Err(SnapdiskError::ToolNotFound(t.clone())),
                Err(e) => Err(SnapdiskError::Storage(e.to_string())),
            }
        }
    }

    #[test]
    fn test_parse_qemu_img_output() {
        let json = r#"{"virtual-size": 1073741824, "filename": "disk.img", "format": "qcow2"}"#;
        assert_eq!(parse_qemu_img_format(json).unwrap(), ImageFormat::Qcow2);

        let json = r#"{"format": "vmdk"}"#;
        assert_eq!(
            parse_qemu_img_format(json).unwrap(),
            ImageFormat::Other("vmdk".into())
        );

        assert!(parse_qemu_img_format("{}").is_err());
    }

    #[test]
    fn test_probe_uses_qemu_img() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("disk.qcow2");
        std::fs::write(&image, b"").unwrap();

        let runner = CannedRunner(Ok(CommandOutput::ok(r#"{"format": "raw"}"#)));
        // Extension is ignored, content decides
        assert_eq!(probe_format(&runner, &image).unwrap(), ImageFormat::Raw);
    }

    #[test]
    fn test_probe_falls_back_to_magic() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("disk.raw");
        let mut header = QCOW2_MAGIC.to_be_bytes().to_vec();
        header.extend_from_slice(&3u32.to_be_bytes());
        std::fs::write(&image, &header).unwrap();

        let runner = CannedRunner(Err(SnapdiskError::ToolNotFound("qemu-img".into())));
        assert_eq!(probe_format(&runner, &image).unwrap(), ImageFormat::Qcow2);
    }

    #[test]
    fn test_probe_propagates_failure() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("disk.raw");
        std::fs::write(&image, b"").unwrap();

        let runner = CannedRunner(Ok(CommandOutput::failed(1, "Could not open")));
        assert!(probe_format(&runner, &image).is_err());
    }

    #[test]
    fn test_sniff_formats() {
        assert_eq!(format_from_header(b"KDMV\x01\x00\x00\x00"), ImageFormat::Other("vmdk".into()));
        assert_eq!(format_from_header(b"vhdxfile"), ImageFormat::Other("vhdx".into()));
        assert_eq!(format_from_header(&[0u8; 512][..72]), ImageFormat::Raw);
        assert_eq!(format_from_header(b""), ImageFormat::Raw);

        let mut vdi = [0u8; 72];
        vdi[64..68].copy_from_slice(&[0x7f, 0x10, 0xda, 0xbe]);
        assert_eq!(format_from_header(&vdi), ImageFormat::Other("vdi".into()));
    }
}
