use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use snapdisk::{ImageFormat, SnapdiskError, SourceKind, SystemRunner, classify_source, probe_format};

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Image file, block device or directory
    pub source: PathBuf,
}

#[derive(Serialize)]
struct InspectReport {
    source: PathBuf,
    kind: SourceKind,
    /// Absent for directories, which are bundled rather than probed
    format: Option<ImageFormat>,
}

pub fn execute(args: InspectArgs) -> anyhow::Result<()> {
    let kind = classify_source(&args.source);
    let format = match kind {
        SourceKind::Invalid => {
            return Err(SnapdiskError::UnsupportedMediaSource { path: args.source }.into());
        }
        SourceKind::Directory => None,
        SourceKind::RegularFile | SourceKind::BlockDevice => {
            Some(probe_format(&SystemRunner::new(), &args.source)?)
        }
    };

    let report = InspectReport {
        source: args.source,
        kind,
        format,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
