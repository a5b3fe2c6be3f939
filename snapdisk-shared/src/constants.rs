//! Constants shared by the library and the CLI.

/// External tools invoked through the command runner.
pub mod tools {
    pub const LOSETUP: &str = "losetup";
    pub const DMSETUP: &str = "dmsetup";
    pub const BLOCKDEV: &str = "blockdev";
    pub const QEMU_IMG: &str = "qemu-img";
    pub const MKE2FS: &str = "mke2fs";
    pub const MOUNT: &str = "mount";
    pub const UMOUNT: &str = "umount";
}

/// Device-mapper naming.
pub mod mapper {
    /// Prefix of every snapshot target name; a 128-bit hex id follows.
    pub const SNAPSHOT_PREFIX: &str = "snf-image-creator-snapshot-";

    /// Directory where device-mapper exposes mapped devices.
    pub const DEV_DIR: &str = "/dev/mapper";
}

/// Scratch directory naming.
pub mod scratch {
    /// Prefix of the per-disk scratch directory.
    pub const DIR_PREFIX: &str = ".snf_image_creator.";

    /// Prefix of copy-on-write backing files.
    pub const COW_PREFIX: &str = "cow-";
}

/// Environment variables.
pub mod envs {
    /// Pins the scratch parent directory, skipping free-space selection.
    pub const SNAPDISK_TMPDIR: &str = "SNAPDISK_TMPDIR";

    /// Set for commands run by `snapdisk snapshot` to the overlay device.
    pub const SNAPDISK_DEVICE: &str = "SNAPDISK_DEVICE";
}
