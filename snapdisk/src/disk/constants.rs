//! Storage and disk image constants.
//!
//! Centralized location for all storage-related configuration values.

/// Device-mapper snapshot configuration
pub mod snapshot {
    /// Sector size used by `blockdev --getsz` and device-mapper tables
    pub const SECTOR_SIZE: u64 = 512;

    /// Default snapshot chunk size in sectors (8 sectors = 4KB)
    pub const DEFAULT_CHUNK_SECTORS: u64 = 8;

    /// Default number of attempts for loop detach / device-mapper remove
    pub const DEFAULT_RELEASE_ATTEMPTS: u32 = 5;

    /// Default initial backoff between release attempts (doubled each time)
    pub const DEFAULT_RELEASE_BACKOFF_MS: u64 = 250;
}

/// QCOW2 disk image configuration
pub mod qcow2 {
    /// QCOW2 magic ("QFI\xfb")
    pub const MAGIC: u32 = 0x514649fb;

    /// QCOW2 cluster size in bits (64KB = 2^16)
    pub const CLUSTER_BITS: u32 = 16;

    /// QCOW2 refcount order (16-bit refcounts = 2^4)
    pub const REFCOUNT_ORDER: u32 = 4;

    /// Length of a version 3 header
    pub const V3_HEADER_LENGTH: u32 = 104;

    /// Offset where the backing file name is stored
    pub const BACKING_FILE_OFFSET: u64 = 512;

    /// Header extension type for the backing file format
    pub const EXT_BACKING_FORMAT: u32 = 0xE2792ACA;
}

/// Ext4 filesystem configuration
pub mod ext4 {
    /// Ext4 block size in bytes
    pub const BLOCK_SIZE: u64 = 4096;

    /// Ext4 inode size in bytes
    pub const INODE_SIZE: u64 = 256;

    /// Size multiplier numerator (11/10 = 1.1x = 10% overhead)
    pub const SIZE_MULTIPLIER_NUM: u64 = 11;

    /// Size multiplier denominator
    pub const SIZE_MULTIPLIER_DEN: u64 = 10;

    /// Base overhead for ext4 journal (in bytes)
    /// 64MB for journal
    pub const JOURNAL_OVERHEAD_BYTES: u64 = 64 * 1024 * 1024;

    /// Minimum disk size (in bytes)
    /// 256MB for small images
    pub const MIN_DISK_SIZE_BYTES: u64 = 256 * 1024 * 1024;
}

/// Temporary space selection
pub mod tmp {
    /// Fixed candidates, in preference order for ties. The user's home
    /// directory is inserted after the first entry at runtime.
    pub const VAR_TMP: &str = "/var/tmp";
    pub const MNT: &str = "/mnt";
}
