//! Fixed on-disk layout of the volume.
//!
//! The geometry is compile-time constant: one superblock cluster, four
//! allocation table clusters, the root directory head and a content pool.

/// Size of one cluster in bytes.
pub const CLUSTER_SIZE: usize = 1024;
/// Total number of clusters on the volume, reserved ones included.
pub const CLUSTER_COUNT: usize = 1024;
/// Size of the backing file in bytes.
pub const DISK_SIZE: usize = CLUSTER_COUNT * CLUSTER_SIZE;

/// Cluster holding the superblock. Reserved, zero-initialized.
pub const SUPERBLOCK_CLUSTER: usize = 0;
/// First cluster of the persisted allocation table.
pub const FAT_START_CLUSTER: usize = 1;
/// Last cluster of the persisted allocation table (inclusive).
pub const FAT_END_CLUSTER: usize = 4;
/// Number of clusters occupied by the persisted allocation table.
pub const FAT_CLUSTERS: usize = FAT_END_CLUSTER - FAT_START_CLUSTER + 1;
/// Encoded size of one allocation table entry (little-endian `i32`).
pub const FAT_ENTRY_SIZE: usize = 4;

/// First cluster of the root directory.
pub const ROOT_DIR_CLUSTER: usize = 5;
/// First cluster available for allocation to files and directories.
pub const CONTENT_START_CLUSTER: usize = 6;

// The persisted table must hold exactly one entry per cluster.
const _: () = assert!(FAT_CLUSTERS * CLUSTER_SIZE / FAT_ENTRY_SIZE == CLUSTER_COUNT);
