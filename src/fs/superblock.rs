//! The reserved superblock cluster.
//!
//! Cluster 0 carries no invariants yet; it is zero-initialized when a
//! volume is formatted and kept as whole-cluster reserved space.

use super::FsResult;
use crate::device::BlockDevice;
use crate::geometry::{CLUSTER_SIZE, SUPERBLOCK_CLUSTER};

/// Zero-fills the superblock cluster.
pub fn init<D: BlockDevice>(device: &mut D) -> FsResult<()> {
    device.write_cluster(SUPERBLOCK_CLUSTER, &[0_u8; CLUSTER_SIZE])?;
    Ok(())
}

/// Reads the raw superblock cluster.
pub fn read<D: BlockDevice>(device: &mut D) -> FsResult<[u8; CLUSTER_SIZE]> {
    let mut buf = [0_u8; CLUSTER_SIZE];
    device.read_cluster(SUPERBLOCK_CLUSTER, &mut buf)?;
    Ok(buf)
}

/// Overwrites the raw superblock cluster.
pub fn write<D: BlockDevice>(device: &mut D, data: &[u8; CLUSTER_SIZE]) -> FsResult<()> {
    device.write_cluster(SUPERBLOCK_CLUSTER, data)?;
    Ok(())
}
