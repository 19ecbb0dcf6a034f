//! Whole-cluster block devices backing a volume.

use thiserror::Error;

mod image;
mod mem;

pub use image::DiskImage;
pub use mem::MemDevice;

#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum DeviceError {
    #[error("I/O error")]
    Io,
    #[error("Cluster index out of bounds")]
    OutOfBounds,
    #[error("Buffer length does not match the cluster size")]
    BadBufferLength,
    #[error("Device is not open")]
    NotOpen,
    #[error("Disk image is locked by another process")]
    Locked,
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// A cluster-addressed block device.
///
/// Transfers are whole clusters only: `buf` must be exactly
/// [`crate::geometry::CLUSTER_SIZE`] bytes and there is no partial or
/// offset access.
pub trait BlockDevice {
    /// Reads cluster `index` into `buf`.
    fn read_cluster(&mut self, index: usize, buf: &mut [u8]) -> DeviceResult<()>;
    /// Overwrites cluster `index` with `data`.
    fn write_cluster(&mut self, index: usize, data: &[u8]) -> DeviceResult<()>;
}

/// Bounds and buffer-length checks shared by device implementations.
fn check_access(index: usize, len: usize) -> DeviceResult<()> {
    if index >= crate::geometry::CLUSTER_COUNT {
        return Err(DeviceError::OutOfBounds);
    }
    if len != crate::geometry::CLUSTER_SIZE {
        return Err(DeviceError::BadBufferLength);
    }
    Ok(())
}
