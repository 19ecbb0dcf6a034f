//! RAM-backed device, mainly for tests and scratch volumes.

use super::{BlockDevice, DeviceResult, check_access};
use crate::geometry::{CLUSTER_SIZE, DISK_SIZE};

/// An in-memory volume with the same geometry and checking as a real
/// disk image.
pub struct MemDevice {
    data: Vec<u8>,
}

impl MemDevice {
    #[must_use]
    /// Creates a zero-filled in-memory volume.
    pub fn new() -> Self {
        Self {
            data: vec![0; DISK_SIZE],
        }
    }
}

impl Default for MemDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDevice for MemDevice {
    fn read_cluster(&mut self, index: usize, buf: &mut [u8]) -> DeviceResult<()> {
        check_access(index, buf.len())?;
        let start = index * CLUSTER_SIZE;
        buf.copy_from_slice(&self.data[start..start + CLUSTER_SIZE]);
        Ok(())
    }

    fn write_cluster(&mut self, index: usize, data: &[u8]) -> DeviceResult<()> {
        check_access(index, data.len())?;
        let start = index * CLUSTER_SIZE;
        self.data[start..start + CLUSTER_SIZE].copy_from_slice(data);
        Ok(())
    }
}
