//! File-backed disk image.

use std::fs::{File, OpenOptions, TryLockError};
use std::io::{Read as _, Seek as _, SeekFrom, Write as _};
use std::path::Path;

use super::{BlockDevice, DeviceError, DeviceResult, check_access};
use crate::geometry::{CLUSTER_COUNT, CLUSTER_SIZE};

/// A virtual disk stored in one flat backing file.
///
/// The file is exactly `CLUSTER_COUNT * CLUSTER_SIZE` bytes, cluster `i`
/// occupying the byte range `[i * CLUSTER_SIZE, (i + 1) * CLUSTER_SIZE)`.
/// The handle holds an exclusive advisory lock for its whole lifetime, so a
/// second process cannot open the same image concurrently.
#[derive(Debug)]
pub struct DiskImage {
    file: Option<File>,
}

impl DiskImage {
    /// Opens a disk image, creating a zero-filled one if it is missing and
    /// `create_if_missing` is set.
    ///
    /// An existing file is not validated beyond what later reads and writes
    /// enforce.
    pub fn open(path: impl AsRef<Path>, create_if_missing: bool) -> DeviceResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            if !create_if_missing {
                return Err(DeviceError::Io);
            }
            Self::create_empty(path)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|_| DeviceError::Io)?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => return Err(DeviceError::Locked),
            Err(TryLockError::Error(_)) => return Err(DeviceError::Io),
        }

        log::debug!("opened disk image {}", path.display());
        Ok(Self { file: Some(file) })
    }

    /// Zero-fills a fresh backing file, one cluster at a time.
    fn create_empty(path: &Path) -> DeviceResult<()> {
        let mut file = File::create(path).map_err(|_| DeviceError::Io)?;

        let zeroes = [0_u8; CLUSTER_SIZE];
        for _ in 0..CLUSTER_COUNT {
            file.write_all(&zeroes).map_err(|_| DeviceError::Io)?;
        }
        file.sync_all().map_err(|_| DeviceError::Io)?;

        log::debug!("created empty disk image {}", path.display());
        Ok(())
    }

    /// Flushes and releases the backing file.
    ///
    /// Every operation after this fails with [`DeviceError::NotOpen`].
    pub fn close(&mut self) -> DeviceResult<()> {
        let file = self.file.take().ok_or(DeviceError::NotOpen)?;
        file.sync_all().map_err(|_| DeviceError::Io)
    }

    fn file_mut(&mut self) -> DeviceResult<&mut File> {
        self.file.as_mut().ok_or(DeviceError::NotOpen)
    }
}

impl BlockDevice for DiskImage {
    fn read_cluster(&mut self, index: usize, buf: &mut [u8]) -> DeviceResult<()> {
        check_access(index, buf.len())?;
        let file = self.file_mut()?;

        file.seek(SeekFrom::Start((index * CLUSTER_SIZE) as u64))
            .map_err(|_| DeviceError::Io)?;
        // read_exact fails on a truncated image rather than returning
        // a short cluster.
        file.read_exact(buf).map_err(|_| DeviceError::Io)
    }

    fn write_cluster(&mut self, index: usize, data: &[u8]) -> DeviceResult<()> {
        check_access(index, data.len())?;
        let file = self.file_mut()?;

        file.seek(SeekFrom::Start((index * CLUSTER_SIZE) as u64))
            .map_err(|_| DeviceError::Io)?;
        file.write_all(data).map_err(|_| DeviceError::Io)?;
        file.flush().map_err(|_| DeviceError::Io)
    }
}
