//! A minimal FAT-style file system hosted inside a single disk image file.
//!
//! The whole volume lives in one fixed-size backing file of
//! [`geometry::CLUSTER_COUNT`] clusters. Cluster 0 is the superblock,
//! clusters 1..=4 hold the persisted allocation table, cluster 5 is the
//! root directory and everything above it is the content pool.
//!
//! Layering, bottom up:
//! - [`device`] — whole-cluster block I/O over the backing file,
//! - [`fs::fat`] — the resident allocation table and its chain algebra,
//! - [`fs::dirent`] — the 32-byte directory entry codec,
//! - [`fs::dir`] — directories as cluster chains of entry slots,
//! - [`fs::FileSystem`] — file and directory operations.
#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

pub mod device;
pub mod fs;
pub mod geometry;

pub use device::{BlockDevice, DeviceError, DiskImage, MemDevice};
pub use fs::{FileSystem, FsError, FsResult};
