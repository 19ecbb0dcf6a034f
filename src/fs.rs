//! The file system layers above the block device.

use thiserror::Error;

use crate::device::{BlockDevice, DeviceError};
use crate::geometry::CLUSTER_SIZE;

pub mod dir;
pub mod dirent;
pub mod fat;
pub mod superblock;

use dir::{Directory, LocatedEntry};
use dirent::DirEntry;
use fat::{AllocationTable, Cluster, FatEntry};

#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum FsError {
    #[error("Entry not found")]
    NotFound,
    #[error("Entry already exists")]
    AlreadyExists,
    #[error("Directory is not empty")]
    NotEmpty,
    #[error("Not a directory")]
    NotADirectory,
    #[error("Is a directory")]
    IsADirectory,
    #[error("Out of space: requested {requested} clusters, {available} available")]
    OutOfSpace { requested: usize, available: usize },
    #[error("Corrupt cluster chain at cluster {0}")]
    CorruptChain(u32),
    #[error("Cluster {0} is reserved")]
    ReservedCluster(u32),
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

pub type FsResult<T> = Result<T, FsError>;

/// A mounted volume: the block device plus the resident allocation table.
///
/// All operations are synchronous, run to completion and take `&mut self`,
/// so a session is single-writer by construction. Every operation that
/// changes chain links flushes the table before returning; operations
/// that only touch directory-entry bytes leave the persisted table alone.
pub struct FileSystem<D: BlockDevice> {
    device: D,
    fat: AllocationTable,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Mounts a volume, formatting it first if it is fresh.
    ///
    /// A fresh volume is recognized by its root directory cluster still
    /// being free; formatting zero-fills the superblock and the root
    /// cluster and anchors the root chain.
    pub fn mount(mut device: D) -> FsResult<Self> {
        let mut fat = AllocationTable::load(&mut device)?;

        if fat.entry(Cluster::ROOT)? == FatEntry::Free {
            superblock::init(&mut device)?;
            device.write_cluster(Cluster::ROOT.index(), &[0_u8; CLUSTER_SIZE])?;
            fat.set_entry(Cluster::ROOT, FatEntry::EndOfChain)?;
            fat.flush(&mut device)?;
            log::debug!("formatted fresh volume");
        } else {
            log::debug!("mounted existing volume");
        }

        Ok(Self { device, fat })
    }

    /// Flushes the allocation table and hands the device back.
    pub fn unmount(mut self) -> FsResult<D> {
        self.fat.flush(&mut self.device)?;
        Ok(self.device)
    }

    #[must_use]
    #[inline]
    /// First cluster of the root directory.
    pub const fn root() -> Cluster {
        Cluster::ROOT
    }

    #[must_use]
    #[inline]
    /// Free space left in the content pool, in bytes.
    pub fn free_space(&self) -> usize {
        self.fat.free_clusters() * CLUSTER_SIZE
    }

    /// Returns all entries of the directory chain starting at `dir`.
    pub fn list_directory(&mut self, dir: Cluster) -> FsResult<Vec<DirEntry>> {
        Ok(self
            .dir_at(dir)
            .entries()?
            .into_iter()
            .map(|located| located.entry)
            .collect())
    }

    /// Looks a display name up in `parent`.
    pub fn lookup(&mut self, parent: Cluster, name: &str) -> FsResult<Option<DirEntry>> {
        Ok(self.dir_at(parent).find(name)?.map(|located| located.entry))
    }

    /// Creates an empty regular file (no content chain yet).
    pub fn create_file(&mut self, parent: Cluster, name: &str) -> FsResult<()> {
        if self.dir_at(parent).find(name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }

        self.dir_at(parent).add(DirEntry::new_file(name))?;
        // The directory chain may have grown by a cluster.
        self.flush_table()
    }

    /// Replaces the file's content.
    ///
    /// The prior chain is released first, then a chain of
    /// `ceil(len / CLUSTER_SIZE)` clusters is allocated and written, the
    /// final cluster zero-padded. Zero-length content leaves the file
    /// present-empty. If allocation fails the entry stays present-empty
    /// instead of dangling into freed clusters.
    pub fn write_file(&mut self, parent: Cluster, name: &str, content: &[u8]) -> FsResult<()> {
        let located = self.require_file(parent, name)?;
        let mut entry = located.entry;

        if let Some(first) = entry.first_cluster() {
            self.fat.free_chain(first)?;
        }
        entry.set_first_cluster(None);
        entry.set_size(0);

        if !content.is_empty() {
            let needed = content.len().div_ceil(CLUSTER_SIZE);
            match self.fat.allocate_chain(needed) {
                Ok(head) => {
                    self.write_content(head, content)?;
                    entry.set_first_cluster(Some(head));
                    entry.set_size(content.len());
                }
                Err(err) => {
                    self.dir_at(parent).update(located.location, &entry)?;
                    self.flush_table()?;
                    return Err(err);
                }
            }
        }

        self.dir_at(parent).update(located.location, &entry)?;
        self.flush_table()?;

        log::trace!("wrote {} bytes to {}", content.len(), entry.display_name());
        Ok(())
    }

    /// Reads the file's whole content.
    pub fn read_file(&mut self, parent: Cluster, name: &str) -> FsResult<Vec<u8>> {
        let entry = self.require_file(parent, name)?.entry;

        let Some(first) = entry.first_cluster() else {
            return Ok(Vec::new());
        };

        let chain = self.fat.follow_chain(first)?;
        let mut content = Vec::with_capacity(entry.size());
        let mut buf = [0_u8; CLUSTER_SIZE];

        for cluster in chain {
            if content.len() >= entry.size() {
                break;
            }
            self.device.read_cluster(cluster.index(), &mut buf)?;
            let take = usize::min(CLUSTER_SIZE, entry.size() - content.len());
            content.extend_from_slice(&buf[..take]);
        }
        Ok(content)
    }

    /// Deletes a file, freeing its content chain.
    pub fn delete_file(&mut self, parent: Cluster, name: &str) -> FsResult<()> {
        let located = self.require_file(parent, name)?;

        if let Some(first) = located.entry.first_cluster() {
            self.fat.free_chain(first)?;
        }
        self.dir_at(parent).remove(located.location)?;
        self.flush_table()
    }

    /// Copies a regular file, reading it fully into memory first.
    pub fn copy_file(
        &mut self,
        src_parent: Cluster,
        src_name: &str,
        dst_parent: Cluster,
        dst_name: &str,
    ) -> FsResult<()> {
        let content = self.read_file(src_parent, src_name)?;
        self.create_file(dst_parent, dst_name)?;
        self.write_file(dst_parent, dst_name, &content)
    }

    /// Renames a file or directory in place, preserving its content chain
    /// and size.
    pub fn rename_entry(&mut self, parent: Cluster, old: &str, new: &str) -> FsResult<()> {
        let located = self.dir_at(parent).find(old)?.ok_or(FsError::NotFound)?;

        // Same normalized field: nothing to change.
        if dirent::format_name(new) == *located.entry.name_field() {
            return Ok(());
        }
        if self.dir_at(parent).find(new)?.is_some() {
            return Err(FsError::AlreadyExists);
        }

        let mut entry = located.entry;
        entry.set_name(new);
        self.dir_at(parent).update(located.location, &entry)
    }

    /// Creates a subdirectory with one zeroed cluster as its entry table.
    pub fn create_directory(&mut self, parent: Cluster, name: &str) -> FsResult<Cluster> {
        if self.dir_at(parent).find(name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }

        let first = self.fat.allocate_chain(1)?;
        self.device
            .write_cluster(first.index(), &[0_u8; CLUSTER_SIZE])?;

        self.dir_at(parent).add(DirEntry::new_directory(name, first))?;
        self.flush_table()?;
        Ok(first)
    }

    /// Removes an empty subdirectory. Non-recursive: a directory that
    /// still holds entries fails with [`FsError::NotEmpty`].
    pub fn remove_directory(&mut self, parent: Cluster, name: &str) -> FsResult<()> {
        let located = self.dir_at(parent).find(name)?.ok_or(FsError::NotFound)?;
        if !located.entry.is_directory() {
            return Err(FsError::NotADirectory);
        }

        if let Some(first) = located.entry.first_cluster() {
            if !self.dir_at(first).entries()?.is_empty() {
                return Err(FsError::NotEmpty);
            }
            self.fat.free_chain(first)?;
        }

        self.dir_at(parent).remove(located.location)?;
        self.flush_table()
    }

    /// Raw access to the reserved superblock cluster.
    pub fn read_superblock(&mut self) -> FsResult<[u8; CLUSTER_SIZE]> {
        superblock::read(&mut self.device)
    }

    /// Overwrites the reserved superblock cluster.
    pub fn write_superblock(&mut self, data: &[u8; CLUSTER_SIZE]) -> FsResult<()> {
        superblock::write(&mut self.device, data)
    }

    /// Looks up `name` and checks it is a regular file.
    fn require_file(&mut self, parent: Cluster, name: &str) -> FsResult<LocatedEntry> {
        let located = self.dir_at(parent).find(name)?.ok_or(FsError::NotFound)?;
        if located.entry.is_directory() {
            return Err(FsError::IsADirectory);
        }
        Ok(located)
    }

    /// Writes `content` across an allocated chain, zero-padding the tail.
    fn write_content(&mut self, head: Cluster, content: &[u8]) -> FsResult<()> {
        let chain = self.fat.follow_chain(head)?;
        let mut buf = [0_u8; CLUSTER_SIZE];

        for (i, cluster) in chain.iter().enumerate() {
            let start = i * CLUSTER_SIZE;
            let end = usize::min(start + CLUSTER_SIZE, content.len());
            buf.fill(0);
            buf[..end - start].copy_from_slice(&content[start..end]);
            self.device.write_cluster(cluster.index(), &buf)?;
        }
        Ok(())
    }

    fn dir_at(&mut self, first: Cluster) -> Directory<'_, D> {
        Directory::new(&mut self.device, &mut self.fat, first)
    }

    /// Persists the allocation table if any chain link changed.
    fn flush_table(&mut self) -> FsResult<()> {
        self.fat.flush(&mut self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemDevice;

    fn mounted() -> FileSystem<MemDevice> {
        FileSystem::mount(MemDevice::new()).unwrap()
    }

    #[test]
    fn create_collision_fails() {
        let mut fs = mounted();
        let root = FileSystem::<MemDevice>::root();

        fs.create_file(root, "a.txt").unwrap();
        assert_eq!(
            fs.create_file(root, "A.TXT").unwrap_err(),
            FsError::AlreadyExists
        );
    }

    #[test]
    fn write_transitions_between_empty_and_allocated() {
        let mut fs = mounted();
        let root = FileSystem::<MemDevice>::root();

        fs.create_file(root, "a.txt").unwrap();
        let entry = fs.lookup(root, "a.txt").unwrap().unwrap();
        assert_eq!(entry.first_cluster(), None);

        fs.write_file(root, "a.txt", b"hello").unwrap();
        let entry = fs.lookup(root, "a.txt").unwrap().unwrap();
        assert!(entry.first_cluster().is_some());
        assert_eq!(entry.size(), 5);

        // Writing zero bytes goes back to present-empty and frees the chain.
        let free_before = fs.free_space();
        fs.write_file(root, "a.txt", b"").unwrap();
        let entry = fs.lookup(root, "a.txt").unwrap().unwrap();
        assert_eq!(entry.first_cluster(), None);
        assert_eq!(entry.size(), 0);
        assert_eq!(fs.free_space(), free_before + CLUSTER_SIZE);
    }

    #[test]
    fn type_mismatches_are_typed() {
        let mut fs = mounted();
        let root = FileSystem::<MemDevice>::root();

        fs.create_file(root, "file").unwrap();
        fs.create_directory(root, "dir").unwrap();

        assert_eq!(
            fs.read_file(root, "dir").unwrap_err(),
            FsError::IsADirectory
        );
        assert_eq!(
            fs.delete_file(root, "dir").unwrap_err(),
            FsError::IsADirectory
        );
        assert_eq!(
            fs.remove_directory(root, "file").unwrap_err(),
            FsError::NotADirectory
        );
        assert_eq!(
            fs.copy_file(root, "dir", root, "copy").unwrap_err(),
            FsError::IsADirectory
        );
    }

    #[test]
    fn rename_preserves_content_and_rejects_collisions() {
        let mut fs = mounted();
        let root = FileSystem::<MemDevice>::root();

        fs.create_file(root, "old.txt").unwrap();
        fs.write_file(root, "old.txt", b"payload").unwrap();
        fs.create_file(root, "taken.txt").unwrap();

        assert_eq!(
            fs.rename_entry(root, "old.txt", "taken.txt").unwrap_err(),
            FsError::AlreadyExists
        );

        fs.rename_entry(root, "old.txt", "new.txt").unwrap();
        assert!(fs.lookup(root, "old.txt").unwrap().is_none());
        assert_eq!(fs.read_file(root, "new.txt").unwrap(), b"payload");

        // Case-only rename is a no-op, not a collision with itself.
        fs.rename_entry(root, "new.txt", "NEW.TXT").unwrap();
        assert_eq!(fs.read_file(root, "new.txt").unwrap(), b"payload");
    }

    #[test]
    fn superblock_round_trips() {
        let mut fs = mounted();

        assert!(fs.read_superblock().unwrap().iter().all(|&b| b == 0));

        let mut data = [0_u8; CLUSTER_SIZE];
        data[0] = 0xAB;
        fs.write_superblock(&data).unwrap();
        assert_eq!(fs.read_superblock().unwrap()[0], 0xAB);
    }
}
