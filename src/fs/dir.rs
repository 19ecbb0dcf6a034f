//! Directories as cluster chains of fixed-size entry slots.
//!
//! A directory is not a distinct on-disk structure: it is a cluster chain
//! located through the allocation table and interpreted as a flat,
//! unordered array of 32-byte entry slots. This layer holds no state
//! between calls; it reads and writes through the device and the table
//! on every operation.

use super::dirent::{self, DirEntry, ENTRY_SIZE};
use super::fat::{AllocationTable, Cluster, FatEntry};
use super::{FsError, FsResult};
use crate::device::BlockDevice;
use crate::geometry::CLUSTER_SIZE;

/// Entry slots per directory cluster.
pub const SLOTS_PER_CLUSTER: usize = CLUSTER_SIZE / ENTRY_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Physical address of one entry slot, needed for update and delete.
pub struct EntryLocation {
    pub cluster: Cluster,
    pub slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A decoded entry tagged with the slot it was read from.
pub struct LocatedEntry {
    pub entry: DirEntry,
    pub location: EntryLocation,
}

/// A view over one directory chain.
pub struct Directory<'a, D: BlockDevice> {
    device: &'a mut D,
    fat: &'a mut AllocationTable,
    first_cluster: Cluster,
}

impl<'a, D: BlockDevice> Directory<'a, D> {
    /// Opens a view over the directory chain starting at `first_cluster`.
    pub const fn new(
        device: &'a mut D,
        fat: &'a mut AllocationTable,
        first_cluster: Cluster,
    ) -> Self {
        Self {
            device,
            fat,
            first_cluster,
        }
    }

    /// Decodes every slot of every cluster in the chain and returns the
    /// non-tombstone entries with their physical locations.
    pub fn entries(&mut self) -> FsResult<Vec<LocatedEntry>> {
        let chain = self.fat.follow_chain(self.first_cluster)?;
        let mut found = Vec::new();
        let mut buf = [0_u8; CLUSTER_SIZE];

        for cluster in chain {
            self.device.read_cluster(cluster.index(), &mut buf)?;
            for (slot, raw) in buf.chunks_exact(ENTRY_SIZE).enumerate() {
                if let Some(entry) = DirEntry::decode(raw)? {
                    found.push(LocatedEntry {
                        entry,
                        location: EntryLocation { cluster, slot },
                    });
                }
            }
        }
        Ok(found)
    }

    /// Looks `name` up in the directory.
    ///
    /// Matching is on the normalized name field, so it is case-insensitive
    /// by construction. The first match wins; this layer does not prevent
    /// duplicates, the layer above does via its existence check.
    pub fn find(&mut self, name: &str) -> FsResult<Option<LocatedEntry>> {
        let key = dirent::format_name(name);
        Ok(self
            .entries()?
            .into_iter()
            .find(|located| *located.entry.name_field() == key))
    }

    /// Writes `entry` into the first tombstone slot, growing the chain by
    /// one zeroed cluster when the directory is full.
    ///
    /// Only the touched cluster is persisted here. Growing changes chain
    /// links, so the caller must flush the allocation table afterwards
    /// (its dirty flag reports whether that happened).
    pub fn add(&mut self, entry: DirEntry) -> FsResult<EntryLocation> {
        let location = match self.first_tombstone()? {
            Some(location) => location,
            None => EntryLocation {
                cluster: self.grow()?,
                slot: 0,
            },
        };

        self.write_slot(location, &entry.encode())?;
        Ok(location)
    }

    /// Overwrites the slot at `location` in place.
    ///
    /// The record is fixed-width, so metadata updates never relocate an
    /// entry or pass through a tombstone state.
    pub fn update(&mut self, location: EntryLocation, entry: &DirEntry) -> FsResult<()> {
        self.write_slot(location, &entry.encode())
    }

    /// Tombstones the slot at `location`.
    ///
    /// Only the slot bytes are erased; freeing a content chain the entry
    /// pointed at is the caller's responsibility.
    pub fn remove(&mut self, location: EntryLocation) -> FsResult<()> {
        self.write_slot(location, &[0_u8; ENTRY_SIZE])
    }

    /// Finds the first tombstone slot in the chain, if any.
    fn first_tombstone(&mut self) -> FsResult<Option<EntryLocation>> {
        let chain = self.fat.follow_chain(self.first_cluster)?;
        let mut buf = [0_u8; CLUSTER_SIZE];

        for cluster in chain {
            self.device.read_cluster(cluster.index(), &mut buf)?;
            for (slot, raw) in buf.chunks_exact(ENTRY_SIZE).enumerate() {
                if raw[0] == 0x00 {
                    return Ok(Some(EntryLocation { cluster, slot }));
                }
            }
        }
        Ok(None)
    }

    /// Appends one zeroed cluster to the directory chain.
    fn grow(&mut self) -> FsResult<Cluster> {
        let new_cluster = self.fat.allocate_chain(1)?;

        let tail = *self
            .fat
            .follow_chain(self.first_cluster)?
            .last()
            .ok_or(FsError::CorruptChain(self.first_cluster.value()))?;
        self.fat.set_entry(tail, FatEntry::Next(new_cluster))?;

        self.device
            .write_cluster(new_cluster.index(), &[0_u8; CLUSTER_SIZE])?;

        log::debug!("directory at {} grew to cluster {new_cluster}", self.first_cluster);
        Ok(new_cluster)
    }

    fn write_slot(&mut self, location: EntryLocation, record: &[u8; ENTRY_SIZE]) -> FsResult<()> {
        if location.slot >= SLOTS_PER_CLUSTER {
            return Err(FsError::InvalidArgument("entry slot out of range"));
        }

        let mut buf = [0_u8; CLUSTER_SIZE];
        self.device.read_cluster(location.cluster.index(), &mut buf)?;

        let offset = location.slot * ENTRY_SIZE;
        buf[offset..offset + ENTRY_SIZE].copy_from_slice(record);
        self.device.write_cluster(location.cluster.index(), &buf)?;
        Ok(())
    }
}
