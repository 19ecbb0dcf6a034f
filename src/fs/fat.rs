//! The allocation table and its chain algebra.
//!
//! The table is loaded wholesale into memory on mount and is the single
//! source of truth for the session; the persisted copy in clusters 1..=4
//! is stale until [`AllocationTable::flush`] is called. A dirty flag
//! tracks whether any chain link changed since the last flush.

use super::{FsError, FsResult};
use crate::device::{BlockDevice, DeviceError};
use crate::geometry::{
    CLUSTER_COUNT, CLUSTER_SIZE, FAT_END_CLUSTER, FAT_ENTRY_SIZE, FAT_START_CLUSTER,
    CONTENT_START_CLUSTER, ROOT_DIR_CLUSTER,
};

/// Raw table value marking the last cluster of a chain.
const END_OF_CHAIN: i32 = -1;
/// Raw table value of a free cluster.
const FREE: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Index of one cluster on the volume.
pub struct Cluster(u32);

impl Cluster {
    /// First cluster of the root directory.
    pub const ROOT: Self = Self(ROOT_DIR_CLUSTER as u32);

    #[must_use]
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    #[inline]
    /// Returns true for the superblock and allocation table clusters,
    /// which are never part of a chain.
    pub const fn is_reserved(self) -> bool {
        self.index() <= FAT_END_CLUSTER
    }
}

impl core::fmt::Display for Cluster {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Decoded allocation table entry.
pub enum FatEntry {
    /// Free cluster, available for allocation.
    Free,
    /// Used cluster, pointing to the next cluster of the same chain.
    Next(Cluster),
    /// Last cluster of a chain.
    EndOfChain,
}

impl FatEntry {
    #[must_use]
    const fn to_raw(self) -> i32 {
        match self {
            Self::Free => FREE,
            Self::Next(next) => next.0 as i32,
            Self::EndOfChain => END_OF_CHAIN,
        }
    }
}

/// Resident mirror of the persisted allocation table.
///
/// One signed entry per cluster, reserved clusters included. Only this
/// structure mutates chain links; every component above it goes through
/// [`entry`](Self::entry) and [`set_entry`](Self::set_entry).
pub struct AllocationTable {
    entries: Vec<i32>,
    dirty: bool,
}

impl AllocationTable {
    /// Reads the persisted table out of clusters 1..=4 and decodes it,
    /// one little-endian `i32` per cluster slot, in index order.
    pub fn load<D: BlockDevice>(device: &mut D) -> FsResult<Self> {
        let mut entries = Vec::with_capacity(CLUSTER_COUNT);
        let mut buf = [0_u8; CLUSTER_SIZE];

        for cluster in FAT_START_CLUSTER..=FAT_END_CLUSTER {
            device.read_cluster(cluster, &mut buf)?;
            for raw in buf.chunks_exact(FAT_ENTRY_SIZE) {
                entries.push(i32::from_le_bytes(raw.try_into().unwrap()));
            }
        }
        debug_assert_eq!(entries.len(), CLUSTER_COUNT);

        Ok(Self {
            entries,
            dirty: false,
        })
    }

    /// Writes the table back to its reserved clusters and clears the
    /// dirty flag. No-op when nothing changed since the last flush.
    pub fn flush<D: BlockDevice>(&mut self, device: &mut D) -> FsResult<()> {
        if !self.dirty {
            return Ok(());
        }

        let entries_per_cluster = CLUSTER_SIZE / FAT_ENTRY_SIZE;
        let mut buf = [0_u8; CLUSTER_SIZE];

        for (i, cluster) in (FAT_START_CLUSTER..=FAT_END_CLUSTER).enumerate() {
            let slice = &self.entries[i * entries_per_cluster..(i + 1) * entries_per_cluster];
            for (chunk, value) in buf.chunks_exact_mut(FAT_ENTRY_SIZE).zip(slice) {
                chunk.copy_from_slice(&value.to_le_bytes());
            }
            device.write_cluster(cluster, &buf)?;
        }

        self.dirty = false;
        log::trace!("allocation table flushed");
        Ok(())
    }

    #[must_use]
    #[inline]
    /// Returns true if the resident table diverged from the persisted copy.
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the decoded entry for `cluster`.
    pub fn entry(&self, cluster: Cluster) -> FsResult<FatEntry> {
        if cluster.index() >= self.entries.len() {
            return Err(FsError::Device(DeviceError::OutOfBounds));
        }
        if cluster.is_reserved() {
            return Err(FsError::ReservedCluster(cluster.value()));
        }

        match self.entries[cluster.index()] {
            FREE => Ok(FatEntry::Free),
            END_OF_CHAIN => Ok(FatEntry::EndOfChain),
            raw if raw > 0 && (raw as usize) < CLUSTER_COUNT => {
                Ok(FatEntry::Next(Cluster::new(raw as u32)))
            }
            _ => Err(FsError::CorruptChain(cluster.value())),
        }
    }

    /// Sets the entry for `cluster` and marks the table dirty.
    pub fn set_entry(&mut self, cluster: Cluster, entry: FatEntry) -> FsResult<()> {
        if cluster.index() >= self.entries.len() {
            return Err(FsError::Device(DeviceError::OutOfBounds));
        }
        if cluster.is_reserved() {
            return Err(FsError::ReservedCluster(cluster.value()));
        }

        self.entries[cluster.index()] = entry.to_raw();
        self.dirty = true;
        Ok(())
    }

    /// Follows next-links from `start` to the end-of-chain sentinel and
    /// returns the clusters in chain order.
    ///
    /// A revisited cluster, a link into the reserved region or a link to
    /// a free cluster all fail with [`FsError::CorruptChain`] instead of
    /// looping.
    pub fn follow_chain(&self, start: Cluster) -> FsResult<Vec<Cluster>> {
        let mut visited = vec![false; self.entries.len()];
        let mut chain = Vec::new();
        let mut current = start;

        loop {
            let entry = self.entry(current)?;
            if visited[current.index()] {
                return Err(FsError::CorruptChain(current.value()));
            }
            visited[current.index()] = true;
            chain.push(current);

            match entry {
                // A chain member must link onward or terminate.
                FatEntry::Free => return Err(FsError::CorruptChain(current.value())),
                FatEntry::EndOfChain => return Ok(chain),
                FatEntry::Next(next) => current = next,
            }
        }
    }

    /// Allocates a chain of `count` clusters from the content pool and
    /// returns its head.
    ///
    /// Free clusters are collected in ascending index order and linked in
    /// discovery order; they are not necessarily contiguous. Allocation is
    /// all-or-nothing: on [`FsError::OutOfSpace`] the table is untouched.
    pub fn allocate_chain(&mut self, count: usize) -> FsResult<Cluster> {
        if count == 0 {
            return Err(FsError::InvalidArgument("cannot allocate an empty chain"));
        }

        let mut found = Vec::with_capacity(count);
        for index in CONTENT_START_CLUSTER..self.entries.len() {
            if self.entries[index] == FREE {
                found.push(Cluster::new(index as u32));
                if found.len() == count {
                    break;
                }
            }
        }

        if found.len() < count {
            return Err(FsError::OutOfSpace {
                requested: count,
                available: found.len(),
            });
        }

        for pair in found.windows(2) {
            self.entries[pair[0].index()] = pair[1].0 as i32;
        }
        self.entries[found[count - 1].index()] = END_OF_CHAIN;
        self.dirty = true;

        log::debug!("allocated chain of {count} clusters at {}", found[0]);
        Ok(found[0])
    }

    /// Frees every cluster of the chain starting at `start`.
    ///
    /// Cluster 0 means "no content allocated" and is a no-op. Carries the
    /// same cycle guard as [`follow_chain`](Self::follow_chain), so a
    /// corrupted table fails instead of freeing forever.
    pub fn free_chain(&mut self, start: Cluster) -> FsResult<()> {
        if start.value() == 0 {
            return Ok(());
        }

        let chain = self.follow_chain(start)?;
        for cluster in &chain {
            self.entries[cluster.index()] = FREE;
        }
        self.dirty = true;

        log::debug!("freed chain of {} clusters at {start}", chain.len());
        Ok(())
    }

    #[must_use]
    /// Number of free clusters left in the content pool.
    pub fn free_clusters(&self) -> usize {
        self.entries[CONTENT_START_CLUSTER..]
            .iter()
            .filter(|&&raw| raw == FREE)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemDevice;

    fn empty_table() -> AllocationTable {
        AllocationTable::load(&mut MemDevice::new()).unwrap()
    }

    #[test]
    fn allocate_links_in_discovery_order() {
        let mut fat = empty_table();

        let head = fat.allocate_chain(3).unwrap();
        assert_eq!(head, Cluster::new(CONTENT_START_CLUSTER as u32));

        let chain = fat.follow_chain(head).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(fat.entry(chain[2]).unwrap(), FatEntry::EndOfChain);
        assert_eq!(fat.free_clusters(), CLUSTER_COUNT - CONTENT_START_CLUSTER - 3);
    }

    #[test]
    fn free_makes_clusters_reusable() {
        let mut fat = empty_table();

        let head = fat.allocate_chain(4).unwrap();
        let chain = fat.follow_chain(head).unwrap();
        fat.free_chain(head).unwrap();

        for cluster in &chain {
            assert_eq!(fat.entry(*cluster).unwrap(), FatEntry::Free);
        }

        // The freed clusters are picked up again by the next scan.
        let second = fat.allocate_chain(4).unwrap();
        assert_eq!(second, head);
    }

    #[test]
    fn free_of_no_content_is_a_noop() {
        let mut fat = empty_table();
        fat.free_chain(Cluster::new(0)).unwrap();
        assert!(!fat.is_dirty());
    }

    #[test]
    fn out_of_space_is_all_or_nothing() {
        let mut fat = empty_table();
        let pool = CLUSTER_COUNT - CONTENT_START_CLUSTER;

        let err = fat.allocate_chain(pool + 1).unwrap_err();
        assert_eq!(
            err,
            FsError::OutOfSpace {
                requested: pool + 1,
                available: pool,
            }
        );
        assert_eq!(fat.free_clusters(), pool);
        assert!(!fat.is_dirty());
    }

    #[test]
    fn self_loop_is_detected() {
        let mut fat = empty_table();

        fat.set_entry(Cluster::ROOT, FatEntry::Next(Cluster::ROOT))
            .unwrap();
        assert_eq!(
            fat.follow_chain(Cluster::ROOT).unwrap_err(),
            FsError::CorruptChain(Cluster::ROOT.value())
        );
        assert_eq!(
            fat.free_chain(Cluster::ROOT).unwrap_err(),
            FsError::CorruptChain(Cluster::ROOT.value())
        );
    }

    #[test]
    fn two_cluster_cycle_is_detected() {
        let mut fat = empty_table();
        let a = Cluster::new(10);
        let b = Cluster::new(11);

        fat.set_entry(a, FatEntry::Next(b)).unwrap();
        fat.set_entry(b, FatEntry::Next(a)).unwrap();
        assert_eq!(fat.follow_chain(a).unwrap_err(), FsError::CorruptChain(a.value()));
    }

    #[test]
    fn reserved_clusters_are_rejected() {
        let mut fat = empty_table();

        assert_eq!(
            fat.entry(Cluster::new(0)).unwrap_err(),
            FsError::ReservedCluster(0)
        );
        assert_eq!(
            fat.set_entry(Cluster::new(4), FatEntry::EndOfChain)
                .unwrap_err(),
            FsError::ReservedCluster(4)
        );
    }

    #[test]
    fn flush_and_reload_round_trips() {
        let mut device = MemDevice::new();
        let mut fat = AllocationTable::load(&mut device).unwrap();

        let head = fat.allocate_chain(5).unwrap();
        assert!(fat.is_dirty());
        fat.flush(&mut device).unwrap();
        assert!(!fat.is_dirty());

        let reloaded = AllocationTable::load(&mut device).unwrap();
        assert_eq!(
            reloaded.follow_chain(head).unwrap(),
            fat.follow_chain(head).unwrap()
        );
    }
}
