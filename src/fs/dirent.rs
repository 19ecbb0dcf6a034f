//! The 32-byte on-disk directory entry and 8.3 name handling.
//!
//! Record layout: bytes 0..11 hold the space-padded 8.3 name (no dot
//! stored), byte 11 the attributes, bytes 12..16 the first content
//! cluster and 16..20 the file size, both little-endian signed, and
//! bytes 20..32 are reserved and zero on write. A record whose first
//! byte is `0x00` is a tombstone, a free slot.

use super::{FsError, FsResult};
use super::fat::Cluster;

/// Size of one directory entry on disk.
pub const ENTRY_SIZE: usize = 32;
/// Length of the fixed name field (8 base + 3 extension).
pub const NAME_LEN: usize = 11;

const ATTR_OFFSET: usize = 11;
const CLUSTER_OFFSET: usize = 12;
const SIZE_OFFSET: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Directory entry attributes.
pub struct Attributes(u8);

impl Attributes {
    /// Regular file attribute.
    pub const FILE: u8 = 0x01;
    /// Directory attribute.
    pub const DIRECTORY: u8 = 0x10;

    #[must_use]
    #[inline]
    pub const fn new(attributes: u8) -> Self {
        Self(attributes)
    }

    #[must_use]
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    #[inline]
    /// Returns true if the entry is a directory.
    pub const fn is_directory(self) -> bool {
        self.0 & Self::DIRECTORY != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// One named object in a directory: a regular file or a subdirectory.
pub struct DirEntry {
    name: [u8; NAME_LEN],
    attributes: Attributes,
    first_cluster: u32,
    size: u32,
}

impl DirEntry {
    #[must_use]
    /// Creates an entry for an empty regular file (no content chain).
    pub fn new_file(name: &str) -> Self {
        Self {
            name: format_name(name),
            attributes: Attributes::new(Attributes::FILE),
            first_cluster: 0,
            size: 0,
        }
    }

    #[must_use]
    /// Creates an entry for a directory whose entry table starts at `first`.
    pub fn new_directory(name: &str, first: Cluster) -> Self {
        Self {
            name: format_name(name),
            attributes: Attributes::new(Attributes::DIRECTORY),
            first_cluster: first.value(),
            size: 0,
        }
    }

    #[must_use]
    #[inline]
    /// The normalized 11-byte name field.
    pub const fn name_field(&self) -> &[u8; NAME_LEN] {
        &self.name
    }

    #[must_use]
    /// The name in display form, e.g. `HELLO.TXT`.
    pub fn display_name(&self) -> String {
        display_name(&self.name)
    }

    #[must_use]
    #[inline]
    pub const fn attributes(&self) -> Attributes {
        self.attributes
    }

    #[must_use]
    #[inline]
    pub const fn is_directory(&self) -> bool {
        self.attributes.is_directory()
    }

    #[must_use]
    #[inline]
    /// Head of the content chain, `None` while no content is allocated.
    pub const fn first_cluster(&self) -> Option<Cluster> {
        if self.first_cluster == 0 {
            None
        } else {
            Some(Cluster::new(self.first_cluster))
        }
    }

    #[must_use]
    #[inline]
    /// File size in bytes. Zero for directories, which derive an entry
    /// count by scanning instead.
    pub const fn size(&self) -> usize {
        self.size as usize
    }

    /// Points the entry at a new content chain, or at nothing.
    pub fn set_first_cluster(&mut self, first: Option<Cluster>) {
        self.first_cluster = first.map_or(0, Cluster::value);
    }

    pub fn set_size(&mut self, size: usize) {
        self.size = u32::try_from(size).unwrap_or(u32::MAX);
    }

    /// Replaces the name field with the normalized form of `name`.
    pub fn set_name(&mut self, name: &str) {
        self.name = format_name(name);
    }

    #[must_use]
    /// Encodes the entry into its on-disk record. Reserved bytes are zero.
    pub fn encode(&self) -> [u8; ENTRY_SIZE] {
        let mut raw = [0_u8; ENTRY_SIZE];
        raw[..NAME_LEN].copy_from_slice(&self.name);
        raw[ATTR_OFFSET] = self.attributes.bits();
        raw[CLUSTER_OFFSET..CLUSTER_OFFSET + 4]
            .copy_from_slice(&(self.first_cluster as i32).to_le_bytes());
        raw[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&(self.size as i32).to_le_bytes());
        raw
    }

    /// Decodes an on-disk record. Returns `None` for a tombstone slot
    /// (first byte `0x00`).
    pub fn decode(raw: &[u8]) -> FsResult<Option<Self>> {
        if raw.len() != ENTRY_SIZE {
            return Err(FsError::InvalidArgument("entry record must be 32 bytes"));
        }
        if raw[0] == 0x00 {
            return Ok(None);
        }

        let first_cluster = i32::from_le_bytes(raw[CLUSTER_OFFSET..CLUSTER_OFFSET + 4].try_into().unwrap());
        let size = i32::from_le_bytes(raw[SIZE_OFFSET..SIZE_OFFSET + 4].try_into().unwrap());
        if first_cluster < 0 || size < 0 {
            return Err(FsError::InvalidArgument("negative field in entry record"));
        }

        Ok(Some(Self {
            name: raw[..NAME_LEN].try_into().unwrap(),
            attributes: Attributes::new(raw[ATTR_OFFSET]),
            first_cluster: first_cluster as u32,
            size: size as u32,
        }))
    }
}

/// Normalizes a display name into the fixed 11-byte 8.3 field.
///
/// Trims and uppercases the input, splits at the first `.`, truncates the
/// base to 8 and the extension to 3 characters and space-pads both.
/// Truncation is policy, not an error; non-ASCII bytes become `?`.
#[must_use]
pub fn format_name(display: &str) -> [u8; NAME_LEN] {
    let mut field = [b' '; NAME_LEN];

    let trimmed = display.trim();
    let (base, ext) = trimmed
        .split_once('.')
        .map_or((trimmed, ""), |(b, e)| (b, e));

    for (slot, ch) in field[..8].iter_mut().zip(base.chars()) {
        *slot = normalize_char(ch);
    }
    for (slot, ch) in field[8..].iter_mut().zip(ext.chars()) {
        *slot = normalize_char(ch);
    }
    field
}

const fn normalize_char(ch: char) -> u8 {
    if ch.is_ascii() {
        (ch as u8).to_ascii_uppercase()
    } else {
        b'?'
    }
}

/// Inverse of [`format_name`]: trims the padding off both slices and
/// joins them with a `.` only when the extension is non-empty.
#[must_use]
pub fn display_name(field: &[u8; NAME_LEN]) -> String {
    let base = trim_padding(&field[..8]);
    let ext = trim_padding(&field[8..]);

    if ext.is_empty() {
        base.to_string()
    } else {
        format!("{base}.{ext}")
    }
}

fn trim_padding(slice: &[u8]) -> &str {
    core::str::from_utf8(slice).unwrap_or("").trim_end_matches(' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_name_pads_and_uppercases() {
        assert_eq!(&format_name("hello.txt"), b"HELLO   TXT");
        assert_eq!(&format_name("  readme  "), b"README     ");
        assert_eq!(&format_name("longfilename.text"), b"LONGFILETEX");
        assert_eq!(&format_name("a.b.c"), b"A       B.C");
    }

    #[test]
    fn display_name_round_trips() {
        assert_eq!(display_name(&format_name("hello.txt")), "HELLO.TXT");
        assert_eq!(display_name(&format_name("README")), "README");
        assert_eq!(display_name(b"HELLO   TXT"), "HELLO.TXT");
    }

    #[test]
    fn encode_decode_round_trips() {
        let mut entry = DirEntry::new_file("notes.txt");
        entry.set_first_cluster(Some(Cluster::new(42)));
        entry.set_size(1337);

        let raw = entry.encode();
        assert_eq!(raw.len(), ENTRY_SIZE);
        // Reserved tail must round-trip as zero on a fresh record.
        assert!(raw[20..].iter().all(|&b| b == 0));

        let decoded = DirEntry::decode(&raw).unwrap().unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(decoded.display_name(), "NOTES.TXT");
        assert_eq!(decoded.first_cluster(), Some(Cluster::new(42)));
        assert_eq!(decoded.size(), 1337);
        assert!(!decoded.is_directory());
    }

    #[test]
    fn tombstone_decodes_as_none() {
        let raw = [0_u8; ENTRY_SIZE];
        assert_eq!(DirEntry::decode(&raw).unwrap(), None);
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert!(DirEntry::decode(&[0_u8; 16]).is_err());

        let mut raw = DirEntry::new_file("x").encode();
        raw[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&(-5_i32).to_le_bytes());
        assert!(DirEntry::decode(&raw).is_err());
    }

    #[test]
    fn directory_entry_carries_its_table() {
        let entry = DirEntry::new_directory("docs", Cluster::new(7));
        assert!(entry.is_directory());
        assert_eq!(entry.first_cluster(), Some(Cluster::new(7)));
        assert_eq!(entry.size(), 0);
    }
}
