//! Archive entry types.

use std::collections::BTreeSet;

use crate::texture::PackedTexture;

/// An entry in a HashFS archive.
///
/// Entries carry no path: the archive only knows the hash of the path they
/// were packed under. Entries are immutable and owned by the [`Archive`]
/// that parsed them.
///
/// [`Archive`]: crate::Archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// CityHash64 of the canonical (salted) path.
    pub hash: u64,
    /// Absolute byte offset of the payload.
    pub offset: u64,
    /// Decoded size in bytes.
    pub size: u32,
    /// Stored size in bytes.
    pub compressed_size: u32,
    /// Whether the payload is a directory listing.
    pub is_directory: bool,
    /// Whether the payload is compressed (zlib, or GDeflate for textures).
    pub is_compressed: bool,
    /// CRC-32 recorded by version 1 archives (0 in version 2).
    pub crc: u32,
    /// Packed texture parameters for version 2 image chunks.
    pub texture: Option<PackedTexture>,
}

impl Entry {
    /// Number of bytes the payload occupies in the archive file.
    pub fn stored_size(&self) -> u64 {
        if self.is_compressed || self.texture.is_some() {
            u64::from(self.compressed_size)
        } else {
            u64::from(self.size)
        }
    }

    /// Byte range of the stored payload.
    pub fn stored_range(&self) -> std::ops::Range<u64> {
        self.offset..self.offset.saturating_add(self.stored_size())
    }

    /// Whether extracting this entry yields a synthesized `.tobj` and `.dds`.
    pub fn is_packed_texture(&self) -> bool {
        self.texture.is_some()
    }
}

/// Result of a path lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// The path is a file.
    File,
    /// The path is a directory.
    Directory,
    /// No entry has this path's hash.
    NotFound,
}

/// Contents of a directory entry.
///
/// Both sets are unordered in the archive; they are kept sorted here so
/// that listings print and compare deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    /// Subdirectory names (or absolute paths).
    pub subdirectories: BTreeSet<String>,
    /// File names (or absolute paths).
    pub files: BTreeSet<String>,
}

impl DirectoryListing {
    /// Returns `true` if the listing names nothing.
    pub fn is_empty(&self) -> bool {
        self.subdirectories.is_empty() && self.files.is_empty()
    }

    /// Prefixes every name with `parent`.
    pub(crate) fn into_absolute(self, parent: &str) -> Self {
        let join = |name: String| join_path(parent, &name);
        Self {
            subdirectories: self.subdirectories.into_iter().map(join).collect(),
            files: self.files.into_iter().map(join).collect(),
        }
    }
}

/// Joins an archive directory and a child name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == crate::format::ROOT || parent.is_empty() {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}
