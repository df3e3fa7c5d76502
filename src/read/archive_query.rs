//! Archive query methods.
//!
//! Lookups by path and by hash, header accessors and the junk
//! classification.

use crate::format::ROOT;
use crate::format::header::ArchiveHeader;
use crate::hash;
use crate::junk::JunkClassification;
use crate::{Error, Result};

use super::{Archive, Entry, EntryType};

/// Normalizes an archive path for display and joining: strips embedded
/// newlines and one trailing `/`, keeping the root as `/`. An empty path
/// is the root.
pub(crate) fn normalize(path: &str) -> String {
    let mut path = path.replace('\n', "");
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    if path.is_empty() {
        path.push_str(ROOT);
    }
    path
}

impl<S> Archive<S> {
    /// Returns the parsed header.
    pub fn header(&self) -> &ArchiveHeader {
        &self.index.header
    }

    /// Returns the format version (1 or 2).
    pub fn version(&self) -> u16 {
        self.index.header.version()
    }

    /// Returns the salt used for hashing paths.
    pub fn salt(&self) -> u16 {
        self.salt
    }

    /// Overrides the salt used for hashing paths.
    pub fn set_salt(&mut self, salt: u16) {
        self.salt = salt;
    }

    /// Returns the number of unique entries.
    pub fn len(&self) -> usize {
        self.index.entries.len()
    }

    /// Returns `true` if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.index.entries.is_empty()
    }

    /// Size of the archive file in bytes.
    pub fn file_len(&self) -> u64 {
        self.index.file_len
    }

    /// Iterates over all entries in table order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.index
            .table_order
            .iter()
            .filter_map(|hash| self.index.entries.get(hash))
    }

    /// Returns the junk classification computed at open time.
    pub fn junk(&self) -> &JunkClassification {
        &self.index.junk
    }

    /// Hashes `path` with this archive's salt.
    pub fn hash_path(&self, path: &str) -> u64 {
        hash::hash_path(path, self.salt)
    }

    /// Looks up an entry by hash.
    pub fn entry_by_hash(&self, hash: u64) -> Option<&Entry> {
        self.index.entries.get(&hash)
    }

    /// Looks up an entry by path.
    pub fn try_get_entry(&self, path: &str) -> Option<&Entry> {
        self.entry_by_hash(self.hash_path(path))
    }

    /// Looks up an entry by path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryNotFound`] if no entry has the path's hash.
    pub fn get_entry(&self, path: &str) -> Result<&Entry> {
        self.try_get_entry(path).ok_or_else(|| Error::not_found(path))
    }

    /// Reports whether `path` is a file, a directory, or absent.
    pub fn entry_exists(&self, path: &str) -> EntryType {
        match self.try_get_entry(path) {
            Some(entry) if entry.is_directory => EntryType::Directory,
            Some(_) => EntryType::File,
            None => EntryType::NotFound,
        }
    }

    /// Returns `true` if `entry` is one of this archive's entries.
    pub fn contains(&self, entry: &Entry) -> bool {
        self.index.entries.get(&entry.hash) == Some(entry)
    }

    /// Version 1 listing fragments sharing `hash`.
    pub(crate) fn fragments_of(&self, hash: u64) -> impl Iterator<Item = &Entry> + '_ {
        self.index.fragments.iter().filter(move |e| e.hash == hash)
    }
}
