//! Archive reading API for HashFS archives.
//!
//! This module provides the public API for reading HashFS archives: path
//! lookup, payload extraction and directory listings.
//!
//! # Example
//!
//! ```rust,ignore
//! use hashfs::read::{Archive, EntryType};
//!
//! let mut archive = Archive::open_path("base.scs")?;
//!
//! if archive.entry_exists("/def/city.sii") == EntryType::File {
//!     let buffers = archive.extract("/def/city.sii")?;
//!     println!("{} bytes", buffers[0].len());
//! }
//!
//! let root = archive.directory_listing("/", false, true)?;
//! for dir in &root.subdirectories {
//!     println!("{dir}/");
//! }
//! ```

mod entry;
mod options;
mod source;

mod archive_open;
mod archive_query;
mod decompression;

pub use entry::{DirectoryListing, Entry, EntryType, join_path};
pub use options::{DiscoveryOptions, ExtractOptions, OpenOptions, OverwritePolicy, Threads};
pub use source::{ArchiveSource, FileSource, MemorySource};

pub(crate) use archive_query::normalize;

use std::collections::HashMap;
use std::sync::Arc;

use crate::format::header::ArchiveHeader;
use crate::junk::JunkClassification;

/// Everything parsed from the archive tables.
///
/// Shared between clones of an [`Archive`] so that pooled handles do not
/// parse the tables again.
#[derive(Debug)]
pub(crate) struct ArchiveIndex {
    pub header: ArchiveHeader,
    pub entries: HashMap<u64, Entry>,
    /// Hashes in table order.
    pub table_order: Vec<u64>,
    /// Version 1 directory fragments, see [`crate::format`].
    pub fragments: Vec<Entry>,
    pub junk: JunkClassification,
    pub file_len: u64,
}

/// A HashFS archive reader.
///
/// The reader owns one read cursor. Use [`Archive::try_clone`] for an
/// independent handle over the same file, or a
/// [`ReaderPool`](crate::pool::ReaderPool) for a bounded set of them.
pub struct Archive<S = FileSource> {
    pub(crate) source: S,
    pub(crate) index: Arc<ArchiveIndex>,
    pub(crate) salt: u16,
}

impl<S> std::fmt::Debug for Archive<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("version", &self.index.header.version())
            .field("salt", &self.salt)
            .field("entries", &self.index.entries.len())
            .finish_non_exhaustive()
    }
}
