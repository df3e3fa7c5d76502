//! Archive opening methods.
//!
//! This module provides methods for opening HashFS archives from files and
//! in-memory buffers, and for cloning an open archive into an independent
//! handle.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use crate::format::header::ArchiveHeader;
use crate::format::{v1, v2};
use crate::junk::JunkClassification;
use crate::{Error, Result};

use super::{Archive, ArchiveIndex, ArchiveSource, FileSource, MemorySource, OpenOptions};

impl Archive<FileSource> {
    /// Opens an archive from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the archive is invalid.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_path_with(path, &OpenOptions::default())
    }

    /// Opens an archive from a file path with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the archive is invalid.
    pub fn open_path_with(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let source = FileSource::open(path)?;
        let archive = Self::open_with(source, options)?;
        log::debug!(
            "opened {} (v{}, salt {}, {} entries)",
            path.display(),
            archive.version(),
            archive.salt(),
            archive.len()
        );
        Ok(archive)
    }

    /// Path the archive was opened from.
    pub fn path(&self) -> &Path {
        self.source.path()
    }
}

impl Archive<MemorySource> {
    /// Opens an archive held in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is invalid.
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::from_bytes_with(data, &OpenOptions::default())
    }

    /// Opens an archive held in memory with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is invalid.
    pub fn from_bytes_with(data: impl Into<Arc<[u8]>>, options: &OpenOptions) -> Result<Self> {
        Self::open_with(std::io::Cursor::new(data.into()), options)
    }
}

impl<S: ArchiveSource> Archive<S> {
    /// Opens an archive from a source.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is invalid or cannot be read.
    pub fn open(source: S) -> Result<Self> {
        Self::open_with(source, &OpenOptions::default())
    }

    /// Opens an archive from a source with custom options.
    ///
    /// The header is validated first: a foreign magic yields
    /// [`Error::NotHashFs`] (or [`Error::ZipArchive`] for ZIP files), and an
    /// unknown hash method or version is rejected before any table is read.
    /// The entry tables are then parsed and junk entries classified.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is invalid or cannot be read.
    pub fn open_with(mut source: S, options: &OpenOptions) -> Result<Self> {
        let file_len = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;

        let header = ArchiveHeader::read(&mut source).map_err(|e| match e {
            Error::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                Error::InvalidFormat(format!("file too short for a header ({file_len} bytes)"))
            }
            other => other,
        })?;

        let (entries, table_order, fragments) = match &header {
            ArchiveHeader::V1(h) => {
                let table = v1::read_table(&mut source, h, file_len, options.force_table_at_end)?;
                (table.entries, table.order, table.fragments)
            }
            ArchiveHeader::V2(h) => {
                let (entries, order) = v2::read_tables(&mut source, h, file_len)?;
                (entries, order, Vec::new())
            }
        };

        let junk = JunkClassification::classify(
            table_order.iter().filter_map(|hash| entries.get(hash)),
            file_len,
            &options.junk,
        );

        let salt = options.salt.unwrap_or_else(|| header.salt());
        Ok(Self {
            source,
            index: Arc::new(ArchiveIndex {
                header,
                entries,
                table_order,
                fragments,
                junk,
                file_len,
            }),
            salt,
        })
    }

    /// Creates an independent handle over the same archive.
    ///
    /// The parsed tables are shared; only the byte source is reopened.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be reopened.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            source: self.source.reopen()?,
            index: Arc::clone(&self.index),
            salt: self.salt,
        })
    }
}
