//! HashFS header parsing.

use std::io::Read;

use super::detect::ArchiveFormat;
use super::reader::{read_bytes, read_u8, read_u16_le, read_u32_le, read_u64_le};
use super::{HASH_METHOD_CITY, MAGIC};
use crate::{Error, Result};

/// Target platform recorded in a version 2 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Desktop builds.
    Pc,
    /// Any other platform tag.
    Other(u8),
}

impl From<u8> for Platform {
    fn from(value: u8) -> Self {
        match value {
            0 => Platform::Pc,
            other => Platform::Other(other),
        }
    }
}

/// Version 1 header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderV1 {
    /// Salt mixed into path hashes.
    pub salt: u16,
    /// Number of entry table records.
    pub entry_count: u32,
    /// Absolute offset of the entry table.
    pub table_start: u32,
}

/// Version 2 header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderV2 {
    /// Salt mixed into path hashes.
    pub salt: u16,
    /// Number of entry table records.
    pub entry_count: u32,
    /// Compressed length of the entry table.
    pub entry_table_length: u32,
    /// Number of 4-byte units in the metadata table.
    pub metadata_entry_count: u32,
    /// Compressed length of the metadata table.
    pub metadata_table_length: u32,
    /// Absolute offset of the compressed entry table.
    pub entry_table_start: u64,
    /// Absolute offset of the compressed metadata table.
    pub metadata_table_start: u64,
    /// Offset of the security descriptor (unused when reading).
    pub security_descriptor_offset: u32,
    /// Target platform.
    pub platform: Platform,
}

/// A parsed HashFS header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveHeader {
    /// Flat entry table layout.
    V1(HeaderV1),
    /// Compressed entry and metadata tables.
    V2(HeaderV2),
}

impl ArchiveHeader {
    /// Reads and validates a header from the start of an archive.
    ///
    /// # Errors
    ///
    /// - [`Error::ZipArchive`] if the file is a ZIP archive
    /// - [`Error::NotHashFs`] for any other foreign magic
    /// - [`Error::UnsupportedHashMethod`] unless the method is `CITY`
    /// - [`Error::UnsupportedVersion`] for versions other than 1 and 2
    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let magic = read_u32_le(r)?;
        if magic != MAGIC {
            return Err(ArchiveFormat::from_magic(magic).into_open_error(magic));
        }

        let version = read_u16_le(r)?;
        let salt = read_u16_le(r)?;
        let method = read_bytes(r, 4)?;
        let entry_count = read_u32_le(r)?;

        if method.as_slice() != HASH_METHOD_CITY {
            return Err(Error::UnsupportedHashMethod {
                method: String::from_utf8_lossy(&method).into_owned(),
            });
        }

        match version {
            1 => Ok(ArchiveHeader::V1(HeaderV1 {
                salt,
                entry_count,
                table_start: read_u32_le(r)?,
            })),
            2 => Ok(ArchiveHeader::V2(HeaderV2 {
                salt,
                entry_count,
                entry_table_length: read_u32_le(r)?,
                metadata_entry_count: read_u32_le(r)?,
                metadata_table_length: read_u32_le(r)?,
                entry_table_start: read_u64_le(r)?,
                metadata_table_start: read_u64_le(r)?,
                security_descriptor_offset: read_u32_le(r)?,
                platform: Platform::from(read_u8(r)?),
            })),
            version => Err(Error::UnsupportedVersion { version }),
        }
    }

    /// Returns the format version.
    pub fn version(&self) -> u16 {
        match self {
            ArchiveHeader::V1(_) => 1,
            ArchiveHeader::V2(_) => 2,
        }
    }

    /// Returns the salt stored in the header.
    pub fn salt(&self) -> u16 {
        match self {
            ArchiveHeader::V1(h) => h.salt,
            ArchiveHeader::V2(h) => h.salt,
        }
    }

    /// Returns the number of entry records.
    pub fn entry_count(&self) -> u32 {
        match self {
            ArchiveHeader::V1(h) => h.entry_count,
            ArchiveHeader::V2(h) => h.entry_count,
        }
    }
}
