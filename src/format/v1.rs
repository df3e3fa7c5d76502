//! Version 1 entry table and directory listing parsing.

use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::io::{Read, Seek, SeekFrom};

use super::V1_ENTRY_SIZE;
use super::header::HeaderV1;
use super::reader::{read_u32_le, read_u64_le};
use crate::read::{DirectoryListing, Entry};
use crate::{Error, Result};

const FLAG_DIRECTORY: u32 = 0x1;
const FLAG_COMPRESSED: u32 = 0x2;

/// Marks a subdirectory line in a listing.
const DIR_MARKER: char = '*';

/// Parsed version 1 entry table.
#[derive(Debug, Default)]
pub(crate) struct V1Table {
    pub entries: HashMap<u64, Entry>,
    /// Hashes in table order (first occurrence only).
    pub order: Vec<u64>,
    /// Extra directory entries sharing the hash of an earlier directory.
    /// Their listings are merged into the first one at listing time.
    pub fragments: Vec<Entry>,
}

/// Reads the flat entry table.
///
/// With `force_at_end`, the table is assumed to occupy the last
/// `entry_count * 32` bytes of the file regardless of the header offset.
pub(crate) fn read_table<R: Read + Seek>(
    r: &mut R,
    header: &HeaderV1,
    file_len: u64,
    force_at_end: bool,
) -> Result<V1Table> {
    let table_len = u64::from(header.entry_count) * V1_ENTRY_SIZE;
    let start = if force_at_end {
        file_len.checked_sub(table_len).ok_or_else(|| {
            Error::InvalidFormat(format!(
                "entry table of {table_len} bytes does not fit in {file_len} byte file"
            ))
        })?
    } else {
        u64::from(header.table_start)
    };
    if start.saturating_add(table_len) > file_len {
        return Err(Error::InvalidFormat(format!(
            "entry table at {start:#x} runs past end of file"
        )));
    }
    r.seek(SeekFrom::Start(start))?;

    let mut table = V1Table {
        entries: HashMap::with_capacity(header.entry_count as usize),
        order: Vec::with_capacity(header.entry_count as usize),
        fragments: Vec::new(),
    };
    for _ in 0..header.entry_count {
        let hash = read_u64_le(r)?;
        let offset = read_u64_le(r)?;
        let flags = read_u32_le(r)?;
        let crc = read_u32_le(r)?;
        let size = read_u32_le(r)?;
        let compressed_size = read_u32_le(r)?;
        let entry = Entry {
            hash,
            offset,
            size,
            compressed_size,
            is_directory: flags & FLAG_DIRECTORY != 0,
            is_compressed: flags & FLAG_COMPRESSED != 0,
            crc,
            texture: None,
        };

        match table.entries.entry(hash) {
            MapEntry::Vacant(slot) => {
                slot.insert(entry);
                table.order.push(hash);
            }
            MapEntry::Occupied(existing) => {
                if existing.get().is_directory && entry.is_directory {
                    table.fragments.push(entry);
                }
            }
        }
    }

    log::debug!(
        "v1 table: {} entries, {} listing fragments",
        table.entries.len(),
        table.fragments.len()
    );
    Ok(table)
}

/// Adds the names of one listing payload to `listing`.
pub(crate) fn parse_listing(payload: &[u8], files_only: bool, listing: &mut DirectoryListing) {
    let text = String::from_utf8_lossy(payload);
    for line in text.split(['\r', '\n']).filter(|l| !l.is_empty()) {
        if let Some(dir) = line.strip_prefix(DIR_MARKER) {
            if !files_only {
                listing.subdirectories.insert(dir.to_string());
            }
        } else {
            listing.files.insert(line.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(hash: u64, offset: u64, flags: u32, size: u32) -> Vec<u8> {
        let mut rec = Vec::new();
        rec.extend_from_slice(&hash.to_le_bytes());
        rec.extend_from_slice(&offset.to_le_bytes());
        rec.extend_from_slice(&flags.to_le_bytes());
        rec.extend_from_slice(&0u32.to_le_bytes());
        rec.extend_from_slice(&size.to_le_bytes());
        rec.extend_from_slice(&size.to_le_bytes());
        rec
    }

    #[test]
    fn test_duplicate_directories_become_fragments() {
        let mut data = vec![0u8; 16];
        data.extend(record(1, 0, FLAG_DIRECTORY, 4));
        data.extend(record(1, 8, FLAG_DIRECTORY, 4));
        data.extend(record(2, 0, 0, 4));
        data.extend(record(2, 8, 0, 4));
        let header = HeaderV1 {
            salt: 0,
            entry_count: 4,
            table_start: 16,
        };
        let len = data.len() as u64;
        let table = read_table(&mut Cursor::new(data), &header, len, false).unwrap();

        assert_eq!(table.entries.len(), 2);
        assert_eq!(table.fragments.len(), 1);
        assert_eq!(table.fragments[0].offset, 8);
        // the first file wins
        assert_eq!(table.entries[&2].offset, 0);
    }

    #[test]
    fn test_table_at_end() {
        let mut data = vec![0xFFu8; 40];
        data.extend(record(9, 0, 0, 1));
        let header = HeaderV1 {
            salt: 0,
            entry_count: 1,
            table_start: 0xDEAD,
        };
        let len = data.len() as u64;
        let table = read_table(&mut Cursor::new(data), &header, len, true).unwrap();
        assert!(table.entries.contains_key(&9));
    }

    #[test]
    fn test_table_out_of_bounds() {
        let header = HeaderV1 {
            salt: 0,
            entry_count: 10,
            table_start: 0,
        };
        let err = read_table(&mut Cursor::new(vec![0u8; 64]), &header, 64, false).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_parse_listing() {
        let mut listing = DirectoryListing::default();
        parse_listing(b"*def\r\nmanifest.sii\n\n*map", false, &mut listing);
        assert_eq!(listing.subdirectories.len(), 2);
        assert!(listing.files.contains("manifest.sii"));

        let mut files_only = DirectoryListing::default();
        parse_listing(b"*def\nmanifest.sii", true, &mut files_only);
        assert!(files_only.subdirectories.is_empty());
        assert_eq!(files_only.files.len(), 1);
    }
}
