//! Version 2 entry/metadata table and directory listing parsing.
//!
//! The entry table maps each hash to a position in the metadata table. The
//! metadata table is a sequence of 4-byte units; a record starts with a
//! 3-byte chunk index and a 1-byte [`ChunkType`], followed by the chunk
//! payload. Plain files, directories and images are the only primary chunk
//! types found in shipped archives.

use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::io::{Cursor, Read, Seek, SeekFrom};

use super::header::HeaderV2;
use super::reader::{read_bytes, read_u8, read_u16_le, read_u24_le, read_u32_le, read_u64_le, skip};
use super::{V2_BLOCK_SIZE, V2_ENTRY_SIZE};
use crate::codec::inflate;
use crate::read::{DirectoryListing, Entry};
use crate::texture::PackedTexture;
use crate::{Error, Result};

/// Marks a subdirectory name in a listing.
const DIR_MARKER: char = '/';

/// Set in the flag nibble of a size field when the payload is compressed.
const FLAG_COMPRESSED: u8 = 0x10;

/// Metadata chunk type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    /// Packed texture header.
    Image,
    /// Sampler state.
    Sample,
    /// Mip proxy.
    MipProxy,
    /// Directory stored inline in the metadata table.
    InlineDirectory,
    /// Unidentified auxiliary chunk.
    Unknown,
    /// Regular file.
    Plain,
    /// Directory listing.
    Directory,
    /// Top mip level.
    Mip0,
    /// Second mip level.
    Mip1,
    /// Remaining mip levels.
    MipTail,
    /// A tag outside the known set.
    Other(u8),
}

impl From<u8> for ChunkType {
    fn from(value: u8) -> Self {
        match value {
            1 => ChunkType::Image,
            2 => ChunkType::Sample,
            3 => ChunkType::MipProxy,
            4 => ChunkType::InlineDirectory,
            6 => ChunkType::Unknown,
            128 => ChunkType::Plain,
            129 => ChunkType::Directory,
            130 => ChunkType::Mip0,
            131 => ChunkType::Mip1,
            132 => ChunkType::MipTail,
            other => ChunkType::Other(other),
        }
    }
}

/// One record of the decompressed entry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableRecord {
    pub hash: u64,
    pub metadata_index: u32,
    pub metadata_count: u16,
    pub flags: u16,
}

/// Reads both tables and resolves every entry.
///
/// Returns the entries and their hashes in metadata order.
pub(crate) fn read_tables<R: Read + Seek>(
    r: &mut R,
    header: &HeaderV2,
    file_len: u64,
) -> Result<(HashMap<u64, Entry>, Vec<u64>)> {
    let records = read_entry_table(r, header, file_len)?;
    let metadata = read_compressed(
        r,
        header.metadata_table_start,
        header.metadata_table_length,
        header.metadata_entry_count as usize * 4,
        file_len,
        "metadata table",
    )?;

    let mut entries = HashMap::with_capacity(records.len());
    let mut order = Vec::with_capacity(records.len());
    for record in &records {
        let entry = parse_metadata(&metadata, record)?;
        if let MapEntry::Vacant(slot) = entries.entry(record.hash) {
            slot.insert(entry);
            order.push(record.hash);
        }
    }

    log::debug!(
        "v2 tables: {} entries, {} metadata bytes",
        entries.len(),
        metadata.len()
    );
    Ok((entries, order))
}

fn read_compressed<R: Read + Seek>(
    r: &mut R,
    start: u64,
    length: u32,
    size: usize,
    file_len: u64,
    what: &str,
) -> Result<Vec<u8>> {
    if start.saturating_add(u64::from(length)) > file_len {
        return Err(Error::InvalidFormat(format!(
            "{what} at {start:#x} runs past end of file"
        )));
    }
    r.seek(SeekFrom::Start(start))?;
    let stored = read_bytes(r, length as usize)?;
    inflate(&stored, size)
        .map_err(|e| Error::InvalidFormat(format!("cannot inflate {what}: {e}")))
}

/// Reads the entry table, stably sorted by metadata index.
pub(crate) fn read_entry_table<R: Read + Seek>(
    r: &mut R,
    header: &HeaderV2,
    file_len: u64,
) -> Result<Vec<TableRecord>> {
    let table = read_compressed(
        r,
        header.entry_table_start,
        header.entry_table_length,
        header.entry_count as usize * V2_ENTRY_SIZE,
        file_len,
        "entry table",
    )?;

    let mut records = Vec::with_capacity(table.len() / V2_ENTRY_SIZE);
    let mut cursor = Cursor::new(table.as_slice());
    for _ in 0..table.len() / V2_ENTRY_SIZE {
        records.push(TableRecord {
            hash: read_u64_le(&mut cursor)?,
            metadata_index: read_u32_le(&mut cursor)?,
            metadata_count: read_u16_le(&mut cursor)?,
            flags: read_u16_le(&mut cursor)?,
        });
    }
    records.sort_by_key(|rec| rec.metadata_index);
    Ok(records)
}

/// Reads the 3-byte size and the byte holding its top nibble and the flags.
fn read_size_and_flags<R: Read>(r: &mut R) -> std::io::Result<(u32, bool)> {
    let low = read_u24_le(r)?;
    let msb_and_flags = read_u8(r)?;
    let size = low | (u32::from(msb_and_flags & 0x0F) << 24);
    Ok((size, msb_and_flags & 0xF0 & FLAG_COMPRESSED != 0))
}

fn parse_metadata(metadata: &[u8], record: &TableRecord) -> Result<Entry> {
    let start = u64::from(record.metadata_index) * 4;
    if start >= metadata.len() as u64 {
        return Err(Error::InvalidFormat(format!(
            "metadata index {} out of range for entry {:016x}",
            record.metadata_index, record.hash
        )));
    }
    let mut mr = Cursor::new(metadata);
    mr.set_position(start);

    let truncated =
        |_| Error::InvalidFormat(format!("truncated metadata for entry {:016x}", record.hash));

    let _chunk_index = read_u24_le(&mut mr).map_err(truncated)?;
    let chunk_type = ChunkType::from(read_u8(&mut mr).map_err(truncated)?);

    match chunk_type {
        ChunkType::Plain | ChunkType::Directory => {
            if chunk_type == ChunkType::Plain && record.metadata_count == 2 {
                // the payload of the auxiliary chunk follows directly
                skip(&mut mr, 4).map_err(truncated)?;
            }
            let (compressed_size, is_compressed) =
                read_size_and_flags(&mut mr).map_err(truncated)?;
            let size = read_u32_le(&mut mr).map_err(truncated)?;
            let _unknown = read_u32_le(&mut mr).map_err(truncated)?;
            let offset_block = read_u32_le(&mut mr).map_err(truncated)?;
            Ok(Entry {
                hash: record.hash,
                offset: u64::from(offset_block) * V2_BLOCK_SIZE,
                size,
                compressed_size,
                is_directory: chunk_type == ChunkType::Directory,
                is_compressed,
                crc: 0,
                texture: None,
            })
        }
        ChunkType::Image => {
            // the sample chunk header precedes the image payload
            skip(&mut mr, 8).map_err(truncated)?;
            let width = u32::from(read_u16_le(&mut mr).map_err(truncated)?) + 1;
            let height = u32::from(read_u16_le(&mut mr).map_err(truncated)?) + 1;
            let image_flags = read_u32_le(&mut mr).map_err(truncated)?;
            let sample_flags = read_u32_le(&mut mr).map_err(truncated)?;
            let (compressed_size, is_compressed) =
                read_size_and_flags(&mut mr).map_err(truncated)?;
            skip(&mut mr, 8).map_err(truncated)?;
            let offset_block = read_u32_le(&mut mr).map_err(truncated)?;
            Ok(Entry {
                hash: record.hash,
                offset: u64::from(offset_block) * V2_BLOCK_SIZE,
                size: compressed_size,
                compressed_size,
                is_directory: false,
                is_compressed,
                crc: 0,
                texture: Some(PackedTexture {
                    width,
                    height,
                    image_flags,
                    sample_flags,
                }),
            })
        }
        other => Err(Error::unsupported(format!(
            "metadata chunk type {other:?} for entry {:016x}",
            record.hash
        ))),
    }
}

/// Parses a listing payload: a u32 count, `count` name lengths, then the
/// names.
pub(crate) fn parse_listing(payload: &[u8], files_only: bool) -> Result<DirectoryListing> {
    let mut r = Cursor::new(payload);
    let bad = |_| Error::Decode("truncated directory listing".into());

    let count = read_u32_le(&mut r).map_err(bad)? as usize;
    if count > payload.len() {
        return Err(Error::Decode(format!(
            "directory listing claims {count} names in {} bytes",
            payload.len()
        )));
    }
    let lengths = read_bytes(&mut r, count).map_err(bad)?;

    let mut listing = DirectoryListing::default();
    for len in lengths {
        let raw = read_bytes(&mut r, usize::from(len)).map_err(bad)?;
        let name = String::from_utf8_lossy(&raw).into_owned();
        if let Some(dir) = name.strip_prefix(DIR_MARKER) {
            if !files_only {
                listing.subdirectories.insert(dir.to_string());
            }
        } else {
            listing.files.insert(name);
        }
    }
    Ok(listing)
}
