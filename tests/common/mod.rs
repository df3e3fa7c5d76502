//! Shared test utilities for integration tests.
//!
//! Builders that lay out version 1 and version 2 archives in memory, byte
//! for byte as the game engine writes them.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use hashfs::hash::hash_path;
use hashfs::read::{Archive, MemorySource};

/// Size of the version 1 header.
pub const V1_HEADER_SIZE: usize = 20;

/// Size of the version 2 header.
pub const V2_HEADER_SIZE: usize = 49;

/// zlib-compresses `data`.
pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("write to Vec");
    encoder.finish().expect("finish zlib stream")
}

/// Deterministic text of exactly `len` bytes.
pub fn sample_text(len: usize) -> Vec<u8> {
    let line = b"The quick brown fox jumps over the lazy dog. 0123456789\n";
    line.iter().copied().cycle().take(len).collect()
}

/// Opens archive bytes, panicking with the error on failure.
pub fn open(bytes: Vec<u8>) -> Archive<MemorySource> {
    Archive::from_bytes(bytes).unwrap_or_else(|e| panic!("archive does not open: {e}"))
}

struct V1Record {
    hash: u64,
    offset: u64,
    flags: u32,
    crc: u32,
    size: u32,
    compressed_size: u32,
}

/// A version 1 archive under construction.
#[derive(Default)]
pub struct V1Builder {
    salt: u16,
    body: Vec<u8>,
    records: Vec<V1Record>,
}

impl V1Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn salt(mut self, salt: u16) -> Self {
        self.salt = salt;
        self
    }

    fn push(mut self, path: &str, data: &[u8], compress: bool, directory: bool) -> Self {
        let stored = if compress { zlib(data) } else { data.to_vec() };
        let offset = (V1_HEADER_SIZE + self.body.len()) as u64;
        self.body.extend_from_slice(&stored);
        let mut flags = 0;
        if directory {
            flags |= 1;
        }
        if compress {
            flags |= 2;
        }
        self.records.push(V1Record {
            hash: hash_path(path, self.salt),
            offset,
            flags,
            crc: crc32fast::hash(data),
            size: data.len() as u32,
            compressed_size: stored.len() as u32,
        });
        self
    }

    /// Adds a stored file.
    pub fn file(self, path: &str, data: &[u8]) -> Self {
        self.push(path, data, false, false)
    }

    /// Adds a zlib-compressed file.
    pub fn compressed(self, path: &str, data: &[u8]) -> Self {
        self.push(path, data, true, false)
    }

    /// Adds a directory. Subdirectory names carry a leading `*`.
    pub fn dir(self, path: &str, children: &[&str]) -> Self {
        let listing = children.join("\n");
        self.push(path, listing.as_bytes(), false, true)
    }

    /// Adds a record for `path` that shares the payload of the last
    /// record.
    pub fn alias_of_last(mut self, path: &str) -> Self {
        let last = self.records.last().expect("a record to alias");
        let record = V1Record {
            hash: hash_path(path, self.salt),
            offset: last.offset,
            flags: last.flags,
            crc: last.crc,
            size: last.size,
            compressed_size: last.compressed_size,
        };
        self.records.push(record);
        self
    }

    /// Writes the archive. `table_start` overrides the header field.
    pub fn build_with_table_start(self, table_start: Option<u32>) -> Vec<u8> {
        let start = (V1_HEADER_SIZE + self.body.len()) as u32;
        let mut data = Vec::new();
        data.extend_from_slice(b"SCS#");
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&self.salt.to_le_bytes());
        data.extend_from_slice(b"CITY");
        data.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        data.extend_from_slice(&table_start.unwrap_or(start).to_le_bytes());
        data.extend_from_slice(&self.body);
        for r in &self.records {
            data.extend_from_slice(&r.hash.to_le_bytes());
            data.extend_from_slice(&r.offset.to_le_bytes());
            data.extend_from_slice(&r.flags.to_le_bytes());
            data.extend_from_slice(&r.crc.to_le_bytes());
            data.extend_from_slice(&r.size.to_le_bytes());
            data.extend_from_slice(&r.compressed_size.to_le_bytes());
        }
        data
    }

    pub fn build(self) -> Vec<u8> {
        self.build_with_table_start(None)
    }

    pub fn open(self) -> Archive<MemorySource> {
        open(self.build())
    }
}

/// Wraps `data` in a one-tile GDeflate stream holding a single stored block.
///
/// Stored blocks are read from lane 0 only: its first word, then the words
/// following the 32 initial lane words.
pub fn gdeflate_stored(data: &[u8]) -> Vec<u8> {
    assert!(data.len() <= 0xFFFF);
    let len = data.len() as u16;
    let mut lane = vec![0x01];
    lane.extend_from_slice(&len.to_le_bytes());
    lane.extend_from_slice(&(!len).to_le_bytes());
    lane.extend_from_slice(data);
    while lane.len() % 4 != 0 {
        lane.push(0);
    }
    let mut tile = lane[..4].to_vec();
    tile.resize(32 * 4, 0);
    tile.extend_from_slice(&lane[4..]);

    let mut stream = vec![4, 4 ^ 0xFF];
    stream.extend_from_slice(&1u16.to_le_bytes());
    stream.extend_from_slice(&(1 | ((data.len() as u32) << 2)).to_le_bytes());
    stream.extend_from_slice(&(tile.len() as u32).to_le_bytes());
    stream.extend_from_slice(&tile);
    stream
}

enum V2Kind {
    Plain,
    Directory,
    Image {
        width: u16,
        height: u16,
        image_flags: u32,
    },
}

struct V2Item {
    hash: u64,
    kind: V2Kind,
    stored: Vec<u8>,
    size: u32,
    compressed: bool,
}

/// A version 2 archive under construction.
#[derive(Default)]
pub struct V2Builder {
    items: Vec<V2Item>,
}

/// Encodes a version 2 listing. Subdirectory names carry a leading `/`.
pub fn v2_listing(names: &[&str]) -> Vec<u8> {
    let mut data = (names.len() as u32).to_le_bytes().to_vec();
    data.extend(names.iter().map(|n| n.len() as u8));
    for name in names {
        data.extend_from_slice(name.as_bytes());
    }
    data
}

impl V2Builder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, path: &str, data: &[u8], kind: V2Kind, compress: bool) -> Self {
        let stored = if compress { zlib(data) } else { data.to_vec() };
        self.items.push(V2Item {
            hash: hash_path(path, 0),
            kind,
            stored,
            size: data.len() as u32,
            compressed: compress,
        });
        self
    }

    /// Adds a stored file.
    pub fn file(self, path: &str, data: &[u8]) -> Self {
        self.push(path, data, V2Kind::Plain, false)
    }

    /// Adds a zlib-compressed file.
    pub fn compressed(self, path: &str, data: &[u8]) -> Self {
        self.push(path, data, V2Kind::Plain, true)
    }

    /// Adds a directory. Subdirectory names carry a leading `/`.
    pub fn dir(self, path: &str, names: &[&str]) -> Self {
        let listing = v2_listing(names);
        self.push(path, &listing, V2Kind::Directory, false)
    }

    /// Adds a packed texture whose GDeflate-compressed payload is `pixels`.
    pub fn texture(
        mut self,
        path: &str,
        width: u16,
        height: u16,
        image_flags: u32,
        pixels: &[u8],
    ) -> Self {
        let stored = gdeflate_stored(pixels);
        self.items.push(V2Item {
            hash: hash_path(path, 0),
            kind: V2Kind::Image {
                width,
                height,
                image_flags,
            },
            size: stored.len() as u32,
            stored,
            compressed: true,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut body = vec![0u8; V2_HEADER_SIZE];
        let mut metadata = Vec::new();
        let mut table = Vec::new();

        for item in &self.items {
            while body.len() % 16 != 0 {
                body.push(0);
            }
            let block = (body.len() / 16) as u32;
            body.extend_from_slice(&item.stored);

            let index = (metadata.len() / 4) as u32;
            let csize = item.stored.len() as u32;
            let flags = if item.compressed { 0x10 } else { 0 };
            let size_and_flags = |metadata: &mut Vec<u8>| {
                metadata.extend_from_slice(&csize.to_le_bytes()[..3]);
                metadata.push(((csize >> 24) as u8 & 0x0F) | flags);
            };
            match item.kind {
                V2Kind::Plain | V2Kind::Directory => {
                    let chunk = if matches!(item.kind, V2Kind::Plain) { 128u8 } else { 129 };
                    metadata.extend_from_slice(&[0, 0, 0, chunk]);
                    size_and_flags(&mut metadata);
                    metadata.extend_from_slice(&item.size.to_le_bytes());
                    metadata.extend_from_slice(&0u32.to_le_bytes());
                }
                V2Kind::Image {
                    width,
                    height,
                    image_flags,
                } => {
                    metadata.extend_from_slice(&[0, 0, 0, 1]);
                    metadata.extend_from_slice(&[0u8; 8]);
                    metadata.extend_from_slice(&(width - 1).to_le_bytes());
                    metadata.extend_from_slice(&(height - 1).to_le_bytes());
                    metadata.extend_from_slice(&image_flags.to_le_bytes());
                    metadata.extend_from_slice(&0u32.to_le_bytes());
                    size_and_flags(&mut metadata);
                    metadata.extend_from_slice(&[0u8; 8]);
                }
            }
            metadata.extend_from_slice(&block.to_le_bytes());

            table.extend_from_slice(&item.hash.to_le_bytes());
            table.extend_from_slice(&index.to_le_bytes());
            table.extend_from_slice(&1u16.to_le_bytes());
            table.extend_from_slice(&0u16.to_le_bytes());
        }

        let table = zlib(&table);
        let metadata_units = (metadata.len() / 4) as u32;
        let metadata = zlib(&metadata);
        let table_start = body.len() as u64;
        body.extend_from_slice(&table);
        let metadata_start = body.len() as u64;
        body.extend_from_slice(&metadata);

        let mut header = Vec::with_capacity(V2_HEADER_SIZE);
        header.extend_from_slice(b"SCS#");
        header.extend_from_slice(&2u16.to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes());
        header.extend_from_slice(b"CITY");
        header.extend_from_slice(&(self.items.len() as u32).to_le_bytes());
        header.extend_from_slice(&(table.len() as u32).to_le_bytes());
        header.extend_from_slice(&metadata_units.to_le_bytes());
        header.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
        header.extend_from_slice(&table_start.to_le_bytes());
        header.extend_from_slice(&metadata_start.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes());
        header.push(0);
        body[..V2_HEADER_SIZE].copy_from_slice(&header);
        body
    }

    pub fn open(self) -> Archive<MemorySource> {
        open(self.build())
    }
}
