//! In-memory archives for unit tests.

use crate::hash::hash_path;
use crate::read::{Archive, MemorySource};

const V1_HEADER_SIZE: u64 = 20;

/// A version 1 archive under construction. Payloads are stored
/// uncompressed.
#[derive(Default)]
pub(crate) struct V1Builder {
    records: Vec<[u8; 32]>,
    body: Vec<u8>,
}

impl V1Builder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, path: &str, payload: &[u8], flags: u32) -> Self {
        let offset = V1_HEADER_SIZE + self.body.len() as u64;
        self.body.extend_from_slice(payload);
        self.push_record(hash_path(path, 0), offset, payload.len() as u32, flags)
    }

    /// Adds a record without a payload of its own.
    pub fn push_record(mut self, hash: u64, offset: u64, size: u32, flags: u32) -> Self {
        let mut rec = [0u8; 32];
        rec[0..8].copy_from_slice(&hash.to_le_bytes());
        rec[8..16].copy_from_slice(&offset.to_le_bytes());
        rec[16..20].copy_from_slice(&flags.to_le_bytes());
        rec[24..28].copy_from_slice(&size.to_le_bytes());
        rec[28..32].copy_from_slice(&size.to_le_bytes());
        self.records.push(rec);
        self
    }

    pub fn file(self, path: &str, payload: &[u8]) -> Self {
        self.push(path, payload, 0)
    }

    /// Adds a directory whose listing names `children` (`*` marks a
    /// subdirectory).
    pub fn dir(self, path: &str, children: &[&str]) -> Self {
        let listing = children.join("\n");
        self.push(path, listing.as_bytes(), 1)
    }

    /// Offset the next payload will be stored at.
    pub fn next_offset(&self) -> u64 {
        V1_HEADER_SIZE + self.body.len() as u64
    }

    pub fn build_bytes(self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"SCS#");
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(b"CITY");
        data.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        data.extend_from_slice(&((V1_HEADER_SIZE + self.body.len() as u64) as u32).to_le_bytes());
        data.extend_from_slice(&self.body);
        for rec in &self.records {
            data.extend_from_slice(rec);
        }
        data
    }

    pub fn build(self) -> Archive<MemorySource> {
        match Archive::from_bytes(self.build_bytes()) {
            Ok(archive) => archive,
            Err(e) => panic!("fixture archive does not open: {e}"),
        }
    }
}
