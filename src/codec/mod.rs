//! Payload codecs used by HashFS archives.
//!
//! Regular payloads and the version 2 tables are zlib streams. Version 2
//! texture payloads flagged as compressed use GDeflate, a GPU-oriented
//! variant of Deflate split into independently coded tiles.

pub mod gdeflate;
pub mod zlib;

use crate::read::Entry;
use crate::Result;

pub use zlib::{ZlibDecoder, inflate};

/// How an entry's stored bytes are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Stored as is.
    Store,
    /// zlib stream.
    Zlib,
    /// GDeflate stream (version 2 textures only).
    GDeflate,
}

impl Codec {
    /// Returns the codec used for `entry`'s payload.
    pub fn for_entry(entry: &Entry) -> Self {
        match (entry.is_compressed, entry.texture.is_some()) {
            (false, _) => Codec::Store,
            (true, false) => Codec::Zlib,
            (true, true) => Codec::GDeflate,
        }
    }

    /// Decodes `stored`.
    ///
    /// `size` is the declared size of a zlib payload. GDeflate payloads
    /// carry their own size in the tile stream header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`](crate::Error::Decode) for corrupt or wrongly
    /// sized data.
    pub fn decode(self, stored: Vec<u8>, size: u32) -> Result<Vec<u8>> {
        match self {
            Codec::Store => Ok(stored),
            Codec::Zlib => inflate(&stored, size as usize),
            Codec::GDeflate => gdeflate::decompress(&stored),
        }
    }
}
