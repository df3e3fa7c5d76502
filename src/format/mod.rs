//! HashFS container format constants, definitions, and table parsers.
//!
//! A HashFS file starts with a fixed header:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | magic `"SCS#"` |
//! | 4 | 2 | version (1 or 2) |
//! | 6 | 2 | salt |
//! | 8 | 4 | hash method (`"CITY"`) |
//! | 12 | 4 | entry count |
//!
//! followed by version-specific fields. Version 1 stores a flat entry table;
//! version 2 stores a zlib-compressed entry table plus a zlib-compressed
//! metadata table of type-tagged chunks.

pub mod detect;
pub mod header;
pub mod reader;
pub(crate) mod v1;
pub(crate) mod v2;

/// The HashFS magic, `"SCS#"` read as a little-endian u32.
pub const MAGIC: u32 = 0x2353_4353;

/// Low 16 bits of a ZIP local file header magic (`"PK"`).
pub const ZIP_MAGIC_LOW: u32 = 0x4B50;

/// The only supported hash method tag.
pub const HASH_METHOD_CITY: &[u8; 4] = b"CITY";

/// Size of the fixed header shared by all versions.
pub const COMMON_HEADER_SIZE: u64 = 16;

/// Size of one version 1 entry table record.
pub const V1_ENTRY_SIZE: u64 = 32;

/// Size of one version 2 entry table record.
pub const V2_ENTRY_SIZE: usize = 16;

/// Version 2 payload offsets are stored in units of this many bytes.
pub const V2_BLOCK_SIZE: u64 = 16;

/// Path separator inside archives.
pub const SEPARATOR: char = '/';

/// The root directory path.
pub const ROOT: &str = "/";
