//! Archive format detection utilities.
//!
//! Game directories mix HashFS archives with plain ZIP files under the same
//! `.scs` extension, so callers sniff the magic before choosing a reader.

use std::io::{Read, Seek, SeekFrom};

use super::{MAGIC, ZIP_MAGIC_LOW};
use crate::{Error, Result};

/// Detected archive format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// HashFS archive (any version).
    HashFs,
    /// ZIP archive.
    Zip,
    /// Unknown or unrecognized format.
    Unknown,
}

impl ArchiveFormat {
    /// Returns a human-readable name for this format.
    pub fn name(&self) -> &'static str {
        match self {
            ArchiveFormat::HashFs => "HashFS",
            ArchiveFormat::Zip => "ZIP",
            ArchiveFormat::Unknown => "Unknown",
        }
    }

    /// Returns whether this format can be read by this crate.
    pub fn is_supported(&self) -> bool {
        matches!(self, ArchiveFormat::HashFs)
    }

    /// Classifies a little-endian magic value.
    pub fn from_magic(magic: u32) -> Self {
        if magic == MAGIC {
            ArchiveFormat::HashFs
        } else if magic & 0xFFFF == ZIP_MAGIC_LOW {
            ArchiveFormat::Zip
        } else {
            ArchiveFormat::Unknown
        }
    }

    /// Converts a non-HashFS detection result into the matching open error.
    pub(crate) fn into_open_error(self, magic: u32) -> Error {
        match self {
            ArchiveFormat::Zip => Error::ZipArchive,
            _ => Error::NotHashFs { magic },
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Detects the archive format by examining the first four bytes.
///
/// The reader position is restored before returning. Inputs shorter than
/// four bytes are reported as [`ArchiveFormat::Unknown`].
pub fn detect_format<R: Read + Seek>(reader: &mut R) -> Result<ArchiveFormat> {
    let start_pos = reader.stream_position()?;

    let mut magic = [0u8; 4];
    let mut filled = 0;
    while filled < magic.len() {
        let n = reader.read(&mut magic[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    reader.seek(SeekFrom::Start(start_pos))?;

    if filled < magic.len() {
        return Ok(ArchiveFormat::Unknown);
    }
    Ok(ArchiveFormat::from_magic(u32::from_le_bytes(magic)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_detect_hashfs_signature() {
        let data = *b"SCS#\x02\x00";
        let mut cursor = Cursor::new(&data);
        assert_eq!(detect_format(&mut cursor).unwrap(), ArchiveFormat::HashFs);
    }

    #[test]
    fn test_detect_zip_signature() {
        let data = [0x50, 0x4B, 0x03, 0x04, 0x14, 0x00];
        let mut cursor = Cursor::new(&data);
        assert_eq!(detect_format(&mut cursor).unwrap(), ArchiveFormat::Zip);
    }

    #[test]
    fn test_detect_unknown_and_short() {
        let mut cursor = Cursor::new(b"7z\xBC\xAF".to_vec());
        assert_eq!(detect_format(&mut cursor).unwrap(), ArchiveFormat::Unknown);

        let mut short = Cursor::new(b"SC".to_vec());
        assert_eq!(detect_format(&mut short).unwrap(), ArchiveFormat::Unknown);
    }

    #[test]
    fn test_reader_position_restored() {
        let data = b"xxSCS#".to_vec();
        let mut cursor = Cursor::new(data);
        cursor.set_position(2);
        assert_eq!(detect_format(&mut cursor).unwrap(), ArchiveFormat::HashFs);
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_open_error_mapping() {
        assert!(matches!(
            ArchiveFormat::Zip.into_open_error(0x0403_4B50),
            Error::ZipArchive
        ));
        assert!(matches!(
            ArchiveFormat::Unknown.into_open_error(7),
            Error::NotHashFs { magic: 7 }
        ));
    }
}
