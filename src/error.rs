//! Error types for HashFS archive operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when opening, reading, scanning or extracting HashFS
//! archives, along with a convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`:
//!
//! ```rust,no_run
//! use hashfs::{Archive, Error};
//!
//! fn open(path: &str) -> hashfs::Result<()> {
//!     match Archive::open_path(path) {
//!         Ok(archive) => {
//!             println!("{} entries", archive.len());
//!             Ok(())
//!         }
//!         Err(Error::ZipArchive) => {
//!             eprintln!("{path} is a ZIP archive, not HashFS");
//!             Ok(())
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

use std::io;

/// The error type for HashFS operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical handling |
/// |----------|----------|------------------|
/// | I/O | [`Io`][Self::Io] | Count and continue per item |
/// | Format | [`NotHashFs`][Self::NotHashFs], [`ZipArchive`][Self::ZipArchive], [`UnsupportedVersion`][Self::UnsupportedVersion], [`UnsupportedHashMethod`][Self::UnsupportedHashMethod], [`InvalidFormat`][Self::InvalidFormat] | Skip the archive |
/// | Lookup | [`EntryNotFound`][Self::EntryNotFound], [`NotADirectory`][Self::NotADirectory] | "No edge" during discovery |
/// | Compatibility | [`UnsupportedFeature`][Self::UnsupportedFeature] | Skip the entry |
/// | Content | [`Decode`][Self::Decode] | Treat as not parseable |
/// | Control | [`Cancelled`][Self::Cancelled] | Abort the top-level operation |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while reading the archive or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file does not start with the HashFS magic.
    #[error("not a HashFS archive (magic {magic:#010x})")]
    NotHashFs {
        /// The magic value that was found.
        magic: u32,
    },

    /// The file is a ZIP archive and must be handled by a ZIP reader.
    #[error("file is a ZIP archive, not HashFS")]
    ZipArchive,

    /// The header declares a version this crate cannot read.
    #[error("unsupported HashFS version {version}")]
    UnsupportedVersion {
        /// The version found in the header.
        version: u16,
    },

    /// The header declares a hash method other than CityHash64.
    #[error("unsupported hash method {method:?}")]
    UnsupportedHashMethod {
        /// The four-character method tag.
        method: String,
    },

    /// The archive uses a feature that is not implemented.
    ///
    /// Returned for unknown v2 metadata chunk types and for encrypted SII
    /// files when the `aes` feature is disabled.
    #[error("unsupported feature: {feature}")]
    UnsupportedFeature {
        /// The name of the unsupported feature.
        feature: String,
    },

    /// The archive structure is invalid or truncated.
    #[error("invalid HashFS format: {0}")]
    InvalidFormat(String),

    /// No entry with the requested path exists in the archive.
    #[error("entry not found: {path}")]
    EntryNotFound {
        /// The path that was looked up.
        path: String,
    },

    /// A directory listing was requested for a file entry.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// The path that was looked up.
        path: String,
    },

    /// Entry content could not be decoded (SII, tobj, zlib payload).
    #[error("decode error: {0}")]
    Decode(String),

    /// The operation was cancelled through a [`CancellationToken`](crate::CancellationToken).
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns `true` if this error means the file is not a readable HashFS
    /// archive. These errors are fatal to opening one container but never to
    /// sibling archives in a multi-archive run.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::NotHashFs { .. }
                | Error::ZipArchive
                | Error::UnsupportedVersion { .. }
                | Error::UnsupportedHashMethod { .. }
                | Error::InvalidFormat(_)
        )
    }

    /// Returns `true` if a lookup found nothing at the requested path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::EntryNotFound { .. })
    }

    /// Returns `true` if this error is related to unsupported features.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFeature { .. }
                | Error::UnsupportedVersion { .. }
                | Error::UnsupportedHashMethod { .. }
        )
    }

    /// Creates an [`Error::EntryNotFound`] for `path`.
    pub fn not_found(path: impl Into<String>) -> Self {
        Error::EntryNotFound { path: path.into() }
    }

    /// Creates an [`Error::UnsupportedFeature`].
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Error::UnsupportedFeature {
            feature: feature.into(),
        }
    }
}

/// A specialized Result type for HashFS operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_not_hashfs_display() {
        let err = Error::NotHashFs { magic: 0x1234_5678 };
        assert_eq!(err.to_string(), "not a HashFS archive (magic 0x12345678)");
        assert!(err.is_format_error());
    }

    #[test]
    fn test_unsupported_classification() {
        assert!(Error::unsupported("chunk type 6").is_unsupported());
        assert!(Error::UnsupportedVersion { version: 3 }.is_unsupported());
        assert!(!Error::Cancelled.is_unsupported());
    }

    #[test]
    fn test_not_found() {
        let err = Error::not_found("/def/city.sii");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "entry not found: /def/city.sii");
        assert!(!err.is_format_error());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
