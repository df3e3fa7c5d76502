//! # hashfs
//!
//! A pure-Rust reader for HashFS game archives, with path recovery and
//! extraction.
//!
//! HashFS archives store only the 64-bit hash of each path. Stock archives
//! carry directory listings, but protected ones strip or corrupt them and
//! add decoy entries. This crate reads both format versions, recovers paths
//! by following references between files, and writes the recovered tree to
//! disk under filesystem-legal names.
//!
//! ## Quick Start
//!
//! ### Reading Entries
//!
//! ```rust,no_run
//! use hashfs::{Archive, EntryType, Result};
//!
//! fn main() -> Result<()> {
//!     let mut archive = Archive::open_path("base.scs")?;
//!
//!     if archive.entry_exists("/def/city.sii") == EntryType::File {
//!         let buffers = archive.extract("/def/city.sii")?;
//!         println!("{} bytes", buffers[0].len());
//!     }
//!
//!     let root = archive.directory_listing("/", false, true)?;
//!     for file in &root.files {
//!         println!("{file}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Recovering and Extracting
//!
//! ```rust,no_run
//! use hashfs::{Archive, DiscoveryOptions, ExtractOptions, Result};
//!
//! fn main() -> Result<()> {
//!     let mut archive = Archive::open_path("mod.scs")?;
//!     let discovery = archive.discover(&DiscoveryOptions::default())?;
//!     let summary = archive.extract_discovered(&discovery, "./out", &ExtractOptions::default())?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `aes` | Yes | Decrypt encrypted SII files |
//! | `parallel` | Yes | Multi-threaded discovery with rayon |
//! | `cli` | No | The `hashfs` command-line tool |
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result`]. Format errors are fatal to
//! one archive; per-file failures during extraction are counted in the
//! [`ExtractSummary`] instead of aborting the run.
//!
//! ```rust,no_run
//! use hashfs::{Archive, Error};
//!
//! match Archive::open_path("data.zip") {
//!     Ok(_) => {}
//!     Err(Error::ZipArchive) => eprintln!("this is a plain ZIP file"),
//!     Err(e) if e.is_format_error() => eprintln!("not a HashFS archive: {e}"),
//!     Err(e) => eprintln!("error: {e}"),
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod codec;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod format;
pub mod hash;
pub mod junk;
pub mod multi;
pub mod pool;
pub mod progress;
pub mod read;
pub mod relocate;
pub mod sii;
pub mod sniff;
pub mod texture;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{Error, Result};

// Re-export reading API at crate root for convenience
pub use read::{
    Archive, ArchiveSource, DirectoryListing, DiscoveryOptions, Entry, EntryType, ExtractOptions,
    FileSource, MemorySource, OpenOptions, OverwritePolicy, Threads,
};

// Re-export discovery and extraction results
pub use discovery::{Discovery, DiscoveryMetrics};
pub use extract::ExtractSummary;
pub use multi::ArchiveSet;
pub use relocate::{RelocationReport, RelocationSession};

pub use junk::{JunkClassification, JunkOptions, JunkReason};
pub use pool::{PoolStats, ReaderPool};

// Re-export progress API
pub use progress::{AtomicProgress, CancellationToken, NoProgress, Phase, ProgressReporter};
