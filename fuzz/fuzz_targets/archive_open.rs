//! Fuzz target for opening arbitrary bytes as a HashFS archive.
//!
//! Exercises header detection, both entry table layouts and, for archives
//! that open, single-threaded discovery over every entry the table names.
//!
//! Run with: cargo +nightly fuzz run archive_open

#![no_main]

use hashfs::read::{Archive, DiscoveryOptions, Threads};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(mut archive) = Archive::from_bytes(data.to_vec()) else {
        return;
    };

    let entries: Vec<_> = archive.entries().copied().collect();
    for entry in &entries {
        let _ = archive.extract_entry(entry, "");
    }

    let options = DiscoveryOptions::new().threads(Threads::Single);
    let _ = archive.discover(&options);
});
