//! Fuzz target for decoding and parsing SII text.
//!
//! Run with: cargo +nightly fuzz run sii_parse

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(plain) = hashfs::sii::decode(data) else {
        return;
    };
    let text = String::from_utf8_lossy(&plain);
    if let Ok(file) = hashfs::sii::parser::parse(&text) {
        file.for_each_string(&mut |_| {});
    }
    let _ = hashfs::discovery::scan::references("/def/fuzz.sii", data);
});
