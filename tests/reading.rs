//! Integration tests for opening archives and reading entries.

mod common;

use common::{V1Builder, V2Builder, sample_text};
use hashfs::read::{Archive, EntryType, OpenOptions};
use hashfs::{Error, JunkReason};

const UNCOMPRESSED: &[u8; 31] = b"This is an uncompressed file.\r\n";

fn v2_scenario() -> (Vec<u8>, Vec<u8>) {
    let long = sample_text(3228);
    let bytes = V2Builder::new()
        .dir("/", &["/somedir", "uncompressed.txt"])
        .file("/uncompressed.txt", UNCOMPRESSED)
        .dir("/somedir", &["long.txt"])
        .compressed("/somedir/long.txt", &long)
        .build();
    (bytes, long)
}

// =============================================================================
// Version 2
// =============================================================================

#[test]
fn test_v2_scenario() {
    let (bytes, long) = v2_scenario();
    let mut archive = common::open(bytes);

    assert_eq!(archive.version(), 2);
    assert_eq!(archive.len(), 4);
    assert_eq!(archive.entry_exists("/"), EntryType::Directory);
    assert_eq!(archive.entry_exists("/somedir"), EntryType::Directory);
    assert_eq!(archive.entry_exists("/uncompressed.txt"), EntryType::File);
    assert_eq!(archive.entry_exists("/nope.txt"), EntryType::NotFound);

    let buffers = archive.extract("/uncompressed.txt").unwrap();
    assert_eq!(buffers.len(), 1);
    assert_eq!(buffers[0], UNCOMPRESSED);

    let entry = *archive.get_entry("/somedir/long.txt").unwrap();
    assert!(entry.is_compressed);
    assert!(entry.compressed_size < entry.size);
    assert_eq!(entry.size, 3228);
    let buffers = archive.extract("/somedir/long.txt").unwrap();
    assert_eq!(crc32fast::hash(&buffers[0]), crc32fast::hash(&long));
}

#[test]
fn test_v2_listing() {
    let (bytes, _) = v2_scenario();
    let mut archive = common::open(bytes);

    let root = archive.directory_listing("/", false, false).unwrap();
    assert!(root.subdirectories.contains("somedir"));
    assert!(root.files.contains("uncompressed.txt"));

    let files_only = archive.directory_listing("/", true, false).unwrap();
    assert!(files_only.subdirectories.is_empty());
    assert_eq!(files_only.files.len(), 1);

    let absolute = archive.directory_listing("/somedir/", false, true).unwrap();
    assert!(absolute.files.contains("/somedir/long.txt"));
}

#[test]
fn test_v2_compressed_texture() {
    // 2x2 R8G8B8A8, one mip level, no padding.
    let pixels: Vec<u8> = (0..16).collect();
    let mut archive = V2Builder::new()
        .texture("/material/road.tobj", 2, 2, 28 << 4, &pixels)
        .open();

    let entry = *archive.get_entry("/material/road.tobj").unwrap();
    assert!(entry.is_compressed);
    assert_eq!(archive.read_payload(&entry).unwrap(), pixels);

    let buffers = archive.extract("/material/road.tobj").unwrap();
    assert_eq!(buffers.len(), 2);
    assert_eq!(&buffers[1][..4], b"DDS ");
    assert_eq!(&buffers[1][148..], pixels.as_slice());
}

#[test]
fn test_listing_of_file_fails() {
    let (bytes, _) = v2_scenario();
    let mut archive = common::open(bytes);
    let err = archive
        .directory_listing("/uncompressed.txt", false, false)
        .unwrap_err();
    assert!(matches!(err, Error::NotADirectory { .. }));
    let err = archive.directory_listing("/missing", false, false).unwrap_err();
    assert!(err.is_not_found());
}

// =============================================================================
// Version 1
// =============================================================================

#[test]
fn test_v1_compressed_entry_matches_crc() {
    let text = sample_text(5000);
    let mut archive = V1Builder::new()
        .compressed("/def/city.sii", &text)
        .file("/def/raw.txt", b"raw")
        .open();

    let entry = *archive.get_entry("/def/city.sii").unwrap();
    assert!(entry.is_compressed);
    let data = archive.extract("/def/city.sii").unwrap().remove(0);
    assert_eq!(data, text);
    assert_eq!(crc32fast::hash(&data), entry.crc);
    assert_eq!(archive.extract("def/raw.txt").unwrap()[0], b"raw");
}

#[test]
fn test_v1_salted_paths() {
    let mut archive = V1Builder::new().salt(33).file("/a.txt", b"a").open();
    assert_eq!(archive.salt(), 33);
    assert_eq!(archive.extract("/a.txt").unwrap()[0], b"a");

    // Overriding the salt changes every lookup.
    archive.set_salt(0);
    assert_eq!(archive.entry_exists("/a.txt"), EntryType::NotFound);
}

#[test]
fn test_v1_listing_fragments_are_merged() {
    let mut archive = V1Builder::new()
        .dir("/", &["*def", "readme.txt"])
        .dir("/", &["*map", "version.sii"])
        .open();
    let listing = archive.directory_listing("/", false, false).unwrap();
    assert_eq!(listing.subdirectories.len(), 2);
    assert!(listing.subdirectories.contains("map"));
    assert!(listing.files.contains("readme.txt"));
    assert!(listing.files.contains("version.sii"));
}

#[test]
fn test_v1_table_at_end() {
    let bytes = V1Builder::new()
        .file("/a.txt", b"hello")
        .build_with_table_start(Some(0xFFFF_0000));

    let err = Archive::from_bytes(bytes.clone()).unwrap_err();
    assert!(matches!(err, Error::InvalidFormat(_)));

    let options = OpenOptions::new().force_table_at_end(true);
    let mut archive = Archive::from_bytes_with(bytes, &options).unwrap();
    assert_eq!(archive.extract("/a.txt").unwrap()[0], b"hello");
}

#[test]
fn test_alias_is_junk() {
    let archive = V1Builder::new()
        .file("/real.sii", b"SiiNunit\n{\n}\n")
        .alias_of_last("/fake.sii")
        .open();
    let fake = archive.try_get_entry("/fake.sii").unwrap().hash;
    let real = archive.try_get_entry("/real.sii").unwrap().hash;
    assert!(archive.junk().is_decoy(fake));
    assert!(!archive.junk().is_junk(real));
    assert_eq!(archive.junk().reason(fake), Some(JunkReason::Alias { of: real }));
}

// =============================================================================
// Open errors
// =============================================================================

#[test]
fn test_zip_is_detected() {
    let mut zip = b"PK\x03\x04".to_vec();
    zip.extend_from_slice(&[0u8; 60]);
    let err = Archive::from_bytes(zip).unwrap_err();
    assert!(matches!(err, Error::ZipArchive));
    assert!(err.is_format_error());
}

#[test]
fn test_foreign_magic() {
    let err = Archive::from_bytes(vec![0x7Fu8; 64]).unwrap_err();
    assert!(matches!(err, Error::NotHashFs { .. }));
}

#[test]
fn test_unsupported_version() {
    let mut bytes = V1Builder::new().file("/a", b"a").build();
    bytes[4] = 3;
    let err = Archive::from_bytes(bytes).unwrap_err();
    assert!(matches!(err, Error::UnsupportedVersion { version: 3 }));
}

#[test]
fn test_unsupported_hash_method() {
    let mut bytes = V1Builder::new().file("/a", b"a").build();
    bytes[8..12].copy_from_slice(b"MD5 ");
    let err = Archive::from_bytes(bytes).unwrap_err();
    assert!(matches!(err, Error::UnsupportedHashMethod { .. }));
}

#[test]
fn test_truncated_header() {
    let err = Archive::from_bytes(b"SCS#\x01\x00".to_vec()).unwrap_err();
    assert!(err.is_format_error());
}

#[test]
fn test_open_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("base.scs");
    let (bytes, _) = v2_scenario();
    std::fs::write(&path, bytes).unwrap();

    let mut archive = Archive::open_path(&path).unwrap();
    assert_eq!(archive.path(), path);
    assert_eq!(archive.extract("/uncompressed.txt").unwrap()[0], UNCOMPRESSED);

    let mut clone = archive.try_clone().unwrap();
    assert_eq!(clone.extract("/uncompressed.txt").unwrap()[0], UNCOMPRESSED);
}
