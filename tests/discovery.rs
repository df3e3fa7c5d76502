//! Integration tests for path discovery.

mod common;

use common::{V1Builder, V2Builder};
use hashfs::discovery::scan;
use hashfs::read::{Archive, DiscoveryOptions, MemorySource, Threads};

const MODELS: usize = 24;

/// An archive without a root listing. The definition graph is reachable
/// from a well-known seed only.
fn unlisted_archive() -> Vec<u8> {
    let mut def = String::from("SiiNunit\n{\n");
    for i in 0..MODELS {
        def.push_str(&format!(
            "model_def : model.m{i}\n{{\n model_desc: \"/model/m{i}/m{i}.pmd\"\n}}\n"
        ));
    }
    def.push_str("}\n");

    let mut builder = V1Builder::new().compressed("/def/world/model.sii", def.as_bytes());
    for i in 0..MODELS {
        let pmd = format!("\x01\x00\x00\x00/material/m{i}.mat\x00");
        let mat = format!(
            "material : \"eut2.dif\" {{\n texture : \"/material/m{i}.tobj\"\n texture_name : \"texture_base\"\n}}\n"
        );
        builder = builder
            .file(&format!("/model/m{i}/m{i}.pmd"), pmd.as_bytes())
            .file(&format!("/model/m{i}/m{i}.pmg"), format!("\x15Gmp{i}").as_bytes())
            .file(&format!("/material/m{i}.mat"), mat.as_bytes());
    }
    builder
        .file("/material/shared.mat", b"material : \"eut2.dif\" {\n}\n")
        .alias_of_last("/material/decoy.mat")
        .file("/hidden.bin", b"never referenced")
        .build()
}

fn options(threads: Threads) -> DiscoveryOptions {
    DiscoveryOptions::new().threads(threads)
}

fn open(bytes: &[u8]) -> Archive<MemorySource> {
    common::open(bytes.to_vec())
}

#[test]
fn test_reaches_graph_from_well_known_seed() {
    let bytes = unlisted_archive();
    let discovery = open(&bytes).discover(&options(Threads::Single)).unwrap();

    // model.sii, then a pmd, pmg and mat per model
    assert_eq!(discovery.found.len(), 1 + 3 * MODELS);
    assert!(discovery.found.contains("/model/m3/m3.pmg"));
    assert!(discovery.referenced.contains("/material/m0.tobj"));
    assert!(!discovery.found.contains("/hidden.bin"));
    assert!(discovery.decoys.is_empty());
}

#[test]
fn test_each_parseable_file_is_scanned_once() {
    let bytes = unlisted_archive();
    for threads in [Threads::Single, Threads::count_or_single(4)] {
        let discovery = open(&bytes).discover(&options(threads).pool_size(2)).unwrap();
        let parseable = discovery
            .found
            .iter()
            .filter(|p| scan::is_parseable(p))
            .count() as u64;
        assert_eq!(discovery.metrics.files_parsed, parseable);
        assert_eq!(discovery.metrics.unique_files, discovery.found.len() as u64);
    }
}

#[test]
fn test_thread_count_changes_nothing_but_time() {
    let bytes = unlisted_archive();
    let extra = ["/material/shared.mat", "/material/decoy.mat"];
    let single = open(&bytes)
        .discover(&options(Threads::Single).extra_seeds(extra))
        .unwrap();

    for (threads, pool) in [(2, 1), (4, 4), (8, 3)] {
        let multi = open(&bytes)
            .discover(
                &options(Threads::count_or_single(threads))
                    .pool_size(pool)
                    .extra_seeds(extra),
            )
            .unwrap();
        assert_eq!(single.found, multi.found);
        assert_eq!(single.decoys, multi.decoys);
        assert_eq!(single.referenced, multi.referenced);
        assert_eq!(single.metrics.unique_files, multi.metrics.unique_files);
        assert_eq!(single.metrics.files_parsed, multi.metrics.files_parsed);
    }
    assert!(single.decoys.contains("/material/decoy.mat"));
    assert!(single.found.contains("/material/shared.mat"));
}

#[test]
fn test_extra_seed_reaches_unreferenced_file() {
    let bytes = unlisted_archive();
    let discovery = open(&bytes)
        .discover(&options(Threads::Single).extra_seeds(["/hidden.bin"]))
        .unwrap();
    assert!(discovery.found.contains("/hidden.bin"));
}

#[test]
fn test_v2_listing_walk() {
    let mut archive = V2Builder::new()
        .dir("/", &["/def", "readme.txt"])
        .file("/readme.txt", b"hello")
        .dir("/def", &["city.sii"])
        .file("/def/city.sii", b"SiiNunit\n{\ncity_data : city.x\n{\n}\n}\n")
        .open();
    let discovery = archive
        .discover(&options(Threads::Single).well_known_seeds(false))
        .unwrap();
    let found: Vec<&str> = discovery.found.iter().map(String::as_str).collect();
    assert_eq!(found, ["/def/city.sii", "/readme.txt"]);
    assert_eq!(discovery.metrics.listings_read, 2);
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_discovery_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models.scs");
    std::fs::write(&path, unlisted_archive()).unwrap();

    let mut archive = Archive::open_path(&path).unwrap();
    let multi = archive
        .discover(&options(Threads::count_or_single(4)))
        .unwrap();
    assert_eq!(multi.metrics.workers, 4);
    assert_eq!(multi.found.len(), 1 + 3 * MODELS);
    assert!(multi.metrics.decompression_wall_time <= multi.metrics.decompression_time);
}
