//! Descriptor accounting lives in its own test binary so no concurrently
//! running test opens files behind its back.

mod common;

use common::{payload, stored, write_zip};
use mmzip::{ArchiveCollection, MappedArchive};
use std::io::Read;
use tempfile::TempDir;

#[cfg(target_os = "linux")]
fn open_descriptors() -> usize {
    std::fs::read_dir("/proc/self/fd").unwrap().count()
}

#[cfg(target_os = "linux")]
fn mapped_regions() -> usize {
    std::fs::read_to_string("/proc/self/maps").unwrap().lines().count()
}

#[cfg(target_os = "linux")]
#[test]
fn open_close_loop_returns_to_baseline() {
    let dir = TempDir::new().unwrap();
    let data = payload(6, 10_000);
    let a = write_zip(dir.path(), "a.zip", &[stored("x", &data)]);
    let b = write_zip(dir.path(), "b.zip", &[stored("y", &data)]);
    let missing = dir.path().join("missing.zip");

    // Warm up anything lazily allocated by the first open
    drop(ArchiveCollection::new([&a, &b]).unwrap());

    let fds = open_descriptors();
    let maps = mapped_regions();

    for _ in 0..64 {
        let mut archive = MappedArchive::new(&a).unwrap();
        let mut reader = archive.open("x").unwrap();
        archive.close();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        drop(reader);

        let mut collection = ArchiveCollection::new([&a, &b]).unwrap();
        assert_eq!(collection.read("y").unwrap().len(), data.len());
        collection.close();

        // Shards opened before the failure are released too
        assert!(ArchiveCollection::new([&a, &b, &missing]).is_err());
    }

    assert_eq!(open_descriptors(), fds);
    assert_eq!(mapped_regions(), maps);
}
