mod common;

use common::{deflated, payload, stored, write_zip};
use mmzip::{ArchiveCollection, ArchiveRead, Error, LabeledDataset, MappedArchive, ReadMethod};
use std::collections::BTreeSet;
use std::io::Read;
use tempfile::TempDir;

#[test]
fn federates_two_shards() {
    let dir = TempDir::new().unwrap();
    let cat = payload(1, 17);
    let dog1 = payload(2, 23);
    let dog2 = payload(3, 9);
    let shard0 = write_zip(
        dir.path(),
        "shard0.zip",
        &[stored("cats/1.jpg", &cat), stored("dogs/1.jpg", &dog1)],
    );
    let shard1 = write_zip(dir.path(), "shard1.zip", &[stored("dogs/2.jpg", &dog2)]);

    let collection = ArchiveCollection::new([&shard0, &shard1]).unwrap();
    assert_eq!(collection.len(), 2);
    assert_eq!(collection.namelist().len(), 3);
    assert_eq!(collection.collisions(), 0);

    assert_eq!(&collection.read("cats/1.jpg").unwrap()[..], &cat[..]);
    assert_eq!(collection.shard_index("cats/1.jpg").unwrap(), 0);

    assert_eq!(collection.shard_index("dogs/2.jpg").unwrap(), 1);
    let mut bytes = Vec::new();
    collection
        .open("dogs/2.jpg")
        .unwrap()
        .read_to_end(&mut bytes)
        .unwrap();
    assert_eq!(bytes, dog2);
    assert_eq!(collection.shard(1).unwrap().path(), shard1);
}

#[test]
fn later_shard_wins_on_collision() {
    let dir = TempDir::new().unwrap();
    let a = write_zip(dir.path(), "a.zip", &[stored("x", b"from a"), stored("only-a", b"a")]);
    let b = write_zip(dir.path(), "b.zip", &[stored("x", b"from b")]);

    let collection = ArchiveCollection::new([&a, &b]).unwrap();
    assert_eq!(&collection.read("x").unwrap()[..], b"from b");
    assert_eq!(collection.shard_index("x").unwrap(), 1);
    assert_eq!(collection.getinfo("x").unwrap().uncompressed_size, 6);
    assert_eq!(collection.collisions(), 1);

    // Names keep the position of their first appearance
    assert_eq!(collection.namelist(), ["x", "only-a"]);
    // The shadowed entry is still part of the concatenated file list
    assert_eq!(collection.filelist().len(), 3);

    let reversed = ArchiveCollection::new([&b, &a]).unwrap();
    assert_eq!(&reversed.read("x").unwrap()[..], b"from a");
}

#[test]
fn namelist_is_union_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let paths = [
        write_zip(dir.path(), "0.zip", &[stored("a", b"1"), stored("b", b"2")]),
        write_zip(dir.path(), "1.zip", &[stored("b", b"3"), stored("c", b"4")]),
        write_zip(dir.path(), "2.zip", &[stored("c", b"5"), stored("a", b"6"), stored("d", b"7")]),
    ];
    let collection = ArchiveCollection::new(&paths).unwrap();

    let union: BTreeSet<String> = collection
        .shards()
        .iter()
        .flat_map(|shard| shard.namelist().iter().cloned())
        .collect();
    let names: Vec<String> = collection.namelist().to_vec();
    let distinct: BTreeSet<String> = names.iter().cloned().collect();

    assert_eq!(names.len(), distinct.len());
    assert_eq!(distinct, union);
    assert_eq!(collection.collisions(), 3);
    assert_eq!(&collection.read("a").unwrap()[..], b"6");
}

#[test]
fn unknown_name_is_not_found() {
    let dir = TempDir::new().unwrap();
    let a = write_zip(dir.path(), "a.zip", &[stored("x", b"x")]);
    let collection = ArchiveCollection::new([&a]).unwrap();

    assert!(collection.read("y").unwrap_err().is_not_found());
    assert!(matches!(collection.open("y"), Err(Error::NameNotFound(_))));
    assert!(collection.shard_index("y").is_err());
}

#[test]
fn empty_collection_has_no_names() {
    let collection = ArchiveCollection::new(Vec::<std::path::PathBuf>::new()).unwrap();
    assert!(collection.is_empty());
    assert!(collection.namelist().is_empty());
    assert!(collection.read("x").unwrap_err().is_not_found());
}

#[test]
fn one_bad_shard_fails_the_whole_collection() {
    let dir = TempDir::new().unwrap();
    let good = write_zip(dir.path(), "good.zip", &[stored("x", b"x")]);
    let missing = dir.path().join("missing.zip");
    let corrupt = dir.path().join("corrupt.zip");
    std::fs::write(&corrupt, payload(0, 500)).unwrap();

    let err = ArchiveCollection::new([&good, &missing]).unwrap_err();
    assert!(matches!(&err, Error::Open { path, .. } if path == &missing));

    let err = ArchiveCollection::new([&good, &corrupt, &good]).unwrap_err();
    assert!(matches!(&err, Error::Open { path, .. } if path == &corrupt));
    assert!(err.is_corrupt());
}

#[test]
fn close_closes_every_shard() {
    let dir = TempDir::new().unwrap();
    let a = write_zip(dir.path(), "a.zip", &[stored("x", b"x")]);
    let b = write_zip(dir.path(), "b.zip", &[stored("y", b"y")]);
    let mut collection = ArchiveCollection::new([&a, &b]).unwrap();

    collection.close();
    assert!(collection.is_closed());
    assert!(collection.shards().iter().all(MappedArchive::is_closed));
    assert!(collection.read("x").unwrap_err().is_closed());
    assert!(collection.open("y").unwrap_err().is_closed());
    assert!(collection.read("missing").unwrap_err().is_closed());

    // Metadata survives
    assert_eq!(collection.namelist().len(), 2);
}

#[test]
fn from_shards_accepts_opened_archives() {
    let dir = TempDir::new().unwrap();
    let a = write_zip(dir.path(), "a.zip", &[stored("x", b"x")]);
    let shards = vec![MappedArchive::new(&a).unwrap()];
    let collection = ArchiveCollection::from_shards(shards);
    assert_eq!(&collection.read("x").unwrap()[..], b"x");
}

#[test]
fn labeled_dataset_over_shards() {
    let dir = TempDir::new().unwrap();
    let shard0 = write_zip(
        dir.path(),
        "imagenette-0.zip",
        &[
            stored("imagenette/train/", b""),
            stored("imagenette/train/n02/b.JPEG", b"bb"),
            stored("imagenette/train/n01/a.JPEG", b"a"),
            stored("imagenette/val/n01/c.JPEG", b"ccc"),
        ],
    );
    let shard1 = write_zip(
        dir.path(),
        "imagenette-1.zip",
        &[
            stored("imagenette/train/n03/d.JPEG", b"dddd"),
            stored("imagenette/train/n03/notes.txt", b"skip me"),
        ],
    );
    let collection = ArchiveCollection::new([&shard0, &shard1]).unwrap();

    let train = LabeledDataset::new(&collection, "train", ".JPEG");
    assert_eq!(train.labels(), ["n01", "n02", "n03"]);
    assert_eq!(train.len(), 3);

    let (bytes, label) = train.get(0).unwrap();
    assert_eq!(&bytes[..], b"bb");
    assert_eq!(train.labels()[label], "n02");

    let train = train.with_method(ReadMethod::Read);
    let (bytes, label) = train.get(2).unwrap();
    assert_eq!(&bytes[..], b"dddd");
    assert_eq!(label, 2);

    assert!(matches!(
        train.get(3),
        Err(Error::SampleOutOfRange { index: 3, len: 3 })
    ));

    let val = LabeledDataset::new(&collection, "val", ".JPEG");
    assert_eq!(val.len(), 1);
    assert_eq!(val.labels(), train.labels());
    assert_eq!(val.samples()[0].label, 0);
    assert_eq!(val.source().namelist().len(), 6);
}

#[test]
fn labels_agree_across_splits() {
    let dir = TempDir::new().unwrap();
    let path = write_zip(
        dir.path(),
        "data.zip",
        &[
            stored("data/train/a/1.JPEG", b"1"),
            stored("data/train/b/2.JPEG", b"2"),
            stored("data/train/c/3.JPEG", b"3"),
            stored("data/val/a/4.JPEG", b"4"),
            stored("data/val/c/5.JPEG", b"5"),
        ],
    );
    let archive = MappedArchive::new(&path).unwrap();

    let train = LabeledDataset::new(&archive, "train", ".JPEG");
    let val = LabeledDataset::new(&archive, "val", ".JPEG");
    assert_eq!(val.labels(), ["a", "b", "c"]);

    let label_of = |dataset: &LabeledDataset<&MappedArchive>, file: &str| {
        dataset
            .samples()
            .iter()
            .find(|sample| sample.name.ends_with(file))
            .map(|sample| sample.label)
            .unwrap()
    };
    assert_eq!(label_of(&train, "3.JPEG"), 2);
    assert_eq!(label_of(&val, "5.JPEG"), 2);
    let (bytes, label) = val.get(1).unwrap();
    assert_eq!(&bytes[..], b"5");
    assert_eq!(label, 2);
}

#[test]
fn archive_read_is_layout_agnostic() {
    fn total_bytes<S: ArchiveRead>(source: &S) -> usize {
        source
            .namelist()
            .iter()
            .map(|name| source.read(name).unwrap().len())
            .sum()
    }

    let dir = TempDir::new().unwrap();
    let a = write_zip(dir.path(), "a.zip", &[stored("x", b"xx"), stored("y", b"yyy")]);

    let archive = MappedArchive::new(&a).unwrap();
    let collection = ArchiveCollection::new([&a]).unwrap();
    assert_eq!(total_bytes(&archive), 5);
    assert_eq!(total_bytes(&collection), 5);
}

#[test]
fn dataset_reports_lying_sizes_as_errors() {
    let dir = TempDir::new().unwrap();
    let data = payload(9, 500);
    let path = write_zip(
        dir.path(),
        "lying.zip",
        &[deflated("data/train/a/1.JPEG", &data).with_declared_size(u64::MAX - 1)],
    );
    let archive = MappedArchive::new(&path).unwrap();

    let dataset = LabeledDataset::new(&archive, "train", ".JPEG");
    assert!(dataset.get(0).is_err());
    let dataset = dataset.with_method(ReadMethod::Read);
    assert!(dataset.get(0).unwrap_err().is_corrupt());
}
