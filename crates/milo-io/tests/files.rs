//! Archive files on disk.

use std::fs;

use milo_io::objects::TEX;
use milo_io::{
    Directory, Endian, Entry, MiloError, MiloFile, MiloObject, Platform, RevisionPair,
    SaveOptions, SchemaObject, read_milo, write_milo,
};
use tempfile::TempDir;

fn sample() -> MiloFile {
    let mut root = Directory::new("ObjectDir", "disk");
    let mut tex = SchemaObject::new(&TEX, RevisionPair::new(11, 0));
    tex.record_mut().unwrap().set("width", 64u32);
    root.add_entry(Entry::from_object("a.tex", Box::new(tex)))
        .unwrap();
    root.add_entry(Entry::opaque("UnknownFutureType", "blob", vec![7; 21]))
        .unwrap();
    MiloFile::new(root, Platform::Pc)
}

#[test]
fn test_save_and_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("disk.milo");
    let file = sample();

    let written = file.save(&SaveOptions::new().with_path(&path)).unwrap();
    assert_eq!(written, path);

    let back = MiloFile::open(&path).unwrap();
    assert_eq!(back.path(), Some(path.as_path()));
    assert_eq!(back.root.len(), 2);
    let record = back.root.entry("a.tex").unwrap().object().unwrap().record().unwrap();
    assert_eq!(record.u32("width"), Some(64));
    assert_eq!(fs::read(&path).unwrap(), file.to_bytes(&SaveOptions::new()).unwrap());
}

#[test]
fn test_save_to_opened_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("again.milo");
    write_milo(&path, &sample()).unwrap();

    let mut file = read_milo(&path).unwrap();
    file.root.rename_entry("blob", "renamed").unwrap();
    file.save(&SaveOptions::new()).unwrap();

    let back = read_milo(&path).unwrap();
    assert!(back.root.entry("renamed").is_some());
    assert!(back.root.entry("blob").is_none());
}

#[test]
fn test_open_missing() {
    let dir = TempDir::new().unwrap();
    let err = MiloFile::open(&dir.path().join("missing.milo")).unwrap_err();
    assert!(matches!(err, MiloError::FileNotFound { .. }));
    assert!(err.to_string().contains("missing.milo"));
}

#[test]
fn test_save_other_endian_keeps_tree() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("big.milo");
    let mut file = sample();
    file.root.remove_entry("blob").unwrap();

    file.save(&SaveOptions::new().with_path(&path).with_endian(Endian::Big))
        .unwrap();
    assert_eq!(file.endian, Endian::Little);

    let back = MiloFile::open(&path).unwrap();
    assert_eq!(back.endian, Endian::Big);
    let record = back.root.entry("a.tex").unwrap().object().unwrap().record().unwrap();
    assert_eq!(record.u32("width"), Some(64));
}
