//! Integration tests for editing archives in memory.

use std::thread;

use milo_io::objects::{CHAR_BONES_SAMPLES, GROUP, TEX};
use milo_io::schema::{Record, Value};
use milo_io::{
    Directory, Endian, Entry, MiloError, MiloFile, PayloadState, Platform, ReadOptions, ReadScope,
    MiloObject, RevisionPair, SaveOptions, SchemaObject, TreeNode, write_record,
};

fn reopen(file: &MiloFile) -> MiloFile {
    let bytes = file.to_bytes(&SaveOptions::new()).unwrap();
    MiloFile::from_bytes(&bytes, &ReadOptions::new()).unwrap()
}

fn tex(width: u32) -> SchemaObject {
    let mut tex = SchemaObject::new(&TEX, RevisionPair::new(11, 0));
    tex.record_mut().unwrap().set("width", width);
    tex
}

fn archive() -> MiloFile {
    let mut root = Directory::new("ObjectDir", "level");
    root.add_entry(Entry::from_object("a.tex", Box::new(tex(16))))
        .unwrap();
    root.add_entry(Entry::opaque("UnknownFutureType", "blob", vec![3; 12]))
        .unwrap();
    let mut group = SchemaObject::new(&GROUP, RevisionPair::new(14, 0));
    group
        .record_mut()
        .unwrap()
        .set("objects", Value::List(vec![Value::from("a.tex")]));
    root.add_entry(Entry::from_object("all.grp", Box::new(group)))
        .unwrap();
    reopen(&MiloFile::new(root, Platform::Pc))
}

#[test]
fn test_field_edit_is_written() {
    let mut file = archive();
    let entry = file.root.entry_mut("a.tex").unwrap();
    assert!(matches!(entry.payload.state(), PayloadState::Parsed(_)));

    entry
        .object_mut()
        .unwrap()
        .record_mut()
        .unwrap()
        .set("width", 512u32);
    assert!(file.root.is_dirty());

    let back = reopen(&file);
    let record = back.root.entry("a.tex").unwrap().object().unwrap().record().unwrap();
    assert_eq!(record.u32("width"), Some(512));
}

#[test]
fn test_rename_duplicate_remove() {
    let mut file = archive();
    file.root.rename_entry("a.tex", "b.tex").unwrap();
    file.root.duplicate_entry("b.tex", "c.tex").unwrap();
    file.root.remove_entry("blob").unwrap();

    let back = reopen(&file);
    let names: Vec<&str> = back.root.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["b.tex", "c.tex", "all.grp"]);
    assert_eq!(
        back.root.entry("c.tex").unwrap().payload.raw(),
        back.root.entry("b.tex").unwrap().payload.raw()
    );
}

#[test]
fn test_names_outside_latin1_are_rejected() {
    let mut file = archive();
    let err = file.root.rename_entry("a.tex", "日本.tex").unwrap_err();
    assert!(matches!(err, MiloError::Unrepresentable { .. }));
    assert!(file.root.entry("a.tex").is_some());

    let err = file
        .root
        .add_entry(Entry::opaque("UnknownFutureType", "ü→", vec![1]))
        .unwrap_err();
    assert!(matches!(err, MiloError::Unrepresentable { .. }));

    file.root.entry_mut("blob").unwrap().name = "日本".into();
    let err = file.to_bytes(&SaveOptions::new()).unwrap_err();
    assert!(matches!(err, MiloError::Unrepresentable { .. }));

    file.root.rename_entry("日本", "caf\u{e9}.bin").unwrap();
    let back = reopen(&file);
    assert!(back.root.entry("caf\u{e9}.bin").is_some());
}

#[test]
fn test_replace_is_transactional() {
    let mut file = archive();
    let registry = file.registry();
    let scope = ReadScope::new(&registry, file.endian, file.platform);
    let before = file.root.entry("a.tex").unwrap().payload.raw().to_vec();

    // a Tex with a revision its table does not declare
    let mut bad = before.clone();
    bad[..4].copy_from_slice(&99u32.to_le_bytes());
    let err = file
        .root
        .replace_entry_bytes(&scope, "a.tex", bad)
        .unwrap_err();
    match err {
        MiloError::ReplaceFailed { name, source } => {
            assert_eq!(name, "a.tex");
            assert!(matches!(*source, MiloError::UnsupportedRevision { revision: 99, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    let entry = file.root.entry("a.tex").unwrap();
    assert_eq!(entry.payload.raw(), before.as_slice());
    assert!(matches!(entry.payload.state(), PayloadState::Parsed(_)));

    let replacement = write_record_bytes(&tex(64));
    file.root
        .replace_entry_bytes(&scope, "a.tex", replacement.clone())
        .unwrap();
    let entry = file.root.entry("a.tex").unwrap();
    assert_eq!(entry.payload.raw(), replacement.as_slice());
    assert_eq!(entry.object().unwrap().record().unwrap().u32("width"), Some(64));
}

/// Bytes of a record as stored inside an entry, without the sentinel.
fn write_record_bytes(object: &SchemaObject) -> Vec<u8> {
    let mut bytes = write_record(object, Endian::Little).unwrap();
    bytes.truncate(bytes.len() - 4);
    bytes
}

#[test]
fn test_create_entry_from_external_bytes() {
    let mut file = archive();
    let registry = file.registry();
    let scope = ReadScope::new(&registry, file.endian, file.platform);
    file.root
        .create_entry(&scope, "Tex", "imported.tex", write_record_bytes(&tex(8)))
        .unwrap();
    let err = file
        .root
        .create_entry(&scope, "Tex", "imported.tex", Vec::new())
        .unwrap_err();
    assert!(matches!(err, MiloError::DuplicateEntry { .. }));

    let back = reopen(&file);
    assert!(back.root.entry("imported.tex").unwrap().object().is_some());
}

#[test]
fn test_template_fixup() {
    let mut file = archive();
    let template = file.root.entry("a.tex").unwrap().payload.raw().to_vec();
    let registry = file.registry();
    let scope = ReadScope::new(&registry, file.endian, file.platform);

    for i in 0..3u32 {
        let name = format!("copy{i}.tex");
        let mut entry = Entry::from_template(&scope, "Tex", name, template.clone()).unwrap();
        entry
            .object_mut()
            .unwrap()
            .record_mut()
            .unwrap()
            .set("index", i32::try_from(i).unwrap());
        file.root.add_entry(entry).unwrap();
    }

    let back = reopen(&file);
    let index = |name: &str| {
        back.root.entry(name).unwrap().object().unwrap().record().unwrap().i32("index")
    };
    assert_eq!(index("copy2.tex"), Some(2));
    assert_eq!(index("a.tex"), Some(0));
}

#[test]
fn test_proxy_entry_uses_reduced_record() {
    let mut root = Directory::new("ObjectDir", "level");
    let mut group = SchemaObject::new(&GROUP, RevisionPair::new(11, 0));
    group.record_mut().unwrap().set("environ", "night.env");
    let mut entry = Entry::from_object("proxy.grp", Box::new(group.clone()));
    entry.set_proxy(true);
    root.add_entry(entry).unwrap();
    root.add_entry(Entry::from_object("full.grp", Box::new(group)))
        .unwrap();

    let back = reopen(&MiloFile::new(root, Platform::Pc));
    let proxy = back.root.entry("proxy.grp").unwrap();
    let full = back.root.entry("full.grp").unwrap();
    assert!(proxy.is_proxy());
    assert!(!proxy.object().unwrap().record().unwrap().contains("environ"));
    assert_eq!(
        full.object().unwrap().record().unwrap().symbol("environ").unwrap(),
        "night.env"
    );
    // environ (4 + 9) and draw_only (4) are omitted
    assert_eq!(full.payload.raw().len() - proxy.payload.raw().len(), 17);
}

#[test]
fn test_derived_counts_reproduce_stored_bytes() {
    let bones: Vec<Value> = ["hip.pos", "hip.quat", "knee.rotz"]
        .into_iter()
        .map(|name| Value::Struct(Record::new().with("name", name).with("weight", 0.5f32)))
        .collect();
    let mut samples = SchemaObject::new(&CHAR_BONES_SAMPLES, RevisionPair::new(14, 0));
    let record = samples.record_mut().unwrap();
    record.set("bones", Value::List(bones));
    record.set("num_samples", 4u32);
    record.set("samples", vec![0x5A; 4 * (12 + 16 + 4)]);

    let mut root = Directory::new("ObjectDir", "anim");
    root.add_entry(Entry::from_object("walk.cbs", Box::new(samples)))
        .unwrap();
    let file = reopen(&MiloFile::new(root, Platform::Ps2));

    let entry = file.root.entry("walk.cbs").unwrap();
    let record = entry.object().unwrap().record().unwrap();
    let counts: Vec<u32> = record
        .list("counts")
        .unwrap()
        .iter()
        .filter_map(Value::as_u32)
        .collect();
    assert_eq!(counts, vec![1, 0, 1, 0, 0, 1]);
    assert_eq!(record.bytes("samples").unwrap().len(), 128);

    let mut edited = file.clone();
    edited.root.entry_mut("walk.cbs").unwrap().object_mut();
    assert_eq!(
        edited.to_bytes(&SaveOptions::new()).unwrap(),
        file.to_bytes(&SaveOptions::new()).unwrap()
    );
}

#[test]
fn test_parallel_read_only_traversal() {
    let file = archive();
    let counts: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    file.root
                        .walk()
                        .filter(|(_, node)| matches!(node, TreeNode::Entry(_)))
                        .count()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(counts, vec![3; 4]);
}
