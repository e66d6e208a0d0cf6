//! Directory container tree.
//!
//! A directory is a named, typed list of entries. Since revision 28 it may
//! carry a record of its own, and since revision 27 it may embed whole
//! sub-directories inline. Directory wire layout, all integers in the
//! stream's declared byte order:
//!
//! ```text
//! u32     revision
//! Symbol  dir_type
//! Symbol  name
//! u32     entry_count
//! entry_count x {
//!     Symbol type
//!     Symbol name
//!     u8     flags                (revision >= 25)
//!     u32    length
//!     u8[length]
//! }
//! u8      has_payload             (revision >= 28)
//! [u32 length, u8[length]]
//! u32 count, count x Directory    (revision >= 27)
//! u32 count, count x Symbol       file names
//! u32 count, count x u8           reference types
//! u32 count, count x u8           alternate reference types
//! ```

use std::collections::HashSet;

use tracing::{debug, trace, warn};

use crate::entry::{Entry, Payload, PayloadValue, decode_object};
use crate::error::{MiloError, Result};
use crate::platform::Platform;
use crate::registry::{EntryInfo, MiloObject, ParentInfo, RecordContext, TypeRegistry};
use crate::stream::{ByteReader, ByteWriter, Endian};
use crate::symbol::Symbol;

/// Oldest directory revision understood.
pub const MIN_REVISION: u32 = 24;

/// Newest directory revision understood, used for new directories.
pub const MAX_REVISION: u32 = 32;

/// Deepest allowed nesting of directories, the root included.
pub const MAX_DEPTH: usize = 64;

const FLAGS_REVISION: u32 = 25;
const INLINE_REVISION: u32 = 27;
const PAYLOAD_REVISION: u32 = 28;

/// Settings shared by every read in one tree.
#[derive(Debug, Clone, Copy)]
pub struct ReadScope<'r> {
    pub registry: &'r TypeRegistry,
    pub endian: Endian,
    pub platform: Platform,
    /// Fail instead of keeping raw bytes when a known type fails to decode.
    pub strict: bool,
    depth: usize,
}

impl<'r> ReadScope<'r> {
    #[must_use]
    pub const fn new(registry: &'r TypeRegistry, endian: Endian, platform: Platform) -> Self {
        Self {
            registry,
            endian,
            platform,
            strict: false,
            depth: 1,
        }
    }

    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Scope one directory level down.
    pub fn nested(&self) -> Result<Self> {
        if self.depth >= MAX_DEPTH {
            return Err(MiloError::invalid_format(format!(
                "directories nested deeper than {MAX_DEPTH}"
            )));
        }
        Ok(Self {
            depth: self.depth + 1,
            ..*self
        })
    }
}

/// Settings shared by every write in one tree.
#[derive(Debug, Clone, Copy)]
pub struct WriteScope {
    /// Byte order to write.
    pub endian: Endian,
    /// Byte order the captured raw bytes are in.
    pub source_endian: Endian,
    pub platform: Platform,
}

impl WriteScope {
    #[must_use]
    pub const fn new(endian: Endian, source_endian: Endian, platform: Platform) -> Self {
        Self {
            endian,
            source_endian,
            platform,
        }
    }
}

/// A directory embedded by value in its parent.
#[derive(Debug, Clone)]
pub struct InlineSubdir {
    pub directory: Directory,
    pub file_name: Symbol,
    pub reference_type: u8,
    pub alt_reference_type: u8,
}

impl InlineSubdir {
    #[must_use]
    pub fn new(directory: Directory, file_name: impl Into<Symbol>) -> Self {
        Self {
            directory,
            file_name: file_name.into(),
            reference_type: 0,
            alt_reference_type: 0,
        }
    }
}

/// Named, typed container of entries.
#[derive(Debug, Clone)]
pub struct Directory {
    pub revision: u32,
    pub dir_type: Symbol,
    pub name: Symbol,
    pub platform: Platform,
    entries: Vec<Entry>,
    payload: Option<Payload>,
    inline_subdirs: Vec<InlineSubdir>,
}

impl Directory {
    /// Empty directory at the newest revision.
    #[must_use]
    pub fn new(dir_type: impl Into<Symbol>, name: impl Into<Symbol>) -> Self {
        Self {
            revision: MAX_REVISION,
            dir_type: dir_type.into(),
            name: name.into(),
            platform: Platform::default(),
            entries: Vec::new(),
            payload: None,
            inline_subdirs: Vec::new(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The directory's own record, if it has one.
    #[must_use]
    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn payload_mut(&mut self) -> Option<&mut Payload> {
        self.payload.as_mut()
    }

    /// Replace the directory's own record with one built in memory.
    pub fn set_payload_object(&mut self, object: Box<dyn MiloObject>) {
        self.payload = Some(Payload::modified(PayloadValue::Object(object)));
    }

    pub fn clear_payload(&mut self) -> Option<Payload> {
        self.payload.take()
    }

    #[must_use]
    pub fn inline_subdirs(&self) -> &[InlineSubdir] {
        &self.inline_subdirs
    }

    pub fn inline_subdirs_mut(&mut self) -> &mut [InlineSubdir] {
        &mut self.inline_subdirs
    }

    /// Whether anything in this directory or below must be re-serialized.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.entries.iter().any(Entry::is_dirty)
            || self.payload.as_ref().is_some_and(Payload::is_dirty)
            || self
                .inline_subdirs
                .iter()
                .any(|sub| sub.directory.is_dirty())
    }

    // Editor operations

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn entry_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|entry| entry.name == name)
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.entries
            .iter()
            .position(|entry| entry.name == name)
            .ok_or_else(|| MiloError::entry_not_found(name))
    }

    fn ensure_unique(&self, name: &Symbol) -> Result<()> {
        name.check_encodable()?;
        if self.entry(name.as_str()).is_some() {
            return Err(MiloError::duplicate_entry(name.as_str()));
        }
        Ok(())
    }

    /// Append an entry; names must be unique within the directory.
    pub fn add_entry(&mut self, entry: Entry) -> Result<&mut Entry> {
        self.ensure_unique(&entry.name)?;
        debug!(dir = %self.name, name = %entry.name, entry_type = %entry.entry_type, "added entry");
        let index = self.entries.len();
        self.entries.push(entry);
        Ok(&mut self.entries[index])
    }

    /// Decode external bytes as a new entry of the given type.
    pub fn create_entry(
        &mut self,
        scope: &ReadScope<'_>,
        entry_type: impl Into<Symbol>,
        name: impl Into<Symbol>,
        bytes: Vec<u8>,
    ) -> Result<&mut Entry> {
        let name = name.into();
        self.ensure_unique(&name)?;
        let entry = Entry::decode(
            scope,
            Some(self.info()),
            entry_type.into(),
            name,
            0,
            bytes,
        )?;
        self.add_entry(entry)
    }

    pub fn rename_entry(&mut self, old: &str, new: &str) -> Result<()> {
        let index = self.position(old)?;
        let new_name = Symbol::new(new);
        if old == new {
            new_name.check_encodable()?;
        } else {
            self.ensure_unique(&new_name)?;
        }
        debug!(dir = %self.name, old, new, "renamed entry");
        self.entries[index].name = new_name;
        Ok(())
    }

    /// Copy an entry under a new name, placed right after the original.
    pub fn duplicate_entry(&mut self, name: &str, new_name: &str) -> Result<&mut Entry> {
        let index = self.position(name)?;
        let new_name = Symbol::new(new_name);
        self.ensure_unique(&new_name)?;
        let mut copy = self.entries[index].clone();
        copy.name = new_name;
        self.entries.insert(index + 1, copy);
        Ok(&mut self.entries[index + 1])
    }

    pub fn remove_entry(&mut self, name: &str) -> Result<Entry> {
        let index = self.position(name)?;
        debug!(dir = %self.name, name, "removed entry");
        Ok(self.entries.remove(index))
    }

    /// Swap an entry's bytes and decode them.
    ///
    /// The new bytes are decoded before anything changes. If decoding fails
    /// the entry keeps its previous contents and `ReplaceFailed` is returned.
    pub fn replace_entry_bytes(
        &mut self,
        scope: &ReadScope<'_>,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let index = self.position(name)?;
        let current = &self.entries[index];
        let replacement = Entry::decode(
            &scope.with_strict(true),
            Some(self.info()),
            current.entry_type.clone(),
            current.name.clone(),
            current.flags,
            bytes,
        )
        .map_err(|source| MiloError::ReplaceFailed {
            name: name.to_string(),
            source: Box::new(source),
        })?;
        self.entries[index] = replacement;
        Ok(())
    }

    pub fn add_inline_subdir(&mut self, subdir: InlineSubdir) {
        self.inline_subdirs.push(subdir);
    }

    pub fn remove_inline_subdir(&mut self, file_name: &str) -> Result<InlineSubdir> {
        let index = self
            .inline_subdirs
            .iter()
            .position(|sub| sub.file_name == file_name)
            .ok_or_else(|| MiloError::entry_not_found(file_name))?;
        Ok(self.inline_subdirs.remove(index))
    }

    /// Find an entry by name anywhere below this directory.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Entry> {
        self.walk().find_map(|(_, node)| match node {
            TreeNode::Entry(entry) if entry.name == name => Some(entry),
            _ => None,
        })
    }

    /// Mutable variant of [`Directory::find`].
    ///
    /// Entries holding the directories on the path to the match are marked
    /// modified, so edits to the match are written.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Entry> {
        if let Some(index) = self.entries.iter().position(|entry| entry.name == name) {
            return Some(&mut self.entries[index]);
        }
        for entry in &mut self.entries {
            if entry.directory().is_some_and(|dir| dir.find(name).is_some()) {
                return entry.directory_mut()?.find_mut(name);
            }
        }
        self.inline_subdirs
            .iter_mut()
            .find_map(|sub| sub.directory.find_mut(name))
    }

    /// Depth-first traversal of this directory and everything below it.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![(0, TreeNode::Directory(self))],
        }
    }

    fn info(&self) -> ParentInfo<'_> {
        ParentInfo {
            name: &self.name,
            dir_type: &self.dir_type,
            revision: self.revision,
        }
    }

    // Wire format

    /// Read a directory that must fill `bytes` exactly.
    pub fn decode_nested(
        bytes: &[u8],
        scope: &ReadScope<'_>,
        owner: Option<EntryInfo<'_>>,
    ) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let dir = Self::read(&mut reader, scope, owner)?;
        if !reader.is_empty() {
            return Err(MiloError::invalid_format(format!(
                "directory '{}' left {} bytes unread",
                dir.name,
                reader.remaining()
            )));
        }
        Ok(dir)
    }

    /// Read one directory, recursing into nested and inline directories.
    pub fn read(
        reader: &mut ByteReader<'_>,
        scope: &ReadScope<'_>,
        owner: Option<EntryInfo<'_>>,
    ) -> Result<Self> {
        let endian = scope.endian;
        let revision = reader.read_u32(endian)?;
        if !(MIN_REVISION..=MAX_REVISION).contains(&revision) {
            return Err(MiloError::unsupported_revision("Directory", revision));
        }
        let dir_type = Symbol::read(reader, endian)?;
        let name = Symbol::read(reader, endian)?;
        let mut dir = Self {
            revision,
            dir_type,
            name,
            platform: scope.platform,
            entries: Vec::new(),
            payload: None,
            inline_subdirs: Vec::new(),
        };

        // smallest entry: two empty symbols and a length
        let count = reader.read_count(endian, 12)?;
        debug!(
            name = %dir.name,
            dir_type = %dir.dir_type,
            revision,
            entries = count,
            "reading directory"
        );
        dir.entries.reserve(count);
        let mut seen = HashSet::with_capacity(count);
        for _ in 0..count {
            let entry_type = Symbol::read(reader, endian)?;
            let entry_name = Symbol::read(reader, endian)?;
            let flags = if revision >= FLAGS_REVISION {
                reader.read_u8()?
            } else {
                0
            };
            let len = reader.read_count(endian, 1)?;
            let raw = reader.read_bytes(len)?.to_vec();
            trace!(name = %entry_name, entry_type = %entry_type, flags, len, "entry");
            if !seen.insert(entry_name.clone()) {
                warn!(dir = %dir.name, name = %entry_name, "duplicate entry name in archive");
            }
            let entry = Entry::decode(scope, Some(dir.info()), entry_type, entry_name, flags, raw)?;
            dir.entries.push(entry);
        }

        if revision >= PAYLOAD_REVISION && reader.read_bool()? {
            let len = reader.read_count(endian, 1)?;
            let raw = reader.read_bytes(len)?.to_vec();
            dir.payload = Some(dir.decode_payload(scope, owner, raw)?);
        }

        if revision >= INLINE_REVISION {
            dir.inline_subdirs = Self::read_inline(reader, scope)?;
        }
        Ok(dir)
    }

    fn decode_payload(
        &self,
        scope: &ReadScope<'_>,
        owner: Option<EntryInfo<'_>>,
        raw: Vec<u8>,
    ) -> Result<Payload> {
        let type_name = self.dir_type.as_str();
        if !scope.registry.contains(type_name) {
            trace!(dir = %self.name, dir_type = type_name, "kept unrecognized directory payload");
            return Ok(Payload::unrecognized(raw));
        }
        let mut cx = RecordContext::new(scope.endian, scope.platform).with_parent(self.info());
        if let Some(owner) = owner {
            cx = cx.with_entry(owner);
        }
        match decode_object(scope, type_name, &raw, &cx) {
            Ok(object) => Ok(Payload::parsed(raw, PayloadValue::Object(object))),
            Err(err) if !scope.strict => {
                warn!(
                    dir = %self.name,
                    dir_type = type_name,
                    error = %err,
                    "keeping raw bytes for directory payload that failed to decode"
                );
                Ok(Payload::degraded(raw, err.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    fn read_inline(reader: &mut ByteReader<'_>, scope: &ReadScope<'_>) -> Result<Vec<InlineSubdir>> {
        let endian = scope.endian;
        let dir_count = reader.read_count(endian, 4)?;
        let mut dirs = Vec::with_capacity(dir_count);
        if dir_count > 0 {
            let nested = scope.nested()?;
            for _ in 0..dir_count {
                dirs.push(Self::read(reader, &nested, None)?);
            }
        }

        let name_count = reader.read_count(endian, 4)?;
        check_parallel("file name", dir_count, name_count)?;
        let mut names = Vec::with_capacity(name_count);
        for _ in 0..name_count {
            names.push(Symbol::read(reader, endian)?);
        }

        let ref_count = reader.read_count(endian, 1)?;
        check_parallel("reference type", dir_count, ref_count)?;
        let refs = reader.read_bytes(ref_count)?.to_vec();

        let alt_count = reader.read_count(endian, 1)?;
        check_parallel("alternate reference type", dir_count, alt_count)?;
        let alts = reader.read_bytes(alt_count)?;

        Ok(dirs
            .into_iter()
            .zip(names)
            .zip(refs)
            .zip(alts.iter().copied())
            .map(
                |(((directory, file_name), reference_type), alt_reference_type)| InlineSubdir {
                    directory,
                    file_name,
                    reference_type,
                    alt_reference_type,
                },
            )
            .collect())
    }

    /// Write this directory in the scope's byte order.
    pub fn write(
        &self,
        writer: &mut ByteWriter,
        scope: &WriteScope,
        owner: Option<EntryInfo<'_>>,
    ) -> Result<()> {
        let endian = scope.endian;
        let revision = self.revision;
        if !(MIN_REVISION..=MAX_REVISION).contains(&revision) {
            return Err(MiloError::unsupported_revision("Directory", revision));
        }
        self.check_representable()?;

        writer.write_u32(endian, revision);
        self.dir_type.write(writer, endian)?;
        self.name.write(writer, endian)?;
        writer.write_count(endian, self.entries.len())?;
        for entry in &self.entries {
            entry.entry_type.write(writer, endian)?;
            entry.name.write(writer, endian)?;
            if revision >= FLAGS_REVISION {
                writer.write_u8(entry.flags);
            }
            let cx = RecordContext::new(endian, scope.platform)
                .with_parent(self.info())
                .with_entry(entry.info());
            let bytes = entry.payload.encode(scope, &cx, &entry.name)?;
            writer.write_count(endian, bytes.len())?;
            writer.write_bytes(&bytes);
        }

        if revision >= PAYLOAD_REVISION {
            writer.write_bool(self.payload.is_some());
            if let Some(payload) = &self.payload {
                let mut cx = RecordContext::new(endian, scope.platform).with_parent(self.info());
                if let Some(owner) = owner {
                    cx = cx.with_entry(owner);
                }
                let bytes = payload.encode(scope, &cx, &self.name)?;
                writer.write_count(endian, bytes.len())?;
                writer.write_bytes(&bytes);
            }
        }

        if revision >= INLINE_REVISION {
            writer.write_count(endian, self.inline_subdirs.len())?;
            for sub in &self.inline_subdirs {
                sub.directory.write(writer, scope, None)?;
            }
            writer.write_count(endian, self.inline_subdirs.len())?;
            for sub in &self.inline_subdirs {
                sub.file_name.write(writer, endian)?;
            }
            writer.write_count(endian, self.inline_subdirs.len())?;
            for sub in &self.inline_subdirs {
                writer.write_u8(sub.reference_type);
            }
            writer.write_count(endian, self.inline_subdirs.len())?;
            for sub in &self.inline_subdirs {
                writer.write_u8(sub.alt_reference_type);
            }
        }
        Ok(())
    }

    fn check_representable(&self) -> Result<()> {
        let revision = self.revision;
        if revision < FLAGS_REVISION
            && let Some(entry) = self.entries.iter().find(|entry| entry.flags != 0)
        {
            return Err(MiloError::unrepresentable(format!(
                "flags on entry '{}' in directory revision {revision}",
                entry.name
            )));
        }
        if revision < INLINE_REVISION && !self.inline_subdirs.is_empty() {
            return Err(MiloError::unrepresentable(format!(
                "inline sub-directories in directory revision {revision}"
            )));
        }
        if revision < PAYLOAD_REVISION && self.payload.is_some() {
            return Err(MiloError::unrepresentable(format!(
                "a directory payload in directory revision {revision}"
            )));
        }
        Ok(())
    }
}

fn check_parallel(what: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(MiloError::invalid_format(format!(
            "inline sub-directory {what} count {found} does not match directory count {expected}"
        )));
    }
    Ok(())
}

/// A node visited by [`Directory::walk`].
#[derive(Debug, Clone, Copy)]
pub enum TreeNode<'a> {
    Directory(&'a Directory),
    Entry(&'a Entry),
}

/// Depth-first iterator over a directory tree.
///
/// A directory is followed by its entries; an entry holding a nested
/// directory is followed by that directory, and inline sub-directories come
/// after the entries.
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<(usize, TreeNode<'a>)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, TreeNode<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        match node {
            TreeNode::Directory(dir) => {
                for sub in dir.inline_subdirs.iter().rev() {
                    self.stack
                        .push((depth + 1, TreeNode::Directory(&sub.directory)));
                }
                for entry in dir.entries.iter().rev() {
                    self.stack.push((depth + 1, TreeNode::Entry(entry)));
                }
            }
            TreeNode::Entry(entry) => {
                if let Some(nested) = entry.directory() {
                    self.stack.push((depth + 1, TreeNode::Directory(nested)));
                }
            }
        }
        Some((depth, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{GROUP, OBJECT_DIR};
    use crate::registry::SchemaObject;
    use crate::revision::RevisionPair;

    fn scope(registry: &TypeRegistry, endian: Endian) -> ReadScope<'_> {
        ReadScope::new(registry, endian, Platform::Pc)
    }

    fn write(dir: &Directory, endian: Endian) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        dir.write(&mut writer, &WriteScope::new(endian, endian, Platform::Pc), None)
            .unwrap();
        writer.into_bytes()
    }

    fn read(bytes: &[u8], registry: &TypeRegistry, endian: Endian) -> Directory {
        Directory::decode_nested(bytes, &scope(registry, endian), None).unwrap()
    }

    fn sample() -> Directory {
        let mut dir = Directory::new("ObjectDir", "test");
        dir.add_entry(Entry::opaque("UnknownFutureType", "blob", vec![1, 2, 3]))
            .unwrap();
        let group = SchemaObject::new(&GROUP, RevisionPair::new(14, 0));
        dir.add_entry(Entry::from_object("group.grp", Box::new(group)))
            .unwrap();
        dir
    }

    #[test]
    fn test_roundtrip_and_reread_is_identical() {
        let registry = TypeRegistry::builtin();
        for endian in [Endian::Little, Endian::Big] {
            let bytes = write(&sample(), endian);
            let back = read(&bytes, &registry, endian);
            assert_eq!(back.name, "test");
            assert_eq!(back.len(), 2);
            assert!(back.entry("blob").unwrap().payload.is_raw_only());
            assert!(back.entry("group.grp").unwrap().object().is_some());
            assert_eq!(write(&back, endian), bytes);
        }
    }

    #[test]
    fn test_duplicate_and_missing_names() {
        let mut dir = sample();
        let err = dir
            .add_entry(Entry::opaque("X", "blob", Vec::new()))
            .unwrap_err();
        assert!(matches!(err, MiloError::DuplicateEntry { .. }));
        assert!(matches!(
            dir.rename_entry("blob", "group.grp").unwrap_err(),
            MiloError::DuplicateEntry { .. }
        ));
        assert!(matches!(
            dir.remove_entry("nope").unwrap_err(),
            MiloError::EntryNotFound { .. }
        ));
        dir.rename_entry("blob", "blob").unwrap();
    }

    #[test]
    fn test_duplicate_entry_follows_original() {
        let mut dir = sample();
        dir.duplicate_entry("blob", "blob2").unwrap();
        let names: Vec<&str> = dir.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["blob", "blob2", "group.grp"]);
    }

    #[test]
    fn test_replace_rolls_back() {
        let registry = TypeRegistry::builtin();
        let scope = scope(&registry, Endian::Little);
        let mut dir = read(&write(&sample(), Endian::Little), &registry, Endian::Little);
        let before = dir.entry("group.grp").unwrap().payload.raw().to_vec();

        let err = dir
            .replace_entry_bytes(&scope, "group.grp", vec![0xFF; 3])
            .unwrap_err();
        assert!(matches!(err, MiloError::ReplaceFailed { .. }));
        let entry = dir.entry("group.grp").unwrap();
        assert_eq!(entry.payload.raw(), before.as_slice());
        assert!(entry.object().is_some());

        dir.replace_entry_bytes(&scope, "blob", vec![9]).unwrap();
        assert_eq!(dir.entry("blob").unwrap().payload.raw(), &[9]);
    }

    #[test]
    fn test_inline_subdirs_roundtrip() {
        let registry = TypeRegistry::builtin();
        let mut dir = sample();
        let mut child = Directory::new("ObjectDir", "child");
        child
            .add_entry(Entry::opaque("UnknownFutureType", "inner", vec![7]))
            .unwrap();
        let mut sub = InlineSubdir::new(child, "child.milo");
        sub.reference_type = 2;
        sub.alt_reference_type = 3;
        dir.add_inline_subdir(sub);

        let bytes = write(&dir, Endian::Big);
        let back = read(&bytes, &registry, Endian::Big);
        let sub = &back.inline_subdirs()[0];
        assert_eq!(sub.file_name, "child.milo");
        assert_eq!((sub.reference_type, sub.alt_reference_type), (2, 3));
        assert!(back.find("inner").is_some());
        assert_eq!(write(&back, Endian::Big), bytes);
    }

    #[test]
    fn test_failed_entry_degrades_and_siblings_decode() {
        let registry = TypeRegistry::builtin();
        let mut dir = sample();
        let mut raw = 99u32.to_le_bytes().to_vec();
        raw.extend_from_slice(&[0xAB; 12]);
        dir.add_entry(Entry::opaque("Tex", "bad.tex", raw.clone()))
            .unwrap();
        let bytes = write(&dir, Endian::Little);

        let back = read(&bytes, &registry, Endian::Little);
        let bad = back.entry("bad.tex").unwrap();
        assert!(bad.payload.is_raw_only());
        assert!(bad.payload.error().is_some());
        assert_eq!(bad.payload.raw(), raw.as_slice());
        assert!(back.entry("group.grp").unwrap().object().is_some());
        assert!(back.entry("blob").unwrap().payload.is_raw_only());
        assert_eq!(write(&back, Endian::Little), bytes);

        let mut strict = scope(&registry, Endian::Little);
        strict.strict = true;
        assert!(Directory::decode_nested(&bytes, &strict, None).is_err());
    }

    #[test]
    fn test_truncated_entry_aborts_read() {
        let registry = TypeRegistry::builtin();
        let bytes = write(&sample(), Endian::Little);
        let name_at = bytes
            .windows(4)
            .position(|window| window == b"blob")
            .unwrap();
        // name, flags, then the length prefix
        let len_at = name_at + 4 + 1;

        for cut in [len_at + 2, len_at + 5] {
            let err = Directory::decode_nested(
                &bytes[..cut],
                &scope(&registry, Endian::Little),
                None,
            )
            .unwrap_err();
            assert!(matches!(err, MiloError::TruncatedStream { .. }), "{cut}");
        }

        let mut long = bytes.clone();
        long[len_at..len_at + 4].copy_from_slice(&0xFFFFu32.to_le_bytes());
        let err = Directory::decode_nested(&long, &scope(&registry, Endian::Little), None)
            .unwrap_err();
        assert!(matches!(err, MiloError::TruncatedStream { .. }));
    }

    #[test]
    fn test_duplicate_names_in_archive_are_kept() {
        let registry = TypeRegistry::builtin();
        let mut dir = Directory::new("ObjectDir", "dups");
        dir.entries
            .push(Entry::opaque("UnknownFutureType", "same", vec![1]));
        dir.entries
            .push(Entry::opaque("UnknownFutureType", "same", vec![2]));
        let bytes = write(&dir, Endian::Big);

        let back = read(&bytes, &registry, Endian::Big);
        let raws: Vec<&[u8]> = back.entries().iter().map(|e| e.payload.raw()).collect();
        assert_eq!(raws, vec![&[1u8][..], &[2u8][..]]);
        assert_eq!(write(&back, Endian::Big), bytes);
    }

    #[test]
    fn test_remove_inline_subdir_keeps_lists_aligned() {
        let registry = TypeRegistry::builtin();
        let mut dir = Directory::new("ObjectDir", "test");
        for (name, reference) in [("a.milo", 1), ("b.milo", 2)] {
            let mut sub = InlineSubdir::new(Directory::new("ObjectDir", name), name);
            sub.reference_type = reference;
            sub.alt_reference_type = reference + 10;
            dir.add_inline_subdir(sub);
        }
        let both = write(&dir, Endian::Little);

        let removed = dir.remove_inline_subdir("b.milo").unwrap();
        assert_eq!(removed.reference_type, 2);
        assert!(matches!(
            dir.remove_inline_subdir("b.milo").unwrap_err(),
            MiloError::EntryNotFound { .. }
        ));

        let back = read(&write(&dir, Endian::Little), &registry, Endian::Little);
        let subs = back.inline_subdirs();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].file_name, "a.milo");
        assert_eq!((subs[0].reference_type, subs[0].alt_reference_type), (1, 11));

        dir.add_inline_subdir(removed);
        assert_eq!(write(&dir, Endian::Little), both);
    }

    #[test]
    fn test_inline_count_mismatch() {
        let mut dir = Directory::new("ObjectDir", "test");
        dir.add_inline_subdir(InlineSubdir::new(Directory::new("ObjectDir", "a"), "a"));
        let mut bytes = write(&dir, Endian::Little);
        // last count prefix is four bytes before the final alt reference byte
        let at = bytes.len() - 5;
        bytes[at] = 2;
        bytes.push(0);
        let registry = TypeRegistry::builtin();
        let err = Directory::decode_nested(&bytes, &scope(&registry, Endian::Little), None)
            .unwrap_err();
        assert!(matches!(err, MiloError::InvalidFormat { .. }));
    }

    #[test]
    fn test_unrepresentable_in_old_revision() {
        let mut dir = sample();
        dir.revision = 26;
        dir.add_inline_subdir(InlineSubdir::new(Directory::new("ObjectDir", "a"), "a"));
        let mut writer = ByteWriter::new();
        let scope = WriteScope::new(Endian::Little, Endian::Little, Platform::Pc);
        let err = dir.write(&mut writer, &scope, None).unwrap_err();
        assert!(matches!(err, MiloError::Unrepresentable { .. }));
    }

    #[test]
    fn test_old_revision_without_flags() {
        let registry = TypeRegistry::builtin();
        let mut dir = sample();
        dir.revision = 24;
        let bytes = write(&dir, Endian::Little);
        let back = read(&bytes, &registry, Endian::Little);
        assert_eq!(back.revision, 24);
        assert!(back.inline_subdirs().is_empty());
        assert_eq!(write(&back, Endian::Little), bytes);
    }

    #[test]
    fn test_nested_directory_entry_and_payload() {
        let registry = TypeRegistry::builtin();
        let mut inner = Directory::new("ObjectDir", "inner");
        inner.set_payload_object(Box::new(SchemaObject::new(
            &OBJECT_DIR,
            RevisionPair::new(22, 0),
        )));
        inner
            .add_entry(Entry::opaque("UnknownFutureType", "deep", vec![5; 5]))
            .unwrap();
        let mut outer = Directory::new("ObjectDir", "outer");
        outer
            .add_entry(Entry::from_directory("ObjectDir", "inner.milo", inner))
            .unwrap();

        let bytes = write(&outer, Endian::Big);
        let back = read(&bytes, &registry, Endian::Big);
        let nested = back.entry("inner.milo").unwrap().directory().unwrap();
        assert!(nested.payload().unwrap().object().is_some());
        assert_eq!(back.find("deep").unwrap().payload.raw(), &[5; 5]);

        let nodes: Vec<(usize, String)> = back
            .walk()
            .map(|(depth, node)| match node {
                TreeNode::Directory(dir) => (depth, dir.name.to_string()),
                TreeNode::Entry(entry) => (depth, entry.name.to_string()),
            })
            .collect();
        assert_eq!(
            nodes,
            vec![
                (0, "outer".to_string()),
                (1, "inner.milo".to_string()),
                (2, "inner".to_string()),
                (3, "deep".to_string()),
            ]
        );
    }

    #[test]
    fn test_find_mut_edits_nested_entry() {
        let registry = TypeRegistry::builtin();
        let mut inner = Directory::new("ObjectDir", "inner");
        let group = SchemaObject::new(&GROUP, RevisionPair::new(12, 0));
        inner
            .add_entry(Entry::from_object("g", Box::new(group)))
            .unwrap();
        let mut outer = Directory::new("ObjectDir", "outer");
        outer
            .add_entry(Entry::from_directory("ObjectDir", "inner.milo", inner))
            .unwrap();
        let mut back = read(&write(&outer, Endian::Little), &registry, Endian::Little);
        assert!(!back.is_dirty());

        let entry = back.find_mut("g").unwrap();
        entry.name = Symbol::new("g2");
        let entry = back.find_mut("g2").unwrap();
        entry
            .object_mut()
            .unwrap()
            .record_mut()
            .unwrap()
            .set("lod_screen_size", 2.5f32);
        assert!(back.is_dirty());
        let again = read(&write(&back, Endian::Little), &registry, Endian::Little);
        let record = again.find("g2").unwrap().object().unwrap().record().unwrap();
        assert_eq!(record.f32("lod_screen_size"), Some(2.5));
    }

    #[test]
    fn test_depth_limit() {
        let registry = TypeRegistry::builtin();
        let mut scope = scope(&registry, Endian::Little);
        for _ in 1..MAX_DEPTH {
            scope = scope.nested().unwrap();
        }
        assert!(scope.nested().is_err());
    }
}
