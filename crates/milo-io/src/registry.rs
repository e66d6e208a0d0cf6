//! Type registry and the object capability trait.
//!
//! Entries name their payload type with a string. The registry maps that name
//! to a factory producing an empty [`MiloObject`], which then reads itself
//! from the entry's bytes. Types without a registration are kept as raw
//! bytes by the container tree.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::error::{MiloError, Result};
use crate::objects;
use crate::platform::Platform;
use crate::revision::{RevisionPair, read_sentinel, write_sentinel};
use crate::schema::{
    FieldContext, Record, RecordVariant, Schema, read_fields, refresh_derived, write_fields,
};
use crate::stream::{ByteReader, ByteWriter, Endian};
use crate::symbol::Symbol;

/// Directory that holds the record being read or written.
#[derive(Debug, Clone, Copy)]
pub struct ParentInfo<'a> {
    pub name: &'a Symbol,
    pub dir_type: &'a Symbol,
    pub revision: u32,
}

/// Entry that holds the record being read or written.
#[derive(Debug, Clone, Copy)]
pub struct EntryInfo<'a> {
    pub name: &'a Symbol,
    pub entry_type: &'a Symbol,
    pub proxy: bool,
}

/// Everything a record codec may consult besides its own bytes.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    pub endian: Endian,
    /// Followed by the sentinel instead of bounded by an entry length.
    pub standalone: bool,
    pub platform: Platform,
    pub parent: Option<ParentInfo<'a>>,
    pub entry: Option<EntryInfo<'a>>,
}

impl<'a> RecordContext<'a> {
    /// Context for a record nested inside an entry.
    #[must_use]
    pub const fn new(endian: Endian, platform: Platform) -> Self {
        Self {
            endian,
            standalone: false,
            platform,
            parent: None,
            entry: None,
        }
    }

    /// Context for a record serialized on its own, with a sentinel.
    #[must_use]
    pub const fn standalone(endian: Endian) -> Self {
        Self {
            endian,
            standalone: true,
            platform: Platform::Pc,
            parent: None,
            entry: None,
        }
    }

    #[must_use]
    pub const fn with_parent(mut self, parent: ParentInfo<'a>) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub const fn with_entry(mut self, entry: EntryInfo<'a>) -> Self {
        self.entry = Some(entry);
        self
    }

    /// Proxy entries read and write the reduced record.
    #[must_use]
    pub fn variant(&self) -> RecordVariant {
        match self.entry {
            Some(entry) if entry.proxy => RecordVariant::Proxy,
            _ => RecordVariant::Full,
        }
    }
}

/// A typed record that can read and write itself.
pub trait MiloObject: fmt::Debug + Send + Sync {
    /// Registered type name.
    fn type_name(&self) -> &str;

    /// Revision pair of the last read, or the one the object was built with.
    fn revision(&self) -> RevisionPair;

    fn read(&mut self, reader: &mut ByteReader<'_>, cx: &RecordContext<'_>) -> Result<()>;

    fn write(&self, writer: &mut ByteWriter, cx: &RecordContext<'_>) -> Result<()>;

    /// Field values, for types backed by a schema.
    fn record(&self) -> Option<&Record> {
        None
    }

    fn record_mut(&mut self) -> Option<&mut Record> {
        None
    }

    fn clone_box(&self) -> Box<dyn MiloObject>;

    /// Whether the object only carries bytes it does not understand.
    fn is_opaque(&self) -> bool {
        false
    }
}

impl Clone for Box<dyn MiloObject> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Object described by a [`Schema`] and read by the shared walker.
#[derive(Debug, Clone)]
pub struct SchemaObject {
    type_name: &'static str,
    schema: &'static Schema,
    revision: RevisionPair,
    record: Record,
}

impl SchemaObject {
    /// Fresh object at an explicit revision, with zero-valued fields.
    #[must_use]
    pub fn new(schema: &'static Schema, revision: RevisionPair) -> Self {
        Self::named(schema.type_name, schema, revision)
    }

    /// Same as [`SchemaObject::new`] but registered under another name.
    #[must_use]
    pub fn named(type_name: &'static str, schema: &'static Schema, revision: RevisionPair) -> Self {
        let cx = FieldContext::new(Endian::Little, revision.revision);
        Self {
            type_name,
            schema,
            revision,
            record: crate::schema::walker::default_record(schema.fields, &cx),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Switch to another revision, filling fields it adds with zero values.
    pub fn set_revision(&mut self, revision: RevisionPair) -> Result<()> {
        if !self.schema.supports(revision.revision) {
            return Err(MiloError::unsupported_revision(
                self.type_name,
                u32::from(revision.revision),
            ));
        }
        let cx = FieldContext::new(Endian::Little, revision.revision);
        let defaults = crate::schema::walker::default_record(self.schema.fields, &cx);
        for (name, value) in defaults.iter() {
            if !self.record.contains(name) {
                self.record.set(name, value.clone());
            }
        }
        self.revision = revision;
        Ok(())
    }

    fn field_context(&self, revision: u16, cx: &RecordContext<'_>) -> FieldContext {
        FieldContext::new(cx.endian, revision).with_variant(cx.variant())
    }
}

impl MiloObject for SchemaObject {
    fn type_name(&self) -> &str {
        self.type_name
    }

    fn revision(&self) -> RevisionPair {
        self.revision
    }

    fn read(&mut self, reader: &mut ByteReader<'_>, cx: &RecordContext<'_>) -> Result<()> {
        let revision = RevisionPair::read(reader, cx.endian)?;
        if !self.schema.supports(revision.revision) {
            return Err(MiloError::unsupported_revision(
                self.type_name,
                u32::from(revision.revision),
            ));
        }
        let fields = self.field_context(revision.revision, cx);
        let mut record = Record::new();
        read_fields(reader, &fields, self.type_name, self.schema.fields, &mut record)?;
        if cx.standalone {
            read_sentinel(reader, cx.endian)?;
        }
        self.revision = revision;
        self.record = record;
        Ok(())
    }

    fn write(&self, writer: &mut ByteWriter, cx: &RecordContext<'_>) -> Result<()> {
        if !self.schema.supports(self.revision.revision) {
            return Err(MiloError::unsupported_revision(
                self.type_name,
                u32::from(self.revision.revision),
            ));
        }
        let fields = self.field_context(self.revision.revision, cx);
        let mut record = self.record.clone();
        refresh_derived(&fields, self.schema.fields, &mut record);
        self.revision.write(writer, cx.endian);
        write_fields(writer, &fields, self.type_name, self.schema.fields, &record)?;
        if cx.standalone {
            write_sentinel(writer, cx.endian);
        }
        Ok(())
    }

    fn record(&self) -> Option<&Record> {
        Some(&self.record)
    }

    fn record_mut(&mut self) -> Option<&mut Record> {
        Some(&mut self.record)
    }

    fn clone_box(&self) -> Box<dyn MiloObject> {
        Box::new(self.clone())
    }
}

/// Bytes of a type nothing here can decode, re-emitted verbatim.
#[derive(Debug, Clone, Default)]
pub struct OpaqueObject {
    type_name: String,
    bytes: Vec<u8>,
}

impl OpaqueObject {
    #[must_use]
    pub fn new(type_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            bytes,
        }
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl MiloObject for OpaqueObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn revision(&self) -> RevisionPair {
        RevisionPair::default()
    }

    fn read(&mut self, reader: &mut ByteReader<'_>, cx: &RecordContext<'_>) -> Result<()> {
        let body = if cx.standalone {
            reader.remaining().checked_sub(4).ok_or(MiloError::TruncatedStream {
                offset: reader.position(),
                needed: 4,
                available: reader.remaining(),
            })?
        } else {
            reader.remaining()
        };
        self.bytes = reader.read_bytes(body)?.to_vec();
        if cx.standalone {
            read_sentinel(reader, cx.endian)?;
        }
        Ok(())
    }

    fn write(&self, writer: &mut ByteWriter, cx: &RecordContext<'_>) -> Result<()> {
        writer.write_bytes(&self.bytes);
        if cx.standalone {
            write_sentinel(writer, cx.endian);
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn MiloObject> {
        Box::new(self.clone())
    }

    fn is_opaque(&self) -> bool {
        true
    }
}

/// What an entry of a registered type contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// A single record.
    Object,
    /// A nested directory whose own payload is a record of this type.
    Directory,
}

type Factory = Box<dyn Fn() -> Box<dyn MiloObject> + Send + Sync>;

struct Registration {
    factory: Factory,
    kind: TypeKind,
    revisions: &'static [u16],
}

/// Map from type name to codec.
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<String, Registration>,
}

static GLOBAL: LazyLock<Arc<TypeRegistry>> = LazyLock::new(|| Arc::new(TypeRegistry::builtin()));

impl TypeRegistry {
    /// Registry with no types.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in record type.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        objects::register_builtin(&mut registry);
        registry
    }

    /// Shared built-in registry, built on first use.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Register a codec under a name, replacing any previous registration.
    pub fn register<F>(&mut self, type_name: &str, kind: TypeKind, factory: F)
    where
        F: Fn() -> Box<dyn MiloObject> + Send + Sync + 'static,
    {
        self.types.insert(
            type_name.to_string(),
            Registration {
                factory: Box::new(factory),
                kind,
                revisions: &[],
            },
        );
    }

    /// Register a schema under its own type name.
    pub fn register_schema(&mut self, schema: &'static Schema, kind: TypeKind) {
        self.register_schema_as(schema.type_name, schema, kind);
    }

    /// Register a schema under an alias.
    pub fn register_schema_as(
        &mut self,
        type_name: &'static str,
        schema: &'static Schema,
        kind: TypeKind,
    ) {
        let revision = RevisionPair::new(schema.latest_revision(), 0);
        self.types.insert(
            type_name.to_string(),
            Registration {
                factory: Box::new(move || Box::new(SchemaObject::named(type_name, schema, revision))),
                kind,
                revisions: schema.revisions,
            },
        );
    }

    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    #[must_use]
    pub fn kind(&self, type_name: &str) -> Option<TypeKind> {
        self.types.get(type_name).map(|reg| reg.kind)
    }

    #[must_use]
    pub fn is_directory_type(&self, type_name: &str) -> bool {
        self.kind(type_name) == Some(TypeKind::Directory)
    }

    /// Fresh object for a type name.
    pub fn create(&self, type_name: &str) -> Result<Box<dyn MiloObject>> {
        self.types
            .get(type_name)
            .map(|reg| (reg.factory)())
            .ok_or_else(|| MiloError::UnrecognizedType {
                type_name: type_name.to_string(),
            })
    }

    /// Revisions a schema-backed type declares; empty for custom codecs.
    #[must_use]
    pub fn revisions(&self, type_name: &str) -> &'static [u16] {
        self.types.get(type_name).map_or(&[], |reg| reg.revisions)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

/// Serialize one object on its own, followed by the sentinel.
pub fn write_record(object: &dyn MiloObject, endian: Endian) -> Result<Vec<u8>> {
    let mut writer = ByteWriter::new();
    object.write(&mut writer, &RecordContext::standalone(endian))?;
    Ok(writer.into_bytes())
}

/// Read a standalone object of a registered type.
///
/// Every byte must be consumed, the sentinel included.
pub fn read_record(
    registry: &TypeRegistry,
    type_name: &str,
    bytes: &[u8],
    endian: Endian,
) -> Result<Box<dyn MiloObject>> {
    let mut object = registry.create(type_name)?;
    let mut reader = ByteReader::new(bytes);
    object.read(&mut reader, &RecordContext::standalone(endian))?;
    if !reader.is_empty() {
        return Err(MiloError::invalid_format(format!(
            "{} trailing bytes after standalone {type_name}",
            reader.remaining()
        )));
    }
    Ok(object)
}
