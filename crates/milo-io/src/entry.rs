//! Entries and their payload state.

use std::borrow::Cow;

use tracing::{trace, warn};

use crate::directory::{Directory, ReadScope, WriteScope};
use crate::error::{MiloError, Result};
use crate::registry::{EntryInfo, MiloObject, ParentInfo, RecordContext, TypeKind};
use crate::stream::{ByteReader, ByteWriter};
use crate::symbol::Symbol;

/// Entry flag bit marking a proxy.
pub const PROXY_FLAG: u8 = 0x01;

/// Decoded form of a payload.
#[derive(Debug, Clone)]
pub enum PayloadValue {
    Object(Box<dyn MiloObject>),
    Directory(Box<Directory>),
}

impl PayloadValue {
    fn is_dirty(&self) -> bool {
        match self {
            Self::Object(_) => false,
            Self::Directory(dir) => dir.is_dirty(),
        }
    }
}

/// Which representation of a payload is authoritative on write.
#[derive(Debug, Clone)]
pub enum PayloadState {
    /// Only the captured bytes.
    RawOnly,
    /// Decoded from the captured bytes and unchanged since.
    Parsed(PayloadValue),
    /// Edited or built in memory; the value is authoritative.
    Modified(PayloadValue),
}

/// Bytes of a record plus whatever could be decoded from them.
#[derive(Debug, Clone)]
pub struct Payload {
    raw: Vec<u8>,
    recognized: bool,
    error: Option<String>,
    state: PayloadState,
}

impl Payload {
    /// Bytes of a type no codec is registered for.
    #[must_use]
    pub fn unrecognized(raw: Vec<u8>) -> Self {
        Self {
            raw,
            recognized: false,
            error: None,
            state: PayloadState::RawOnly,
        }
    }

    /// Bytes of a known type that failed to decode.
    #[must_use]
    pub fn degraded(raw: Vec<u8>, error: String) -> Self {
        Self {
            raw,
            recognized: true,
            error: Some(error),
            state: PayloadState::RawOnly,
        }
    }

    #[must_use]
    pub fn parsed(raw: Vec<u8>, value: PayloadValue) -> Self {
        Self {
            raw,
            recognized: true,
            error: None,
            state: PayloadState::Parsed(value),
        }
    }

    /// Value built in memory; it has no captured bytes yet.
    #[must_use]
    pub fn modified(value: PayloadValue) -> Self {
        Self {
            raw: Vec::new(),
            recognized: true,
            error: None,
            state: PayloadState::Modified(value),
        }
    }

    /// Bytes captured when the payload was read.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    #[must_use]
    pub fn is_recognized(&self) -> bool {
        self.recognized
    }

    /// Why a recognized payload could not be decoded.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn state(&self) -> &PayloadState {
        &self.state
    }

    #[must_use]
    pub fn value(&self) -> Option<&PayloadValue> {
        match &self.state {
            PayloadState::RawOnly => None,
            PayloadState::Parsed(value) | PayloadState::Modified(value) => Some(value),
        }
    }

    /// Mutable access to the value; marks the payload modified.
    pub fn value_mut(&mut self) -> Option<&mut PayloadValue> {
        let state = std::mem::replace(&mut self.state, PayloadState::RawOnly);
        self.state = match state {
            PayloadState::Parsed(value) | PayloadState::Modified(value) => {
                PayloadState::Modified(value)
            }
            PayloadState::RawOnly => PayloadState::RawOnly,
        };
        match &mut self.state {
            PayloadState::Modified(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the value, not the captured bytes, must be written.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        match &self.state {
            PayloadState::RawOnly => false,
            PayloadState::Parsed(value) => value.is_dirty(),
            PayloadState::Modified(_) => true,
        }
    }

    #[must_use]
    pub fn is_raw_only(&self) -> bool {
        matches!(self.state, PayloadState::RawOnly)
    }

    #[must_use]
    pub fn object(&self) -> Option<&dyn MiloObject> {
        match self.value()? {
            PayloadValue::Object(object) => Some(object.as_ref()),
            PayloadValue::Directory(_) => None,
        }
    }

    #[must_use]
    pub fn directory(&self) -> Option<&Directory> {
        match self.value()? {
            PayloadValue::Directory(dir) => Some(dir),
            PayloadValue::Object(_) => None,
        }
    }

    /// Bytes to emit for this payload under a write scope.
    pub(crate) fn encode(
        &self,
        scope: &WriteScope,
        cx: &RecordContext<'_>,
        name: &Symbol,
    ) -> Result<Cow<'_, [u8]>> {
        let same_order = scope.endian == scope.source_endian;
        match &self.state {
            PayloadState::RawOnly if same_order => Ok(Cow::Borrowed(&self.raw)),
            PayloadState::RawOnly => Err(MiloError::CrossEndianOpaque {
                name: name.to_string(),
            }),
            PayloadState::Parsed(value) if same_order && !value.is_dirty() => {
                Ok(Cow::Borrowed(&self.raw))
            }
            PayloadState::Parsed(value) | PayloadState::Modified(value) => {
                let mut writer = ByteWriter::with_capacity(self.raw.len());
                match value {
                    PayloadValue::Object(object) => object.write(&mut writer, cx)?,
                    PayloadValue::Directory(dir) => dir.write(&mut writer, scope, cx.entry)?,
                }
                Ok(Cow::Owned(writer.into_bytes()))
            }
        }
    }
}

/// One named, typed record inside a directory.
#[derive(Debug, Clone)]
pub struct Entry {
    pub entry_type: Symbol,
    pub name: Symbol,
    /// Bit 0 marks a proxy; other bits are kept as read.
    pub flags: u8,
    pub payload: Payload,
}

impl Entry {
    #[must_use]
    pub fn new(entry_type: impl Into<Symbol>, name: impl Into<Symbol>, payload: Payload) -> Self {
        Self {
            entry_type: entry_type.into(),
            name: name.into(),
            flags: 0,
            payload,
        }
    }

    /// Entry whose bytes are kept without decoding.
    #[must_use]
    pub fn opaque(entry_type: impl Into<Symbol>, name: impl Into<Symbol>, raw: Vec<u8>) -> Self {
        Self::new(entry_type, name, Payload::unrecognized(raw))
    }

    /// Entry holding an object built in memory.
    #[must_use]
    pub fn from_object(name: impl Into<Symbol>, object: Box<dyn MiloObject>) -> Self {
        let entry_type = Symbol::new(object.type_name());
        Self::new(
            entry_type,
            name,
            Payload::modified(PayloadValue::Object(object)),
        )
    }

    /// Entry holding a nested directory built in memory.
    #[must_use]
    pub fn from_directory(
        entry_type: impl Into<Symbol>,
        name: impl Into<Symbol>,
        dir: Directory,
    ) -> Self {
        Self::new(
            entry_type,
            name,
            Payload::modified(PayloadValue::Directory(Box::new(dir))),
        )
    }

    /// Build an entry from a template's bytes.
    ///
    /// The bytes must decode; the resulting entry is marked modified so later
    /// field edits are written.
    pub fn from_template(
        scope: &ReadScope<'_>,
        entry_type: impl Into<Symbol>,
        name: impl Into<Symbol>,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let entry_type = entry_type.into();
        let name = name.into();
        if !scope.registry.contains(entry_type.as_str()) {
            return Err(MiloError::UnrecognizedType {
                type_name: entry_type.to_string(),
            });
        }
        let mut entry = Self::decode(&scope.with_strict(true), None, entry_type, name, 0, bytes)?;
        entry.payload.value_mut();
        Ok(entry)
    }

    #[must_use]
    pub fn is_proxy(&self) -> bool {
        self.flags & PROXY_FLAG != 0
    }

    pub fn set_proxy(&mut self, proxy: bool) {
        if proxy {
            self.flags |= PROXY_FLAG;
        } else {
            self.flags &= !PROXY_FLAG;
        }
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.payload.is_dirty()
    }

    #[must_use]
    pub fn object(&self) -> Option<&dyn MiloObject> {
        self.payload.object()
    }

    /// Typed object for editing; marks the entry modified.
    pub fn object_mut(&mut self) -> Option<&mut dyn MiloObject> {
        if self.payload.object().is_none() {
            return None;
        }
        match self.payload.value_mut()? {
            PayloadValue::Object(object) => Some(object.as_mut()),
            PayloadValue::Directory(_) => None,
        }
    }

    #[must_use]
    pub fn directory(&self) -> Option<&Directory> {
        self.payload.directory()
    }

    /// Nested directory for editing; marks the entry modified.
    pub fn directory_mut(&mut self) -> Option<&mut Directory> {
        if self.payload.directory().is_none() {
            return None;
        }
        match self.payload.value_mut()? {
            PayloadValue::Directory(dir) => Some(dir.as_mut()),
            PayloadValue::Object(_) => None,
        }
    }

    pub(crate) fn info(&self) -> EntryInfo<'_> {
        EntryInfo {
            name: &self.name,
            entry_type: &self.entry_type,
            proxy: self.is_proxy(),
        }
    }

    /// Decode captured bytes according to the registered type.
    ///
    /// Failures inside the byte range keep the bytes and record the error,
    /// unless the scope is strict.
    pub(crate) fn decode(
        scope: &ReadScope<'_>,
        parent: Option<ParentInfo<'_>>,
        entry_type: Symbol,
        name: Symbol,
        flags: u8,
        raw: Vec<u8>,
    ) -> Result<Self> {
        let mut entry = Self {
            entry_type,
            name,
            flags,
            payload: Payload::unrecognized(Vec::new()),
        };
        let Some(kind) = scope.registry.kind(entry.entry_type.as_str()) else {
            trace!(name = %entry.name, entry_type = %entry.entry_type, len = raw.len(), "kept unrecognized entry");
            entry.payload = Payload::unrecognized(raw);
            return Ok(entry);
        };

        let mut cx = RecordContext::new(scope.endian, scope.platform).with_entry(entry.info());
        if let Some(parent) = parent {
            cx = cx.with_parent(parent);
        }
        let decoded = match kind {
            TypeKind::Object => decode_object(scope, entry.entry_type.as_str(), &raw, &cx)
                .map(PayloadValue::Object),
            TypeKind::Directory => scope.nested().and_then(|nested| {
                Directory::decode_nested(&raw, &nested, Some(entry.info()))
                    .map(|dir| PayloadValue::Directory(Box::new(dir)))
            }),
        };
        entry.payload = match decoded {
            Ok(value) => {
                trace!(name = %entry.name, entry_type = %entry.entry_type, "decoded entry");
                Payload::parsed(raw, value)
            }
            Err(err) if !scope.strict => {
                warn!(
                    name = %entry.name,
                    entry_type = %entry.entry_type,
                    error = %err,
                    "keeping raw bytes for entry that failed to decode"
                );
                Payload::degraded(raw, err.to_string())
            }
            Err(err) => return Err(err),
        };
        Ok(entry)
    }
}

/// Read a registered object that must fill `raw` exactly.
pub(crate) fn decode_object(
    scope: &ReadScope<'_>,
    type_name: &str,
    raw: &[u8],
    cx: &RecordContext<'_>,
) -> Result<Box<dyn MiloObject>> {
    let mut object = scope.registry.create(type_name)?;
    let mut reader = ByteReader::new(raw);
    object.read(&mut reader, cx)?;
    if !reader.is_empty() {
        return Err(MiloError::invalid_format(format!(
            "{type_name} left {} of {} bytes unread",
            reader.remaining(),
            raw.len()
        )));
    }
    Ok(object)
}
