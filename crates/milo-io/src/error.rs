//! Error types for Milo archive operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when reading or writing Milo archives.
#[derive(Debug, Error)]
pub enum MiloError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// A read needed more bytes than the stream holds.
    #[error("truncated stream at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedStream {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The trailer after a standalone record did not match.
    #[error("sentinel mismatch at offset {offset}: expected {expected:#010x}, found {found:#010x}")]
    SentinelMismatch {
        offset: usize,
        expected: u32,
        found: u32,
    },

    /// A record carries a revision its schema does not declare.
    #[error("unsupported revision {revision} for {type_name}")]
    UnsupportedRevision { type_name: String, revision: u32 },

    /// No codec is registered for a type name.
    #[error("unrecognized type: {type_name}")]
    UnrecognizedType { type_name: String },

    /// Unknown or malformed compression header.
    #[error("invalid compression header: {message}")]
    InvalidCompressionHeader { message: String },

    /// A compressed block failed to decode.
    #[error("corrupt compressed block {index}: {message}")]
    CorruptBlock { index: usize, message: String },

    /// Structural problem in the archive.
    #[error("invalid Milo data: {message}")]
    InvalidFormat { message: String },

    /// A record's fields do not line up with its schema.
    #[error("{type_name}.{field}: {message}")]
    SchemaMismatch {
        type_name: String,
        field: String,
        message: String,
    },

    /// The tree holds data the target revision has no wire slot for.
    #[error("cannot represent {message}")]
    Unrepresentable { message: String },

    /// An opaque entry cannot be re-encoded for a different byte order.
    #[error("entry '{name}' is opaque and cannot be converted to another byte order")]
    CrossEndianOpaque { name: String },

    /// Entry lookup failed.
    #[error("entry not found: {name}")]
    EntryNotFound { name: String },

    /// An entry with the same name already exists in the directory.
    #[error("duplicate entry name: {name}")]
    DuplicateEntry { name: String },

    /// Replacing an entry's bytes failed; the previous state was kept.
    #[error("replacing '{name}' failed, previous contents restored: {source}")]
    ReplaceFailed {
        name: String,
        #[source]
        source: Box<MiloError>,
    },

    /// Save was asked to write a file that has no path.
    #[error("no output path given and the archive was not opened from disk")]
    MissingPath,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Milo operations.
pub type Result<T> = std::result::Result<T, MiloError>;

impl MiloError {
    /// Create an InvalidFormat error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Create an InvalidCompressionHeader error.
    pub fn invalid_compression_header(message: impl Into<String>) -> Self {
        Self::InvalidCompressionHeader {
            message: message.into(),
        }
    }

    /// Create an UnsupportedRevision error.
    pub fn unsupported_revision(type_name: impl Into<String>, revision: u32) -> Self {
        Self::UnsupportedRevision {
            type_name: type_name.into(),
            revision,
        }
    }

    /// Create a SchemaMismatch error.
    pub fn schema_mismatch(
        type_name: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::SchemaMismatch {
            type_name: type_name.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an Unrepresentable error.
    pub fn unrepresentable(message: impl Into<String>) -> Self {
        Self::Unrepresentable {
            message: message.into(),
        }
    }

    /// Create an EntryNotFound error.
    pub fn entry_not_found(name: impl Into<String>) -> Self {
        Self::EntryNotFound { name: name.into() }
    }

    /// Create a DuplicateEntry error.
    pub fn duplicate_entry(name: impl Into<String>) -> Self {
        Self::DuplicateEntry { name: name.into() }
    }

    /// Whether the engine may recover from this error by keeping raw bytes.
    ///
    /// Only an unrecognized type is recoverable everywhere; other errors are
    /// recoverable only when confined to an entry whose length is known.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnrecognizedType { .. })
    }
}
