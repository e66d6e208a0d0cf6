//! Milo game-asset archive reader and writer.
//!
//! An archive is a tree of named, typed directories holding named, typed
//! entries. Every entry payload is an independently versioned record. This
//! crate reads and writes archives so that anything read writes back to the
//! same bytes.
//!
//! # Features
//!
//! - Raw, DEFLATE, gzip and size-prefixed DEFLATE containers
//! - Little- and big-endian payloads, with conversion between the two
//! - Declarative per-revision field tables read by one walker
//! - Unknown types and payloads that fail to decode are kept verbatim
//! - Editing: add, rename, duplicate, remove and replace entries
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use milo_io::{MiloFile, SaveOptions};
//!
//! let mut file = MiloFile::open(Path::new("level.milo")).unwrap();
//! file.root.rename_entry("old.tex", "new.tex").unwrap();
//! file.save(&SaveOptions::new().with_path("level_out.milo")).unwrap();
//! ```
//!
//! # Building a tree
//!
//! ```
//! use milo_io::{Directory, Entry, MiloFile, Platform, ReadOptions, SaveOptions};
//!
//! let mut root = Directory::new("ObjectDir", "test");
//! root.add_entry(Entry::opaque("UnknownFutureType", "blob", vec![1, 2, 3])).unwrap();
//! let file = MiloFile::new(root, Platform::Pc);
//!
//! let bytes = file.to_bytes(&SaveOptions::new()).unwrap();
//! let back = MiloFile::from_bytes(&bytes, &ReadOptions::new()).unwrap();
//! assert_eq!(back.root.entry("blob").unwrap().payload.raw(), &[1, 2, 3]);
//! ```

pub mod compression;
mod directory;
mod entry;
mod error;
mod file;
pub mod header;
pub mod objects;
mod options;
mod platform;
pub mod registry;
pub mod revision;
pub mod schema;
mod stream;
mod symbol;

// Re-export error types
pub use error::{MiloError, Result};

// Re-export primitives
pub use platform::Platform;
pub use revision::RevisionPair;
pub use stream::{ByteReader, ByteWriter, Endian};
pub use symbol::Symbol;

// Re-export the container tree
pub use directory::{
    Directory, InlineSubdir, MAX_DEPTH, ReadScope, TreeNode, Walk, WriteScope,
};
pub use entry::{Entry, PROXY_FLAG, Payload, PayloadState, PayloadValue};

// Re-export records and the registry
pub use registry::{
    EntryInfo, MiloObject, OpaqueObject, ParentInfo, RecordContext, SchemaObject, TypeKind,
    TypeRegistry, read_record, write_record,
};

// Re-export file handling
pub use compression::Compression;
pub use file::{MiloFile, inflate, read_milo, write_milo};
pub use options::{ReadOptions, SaveOptions};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
