//! Read and save options.

use std::path::PathBuf;
use std::sync::Arc;

use crate::compression::Compression;
use crate::platform::Platform;
use crate::registry::TypeRegistry;
use crate::stream::Endian;

/// Options for opening archives.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Fail when a registered type does not decode instead of keeping its bytes.
    pub strict: bool,
    /// Registry to decode with (default: the global built-in registry).
    pub registry: Option<Arc<TypeRegistry>>,
}

impl ReadOptions {
    /// Create read options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable strict decoding.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Decode with a custom registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Registry to use, falling back to the global one.
    #[must_use]
    pub fn registry(&self) -> Arc<TypeRegistry> {
        self.registry.clone().unwrap_or_else(TypeRegistry::global)
    }
}

/// Options for saving archives.
///
/// Unset fields keep the values the archive was opened with.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Output path (default: the path the archive was opened from).
    pub path: Option<PathBuf>,
    pub compression: Option<Compression>,
    pub start_offset: Option<u32>,
    /// Byte order to write the payload in.
    pub target_endian: Option<Endian>,
    /// Byte order of the captured raw bytes.
    pub source_endian: Option<Endian>,
    pub platform: Option<Platform>,
}

impl SaveOptions {
    /// Create save options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the compression kind.
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Set the offset of the first block.
    #[must_use]
    pub fn with_start_offset(mut self, start_offset: u32) -> Self {
        self.start_offset = Some(start_offset);
        self
    }

    /// Set the payload byte order.
    #[must_use]
    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.target_endian = Some(endian);
        self
    }

    /// Declare the byte order of captured raw bytes.
    #[must_use]
    pub fn with_source_endian(mut self, endian: Endian) -> Self {
        self.source_endian = Some(endian);
        self
    }

    /// Set the target platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }
}
