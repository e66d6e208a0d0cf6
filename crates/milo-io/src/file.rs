//! Whole-archive open and save.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::compression::Compression;
use crate::directory::{Directory, ReadScope, WriteScope};
use crate::error::{MiloError, Result};
use crate::header::{DEFAULT_START_OFFSET, FileHeader};
use crate::options::{ReadOptions, SaveOptions};
use crate::platform::Platform;
use crate::registry::TypeRegistry;
use crate::revision::{read_sentinel, write_sentinel};
use crate::stream::{ByteReader, ByteWriter, Endian};

/// An archive: the root directory plus the container settings around it.
#[derive(Debug, Clone)]
pub struct MiloFile {
    pub root: Directory,
    pub compression: Compression,
    /// Byte order of the payload as read; captured raw bytes are in this order.
    pub endian: Endian,
    pub platform: Platform,
    pub start_offset: u32,
    trailing_padding: usize,
    path: Option<PathBuf>,
    registry: Arc<TypeRegistry>,
}

impl MiloFile {
    /// New archive using the platform's byte order and compression.
    #[must_use]
    pub fn new(mut root: Directory, platform: Platform) -> Self {
        root.platform = platform;
        Self {
            root,
            compression: platform.default_compression(),
            endian: platform.native_endian(),
            platform,
            start_offset: DEFAULT_START_OFFSET,
            trailing_padding: 0,
            path: None,
            registry: TypeRegistry::global(),
        }
    }

    /// Open an archive from disk.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_options(path, &ReadOptions::default())
    }

    /// Open an archive from disk with options.
    pub fn open_with_options(path: &Path, options: &ReadOptions) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MiloError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                MiloError::Io(e)
            }
        })?;
        let mut file = Self::from_bytes(&bytes, options)?;
        info!(
            path = %path.display(),
            compression = %file.compression,
            endian = %file.endian,
            platform = %file.platform,
            entries = file.root.len(),
            "opened archive"
        );
        file.path = Some(path.to_path_buf());
        Ok(file)
    }

    /// Parse an archive held in memory.
    pub fn from_bytes(bytes: &[u8], options: &ReadOptions) -> Result<Self> {
        let (header, payload) = inflate(bytes)?;
        let registry = options.registry();
        let scope = ReadScope::new(&registry, header.endian, header.platform)
            .with_strict(options.strict);

        let mut reader = ByteReader::new(&payload);
        let root = Directory::read(&mut reader, &scope, None)?;
        read_sentinel(&mut reader, header.endian)?;
        let rest = reader.rest();
        if let Some(offset) = rest.iter().position(|&b| b != 0) {
            return Err(MiloError::invalid_format(format!(
                "non-zero byte after the root directory at offset {}",
                reader.position() + offset
            )));
        }
        let trailing_padding = rest.len();

        Ok(Self {
            root,
            compression: header.compression,
            endian: header.endian,
            platform: header.platform,
            start_offset: header.start_offset,
            trailing_padding,
            path: None,
            registry,
        })
    }

    /// Path the archive was opened from.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    /// Zero bytes that followed the root sentinel.
    #[must_use]
    pub fn trailing_padding(&self) -> usize {
        self.trailing_padding
    }

    /// Registry the archive was decoded with.
    #[must_use]
    pub fn registry(&self) -> Arc<TypeRegistry> {
        Arc::clone(&self.registry)
    }

    /// Scope for decoding new bytes into this archive's tree.
    #[must_use]
    pub fn read_scope(&self) -> ReadScope<'_> {
        ReadScope::new(&self.registry, self.endian, self.platform)
    }

    /// Serialize the tree without compression or header.
    pub fn payload_bytes(&self, options: &SaveOptions) -> Result<Vec<u8>> {
        let endian = options.target_endian.unwrap_or(self.endian);
        let source_endian = options.source_endian.unwrap_or(self.endian);
        let platform = options.platform.unwrap_or(self.platform);
        let scope = WriteScope::new(endian, source_endian, platform);

        let mut writer = ByteWriter::new();
        self.root.write(&mut writer, &scope, None)?;
        write_sentinel(&mut writer, endian);
        let mut bytes = writer.into_bytes();
        bytes.resize(bytes.len() + self.trailing_padding, 0);
        Ok(bytes)
    }

    /// Serialize the whole archive, header included.
    pub fn to_bytes(&self, options: &SaveOptions) -> Result<Vec<u8>> {
        let endian = options.target_endian.unwrap_or(self.endian);
        let platform = options.platform.unwrap_or(self.platform);
        let mut compression = options.compression.unwrap_or(self.compression);
        if compression.is_compressed() && !platform.accepts_compressed() {
            debug!(%platform, %compression, "platform rejects compressed archives, writing uncompressed");
            compression = Compression::Uncompressed;
        }
        let start_offset = options.start_offset.unwrap_or(self.start_offset);

        let payload = self.payload_bytes(options)?;
        let blocks = compression.deflate(&payload)?;
        let header = FileHeader::for_blocks(compression, start_offset, endian, platform, &blocks)?;
        debug!(
            %compression,
            %endian,
            %platform,
            payload = payload.len(),
            blocks = blocks.len(),
            "serialized archive"
        );

        let mut bytes = header.to_bytes();
        for block in &blocks {
            bytes.extend_from_slice(&block.data);
        }
        Ok(bytes)
    }

    /// Write the archive to disk.
    ///
    /// The in-memory tree is left as it was, including its byte order.
    pub fn save(&self, options: &SaveOptions) -> Result<PathBuf> {
        let path = options
            .path
            .clone()
            .or_else(|| self.path.clone())
            .ok_or(MiloError::MissingPath)?;
        let bytes = self.to_bytes(options)?;
        fs::write(&path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "saved archive");
        Ok(path)
    }
}

/// Parse the header and return it with the inflated payload.
pub fn inflate(bytes: &[u8]) -> Result<(FileHeader, Vec<u8>)> {
    let header = FileHeader::parse(bytes)?;
    let blocks = header.blocks(bytes)?;
    let payload = header.compression.inflate(&blocks)?;
    debug!(
        compression = %header.compression,
        blocks = blocks.len(),
        payload = payload.len(),
        "inflated archive"
    );
    Ok((header, payload))
}

/// Open an archive from a path.
pub fn read_milo(path: &Path) -> Result<MiloFile> {
    MiloFile::open(path)
}

/// Save an archive to a path with its current settings.
pub fn write_milo(path: &Path, file: &MiloFile) -> Result<()> {
    file.save(&SaveOptions::new().with_path(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;

    fn sample(platform: Platform) -> MiloFile {
        let mut root = Directory::new("ObjectDir", "root");
        root.add_entry(Entry::opaque("UnknownFutureType", "blob", vec![0x42; 37]))
            .unwrap();
        MiloFile::new(root, platform)
    }

    #[test]
    fn test_platform_defaults() {
        let file = sample(Platform::Wii);
        assert_eq!(file.endian, Endian::Big);
        assert_eq!(file.compression, Compression::ZlibAlt);
        assert_eq!(file.start_offset, DEFAULT_START_OFFSET);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let file = sample(Platform::Ps3);
        let bytes = file.to_bytes(&SaveOptions::new()).unwrap();
        let back = MiloFile::from_bytes(&bytes, &ReadOptions::new()).unwrap();
        assert_eq!(back.platform, Platform::Ps3);
        assert_eq!(back.endian, Endian::Big);
        assert_eq!(back.root.entry("blob").unwrap().payload.raw(), &[0x42; 37]);
        assert_eq!(back.to_bytes(&SaveOptions::new()).unwrap(), bytes);
    }

    #[test]
    fn test_gamecube_forces_uncompressed() {
        let file = sample(Platform::Pc);
        let opts = SaveOptions::new()
            .with_platform(Platform::Gc)
            .with_compression(Compression::Zlib);
        let bytes = file.to_bytes(&opts).unwrap();
        let header = FileHeader::parse(&bytes).unwrap();
        assert_eq!(header.compression, Compression::Uncompressed);
        assert_eq!(header.platform, Platform::Gc);
    }

    #[test]
    fn test_trailing_padding_kept() {
        let file = sample(Platform::Pc);
        let mut payload = file.payload_bytes(&SaveOptions::new()).unwrap();
        payload.extend_from_slice(&[0; 16]);
        let blocks = Compression::Zlib.deflate(&payload).unwrap();
        let header = FileHeader::for_blocks(
            Compression::Zlib,
            DEFAULT_START_OFFSET,
            Endian::Little,
            Platform::Pc,
            &blocks,
        )
        .unwrap();
        let mut bytes = header.to_bytes();
        bytes.extend(blocks.iter().flat_map(|block| block.data.iter().copied()));

        let back = MiloFile::from_bytes(&bytes, &ReadOptions::new()).unwrap();
        assert_eq!(back.trailing_padding(), 16);
        assert_eq!(back.payload_bytes(&SaveOptions::new()).unwrap(), payload);
    }

    #[test]
    fn test_garbage_after_root() {
        let file = sample(Platform::Pc);
        let mut payload = file.payload_bytes(&SaveOptions::new()).unwrap();
        payload.push(1);
        let blocks = Compression::Uncompressed.deflate(&payload).unwrap();
        let header = FileHeader::for_blocks(
            Compression::Uncompressed,
            DEFAULT_START_OFFSET,
            Endian::Little,
            Platform::Pc,
            &blocks,
        )
        .unwrap();
        let mut bytes = header.to_bytes();
        bytes.extend_from_slice(&blocks[0].data);
        let err = MiloFile::from_bytes(&bytes, &ReadOptions::new()).unwrap_err();
        assert!(matches!(err, MiloError::InvalidFormat { .. }));
    }

    #[test]
    fn test_empty_block_table_rejected() {
        let header = FileHeader {
            compression: Compression::Zlib,
            start_offset: 20 + 1_000_000 * 4,
            largest_block: 0,
            endian: Endian::Little,
            platform: Platform::Pc,
            block_sizes: vec![0; 1_000_000],
        };
        let mut bytes = header.to_bytes();
        bytes.extend_from_slice(&[0; 64]);
        let err = MiloFile::from_bytes(&bytes, &ReadOptions::new()).unwrap_err();
        assert!(matches!(err, MiloError::InvalidCompressionHeader { .. }));

        let header = FileHeader {
            start_offset: 28,
            block_sizes: vec![0, 64],
            ..header
        };
        let mut bytes = header.to_bytes();
        bytes.extend_from_slice(&[0; 64]);
        let err = MiloFile::from_bytes(&bytes, &ReadOptions::new()).unwrap_err();
        assert!(matches!(err, MiloError::InvalidCompressionHeader { .. }));
    }

    #[test]
    fn test_save_without_path() {
        let err = sample(Platform::Pc).save(&SaveOptions::new()).unwrap_err();
        assert!(matches!(err, MiloError::MissingPath));
    }

    #[test]
    fn test_open_missing_file() {
        let err = MiloFile::open(Path::new("/nonexistent/archive.milo")).unwrap_err();
        assert!(matches!(err, MiloError::FileNotFound { .. }));
    }
}
