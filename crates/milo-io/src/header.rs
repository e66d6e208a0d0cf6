//! File header and block table.
//!
//! The header is little-endian whatever the payload's byte order:
//!
//! ```text
//! u32 magic            compression kind
//! u32 start_offset     first block
//! u32 block_count
//! u32 largest_block
//! u8  endian           0 little, 1 big
//! u8  platform
//! u16 reserved
//! u32 block_sizes[block_count]
//! zero padding up to start_offset
//! ```

use crate::compression::{Block, Compression, STORED_BLOCK_FLAG};
use crate::error::{MiloError, Result};
use crate::platform::Platform;
use crate::stream::{ByteReader, ByteWriter, Endian};

/// Offset of the first block when none is given.
pub const DEFAULT_START_OFFSET: u32 = 0x810;

/// Bytes before the block size table.
pub const FIXED_HEADER_LEN: usize = 20;

/// Parsed file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub compression: Compression,
    pub start_offset: u32,
    pub largest_block: u32,
    pub endian: Endian,
    pub platform: Platform,
    /// Raw entries of the size table, flag bits included.
    pub block_sizes: Vec<u32>,
}

impl FileHeader {
    /// Parse the header at the start of a file and validate it against the
    /// file length.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FIXED_HEADER_LEN {
            return Err(MiloError::invalid_compression_header(format!(
                "file of {} bytes is shorter than the header",
                bytes.len()
            )));
        }
        let le = Endian::Little;
        let mut reader = ByteReader::new(bytes);
        let compression = Compression::from_magic(reader.read_u32(le)?)?;
        let start_offset = reader.read_u32(le)?;
        let block_count = reader.read_u32(le)? as usize;
        let largest_block = reader.read_u32(le)?;
        let endian_tag = reader.read_u8()?;
        let endian = Endian::from_tag(endian_tag).ok_or_else(|| {
            MiloError::invalid_compression_header(format!("unknown endian tag {endian_tag}"))
        })?;
        let platform = Platform::from_tag(reader.read_u8()?);
        let _reserved = reader.read_u16(le)?;

        let table_end = block_count
            .checked_mul(4)
            .and_then(|len| len.checked_add(FIXED_HEADER_LEN))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                MiloError::invalid_compression_header(format!(
                    "block table of {block_count} entries exceeds the file"
                ))
            })?;
        if (start_offset as usize) < table_end || start_offset as usize > bytes.len() {
            return Err(MiloError::invalid_compression_header(format!(
                "start offset {start_offset:#x} outside {table_end:#x}..={:#x}",
                bytes.len()
            )));
        }
        // every block holds at least one byte
        let body_len = bytes.len() - start_offset as usize;
        if block_count > body_len {
            return Err(MiloError::invalid_compression_header(format!(
                "{block_count} blocks cannot fit in {body_len} bytes after the header"
            )));
        }
        let block_sizes = (0..block_count)
            .map(|_| reader.read_u32(le))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            compression,
            start_offset,
            largest_block,
            endian,
            platform,
            block_sizes,
        })
    }

    /// Header length including the size table, before padding.
    #[must_use]
    pub fn table_end(&self) -> usize {
        FIXED_HEADER_LEN + self.block_sizes.len() * 4
    }

    fn block_len(&self, word: u32) -> (usize, bool) {
        if self.compression == Compression::ZlibAlt && word & STORED_BLOCK_FLAG != 0 {
            ((word & !STORED_BLOCK_FLAG) as usize, true)
        } else {
            (word as usize, false)
        }
    }

    /// Slice the encoded blocks out of the file.
    pub fn blocks(&self, bytes: &[u8]) -> Result<Vec<Block>> {
        let mut offset = self.start_offset as usize;
        let mut blocks = Vec::with_capacity(self.block_sizes.len());
        for (index, &word) in self.block_sizes.iter().enumerate() {
            let (len, stored) = self.block_len(word);
            if len == 0 {
                return Err(MiloError::invalid_compression_header(format!(
                    "block {index} is empty"
                )));
            }
            let data = offset
                .checked_add(len)
                .and_then(|end| bytes.get(offset..end))
                .ok_or_else(|| {
                    MiloError::invalid_compression_header(format!(
                        "block {index} of {len} bytes at {offset:#x} exceeds the file"
                    ))
                })?;
            blocks.push(Block {
                data: data.to_vec(),
                stored,
            });
            offset += len;
        }
        Ok(blocks)
    }

    /// Header for a set of encoded blocks.
    pub fn for_blocks(
        compression: Compression,
        start_offset: u32,
        endian: Endian,
        platform: Platform,
        blocks: &[Block],
    ) -> Result<Self> {
        let block_sizes = blocks
            .iter()
            .map(Block::size_word)
            .collect::<Result<Vec<_>>>()?;
        let largest_block = blocks
            .iter()
            .map(|block| block.data.len())
            .max()
            .unwrap_or(0);
        let header = Self {
            compression,
            start_offset,
            largest_block: u32::try_from(largest_block).unwrap_or(u32::MAX),
            endian,
            platform,
            block_sizes,
        };
        if (start_offset as usize) < header.table_end() {
            return Err(MiloError::unrepresentable(format!(
                "start offset {start_offset:#x} leaves no room for {} block sizes",
                blocks.len()
            )));
        }
        Ok(header)
    }

    /// Header bytes, padded with zeros up to the start offset.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let le = Endian::Little;
        let mut writer = ByteWriter::with_capacity(self.start_offset as usize);
        writer.write_u32(le, self.compression.magic());
        writer.write_u32(le, self.start_offset);
        writer.write_u32(le, u32::try_from(self.block_sizes.len()).unwrap_or(u32::MAX));
        writer.write_u32(le, self.largest_block);
        writer.write_u8(self.endian.tag());
        writer.write_u8(self.platform.tag());
        writer.write_u16(le, 0);
        for &size in &self.block_sizes {
            writer.write_u32(le, size);
        }
        let mut bytes = writer.into_bytes();
        bytes.resize(bytes.len().max(self.start_offset as usize), 0);
        bytes
    }
}
