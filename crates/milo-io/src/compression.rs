//! Container compression.
//!
//! The payload after the file header is a sequence of blocks, each holding up
//! to [`BLOCK_SIZE`] bytes of the uncompressed stream. The header's magic word
//! selects how every block is encoded.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use flate2::Compression as Level;
use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};
use tracing::trace;

use crate::error::{MiloError, Result};

/// Uncompressed bytes held by one block.
pub const BLOCK_SIZE: usize = 0x1_0000;

/// Set in a [`Compression::ZlibAlt`] block size when the block is stored raw.
pub const STORED_BLOCK_FLAG: u32 = 0x0100_0000;

/// Block encoding of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    Uncompressed,
    /// Raw DEFLATE blocks.
    Zlib,
    /// One gzip member per block.
    Gzip,
    /// Uncompressed size (`u32` little-endian) followed by raw DEFLATE.
    ZlibAlt,
}

impl Compression {
    pub const ALL: [Self; 4] = [Self::Uncompressed, Self::Zlib, Self::Gzip, Self::ZlibAlt];

    /// Little-endian magic word at the start of the file.
    #[must_use]
    pub const fn magic(self) -> u32 {
        match self {
            Self::Uncompressed => 0xCABE_DEAF,
            Self::Zlib => 0xCBBE_DEAF,
            Self::Gzip => 0xCCBE_DEAF,
            Self::ZlibAlt => 0xCDBE_DEAF,
        }
    }

    pub fn from_magic(magic: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.magic() == magic)
            .ok_or_else(|| {
                MiloError::invalid_compression_header(format!("unknown magic {magic:#010x}"))
            })
    }

    #[must_use]
    pub const fn is_compressed(self) -> bool {
        !matches!(self, Self::Uncompressed)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uncompressed => "uncompressed",
            Self::Zlib => "zlib",
            Self::Gzip => "gzip",
            Self::ZlibAlt => "zlib-alt",
        }
    }

    /// Split an uncompressed stream into encoded blocks.
    pub fn deflate(self, payload: &[u8]) -> Result<Vec<Block>> {
        payload
            .chunks(BLOCK_SIZE)
            .map(|chunk| self.encode_block(chunk))
            .collect()
    }

    /// Decode blocks and join them into the uncompressed stream.
    pub fn inflate(self, blocks: &[Block]) -> Result<Vec<u8>> {
        // grows with the data; the block count alone is not trusted
        let mut out = Vec::new();
        for (index, block) in blocks.iter().enumerate() {
            let before = out.len();
            self.decode_block(block, &mut out)
                .map_err(|message| MiloError::CorruptBlock { index, message })?;
            trace!(
                index,
                encoded = block.data.len(),
                decoded = out.len() - before,
                "inflated block"
            );
        }
        Ok(out)
    }

    fn encode_block(self, chunk: &[u8]) -> Result<Block> {
        let block = match self {
            Self::Uncompressed => Block::raw(chunk.to_vec()),
            Self::Zlib => Block::raw(deflate_raw(chunk)?),
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Level::default());
                encoder.write_all(chunk)?;
                Block::raw(encoder.finish()?)
            }
            Self::ZlibAlt => {
                let compressed = deflate_raw(chunk)?;
                if compressed.len() + 4 >= chunk.len() {
                    Block::stored(chunk.to_vec())
                } else {
                    let mut data = Vec::with_capacity(compressed.len() + 4);
                    data.extend_from_slice(&len_u32(chunk.len()).to_le_bytes());
                    data.extend_from_slice(&compressed);
                    Block::raw(data)
                }
            }
        };
        Ok(block)
    }

    fn decode_block(self, block: &Block, out: &mut Vec<u8>) -> std::result::Result<(), String> {
        match self {
            Self::Uncompressed => out.extend_from_slice(&block.data),
            Self::Zlib => {
                inflate_bounded(DeflateDecoder::new(block.data.as_slice()), out)?;
            }
            Self::Gzip => {
                inflate_bounded(GzDecoder::new(block.data.as_slice()), out)?;
            }
            Self::ZlibAlt if block.stored => {
                if block.data.len() > BLOCK_SIZE {
                    return Err(format!(
                        "stored block of {} bytes exceeds {BLOCK_SIZE}",
                        block.data.len()
                    ));
                }
                out.extend_from_slice(&block.data);
            }
            Self::ZlibAlt => {
                let (size, body) = block
                    .data
                    .split_first_chunk::<4>()
                    .ok_or_else(|| "block shorter than its size prefix".to_string())?;
                let expected = u32::from_le_bytes(*size) as usize;
                if expected > BLOCK_SIZE {
                    return Err(format!(
                        "declared {expected} uncompressed bytes, more than {BLOCK_SIZE}"
                    ));
                }
                let actual = inflate_bounded(DeflateDecoder::new(body), out)?;
                if actual != expected {
                    return Err(format!(
                        "declared {expected} uncompressed bytes, decoded {actual}"
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Inflate one block, refusing output beyond [`BLOCK_SIZE`].
fn inflate_bounded(decoder: impl Read, out: &mut Vec<u8>) -> std::result::Result<usize, String> {
    let before = out.len();
    decoder
        .take(BLOCK_SIZE as u64 + 1)
        .read_to_end(out)
        .map_err(|e| e.to_string())?;
    let decoded = out.len() - before;
    if decoded > BLOCK_SIZE {
        out.truncate(before);
        return Err(format!("block inflates past {BLOCK_SIZE} bytes"));
    }
    Ok(decoded)
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == lower)
            .ok_or_else(|| format!("unknown compression '{s}'"))
    }
}

/// One encoded block as it appears after the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub data: Vec<u8>,
    /// Stored without compression inside a compressed container.
    pub stored: bool,
}

impl Block {
    #[must_use]
    pub fn raw(data: Vec<u8>) -> Self {
        Self {
            data,
            stored: false,
        }
    }

    #[must_use]
    pub fn stored(data: Vec<u8>) -> Self {
        Self { data, stored: true }
    }

    /// Entry for the header's block size table.
    pub fn size_word(&self) -> Result<u32> {
        let len = u32::try_from(self.data.len())
            .ok()
            .filter(|len| len & STORED_BLOCK_FLAG == 0)
            .ok_or_else(|| {
                MiloError::unrepresentable(format!("block of {} bytes", self.data.len()))
            })?;
        Ok(if self.stored {
            len | STORED_BLOCK_FLAG
        } else {
            len
        })
    }
}

fn deflate_raw(chunk: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Level::default());
    encoder.write_all(chunk)?;
    Ok(encoder.finish()?)
}

fn len_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
