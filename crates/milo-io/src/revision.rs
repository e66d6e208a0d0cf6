//! Revision header and standalone sentinel.
//!
//! Every versioned record starts with one 32-bit word holding two 16-bit
//! numbers. The word is decoded in the stream's declared byte order, then
//! split: the low half is `revision`, the high half `alt_revision`.

use crate::error::{MiloError, Result};
use crate::stream::{ByteReader, ByteWriter, Endian};

/// Trailer after a standalone record in a big-endian stream.
pub const SENTINEL_BE: u32 = 0xADDE_ADDE;

/// Trailer after a standalone record in a little-endian stream.
pub const SENTINEL_LE: u32 = 0xDEAD_DEAD;

/// Paired version numbers prefixing a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RevisionPair {
    pub revision: u16,
    pub alt_revision: u16,
}

impl RevisionPair {
    #[must_use]
    pub const fn new(revision: u16, alt_revision: u16) -> Self {
        Self {
            revision,
            alt_revision,
        }
    }

    /// Split a decoded header word.
    #[must_use]
    pub const fn from_word(word: u32) -> Self {
        Self {
            revision: (word & 0xFFFF) as u16,
            alt_revision: (word >> 16) as u16,
        }
    }

    /// Combine into a header word.
    #[must_use]
    pub const fn to_word(self) -> u32 {
        ((self.alt_revision as u32) << 16) | self.revision as u32
    }

    pub fn read(reader: &mut ByteReader<'_>, endian: Endian) -> Result<Self> {
        Ok(Self::from_word(reader.read_u32(endian)?))
    }

    pub fn write(self, writer: &mut ByteWriter, endian: Endian) {
        writer.write_u32(endian, self.to_word());
    }
}

impl std::fmt::Display for RevisionPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.alt_revision == 0 {
            write!(f, "{}", self.revision)
        } else {
            write!(f, "{}.{}", self.revision, self.alt_revision)
        }
    }
}

/// Sentinel value for a stream's declared byte order.
#[must_use]
pub const fn sentinel_for(endian: Endian) -> u32 {
    match endian {
        Endian::Big => SENTINEL_BE,
        Endian::Little => SENTINEL_LE,
    }
}

/// Read and check the trailer of a standalone record.
pub fn read_sentinel(reader: &mut ByteReader<'_>, endian: Endian) -> Result<()> {
    let offset = reader.position();
    let expected = sentinel_for(endian);
    let found = reader.read_u32(endian)?;
    if found != expected {
        return Err(MiloError::SentinelMismatch {
            offset,
            expected,
            found,
        });
    }
    Ok(())
}

pub fn write_sentinel(writer: &mut ByteWriter, endian: Endian) {
    writer.write_u32(endian, sentinel_for(endian));
}
