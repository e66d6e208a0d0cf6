//! Length-tagged name strings.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{MiloError, Result};
use crate::stream::{ByteReader, ByteWriter, Endian};

/// An identifier used for names, types and cross-references.
///
/// The wire form is a `u32` declared length followed by that many bytes,
/// decoded one byte per character. Trailing NUL bytes are not part of the
/// value but are restored from the declared length on write, so a symbol read
/// from a stream writes back to the same bytes. Equality, ordering and hashing
/// look at the string value only.
#[derive(Clone, Default)]
pub struct Symbol {
    value: String,
    declared_len: u32,
}

impl Symbol {
    /// Create a symbol whose declared length matches its encoded value.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let declared_len = encoded_len(&value);
        Self {
            value,
            declared_len,
        }
    }

    /// Read a symbol, keeping the declared length.
    pub fn read(reader: &mut ByteReader<'_>, endian: Endian) -> Result<Self> {
        let declared_len = reader.read_u32(endian)?;
        let bytes = reader.read_bytes(declared_len as usize)?;
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |idx| idx + 1);
        let value = bytes[..end].iter().map(|&b| char::from(b)).collect();
        Ok(Self {
            value,
            declared_len,
        })
    }

    /// Write the declared length and the value, NUL-padded to that length.
    ///
    /// Fails with `Unrepresentable` when the value holds a character outside
    /// Latin-1.
    pub fn write(&self, writer: &mut ByteWriter, endian: Endian) -> Result<()> {
        let encoded = encode(&self.value)?;
        let declared_len = self.declared_len.max(len_u32(encoded.len()));
        writer.write_u32(endian, declared_len);
        writer.write_bytes(&encoded);
        for _ in encoded.len()..declared_len as usize {
            writer.write_u8(0);
        }
        Ok(())
    }

    /// Whether every character has a one-byte encoding.
    #[must_use]
    pub fn is_encodable(&self) -> bool {
        self.value.chars().all(|ch| u32::from(ch) <= 0xFF)
    }

    /// Fail with `Unrepresentable` unless [`Symbol::is_encodable`].
    pub fn check_encodable(&self) -> Result<()> {
        encode(&self.value).map(|_| ())
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Length written in front of the bytes, which may exceed the value length.
    pub fn declared_len(&self) -> u32 {
        self.declared_len
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Latin-1 encoding.
fn encode(value: &str) -> Result<Vec<u8>> {
    value
        .chars()
        .map(|ch| {
            u8::try_from(u32::from(ch)).map_err(|_| {
                MiloError::unrepresentable(format!(
                    "character {ch:?} in name {value:?} outside Latin-1"
                ))
            })
        })
        .collect()
}

fn encoded_len(value: &str) -> u32 {
    len_u32(value.chars().count())
}

fn len_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Symbol {}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.value == other
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        self.value == *other
    }
}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.value
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.declared_len == encoded_len(&self.value) {
            write!(f, "{:?}", self.value)
        } else {
            write!(f, "{:?}[{}]", self.value, self.declared_len)
        }
    }
}
