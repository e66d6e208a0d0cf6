//! Endian-aware byte stream primitives.
//!
//! Every multi-byte read and write takes the byte order as an argument. The
//! declared order of the stream is threaded through the callers; nothing here
//! looks at the host machine's byte order.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{MiloError, Result};

/// Byte order of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    /// Least significant byte first (PS2, PC).
    #[default]
    Little,
    /// Most significant byte first (Xbox 360, PS3, Wii, GameCube).
    Big,
}

impl Endian {
    /// Tag stored in the file header.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Little => 0,
            Self::Big => 1,
        }
    }

    /// Parse a header tag.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Little),
            1 => Some(Self::Big),
            _ => None,
        }
    }
}

impl std::fmt::Display for Endian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Little => write!(f, "little"),
            Self::Big => write!(f, "big"),
        }
    }
}

impl std::str::FromStr for Endian {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "little" | "le" => Ok(Self::Little),
            "big" | "be" => Ok(Self::Big),
            _ => Err(format!("unknown byte order '{s}'")),
        }
    }
}

macro_rules! read_primitive {
    ($name:ident, $ty:ty, $size:expr, $fn:ident) => {
        pub fn $name(&mut self, endian: Endian) -> Result<$ty> {
            let bytes = self.read_bytes($size)?;
            Ok(match endian {
                Endian::Big => BigEndian::$fn(bytes),
                Endian::Little => LittleEndian::$fn(bytes),
            })
        }
    };
}

macro_rules! write_primitive {
    ($name:ident, $ty:ty, $size:expr, $fn:ident) => {
        pub fn $name(&mut self, endian: Endian, value: $ty) {
            let mut bytes = [0u8; $size];
            match endian {
                Endian::Big => BigEndian::$fn(&mut bytes, value),
                Endian::Little => LittleEndian::$fn(&mut bytes, value),
            }
            self.buf.extend_from_slice(&bytes);
        }
    };
}

/// Read cursor over an in-memory byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Remaining bytes from current position.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Whether every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Bytes not yet consumed, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    /// Read a slice of `n` bytes without copying.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Read a boolean stored as one byte; any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_primitive!(read_u16, u16, 2, read_u16);
    read_primitive!(read_i16, i16, 2, read_i16);
    read_primitive!(read_u32, u32, 4, read_u32);
    read_primitive!(read_i32, i32, 4, read_i32);
    read_primitive!(read_f32, f32, 4, read_f32);

    /// Read a `u32` length or count and check it against the remaining bytes.
    ///
    /// `min_item_size` is the smallest wire size of one counted item; a count
    /// that cannot possibly fit is rejected before anything is allocated.
    pub fn read_count(&mut self, endian: Endian, min_item_size: usize) -> Result<usize> {
        let offset = self.pos;
        let count = self.read_u32(endian)? as usize;
        let needed = count.saturating_mul(min_item_size);
        if needed > self.remaining() {
            return Err(MiloError::TruncatedStream {
                offset,
                needed,
                available: self.remaining(),
            });
        }
        Ok(count)
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(MiloError::TruncatedStream {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        Ok(())
    }
}

/// Writer that builds a byte buffer.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    write_primitive!(write_u16, u16, 2, write_u16);
    write_primitive!(write_i16, i16, 2, write_i16);
    write_primitive!(write_u32, u32, 4, write_u32);
    write_primitive!(write_i32, i32, 4, write_i32);
    write_primitive!(write_f32, f32, 4, write_f32);

    /// Write a length or count prefix.
    pub fn write_count(&mut self, endian: Endian, count: usize) -> Result<()> {
        let count = u32::try_from(count)
            .map_err(|_| MiloError::unrepresentable(format!("count {count} exceeds u32")))?;
        self.write_u32(endian, count);
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
