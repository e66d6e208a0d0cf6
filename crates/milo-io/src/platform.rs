//! Target platforms and their container conventions.

use std::fmt;
use std::str::FromStr;

use crate::compression::Compression;
use crate::stream::Endian;

/// Console or PC the archive was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Platform {
    Ps2,
    Xbox,
    Ps3,
    Wii,
    #[default]
    Pc,
    Gc,
    /// Header tag this library does not know, preserved on save.
    Unknown(u8),
}

impl Platform {
    /// Every known platform, in tag order.
    pub const ALL: [Self; 6] = [
        Self::Ps2,
        Self::Xbox,
        Self::Ps3,
        Self::Wii,
        Self::Pc,
        Self::Gc,
    ];

    #[must_use]
    pub const fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Self::Ps2,
            1 => Self::Xbox,
            2 => Self::Ps3,
            3 => Self::Wii,
            4 => Self::Pc,
            5 => Self::Gc,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Ps2 => 0,
            Self::Xbox => 1,
            Self::Ps3 => 2,
            Self::Wii => 3,
            Self::Pc => 4,
            Self::Gc => 5,
            Self::Unknown(tag) => tag,
        }
    }

    /// Byte order the platform's tools wrote payloads in.
    #[must_use]
    pub const fn native_endian(self) -> Endian {
        match self {
            Self::Ps2 | Self::Pc | Self::Unknown(_) => Endian::Little,
            Self::Xbox | Self::Ps3 | Self::Wii | Self::Gc => Endian::Big,
        }
    }

    #[must_use]
    pub const fn default_compression(self) -> Compression {
        match self {
            Self::Ps2 | Self::Pc | Self::Unknown(_) => Compression::Zlib,
            Self::Xbox | Self::Ps3 | Self::Wii => Compression::ZlibAlt,
            Self::Gc => Compression::Uncompressed,
        }
    }

    /// Whether the platform's loader can read a compressed container.
    #[must_use]
    pub const fn accepts_compressed(self) -> bool {
        !matches!(self, Self::Gc)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ps2 => "ps2",
            Self::Xbox => "xbox",
            Self::Ps3 => "ps3",
            Self::Wii => "wii",
            Self::Pc => "pc",
            Self::Gc => "gc",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(tag) => write!(f, "unknown({tag})"),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|platform| platform.name() == lower)
            .ok_or_else(|| format!("unknown platform '{s}'"))
    }
}
