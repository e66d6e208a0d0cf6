//! Optional TOML configuration.
//!
//! ```toml
//! [read]
//! strict = true
//!
//! [save]
//! compression = "zlib-alt"
//! endian = "big"
//! platform = "wii"
//! start_offset = 0x810
//! ```
//!
//! Command-line flags override anything set here.

use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use milo_io::{Compression, Endian, Platform, ReadOptions, SaveOptions};
use serde::{Deserialize, Deserializer, de};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "MILO_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub read: ReadSection,
    pub save: SaveSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadSection {
    pub strict: bool,
}

/// Defaults applied when repacking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SaveSection {
    #[serde(deserialize_with = "from_name")]
    pub compression: Option<Compression>,
    #[serde(deserialize_with = "from_name")]
    pub endian: Option<Endian>,
    #[serde(deserialize_with = "from_name")]
    pub platform: Option<Platform>,
    pub start_offset: Option<u32>,
}

/// Deserialize a named value through its `FromStr` impl.
fn from_name<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let name = String::deserialize(deserializer)?;
    name.parse().map(Some).map_err(de::Error::custom)
}

impl Config {
    /// Load from `path`, else from `$MILO_CONFIG`, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));
        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read options, with `strict` forced on when the flag is given.
    #[must_use]
    pub fn read_options(&self, strict: bool) -> ReadOptions {
        let options = ReadOptions::new();
        if strict || self.read.strict {
            options.strict()
        } else {
            options
        }
    }

    /// Save options from the `[save]` section.
    #[must_use]
    pub fn save_options(&self) -> SaveOptions {
        let mut options = SaveOptions::new();
        if let Some(compression) = self.save.compression {
            options = options.with_compression(compression);
        }
        if let Some(endian) = self.save.endian {
            options = options.with_endian(endian);
        }
        if let Some(platform) = self.save.platform {
            options = options.with_platform(platform);
        }
        if let Some(offset) = self.save.start_offset {
            options = options.with_start_offset(offset);
        }
        options
    }
}
