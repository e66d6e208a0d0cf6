//! CLI argument definitions for the Milo archive tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use milo_io::{Compression, Endian, Platform};

#[derive(Parser)]
#[command(
    name = "milo",
    version,
    about = "Milo archive tool - inspect, verify and repack game-asset archives",
    long_about = "Inspect, verify and repack Milo game-asset archives.\n\n\
                  Archives round-trip byte for byte: anything read writes back to\n\
                  the same bytes unless an edit or an override changes them."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Configuration file (default: $MILO_CONFIG when set).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the header and a summary of the root directory.
    Info(InfoArgs),

    /// List every directory and entry in the archive.
    Tree(OpenArgs),

    /// Check that the archive re-serializes to its own payload.
    Verify(OpenArgs),

    /// Save the archive again, optionally with different settings.
    Repack(RepackArgs),

    /// Write the bytes of one entry to a file.
    Extract(ExtractArgs),

    /// List the registered record types.
    Types,
}

/// Arguments shared by every command that opens an archive.
#[derive(Args)]
pub struct OpenArgs {
    /// Archive to open.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Fail on entries that do not decode instead of keeping their bytes.
    #[arg(long = "strict")]
    pub strict: bool,
}

#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub open: OpenArgs,

    /// Print JSON instead of a table.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Args)]
pub struct RepackArgs {
    #[command(flatten)]
    pub open: OpenArgs,

    /// Output path.
    #[arg(value_name = "OUT")]
    pub output: PathBuf,

    /// Compression kind (uncompressed, zlib, gzip, zlib-alt).
    #[arg(long = "compression")]
    pub compression: Option<Compression>,

    /// Payload byte order (little, big).
    #[arg(long = "endian")]
    pub endian: Option<Endian>,

    /// Target platform (ps2, xbox, ps3, wii, pc, gc).
    #[arg(long = "platform")]
    pub platform: Option<Platform>,

    /// Offset of the first block, decimal or 0x-prefixed hex.
    #[arg(long = "start-offset", value_parser = parse_offset)]
    pub start_offset: Option<u32>,
}

#[derive(Args)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub open: OpenArgs,

    /// Entry name; the first match anywhere in the tree is used.
    #[arg(value_name = "ENTRY")]
    pub entry: String,

    /// File to write the entry's bytes to.
    #[arg(value_name = "OUT")]
    pub output: PathBuf,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

/// Parse a decimal or `0x`-prefixed offset.
pub fn parse_offset(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid offset '{value}': {e}"))
}
