use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use milo_io::header::FileHeader;
use milo_io::{MiloFile, ReadOptions, SaveOptions, TypeRegistry, inflate};
use sha2::{Digest, Sha256};
use tracing::{debug, info, info_span};

use crate::cli::{ExtractArgs, InfoArgs, OpenArgs, RepackArgs};
use crate::config::Config;
use crate::summary::{ArchiveSummary, render_tree, types_table};

/// Outcome of re-serializing an archive against its own payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub payload_len: usize,
    pub rewritten_len: usize,
    /// Hex SHA-256 of the inflated payload.
    pub sha256: String,
    pub first_difference: Option<usize>,
}

impl VerifyReport {
    #[must_use]
    pub fn matches(&self) -> bool {
        self.first_difference.is_none()
    }
}

fn read_archive(path: &Path, options: &ReadOptions) -> Result<(Vec<u8>, MiloFile)> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut file = MiloFile::from_bytes(&bytes, options)
        .with_context(|| format!("parse {}", path.display()))?;
    file.set_path(path);
    Ok((bytes, file))
}

fn open(args: &OpenArgs, config: &Config) -> Result<(Vec<u8>, MiloFile)> {
    read_archive(&args.file, &config.read_options(args.strict))
}

pub fn run_info(args: &InfoArgs, config: &Config) -> Result<()> {
    let (bytes, file) = open(&args.open, config)?;
    let header = FileHeader::parse(&bytes)?;
    let summary = ArchiveSummary::new(&args.open.file.display().to_string(), &header, &file);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary.to_table());
    }
    Ok(())
}

pub fn run_tree(args: &OpenArgs, config: &Config) -> Result<()> {
    let (_, file) = open(args, config)?;
    print!("{}", render_tree(&file.root));
    Ok(())
}

/// Re-serialize an archive in its own byte order and compare with its payload.
pub fn verify_bytes(bytes: &[u8], options: &ReadOptions) -> Result<VerifyReport> {
    let (_, payload) = inflate(bytes)?;
    let file = MiloFile::from_bytes(bytes, options)?;
    let rewritten = file
        .payload_bytes(&SaveOptions::new())
        .context("re-serialize archive")?;

    let first_difference = payload
        .iter()
        .zip(&rewritten)
        .position(|(a, b)| a != b)
        .or_else(|| (payload.len() != rewritten.len()).then(|| payload.len().min(rewritten.len())));
    Ok(VerifyReport {
        payload_len: payload.len(),
        rewritten_len: rewritten.len(),
        sha256: hex::encode(Sha256::digest(&payload)),
        first_difference,
    })
}

pub fn run_verify(args: &OpenArgs, config: &Config) -> Result<VerifyReport> {
    let span = info_span!("verify", path = %args.file.display());
    let _guard = span.enter();
    let bytes =
        fs::read(&args.file).with_context(|| format!("read {}", args.file.display()))?;
    let report = verify_bytes(&bytes, &config.read_options(args.strict))
        .with_context(|| format!("verify {}", args.file.display()))?;
    debug!(
        payload = report.payload_len,
        rewritten = report.rewritten_len,
        "compared payloads"
    );
    Ok(report)
}

pub fn run_repack(args: &RepackArgs, config: &Config) -> Result<PathBuf> {
    let span = info_span!("repack", input = %args.open.file.display());
    let _guard = span.enter();
    let (_, file) = open(&args.open, config)?;

    let mut options = config.save_options().with_path(&args.output);
    if let Some(compression) = args.compression {
        options = options.with_compression(compression);
    }
    if let Some(endian) = args.endian {
        options = options.with_endian(endian);
    }
    if let Some(platform) = args.platform {
        options = options.with_platform(platform);
    }
    if let Some(offset) = args.start_offset {
        options = options.with_start_offset(offset);
    }
    let path = file
        .save(&options)
        .with_context(|| format!("write {}", args.output.display()))?;
    info!(output = %path.display(), "repacked archive");
    Ok(path)
}

/// Write an entry's captured bytes; returns the byte count.
pub fn run_extract(args: &ExtractArgs, config: &Config) -> Result<usize> {
    let (_, file) = open(&args.open, config)?;
    let entry = file
        .root
        .find(&args.entry)
        .ok_or_else(|| anyhow!("entry '{}' not found in {}", args.entry, args.open.file.display()))?;
    let raw = entry.payload.raw();
    fs::write(&args.output, raw).with_context(|| format!("write {}", args.output.display()))?;
    info!(entry = %entry.name, bytes = raw.len(), output = %args.output.display(), "extracted entry");
    Ok(raw.len())
}

pub fn run_types() {
    println!("{}", types_table(&TypeRegistry::global()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use milo_io::{Directory, Entry, Platform};

    fn archive_bytes() -> Vec<u8> {
        let mut root = Directory::new("ObjectDir", "verify");
        root.add_entry(Entry::opaque("UnknownFutureType", "blob", vec![9; 40]))
            .unwrap();
        MiloFile::new(root, Platform::Xbox)
            .to_bytes(&SaveOptions::new())
            .unwrap()
    }

    #[test]
    fn test_verify_matches() {
        let report = verify_bytes(&archive_bytes(), &ReadOptions::new()).unwrap();
        assert!(report.matches());
        assert_eq!(report.payload_len, report.rewritten_len);
        assert_eq!(report.sha256.len(), 64);
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(verify_bytes(&[0; 8], &ReadOptions::new()).is_err());
    }
}
