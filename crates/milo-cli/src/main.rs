//! Milo archive tool.

use std::io::{self, IsTerminal};

use clap::{ColorChoice, Parser};
use milo_cli::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use milo_cli::commands::{run_extract, run_info, run_repack, run_tree, run_types, run_verify};
use milo_cli::config::Config;
use milo_cli::logging::{LogConfig, LogFormat, init_logging};
use tracing::level_filters::LevelFilter;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error:#}");
            std::process::exit(2);
        }
    };
    let result = match &cli.command {
        Command::Info(args) => run_info(args, &config).map(|()| 0),
        Command::Tree(args) => run_tree(args, &config).map(|()| 0),
        Command::Verify(args) => run_verify(args, &config).map(|report| {
            println!("sha256: {}", report.sha256);
            match report.first_difference {
                None => {
                    println!("ok: {} bytes re-serialize identically", report.payload_len);
                    0
                }
                Some(offset) => {
                    println!(
                        "mismatch at offset {offset:#x} ({} bytes read, {} written)",
                        report.payload_len, report.rewritten_len
                    );
                    1
                }
            }
        }),
        Command::Repack(args) => run_repack(args, &config).map(|path| {
            println!("wrote {}", path.display());
            0
        }),
        Command::Extract(args) => run_extract(args, &config).map(|len| {
            println!("wrote {len} bytes to {}", args.output.display());
            0
        }),
        Command::Types => {
            run_types();
            Ok(0)
        }
    };
    let exit_code = match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
