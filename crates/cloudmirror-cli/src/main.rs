//! Cloudmirror CLI - Command-line interface for Cloudmirror
//!
//! Provides commands for:
//! - Reconciling a local tree with the blob store and its index
//! - Viewing, editing and validating configuration
//!
//! Logs go to stderr. In human mode stdout carries only the key to locator
//! mapping, one `key;locator` line per index entry.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cloudmirror_core::config::Config;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{config::ConfigCommand, sync::SyncCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "cloudmirror",
    version,
    about = "Mirror a local folder tree onto a flat blob store"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile a local folder with the blob store and its index
    Sync(SyncCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Filter directive when `RUST_LOG` is not set
    fn log_level<'a>(&self, config: &'a Config) -> &'a str {
        match (self.verbose, self.quiet) {
            (0, true) => "warn",
            (0, false) => config.logging.level.as_str(),
            (1, _) => "debug",
            _ => "trace",
        }
    }
}

/// Load the configuration file
///
/// An explicitly requested file must load; the default location falls back
/// to built-in defaults.
fn load_config(explicit: Option<&Path>) -> Result<(PathBuf, Config)> {
    match explicit {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            Ok((path.to_path_buf(), config))
        }
        None => {
            let path = Config::default_path();
            let config = Config::load_or_default(&path);
            Ok((path, config))
        }
    }
}

fn init_tracing(cli: &Cli, config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level(config)));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match cli.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config_path, config) = load_config(cli.config.as_deref())?;
    init_tracing(&cli, &config);
    debug!(config_path = %config_path.display(), "Configuration resolved");

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(format, config).await,
        Commands::Config(cmd) => cmd.execute(format, &config_path).await,
    }
}
