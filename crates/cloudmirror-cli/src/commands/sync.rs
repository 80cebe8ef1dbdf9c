//! Sync command - Reconcile a local folder with the blob store
//!
//! Provides the `cloudmirror sync` CLI command which:
//! 1. Applies command-line overrides to the loaded configuration
//! 2. Opens the directory-backed blob store and its index
//! 3. Runs the SyncEngine, cancelling it on Ctrl-C
//! 4. Prints the key to locator mapping and a summary

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use cloudmirror_core::config::{Config, ConfigBuilder, Direction};
use cloudmirror_store::{BlobIndexStore, DirectoryBlobStore};
use cloudmirror_sync::{LocalFileSystemAdapter, SyncEngine, SyncOptions, SyncReport, Transport};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::output::{get_formatter, plural, OutputFormat, OutputFormatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    /// Local tree is authoritative
    Push,
    /// Blob store and index are authoritative
    Pull,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Push => Direction::Push,
            DirectionArg::Pull => Direction::Pull,
        }
    }
}

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Local directory to mirror [default: sync.local_root, else "."]
    pub local_root: Option<PathBuf>,

    /// Index folder the local directory maps to, "/"-delimited [default: sync.scope_root, else "."]
    pub scope_root: Option<String>,

    /// Which side is authoritative
    #[arg(long, value_enum)]
    pub direction: Option<DirectionArg>,

    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Directory backing the blob store
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Seconds before a single store request is abandoned
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl SyncCommand {
    /// Configuration with this command's flags applied on top
    fn effective_config(&self, config: Config) -> Config {
        let mut builder = ConfigBuilder::from_config(config);
        if let Some(root) = &self.local_root {
            builder = builder.sync_local_root(root.clone());
        }
        if let Some(scope) = &self.scope_root {
            builder = builder.sync_scope_root(scope.clone());
        }
        if let Some(direction) = self.direction {
            builder = builder.sync_direction(direction.into());
        }
        if self.dry_run {
            builder = builder.sync_dry_run(true);
        }
        if let Some(store) = &self.store {
            builder = builder.store_root(store.clone());
        }
        if let Some(timeout) = self.timeout {
            builder = builder.transport_timeout_secs(timeout);
        }
        builder.build()
    }

    /// Wires up the adapters, runs the engine and displays the results.
    pub async fn execute(&self, format: OutputFormat, config: Config) -> Result<()> {
        let formatter = get_formatter(format);
        let config = self.effective_config(config);

        let errors = config.validate();
        if !errors.is_empty() {
            for error in &errors {
                formatter.error(&error.to_string());
            }
            anyhow::bail!(
                "invalid configuration ({} error{})",
                errors.len(),
                plural(errors.len())
            );
        }

        let local_root = tokio::fs::canonicalize(&config.sync.local_root)
            .await
            .with_context(|| {
                format!(
                    "Failed to resolve local root {}",
                    config.sync.local_root.display()
                )
            })?;

        let blob_store = Arc::new(
            DirectoryBlobStore::open(
                config.store.root.clone(),
                config.store.locator_base_url.clone(),
            )
            .await
            .with_context(|| format!("Failed to open blob store {}", config.store.root.display()))?,
        );
        let index_store = Arc::new(BlobIndexStore::from_config(
            blob_store.clone(),
            &config.store,
        ));

        info!(
            local_root = %local_root.display(),
            scope = %config.sync.scope_root,
            store = %config.store.root.display(),
            direction = %config.sync.direction,
            dry_run = config.sync.dry_run,
            "Starting synchronization"
        );
        if config.sync.dry_run {
            formatter.info("Dry run mode - no changes will be made");
        }

        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling");
                    cancel.cancel();
                }
            })
        };

        let engine = SyncEngine::new(
            blob_store,
            index_store,
            Arc::new(LocalFileSystemAdapter::new()),
            Transport::new(Duration::from_secs(config.transport.timeout_secs), cancel),
            SyncOptions::from_config(&config, local_root),
        );

        let result = engine.run().await;
        interrupt.abort();
        let report = result.context("Synchronization failed")?;

        match format {
            OutputFormat::Json => formatter.print_json(&report_json(&report)),
            OutputFormat::Human => print_human(formatter.as_ref(), &report),
        }

        Ok(())
    }
}

/// One `key;locator` line per index entry
fn mapping_lines(report: &SyncReport) -> impl Iterator<Item = String> + '_ {
    report
        .mapping
        .iter()
        .map(|(key, locator)| format!("{key};{locator}"))
}

fn report_json(report: &SyncReport) -> serde_json::Value {
    let mapping: Vec<serde_json::Value> = report
        .mapping
        .iter()
        .map(|(key, locator)| serde_json::json!({"key": key.to_string(), "locator": locator.as_str()}))
        .collect();

    serde_json::json!({
        "dry_run": report.dry_run,
        "uploaded": report.uploaded,
        "downloaded": report.downloaded,
        "removed": report.removed,
        "moved": report.moved,
        "skipped": report.skipped,
        "errors": report.errors,
        "duration_ms": report.duration_ms,
        "mapping": mapping,
    })
}

fn format_duration(duration_ms: u64) -> String {
    if duration_ms >= 1000 {
        format!("{:.1}s", duration_ms as f64 / 1000.0)
    } else {
        format!("{}ms", duration_ms)
    }
}

fn print_human(formatter: &dyn OutputFormatter, report: &SyncReport) {
    for line in mapping_lines(report) {
        formatter.line(&line);
    }

    if report.actions() == 0 && report.errors.is_empty() {
        formatter.success("Already up to date");
    } else {
        formatter.success(&format!(
            "Sync completed in {}",
            format_duration(report.duration_ms)
        ));
    }

    for (label, count) in [
        ("Uploaded:  ", report.uploaded),
        ("Downloaded:", report.downloaded),
        ("Moved:     ", report.moved),
        ("Removed:   ", report.removed),
        ("Skipped:   ", report.skipped),
    ] {
        if count > 0 {
            formatter.info(&format!(
                "{label} {count} file{}",
                plural(count as usize)
            ));
        }
    }

    if !report.errors.is_empty() {
        formatter.error(&format!(
            "{} error{} occurred:",
            report.errors.len(),
            plural(report.errors.len())
        ));
        for err in &report.errors {
            formatter.info(&format!("  - {}", err));
        }
    }
}
