//! Config command - View and manage Cloudmirror configuration
//!
//! Provides the `cloudmirror config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Prints the configuration file location

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use cloudmirror_core::config::{Config, Direction};
use tracing::info;

use crate::output::{get_formatter, plural, OutputFormat};

/// Keys accepted by `config set`, with a short description
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("sync.local_root", "Local directory to mirror"),
    ("sync.scope_root", "Index folder the local directory maps to"),
    ("sync.direction", "push|pull"),
    ("sync.dry_run", "true|false"),
    ("store.root", "Directory backing the blob store"),
    ("store.locator_base_url", "Base URL of published locators"),
    ("store.index_name", "Object name of the index record"),
    ("store.folder_list_name", "Object name of the folder list"),
    ("store.extra_protected", "Comma-separated extra protected names"),
    ("transport.timeout_secs", "Seconds per store request"),
    ("logging.level", "trace|debug|info|warn|error"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "sync.scope_root")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(format, config_path),
            ConfigCommand::Set { key, value } => {
                self.execute_set(key, value, format, config_path).await
            }
            ConfigCommand::Validate => self.execute_validate(format, config_path),
            ConfigCommand::Path => {
                execute_path(format, config_path);
                Ok(())
            }
        }
    }

    fn execute_show(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let formatter = get_formatter(format);
        let config = Config::load_or_default(config_path);

        info!(config_path = %config_path.display(), "Showing configuration");

        if matches!(format, OutputFormat::Json) {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", config_path.display()));
            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.line(line);
            }
        }

        Ok(())
    }

    async fn execute_set(
        &self,
        key: &str,
        value: &str,
        format: OutputFormat,
        config_path: &Path,
    ) -> Result<()> {
        let formatter = get_formatter(format);
        let mut config = Config::load_or_default(config_path);

        info!(key = %key, value = %value, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if matches!(format, OutputFormat::Json) {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{}': {}", key, e));
                formatter.info("Supported keys:");
                for (name, description) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {name:<24} - {description}"));
                }
            }
            anyhow::bail!("Failed to set '{key}': {e}");
        }

        // The local root may be created later
        let errors: Vec<String> = config
            .validate()
            .iter()
            .filter(|e| e.field != "sync.local_root")
            .map(ToString::to_string)
            .collect();
        if !errors.is_empty() {
            if matches!(format, OutputFormat::Json) {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "errors": errors,
                }));
            } else {
                formatter.error(&format!(
                    "Invalid value for '{}': {}",
                    key,
                    errors.join("; ")
                ));
            }
            anyhow::bail!("Invalid value for '{key}': {}", errors.join("; "));
        }

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create configuration directory")?;
        }
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
        tokio::fs::write(config_path, yaml)
            .await
            .context("Failed to write configuration file")?;

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {} = {}", key, value));
            formatter.info(&format!("Saved to {}", config_path.display()));
        }

        Ok(())
    }

    fn execute_validate(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let formatter = get_formatter(format);
        let json = matches!(format, OutputFormat::Json);

        if !config_path.exists() {
            if json {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": ["Configuration file not found. Using defaults."],
                }));
            } else {
                formatter.info(&format!(
                    "Configuration file not found at {}",
                    config_path.display()
                ));
                formatter.info("Using default configuration. Run 'cloudmirror config set <key> <value>' to create one.");
            }
            return Ok(());
        }

        let config = match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                if json {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [format!("Failed to parse configuration: {}", e)],
                    }));
                } else {
                    formatter.error(&format!("Failed to parse configuration: {}", e));
                    formatter.info(&format!("File: {}", config_path.display()));
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");
        let errors = config.validate();

        if json {
            let error_strings: Vec<String> = errors.iter().map(ToString::to_string).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                plural(errors.len())
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        Ok(())
    }
}

fn execute_path(format: OutputFormat, config_path: &Path) {
    let formatter = get_formatter(format);
    if matches!(format, OutputFormat::Json) {
        formatter.print_json(&serde_json::json!({
            "config_path": config_path.display().to_string(),
            "exists": config_path.exists(),
        }));
    } else {
        formatter.line(&config_path.display().to_string());
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => anyhow::bail!("Expected true or false for {key}"),
    }
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- sync ---
        "sync.local_root" => config.sync.local_root = PathBuf::from(value),
        "sync.scope_root" => config.sync.scope_root = value.to_string(),
        "sync.direction" => {
            config.sync.direction = value.parse::<Direction>().map_err(anyhow::Error::msg)?;
        }
        "sync.dry_run" => config.sync.dry_run = parse_bool(key, value)?,

        // --- store ---
        "store.root" => config.store.root = PathBuf::from(value),
        "store.locator_base_url" => config.store.locator_base_url = value.to_string(),
        "store.index_name" => config.store.index_name = value.to_string(),
        "store.folder_list_name" => config.store.folder_list_name = value.to_string(),
        "store.extra_protected" => {
            config.store.extra_protected = value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }

        // --- transport ---
        "transport.timeout_secs" => {
            config.transport.timeout_secs = value
                .parse::<u64>()
                .context("Expected a positive integer for transport.timeout_secs")?;
        }

        // --- logging ---
        "logging.level" => config.logging.level = value.to_string(),

        _ => anyhow::bail!("Unknown configuration key: '{}'", key),
    }

    Ok(())
}
