//! Configuration module for Cloudmirror.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::path::LogicalPath;
use crate::domain::protected::ProtectedNames;

/// Current public server for published objects
pub const DEFAULT_LOCATOR_BASE_URL: &str = "https://steamusercontent-a.akamaihd.net";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Cloudmirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub store: StoreConfig,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
}

/// Which side is authoritative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local tree is mirrored onto the blob store and index.
    #[default]
    Push,
    /// Blob store and index are mirrored onto the local tree.
    Pull,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::Pull => write!(f, "pull"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "push" => Ok(Self::Push),
            "pull" => Ok(Self::Pull),
            other => Err(format!("invalid direction '{other}'; valid options: push, pull")),
        }
    }
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Local directory mirrored by this run.
    pub local_root: PathBuf,
    /// Index folder (`/`-delimited) the local root corresponds to. `.` means everything.
    pub scope_root: String,
    pub direction: Direction,
    /// Simulate without touching the store or the local tree.
    pub dry_run: bool,
}

/// Blob store and index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory backing the flat blob store.
    pub root: PathBuf,
    /// Base URL of published locators.
    pub locator_base_url: String,
    /// Object name of the index record.
    pub index_name: String,
    /// Object name of the folder-list aid.
    pub folder_list_name: String,
    /// Additional object names generic add/remove must not touch.
    pub extra_protected: Vec<String>,
}

/// Per-request transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Seconds before a single store request is abandoned.
    pub timeout_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/cloudmirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("cloudmirror")
            .join("config.yaml")
    }

    /// Scope root as a relative path value.
    pub fn scope_path(&self) -> LogicalPath {
        LogicalPath::from_folder(&self.sync.scope_root)
    }

    /// Object names exempt from generic add/remove.
    pub fn protected_names(&self) -> ProtectedNames {
        ProtectedNames::new(
            &self.store.index_name,
            &self.store.folder_list_name,
            self.store.extra_protected.iter().cloned(),
        )
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_root: PathBuf::from("."),
            scope_root: ".".to_string(),
            direction: Direction::Push,
            dry_run: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("cloudmirror")
                .join("store"),
            locator_base_url: DEFAULT_LOCATOR_BASE_URL.to_string(),
            index_name: "CloudInfo.json".to_string(),
            folder_list_name: "CloudFolder.json".to_string(),
            extra_protected: Vec::new(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"transport.timeout_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if !self.sync.local_root.is_dir() {
            errors.push(ValidationError {
                field: "sync.local_root".into(),
                message: format!(
                    "directory does not exist: {}",
                    self.sync.local_root.display()
                ),
            });
        }
        if self.scope_path().is_absolute() {
            errors.push(ValidationError {
                field: "sync.scope_root".into(),
                message: format!(
                    "must be a relative folder, got '{}'",
                    self.sync.scope_root
                ),
            });
        }

        // --- store ---
        if self.store.root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "store.root".into(),
                message: "must not be empty".into(),
            });
        }
        let base_url = self.store.locator_base_url.as_str();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push(ValidationError {
                field: "store.locator_base_url".into(),
                message: format!("must be an http(s) URL, got '{base_url}'"),
            });
        }
        if self.store.index_name.is_empty() {
            errors.push(ValidationError {
                field: "store.index_name".into(),
                message: "must not be empty".into(),
            });
        }
        if self.store.folder_list_name.is_empty() {
            errors.push(ValidationError {
                field: "store.folder_list_name".into(),
                message: "must not be empty".into(),
            });
        }
        if self.store.index_name == self.store.folder_list_name {
            errors.push(ValidationError {
                field: "store.folder_list_name".into(),
                message: "must differ from store.index_name".into(),
            });
        }

        // --- transport ---
        if self.transport.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "transport.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use cloudmirror_core::config::{ConfigBuilder, Direction};
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_local_root(PathBuf::from("/home/user/Saves"))
///     .sync_scope_root("Saves")
///     .sync_direction(Direction::Pull)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an existing configuration, e.g. one loaded from disk.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- sync ---

    pub fn sync_local_root(mut self, root: PathBuf) -> Self {
        self.config.sync.local_root = root;
        self
    }

    pub fn sync_scope_root(mut self, scope_root: impl Into<String>) -> Self {
        self.config.sync.scope_root = scope_root.into();
        self
    }

    pub fn sync_direction(mut self, direction: Direction) -> Self {
        self.config.sync.direction = direction;
        self
    }

    pub fn sync_dry_run(mut self, dry_run: bool) -> Self {
        self.config.sync.dry_run = dry_run;
        self
    }

    // --- store ---

    pub fn store_root(mut self, root: PathBuf) -> Self {
        self.config.store.root = root;
        self
    }

    pub fn store_extra_protected(mut self, name: impl Into<String>) -> Self {
        self.config.store.extra_protected.push(name.into());
        self
    }

    // --- transport ---

    pub fn transport_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.transport.timeout_secs = seconds;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
