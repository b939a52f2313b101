//! Configuration loading and path resolution
//!
//! Values resolve in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the target store (e.g. `my-shop.myshopify.com`)
pub const ENV_STORE: &str = "CMT_STORE";
/// Environment variable holding the platform access token
pub const ENV_ACCESS_TOKEN: &str = "CMT_ACCESS_TOKEN";
/// Environment variable overriding the state file location
pub const ENV_STATE_FILE: &str = "CMT_STATE_FILE";

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    TomlFile,
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConfigSource::CommandLine => "command line",
            ConfigSource::Environment => "environment",
            ConfigSource::TomlFile => "TOML config",
            ConfigSource::Default => "compiled default",
        };
        f.write_str(name)
    }
}

/// Full TOML configuration file
///
/// Every section is optional; missing keys take compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub platform: PlatformSection,
    pub migration: MigrationSection,
    pub pricing: PricingSection,
    pub qa: QaSection,
    pub logging: LoggingConfig,
    pub titles: TitleSection,
}

/// `[platform]` connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSection {
    /// Store host, e.g. `my-shop.myshopify.com`
    pub store: Option<String>,
    pub api_version: String,
    pub access_token: Option<String>,
    pub request_timeout_secs: u64,
    pub upload_timeout_secs: u64,
}

impl Default for PlatformSection {
    fn default() -> Self {
        Self {
            store: None,
            api_version: "2024-01".to_string(),
            access_token: None,
            request_timeout_secs: 30,
            upload_timeout_secs: 60,
        }
    }
}

/// `[migration]` engine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSection {
    pub workers: usize,
    pub min_request_interval_ms: u64,
    /// Save state after this many recorded outcomes (1 = every record)
    pub checkpoint_every: usize,
    pub auto_publish: bool,
    /// Look up an existing target record by reference before creating
    pub dedupe_by_reference: bool,
    pub skip_wholesale: bool,
    pub page_size: usize,
    pub progress_interval_secs: u64,
    pub state_file: Option<PathBuf>,
    /// Base directory for sub-resources given as relative paths
    pub image_root: Option<PathBuf>,
    pub vendor: String,
}

impl Default for MigrationSection {
    fn default() -> Self {
        Self {
            workers: 4,
            min_request_interval_ms: 500,
            checkpoint_every: 1,
            auto_publish: false,
            dedupe_by_reference: true,
            skip_wholesale: false,
            page_size: 250,
            progress_interval_secs: 10,
            state_file: None,
            image_root: None,
            vendor: "Default Vendor".to_string(),
        }
    }
}

/// `[pricing]` markup rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingSection {
    pub markup: f64,
    /// Round retail prices to end in .99
    pub charm_pricing: bool,
}

impl Default for PricingSection {
    fn default() -> Self {
        Self {
            markup: 2.0,
            charm_pricing: false,
        }
    }
}

/// `[qa]` publication gate thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaSection {
    pub min_title_len: usize,
    pub min_description_len: usize,
    pub min_sub_resources: usize,
    pub max_price: f64,
}

impl Default for QaSection {
    fn default() -> Self {
        Self {
            min_title_len: 10,
            min_description_len: 100,
            min_sub_resources: 1,
            max_price: 10_000.0,
        }
    }
}

/// `[logging]` settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[titles]` trademark-safe title rewriting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleSection {
    /// Lowercase term → replacement phrase
    pub replacements: BTreeMap<String, String>,
}

/// Get default configuration file path for the platform
///
/// Linux checks `~/.config/cmt/config.toml` then `/etc/cmt/config.toml`.
/// Returns `None` when no file exists.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("cmt").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/cmt/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default state file path
pub fn default_state_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cmt"))
        .unwrap_or_else(|| PathBuf::from("./cmt_data"))
        .join("migration_state.json")
}

/// Load TOML configuration
///
/// An explicitly requested file must exist. Without one, the platform default
/// location is tried and a missing file yields compiled defaults.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) => path,
            None => {
                warn!("No config file found, using compiled defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve a string setting across CLI → ENV → TOML
///
/// Blank values are treated as absent at every tier. Returns the value and
/// the tier it came from.
pub fn resolve_setting(
    cli_value: Option<&str>,
    env_var_name: &str,
    toml_value: Option<&str>,
) -> Option<(String, ConfigSource)> {
    if let Some(value) = cli_value.filter(|v| is_present(v)) {
        return Some((value.to_string(), ConfigSource::CommandLine));
    }

    if let Ok(value) = std::env::var(env_var_name) {
        if is_present(&value) {
            return Some((value, ConfigSource::Environment));
        }
    }

    toml_value
        .filter(|v| is_present(v))
        .map(|v| (v.to_string(), ConfigSource::TomlFile))
}

/// Resolve the state file path across CLI → ENV → TOML → default
pub fn resolve_state_path(cli_value: Option<&Path>, toml_value: Option<&Path>) -> (PathBuf, ConfigSource) {
    if let Some(path) = cli_value {
        return (path.to_path_buf(), ConfigSource::CommandLine);
    }
    if let Ok(value) = std::env::var(ENV_STATE_FILE) {
        if is_present(&value) {
            return (PathBuf::from(value), ConfigSource::Environment);
        }
    }
    if let Some(path) = toml_value {
        return (path.to_path_buf(), ConfigSource::TomlFile);
    }
    (default_state_path(), ConfigSource::Default)
}

fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}
