//! Configuration resolution for cmt-migrate
//!
//! Connection credentials resolve CLI → ENV → TOML; engine tuning resolves
//! CLI → TOML → compiled default. Missing credentials are fatal in execute
//! mode and are reported before any work starts.

use crate::services::item_pipeline::PipelineOptions;
use crate::services::platform_transport::ShopifyConnection;
use crate::services::pricing::MarkupPricing;
use crate::services::qa_checker::QaRules;
use crate::services::rate_limited_client::RetryPolicy;
use crate::services::worker_pool::{Checkpoint, PoolConfig};
use cmt_common::config::{
    resolve_setting, resolve_state_path, ConfigSource, TomlConfig, ENV_ACCESS_TOKEN, ENV_STORE,
};
use cmt_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Store host and access token for the target platform
#[derive(Clone, PartialEq, Eq)]
pub struct PlatformCredentials {
    pub store: String,
    pub access_token: String,
}

// Keep the token out of logs
impl std::fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("store", &self.store)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl PlatformCredentials {
    pub fn connection(&self, toml: &TomlConfig) -> ShopifyConnection {
        ShopifyConnection {
            store: self.store.clone(),
            api_version: toml.platform.api_version.clone(),
            access_token: self.access_token.clone(),
            request_timeout: Duration::from_secs(toml.platform.request_timeout_secs),
        }
    }
}

/// Resolve store and access token from 3-tier configuration
///
/// **Priority:** CLI → ENV → TOML
pub fn resolve_credentials(
    cli_store: Option<&str>,
    cli_token: Option<&str>,
    toml: &TomlConfig,
) -> Result<PlatformCredentials> {
    let store = resolve_setting(cli_store, ENV_STORE, toml.platform.store.as_deref());
    let token = resolve_setting(
        cli_token,
        ENV_ACCESS_TOKEN,
        toml.platform.access_token.as_deref(),
    );

    let mut missing = Vec::new();
    if store.is_none() {
        missing.push(format!("store (--store, {}, [platform] store)", ENV_STORE));
    }
    if token.is_none() {
        missing.push(format!(
            "access token ({}, [platform] access_token)",
            ENV_ACCESS_TOKEN
        ));
    }

    match (store, token) {
        (Some((store, store_source)), Some((access_token, token_source))) => {
            if token_source == ConfigSource::TomlFile {
                warn!("Access token read from TOML config; prefer the environment variable");
            }
            info!(store = %store, "Store resolved from {}", store_source);
            info!("Access token resolved from {}", token_source);
            Ok(PlatformCredentials {
                store,
                access_token,
            })
        }
        _ => Err(Error::Config(format!(
            "platform connection not configured, missing: {}",
            missing.join("; ")
        ))),
    }
}

/// Command-line values that override the TOML file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub workers: Option<usize>,
    pub checkpoint_every: Option<usize>,
    pub auto_publish: bool,
    pub state_file: Option<PathBuf>,
}

/// Everything the engine needs, resolved
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub pool: PoolConfig,
    pub pipeline: PipelineOptions,
    pub qa: QaRules,
    pub pricing: MarkupPricing,
    pub state_path: PathBuf,
    pub state_source: ConfigSource,
    pub page_size: usize,
    pub skip_wholesale: bool,
    pub image_root: Option<PathBuf>,
    pub fetch_timeout: Duration,
}

pub fn resolve_run_settings(toml: &TomlConfig, cli: &CliOverrides) -> Result<RunSettings> {
    let migration = &toml.migration;

    let workers = cli.workers.unwrap_or(migration.workers);
    if workers == 0 {
        return Err(Error::Config("worker count must be at least 1".to_string()));
    }
    if migration.page_size == 0 {
        return Err(Error::Config("page_size must be at least 1".to_string()));
    }
    if !(toml.pricing.markup.is_finite() && toml.pricing.markup > 0.0) {
        return Err(Error::Config(format!(
            "pricing markup must be positive (got {})",
            toml.pricing.markup
        )));
    }

    let (state_path, state_source) =
        resolve_state_path(cli.state_file.as_deref(), migration.state_file.as_deref());
    let checkpoint_every = cli.checkpoint_every.unwrap_or(migration.checkpoint_every);
    let upload_timeout = Duration::from_secs(toml.platform.upload_timeout_secs);

    Ok(RunSettings {
        pool: PoolConfig {
            workers,
            min_request_interval: Duration::from_millis(migration.min_request_interval_ms),
            retry: RetryPolicy::default(),
            checkpoint: Checkpoint::from_interval(checkpoint_every),
            progress_interval: Duration::from_secs(migration.progress_interval_secs.max(1)),
        },
        pipeline: PipelineOptions {
            auto_publish: cli.auto_publish || migration.auto_publish,
            dedupe_by_reference: migration.dedupe_by_reference,
            vendor: migration.vendor.clone(),
            upload_timeout,
        },
        qa: QaRules::from(&toml.qa),
        pricing: MarkupPricing::from(&toml.pricing),
        state_path,
        state_source,
        page_size: migration.page_size,
        skip_wholesale: migration.skip_wholesale,
        image_root: migration.image_root.clone(),
        fetch_timeout: Duration::from_secs(toml.platform.request_timeout_secs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_toml() {
        let mut toml = TomlConfig::default();
        toml.migration.workers = 2;
        toml.migration.checkpoint_every = 5;

        let settings = resolve_run_settings(
            &toml,
            &CliOverrides {
                workers: Some(8),
                checkpoint_every: None,
                auto_publish: true,
                state_file: Some(PathBuf::from("/tmp/state.json")),
            },
        )
        .unwrap();

        assert_eq!(settings.pool.workers, 8);
        assert_eq!(settings.pool.checkpoint, Checkpoint::Every(5));
        assert!(settings.pipeline.auto_publish);
        assert_eq!(settings.state_path, PathBuf::from("/tmp/state.json"));
        assert_eq!(settings.state_source, ConfigSource::CommandLine);
    }

    #[test]
    fn test_defaults_from_toml() {
        let settings = resolve_run_settings(
            &TomlConfig::default(),
            &CliOverrides {
                state_file: Some(PathBuf::from("s.json")),
                ..CliOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(settings.pool.workers, 4);
        assert_eq!(settings.pool.checkpoint, Checkpoint::EveryRecord);
        assert_eq!(settings.pool.min_request_interval, Duration::from_millis(500));
        assert_eq!(settings.pipeline.upload_timeout, Duration::from_secs(60));
        assert!(!settings.pipeline.auto_publish);
    }

    #[test]
    fn test_zero_workers_is_config_error() {
        let err = resolve_run_settings(
            &TomlConfig::default(),
            &CliOverrides {
                workers: Some(0),
                ..CliOverrides::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        let credentials = PlatformCredentials {
            store: "demo.myshopify.com".to_string(),
            access_token: "shpat_secret".to_string(),
        };
        let debug = format!("{:?}", credentials);
        assert!(!debug.contains("shpat_secret"));
        assert!(debug.contains("demo.myshopify.com"));
    }
}
