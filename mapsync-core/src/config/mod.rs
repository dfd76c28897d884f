//! Configuration management for mapsync
//!
//! Defaults, TOML files, and `MAPSYNC_<SECTION>_<KEY>` environment
//! overrides, all validated before use.

use crate::hlc::{Hlc, SystemClock};
use crate::logging::{LogConfig, LogLevel};
use crate::oplog::OperationLog;
use crate::sync::{SeededPeerSelector, SyncEngine, SyncOptions, Updater, Updaters, DEFAULT_SUBJECTS};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeConfig,
    pub sync: SyncConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Identity of this replica
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Clock node id; a random UUID when unset
    pub node_id: Option<String>,

    /// Subjects this node has updaters for
    pub subjects: Vec<String>,
}

/// Sync engine behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Reconcile live operations as well as catch-up batches
    pub reconcile_live_operations: bool,

    /// How long to wait for a session token
    #[serde(with = "humantime_serde")]
    pub token_timeout: Duration,

    /// Where session tokens are requested
    pub token_endpoint: String,
}

/// Session driver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a graceful shutdown waits for sessions to finish
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,

    /// Seed for catch-up peer choice; random when unset
    pub peer_selection_seed: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,

    /// Extra `tracing` filter directives
    pub filter: Option<String>,

    pub json_format: bool,
    pub with_timestamp: bool,
    pub with_target: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            subjects: DEFAULT_SUBJECTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        let options = SyncOptions::default();
        Self {
            reconcile_live_operations: options.reconcile_live_operations,
            token_timeout: options.token_timeout,
            token_endpoint: "/map/{map_id}/ws-token/".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shutdown_grace: Duration::from_secs(5),
            peer_selection_seed: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            filter: None,
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        SyncOptions {
            reconcile_live_operations: config.reconcile_live_operations,
            token_timeout: config.token_timeout,
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        let log_config = LogConfig::new(config.level)
            .with_timestamp(config.with_timestamp)
            .with_target(config.with_target)
            .json_format(config.json_format);
        match &config.filter {
            Some(filter) => log_config.with_filter(filter.clone()),
            None => log_config,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(format!("{key}={raw:?}: {e}"))),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: MAPSYNC_<SECTION>_<KEY>
    /// Example: MAPSYNC_SYNC_TOKEN_TIMEOUT=30s
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// `from_env` over an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Node
        if let Some(node_id) = lookup("MAPSYNC_NODE_ID") {
            config.node.node_id = Some(node_id);
        }
        if let Some(subjects) = lookup("MAPSYNC_NODE_SUBJECTS") {
            config.node.subjects = subjects
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        // Sync
        if let Some(reconcile) = parse_var(&lookup, "MAPSYNC_SYNC_RECONCILE_LIVE_OPERATIONS")? {
            config.sync.reconcile_live_operations = reconcile;
        }
        if let Some(raw) = lookup("MAPSYNC_SYNC_TOKEN_TIMEOUT") {
            config.sync.token_timeout = humantime_serde::re::humantime::parse_duration(&raw)
                .map_err(|e| ConfigError::InvalidValue(format!("MAPSYNC_SYNC_TOKEN_TIMEOUT={raw:?}: {e}")))?;
        }
        if let Some(endpoint) = lookup("MAPSYNC_SYNC_TOKEN_ENDPOINT") {
            config.sync.token_endpoint = endpoint;
        }

        // Session
        if let Some(raw) = lookup("MAPSYNC_SESSION_SHUTDOWN_GRACE") {
            config.session.shutdown_grace = humantime_serde::re::humantime::parse_duration(&raw)
                .map_err(|e| ConfigError::InvalidValue(format!("MAPSYNC_SESSION_SHUTDOWN_GRACE={raw:?}: {e}")))?;
        }
        if let Some(seed) = parse_var(&lookup, "MAPSYNC_SESSION_PEER_SELECTION_SEED")? {
            config.session.peer_selection_seed = Some(seed);
        }

        // Logging
        if let Some(level) = parse_var(&lookup, "MAPSYNC_LOG_LEVEL")? {
            config.logging.level = level;
        }
        if let Some(filter) = lookup("MAPSYNC_LOG_FILTER") {
            config.logging.filter = Some(filter);
        }
        if let Some(json) = parse_var(&lookup, "MAPSYNC_LOG_JSON")? {
            config.logging.json_format = json;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(node_id) = &self.node.node_id {
            crate::hlc::timestamp::validate_node_id(node_id)
                .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;
        }

        if self.node.subjects.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "at least one subject must be configured".to_string(),
            ));
        }

        if self.sync.token_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "token_timeout must be greater than 0".to_string(),
            ));
        }

        LogConfig::from(&self.logging)
            .env_filter()
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }

    /// Clock for this node, on the system wall clock
    pub fn clock(&self) -> Result<Hlc, ConfigError> {
        match &self.node.node_id {
            None => Ok(Hlc::new()),
            Some(node_id) => Hlc::with_node_id(node_id.clone(), Arc::new(SystemClock))
                .map_err(|e| ConfigError::InvalidValue(e.to_string())),
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions::from(&self.sync)
    }

    /// One updater registered for every configured subject
    pub fn updaters(&self, updater: Arc<dyn Updater>) -> Updaters {
        Updaters::for_subjects(self.node.subjects.iter().cloned(), updater)
    }

    /// Engine for this node
    ///
    /// Uses the node's clock and subjects, the sync options, and a seeded
    /// peer selector when `session.peer_selection_seed` is set.
    pub fn engine(&self, updater: Arc<dyn Updater>) -> Result<SyncEngine, ConfigError> {
        let engine = SyncEngine::with_log(OperationLog::new(self.clock()?), self.updaters(updater))
            .with_options(self.sync_options());
        Ok(match self.session.peer_selection_seed {
            Some(seed) => engine.with_peer_selector(SeededPeerSelector::new(seed)),
            None => engine,
        })
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig::from(&self.logging)
    }
}
