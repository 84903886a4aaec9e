// gateway-server/src/config.rs
// ============================================================================
// Module: Gateway Configuration
// Description: TOML-based configuration surface for the governance
// gateway server (§6 config surface plus ambient process settings).
// Purpose: Load and validate the single config struct threaded through the
// request path; no hidden global state.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! [`GatewayConfig`] is the one process-wide config value. It is loaded
//! once at startup (`load`) and validated before use; nothing in this
//! crate reads environment variables or files again afterward.

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use gateway_core::ApprovalMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Config file name looked up in the current directory when no `--config`
/// path is given.
const DEFAULT_CONFIG_NAME: &str = "gateway.toml";
/// Environment variable naming an explicit config file path.
const CONFIG_ENV_VAR: &str = "GOVERNANCE_GATEWAY_CONFIG";
/// Refuse to read config files larger than this; a legitimate config is a
/// few kilobytes.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Minimum acceptable length for either HMAC secret, in bytes.
const MIN_TOKEN_SECRET_BYTES: usize = 16;
/// Floor on the adapter poll interval (§4.8): polling faster than this is
/// rejected rather than silently clamped.
const MIN_POLL_INTERVAL_MS: u64 = 250;
/// Ceiling on the adapter poll interval.
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
/// Floor on the total approval wait timeout.
const MIN_WAIT_TIMEOUT_MS: u64 = 1_000;
/// Ceiling on the total approval wait timeout.
const MAX_WAIT_TIMEOUT_MS: u64 = 30 * 60 * 1000;
/// Ceiling on the fingerprint reuse window.
const MAX_REUSE_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// Default approval poll interval.
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
/// Default total approval wait timeout (5 minutes, per §4.8).
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5 * 60 * 1000;
/// Default fingerprint reuse window (10 minutes, per §4.8).
const DEFAULT_REUSE_WINDOW_MS: u64 = 10 * 60 * 1000;
/// Default decision token lifetime, matching the granted-scope TTL.
const DEFAULT_DECISION_TOKEN_TTL_SECONDS: u64 = 15 * 60;
/// Default SQLite busy timeout.
const DEFAULT_DB_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default bind address.
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8089";
/// Default SQLite database path.
const DEFAULT_DB_PATH: &str = "gateway.db";
/// Default `tracing-subscriber` env-filter directive.
const DEFAULT_LOG_FILTER: &str = "info";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading or validating [`GatewayConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file exceeded [`MAX_CONFIG_FILE_SIZE`].
    #[error("config file {path} exceeds the maximum size of {MAX_CONFIG_FILE_SIZE} bytes")]
    TooLarge {
        /// Path of the oversized file.
        path: PathBuf,
    },
    /// The config file was not valid TOML for this schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: Box<toml::de::Error>,
    },
    /// The config parsed but failed a semantic validation rule.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// The gateway's full process configuration, covering the §6 config
/// surface plus ambient server settings (bind address, logging).
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Approval-fork mode; `simulate` is the OSS default.
    #[serde(default)]
    pub approval_mode: ApprovalMode,
    /// Shared secret used to verify adapter tokens (`X-Adapter-Token`).
    pub adapter_token_secret: String,
    /// Shared secret used to sign and verify decision tokens.
    pub decision_token_secret: String,
    /// Decision token lifetime, in seconds.
    #[serde(default = "default_decision_token_ttl_seconds")]
    pub decision_token_ttl_seconds: u64,
    /// Gates the extended condition operators (§4.3) versus legacy
    /// eq-only matching.
    #[serde(default = "default_policy_operators_enabled")]
    pub policy_operators_enabled: bool,
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// SQLite busy timeout, in milliseconds.
    #[serde(default = "default_db_busy_timeout_ms")]
    pub db_busy_timeout_ms: u64,
    /// Fingerprint reuse window, in milliseconds.
    #[serde(default = "default_reuse_window_ms")]
    pub reuse_window_ms: u64,
    /// Total bound on an adapter's approval wait, in milliseconds.
    #[serde(default = "default_wait_timeout_ms")]
    pub approval_wait_timeout_ms: u64,
    /// Minimum interval between adapter poll calls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub approval_poll_interval_ms: u64,
    /// Key required on the `X-Ops-Api-Key` header for operator endpoints.
    /// Unset disables operator-surface auth entirely (local single-tenant
    /// deployments only).
    #[serde(default)]
    pub ops_api_key: Option<String>,
    /// Address the HTTP server binds to. Environmental, not part of the
    /// core contract.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// `tracing-subscriber` env-filter directive. Environmental.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl GatewayConfig {
    /// Loads configuration from `path`, or from [`CONFIG_ENV_VAR`], or from
    /// [`DEFAULT_CONFIG_NAME`] in the current directory, in that order of
    /// precedence. Validates before returning.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, exceeds the
    /// maximum size, fails to parse, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_config_path(path);
        let raw = read_config_file(&resolved)?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: resolved.clone(),
            source: Box::new(source),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field and range invariants not expressible in the
    /// type alone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on the first rule violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.adapter_token_secret.as_bytes().len() < MIN_TOKEN_SECRET_BYTES {
            return Err(ConfigError::Invalid(format!(
                "adapter_token_secret must be at least {MIN_TOKEN_SECRET_BYTES} bytes"
            )));
        }
        if self.decision_token_secret.as_bytes().len() < MIN_TOKEN_SECRET_BYTES {
            return Err(ConfigError::Invalid(format!(
                "decision_token_secret must be at least {MIN_TOKEN_SECRET_BYTES} bytes"
            )));
        }
        if self.decision_token_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("decision_token_ttl_seconds must be nonzero".to_string()));
        }
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.approval_poll_interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "approval_poll_interval_ms must be between {MIN_POLL_INTERVAL_MS} and {MAX_POLL_INTERVAL_MS}"
            )));
        }
        if !(MIN_WAIT_TIMEOUT_MS..=MAX_WAIT_TIMEOUT_MS).contains(&self.approval_wait_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "approval_wait_timeout_ms must be between {MIN_WAIT_TIMEOUT_MS} and {MAX_WAIT_TIMEOUT_MS}"
            )));
        }
        if self.approval_poll_interval_ms > self.approval_wait_timeout_ms {
            return Err(ConfigError::Invalid(
                "approval_poll_interval_ms must not exceed approval_wait_timeout_ms".to_string(),
            ));
        }
        if self.reuse_window_ms > MAX_REUSE_WINDOW_MS {
            return Err(ConfigError::Invalid(format!("reuse_window_ms must not exceed {MAX_REUSE_WINDOW_MS}")));
        }
        if let Some(key) = &self.ops_api_key {
            if key.is_empty() {
                return Err(ConfigError::Invalid("ops_api_key, if set, must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default for [`GatewayConfig::decision_token_ttl_seconds`].
const fn default_decision_token_ttl_seconds() -> u64 {
    DEFAULT_DECISION_TOKEN_TTL_SECONDS
}

/// Default for [`GatewayConfig::policy_operators_enabled`].
const fn default_policy_operators_enabled() -> bool {
    true
}

/// Default for [`GatewayConfig::db_path`].
fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

/// Default for [`GatewayConfig::db_busy_timeout_ms`].
const fn default_db_busy_timeout_ms() -> u64 {
    DEFAULT_DB_BUSY_TIMEOUT_MS
}

/// Default for [`GatewayConfig::reuse_window_ms`].
const fn default_reuse_window_ms() -> u64 {
    DEFAULT_REUSE_WINDOW_MS
}

/// Default for [`GatewayConfig::approval_wait_timeout_ms`].
const fn default_wait_timeout_ms() -> u64 {
    DEFAULT_WAIT_TIMEOUT_MS
}

/// Default for [`GatewayConfig::approval_poll_interval_ms`].
const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Default for [`GatewayConfig::bind_addr`].
#[expect(clippy::unwrap_used, reason = "a hardcoded literal socket address is infallible to parse")]
fn default_bind_addr() -> SocketAddr {
    DEFAULT_BIND_ADDR.parse().unwrap()
}

/// Default for [`GatewayConfig::log_filter`].
fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config file path from an explicit argument, the
/// environment, or the current-directory default, in that order.
fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(value) = env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(value);
    }
    PathBuf::from(DEFAULT_CONFIG_NAME)
}

/// Reads a config file, enforcing the maximum size and UTF-8 contents.
fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    let metadata = fs::metadata(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::TooLarge { path: path.to_path_buf() });
    }
    fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
        adapter_token_secret = "0123456789abcdef"
        decision_token_secret = "fedcba9876543210"
        "#
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: GatewayConfig = toml::from_str(minimal_toml()).expect("parse");
        assert!(config.validate().is_ok());
        assert_eq!(config.approval_mode, ApprovalMode::Simulate);
        assert_eq!(config.approval_poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert!(config.policy_operators_enabled);
    }

    #[test]
    fn short_secret_is_rejected() {
        let toml_str = r#"
        adapter_token_secret = "short"
        decision_token_secret = "fedcba9876543210"
        "#;
        let config: GatewayConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn poll_interval_below_floor_is_rejected() {
        let toml_str = r#"
        adapter_token_secret = "0123456789abcdef"
        decision_token_secret = "fedcba9876543210"
        approval_poll_interval_ms = 10
        "#;
        let config: GatewayConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn poll_interval_above_wait_timeout_is_rejected() {
        let toml_str = r#"
        adapter_token_secret = "0123456789abcdef"
        decision_token_secret = "fedcba9876543210"
        approval_poll_interval_ms = 50_000
        approval_wait_timeout_ms = 10_000
        "#;
        let config: GatewayConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.validate().is_err());
    }
}
