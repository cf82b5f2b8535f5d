//! Configuration management for the gateway.
//!
//! This module centralizes every setting the gateway reads and provides
//! validation for them at startup. Configuration is loaded once and is
//! immutable afterwards; the dispatcher keeps it behind an `Arc`.

use serde::Deserialize;
use std::fmt::Debug;
use std::path::PathBuf;
use std::time::Duration;

/// Default base path for every reserved endpoint
pub const DEFAULT_URI_PATH: &str = "/swagger-stats";
/// Default session lifetime in seconds
pub const DEFAULT_SESSION_MAX_AGE: u64 = 900;
/// Default period of the local session sweep in milliseconds
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 500;
/// Default bound on a single shared-store operation in milliseconds
pub const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 2000;
/// Largest session lifetime, in seconds, whose millisecond form fits an `i64`
pub const MAX_SESSION_MAX_AGE: u64 = i64::MAX as u64 / 1000;

/// Reserved path prefixes intercepted before the host application sees a request.
///
/// Classification checks them in declaration order: stats, metrics, logout,
/// ui, dist, prom.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ReservedPaths {
    pub stats: String,
    pub metrics: String,
    pub logout: String,
    pub ui: String,
    pub dist: String,
    /// Passthrough metrics path, disabled unless configured
    #[serde(default)]
    pub prom: Option<String>,
}

impl ReservedPaths {
    /// Derive the standard layout from a base path such as `/swagger-stats`.
    pub fn from_base(uri_path: &str) -> Self {
        let base = uri_path.trim_end_matches('/');
        Self {
            stats: format!("{}/stats", base),
            metrics: format!("{}/metrics", base),
            logout: format!("{}/logout", base),
            ui: format!("{}/ux", base),
            dist: format!("{}/dist", base),
            prom: None,
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("stats", self.stats.as_str()),
            ("metrics", self.metrics.as_str()),
            ("logout", self.logout.as_str()),
            ("ui", self.ui.as_str()),
            ("dist", self.dist.as_str()),
        ]
        .into_iter()
        .chain(self.prom.as_deref().map(|prom| ("prom", prom)))
    }
}

impl Default for ReservedPaths {
    fn default() -> Self {
        Self::from_base(DEFAULT_URI_PATH)
    }
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether protected paths require a session or verified credentials
    pub authentication: bool,
    /// Session lifetime in seconds
    pub session_max_age: u64,
    /// Base path; also the scope of the session cookie
    pub uri_path: String,
    /// Reserved path prefixes
    pub paths: ReservedPaths,
    /// Directory the dist path serves files from
    pub asset_root: PathBuf,
    /// Period of the local session sweep. Bounds how long an expired local
    /// session can still be reported valid.
    pub sweep_interval_ms: u64,
    /// When set, local lookups also compare the stored expiry instead of
    /// waiting for the next sweep
    pub strict_expiry: bool,
    /// Upper bound for one shared-store operation
    pub backend_timeout_ms: u64,
    /// Serve the prom path through the process aggregator when one is supplied
    pub aggregate_metrics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            authentication: false,
            session_max_age: DEFAULT_SESSION_MAX_AGE,
            uri_path: DEFAULT_URI_PATH.to_string(),
            paths: ReservedPaths::default(),
            asset_root: PathBuf::from("dist"),
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            strict_expiry: false,
            backend_timeout_ms: DEFAULT_BACKEND_TIMEOUT_MS,
            aggregate_metrics: false,
        }
    }
}

impl Config {
    /// Configuration rooted at `uri_path`, every other value at its default.
    pub fn with_uri_path(uri_path: &str) -> Self {
        Self {
            uri_path: uri_path.to_string(),
            paths: ReservedPaths::from_base(uri_path),
            ..Self::default()
        }
    }

    /// Create a new configuration from process environment variables
    ///
    /// Recognized variables: `SWS_URI_PATH`, `SWS_AUTHENTICATION`,
    /// `SWS_SESSION_MAX_AGE`, `SWS_PATH_PROM`, `SWS_ASSET_ROOT`,
    /// `SWS_SWEEP_INTERVAL_MS`, `SWS_STRICT_EXPIRY`, `SWS_BACKEND_TIMEOUT_MS`,
    /// `SWS_AGGREGATE_METRICS`. Unset variables keep their defaults.
    ///
    /// # Returns
    ///
    /// A Result containing the validated configuration or an error if a value is malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let uri_path = lookup("SWS_URI_PATH").unwrap_or_else(|| DEFAULT_URI_PATH.to_string());
        let mut config = Config::with_uri_path(&uri_path);

        if let Some(value) = lookup("SWS_AUTHENTICATION") {
            config.authentication = parse_flag("SWS_AUTHENTICATION", &value)?;
        }
        if let Some(value) = lookup("SWS_SESSION_MAX_AGE") {
            config.session_max_age = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SWS_SESSION_MAX_AGE", value))?;
        }
        if let Some(value) = lookup("SWS_SWEEP_INTERVAL_MS") {
            config.sweep_interval_ms = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SWS_SWEEP_INTERVAL_MS", value))?;
        }
        if let Some(value) = lookup("SWS_STRICT_EXPIRY") {
            config.strict_expiry = parse_flag("SWS_STRICT_EXPIRY", &value)?;
        }
        if let Some(value) = lookup("SWS_BACKEND_TIMEOUT_MS") {
            config.backend_timeout_ms = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SWS_BACKEND_TIMEOUT_MS", value))?;
        }
        if let Some(value) = lookup("SWS_AGGREGATE_METRICS") {
            config.aggregate_metrics = parse_flag("SWS_AGGREGATE_METRICS", &value)?;
        }
        config.paths.prom = lookup("SWS_PATH_PROM").filter(|prom| !prom.is_empty());
        if let Some(root) = lookup("SWS_ASSET_ROOT") {
            config.asset_root = PathBuf::from(root);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the gateway relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_max_age == 0 || self.session_max_age > MAX_SESSION_MAX_AGE {
            return Err(ConfigError::InvalidValue(
                "session_max_age",
                self.session_max_age.to_string(),
            ));
        }
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "sweep_interval_ms",
                self.sweep_interval_ms.to_string(),
            ));
        }
        if !self.uri_path.starts_with('/') {
            return Err(ConfigError::InvalidPath("uri_path", self.uri_path.clone()));
        }
        for (name, path) in self.paths.iter() {
            if !path.starts_with('/') {
                return Err(ConfigError::InvalidPath(name, path.to_string()));
            }
        }
        Ok(())
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session_max_age)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(key, value.to_string())),
    }
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value could not be parsed or is out of range
    #[error("Invalid configuration value for {0}: {1:?}")]
    InvalidValue(&'static str, String),
    /// A reserved path is not absolute
    #[error("Configured path {0} must start with '/': {1:?}")]
    InvalidPath(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_derive_paths_from_base() {
        let config = Config::default();
        assert_eq!(config.paths.stats, "/swagger-stats/stats");
        assert_eq!(config.paths.metrics, "/swagger-stats/metrics");
        assert_eq!(config.paths.logout, "/swagger-stats/logout");
        assert_eq!(config.paths.ui, "/swagger-stats/ux");
        assert_eq!(config.paths.dist, "/swagger-stats/dist");
        assert!(config.paths.prom.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_reads_values() {
        let config = Config::from_lookup(lookup_from(&[
            ("SWS_URI_PATH", "/sws/"),
            ("SWS_AUTHENTICATION", "true"),
            ("SWS_SESSION_MAX_AGE", "60"),
            ("SWS_PATH_PROM", "/metrics"),
        ]))
        .unwrap();

        assert!(config.authentication);
        assert_eq!(config.session_max_age, 60);
        assert_eq!(config.paths.stats, "/sws/stats");
        assert_eq!(config.paths.prom.as_deref(), Some("/metrics"));
    }

    #[test]
    fn test_from_lookup_rejects_malformed_values() {
        let err = Config::from_lookup(lookup_from(&[("SWS_SESSION_MAX_AGE", "soon")]));
        assert!(matches!(err, Err(ConfigError::InvalidValue("SWS_SESSION_MAX_AGE", _))));

        let err = Config::from_lookup(lookup_from(&[("SWS_AUTHENTICATION", "maybe")]));
        assert!(matches!(err, Err(ConfigError::InvalidValue("SWS_AUTHENTICATION", _))));
    }

    #[test]
    fn test_validate_rejects_relative_paths_and_zero_lifetime() {
        let mut config = Config::default();
        config.paths.prom = Some("metrics".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPath("prom", _))));

        let config = Config {
            session_max_age: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_session_lifetime() {
        let config = Config {
            session_max_age: MAX_SESSION_MAX_AGE,
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        let config = Config {
            session_max_age: MAX_SESSION_MAX_AGE + 1,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue("session_max_age", _))
        ));

        let config = Config {
            session_max_age: u64::MAX,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
