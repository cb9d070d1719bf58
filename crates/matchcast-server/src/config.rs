//! Server configuration and loading.
//!
//! Loading flow:
//! 1. Start with compiled [`ServerConfig::default()`]
//! 2. If a config file is given and exists, deep-merge its JSON over the defaults
//! 3. Apply `MATCHCAST_*` environment variable overrides (highest priority)

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Configuration for the matchcast server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Max inbound WebSocket message and frame size in bytes.
    pub max_message_size: usize,
    /// Capacity of each connection's outbound queue.
    pub send_queue_capacity: usize,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            heartbeat_interval_ms: 30_000,
            max_message_size: 1024 * 1024, // 1 MiB
            send_queue_capacity: 256,
            max_connections: 1024,
        }
    }
}

impl ServerConfig {
    /// Heartbeat interval as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject values the runtime cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("heartbeat_interval_ms", self.heartbeat_interval_ms == 0),
            ("send_queue_capacity", self.send_queue_capacity == 0),
            ("max_message_size", self.max_message_size == 0),
        ];
        match positive.into_iter().find(|(_, zero)| *zero) {
            Some((field, _)) => Err(ConfigError::Invalid {
                field,
                reason: "must be greater than zero",
            }),
            None => Ok(()),
        }
    }
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON or has mistyped fields.
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment override could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },

    /// A setting is out of range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Setting name.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Load config from `path` (if any) with env var overrides.
///
/// A missing file yields defaults; an unreadable or invalid one is an error.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Like [`load_config`], reading overrides through `env` instead of the process environment.
pub fn load_config_with_env(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ServerConfig, ConfigError> {
    let defaults = serde_json::to_value(ServerConfig::default())?;

    let merged = match path {
        Some(path) if path.exists() => {
            debug!(?path, "loading config from file");
            let content = std::fs::read_to_string(path)?;
            let user: Value = serde_json::from_str(&content)?;
            deep_merge(defaults, user)
        }
        Some(path) => {
            debug!(?path, "config file not found, using defaults");
            defaults
        }
        None => defaults,
    };

    let mut config: ServerConfig = serde_json::from_value(merged)?;
    apply_env_overrides(&mut config, env)?;
    config.validate()?;
    Ok(config)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

fn apply_env_overrides(
    config: &mut ServerConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(host) = env("MATCHCAST_HOST") {
        config.host = host;
    }
    if let Some(port) = env("MATCHCAST_PORT") {
        config.port = parse_env("MATCHCAST_PORT", port)?;
    }
    if let Some(ms) = env("MATCHCAST_HEARTBEAT_INTERVAL_MS") {
        config.heartbeat_interval_ms = parse_env("MATCHCAST_HEARTBEAT_INTERVAL_MS", ms)?;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(cfg.max_message_size, 1024 * 1024);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn no_path_gives_defaults() {
        let cfg = load_config_with_env(None, no_env).unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_with_env(Some(&dir.path().join("nope.json")), no_env).unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 9100, "heartbeatIgnored": 1, "heartbeat_interval_ms": 5000}}"#)
            .unwrap();
        let cfg = load_config_with_env(Some(file.path()), no_env).unwrap();
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.heartbeat_interval_ms, 5000);
        assert_eq!(cfg.host, "0.0.0.0");
    }

    #[test]
    fn invalid_json_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert_matches!(
            load_config_with_env(Some(file.path()), no_env),
            Err(ConfigError::Json(_))
        );
    }

    #[test]
    fn env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 9100}}"#).unwrap();
        let env = env_from(&[
            ("MATCHCAST_PORT", "9200"),
            ("MATCHCAST_HOST", "127.0.0.1"),
            ("MATCHCAST_HEARTBEAT_INTERVAL_MS", "250"),
        ]);
        let cfg = load_config_with_env(Some(file.path()), env).unwrap();
        assert_eq!(cfg.port, 9200);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.heartbeat_interval(), Duration::from_millis(250));
    }

    #[test]
    fn bad_env_value_is_error() {
        let env = env_from(&[("MATCHCAST_PORT", "eighty")]);
        let err = load_config_with_env(None, env).unwrap_err();
        assert_matches!(err, ConfigError::InvalidEnv { key: "MATCHCAST_PORT", .. });
    }

    #[test]
    fn zero_sizes_from_file_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"send_queue_capacity": 0}}"#).unwrap();
        assert_matches!(
            load_config_with_env(Some(file.path()), no_env),
            Err(ConfigError::Invalid { field: "send_queue_capacity", .. })
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_message_size": 0}}"#).unwrap();
        assert_matches!(
            load_config_with_env(Some(file.path()), no_env),
            Err(ConfigError::Invalid { field: "max_message_size", .. })
        );
    }

    #[test]
    fn zero_heartbeat_from_env_is_rejected() {
        let env = env_from(&[("MATCHCAST_HEARTBEAT_INTERVAL_MS", "0")]);
        assert_matches!(
            load_config_with_env(None, env),
            Err(ConfigError::Invalid { field: "heartbeat_interval_ms", .. })
        );
    }

    #[test]
    fn defaults_are_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn deep_merge_skips_nulls_and_recurses() {
        let merged = deep_merge(
            json!({"a": 1, "nested": {"x": 1, "y": 2}}),
            json!({"a": null, "nested": {"y": 3}, "b": [1]}),
        );
        assert_eq!(merged, json!({"a": 1, "nested": {"x": 1, "y": 3}, "b": [1]}));
    }
}
