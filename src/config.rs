//! Relay Configuration
//!
//! Settings shared by every session. Loaded from `RELAY_*` environment
//! variables or from a JSON document; anything missing keeps its default.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::state::GameOptions;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },

    /// JSON document could not be parsed.
    #[error("invalid config document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Relay-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Code allocation attempts before session creation fails.
    pub max_code_attempts: u32,
    /// The one scene clients may switch to.
    pub allowed_scene: String,
    /// New sessions let the host spawn player-info objects.
    pub host_authoritative: bool,
    /// Connection limit for new sessions.
    pub max_players: usize,
    /// Reports may disconnect clients.
    pub anticheat_enabled: bool,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_code_attempts: 10,
            allowed_scene: "OnlineGame".to_string(),
            host_authoritative: false,
            max_players: 15,
            anticheat_enabled: true,
            log_filter: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Options for a session created without explicit options.
    pub fn game_options(&self) -> GameOptions {
        GameOptions {
            max_players: self.max_players,
            host_authoritative: self.host_authoritative,
        }
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("RELAY_MAX_CODE_ATTEMPTS") {
            config.max_code_attempts = parse("RELAY_MAX_CODE_ATTEMPTS", value)?;
        }
        if let Some(value) = lookup("RELAY_ALLOWED_SCENE") {
            config.allowed_scene = value;
        }
        if let Some(value) = lookup("RELAY_HOST_AUTHORITATIVE") {
            config.host_authoritative = parse_flag(&value);
        }
        if let Some(value) = lookup("RELAY_MAX_PLAYERS") {
            config.max_players = parse("RELAY_MAX_PLAYERS", value)?;
        }
        if let Some(value) = lookup("RELAY_ANTICHEAT") {
            config.anticheat_enabled = parse_flag(&value);
        }
        if let Some(value) = lookup("RELAY_LOG") {
            config.log_filter = value;
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

fn parse_flag(value: &str) -> bool {
    value == "true" || value == "1"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.max_code_attempts, 10);
        assert_eq!(config.allowed_scene, "OnlineGame");
        assert!(!config.host_authoritative);
    }

    #[test]
    fn test_env_overrides() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("RELAY_MAX_CODE_ATTEMPTS", "3"),
            ("RELAY_HOST_AUTHORITATIVE", "1"),
            ("RELAY_ANTICHEAT", "false"),
        ]))
        .unwrap();

        assert_eq!(config.max_code_attempts, 3);
        assert!(config.host_authoritative);
        assert!(!config.anticheat_enabled);
        assert_eq!(config.max_players, 15);
    }

    #[test]
    fn test_env_rejects_bad_number() {
        let err = RelayConfig::from_lookup(lookup(&[("RELAY_MAX_PLAYERS", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "RELAY_MAX_PLAYERS", .. }));
    }

    #[test]
    fn test_json_partial_document() {
        let config = RelayConfig::from_json_str(r#"{ "max_players": 10, "log_filter": "debug" }"#).unwrap();
        assert_eq!(config.max_players, 10);
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.allowed_scene, "OnlineGame");

        let options = config.game_options();
        assert_eq!(options.max_players, 10);
    }

    #[test]
    fn test_json_rejects_garbage() {
        assert!(matches!(RelayConfig::from_json_str("{"), Err(ConfigError::Json(_))));
    }
}
