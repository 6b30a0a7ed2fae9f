//! Bridge configuration.

use crate::error::BridgeError;
use crate::lsp_transport::ReconnectOptions;
use crate::lsp_uri::{PageLocation, socket_url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable overriding the language service port.
pub const PORT_ENV_VAR: &str = "OV_LANGUAGE_PORT";

/// Default language service port.
pub const DEFAULT_PORT: u16 = 3010;

/// Path segment the language service listens on.
pub const SERVICE_PATH: &str = "ovLanguage";

/// Connection and session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Host the page was served from.
    pub host: String,
    /// Language service port.
    pub port: u16,
    /// Page was served over a secure origin; selects `wss`.
    pub secure: bool,
    /// Path of the page.
    pub page_path: String,
    /// Service path appended to the page path.
    pub service_path: String,
    /// How long to wait for the `initialize` response.
    pub initialize_timeout_ms: u64,
    /// `clientInfo.name` sent with `initialize`.
    pub client_name: String,
    /// Reconnect policy.
    pub reconnect: ReconnectOptions,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            secure: false,
            page_path: "/".to_string(),
            service_path: SERVICE_PATH.to_string(),
            initialize_timeout_ms: 10_000,
            client_name: "ovbridge".to_string(),
            reconnect: ReconnectOptions::default(),
        }
    }
}

impl BridgeConfig {
    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), BridgeError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), BridgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(PORT_ENV_VAR) {
            self.port = raw.trim().parse().map_err(|_| BridgeError::InvalidEnv {
                key: PORT_ENV_VAR,
                value: raw.clone(),
            })?;
        }
        Ok(())
    }

    /// Location of the page this bridge pretends to be served from.
    pub fn page_location(&self) -> PageLocation {
        PageLocation::new(self.secure, self.host.clone(), self.page_path.clone())
    }

    /// Websocket URL of the language service.
    pub fn socket_url(&self) -> Result<String, BridgeError> {
        socket_url(&self.page_location(), self.port, &self.service_path)
    }

    /// `initialize` timeout as a [`Duration`].
    pub fn initialize_timeout(&self) -> Duration {
        Duration::from_millis(self.initialize_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_build_local_url() {
        let config = BridgeConfig::default();
        assert_eq!(config.socket_url().unwrap(), "ws://localhost:3010/ovLanguage");
    }

    #[test]
    fn test_env_overrides_port() {
        let mut config = BridgeConfig::default();
        config
            .apply_env_from(|key| (key == PORT_ENV_VAR).then(|| " 4020 ".to_string()))
            .unwrap();
        assert_eq!(config.port, 4020);
    }

    #[test]
    fn test_invalid_env_port_is_an_error() {
        let mut config = BridgeConfig::default();
        let err = config
            .apply_env_from(|_| Some("not-a-port".to_string()))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidEnv { key: PORT_ENV_VAR, .. }));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: BridgeConfig = serde_json::from_value(serde_json::json!({
            "secure": true,
            "page_path": "/app/",
            "reconnect": { "max_retries": 3 },
        }))
        .unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.reconnect.max_retries, Some(3));
        assert_eq!(config.reconnect.min_delay_ms, 1_000);
        assert_eq!(config.socket_url().unwrap(), "wss://localhost:3010/app/ovLanguage");
    }
}
