//! Configuration file and command-line overrides.
//!
//! Resolution order (later wins): built-in defaults, the TOML file, `OV_LANGUAGE_PORT`, flags.

use anyhow::{Context, Result};
use ovbridge_lsp::BridgeConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Choices offered by the page controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
    /// Cultures for `cultureSelectBox`; empty hides the control.
    pub cultures: Vec<String>,
    /// Target languages for `languageSelectBox`; empty hides the control.
    pub languages: Vec<String>,
}

/// Contents of the `--config` file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// `[server]`
    pub server: BridgeConfig,
    /// `[options]`
    pub options: OptionsConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Server flags that override the file and environment.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ServerOverrides {
    /// Host the language service runs on.
    #[arg(long)]
    pub host: Option<String>,
    /// Language service port (overrides OV_LANGUAGE_PORT).
    #[arg(long)]
    pub port: Option<u16>,
    /// Connect with `wss`.
    #[arg(long)]
    pub secure: bool,
    /// Page path the service path is appended to.
    #[arg(long, value_name = "PATH")]
    pub page_path: Option<String>,
}

impl ServerOverrides {
    pub fn apply(&self, config: &mut BridgeConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.secure {
            config.secure = true;
        }
        if let Some(page_path) = &self.page_path {
            config.page_path = page_path.clone();
        }
    }
}

/// Resolve the effective configuration.
pub fn resolve<F>(
    file: Option<&Path>,
    overrides: &ServerOverrides,
    env: F,
) -> Result<(BridgeConfig, OptionsConfig)>
where
    F: Fn(&str) -> Option<String>,
{
    let FileConfig {
        mut server,
        options,
    } = match file {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    server.apply_env_from(env)?;
    overrides.apply(&mut server);
    Ok((server, options))
}
