//! TOML configuration.
//!
//! ```toml
//! log_level = "debug"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 0              # 0 = ephemeral, the bound port is printed on stdout
//! replay_on_join = true
//! channel_capacity = 256
//!
//! [client]
//! output = "preview.html"
//! title = "Live Buffer"
//! format = "markdown"   # or "raw"
//! ```
//!
//! Every key is optional. Command-line flags override file values.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{LiveError, Result};
use crate::render::RenderFormat;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_level: String,
    pub server: ServerConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Send late joiners a snapshot of the relayed document.
    pub replay_on_join: bool,
    /// Messages buffered per hub before slow viewers start skipping.
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// HTML file rewritten on each render; stdout when unset.
    pub output: Option<PathBuf>,
    pub title: String,
    pub format: RenderFormat,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            server: ServerConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            replay_on_join: true,
            channel_capacity: 256,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            output: None,
            title: "Live Buffer".into(),
            format: RenderFormat::Markdown,
        }
    }
}

impl LiveConfig {
    /// Parse TOML text. `origin` names the source in error messages.
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self> {
        let config: LiveConfig = toml::from_str(text).map_err(|source| LiveError::Config {
            origin: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Self::from_toml_str(&text, &path.display().to_string())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(LiveError::InvalidConfig("server.host must not be empty".into()));
        }
        if self.server.channel_capacity == 0 {
            return Err(LiveError::InvalidConfig(
                "server.channel_capacity must be >= 1".into(),
            ));
        }
        if self.log_level.trim().is_empty() {
            return Err(LiveError::InvalidConfig("log_level must not be empty".into()));
        }
        Ok(())
    }
}
