//! Optional TOML configuration.
//!
//! ```toml
//! [client]
//! host = "10.0.0.2:1213"
//! chunk_size = 65536
//! compress = true
//!
//! [server]
//! port = 1213
//! path = "/srv/ferry"
//! chunk_size = 4096
//! ```
//!
//! Every key is optional. Command-line flags override file values.

use std::path::{Path, PathBuf};

use anyhow::Context;
use ferry_data_channel::ServerConfig;
use ferry_protocol::{DEFAULT_CHUNK_SIZE, DEFAULT_PORT};
use ferry_transfer::TransferConfig;
use serde::{Deserialize, Serialize};

use crate::cli::{ClientArgs, ServerArgs};

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSection {
    /// Remote server, `host:port`.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default)]
    pub compress: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served.
    #[serde(default = "default_path")]
    pub path: PathBuf,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_host() -> String {
    format!("0.0.0.0:{DEFAULT_PORT}")
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_path() -> PathBuf {
    PathBuf::from("./")
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            chunk_size: default_chunk_size(),
            compress: false,
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            path: default_path(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Config {
    /// Reads `path`, or returns the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Client settings with flag overrides applied. Not yet validated.
    pub fn transfer_config(&self, args: &ClientArgs) -> TransferConfig {
        let host = args.host.clone().unwrap_or_else(|| self.client.host.clone());
        let chunk_size = args.chunk_size.unwrap_or(self.client.chunk_size);
        TransferConfig::new(host, chunk_size).with_compression(args.compress || self.client.compress)
    }

    /// Server settings with flag overrides applied.
    pub fn server_config(&self, args: &ServerArgs) -> ServerConfig {
        ServerConfig {
            root_path: args.path.clone().unwrap_or_else(|| self.server.path.clone()),
            port: args.port.unwrap_or(self.server.port),
            chunk_size: args.chunk_size.unwrap_or(self.server.chunk_size),
        }
    }
}
