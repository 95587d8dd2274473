use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tk_keep::KeepConfig;

use crate::error::{ServerError, ServerResult};

/// User name reported when none is configured and `$USER` is unset.
pub const GUEST: &str = "GUEST";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Reported by `/status`.
    pub username: String,
    /// Recipe the client space is built from, reported by `/status`.
    pub recipe: String,
    /// Store journal; an in-memory store is used when unset.
    pub journal: Option<PathBuf>,
    pub keep: KeepConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            username: default_username(),
            recipe: "all".to_string(),
            journal: None,
            keep: KeepConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read a TOML config file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }
}

fn default_username() -> String {
    std::env::var("USER")
        .ok()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| GUEST.to_string())
}
