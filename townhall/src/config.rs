//! Server configuration.
//!
//! Read from an optional RON file, every field has a default. `PORT` and `TOWNHALL_WS_PORT`
//! override the listening ports afterwards.
//!
//! ```ron
//! (
//!     http_addr: "0.0.0.0:8080",
//!     data_dir: "/var/lib/townhall",
//!     sync: (enabled: false),
//! )
//! ```

use crate::common::Error;
use crate::consts::{
    DEFAULT_DATA_DIR, DEFAULT_HTTP_PORT, DEFAULT_PUBLIC_DIR, DEFAULT_WS_PORT, PORT_ENV,
    PUSH_ATTEMPTS, PUSH_BACKOFF_MS, PUSH_TIMEOUT_SECS, SUBSCRIBER_QUEUE, SYNC_QUEUE, WS_PORT_ENV,
};
use log::warn;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP API and static files.
    pub http_addr: SocketAddr,
    /// Real-time WebSocket listener.
    pub ws_addr: SocketAddr,
    /// Directory holding `events.json` and `programs.json`, created on demand.
    pub data_dir: PathBuf,
    /// Served as a fallback for every non-API path when set.
    pub public_dir: Option<PathBuf>,
    /// Fail a mutation with 500 (and roll it back) when it could not be written to disk.
    /// Off by default: the write error is only logged and the caller still sees success.
    pub strict_persistence: bool,
    /// Per-subscriber queue length, a subscriber falling this far behind is dropped.
    pub subscriber_queue: usize,
    pub sync: SyncConfig,
}

/// Best-effort git commit and push after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    /// Working tree git runs in.
    pub repo_dir: PathBuf,
    /// Pending changes the worker accepts before new ones are dropped.
    pub queue: usize,
    pub push_attempts: u32,
    /// Delay before the first push retry, doubled on each further one.
    pub backoff_ms: u64,
    pub push_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            http_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
            ws_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_WS_PORT)),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            public_dir: Some(PathBuf::from(DEFAULT_PUBLIC_DIR)),
            strict_persistence: false,
            subscriber_queue: SUBSCRIBER_QUEUE,
            sync: SyncConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            enabled: true,
            repo_dir: PathBuf::from("."),
            queue: SYNC_QUEUE,
            push_attempts: PUSH_ATTEMPTS,
            backoff_ms: PUSH_BACKOFF_MS,
            push_timeout_secs: PUSH_TIMEOUT_SECS,
        }
    }
}

impl SyncConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }
}

impl Config {
    /// Reads `path` if given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
                Self::from_ron_str(&contents)?
            }
            None => Config::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_ron_str(s: &str) -> Result<Self, Error> {
        ron::de::from_str(s).map_err(|e| Error::Config(format!("{e}")))
    }

    pub fn to_ron_string(&self) -> Result<String, Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Config(format!("{e}")))
    }

    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = port_from(&var, PORT_ENV) {
            self.http_addr.set_port(port);
        }
        if let Some(port) = port_from(&var, WS_PORT_ENV) {
            self.ws_addr.set_port(port);
        }
    }
}

fn port_from(var: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u16> {
    let value = var(name)?;
    match value.trim().parse() {
        Ok(port) => Some(port),
        Err(_) => {
            warn!("Ignoring {name}={value:?}: not a port number");
            None
        }
    }
}
