//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from `path`, writing the defaults there if the file is missing.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: Self = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            info!("No {} found, creating default config", path.display());
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            default_config
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the tick loop or the one-byte id space cannot honour.
    pub fn validate(&self) -> anyhow::Result<()> {
        let server = &self.server;
        anyhow::ensure!(
            (1..=255).contains(&server.capacity),
            "server.capacity must be between 1 and 255, got {}",
            server.capacity
        );
        anyhow::ensure!(
            server.tick_interval_ms > 0,
            "server.tick_interval_ms must be positive"
        );
        anyhow::ensure!(
            server.ping_interval_ms > 0,
            "server.ping_interval_ms must be positive"
        );
        Ok(())
    }
}

/// Server networking and tick settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum simultaneous players (ids are one byte on the wire).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Tick interval in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Interval of the ping pulse carried in every snapshot.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_ms: u64,
    /// Consecutive late ticks before an overrun warning is logged.
    #[serde(default = "default_overrun_warn_ticks")]
    pub overrun_warn_ticks: u32,
}

impl ServerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            capacity: default_capacity(),
            tick_interval_ms: default_tick_interval(),
            ping_interval_ms: default_ping_interval(),
            overrun_warn_ticks: default_overrun_warn_ticks(),
        }
    }
}

fn default_port() -> u16 {
    15466
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_capacity() -> usize {
    16
}
fn default_tick_interval() -> u64 {
    50
}
fn default_ping_interval() -> u64 {
    3000
}
fn default_overrun_warn_ticks() -> u32 {
    20
}
