//! Configuration Manager

use std::net::IpAddr;
use std::path::Path;

use anyhow::{bail, Context};

use super::Config;
use crate::Result;

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            config
                .validate()
                .with_context(|| "Configuration validation failed")?;

            Ok(config)
        } else {
            tracing::debug!(
                "Configuration file not found at {}, using defaults",
                path.display()
            );
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.buffer_size < 1024 {
            bail!("buffer_size must be at least 1024 bytes");
        }

        if self.server.buffer_size > 1_048_576 {
            bail!("buffer_size cannot exceed 1MB");
        }

        if self.server.handshake_timeout.is_zero() {
            bail!("handshake_timeout must be greater than 0");
        }

        if self.server.connect_timeout.is_zero() {
            bail!("connect_timeout must be greater than 0");
        }

        if self.server.relay_timeout.is_some_and(|t| t.is_zero()) {
            bail!("relay_timeout must be greater than 0 when set");
        }

        Ok(())
    }

    /// Merge with CLI arguments
    pub fn merge_with_cli_args(&mut self, bind: Option<IpAddr>, port: u16) {
        if let Some(ip) = bind {
            self.server.bind_addr.set_ip(ip);
            tracing::info!("CLI override: bind address set to {}", ip);
        }

        self.server.bind_addr.set_port(port);
    }
}
