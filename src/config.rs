//! # Configuration Management
//!
//! Centralized configuration for the peer engine.
//!
//! This module provides structured configuration for peers, including the
//! bind address, the outbound connection timeout, and wire-format limits.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Notes
//! - The default connect timeout (20 s) bounds only the TCP connect phase,
//!   never traffic on an established connection
//! - The frame size limit caps a single wire record, protecting the decode
//!   buffer against a peer that never sends a delimiter

use crate::error::{PeerError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Default timeout for an outbound connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Max allowed size of a single wire frame (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Address peers bind their listening endpoint to by default.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Peer engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PeerConfig {
    /// Local address the listening endpoint binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Liveness bound on the TCP connect phase of outbound connections.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Upper bound on a single encoded wire frame.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_max_frame_size() -> usize {
    MAX_FRAME_SIZE
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            connect_timeout: default_connect_timeout(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

impl PeerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| PeerError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| PeerError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| PeerError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Start with defaults
        let mut config = Self::default();

        // Override with environment variables
        if let Ok(addr) = std::env::var("NET_PEER_BIND_ADDRESS") {
            config.bind_address = addr;
        }

        if let Ok(timeout) = std::env::var("NET_PEER_CONNECT_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.connect_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(size) = std::env::var("NET_PEER_MAX_FRAME_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.max_frame_size = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.bind_address.is_empty() {
            errors.push("bind_address must not be empty".to_string());
        }

        if self.connect_timeout.is_zero() {
            errors.push("connect_timeout must be greater than zero".to_string());
        }

        if self.max_frame_size == 0 {
            errors.push("max_frame_size must be greater than zero".to_string());
        } else if self.max_frame_size > MAX_FRAME_SIZE {
            errors.push(format!(
                "max_frame_size {} exceeds the supported maximum of {} bytes",
                self.max_frame_size, MAX_FRAME_SIZE
            ));
        }

        errors
    }
}
