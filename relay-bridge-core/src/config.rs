// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bridge Configuration
//!
//! Tuning for the connection wait and the packet hand-off. The transport
//! engine's own option files are separate and opaque (see
//! [`EngineConfig`](crate::transport::EngineConfig)).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Polls performed by the foreground wait in `start`.
pub const DEFAULT_CONNECT_WAIT_COUNT: u32 = 20;

/// Polls performed by the background monitor before it starts watching.
pub const DEFAULT_MONITOR_WAIT_COUNT: u32 = 10;

/// Connectivity poll period.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// What to do with a packet that does not fit the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Release the packet. It is lost and the caller must reallocate.
    #[default]
    Drop,
    /// Put the packet back at the head of the queue if the engine supports it,
    /// otherwise release it as with `Drop`.
    Requeue,
}

/// Configuration for a [`PacketRelayBridge`](crate::bridge::PacketRelayBridge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Maximum polls while `start` waits for the first connection.
    pub connect_wait_count: u32,
    /// Maximum polls the background monitor waits before watching.
    pub monitor_wait_count: u32,
    /// Connectivity poll period in milliseconds.
    pub poll_interval_ms: u64,
    /// Whether `start` spawns the background connection monitor.
    pub enable_monitor: bool,
    /// Handling of packets larger than the destination buffer.
    pub oversize_policy: OversizePolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            connect_wait_count: DEFAULT_CONNECT_WAIT_COUNT,
            monitor_wait_count: DEFAULT_MONITOR_WAIT_COUNT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            enable_monitor: true,
            oversize_policy: OversizePolicy::Drop,
        }
    }
}

impl BridgeConfig {
    /// Parses a config from JSON text. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Checks that all values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Returns the poll period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns a copy with a different poll period.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis().max(1) as u64;
        self
    }
}
