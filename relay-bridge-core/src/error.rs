// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bridge Error Types
//!
//! One error enum per failure domain. Nothing here is ever thrown across the
//! export surface; bindings collapse these into boolean status codes.

use thiserror::Error;

/// Failure to bring a connection up.
#[derive(Error, Debug)]
pub enum StartError {
    /// The transport engine refused to start. Not retried at this layer.
    #[error("transport engine failed to start")]
    TransportStartFailed,

    /// The engine started but never reported connectivity within the wait bound.
    #[error("connect to server timed out after {attempts} attempts")]
    ConnectTimeout {
        /// Number of polls performed before giving up.
        attempts: u32,
    },

    /// A shutdown request was observed between polls.
    #[error("connection wait cancelled")]
    Cancelled,

    /// The background monitor thread could not be spawned.
    #[error("failed to spawn connection monitor: {0}")]
    MonitorSpawn(#[from] std::io::Error),
}

/// Failure to hand off a received packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DrainError {
    /// The engine reported queued packets but returned none.
    #[error("receive queue reported data but no packet was available")]
    QueueRace,

    /// The caller's buffer cannot hold the packet.
    ///
    /// Unless `requeued` is set the packet has been released and is lost.
    #[error("destination too small: packet needs {required} bytes, capacity is {capacity}")]
    DestinationTooSmall {
        /// Used size of the packet.
        required: usize,
        /// Capacity the caller supplied.
        capacity: usize,
        /// Whether the packet went back to the head of the receive queue.
        requeued: bool,
    },
}

/// Failure to load or validate a [`BridgeConfig`](crate::config::BridgeConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    /// The config text is not valid JSON for the config schema.
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for connection start operations.
pub type StartResult<T> = Result<T, StartError>;

/// Result type for drain operations.
pub type DrainResult<T> = Result<T, DrainError>;
