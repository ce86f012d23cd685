//! Relay Bridge Core Library
//!
//! Client-side bridge between an external reliable-UDP transport engine and
//! a foreign caller: bounded-retry connection establishment, a background
//! liveness monitor, and a one-packet-at-a-time hand-off of received buffers
//! into caller-owned storage.

#![forbid(unsafe_code)]

pub mod bridge;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod mock;
pub mod transport;

pub use bridge::PacketRelayBridge;
pub use config::{
    BridgeConfig, OversizePolicy, DEFAULT_CONNECT_WAIT_COUNT, DEFAULT_MONITOR_WAIT_COUNT,
    DEFAULT_POLL_INTERVAL_MS,
};
pub use error::{ConfigError, DrainError, DrainResult, StartError, StartResult};
pub use lifecycle::{wait_for_connection, ConnectionLifecycleManager, ConnectionMonitor, MonitorExit};
pub use mock::{MockPacket, MockTransportEngine, PacketLedger};
pub use transport::{ConnectionState, EngineConfig, PacketBuffer, TransportEngine};
