//! Transport Engine Traits
//!
//! Abstraction over the external reliable-UDP client engine and the network
//! buffers it hands out. The engine owns retransmission, congestion control
//! and framing; the bridge only starts it, watches connectivity and moves
//! bytes in and out.

use std::path::{Path, PathBuf};

/// Connection state as reported by the transport engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to the server.
    Disconnected,
    /// Engine started, handshake still in progress.
    Connecting,
    /// Connected and ready.
    Connected,
}

/// Paths to the engine's own configuration files.
///
/// The bridge never reads these; they are passed through to
/// [`TransportEngine::start`] unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Client core option file.
    pub core_config_path: PathBuf,
    /// Session getter option file.
    pub session_config_path: PathBuf,
}

impl EngineConfig {
    /// Creates an engine config from the two option file paths.
    pub fn new(core_config_path: impl Into<PathBuf>, session_config_path: impl Into<PathBuf>) -> Self {
        EngineConfig {
            core_config_path: core_config_path.into(),
            session_config_path: session_config_path.into(),
        }
    }

    /// Returns the client core option file path.
    pub fn core_config_path(&self) -> &Path {
        &self.core_config_path
    }

    /// Returns the session getter option file path.
    pub fn session_config_path(&self) -> &Path {
        &self.session_config_path
    }
}

/// One fully reassembled inbound message.
///
/// A packet is exclusively owned by whoever holds it. [`release`](Self::release)
/// consumes the packet and returns its storage to the engine's allocator, so a
/// packet can be released at most once.
pub trait PacketBuffer {
    /// Number of payload bytes in the packet.
    fn used_size(&self) -> usize;

    /// Copies the first `destination.len()` payload bytes into `destination`.
    ///
    /// Callers never pass a slice longer than [`used_size`](Self::used_size).
    fn read_into(&self, destination: &mut [u8]);

    /// Returns the packet's storage to the engine.
    fn release(self);
}

/// Transport engine interface.
///
/// Implementations must be safe to query from several threads at once:
/// the foreground caller and the background connection monitor both call
/// [`is_connected`](Self::is_connected) concurrently.
///
/// # Example
///
/// ```ignore
/// use relay_bridge_core::{EngineConfig, MockTransportEngine, TransportEngine};
///
/// let engine = MockTransportEngine::new();
/// assert!(engine.start(&EngineConfig::new("core.json", "session.json")));
/// engine.send(b"hello");
/// ```
pub trait TransportEngine: Send + Sync + 'static {
    /// Packet type handed out by the receive queue.
    type Packet: PacketBuffer;

    /// Starts the engine. Returns false if the engine could not start.
    fn start(&self, config: &EngineConfig) -> bool;

    /// Stops the engine. Safe to call when not started.
    fn stop(&self);

    /// Returns true once the server connection is established.
    fn is_connected(&self) -> bool;

    /// Queues bytes for reliable delivery. Fire-and-forget.
    fn send(&self, bytes: &[u8]);

    /// Number of packets waiting in the receive queue.
    fn received_queue_depth(&self) -> usize;

    /// Removes the packet at the head of the receive queue.
    fn take_next_received(&self) -> Option<Self::Packet>;

    /// Puts a packet back at the head of the receive queue.
    ///
    /// Engines that cannot requeue hand the packet back in `Err`, and the
    /// caller releases it.
    fn requeue_front(&self, packet: Self::Packet) -> Result<(), Self::Packet> {
        Err(packet)
    }

    /// Returns the current connection state.
    ///
    /// The default derives the state from [`is_connected`](Self::is_connected)
    /// alone; engines that track the handshake can report `Connecting`.
    fn connection_state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}
