// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Packet Relay Bridge
//!
//! The façade every export call lands on. Sends are forwarded only while
//! connected; received packets are drained one at a time into storage the
//! caller owns.

use std::sync::Arc;

use tracing::info;

use crate::config::{BridgeConfig, OversizePolicy};
use crate::error::{DrainError, DrainResult, StartResult};
use crate::lifecycle::ConnectionLifecycleManager;
use crate::transport::{ConnectionState, EngineConfig, PacketBuffer, TransportEngine};

/// Bridge between a foreign caller and the transport engine.
///
/// Draining takes `&mut self`: packets have a single consumer, so the bridge
/// needs no locking of its own.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use relay_bridge_core::{BridgeConfig, EngineConfig, MockTransportEngine, PacketRelayBridge};
///
/// let engine = Arc::new(MockTransportEngine::new());
/// let mut bridge = PacketRelayBridge::new(engine, BridgeConfig::default());
/// bridge.start(&EngineConfig::new("core.json", "session.json"))?;
///
/// bridge.send_packet(b"ping");
///
/// let mut buffer = [0u8; 1024];
/// let written = bridge.drain_next_packet(&mut buffer)?;
/// ```
pub struct PacketRelayBridge<E: TransportEngine> {
    engine: Arc<E>,
    lifecycle: ConnectionLifecycleManager<E>,
    config: BridgeConfig,
}

impl<E: TransportEngine> PacketRelayBridge<E> {
    /// Creates a bridge over a shared engine.
    pub fn new(engine: Arc<E>, config: BridgeConfig) -> Self {
        let lifecycle = ConnectionLifecycleManager::new(Arc::clone(&engine), config.poll_interval());

        PacketRelayBridge {
            engine,
            lifecycle,
            config,
        }
    }

    /// Starts the engine, waits up to `connect_wait_count` polls for the
    /// connection, then spawns the monitor if enabled.
    pub fn start(&mut self, engine_config: &EngineConfig) -> StartResult<()> {
        self.lifecycle
            .start(engine_config, self.config.connect_wait_count)?;

        if self.config.enable_monitor {
            if let Err(err) = self.lifecycle.spawn_monitor(self.config.monitor_wait_count) {
                self.lifecycle.stop();
                return Err(err);
            }
        }

        info!("Client is running");
        Ok(())
    }

    /// Joins the monitor and stops the engine.
    pub fn stop(&mut self) {
        self.lifecycle.stop();
        info!("Client stopped");
    }

    /// Returns true if the engine reports a live connection.
    pub fn is_connected(&self) -> bool {
        self.lifecycle.is_connected()
    }

    /// Returns the engine's connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    /// Forwards `bytes` to the engine.
    ///
    /// Returns false, without touching the engine's send path, when not
    /// connected or when `bytes` is empty. Delivery is the engine's concern.
    pub fn send_packet(&self, bytes: &[u8]) -> bool {
        if bytes.is_empty() || !self.engine.is_connected() {
            return false;
        }

        self.engine.send(bytes);
        true
    }

    /// Moves the next received packet into `destination`.
    ///
    /// - Empty queue: `Ok(0)`, `destination` untouched.
    /// - Depth was stale and no packet came back: [`DrainError::QueueRace`].
    /// - Packet larger than `destination`: [`DrainError::DestinationTooSmall`];
    ///   the packet is released (or requeued under [`OversizePolicy::Requeue`]).
    /// - Otherwise: `Ok(used_size)` with the payload in the front of `destination`.
    ///
    /// A packet taken from the queue is released exactly once on every path
    /// except a successful requeue.
    pub fn drain_next_packet(&mut self, destination: &mut [u8]) -> DrainResult<usize> {
        if self.engine.received_queue_depth() == 0 {
            return Ok(0);
        }

        let packet = self
            .engine
            .take_next_received()
            .ok_or(DrainError::QueueRace)?;

        let used_size = packet.used_size();
        let capacity = destination.len();
        if capacity < used_size {
            let requeued = self.dispose_oversized(packet);
            return Err(DrainError::DestinationTooSmall {
                required: used_size,
                capacity,
                requeued,
            });
        }

        packet.read_into(&mut destination[..used_size]);
        packet.release();

        Ok(used_size)
    }

    /// Returns the bridge configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Returns the lifecycle manager.
    pub fn lifecycle(&self) -> &ConnectionLifecycleManager<E> {
        &self.lifecycle
    }

    /// Returns a reference to the underlying engine.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Returns true if the packet went back to the queue.
    fn dispose_oversized(&self, packet: E::Packet) -> bool {
        let packet = match self.config.oversize_policy {
            OversizePolicy::Drop => packet,
            OversizePolicy::Requeue => match self.engine.requeue_front(packet) {
                Ok(()) => return true,
                Err(packet) => packet,
            },
        };

        packet.release();
        false
    }
}
