//! Mock Transport Engine
//!
//! In-process engine double for tests. Connectivity is scripted, sends are
//! recorded, and every packet it allocates is accounted for in a
//! [`PacketLedger`] so that leaks and double releases show up as counts.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::transport::{ConnectionState, EngineConfig, PacketBuffer, TransportEngine};

/// Allocation accounting shared by a mock engine and its packets.
#[derive(Debug, Default)]
pub struct PacketLedger {
    allocated: AtomicUsize,
    released: AtomicUsize,
    leaked: AtomicUsize,
}

impl PacketLedger {
    /// Packets created by the engine.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    /// Packets returned through [`PacketBuffer::release`].
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Packets dropped without ever being released.
    pub fn leaked(&self) -> usize {
        self.leaked.load(Ordering::SeqCst)
    }

    /// Packets still alive (queued or held by a consumer).
    pub fn outstanding(&self) -> usize {
        self.allocated() - self.released() - self.leaked()
    }
}

/// Packet handed out by [`MockTransportEngine`].
#[derive(Debug)]
pub struct MockPacket {
    bytes: Vec<u8>,
    ledger: Arc<PacketLedger>,
    released: bool,
}

impl MockPacket {
    fn new(bytes: Vec<u8>, ledger: Arc<PacketLedger>) -> Self {
        ledger.allocated.fetch_add(1, Ordering::SeqCst);
        MockPacket {
            bytes,
            ledger,
            released: false,
        }
    }

    /// Payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl PacketBuffer for MockPacket {
    fn used_size(&self) -> usize {
        self.bytes.len()
    }

    fn read_into(&self, destination: &mut [u8]) {
        let len = destination.len();
        destination.copy_from_slice(&self.bytes[..len]);
    }

    fn release(mut self) {
        self.released = true;
        self.ledger.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for MockPacket {
    fn drop(&mut self) {
        if !self.released {
            self.ledger.leaked.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Debug)]
struct MockState {
    running: bool,
    start_result: bool,
    connected: bool,
    connect_after_polls: Option<u32>,
    polls_since_start: u32,
    is_connected_calls: u32,
    start_calls: u32,
    stop_calls: u32,
    sent: Vec<Vec<u8>>,
    received: VecDeque<MockPacket>,
    phantom_depth: usize,
    requeue_supported: bool,
    last_config: Option<EngineConfig>,
}

impl Default for MockState {
    fn default() -> Self {
        MockState {
            running: false,
            start_result: true,
            connected: false,
            connect_after_polls: None,
            polls_since_start: 0,
            is_connected_calls: 0,
            start_calls: 0,
            stop_calls: 0,
            sent: Vec::new(),
            received: VecDeque::new(),
            phantom_depth: 0,
            requeue_supported: false,
            last_config: None,
        }
    }
}

/// Scriptable transport engine for tests.
///
/// A freshly started engine is not connected. Use
/// [`set_connected`](Self::set_connected) or
/// [`connect_after_polls`](Self::connect_after_polls) to bring it up.
#[derive(Debug, Default)]
pub struct MockTransportEngine {
    state: Mutex<MockState>,
    ledger: Arc<PacketLedger>,
}

impl MockTransportEngine {
    /// Creates a stopped, disconnected engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `start` calls return `result`.
    pub fn set_start_result(&self, result: bool) {
        self.state.lock().start_result = result;
    }

    /// Forces the reported connectivity.
    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    /// Reports connected from the `polls`-th `is_connected` call after start.
    pub fn connect_after_polls(&self, polls: u32) {
        self.state.lock().connect_after_polls = Some(polls);
    }

    /// Enables [`TransportEngine::requeue_front`].
    pub fn set_requeue_supported(&self, supported: bool) {
        self.state.lock().requeue_supported = supported;
    }

    /// Appends an inbound packet to the receive queue.
    pub fn queue_receive(&self, bytes: impl Into<Vec<u8>>) {
        let packet = MockPacket::new(bytes.into(), Arc::clone(&self.ledger));
        self.state.lock().received.push_back(packet);
    }

    /// Makes the queue depth report one packet that `take_next_received`
    /// will not deliver.
    pub fn inject_queue_race(&self) {
        self.state.lock().phantom_depth += 1;
    }

    /// Packet accounting.
    pub fn ledger(&self) -> &Arc<PacketLedger> {
        &self.ledger
    }

    /// Payloads passed to `send`, in order.
    pub fn sent_packets(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    /// Total `is_connected` calls.
    pub fn is_connected_calls(&self) -> u32 {
        self.state.lock().is_connected_calls
    }

    /// Total `start` calls.
    pub fn start_calls(&self) -> u32 {
        self.state.lock().start_calls
    }

    /// Total `stop` calls.
    pub fn stop_calls(&self) -> u32 {
        self.state.lock().stop_calls
    }

    /// Returns true between a successful `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Config passed to the most recent `start`.
    pub fn last_config(&self) -> Option<EngineConfig> {
        self.state.lock().last_config.clone()
    }
}

impl TransportEngine for MockTransportEngine {
    type Packet = MockPacket;

    fn start(&self, config: &EngineConfig) -> bool {
        let mut state = self.state.lock();
        state.start_calls += 1;
        state.last_config = Some(config.clone());
        if !state.start_result {
            return false;
        }
        state.running = true;
        state.polls_since_start = 0;
        true
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.stop_calls += 1;
        state.running = false;
        state.connected = false;
    }

    fn is_connected(&self) -> bool {
        let mut state = self.state.lock();
        state.is_connected_calls += 1;
        if !state.running {
            return false;
        }

        state.polls_since_start += 1;
        if let Some(threshold) = state.connect_after_polls {
            if state.polls_since_start >= threshold {
                state.connected = true;
                state.connect_after_polls = None;
            }
        }
        state.connected
    }

    fn send(&self, bytes: &[u8]) {
        self.state.lock().sent.push(bytes.to_vec());
    }

    fn received_queue_depth(&self) -> usize {
        let state = self.state.lock();
        state.received.len() + state.phantom_depth
    }

    fn take_next_received(&self) -> Option<MockPacket> {
        let mut state = self.state.lock();
        match state.received.pop_front() {
            Some(packet) => Some(packet),
            None => {
                state.phantom_depth = state.phantom_depth.saturating_sub(1);
                None
            }
        }
    }

    fn requeue_front(&self, packet: MockPacket) -> Result<(), MockPacket> {
        let mut state = self.state.lock();
        if !state.requeue_supported {
            return Err(packet);
        }
        state.received.push_front(packet);
        Ok(())
    }

    /// Reads the scripted state without counting as a poll.
    fn connection_state(&self) -> ConnectionState {
        let state = self.state.lock();
        match (state.running, state.connected) {
            (true, true) => ConnectionState::Connected,
            (true, false) => ConnectionState::Connecting,
            (false, _) => ConnectionState::Disconnected,
        }
    }
}
