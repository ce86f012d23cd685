// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Connection Lifecycle
//!
//! Bounded-retry connection establishment and the optional background
//! liveness monitor.
//!
//! Connection state is never cached here: every answer comes from the
//! transport engine. The only state the manager owns is the retry counter of
//! an in-progress wait and the handle of the monitor thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::{StartError, StartResult};
use crate::transport::{ConnectionState, EngineConfig, TransportEngine};

/// Blocks until the engine reports connectivity, polling once per interval.
///
/// Fails with [`StartError::ConnectTimeout`] after `maximum_wait_count`
/// unsuccessful polls and emits exactly one `"Connect to server failed"`
/// record. A bound of zero behaves like one.
pub fn wait_for_connection<E: TransportEngine>(
    engine: &E,
    poll_interval: Duration,
    maximum_wait_count: u32,
) -> StartResult<()> {
    poll_until_connected(engine, poll_interval, maximum_wait_count, None)
}

fn poll_until_connected<E: TransportEngine>(
    engine: &E,
    poll_interval: Duration,
    maximum_wait_count: u32,
    stop_signal: Option<&AtomicBool>,
) -> StartResult<()> {
    let mut attempts: u32 = 0;

    while !engine.is_connected() {
        // Cancellation is only observed between polls, never mid-sleep.
        if stop_signal.is_some_and(|signal| signal.load(Ordering::SeqCst)) {
            return Err(StartError::Cancelled);
        }

        thread::sleep(poll_interval);
        attempts += 1;

        if attempts >= maximum_wait_count {
            error!(attempts, maximum_wait_count, "Connect to server failed");
            return Err(StartError::ConnectTimeout { attempts });
        }
    }

    Ok(())
}

/// Why the background monitor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// The initial wait ran out before the engine connected.
    ConnectTimeout,
    /// The engine stopped reporting connectivity.
    ConnectionLost,
    /// Shutdown was requested.
    Cancelled,
}

/// Background liveness heartbeat.
///
/// Re-runs a bounded wait, then polls until the connection drops and exits.
/// It never reconnects and never touches the receive queue. The thread is
/// owned by this value: dropping or shutting down the monitor joins it.
pub struct ConnectionMonitor {
    stop_signal: Arc<AtomicBool>,
    handle: Option<JoinHandle<MonitorExit>>,
}

impl ConnectionMonitor {
    /// Spawns the monitor thread.
    pub fn spawn<E: TransportEngine>(
        engine: Arc<E>,
        poll_interval: Duration,
        maximum_wait_count: u32,
    ) -> std::io::Result<Self> {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let signal = Arc::clone(&stop_signal);

        let handle = thread::Builder::new()
            .name("relay-bridge-monitor".into())
            .spawn(move || run_monitor(&*engine, poll_interval, maximum_wait_count, &signal))?;

        Ok(ConnectionMonitor {
            stop_signal,
            handle: Some(handle),
        })
    }

    /// Returns true once the monitor thread has exited on its own.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Requests shutdown and joins the thread.
    ///
    /// Returns `None` if the thread panicked.
    pub fn shutdown(mut self) -> Option<MonitorExit> {
        self.join()
    }

    fn join(&mut self) -> Option<MonitorExit> {
        self.stop_signal.store(true, Ordering::SeqCst);
        self.handle.take().and_then(|handle| handle.join().ok())
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        let _ = self.join();
    }
}

fn run_monitor<E: TransportEngine>(
    engine: &E,
    poll_interval: Duration,
    maximum_wait_count: u32,
    stop_signal: &AtomicBool,
) -> MonitorExit {
    match poll_until_connected(engine, poll_interval, maximum_wait_count, Some(stop_signal)) {
        Ok(()) => {}
        Err(StartError::Cancelled) => return MonitorExit::Cancelled,
        Err(_) => return MonitorExit::ConnectTimeout,
    }

    while engine.is_connected() {
        if stop_signal.load(Ordering::SeqCst) {
            return MonitorExit::Cancelled;
        }
        thread::sleep(poll_interval);
    }

    MonitorExit::ConnectionLost
}

/// Connection lifecycle manager.
///
/// Wraps a shared transport engine and adds:
/// - Bounded-retry wait for the first connection
/// - An owned background monitor, joined on stop
/// - Connection state queries delegated to the engine
///
/// `start` takes `&mut self`, so a manager can only run one start at a time.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use std::time::Duration;
/// use relay_bridge_core::{ConnectionLifecycleManager, EngineConfig, MockTransportEngine};
///
/// let engine = Arc::new(MockTransportEngine::new());
/// let mut lifecycle = ConnectionLifecycleManager::new(engine, Duration::from_secs(1));
/// lifecycle.start(&EngineConfig::new("core.json", "session.json"), 20)?;
/// ```
pub struct ConnectionLifecycleManager<E: TransportEngine> {
    engine: Arc<E>,
    poll_interval: Duration,
    monitor: Option<ConnectionMonitor>,
}

impl<E: TransportEngine> ConnectionLifecycleManager<E> {
    /// Creates a new lifecycle manager.
    pub fn new(engine: Arc<E>, poll_interval: Duration) -> Self {
        ConnectionLifecycleManager {
            engine,
            poll_interval,
            monitor: None,
        }
    }

    /// Starts the engine and waits for the first connection.
    ///
    /// An engine start failure is returned immediately without polling.
    pub fn start(&mut self, config: &EngineConfig, maximum_wait_count: u32) -> StartResult<()> {
        if !self.engine.start(config) {
            warn!(
                core_config = %config.core_config_path.display(),
                session_config = %config.session_config_path.display(),
                "Core start failed"
            );
            return Err(StartError::TransportStartFailed);
        }

        self.wait_for_connection(maximum_wait_count)
    }

    /// Waits for connectivity on the calling thread.
    pub fn wait_for_connection(&self, maximum_wait_count: u32) -> StartResult<()> {
        wait_for_connection(&*self.engine, self.poll_interval, maximum_wait_count)
    }

    /// Spawns the background monitor, replacing any previous one.
    pub fn spawn_monitor(&mut self, maximum_wait_count: u32) -> StartResult<()> {
        self.stop_monitor();

        let monitor =
            ConnectionMonitor::spawn(Arc::clone(&self.engine), self.poll_interval, maximum_wait_count)?;
        self.monitor = Some(monitor);
        debug!(maximum_wait_count, "connection monitor started");

        Ok(())
    }

    /// Stops and joins the background monitor, if any.
    pub fn stop_monitor(&mut self) -> Option<MonitorExit> {
        self.monitor.take().and_then(ConnectionMonitor::shutdown)
    }

    /// Returns true while a monitor thread is alive.
    pub fn is_monitor_running(&self) -> bool {
        self.monitor.as_ref().is_some_and(|m| !m.is_finished())
    }

    /// Joins the monitor, then stops the engine.
    pub fn stop(&mut self) {
        self.stop_monitor();
        self.engine.stop();
    }

    /// Returns true if the engine reports a live connection.
    pub fn is_connected(&self) -> bool {
        self.engine.is_connected()
    }

    /// Returns the engine's connection state.
    pub fn state(&self) -> ConnectionState {
        self.engine.connection_state()
    }

    /// Returns the configured poll period.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns a reference to the underlying engine.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }
}

impl<E: TransportEngine> Drop for ConnectionLifecycleManager<E> {
    fn drop(&mut self) {
        self.stop_monitor();
    }
}
