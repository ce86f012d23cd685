//! Tests for lifecycle
//! Bounded connection wait, start and the background monitor.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{engine_config, with_captured_logs, TEST_POLL_INTERVAL};
use relay_bridge_core::*;

fn started_engine() -> Arc<MockTransportEngine> {
    let engine = Arc::new(MockTransportEngine::new());
    assert!(engine.start(&engine_config()));
    engine
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

// ============================================================================
// Bounded wait
// ============================================================================

#[test]
fn test_wait_fails_after_exactly_maximum_polls() {
    for maximum_wait_count in [1u32, 3, 7] {
        let engine = started_engine();

        let start = Instant::now();
        let (result, logs) = with_captured_logs(|| {
            wait_for_connection(&*engine, TEST_POLL_INTERVAL, maximum_wait_count)
        });
        let elapsed = start.elapsed();

        match result {
            Err(StartError::ConnectTimeout { attempts }) => {
                assert_eq!(attempts, maximum_wait_count)
            }
            other => panic!("expected ConnectTimeout, got {:?}", other),
        }
        assert_eq!(engine.is_connected_calls(), maximum_wait_count);
        assert!(elapsed >= TEST_POLL_INTERVAL * maximum_wait_count);
        assert_eq!(logs.count("Connect to server failed"), 1);
    }
}

#[test]
fn test_wait_returns_at_first_connected_poll() {
    let engine = started_engine();
    engine.connect_after_polls(4);

    let (result, logs) =
        with_captured_logs(|| wait_for_connection(&*engine, TEST_POLL_INTERVAL, 20));

    assert!(result.is_ok());
    assert_eq!(engine.is_connected_calls(), 4);
    assert_eq!(logs.count("Connect to server failed"), 0);
}

#[test]
fn test_wait_already_connected_does_not_sleep() {
    let engine = started_engine();
    engine.set_connected(true);

    let start = Instant::now();
    wait_for_connection(&*engine, Duration::from_secs(5), 20).unwrap();

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(engine.is_connected_calls(), 1);
}

#[test]
fn test_wait_success_on_last_allowed_poll() {
    let engine = started_engine();
    // Polls 1..=3 fail; the loop gives up after its third sleep.
    engine.connect_after_polls(3);

    let result = wait_for_connection(&*engine, TEST_POLL_INTERVAL, 3);
    assert!(result.is_ok());
}

// ============================================================================
// Start / stop
// ============================================================================

#[test]
fn test_start_transport_failure_is_not_retried() {
    let engine = Arc::new(MockTransportEngine::new());
    engine.set_start_result(false);
    let mut lifecycle = ConnectionLifecycleManager::new(Arc::clone(&engine), TEST_POLL_INTERVAL);

    let (result, logs) = with_captured_logs(|| lifecycle.start(&engine_config(), 20));

    assert!(matches!(result, Err(StartError::TransportStartFailed)));
    assert_eq!(engine.start_calls(), 1);
    assert_eq!(engine.is_connected_calls(), 0);
    assert_eq!(logs.count("Connect to server failed"), 0);
}

#[test]
fn test_start_passes_config_through() {
    let engine = Arc::new(MockTransportEngine::new());
    engine.connect_after_polls(1);
    let mut lifecycle = ConnectionLifecycleManager::new(Arc::clone(&engine), TEST_POLL_INTERVAL);

    lifecycle.start(&engine_config(), 20).unwrap();

    assert_eq!(engine.last_config(), Some(engine_config()));
    assert!(lifecycle.is_connected());
    assert_eq!(lifecycle.state(), ConnectionState::Connected);
}

#[test]
fn test_start_timeout_uses_caller_bound() {
    let engine = Arc::new(MockTransportEngine::new());
    let mut lifecycle = ConnectionLifecycleManager::new(Arc::clone(&engine), TEST_POLL_INTERVAL);

    let result = lifecycle.start(&engine_config(), 2);

    assert!(matches!(result, Err(StartError::ConnectTimeout { attempts: 2 })));
    assert_eq!(lifecycle.state(), ConnectionState::Connecting);
}

#[test]
fn test_stop_stops_engine() {
    let engine = Arc::new(MockTransportEngine::new());
    engine.connect_after_polls(1);
    let mut lifecycle = ConnectionLifecycleManager::new(Arc::clone(&engine), TEST_POLL_INTERVAL);
    lifecycle.start(&engine_config(), 20).unwrap();

    lifecycle.stop();

    assert_eq!(engine.stop_calls(), 1);
    assert!(!lifecycle.is_connected());
    assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
}

// ============================================================================
// Monitor
// ============================================================================

#[test]
fn test_monitor_exits_when_connection_lost() {
    let engine = started_engine();
    engine.set_connected(true);
    let mut lifecycle = ConnectionLifecycleManager::new(Arc::clone(&engine), TEST_POLL_INTERVAL);

    lifecycle.spawn_monitor(10).unwrap();
    assert!(lifecycle.is_monitor_running());

    // Let the monitor finish its initial wait before dropping the link.
    assert!(wait_until(Duration::from_secs(5), || engine
        .is_connected_calls()
        >= 2));
    engine.set_connected(false);
    assert!(wait_until(Duration::from_secs(5), || !lifecycle
        .is_monitor_running()));
    assert_eq!(lifecycle.stop_monitor(), Some(MonitorExit::ConnectionLost));
}

#[test]
fn test_monitor_gives_up_after_its_own_bound() {
    let engine = started_engine();
    let mut lifecycle = ConnectionLifecycleManager::new(Arc::clone(&engine), TEST_POLL_INTERVAL);

    lifecycle.spawn_monitor(2).unwrap();

    assert!(wait_until(Duration::from_secs(5), || !lifecycle
        .is_monitor_running()));
    assert_eq!(lifecycle.stop_monitor(), Some(MonitorExit::ConnectTimeout));
}

#[test]
fn test_monitor_never_reconnects() {
    let engine = started_engine();
    engine.set_connected(true);
    let mut lifecycle = ConnectionLifecycleManager::new(Arc::clone(&engine), TEST_POLL_INTERVAL);
    lifecycle.spawn_monitor(10).unwrap();

    engine.set_connected(false);
    assert!(wait_until(Duration::from_secs(5), || !lifecycle
        .is_monitor_running()));

    assert_eq!(engine.start_calls(), 1);
    assert!(!engine.is_connected());
}

#[test]
fn test_stop_joins_running_monitor() {
    let engine = started_engine();
    engine.set_connected(true);
    let mut lifecycle = ConnectionLifecycleManager::new(Arc::clone(&engine), TEST_POLL_INTERVAL);
    lifecycle.spawn_monitor(10).unwrap();

    lifecycle.stop();

    assert!(!lifecycle.is_monitor_running());
    assert_eq!(lifecycle.stop_monitor(), None);
    assert_eq!(engine.stop_calls(), 1);
}

#[test]
fn test_monitor_polls_concurrently_with_foreground() {
    let engine = started_engine();
    engine.set_connected(true);
    let mut lifecycle = ConnectionLifecycleManager::new(Arc::clone(&engine), TEST_POLL_INTERVAL);
    lifecycle.spawn_monitor(10).unwrap();

    for _ in 0..50 {
        assert!(lifecycle.is_connected());
    }
    let polls_before = engine.is_connected_calls();
    thread::sleep(TEST_POLL_INTERVAL * 4);

    assert!(engine.is_connected_calls() > polls_before);
    assert_eq!(lifecycle.stop_monitor(), Some(MonitorExit::Cancelled));
}
