// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Relay Bridge C Bindings
//!
//! Flat exported functions over an explicit bridge handle. Every function
//! reports a boolean status (or a null handle); no error and no panic
//! crosses the boundary.
//!
//! Note: one foreground thread is expected to drive start, send and drain.
//! `relay_bridge_is_connected` is safe from any thread and never waits on
//! the other calls.

#![warn(unsafe_op_in_unsafe_fn)]

use std::ffi::{c_char, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

use relay_bridge_core::{BridgeConfig, EngineConfig, PacketRelayBridge, TransportEngine};

// === Modules ===

mod engine;
mod error;

pub use engine::{ForeignEngine, ForeignPacket, RelayEngineVTable};
pub use error::FfiError;

/// Opaque bridge handle owned by the host.
pub struct RelayBridgeHandle {
    engine: Arc<ForeignEngine>,
    bridge: Mutex<PacketRelayBridge<ForeignEngine>>,
}

impl RelayBridgeHandle {
    fn new(vtable: RelayEngineVTable, config: BridgeConfig) -> Self {
        let engine = Arc::new(ForeignEngine::new(vtable));
        let bridge = PacketRelayBridge::new(Arc::clone(&engine), config);

        RelayBridgeHandle {
            engine,
            bridge: Mutex::new(bridge),
        }
    }
}

// === Boundary helpers ===

/// Runs `f`, turning a panic into `default`.
fn ffi_guard<T>(default: T, f: impl FnOnce() -> T) -> T {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        error!("panic caught at ffi boundary");
        default
    })
}

/// Collapses a call result into a status flag, logging rejections.
fn status(operation: &'static str, result: Result<bool, FfiError>) -> bool {
    result.unwrap_or_else(|err| {
        debug!(operation, error = %err, "ffi call rejected");
        false
    })
}

/// # Safety
/// `handle` must be null or a live pointer from [`relay_bridge_create`].
unsafe fn handle_ref<'a>(handle: *const RelayBridgeHandle) -> Result<&'a RelayBridgeHandle, FfiError> {
    // SAFETY: caller contract.
    unsafe { handle.as_ref() }.ok_or(FfiError::NullPointer("handle"))
}

/// # Safety
/// `ptr` must be null or a NUL-terminated string valid for the call.
unsafe fn str_arg<'a>(ptr: *const c_char, name: &'static str) -> Result<&'a str, FfiError> {
    if ptr.is_null() {
        return Err(FfiError::NullPointer(name));
    }
    // SAFETY: non-null and NUL-terminated per caller contract.
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| FfiError::InvalidUtf8(name))
}

fn length_arg(value: i32, name: &'static str) -> Result<usize, FfiError> {
    usize::try_from(value).map_err(|_| FfiError::NegativeLength { name, value })
}

// === Exported functions ===

/// Creates a bridge over the host engine.
///
/// `config_path` may be null for default settings, or point to a JSON
/// bridge config file. Returns null if the config cannot be loaded.
///
/// # Safety
/// `engine` must satisfy the [`RelayEngineVTable`] contract; `config_path`
/// must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn relay_bridge_create(
    engine: RelayEngineVTable,
    config_path: *const c_char,
) -> *mut RelayBridgeHandle {
    ffi_guard(ptr::null_mut(), || {
        let config = if config_path.is_null() {
            Ok(BridgeConfig::default())
        } else {
            // SAFETY: caller contract.
            unsafe { str_arg(config_path, "config_path") }
                .and_then(|path| BridgeConfig::load(path).map_err(FfiError::from))
        };

        match config {
            Ok(config) => Box::into_raw(Box::new(RelayBridgeHandle::new(engine, config))),
            Err(err) => {
                warn!(error = %err, "relay_bridge_create failed");
                ptr::null_mut()
            }
        }
    })
}

/// Stops the bridge (joining the monitor and stopping the engine) and frees it.
///
/// # Safety
/// `handle` must be null or a live pointer from [`relay_bridge_create`]; it is
/// invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn relay_bridge_destroy(handle: *mut RelayBridgeHandle) {
    if handle.is_null() {
        return;
    }

    ffi_guard((), || {
        // SAFETY: caller contract; ownership returns to Rust exactly once.
        let handle = unsafe { Box::from_raw(handle) };
        handle.bridge.lock().stop();
    })
}

/// Starts the engine and waits for the server connection.
///
/// # Safety
/// `handle` must be a live handle; both paths NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn relay_bridge_start(
    handle: *mut RelayBridgeHandle,
    core_config_path: *const c_char,
    session_config_path: *const c_char,
) -> bool {
    ffi_guard(false, || {
        status("start", (|| -> Result<bool, FfiError> {
            // SAFETY: caller contract.
            let handle = unsafe { handle_ref(handle) }?;
            let core = unsafe { str_arg(core_config_path, "core_config_path") }?;
            let session = unsafe { str_arg(session_config_path, "session_config_path") }?;

            let engine_config = EngineConfig::new(core, session);
            Ok(handle.bridge.lock().start(&engine_config).is_ok())
        })())
    })
}

/// Stops the engine and joins the monitor. The handle stays valid.
///
/// # Safety
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn relay_bridge_stop(handle: *mut RelayBridgeHandle) {
    ffi_guard((), || {
        // SAFETY: caller contract.
        if let Ok(handle) = unsafe { handle_ref(handle) } {
            handle.bridge.lock().stop();
        }
    })
}

/// Returns true if the engine reports a live connection.
///
/// # Safety
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn relay_bridge_is_connected(handle: *const RelayBridgeHandle) -> bool {
    ffi_guard(false, || {
        // SAFETY: caller contract.
        status("is_connected", unsafe { handle_ref(handle) }.map(|h| h.engine.is_connected()))
    })
}

/// Sends `length` bytes from `data`. Returns false if not connected.
///
/// # Safety
/// `data` must be valid for `length` reads.
#[no_mangle]
pub unsafe extern "C" fn relay_bridge_send_packet(
    handle: *mut RelayBridgeHandle,
    data: *const u8,
    length: i32,
) -> bool {
    ffi_guard(false, || {
        status("send_packet", (|| -> Result<bool, FfiError> {
            // SAFETY: caller contract.
            let handle = unsafe { handle_ref(handle) }?;
            let length = length_arg(length, "length")?;
            if length == 0 {
                return Ok(false);
            }
            if data.is_null() {
                return Err(FfiError::NullPointer("data"));
            }

            // SAFETY: non-null and valid for `length` reads per caller contract.
            let bytes = unsafe { std::slice::from_raw_parts(data, length) };
            Ok(handle.bridge.lock().send_packet(bytes))
        })())
    })
}

/// Copies the next received packet into `destination`.
///
/// `*out_length` is set on every path once `out_length` is known non-null:
/// to the bytes written on success, otherwise 0. Returns true with
/// `*out_length == 0` when no packet is queued; returns false when not
/// connected, on a queue race, or when the packet exceeds `capacity`
/// (the packet is then dropped unless the bridge is configured to requeue).
///
/// # Safety
/// `destination` must be valid for `capacity` writes; `out_length` must be
/// valid for one write.
#[no_mangle]
pub unsafe extern "C" fn relay_bridge_drain_next_packet(
    handle: *mut RelayBridgeHandle,
    destination: *mut u8,
    out_length: *mut i32,
    capacity: i32,
) -> bool {
    if out_length.is_null() {
        return false;
    }
    // SAFETY: non-null and writable per caller contract.
    unsafe { out_length.write(0) };

    ffi_guard(false, || {
        status("drain_next_packet", (|| -> Result<bool, FfiError> {
            // SAFETY: caller contract.
            let handle = unsafe { handle_ref(handle) }?;
            let capacity = length_arg(capacity, "capacity")?;
            if destination.is_null() && capacity > 0 {
                return Err(FfiError::NullPointer("destination"));
            }

            if !handle.engine.is_connected() {
                return Ok(false);
            }

            let buffer: &mut [u8] = if capacity == 0 {
                &mut []
            } else {
                // SAFETY: non-null and valid for `capacity` writes per caller contract.
                unsafe { std::slice::from_raw_parts_mut(destination, capacity) }
            };

            match handle.bridge.lock().drain_next_packet(buffer) {
                Ok(written) => {
                    // `written` never exceeds `capacity`, which came from an i32.
                    // SAFETY: checked non-null above.
                    unsafe { out_length.write(written as i32) };
                    Ok(true)
                }
                Err(err) => {
                    debug!(error = %err, "drain failed");
                    Ok(false)
                }
            }
        })())
    })
}

/// Installs a stderr log subscriber.
///
/// `filter` is an env-filter directive string; null falls back to
/// `RUST_LOG`, then `info`. Returns false if the filter is invalid or a
/// subscriber is already installed.
///
/// # Safety
/// `filter` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn relay_bridge_init_logging(filter: *const c_char) -> bool {
    ffi_guard(false, || {
        status("init_logging", (|| -> Result<bool, FfiError> {
            let filter = if filter.is_null() {
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
            } else {
                // SAFETY: caller contract.
                let directives = unsafe { str_arg(filter, "filter") }?;
                EnvFilter::try_new(directives).map_err(|e| FfiError::LogFilter(e.to_string()))?
            };

            Ok(tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .is_ok())
        })())
    })
}
