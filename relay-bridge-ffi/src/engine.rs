// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Foreign transport engine.
//!
//! The host plugs its reliable-UDP engine in through [`RelayEngineVTable`], a
//! table of C function pointers plus an opaque context. [`ForeignEngine`] maps
//! that table onto [`TransportEngine`], and [`ForeignPacket`] owns one packet
//! pointer until it is released.

use std::ffi::{c_char, c_void, CString};
use std::path::Path;
use std::ptr::NonNull;

use relay_bridge_core::{EngineConfig, PacketBuffer, TransportEngine};

/// Host-side engine entry points.
///
/// Every entry except `requeue_front` must be non-null. The host guarantees
/// that `context` stays valid, and that the entries are safe to call from
/// any thread, until the bridge handle built on them is destroyed.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RelayEngineVTable {
    /// Opaque pointer passed back to every engine entry.
    pub context: *mut c_void,
    /// Starts the engine with two NUL-terminated UTF-8 option file paths.
    pub start: unsafe extern "C" fn(
        context: *mut c_void,
        core_config_path: *const c_char,
        session_config_path: *const c_char,
    ) -> bool,
    pub stop: unsafe extern "C" fn(context: *mut c_void),
    pub is_connected: unsafe extern "C" fn(context: *mut c_void) -> bool,
    pub send: unsafe extern "C" fn(context: *mut c_void, data: *const u8, length: usize),
    pub received_queue_depth: unsafe extern "C" fn(context: *mut c_void) -> usize,
    /// Returns the head packet, transferring ownership, or null.
    pub take_next_received: unsafe extern "C" fn(context: *mut c_void) -> *mut c_void,
    pub packet_used_size: unsafe extern "C" fn(packet: *mut c_void) -> usize,
    pub packet_read: unsafe extern "C" fn(packet: *mut c_void, destination: *mut u8, length: usize),
    /// Frees a packet obtained from `take_next_received`.
    pub packet_free: unsafe extern "C" fn(packet: *mut c_void),
    /// Optional. Returns true if the engine took the packet back.
    pub requeue_front: Option<unsafe extern "C" fn(context: *mut c_void, packet: *mut c_void) -> bool>,
}

/// [`TransportEngine`] backed by a host vtable.
pub struct ForeignEngine {
    vtable: RelayEngineVTable,
}

// SAFETY: the vtable contract requires the host engine to be callable from
// any thread; the bridge's monitor polls `is_connected` concurrently.
unsafe impl Send for ForeignEngine {}
unsafe impl Sync for ForeignEngine {}

impl ForeignEngine {
    pub fn new(vtable: RelayEngineVTable) -> Self {
        ForeignEngine { vtable }
    }
}

fn path_to_cstring(path: &Path) -> Option<CString> {
    path.to_str().and_then(|s| CString::new(s).ok())
}

impl TransportEngine for ForeignEngine {
    type Packet = ForeignPacket;

    fn start(&self, config: &EngineConfig) -> bool {
        let (Some(core), Some(session)) = (
            path_to_cstring(config.core_config_path()),
            path_to_cstring(config.session_config_path()),
        ) else {
            return false;
        };

        // SAFETY: both strings outlive the call; context validity is the host's contract.
        unsafe { (self.vtable.start)(self.vtable.context, core.as_ptr(), session.as_ptr()) }
    }

    fn stop(&self) {
        // SAFETY: see the vtable contract.
        unsafe { (self.vtable.stop)(self.vtable.context) }
    }

    fn is_connected(&self) -> bool {
        // SAFETY: see the vtable contract.
        unsafe { (self.vtable.is_connected)(self.vtable.context) }
    }

    fn send(&self, bytes: &[u8]) {
        // SAFETY: the slice is valid for `bytes.len()` reads for the whole call.
        unsafe { (self.vtable.send)(self.vtable.context, bytes.as_ptr(), bytes.len()) }
    }

    fn received_queue_depth(&self) -> usize {
        // SAFETY: see the vtable contract.
        unsafe { (self.vtable.received_queue_depth)(self.vtable.context) }
    }

    fn take_next_received(&self) -> Option<ForeignPacket> {
        // SAFETY: see the vtable contract.
        let raw = unsafe { (self.vtable.take_next_received)(self.vtable.context) };

        NonNull::new(raw).map(|raw| ForeignPacket {
            raw,
            used_size: self.vtable.packet_used_size,
            read: self.vtable.packet_read,
            free: self.vtable.packet_free,
        })
    }

    fn requeue_front(&self, packet: ForeignPacket) -> Result<(), ForeignPacket> {
        let Some(requeue) = self.vtable.requeue_front else {
            return Err(packet);
        };

        // SAFETY: `packet.raw` is a live packet we own; on success ownership
        // moves back to the engine.
        if unsafe { requeue(self.vtable.context, packet.raw.as_ptr()) } {
            std::mem::forget(packet);
            Ok(())
        } else {
            Err(packet)
        }
    }
}

/// Owned host packet. Freed exactly once, on release or drop.
pub struct ForeignPacket {
    raw: NonNull<c_void>,
    used_size: unsafe extern "C" fn(*mut c_void) -> usize,
    read: unsafe extern "C" fn(*mut c_void, *mut u8, usize),
    free: unsafe extern "C" fn(*mut c_void),
}

impl PacketBuffer for ForeignPacket {
    fn used_size(&self) -> usize {
        // SAFETY: `raw` is live until drop.
        unsafe { (self.used_size)(self.raw.as_ptr()) }
    }

    fn read_into(&self, destination: &mut [u8]) {
        // SAFETY: `destination` is valid for `len` writes and never longer
        // than the packet's used size.
        unsafe { (self.read)(self.raw.as_ptr(), destination.as_mut_ptr(), destination.len()) }
    }

    fn release(self) {
        drop(self);
    }
}

impl Drop for ForeignPacket {
    fn drop(&mut self) {
        // SAFETY: `raw` came from `take_next_received` and has not been freed
        // or handed back; drop runs once.
        unsafe { (self.free)(self.raw.as_ptr()) }
    }
}
