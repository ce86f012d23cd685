//! Boundary error types.
//!
//! These never leave the crate: every exported function reports a boolean
//! (or a null handle) and logs the detail.

use relay_bridge_core::ConfigError;

/// Rejection of an exported call's arguments.
#[derive(Debug, thiserror::Error)]
pub enum FfiError {
    #[error("null pointer passed for {0}")]
    NullPointer(&'static str),

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("negative length for {name}: {value}")]
    NegativeLength { name: &'static str, value: i32 },

    #[error("invalid log filter: {0}")]
    LogFilter(String),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
