//! Error type shared by backends, bindings, and configuration loading.
//!
//! Most public [`Session`](crate::session::Session) operations do not surface
//! these directly: selection and haptic calls report failure as `false` and log
//! the underlying error. Backends and [`HardwareBinding`](crate::binding::HardwareBinding)
//! return them so callers composing their own pipeline can inspect the cause.

use crate::device::DeviceId;

/// Errors produced by touchup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The device identifier no longer resolves to live hardware
    /// (e.g. unplugged since enumeration).
    #[error("device {id} is unavailable")]
    DeviceUnavailable { id: DeviceId },

    /// The platform has no multi-touch hardware support.
    #[error("multi-touch hardware is not supported on this system")]
    NoHardwareSupport,

    /// Backend-specific failure (driver, OS handle, reader thread).
    #[error("backend error: {0}")]
    Backend(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
