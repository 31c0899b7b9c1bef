//! Touch backends for `touchup`.
//!
//! A [`TouchBackend`] is the hardware side of the system: it enumerates
//! touch-capable devices, opens per-device frame subscriptions, and reads or
//! writes the haptic flag. Frames are pushed into a [`FrameSink`] on whatever
//! thread the platform delivers them on.
//!
//! # Feature flags
//! - **`hid`** — enables the `hidapi` backend for HID Digitizer touch pads.
//!
//! The [`virtual_input`] backend is always available and is what tests and
//! demos drive.

use crate::device::{DeviceId, DeviceInfo};
use crate::error::{Error, Result};
use crate::event::RawFrame;
use std::sync::Arc;

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod hid;
pub mod virtual_input;

/// Callback a backend invokes once per raw frame.
pub type FrameSink = Arc<dyn Fn(RawFrame) + Send + Sync>;

/// A live per-device frame subscription.
pub trait Subscription: Send {
    /// Stops delivery. Should not return while the backend is still inside
    /// the sink for this subscription.
    fn stop(&mut self);
}

/// Platform touch hardware.
pub trait TouchBackend: Send + Sync {
    /// Capability check. No side effects.
    fn supports_multitouch(&self) -> bool;

    /// Currently attached devices in platform order. Empty when unsupported.
    fn enumerate(&self) -> Vec<DeviceInfo>;

    /// Whether `id` still names attached hardware.
    fn resolve(&self, id: &DeviceId) -> bool {
        self.enumerate().iter().any(|d| &d.id == id)
    }

    /// Starts delivering the device's raw frames to `sink`.
    fn open(&self, device: &DeviceInfo, sink: FrameSink) -> Result<Box<dyn Subscription>>;

    /// Haptic feedback state, or `None` if the device cannot report it.
    fn haptic_enabled(&self, device: &DeviceInfo) -> Option<bool>;

    /// Returns whether the hardware accepted the change.
    fn set_haptic_enabled(&self, device: &DeviceInfo, enabled: bool) -> bool;
}

/// Backend for systems without multi-touch hardware support.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

impl TouchBackend for Unsupported {
    fn supports_multitouch(&self) -> bool {
        false
    }

    fn enumerate(&self) -> Vec<DeviceInfo> {
        Vec::new()
    }

    fn resolve(&self, _id: &DeviceId) -> bool {
        false
    }

    fn open(&self, _device: &DeviceInfo, _sink: FrameSink) -> Result<Box<dyn Subscription>> {
        Err(Error::NoHardwareSupport)
    }

    fn haptic_enabled(&self, _device: &DeviceInfo) -> Option<bool> {
        None
    }

    fn set_haptic_enabled(&self, _device: &DeviceInfo, _enabled: bool) -> bool {
        false
    }
}

/// Picks the best backend enabled in this build.
///
/// Currently this returns the HID backend when the `hid` feature is enabled
/// and `hidapi` initializes, and [`Unsupported`] otherwise.
pub fn probe_backend(config: &crate::config::SessionConfig) -> Box<dyn TouchBackend> {
    #[cfg(feature = "hid")]
    {
        match hid::HidBackend::with_config(config.hid.clone()) {
            Ok(backend) => return Box::new(backend),
            Err(e) => tracing::warn!(error = %e, "HID backend unavailable"),
        }
    }
    #[cfg(not(feature = "hid"))]
    let _ = config;

    tracing::info!("no multi-touch backend available");
    Box::new(Unsupported)
}
