//! Device metadata snapshot.
//!
//! [`DeviceMeta`] is a lightweight, cloneable description attached to a
//! [`DeviceInfo`](crate::device::DeviceInfo) suitable for UI display and
//! diagnostics. Backends populate what they know; unknown fields remain `None`.
//!
//! # Conventions
//! - `bus` is a short bus hint like `"usb"`, `"bluetooth"`, `"i2c"`, `"spi"` or `"virtual"`.
//! - `path` is an OS/topology path (opaque string); it may change across
//!   reconnects, so treat it as diagnostic first, identity second.
//!
//! # Example
//! ```no_run
//! use touchup::backends::virtual_input::VirtualBackend;
//! use touchup::Session;
//!
//! let backend = VirtualBackend::new();
//! backend.add_trackpad("Virtual Trackpad", "virtual:0", true);
//! let session = Session::new(backend, |_: &touchup::RawFrame| -> Vec<touchup::TouchEvent> {
//!     Vec::new()
//! });
//! for info in session.available_devices() {
//!     println!("{}: {:?}", info, info.meta);
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Best-effort metadata describing a single device.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMeta {
    /// High-level bus classification.
    pub bus: Option<String>,

    /// USB Vendor ID (VID), if known.
    pub vid: Option<u16>,

    /// USB Product ID (PID), if known.
    pub pid: Option<u16>,

    /// Human-readable product name from the driver/firmware.
    pub product_string: Option<String>,

    /// Device serial number supplied by firmware/OS, if present.
    pub serial_number: Option<String>,

    /// HID Usage Page (`0x0D` for Digitizers), if known.
    pub usage_page: Option<u16>,

    /// HID Usage within the page (`0x05` for Touch Pad), if known.
    pub usage: Option<u16>,

    /// OS/topological path to the device.
    pub path: Option<String>,
}

impl DeviceMeta {
    /// `true` when the bus hint names an internal interconnect.
    pub fn is_internal_bus(&self) -> bool {
        matches!(self.bus.as_deref(), Some("i2c") | Some("spi"))
    }
}
