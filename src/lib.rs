//! touchup — multi-touch trackpad devices and touch-event listeners.
//!
//! Enumerate touch-capable devices, bind one of them, and fan its decoded
//! per-finger events out to any number of listeners that can come and go at
//! any time, including while events are being delivered.
//!
//! ```no_run
//! use touchup::backends::virtual_input::VirtualBackend;
//! use touchup::{RawFrame, Session, TouchEvent};
//!
//! let backend = VirtualBackend::new();
//! backend.add_trackpad("Virtual Trackpad", "virtual:0", true);
//!
//! let session = Session::new(backend, |_: &RawFrame| -> Vec<TouchEvent> { Vec::new() });
//! let devices = session.available_devices();
//! session.select_device(devices.first());
//! let handle = session.add_listener(|ev: &TouchEvent| println!("{ev:?}"));
//! session.remove_listener(handle);
//! ```

pub mod backends;
pub mod binding;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod filtered_listener;
pub mod listener;
pub mod logger;
pub mod metadata;
pub mod session;
pub mod stream;

pub use config::{AutoSelect, SessionConfig};
pub use device::*;
pub use error::{Error, Result};
pub use event::*;
pub use listener::{ListenerHandle, TouchListener};
pub use session::*;
pub use stream::{FrameStream, TouchStream};
