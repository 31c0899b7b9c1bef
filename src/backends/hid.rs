//! HID touch pad backend (`hidapi`).
//!
//! Discovery keeps HID collections on the Digitizers page (`0x0D`) with the
//! Touch Pad usage (`0x05`), which is how precision trackpads present
//! themselves on every major OS. Each subscription owns a reader thread that
//! pulls input reports with a short timeout and forwards them untouched as
//! [`RawFrame`]s.
//!
//! This module does **not**:
//! - parse digitizer reports (that is the session's `FrameDecoder`)
//! - drive haptic actuators; the haptic flag is reported as unsupported

use super::{FrameSink, Subscription, TouchBackend};
use crate::config::HidConfig;
use crate::device::{DeviceId, DeviceInfo};
use crate::error::{Error, Result};
use crate::event::RawFrame;
use crate::metadata::DeviceMeta;
use hidapi::{BusType, HidApi};
use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

const USAGE_PAGE_DIGITIZER: u16 = 0x0D;
const USAGE_TOUCH_PAD: u16 = 0x05;

/// Decide whether a `hidapi` entry is a touch pad collection.
fn accept_device(info: &hidapi::DeviceInfo) -> bool {
    info.usage_page() == USAGE_PAGE_DIGITIZER && info.usage() == USAGE_TOUCH_PAD
}

fn bus_name(bus: BusType) -> &'static str {
    match bus {
        BusType::Usb => "usb",
        BusType::Bluetooth => "bluetooth",
        BusType::I2c => "i2c",
        BusType::Spi => "spi",
        _ => "unknown",
    }
}

/// Stable identity: serial when the firmware provides one, OS path otherwise.
fn device_id(info: &hidapi::DeviceInfo) -> DeviceId {
    match info.serial_number().filter(|s| !s.is_empty()) {
        Some(serial) => DeviceId::new(format!(
            "hid:{:04x}:{:04x}:{serial}",
            info.vendor_id(),
            info.product_id()
        )),
        None => DeviceId::new(format!("hid:{}", info.path().to_string_lossy())),
    }
}

/// Build a lightweight [`DeviceMeta`] snapshot for a `hidapi` device entry.
fn meta(info: &hidapi::DeviceInfo) -> DeviceMeta {
    DeviceMeta {
        bus: Some(bus_name(info.bus_type()).into()),
        vid: Some(info.vendor_id()),
        pid: Some(info.product_id()),
        product_string: info.product_string().map(|s| s.to_string()),
        serial_number: info.serial_number().map(|s| s.to_string()),
        usage_page: Some(info.usage_page()),
        usage: Some(info.usage()),
        path: Some(info.path().to_string_lossy().to_string()),
    }
}

fn describe(info: &hidapi::DeviceInfo) -> DeviceInfo {
    let meta = meta(info);
    let name = info
        .product_string()
        .filter(|s| !s.is_empty())
        .unwrap_or("HID Touch Pad")
        .to_string();
    DeviceInfo::new(name, device_id(info), meta.is_internal_bus()).with_meta(meta)
}

fn api() -> Result<HidApi> {
    HidApi::new().map_err(|e| Error::Backend(e.to_string()))
}

/// Touch pads reachable through `hidapi`.
#[derive(Debug, Clone)]
pub struct HidBackend {
    config: HidConfig,
}

impl HidBackend {
    /// Verifies `hidapi` initializes on this system.
    pub fn with_config(config: HidConfig) -> Result<Self> {
        api()?;
        Ok(Self { config })
    }

    fn find_path(&self, id: &DeviceId) -> Option<CString> {
        let api = api().ok()?;
        let found = api
            .device_list()
            .find(|info| accept_device(info) && &device_id(info) == id)
            .map(|info| info.path().to_owned());
        found
    }
}

impl TouchBackend for HidBackend {
    fn supports_multitouch(&self) -> bool {
        api().is_ok()
    }

    fn enumerate(&self) -> Vec<DeviceInfo> {
        let api = match api() {
            Ok(api) => api,
            Err(e) => {
                tracing::warn!(error = %e, "HID enumeration failed");
                return Vec::new();
            }
        };
        let devices: Vec<DeviceInfo> = api
            .device_list()
            .filter(|info| accept_device(info))
            .map(describe)
            .collect();
        tracing::debug!(count = devices.len(), "enumerated HID touch pads");
        devices
    }

    fn resolve(&self, id: &DeviceId) -> bool {
        self.find_path(id).is_some()
    }

    fn open(&self, device: &DeviceInfo, sink: FrameSink) -> Result<Box<dyn Subscription>> {
        let path = self.find_path(&device.id).ok_or_else(|| Error::DeviceUnavailable {
            id: device.id.clone(),
        })?;

        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let id = device.id.clone();
        let thread_stop = Arc::clone(&stop);
        let read_timeout = self.config.read_timeout();
        let report_len = self.config.report_len;

        // The HID handle is opened and used on the reader thread only.
        let thread = std::thread::Builder::new()
            .name(format!("touchup-hid-{id}"))
            .spawn(move || {
                let opened = api().and_then(|api| {
                    api.open_path(&path)
                        .map_err(|e| Error::Backend(e.to_string()))
                });
                let handle = match opened {
                    Ok(handle) => {
                        let _ = ready_tx.send(Ok(()));
                        handle
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let mut buf = vec![0u8; report_len.max(1)];
                while !thread_stop.load(Ordering::SeqCst) {
                    match handle.read_timeout(&mut buf, read_timeout) {
                        Ok(0) => {}
                        Ok(n) => sink(RawFrame::new(id.clone(), buf[..n].to_vec())),
                        Err(e) => {
                            tracing::warn!(device = %id, error = %e, "HID read failed; stopping");
                            break;
                        }
                    }
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(Error::Backend("HID reader thread exited early".into()));
            }
        }

        Ok(Box::new(HidSubscription {
            device: device.id.clone(),
            stop,
            thread: Some(thread),
        }))
    }

    fn haptic_enabled(&self, _device: &DeviceInfo) -> Option<bool> {
        None
    }

    fn set_haptic_enabled(&self, _device: &DeviceInfo, _enabled: bool) -> bool {
        false
    }
}

struct HidSubscription {
    device: DeviceId,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Subscription for HidSubscription {
    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!(device = %self.device, "HID reader thread panicked");
            }
        }
    }
}

impl Drop for HidSubscription {
    fn drop(&mut self) {
        Subscription::stop(self);
    }
}
