//! In-memory trackpads.
//!
//! [`VirtualBackend`] behaves like real hardware from the session's point of
//! view: every open subscription gets its own callback thread, frames pushed
//! through a [`VirtualTrackpad`] are delivered on that thread, and devices can
//! be unplugged and replugged. Frame payloads are passed through untouched; the
//! session's decoder decides what they mean.

use super::{FrameSink, Subscription, TouchBackend};
use crate::device::{DeviceId, DeviceInfo};
use crate::error::{Error, Result};
use crate::event::RawFrame;
use crate::metadata::DeviceMeta;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct PadState {
    info: DeviceInfo,
    plugged: AtomicBool,
    haptic: AtomicBool,
    next_sub: AtomicU64,
    subscribers: Mutex<Vec<(u64, Sender<RawFrame>)>>,
    /// Frames queued to callback threads but not yet returned from the sink.
    pending: AtomicUsize,
}

struct Shared {
    supported: AtomicBool,
    pads: Mutex<Vec<Arc<PadState>>>,
}

/// Backend made of in-memory trackpads. Cheap to clone; clones share devices.
#[derive(Clone)]
pub struct VirtualBackend {
    shared: Arc<Shared>,
}

impl VirtualBackend {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                supported: AtomicBool::new(true),
                pads: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Attaches a new trackpad and returns a handle for feeding it frames.
    pub fn add_trackpad(&self, name: &str, id: &str, built_in: bool) -> VirtualTrackpad {
        let meta = DeviceMeta {
            bus: Some("virtual".into()),
            product_string: Some(name.to_string()),
            path: Some(id.to_string()),
            ..DeviceMeta::default()
        };
        let pad = Arc::new(PadState {
            info: DeviceInfo::new(name, id, built_in).with_meta(meta),
            plugged: AtomicBool::new(true),
            haptic: AtomicBool::new(true),
            next_sub: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
            pending: AtomicUsize::new(0),
        });
        lock(&self.shared.pads).push(Arc::clone(&pad));
        tracing::debug!(device = id, "virtual trackpad attached");
        VirtualTrackpad { pad }
    }

    /// Handle to a previously added trackpad.
    pub fn trackpad(&self, id: &str) -> Option<VirtualTrackpad> {
        lock(&self.shared.pads)
            .iter()
            .find(|p| p.info.id.as_str() == id)
            .map(|pad| VirtualTrackpad {
                pad: Arc::clone(pad),
            })
    }

    /// Simulates a platform without multi-touch support.
    pub fn set_supported(&self, supported: bool) {
        self.shared.supported.store(supported, Ordering::SeqCst);
    }

    fn find_plugged(&self, id: &DeviceId) -> Option<Arc<PadState>> {
        lock(&self.shared.pads)
            .iter()
            .find(|p| &p.info.id == id && p.plugged.load(Ordering::SeqCst))
            .cloned()
    }
}

impl Default for VirtualBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TouchBackend for VirtualBackend {
    fn supports_multitouch(&self) -> bool {
        self.shared.supported.load(Ordering::SeqCst)
    }

    fn enumerate(&self) -> Vec<DeviceInfo> {
        if !self.supports_multitouch() {
            return Vec::new();
        }
        lock(&self.shared.pads)
            .iter()
            .filter(|p| p.plugged.load(Ordering::SeqCst))
            .map(|p| p.info.clone())
            .collect()
    }

    fn resolve(&self, id: &DeviceId) -> bool {
        self.supports_multitouch() && self.find_plugged(id).is_some()
    }

    fn open(&self, device: &DeviceInfo, sink: FrameSink) -> Result<Box<dyn Subscription>> {
        let pad = self
            .find_plugged(&device.id)
            .ok_or_else(|| Error::DeviceUnavailable {
                id: device.id.clone(),
            })?;

        let (tx, rx) = mpsc::channel::<RawFrame>();
        let sub_id = pad.next_sub.fetch_add(1, Ordering::SeqCst);

        let thread_pad = Arc::clone(&pad);
        let thread = std::thread::Builder::new()
            .name(format!("touchup-virtual-{}", device.id))
            .spawn(move || {
                for frame in rx {
                    sink(frame);
                    thread_pad.pending.fetch_sub(1, Ordering::SeqCst);
                }
            })?;

        lock(&pad.subscribers).push((sub_id, tx));
        Ok(Box::new(VirtualSubscription {
            pad,
            sub_id,
            thread: Some(thread),
        }))
    }

    fn haptic_enabled(&self, device: &DeviceInfo) -> Option<bool> {
        self.find_plugged(&device.id)
            .map(|p| p.haptic.load(Ordering::SeqCst))
    }

    fn set_haptic_enabled(&self, device: &DeviceInfo, enabled: bool) -> bool {
        match self.find_plugged(&device.id) {
            Some(pad) => {
                pad.haptic.store(enabled, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }
}

struct VirtualSubscription {
    pad: Arc<PadState>,
    sub_id: u64,
    thread: Option<JoinHandle<()>>,
}

impl Subscription for VirtualSubscription {
    fn stop(&mut self) {
        // Dropping the sender ends the callback thread once its queue drains.
        lock(&self.pad.subscribers).retain(|(id, _)| *id != self.sub_id);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!(device = %self.pad.info.id, "virtual callback thread panicked");
            }
        }
    }
}

impl Drop for VirtualSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Feeds frames into one virtual trackpad.
#[derive(Clone)]
pub struct VirtualTrackpad {
    pad: Arc<PadState>,
}

impl VirtualTrackpad {
    pub fn info(&self) -> DeviceInfo {
        self.pad.info.clone()
    }

    /// Queues one raw frame to every open subscription.
    ///
    /// Returns how many subscriptions received it (zero when unplugged or
    /// nobody is bound).
    pub fn push(&self, data: Vec<u8>) -> usize {
        if !self.pad.plugged.load(Ordering::SeqCst) {
            return 0;
        }
        let subscribers = lock(&self.pad.subscribers);
        let mut sent = 0;
        for (_, tx) in subscribers.iter() {
            self.pad.pending.fetch_add(1, Ordering::SeqCst);
            if tx
                .send(RawFrame::new(self.pad.info.id.clone(), data.clone()))
                .is_ok()
            {
                sent += 1;
            } else {
                self.pad.pending.fetch_sub(1, Ordering::SeqCst);
            }
        }
        sent
    }

    /// Waits until every queued frame has been handed to its sink.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pad.pending.load(Ordering::SeqCst) > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    pub fn unplug(&self) {
        self.pad.plugged.store(false, Ordering::SeqCst);
        tracing::debug!(device = %self.pad.info.id, "virtual trackpad unplugged");
    }

    pub fn replug(&self) {
        self.pad.plugged.store(true, Ordering::SeqCst);
        tracing::debug!(device = %self.pad.info.id, "virtual trackpad replugged");
    }

    pub fn is_plugged(&self) -> bool {
        self.pad.plugged.load(Ordering::SeqCst)
    }

    /// Number of open subscriptions on this trackpad.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.pad.subscribers).len()
    }

    /// Haptic flag as stored on the device, regardless of plug state.
    pub fn haptic_enabled(&self) -> bool {
        self.pad.haptic.load(Ordering::SeqCst)
    }
}
