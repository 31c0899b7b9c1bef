//! Hardware binding lifecycle.
//!
//! A [`HardwareBinding`] is the one live subscription to a selected device's
//! raw frame source. Frames reach the [`Dispatcher`] through a drain gate: the
//! backend callback holds the gate for the whole dispatch pass, and
//! [`HardwareBinding::unbind`] closes it. Closing waits for the pass in flight,
//! so once `unbind` returns no listener will be called for this binding again,
//! even if the backend's own stop is asynchronous or a late frame is already
//! queued on its thread.
//!
//! # Unbinding from a listener
//! When the last owner of a binding lets go of it inside a dispatch pass (a
//! listener holding the last `Arc<Session>`, say), the calling thread is the
//! backend's callback thread. Waiting on the gate or joining that thread would
//! never return, so the gate is only flagged shut and the subscription is
//! stopped on a short-lived `touchup-unbind` thread once the pass has ended.

use crate::backends::{FrameSink, Subscription, TouchBackend};
use crate::device::DeviceInfo;
use crate::dispatch::{self, Dispatcher};
use crate::error::{Error, Result};
use crate::event::RawFrame;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Open flag plus a lock held across each dispatch pass.
struct Gate {
    open: AtomicBool,
    pass: Mutex<()>,
}

impl Gate {
    fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            pass: Mutex::new(()),
        }
    }

    /// Runs `f` only while the gate is open, holding it for the duration.
    fn pass(&self, f: impl FnOnce()) -> bool {
        let _held = self.pass.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.open.load(Ordering::SeqCst) {
            return false;
        }
        f();
        true
    }

    /// Rejects all later passes without waiting for the one in flight.
    fn shut(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Rejects all later passes, then blocks until no pass is in flight.
    fn close(&self) {
        self.shut();
        drop(self.pass.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

/// Live subscription to one device.
pub struct HardwareBinding {
    device: DeviceInfo,
    gate: Arc<Gate>,
    subscription: Option<Box<dyn Subscription>>,
}

impl HardwareBinding {
    /// Opens the device's frame source and routes frames to `dispatcher`.
    ///
    /// Fails with [`Error::DeviceUnavailable`] when the id no longer resolves
    /// to live hardware, and with [`Error::NoHardwareSupport`] on platforms
    /// without multi-touch support.
    pub fn bind(
        backend: &dyn TouchBackend,
        device: &DeviceInfo,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self> {
        if !backend.supports_multitouch() {
            return Err(Error::NoHardwareSupport);
        }
        if !backend.resolve(&device.id) {
            return Err(Error::DeviceUnavailable {
                id: device.id.clone(),
            });
        }

        let gate = Arc::new(Gate::new());
        let sink: FrameSink = {
            let gate = Arc::clone(&gate);
            let expected = device.id.clone();
            Arc::new(move |frame: RawFrame| {
                if frame.device != expected {
                    tracing::warn!(
                        expected = %expected,
                        got = %frame.device,
                        "dropping frame from foreign device"
                    );
                    return;
                }
                let delivered = gate.pass(|| {
                    dispatcher.on_frame(&frame);
                });
                if !delivered {
                    tracing::trace!(device = %frame.device, "frame arrived after unbind");
                }
            })
        };

        let subscription = backend.open(device, sink)?;
        tracing::info!(device = %device.id, name = %device.name, "bound touch device");

        Ok(Self {
            device: device.clone(),
            gate,
            subscription: Some(subscription),
        })
    }

    /// Stops frame delivery. Blocks until any in-flight dispatch completes.
    ///
    /// Idempotent. Called from inside a listener callback it cannot wait for
    /// the pass it is part of: delivery still stops after that pass, and the
    /// backend subscription is released on a helper thread.
    pub fn unbind(&mut self) {
        let Some(mut subscription) = self.subscription.take() else {
            return;
        };
        if dispatch::in_dispatch() {
            self.gate.shut();
            self.stop_detached(subscription);
            return;
        }
        self.gate.close();
        subscription.stop();
        tracing::info!(device = %self.device.id, "unbound touch device");
    }

    fn stop_detached(&self, subscription: Box<dyn Subscription>) {
        // Kept outside the closure so a failed spawn does not drop (and join)
        // the subscription on the callback thread.
        let slot = Arc::new(Mutex::new(Some(subscription)));
        let thread_slot = Arc::clone(&slot);
        let id = self.device.id.clone();
        let spawned = std::thread::Builder::new()
            .name("touchup-unbind".into())
            .spawn(move || {
                let taken = thread_slot
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(mut subscription) = taken {
                    subscription.stop();
                }
                tracing::info!(device = %id, "unbound touch device");
            });
        match spawned {
            Ok(_) => {
                tracing::debug!(device = %self.device.id, "unbind from dispatch deferred");
            }
            Err(e) => {
                let leaked = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                std::mem::forget(leaked);
                tracing::error!(
                    device = %self.device.id,
                    error = %e,
                    "could not spawn unbind thread; subscription leaked"
                );
            }
        }
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn is_bound(&self) -> bool {
        self.subscription.is_some()
    }
}

impl Drop for HardwareBinding {
    fn drop(&mut self) {
        self.unbind();
    }
}

impl fmt::Debug for HardwareBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardwareBinding")
            .field("device", &self.device.id)
            .field("bound", &self.is_bound())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::VirtualBackend;
    use crate::event::{Axis, FrameDecoder, Position, TouchEvent, TouchState};
    use crate::listener::ListenerTable;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn eventually(check: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !check() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    fn one_per_byte() -> Arc<dyn FrameDecoder> {
        Arc::new(|frame: &RawFrame| -> Vec<TouchEvent> {
            frame
                .data
                .iter()
                .map(|&b| TouchEvent {
                    id: b as i32,
                    position: Position::default(),
                    total: 1,
                    pressure: 0.0,
                    axis: Axis::default(),
                    angle: 0.0,
                    density: 0.0,
                    state: TouchState::Touching,
                    timestamp: 0.0,
                })
                .collect()
        })
    }

    fn dispatcher_with_counter() -> (Arc<Dispatcher>, Arc<AtomicUsize>) {
        let table = Arc::new(ListenerTable::new());
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        table.add(move |_: &TouchEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (Arc::new(Dispatcher::new(one_per_byte(), table)), count)
    }

    #[test]
    fn test_bind_unplugged_device_fails() {
        let backend = VirtualBackend::new();
        let pad = backend.add_trackpad("Pad", "virtual:0", true);
        let info = pad.info();
        pad.unplug();

        let (dispatcher, _) = dispatcher_with_counter();
        let err = HardwareBinding::bind(&backend, &info, dispatcher).unwrap_err();
        assert!(matches!(err, Error::DeviceUnavailable { .. }));
    }

    #[test]
    fn test_bind_without_support_fails() {
        let backend = VirtualBackend::new();
        let pad = backend.add_trackpad("Pad", "virtual:0", true);
        backend.set_supported(false);

        let (dispatcher, _) = dispatcher_with_counter();
        let err = HardwareBinding::bind(&backend, &pad.info(), dispatcher).unwrap_err();
        assert!(matches!(err, Error::NoHardwareSupport));
    }

    #[test]
    fn test_unbind_is_idempotent_and_stops_delivery() {
        let backend = VirtualBackend::new();
        let pad = backend.add_trackpad("Pad", "virtual:0", true);
        let (dispatcher, count) = dispatcher_with_counter();

        let mut binding = HardwareBinding::bind(&backend, &pad.info(), dispatcher).unwrap();
        assert!(binding.is_bound());

        pad.push(vec![1, 2]);
        assert!(pad.wait_idle(Duration::from_secs(5)));
        assert_eq!(count.load(Ordering::SeqCst), 2);

        binding.unbind();
        binding.unbind();
        assert!(!binding.is_bound());

        pad.push(vec![3]);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unbind_waits_for_in_flight_dispatch() {
        let backend = VirtualBackend::new();
        let pad = backend.add_trackpad("Pad", "virtual:0", true);

        let table = Arc::new(ListenerTable::new());
        let entered = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicUsize::new(0));
        let (e, f) = (Arc::clone(&entered), Arc::clone(&finished));
        table.add(move |_: &TouchEvent| {
            e.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            f.fetch_add(1, Ordering::SeqCst);
        });
        let dispatcher = Arc::new(Dispatcher::new(one_per_byte(), Arc::clone(&table)));

        let mut binding = HardwareBinding::bind(&backend, &pad.info(), dispatcher).unwrap();
        pad.push(vec![1]);
        while !entered.load(Ordering::SeqCst) {
            std::thread::yield_now();
        }
        binding.unbind();

        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unbinds() {
        let backend = VirtualBackend::new();
        let pad = backend.add_trackpad("Pad", "virtual:0", true);
        let (dispatcher, count) = dispatcher_with_counter();

        let binding = HardwareBinding::bind(&backend, &pad.info(), dispatcher).unwrap();
        drop(binding);
        assert_eq!(pad.subscriber_count(), 0);

        pad.push(vec![1]);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unbind_from_listener_does_not_hang() {
        let backend = VirtualBackend::new();
        let pad = backend.add_trackpad("Pad", "virtual:0", true);

        let table = Arc::new(ListenerTable::new());
        let slot: Arc<Mutex<Option<HardwareBinding>>> = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let (s, c) = (Arc::clone(&slot), Arc::clone(&calls));
        table.add(move |_: &TouchEvent| {
            c.fetch_add(1, Ordering::SeqCst);
            // Dropping the binding here runs `unbind` on the callback thread.
            let taken = s.lock().unwrap().take();
            drop(taken);
        });
        let dispatcher = Arc::new(Dispatcher::new(one_per_byte(), Arc::clone(&table)));

        let binding = HardwareBinding::bind(&backend, &pad.info(), dispatcher).unwrap();
        *slot.lock().unwrap() = Some(binding);

        pad.push(vec![1, 2]);
        assert!(pad.wait_idle(Duration::from_secs(5)));
        assert!(eventually(|| pad.subscriber_count() == 0));
        // The gate shut mid-pass; the second event of that frame still went out.
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        pad.push(vec![3]);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
