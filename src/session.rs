//! The session: device selection plus listener registration.
//!
//! A [`Session`] composes a [`TouchBackend`], the single [`HardwareBinding`],
//! and the [`ListenerTable`]. Construct one per process at startup and pass
//! it (or an `Arc` of it) to whoever needs touch input; there is no global
//! accessor.
//!
//! # Selection state
//! - **Unselected** (initial) → `select_device(Some(d))` → **Bound(d)**
//! - **Bound(d)** → `select_device(Some(d2))` → unbind `d`, bind `d2` → **Bound(d2)**,
//!   or **Unselected** if binding `d2` fails after `d` was released
//! - **Bound(d)** → `select_device(None)` → **Unselected**
//!
//! A device that no longer resolves is rejected before the current binding is
//! touched, so a stale [`DeviceInfo`] leaves the session as it was. That
//! includes reselecting the bound device after it went away.
//!
//! # Threads
//! Every method can be called from any thread. Listeners run on the backend's
//! callback thread and must not call [`Session::select_device`]; that call is
//! rejected with `false` because it would wait on the very dispatch pass it is
//! running in.

use crate::backends::{probe_backend, TouchBackend};
use crate::binding::HardwareBinding;
use crate::config::SessionConfig;
use crate::device::DeviceInfo;
use crate::dispatch::{self, DispatchStats, Dispatcher};
use crate::event::FrameDecoder;
use crate::listener::{ListenerHandle, ListenerTable, TouchListener};
use crate::stream::{FrameStream, TouchStream};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Touch input session over one backend.
pub struct Session {
    backend: Box<dyn TouchBackend>,
    table: Arc<ListenerTable>,
    dispatcher: Arc<Dispatcher>,
    config: SessionConfig,
    /// Readable without waiting on a switch in progress.
    selection: Mutex<Option<DeviceInfo>>,
    /// Held for the whole of a selection change.
    binding: Mutex<Option<HardwareBinding>>,
}

impl Session {
    pub fn new(backend: impl TouchBackend + 'static, decoder: impl FrameDecoder + 'static) -> Self {
        Self::with_config(backend, decoder, SessionConfig::default())
    }

    pub fn with_config(
        backend: impl TouchBackend + 'static,
        decoder: impl FrameDecoder + 'static,
        config: SessionConfig,
    ) -> Self {
        Self::from_parts(Box::new(backend), Arc::new(decoder), config)
    }

    /// Session over the best backend this build supports.
    pub fn probe(decoder: impl FrameDecoder + 'static, config: SessionConfig) -> Self {
        let backend = probe_backend(&config);
        Self::from_parts(backend, Arc::new(decoder), config)
    }

    pub fn from_parts(
        backend: Box<dyn TouchBackend>,
        decoder: Arc<dyn FrameDecoder>,
        config: SessionConfig,
    ) -> Self {
        let table = Arc::new(ListenerTable::new());
        let dispatcher = Arc::new(Dispatcher::new(decoder, Arc::clone(&table)));
        Self {
            backend,
            table,
            dispatcher,
            config,
            selection: Mutex::new(None),
            binding: Mutex::new(None),
        }
    }

    /// Capability check. Safe to call at any time.
    pub fn supports_multitouch(&self) -> bool {
        self.backend.supports_multitouch()
    }

    /// Freshly enumerated devices; empty without hardware support.
    pub fn available_devices(&self) -> Vec<DeviceInfo> {
        if !self.backend.supports_multitouch() {
            return Vec::new();
        }
        let devices = self.backend.enumerate();
        tracing::debug!(count = devices.len(), "available touch devices");
        devices
    }

    /// Switches the active device, or deselects with `None`.
    ///
    /// Returns `false` when the device cannot be bound, when the platform has
    /// no multi-touch support, or when called from inside a listener. The
    /// previous binding is fully stopped before the new one starts.
    pub fn select_device(&self, device: Option<&DeviceInfo>) -> bool {
        if dispatch::in_dispatch() {
            tracing::warn!("select_device called from a touch listener; rejected");
            return false;
        }

        let mut binding = lock(&self.binding);
        let Some(device) = device else {
            if let Some(mut old) = binding.take() {
                old.unbind();
            }
            *lock(&self.selection) = None;
            tracing::info!("touch device deselected");
            return true;
        };

        if !self.backend.supports_multitouch() {
            tracing::debug!(device = %device.id, "selection ignored: no multi-touch support");
            return false;
        }

        if !self.backend.resolve(&device.id) {
            tracing::warn!(device = %device.id, "selected device is unavailable");
            return false;
        }

        if let Some(current) = binding.as_ref() {
            if current.device().id == device.id {
                tracing::debug!(device = %device.id, "device already selected");
                return true;
            }
        }

        if let Some(mut old) = binding.take() {
            old.unbind();
        }
        *lock(&self.selection) = None;

        match HardwareBinding::bind(self.backend.as_ref(), device, Arc::clone(&self.dispatcher)) {
            Ok(new) => {
                *binding = Some(new);
                *lock(&self.selection) = Some(device.clone());
                tracing::info!(device = %device.id, name = %device.name, "touch device selected");
                true
            }
            Err(e) => {
                tracing::warn!(device = %device.id, error = %e, "failed to bind touch device");
                false
            }
        }
    }

    /// Selects according to [`SessionConfig::auto_select`].
    ///
    /// Returns `false` when the policy is `none` or picks nothing.
    pub fn select_default(&self) -> bool {
        let devices = self.available_devices();
        match self.config.auto_select.pick(&devices) {
            Some(device) => self.select_device(Some(device)),
            None => false,
        }
    }

    pub fn current_device(&self) -> Option<DeviceInfo> {
        lock(&self.selection).clone()
    }

    /// Registers a listener; it receives every event from the next frame on.
    pub fn add_listener(&self, listener: impl TouchListener + 'static) -> ListenerHandle {
        let handle = self.table.add(listener);
        tracing::debug!(%handle, "touch listener registered");
        handle
    }

    /// Unregisters a listener. Unknown or already removed handles are ignored.
    pub fn remove_listener(&self, handle: ListenerHandle) -> bool {
        let removed = self.table.remove(handle);
        if removed {
            tracing::debug!(%handle, "touch listener removed");
        }
        removed
    }

    /// Channel-backed subscription; unregisters itself when dropped.
    pub fn stream(&self) -> TouchStream {
        TouchStream::new(&self.table)
    }

    /// One item per decoded frame, holding every finger in it. Frames with
    /// no fingers down arrive as an empty `Vec`.
    pub fn frame_stream(&self) -> FrameStream {
        FrameStream::new(&self.table)
    }

    /// `true` while at least one listener is registered.
    pub fn is_listening(&self) -> bool {
        !self.table.is_empty()
    }

    pub fn listener_count(&self) -> usize {
        self.table.len()
    }

    /// Haptic state of the selected device; `false` when nothing is selected
    /// or the device cannot report it.
    pub fn is_haptic_enabled(&self) -> bool {
        match self.current_device() {
            Some(device) => self.backend.haptic_enabled(&device).unwrap_or(false),
            None => false,
        }
    }

    /// Returns whether the hardware accepted the change.
    pub fn set_haptic_enabled(&self, enabled: bool) -> bool {
        let Some(device) = self.current_device() else {
            return false;
        };
        let accepted = self.backend.set_haptic_enabled(&device, enabled);
        if accepted {
            tracing::info!(device = %device.id, enabled, "haptic feedback changed");
        } else {
            tracing::warn!(device = %device.id, enabled, "haptic change rejected");
        }
        accepted
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> &DispatchStats {
        self.dispatcher.stats()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if dispatch::in_dispatch() {
            tracing::debug!("session dropped from a touch listener");
        }
        // Never waits on the current pass when dropped from a listener.
        if let Some(mut binding) = lock(&self.binding).take() {
            binding.unbind();
        }
        if !self.config.restore_haptics_on_drop {
            return;
        }
        if let Some(device) = lock(&self.selection).take() {
            if self.backend.haptic_enabled(&device) == Some(false) {
                tracing::info!(device = %device.id, "restoring haptic feedback");
                self.backend.set_haptic_enabled(&device, true);
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("current_device", &self.current_device())
            .field("listeners", &self.table.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::VirtualBackend;
    use crate::backends::Unsupported;
    use crate::config::AutoSelect;
    use crate::event::{RawFrame, TouchEvent};

    fn no_events(_: &RawFrame) -> Vec<TouchEvent> {
        Vec::new()
    }

    #[test]
    fn test_initially_unselected() {
        let backend = VirtualBackend::new();
        backend.add_trackpad("Internal", "virtual:0", true);
        let session = Session::new(backend, no_events);
        assert!(session.current_device().is_none());
        assert!(!session.is_haptic_enabled());
        assert!(!session.set_haptic_enabled(true));
    }

    #[test]
    fn test_select_and_deselect() {
        let backend = VirtualBackend::new();
        let pad = backend.add_trackpad("Internal", "virtual:0", true);
        let session = Session::new(backend, no_events);

        assert!(session.select_device(Some(&pad.info())));
        assert_eq!(session.current_device(), Some(pad.info()));
        assert_eq!(pad.subscriber_count(), 1);

        assert!(session.select_device(None));
        assert!(session.current_device().is_none());
        assert_eq!(pad.subscriber_count(), 0);
    }

    #[test]
    fn test_unsupported_backend() {
        let session = Session::new(Unsupported, no_events);
        let ghost = DeviceInfo::new("Ghost", "ghost:0", true);
        assert!(!session.supports_multitouch());
        assert!(session.available_devices().is_empty());
        assert!(!session.select_device(Some(&ghost)));
        assert!(!session.is_haptic_enabled());
    }

    #[test]
    fn test_stale_device_keeps_previous_binding() {
        let backend = VirtualBackend::new();
        let a = backend.add_trackpad("A", "virtual:a", true);
        let b = backend.add_trackpad("B", "virtual:b", false);
        let session = Session::new(backend, no_events);

        assert!(session.select_device(Some(&a.info())));
        b.unplug();
        assert!(!session.select_device(Some(&b.info())));
        assert_eq!(session.current_device(), Some(a.info()));
        assert_eq!(a.subscriber_count(), 1);
    }

    #[test]
    fn test_reselecting_unplugged_device_fails() {
        let backend = VirtualBackend::new();
        let pad = backend.add_trackpad("A", "virtual:a", true);
        let session = Session::new(backend, no_events);

        assert!(session.select_device(Some(&pad.info())));
        pad.unplug();
        assert!(!session.select_device(Some(&pad.info())));
        assert_eq!(session.current_device(), Some(pad.info()));

        pad.replug();
        assert!(session.select_device(Some(&pad.info())));
        assert_eq!(pad.subscriber_count(), 1);
    }

    #[test]
    fn test_haptics_follow_selected_device() {
        let backend = VirtualBackend::new();
        let pad = backend.add_trackpad("Internal", "virtual:0", true);
        let session = Session::new(backend, no_events);
        session.select_device(Some(&pad.info()));

        assert!(session.is_haptic_enabled());
        assert!(session.set_haptic_enabled(false));
        assert!(!session.is_haptic_enabled());
        assert!(!pad.haptic_enabled());
    }

    #[test]
    fn test_drop_restores_haptics() {
        let backend = VirtualBackend::new();
        let pad = backend.add_trackpad("Internal", "virtual:0", true);
        let session = Session::new(backend, no_events);
        session.select_device(Some(&pad.info()));
        session.set_haptic_enabled(false);

        drop(session);
        assert!(pad.haptic_enabled());
        assert_eq!(pad.subscriber_count(), 0);
    }

    #[test]
    fn test_drop_without_restore_leaves_haptics() {
        let backend = VirtualBackend::new();
        let pad = backend.add_trackpad("Internal", "virtual:0", true);
        let config = SessionConfig {
            restore_haptics_on_drop: false,
            ..SessionConfig::default()
        };
        let session = Session::with_config(backend, no_events, config);
        session.select_device(Some(&pad.info()));
        session.set_haptic_enabled(false);

        drop(session);
        assert!(!pad.haptic_enabled());
    }

    #[test]
    fn test_select_default_prefers_built_in() {
        let backend = VirtualBackend::new();
        backend.add_trackpad("External", "virtual:ext", false);
        let internal = backend.add_trackpad("Internal", "virtual:int", true);
        let config = SessionConfig {
            auto_select: AutoSelect::BuiltIn,
            ..SessionConfig::default()
        };
        let session = Session::with_config(backend, no_events, config);

        assert!(session.select_default());
        assert_eq!(session.current_device(), Some(internal.info()));
    }

    #[test]
    fn test_select_default_none_policy() {
        let backend = VirtualBackend::new();
        backend.add_trackpad("Internal", "virtual:0", true);
        let session = Session::new(backend, no_events);
        assert!(!session.select_default());
        assert!(session.current_device().is_none());
    }

    #[test]
    fn test_listener_bookkeeping() {
        let session = Session::new(VirtualBackend::new(), no_events);
        assert!(!session.is_listening());
        let h = session.add_listener(|_: &TouchEvent| {});
        assert!(session.is_listening());
        assert_eq!(session.listener_count(), 1);
        assert!(session.remove_listener(h));
        assert!(!session.remove_listener(h));
        assert_eq!(session.listener_count(), 0);
    }
}
