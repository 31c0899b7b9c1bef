//! Fan-out of decoded frames to listeners.
//!
//! The [`Dispatcher`] is what a hardware binding calls for every raw frame. It
//! decodes once, takes one [`ListenerTable`] snapshot, hands every listener the
//! whole frame, then calls every listener for every event in table order. A
//! panicking listener is contained: the panic is logged and delivery continues
//! with the next listener. A panicking decoder loses its frame, not the
//! callback thread.

use crate::event::{FrameDecoder, RawFrame};
use crate::listener::{ListenerEntry, ListenerTable, TouchListener};
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

thread_local! {
    static IN_DISPATCH: Cell<bool> = const { Cell::new(false) };
}

/// `true` while the current thread is inside [`Dispatcher::on_frame`].
pub(crate) fn in_dispatch() -> bool {
    IN_DISPATCH.with(Cell::get)
}

/// Marks the current thread as dispatching until dropped.
struct DispatchScope {
    outer: bool,
}

impl DispatchScope {
    fn enter() -> Self {
        let outer = IN_DISPATCH.with(|flag| flag.replace(true));
        Self { outer }
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        IN_DISPATCH.with(|flag| flag.set(self.outer));
    }
}

/// Running totals, readable from any thread.
#[derive(Debug, Default)]
pub struct DispatchStats {
    frames: AtomicU64,
    events: AtomicU64,
    listener_panics: AtomicU64,
    decoder_panics: AtomicU64,
}

impl DispatchStats {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    pub fn listener_panics(&self) -> u64 {
        self.listener_panics.load(Ordering::Relaxed)
    }

    /// Frames dropped because the decoder panicked on them.
    pub fn decoder_panics(&self) -> u64 {
        self.decoder_panics.load(Ordering::Relaxed)
    }
}

/// Decodes raw frames and delivers the events to every registered listener.
pub struct Dispatcher {
    decoder: Arc<dyn FrameDecoder>,
    table: Arc<ListenerTable>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(decoder: Arc<dyn FrameDecoder>, table: Arc<ListenerTable>) -> Self {
        Self {
            decoder,
            table,
            stats: DispatchStats::default(),
        }
    }

    pub fn table(&self) -> &Arc<ListenerTable> {
        &self.table
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Handles one raw frame. Returns the number of decoded events.
    pub fn on_frame(&self, frame: &RawFrame) -> usize {
        let _scope = DispatchScope::enter();
        self.stats.frames.fetch_add(1, Ordering::Relaxed);

        let events = match panic::catch_unwind(AssertUnwindSafe(|| self.decoder.decode(frame))) {
            Ok(events) => events,
            Err(payload) => {
                self.stats.decoder_panics.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    device = %frame.device,
                    len = frame.data.len(),
                    reason = panic_message(payload.as_ref()),
                    "frame decoder panicked; frame dropped"
                );
                return 0;
            }
        };
        self.stats
            .events
            .fetch_add(events.len() as u64, Ordering::Relaxed);

        let snapshot = self.table.snapshot();
        for entry in snapshot.iter() {
            self.deliver(entry, frame, |listener| listener.on_frame(&events));
        }
        for event in &events {
            for entry in snapshot.iter() {
                self.deliver(entry, frame, |listener| listener.on_touch(event));
            }
        }
        events.len()
    }

    fn deliver(
        &self,
        entry: &ListenerEntry,
        frame: &RawFrame,
        call: impl FnOnce(&dyn TouchListener),
    ) {
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| call(entry.listener())));
        if let Err(payload) = delivered {
            self.stats.listener_panics.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                handle = %entry.handle(),
                device = %frame.device,
                reason = panic_message(payload.as_ref()),
                "touch listener panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
