//! Pull-style touch subscriptions.
//!
//! [`TouchStream`] registers a listener that forwards every event into an
//! mpsc channel, so consumers can read events on their own thread instead of
//! inside the backend callback. [`FrameStream`] does the same one frame at a
//! time: each item is the full set of fingers in one frame, and an empty
//! `Vec` means every finger has lifted. Dropping either stream removes its
//! listener.

use crate::event::TouchEvent;
use crate::listener::{ListenerHandle, ListenerTable, TouchListener};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub struct TouchStream {
    receiver: Receiver<TouchEvent>,
    table: Arc<ListenerTable>,
    handle: ListenerHandle,
}

impl TouchStream {
    pub fn new(table: &Arc<ListenerTable>) -> Self {
        let (sender, receiver) = mpsc::channel();
        let sender = Mutex::new(sender);
        let handle = table.add(move |event: &TouchEvent| {
            // Receiver gone means the stream is being dropped.
            let _ = sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .send(event.clone());
        });
        Self {
            receiver,
            table: Arc::clone(table),
            handle,
        }
    }

    pub fn handle(&self) -> ListenerHandle {
        self.handle
    }

    /// Next event without blocking.
    pub fn try_recv(&self) -> Option<TouchEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Next event, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<TouchEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything queued so far.
    pub fn drain(&self) -> Vec<TouchEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for TouchStream {
    fn drop(&mut self) {
        self.table.remove(self.handle);
    }
}

/// Forwards whole frames; single events are ignored.
struct FrameForwarder {
    sender: Mutex<Sender<Vec<TouchEvent>>>,
}

impl TouchListener for FrameForwarder {
    fn on_touch(&self, _: &TouchEvent) {}

    fn on_frame(&self, events: &[TouchEvent]) {
        let _ = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(events.to_vec());
    }
}

pub struct FrameStream {
    receiver: Receiver<Vec<TouchEvent>>,
    table: Arc<ListenerTable>,
    handle: ListenerHandle,
}

impl FrameStream {
    pub fn new(table: &Arc<ListenerTable>) -> Self {
        let (sender, receiver) = mpsc::channel();
        let handle = table.add(FrameForwarder {
            sender: Mutex::new(sender),
        });
        Self {
            receiver,
            table: Arc::clone(table),
            handle,
        }
    }

    pub fn handle(&self) -> ListenerHandle {
        self.handle
    }

    /// Next frame without blocking.
    pub fn try_recv(&self) -> Option<Vec<TouchEvent>> {
        self.receiver.try_recv().ok()
    }

    /// Next frame, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Vec<TouchEvent>> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Every frame queued so far, oldest first.
    pub fn drain(&self) -> Vec<Vec<TouchEvent>> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        self.table.remove(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Axis, Position, TouchState};

    fn touch(id: i32) -> TouchEvent {
        TouchEvent {
            id,
            position: Position { x: 0.1, y: 0.9 },
            total: 1,
            pressure: 0.3,
            axis: Axis::default(),
            angle: 0.0,
            density: 0.0,
            state: TouchState::Making,
            timestamp: 1.5,
        }
    }

    #[test]
    fn test_stream_receives_in_order() {
        let table = Arc::new(ListenerTable::new());
        let stream = TouchStream::new(&table);

        for entry in table.snapshot().iter() {
            entry.listener().on_touch(&touch(1));
            entry.listener().on_touch(&touch(2));
        }

        let ids: Vec<_> = stream.drain().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn test_recv_timeout_when_idle() {
        let table = Arc::new(ListenerTable::new());
        let stream = TouchStream::new(&table);
        assert!(stream.recv_timeout(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn test_drop_unregisters() {
        let table = Arc::new(ListenerTable::new());
        let stream = TouchStream::new(&table);
        let handle = stream.handle();
        assert!(table.contains(handle));

        drop(stream);
        assert!(!table.contains(handle));
        assert!(table.is_empty());
    }

    #[test]
    fn test_frame_stream_keeps_frame_boundaries() {
        let table = Arc::new(ListenerTable::new());
        let frames = FrameStream::new(&table);

        for entry in table.snapshot().iter() {
            entry.listener().on_frame(&[touch(1), touch(2)]);
            entry.listener().on_frame(&[]);
            // Per-event delivery does not produce frames.
            entry.listener().on_touch(&touch(3));
        }

        let got = frames.drain();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(got[1].is_empty());
        assert!(frames.recv_timeout(Duration::from_millis(5)).is_none());

        drop(frames);
        assert!(table.is_empty());
    }
}
