use crate::event::TouchEvent;
use crate::listener::TouchListener;

/// Wraps a listener and filters events based on a user-supplied predicate.
pub struct Filtered<L> {
    predicate: Box<dyn Fn(&TouchEvent) -> bool + Send + Sync>,
    inner: L,
}

impl<L: TouchListener> Filtered<L> {
    pub fn new(predicate: impl Fn(&TouchEvent) -> bool + Send + Sync + 'static, inner: L) -> Self {
        Self {
            predicate: Box::new(predicate),
            inner,
        }
    }

    /// Only fingers in contact with the surface.
    pub fn contacts_only(inner: L) -> Self {
        Self::new(|event: &TouchEvent| event.state.is_contact(), inner)
    }
}

impl<L: TouchListener> TouchListener for Filtered<L> {
    fn on_touch(&self, event: &TouchEvent) {
        if (self.predicate)(event) {
            self.inner.on_touch(event);
        }
    }

    /// The wrapped listener sees the frame with rejected events removed.
    fn on_frame(&self, events: &[TouchEvent]) {
        let kept: Vec<TouchEvent> = events
            .iter()
            .filter(|event| (self.predicate)(*event))
            .cloned()
            .collect();
        self.inner.on_frame(&kept);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Axis, Position, TouchState};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn touch(state: TouchState) -> TouchEvent {
        TouchEvent {
            id: 1,
            position: Position::default(),
            total: 1,
            pressure: 0.0,
            axis: Axis::default(),
            angle: 0.0,
            density: 0.0,
            state,
            timestamp: 0.0,
        }
    }

    #[test]
    fn test_contacts_only() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let filtered = Filtered::contacts_only(move |_: &TouchEvent| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        filtered.on_touch(&touch(TouchState::Hovering));
        filtered.on_touch(&touch(TouchState::Touching));
        filtered.on_touch(&touch(TouchState::Leaving));
        filtered.on_touch(&touch(TouchState::Breaking));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_custom_predicate() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let filtered = Filtered::new(
            |e: &TouchEvent| e.id == 2,
            move |_: &TouchEvent| {
                h.fetch_add(1, Ordering::SeqCst);
            },
        );

        let mut event = touch(TouchState::Touching);
        filtered.on_touch(&event);
        event.id = 2;
        filtered.on_touch(&event);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    struct FrameIds(Mutex<Vec<Vec<i32>>>);

    impl TouchListener for FrameIds {
        fn on_touch(&self, _: &TouchEvent) {}

        fn on_frame(&self, events: &[TouchEvent]) {
            self.0.lock().unwrap().push(events.iter().map(|e| e.id).collect());
        }
    }

    #[test]
    fn test_frames_are_filtered_not_dropped() {
        let filtered = Filtered::contacts_only(FrameIds(Mutex::new(Vec::new())));
        let mut lifted = touch(TouchState::Leaving);
        lifted.id = 3;

        filtered.on_frame(&[touch(TouchState::Touching), lifted]);
        filtered.on_frame(&[]);
        assert_eq!(*filtered.inner.0.lock().unwrap(), vec![vec![1], vec![]]);
    }
}
