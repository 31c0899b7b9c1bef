//! A listener that records touch events as JSON lines.
use crate::event::TouchEvent;
use crate::listener::TouchListener;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

/// Writes every event as one JSON object per line to the wrapped writer.
pub struct TouchLogger<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> TouchLogger<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_event(&self, event: &TouchEvent) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *out, event)?;
        out.write_all(b"\n")
    }
}

impl TouchLogger<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TouchListener for TouchLogger<W> {
    fn on_touch(&self, event: &TouchEvent) {
        if let Err(e) = self.write_event(event) {
            tracing::warn!(error = %e, "failed to write touch event");
        }
    }
}
