//! Touch events and raw frames.
//!
//! Backends deliver opaque [`RawFrame`]s, one per hardware frame. A
//! [`FrameDecoder`] turns each frame into zero or more [`TouchEvent`]s, one per
//! finger currently known to the hardware. touchup never interprets the frame
//! payload itself.
//!
//! ## Value conventions
//! - **Position:** normalized to `[0.0, 1.0]` on both axes, origin bottom-left
//!   as reported by most trackpad firmware.
//! - **Pressure / density / axis:** raw firmware units; not normalized.
//! - **Angle:** radians.
//! - **Timestamp:** hardware clock in seconds. Only meaningful for ordering
//!   and deltas within one device session.

use crate::device::DeviceId;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Motion phase of a single finger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchState {
    NotTouching,
    Starting,
    Hovering,
    Making,
    Touching,
    Breaking,
    Lingering,
    Leaving,
}

impl TouchState {
    /// Map the firmware's numeric path stage (0..=7) to a state.
    ///
    /// Returns `None` for values outside the known range; decoders should drop
    /// such contacts rather than guess.
    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => Self::NotTouching,
            1 => Self::Starting,
            2 => Self::Hovering,
            3 => Self::Making,
            4 => Self::Touching,
            5 => Self::Breaking,
            6 => Self::Lingering,
            7 => Self::Leaving,
            _ => return None,
        })
    }

    /// `true` while the finger is in contact with the surface.
    pub fn is_contact(self) -> bool {
        matches!(self, Self::Making | Self::Touching | Self::Breaking)
    }
}

/// Normalized finger position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Contact ellipse axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub major: f32,
    pub minor: f32,
}

/// One finger's instantaneous state within a hardware frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    /// Finger identifier, stable while the finger stays on the surface.
    pub id: i32,
    pub position: Position,
    /// Number of fingers reported in the same frame.
    pub total: i32,
    pub pressure: f32,
    pub axis: Axis,
    pub angle: f32,
    pub density: f32,
    pub state: TouchState,
    /// Hardware timestamp in seconds.
    pub timestamp: f64,
}

/// Opaque per-frame record delivered by a backend.
#[derive(Clone, Debug)]
pub struct RawFrame {
    /// Device that produced the frame.
    pub device: DeviceId,
    /// Host capture time (monotonic).
    pub at: Instant,
    /// Backend-defined payload.
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn new(device: DeviceId, data: Vec<u8>) -> Self {
        Self {
            device,
            at: Instant::now(),
            data,
        }
    }
}

/// Turns a raw frame into per-finger events.
///
/// Must be a pure function of its input: it is called on the backend's
/// callback thread, once per frame, and its output is fanned out to every
/// registered listener.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, frame: &RawFrame) -> Vec<TouchEvent>;
}

impl<F> FrameDecoder for F
where
    F: Fn(&RawFrame) -> Vec<TouchEvent> + Send + Sync,
{
    fn decode(&self, frame: &RawFrame) -> Vec<TouchEvent> {
        self(frame)
    }
}
