//! Device identity.
//!
//! A [`DeviceInfo`] is an immutable description of one touch-capable device as
//! reported by a backend at enumeration time. Two infos compare equal when they
//! name the same physical device ([`DeviceId`]), regardless of display name or
//! metadata differences between enumerations.
//!
//! ## Identity notes
//! - `DeviceId` is opaque. Backends derive it from whatever is stable on their
//!   platform (serial number, registry path, synthetic slot name).
//! - An id that resolved at enumeration time may stop resolving later (unplug).
//!   Selecting such a device fails with
//!   [`Error::DeviceUnavailable`](crate::Error::DeviceUnavailable).

use crate::metadata::DeviceMeta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Stable opaque key for a physical device.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Description of one touch-capable device.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Human-readable device name (e.g. `"Apple Internal Keyboard / Trackpad"`).
    pub name: String,
    /// Stable identity; equality and hashing use this field only.
    pub id: DeviceId,
    /// `true` for a device integrated into the machine (laptop trackpad).
    pub built_in: bool,
    /// Best-effort backend metadata.
    #[serde(default)]
    pub meta: DeviceMeta,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, id: impl Into<DeviceId>, built_in: bool) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            built_in,
            meta: DeviceMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: DeviceMeta) -> Self {
        self.meta = meta;
        self
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq for DeviceInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DeviceInfo {}

impl Hash for DeviceInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.built_in { "built-in" } else { "external" };
        write!(f, "{} [{}] ({kind})", self.name, self.id)
    }
}
