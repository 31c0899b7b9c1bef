//! Session configuration.
//!
//! [`SessionConfig`] is plain serde data, usually read from a TOML file the
//! host application owns. Every field has a default, so an empty document is a
//! valid configuration.
//!
//! ```toml
//! auto_select = "built_in"
//! restore_haptics_on_drop = true
//!
//! [hid]
//! read_timeout_ms = 10
//! report_len = 64
//! ```
//!
//! Device selection itself is never persisted; `auto_select` only describes
//! which device [`Session::select_default`](crate::session::Session::select_default)
//! should pick from the current enumeration.

use crate::device::DeviceInfo;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which device `select_default` picks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoSelect {
    /// Leave the session unselected.
    #[default]
    None,
    /// First built-in device, falling back to the first device.
    BuiltIn,
    /// First device in enumeration order.
    First,
}

impl AutoSelect {
    /// Picks a device from an enumeration according to this policy.
    pub fn pick<'a>(&self, devices: &'a [DeviceInfo]) -> Option<&'a DeviceInfo> {
        match self {
            Self::None => None,
            Self::BuiltIn => devices
                .iter()
                .find(|d| d.built_in)
                .or_else(|| devices.first()),
            Self::First => devices.first(),
        }
    }
}

/// Reader settings for the `hid` backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HidConfig {
    /// How long one blocking report read may wait before re-checking for stop.
    /// Unsigned, since a negative timeout means "block forever" to hidapi.
    pub read_timeout_ms: u32,
    /// Report buffer size in bytes.
    pub report_len: usize,
}

impl HidConfig {
    /// Upper bound on one read, so stopping a reader never takes longer.
    pub const MAX_READ_TIMEOUT_MS: u32 = 1_000;

    /// Timeout handed to `hidapi`, always in `0..=MAX_READ_TIMEOUT_MS`.
    pub fn read_timeout(&self) -> i32 {
        self.read_timeout_ms.min(Self::MAX_READ_TIMEOUT_MS) as i32
    }
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 10,
            report_len: 64,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub auto_select: AutoSelect,
    /// Re-enable haptics on the selected device when the session is dropped
    /// with them turned off, so the trackpad is not left without click
    /// feedback.
    pub restore_haptics_on_drop: bool,
    pub hid: HidConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_select: AutoSelect::None,
            restore_haptics_on_drop: true,
            hid: HidConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.as_ref().display(), ?config, "loaded session config");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> String {
        // Plain structs of scalars always serialize.
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_empty_document_is_default() {
        let config = SessionConfig::from_toml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert!(config.restore_haptics_on_drop);
        assert_eq!(config.hid.read_timeout_ms, 10);
    }

    #[test]
    fn test_partial_document() {
        let config = SessionConfig::from_toml_str(
            r#"
            auto_select = "built_in"

            [hid]
            report_len = 128
            "#,
        )
        .unwrap();
        assert_eq!(config.auto_select, AutoSelect::BuiltIn);
        assert_eq!(config.hid.report_len, 128);
        assert_eq!(config.hid.read_timeout_ms, 10);
    }

    #[test]
    fn test_read_timeout_is_bounded() {
        let err = SessionConfig::from_toml_str("[hid]\nread_timeout_ms = -1").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let config = SessionConfig::from_toml_str("[hid]\nread_timeout_ms = 0").unwrap();
        assert_eq!(config.hid.read_timeout(), 0);

        let config = SessionConfig::from_toml_str("[hid]\nread_timeout_ms = 4000000000").unwrap();
        assert_eq!(config.hid.read_timeout(), HidConfig::MAX_READ_TIMEOUT_MS as i32);
        assert_eq!(HidConfig::default().read_timeout(), 10);
    }

    #[test]
    fn test_invalid_document_is_config_error() {
        let err = SessionConfig::from_toml_str("auto_select = \"sometimes\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = SessionConfig {
            auto_select: AutoSelect::First,
            restore_haptics_on_drop: false,
            hid: HidConfig::default(),
        };
        let text = config.to_toml_string();
        assert_eq!(SessionConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = SessionConfig::load("/nonexistent/touchup.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_auto_select_pick() {
        let devices = vec![
            DeviceInfo::new("External", "ext", false),
            DeviceInfo::new("Internal", "int", true),
        ];
        assert!(AutoSelect::None.pick(&devices).is_none());
        assert_eq!(AutoSelect::First.pick(&devices).unwrap().id.as_str(), "ext");
        assert_eq!(AutoSelect::BuiltIn.pick(&devices).unwrap().id.as_str(), "int");
        assert_eq!(
            AutoSelect::BuiltIn.pick(&devices[..1]).unwrap().id.as_str(),
            "ext"
        );
        assert!(AutoSelect::First.pick(&[]).is_none());
    }
}
