// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! Scalar settings store and the capture configuration read from it.
//!
//! Hosts persist settings as flat JSON objects:
//!
//! ```
//! use framegrab::settings::{CaptureConfig, Settings};
//!
//! let settings: Settings = serde_json::from_str(
//!     r#"{ "device_id": "/dev/video2", "resolution": 83886800 }"#,
//! ).unwrap();
//! let config = CaptureConfig::from_settings(&settings);
//! assert_eq!(config.device_id, "/dev/video2");
//! assert_eq!(config.resolution(), (1280, 720));
//! ```

use std::collections::BTreeMap;

use framegrab_sys::V4L2_PIX_FMT_YUYV;
use serde::{Deserialize, Serialize};

use crate::tuple::{pack, unpack};
use crate::v4l2::Fraction;

pub const DEVICE_ID: &str = "device_id";
pub const PIXELFORMAT: &str = "pixelformat";
pub const RESOLUTION: &str = "resolution";
pub const FRAMERATE: &str = "framerate";

pub const DEFAULT_PIXELFORMAT: u32 = V4L2_PIX_FMT_YUYV;
pub const DEFAULT_RESOLUTION: u32 = pack(640, 480);
pub const DEFAULT_FRAMERATE: u32 = pack(1, 30);

/// A single stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Int(i64),
    Str(String),
}

/// String-keyed scalar store with separately tracked defaults.
///
/// Readers return the user value, then the default, then `0` or `""`. Only
/// user values are serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, SettingValue>,
    #[serde(skip)]
    defaults: BTreeMap<String, SettingValue>,
}

impl Settings {
    fn lookup(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key).or_else(|| self.defaults.get(key))
    }

    pub fn get_string(&self, key: &str) -> &str {
        match self.lookup(key) {
            Some(SettingValue::Str(value)) => value,
            _ => "",
        }
    }

    pub fn get_int(&self, key: &str) -> i64 {
        match self.lookup(key) {
            Some(SettingValue::Int(value)) => *value,
            _ => 0,
        }
    }

    pub fn set_string(&mut self, key: &str, value: &str) {
        self.values
            .insert(key.to_string(), SettingValue::Str(value.to_string()));
    }

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), SettingValue::Int(value));
    }

    pub fn set_default_string(&mut self, key: &str, value: &str) {
        self.defaults
            .insert(key.to_string(), SettingValue::Str(value.to_string()));
    }

    pub fn set_default_int(&mut self, key: &str, value: i64) {
        self.defaults
            .insert(key.to_string(), SettingValue::Int(value));
    }

    /// Whether `key` carries a user value rather than only a default.
    pub fn has_user_value(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Drop the user value for `key`, exposing its default again.
    pub fn remove(&mut self, key: &str) -> Option<SettingValue> {
        self.values.remove(key)
    }

    /// Copy every user value of `other` over this store.
    pub fn merge(&mut self, other: &Settings) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    fn get_u32(&self, key: &str) -> u32 {
        // packed values occupy the low 32 bits
        self.get_int(key) as u32
    }
}

/// Install the default pixel format, resolution and frame rate.
pub fn defaults(settings: &mut Settings) {
    settings.set_default_int(PIXELFORMAT, i64::from(DEFAULT_PIXELFORMAT));
    settings.set_default_int(RESOLUTION, i64::from(DEFAULT_RESOLUTION));
    settings.set_default_int(FRAMERATE, i64::from(DEFAULT_FRAMERATE));
}

/// The configuration a capture session is built from.
///
/// Two configurations are compared field by field; any difference restarts
/// the session.
///
/// # Example
///
/// ```
/// use framegrab::settings::CaptureConfig;
/// use framegrab::fourcc::FourCC;
///
/// let config = CaptureConfig::default()
///     .with_device("/dev/video0")
///     .with_format(FourCC::NV12.as_u32())
///     .with_resolution(1280, 720)
///     .with_framerate(1, 60);
/// assert_eq!(config.interval().label(), "60.00");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub device_id: String,
    /// V4L2 fourcc value
    pub pixelformat: u32,
    /// `pack(width, height)`
    pub resolution: u32,
    /// `pack(numerator, denominator)` of the frame interval
    pub framerate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            device_id: String::new(),
            pixelformat: DEFAULT_PIXELFORMAT,
            resolution: DEFAULT_RESOLUTION,
            framerate: DEFAULT_FRAMERATE,
        }
    }
}

impl CaptureConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        CaptureConfig {
            device_id: settings.get_string(DEVICE_ID).to_string(),
            pixelformat: settings.get_u32(PIXELFORMAT),
            resolution: settings.get_u32(RESOLUTION),
            framerate: settings.get_u32(FRAMERATE),
        }
    }

    /// Store this configuration as user values.
    pub fn write_to(&self, settings: &mut Settings) {
        settings.set_string(DEVICE_ID, &self.device_id);
        settings.set_int(PIXELFORMAT, i64::from(self.pixelformat));
        settings.set_int(RESOLUTION, i64::from(self.resolution));
        settings.set_int(FRAMERATE, i64::from(self.framerate));
    }

    pub fn with_device(mut self, device_id: &str) -> Self {
        self.device_id = device_id.to_string();
        self
    }

    pub fn with_format(mut self, pixelformat: u32) -> Self {
        self.pixelformat = pixelformat;
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = pack(width, height);
        self
    }

    /// Set the frame interval, e.g. `(1, 30)` for 30 frames per second.
    pub fn with_framerate(mut self, numerator: u32, denominator: u32) -> Self {
        self.framerate = pack(numerator, denominator);
        self
    }

    /// Requested `(width, height)`.
    pub fn resolution(&self) -> (u32, u32) {
        unpack(self.resolution)
    }

    /// Requested frame interval.
    pub fn interval(&self) -> Fraction {
        let (numerator, denominator) = unpack(self.framerate);
        Fraction::new(numerator, denominator)
    }

    /// Names of the fields that differ from `other`.
    pub fn changed_fields(&self, other: &CaptureConfig) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.device_id != other.device_id {
            changed.push(DEVICE_ID);
        }
        if self.pixelformat != other.pixelformat {
            changed.push(PIXELFORMAT);
        }
        if self.resolution != other.resolution {
            changed.push(RESOLUTION);
        }
        if self.framerate != other.framerate {
            changed.push(FRAMERATE);
        }
        changed
    }
}
