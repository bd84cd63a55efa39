// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! V4L2 Capability Enumerator
//!
//! This module provides the [`DeviceEnumerator`] type which turns device
//! capabilities into ordered option lists: devices, then pixel formats for a
//! device, then resolutions for a format, then frame rates for a resolution.

use std::io;

use serde::Serialize;

use crate::format::to_video_format;
use crate::fourcc::FourCC;
use crate::settings::{self, Settings};
use crate::tuple::pack;

use super::device::{Fraction, FrameInterval, FrameSize};
use super::{DeviceOpener, VideoDevice};

/// Resolutions offered when a device only reports a size range.
pub const FALLBACK_RESOLUTIONS: [(u32, u32); 25] = [
    (160, 120),
    (320, 240),
    (480, 320),
    (640, 480),
    (800, 600),
    (1024, 768),
    (1280, 960),
    (1440, 1050),
    (1440, 1080),
    (1600, 1200),
    (640, 360),
    (960, 540),
    (1280, 720),
    (1600, 900),
    (1920, 1080),
    (1920, 1200),
    (432, 520),
    (480, 320),
    (480, 530),
    (486, 440),
    (576, 310),
    (576, 520),
    (576, 570),
    (720, 576),
    (1024, 576),
];

/// Frame intervals `(numerator, denominator)` offered when a device only
/// reports an interval range.
pub const FALLBACK_FRAMERATES: [(u32, u32); 8] = [
    (1, 60),
    (1, 50),
    (1, 30),
    (1, 25),
    (1, 20),
    (1, 15),
    (1, 10),
    (1, 5),
];

/// One selectable option: a display label and the value stored in settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListItem<T> {
    pub label: String,
    pub value: T,
}

impl<T> ListItem<T> {
    pub fn new(label: impl Into<String>, value: T) -> Self {
        ListItem {
            label: label.into(),
            value,
        }
    }
}

/// V4L2 Capability Enumerator
///
/// Provides associated functions that query a device (or the set of device
/// nodes) and produce ordered `(label, value)` lists suitable for a settings
/// UI. Enumeration never fails: problems are logged and yield shorter lists.
///
/// # Example
///
/// ```no_run
/// use framegrab::v4l2::{DeviceEnumerator, SystemOpener};
/// use framegrab::tuple::unpack;
///
/// let opener = SystemOpener::default();
/// DeviceEnumerator::with_device(&opener, "/dev/video0", |dev| {
///     for format in DeviceEnumerator::formats(dev) {
///         println!("{}", format.label);
///         for size in DeviceEnumerator::resolutions(dev, format.value) {
///             let (w, h) = unpack(size.value);
///             let rates = DeviceEnumerator::framerates(dev, format.value, w, h);
///             println!("  {} ({} rates)", size.label, rates.len());
///         }
///     }
/// })?;
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct DeviceEnumerator;

impl DeviceEnumerator {
    /// List capture-capable devices.
    ///
    /// Every candidate from `opener` is opened, queried and closed again.
    /// Nodes that fail to open or lack video capture are skipped. When
    /// `settings` is given and has no device configured, the first device
    /// found becomes the default `device_id`.
    pub fn devices<O: DeviceOpener>(
        opener: &O,
        settings: Option<&mut Settings>,
    ) -> Vec<ListItem<String>> {
        let candidates = match opener.candidates() {
            Ok(candidates) => candidates,
            Err(err) => {
                log::info!("Unable to scan for video devices: {}", err);
                return Vec::new();
            }
        };

        let mut items = Vec::new();
        for path in candidates {
            let device = match opener.open(&path) {
                Ok(device) => device,
                Err(err) => {
                    log::info!("Unable to open {}: {}", path, err);
                    continue;
                }
            };

            match device.capability() {
                Ok(cap) if cap.is_capture() => {
                    log::info!("Found device '{}' at {}", cap.card, path);
                    items.push(ListItem::new(cap.card, path));
                }
                Ok(_) => log::info!("{} seems to not support video capture", path),
                Err(err) => log::info!("Failed to query capabilities for {}: {}", path, err),
            }
        }

        if let Some(settings) = settings {
            if settings.get_string(settings::DEVICE_ID).is_empty() {
                if let Some(first) = items.first() {
                    log::debug!("Selecting {} as default device", first.value);
                    settings.set_string(settings::DEVICE_ID, &first.value);
                }
            }
        }

        items
    }

    /// List the pixel formats of `device` that frames can be built from.
    ///
    /// The value is the V4L2 fourcc. Formats converted in software are
    /// labelled with an " (Emulated)" suffix.
    pub fn formats<D: VideoDevice + ?Sized>(device: &D) -> Vec<ListItem<u32>> {
        let mut items = Vec::new();
        for index in 0.. {
            let desc = match device.enum_format(index) {
                Ok(Some(desc)) => desc,
                Ok(None) => break,
                Err(err) => {
                    log::warn!("Format enumeration stopped at index {}: {}", index, err);
                    break;
                }
            };

            let mut label = desc.description.clone();
            if desc.is_emulated() {
                label.push_str(" (Emulated)");
            }

            if to_video_format(desc.pixelformat).is_some() {
                items.push(ListItem::new(label, desc.pixelformat));
            } else {
                log::info!(
                    "Pixelformat: {} ({}) (unavailable)",
                    label,
                    FourCC::from_u32(desc.pixelformat)
                );
            }
        }
        items
    }

    /// List the resolutions of `device` for `pixelformat`.
    ///
    /// The value is `pack(width, height)`. Devices that report a size range
    /// instead of discrete sizes get [`FALLBACK_RESOLUTIONS`].
    pub fn resolutions<D: VideoDevice + ?Sized>(
        device: &D,
        pixelformat: u32,
    ) -> Vec<ListItem<u32>> {
        match device.enum_frame_size(pixelformat, 0) {
            Ok(Some(FrameSize::Discrete(_))) => {}
            other => {
                if let Err(err) = other {
                    log::debug!("Frame size query failed: {}", err);
                }
                log::info!("Stepwise and Continuous framesizes are currently hardcoded");
                return FALLBACK_RESOLUTIONS
                    .iter()
                    .map(|&(w, h)| ListItem::new(format!("{}x{}", w, h), pack(w, h)))
                    .collect();
            }
        }

        let mut items = Vec::new();
        for index in 0.. {
            match device.enum_frame_size(pixelformat, index) {
                Ok(Some(FrameSize::Discrete(size))) => {
                    items.push(ListItem::new(size.to_string(), pack(size.width, size.height)));
                }
                // drivers do not mix discrete and ranged entries
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(err) => {
                    log::warn!("Frame size enumeration stopped at index {}: {}", index, err);
                    break;
                }
            }
        }
        items
    }

    /// List the frame rates of `device` for a format and size.
    ///
    /// The value is `pack(numerator, denominator)` of the frame interval and
    /// the label its frames-per-second with two decimals. Devices that report
    /// an interval range get [`FALLBACK_FRAMERATES`].
    pub fn framerates<D: VideoDevice + ?Sized>(
        device: &D,
        pixelformat: u32,
        width: u32,
        height: u32,
    ) -> Vec<ListItem<u32>> {
        let item = |interval: Fraction| {
            ListItem::new(
                interval.label(),
                pack(interval.numerator, interval.denominator),
            )
        };

        match device.enum_frame_interval(pixelformat, width, height, 0) {
            Ok(Some(FrameInterval::Discrete(_))) => {}
            other => {
                if let Err(err) = other {
                    log::debug!("Frame interval query failed: {}", err);
                }
                log::info!("Stepwise and Continuous framerates are currently hardcoded");
                return FALLBACK_FRAMERATES
                    .iter()
                    .map(|&(num, den)| item(Fraction::new(num, den)))
                    .collect();
            }
        }

        let mut items = Vec::new();
        for index in 0.. {
            match device.enum_frame_interval(pixelformat, width, height, index) {
                Ok(Some(FrameInterval::Discrete(interval))) => items.push(item(interval)),
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(err) => {
                    log::warn!("Frame interval enumeration stopped at index {}: {}", index, err);
                    break;
                }
            }
        }
        items
    }

    /// Open `path`, run `f` on the device and close it again.
    ///
    /// The device is closed before this returns, whatever `f` does.
    pub fn with_device<O, T, F>(opener: &O, path: &str, f: F) -> io::Result<T>
    where
        O: DeviceOpener,
        F: FnOnce(&O::Device) -> T,
    {
        let device = opener.open(path)?;
        Ok(f(&device))
    }
}
