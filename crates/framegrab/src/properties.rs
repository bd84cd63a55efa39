// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! Option lists for a settings UI.
//!
//! The four lists cascade: picking a device rebuilds the format list, picking
//! a format rebuilds the resolution list, picking a resolution rebuilds the
//! frame rate list. Each handler opens the configured device, queries it and
//! closes it again before returning.

use serde::Serialize;

use crate::settings::{CaptureConfig, Settings, DEVICE_ID, FRAMERATE, PIXELFORMAT, RESOLUTION};
use crate::v4l2::{DeviceEnumerator, DeviceOpener, ListItem};

/// A named, ordered list of options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyList<T> {
    /// Settings key the selected value is stored under
    pub name: &'static str,
    pub items: Vec<ListItem<T>>,
}

impl<T: PartialEq> PropertyList<T> {
    fn new(name: &'static str) -> Self {
        PropertyList {
            name,
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.items.iter().any(|item| &item.value == value)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// The selectable options of a capture source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Properties {
    pub devices: PropertyList<String>,
    pub formats: PropertyList<u32>,
    pub resolutions: PropertyList<u32>,
    pub framerates: PropertyList<u32>,
}

impl Properties {
    /// Build the device list. The downstream lists start empty.
    pub fn new<O: DeviceOpener>(opener: &O) -> Self {
        let mut properties = Properties {
            devices: PropertyList::new(DEVICE_ID),
            formats: PropertyList::new(PIXELFORMAT),
            resolutions: PropertyList::new(RESOLUTION),
            framerates: PropertyList::new(FRAMERATE),
        };
        properties.devices.items = DeviceEnumerator::devices(opener, None);
        properties
    }

    /// Build the device list and cascade through every downstream list for
    /// the values currently in `settings`.
    pub fn build<O: DeviceOpener>(opener: &O, settings: &Settings) -> Self {
        let mut properties = Properties::new(opener);
        if properties.device_selected(opener, settings) {
            properties.format_selected(opener, settings);
            properties.resolution_selected(opener, settings);
        }
        properties
    }

    /// Rebuild the format list for the selected device.
    ///
    /// Returns `false` when the device cannot be opened.
    pub fn device_selected<O: DeviceOpener>(&mut self, opener: &O, settings: &Settings) -> bool {
        self.formats.clear();
        let device_id = settings.get_string(DEVICE_ID);
        match DeviceEnumerator::with_device(opener, device_id, |dev| {
            DeviceEnumerator::formats(dev)
        }) {
            Ok(items) => {
                self.formats.items = items;
                true
            }
            Err(err) => {
                log::debug!("Unable to open {}: {}", device_id, err);
                false
            }
        }
    }

    /// Rebuild the resolution list for the selected device and format.
    pub fn format_selected<O: DeviceOpener>(&mut self, opener: &O, settings: &Settings) -> bool {
        self.resolutions.clear();
        let config = CaptureConfig::from_settings(settings);
        match DeviceEnumerator::with_device(opener, &config.device_id, |dev| {
            DeviceEnumerator::resolutions(dev, config.pixelformat)
        }) {
            Ok(items) => {
                self.resolutions.items = items;
                true
            }
            Err(err) => {
                log::debug!("Unable to open {}: {}", config.device_id, err);
                false
            }
        }
    }

    /// Rebuild the frame rate list for the selected device, format and
    /// resolution.
    pub fn resolution_selected<O: DeviceOpener>(
        &mut self,
        opener: &O,
        settings: &Settings,
    ) -> bool {
        self.framerates.clear();
        let config = CaptureConfig::from_settings(settings);
        let (width, height) = config.resolution();
        match DeviceEnumerator::with_device(opener, &config.device_id, |dev| {
            DeviceEnumerator::framerates(dev, config.pixelformat, width, height)
        }) {
            Ok(items) => {
                self.framerates.items = items;
                true
            }
            Err(err) => {
                log::debug!("Unable to open {}: {}", config.device_id, err);
                false
            }
        }
    }
}
