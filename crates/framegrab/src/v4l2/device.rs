// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! V4L2 device types and structures
//!
//! This module defines the values exchanged with a [`VideoDevice`](super::VideoDevice):
//!
//! - [`Capability`] - Identity and capability flags of a device node
//! - [`FormatDescription`] - One entry of the pixel format enumeration
//! - [`FrameSize`] / [`FrameInterval`] - Size and interval enumeration entries
//! - [`Fraction`] / [`Resolution`] - Frame interval and frame size values
//! - [`NegotiatedFormat`] - What the device agreed to deliver
//! - [`BufferInfo`] / [`DequeuedBuffer`] - Buffer pool bookkeeping

use std::fmt;

use framegrab_sys as ffi;
use serde::{Deserialize, Serialize};

use crate::fourcc::FourCC;

/// Result of `VIDIOC_QUERYCAP`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capability {
    /// Driver name (e.g., "uvcvideo")
    pub driver: String,
    /// Human-readable device name
    pub card: String,
    /// Bus location (e.g., "usb-0000:00:14.0-1")
    pub bus_info: String,
    /// Capabilities of the whole physical device
    pub capabilities: u32,
    /// Capabilities of this node, valid when `V4L2_CAP_DEVICE_CAPS` is set
    pub device_caps: u32,
}

impl Capability {
    /// Capabilities of this particular node.
    pub fn node_caps(&self) -> u32 {
        if self.capabilities & ffi::V4L2_CAP_DEVICE_CAPS != 0 {
            self.device_caps
        } else {
            self.capabilities
        }
    }

    /// Whether this node offers single-planar video capture.
    pub fn is_capture(&self) -> bool {
        self.node_caps() & ffi::V4L2_CAP_VIDEO_CAPTURE != 0
    }
}

/// One entry of the pixel format enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescription {
    pub index: u32,
    /// V4L2 fourcc value
    pub pixelformat: u32,
    /// Driver-provided description (e.g., "YUYV 4:2:2")
    pub description: String,
    /// `V4L2_FMT_FLAG_*` bits
    pub flags: u32,
}

impl FormatDescription {
    /// Whether the format is produced by software conversion in libv4l2
    /// rather than natively by the hardware.
    pub fn is_emulated(&self) -> bool {
        self.flags & ffi::V4L2_FMT_FLAG_EMULATED != 0
    }

    pub fn fourcc(&self) -> FourCC {
        FourCC::from_u32(self.pixelformat)
    }
}

/// Frame width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Resolution {
    /// Create a new resolution
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Range of frame sizes for stepwise or continuous devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepwiseSize {
    pub min: Resolution,
    pub max: Resolution,
    pub step: Resolution,
}

/// One entry of the frame size enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSize {
    /// A single fixed size
    Discrete(Resolution),
    /// Any size inside the range on the given step grid
    Stepwise(StepwiseSize),
    /// Any size inside the range
    Continuous(StepwiseSize),
}

/// Time between frames as a rational number of seconds.
///
/// A frame interval of 1/30 s is 30 frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fraction {
    pub numerator: u32,
    pub denominator: u32,
}

impl Fraction {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Frames per second this interval corresponds to, or 0 when the
    /// numerator is zero.
    pub fn fps(&self) -> f64 {
        if self.numerator == 0 {
            0.0
        } else {
            f64::from(self.denominator) / f64::from(self.numerator)
        }
    }

    /// Frame rate label with two decimals, e.g. "29.97".
    pub fn label(&self) -> String {
        format!("{:.2}", self.fps())
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl From<ffi::v4l2_fract> for Fraction {
    fn from(fract: ffi::v4l2_fract) -> Self {
        Fraction::new(fract.numerator, fract.denominator)
    }
}

impl From<Fraction> for ffi::v4l2_fract {
    fn from(fraction: Fraction) -> Self {
        ffi::v4l2_fract {
            numerator: fraction.numerator,
            denominator: fraction.denominator,
        }
    }
}

/// Range of frame intervals for stepwise or continuous devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepwiseInterval {
    pub min: Fraction,
    pub max: Fraction,
    pub step: Fraction,
}

/// One entry of the frame interval enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameInterval {
    Discrete(Fraction),
    Stepwise(StepwiseInterval),
    Continuous(StepwiseInterval),
}

/// Format the device agreed to deliver after `VIDIOC_S_FMT`.
///
/// May differ from the request; drivers round to the nearest size they
/// support and may substitute the pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NegotiatedFormat {
    pub width: u32,
    pub height: u32,
    /// V4L2 fourcc value
    pub pixelformat: u32,
    /// Bytes per line of the first plane
    pub stride: u32,
    /// Bytes per complete image
    pub size_image: u32,
}

impl NegotiatedFormat {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn fourcc(&self) -> FourCC {
        FourCC::from_u32(self.pixelformat)
    }
}

/// Location of one pool buffer in device memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub index: u32,
    /// Bytes to map
    pub length: u32,
    /// Offset to pass to mmap
    pub offset: u32,
}

/// Capture time reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferTimestamp {
    pub sec: i64,
    pub usec: i64,
}

impl BufferTimestamp {
    /// Nanoseconds, `sec * 1e9 + usec * 1000`.
    pub fn as_nanos(&self) -> u64 {
        (self.sec as u64)
            .wrapping_mul(1_000_000_000)
            .wrapping_add((self.usec as u64).wrapping_mul(1_000))
    }
}

/// A filled buffer handed back by `VIDIOC_DQBUF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DequeuedBuffer {
    pub index: u32,
    /// Bytes of valid image data
    pub bytes_used: u32,
    /// Driver frame counter, gaps mean dropped frames
    pub sequence: u32,
    pub timestamp: BufferTimestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_label() {
        assert_eq!(Fraction::new(1, 30).label(), "30.00");
        assert_eq!(Fraction::new(1001, 30000).label(), "29.97");
        assert_eq!(Fraction::new(1, 5).label(), "5.00");
        assert_eq!(Fraction::new(0, 30).label(), "0.00");
    }

    #[test]
    fn test_timestamp_nanos() {
        let ts = BufferTimestamp { sec: 12, usec: 345 };
        assert_eq!(ts.as_nanos(), 12_000_345_000);
    }

    #[test]
    fn test_capability_flags() {
        let cap = Capability {
            driver: "uvcvideo".into(),
            card: "Webcam".into(),
            bus_info: String::new(),
            capabilities: ffi::V4L2_CAP_VIDEO_CAPTURE | ffi::V4L2_CAP_DEVICE_CAPS,
            device_caps: ffi::V4L2_CAP_VIDEO_CAPTURE | ffi::V4L2_CAP_STREAMING,
        };
        assert!(cap.is_capture());

        let cap = Capability {
            capabilities: ffi::V4L2_CAP_VIDEO_CAPTURE_MPLANE,
            device_caps: 0,
            ..cap
        };
        assert!(!cap.is_capture());

        // metadata node of a capture device
        let cap = Capability {
            capabilities: ffi::V4L2_CAP_VIDEO_CAPTURE | ffi::V4L2_CAP_DEVICE_CAPS,
            device_caps: ffi::V4L2_CAP_STREAMING,
            ..cap
        };
        assert!(!cap.is_capture());
    }

    #[test]
    fn test_emulated_flag() {
        let desc = FormatDescription {
            index: 0,
            pixelformat: ffi::V4L2_PIX_FMT_YUV420,
            description: "Planar YUV 4:2:0".into(),
            flags: ffi::V4L2_FMT_FLAG_EMULATED,
        };
        assert!(desc.is_emulated());
        assert_eq!(desc.fourcc(), FourCC::YU12);
    }
}
