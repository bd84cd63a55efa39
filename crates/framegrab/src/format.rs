// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! Pixel format mapping and plane geometry.
//!
//! A device reports its formats as V4L2 fourcc values. Only the YUV layouts
//! listed in [`to_video_format`] can be described to a consumer; everything
//! else (compressed formats, RGB, ...) maps to `None`.

use std::fmt;

use framegrab_sys::{
    V4L2_PIX_FMT_NV12, V4L2_PIX_FMT_UYVY, V4L2_PIX_FMT_YUV420, V4L2_PIX_FMT_YUYV,
    V4L2_PIX_FMT_YVU420, V4L2_PIX_FMT_YVYU,
};
use serde::{Deserialize, Serialize};

/// Upper bound on planes in a frame view.
pub const MAX_PLANES: usize = 8;

/// Layout of the pixels a consumer receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoFormat {
    /// Packed 4:2:2, Y0 V0 Y1 U0
    Yvyu,
    /// Packed 4:2:2, Y0 U0 Y1 V0
    Yuy2,
    /// Packed 4:2:2, U0 Y0 V0 Y1
    Uyvy,
    /// Semi-planar 4:2:0, Y plane followed by interleaved UV
    Nv12,
    /// Planar 4:2:0, Y then U then V
    I420,
}

impl VideoFormat {
    /// Short uppercase name.
    pub fn name(&self) -> &'static str {
        match self {
            VideoFormat::Yvyu => "YVYU",
            VideoFormat::Yuy2 => "YUY2",
            VideoFormat::Uyvy => "UYVY",
            VideoFormat::Nv12 => "NV12",
            VideoFormat::I420 => "I420",
        }
    }

    /// Number of planes a frame in this format carries.
    pub fn plane_count(&self) -> usize {
        match self {
            VideoFormat::Yvyu | VideoFormat::Yuy2 | VideoFormat::Uyvy => 1,
            VideoFormat::Nv12 => 2,
            VideoFormat::I420 => 3,
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Map a V4L2 pixel format to the consumer-facing format.
///
/// Both 4:2:0 planar orders map to [`VideoFormat::I420`]; the YVU order is
/// handled by swapping the chroma planes in [`plane_layout`].
pub fn to_video_format(pixelformat: u32) -> Option<VideoFormat> {
    match pixelformat {
        V4L2_PIX_FMT_YVYU => Some(VideoFormat::Yvyu),
        V4L2_PIX_FMT_YUYV => Some(VideoFormat::Yuy2),
        V4L2_PIX_FMT_UYVY => Some(VideoFormat::Uyvy),
        V4L2_PIX_FMT_NV12 => Some(VideoFormat::Nv12),
        V4L2_PIX_FMT_YUV420 | V4L2_PIX_FMT_YVU420 => Some(VideoFormat::I420),
        _ => None,
    }
}

/// Where one plane lives inside a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaneInfo {
    /// Byte offset from the start of the buffer
    pub offset: usize,
    /// Bytes per line
    pub stride: u32,
    /// Bytes occupied by the plane
    pub size: usize,
}

/// Plane geometry for one negotiated format.
///
/// Holds at most [`MAX_PLANES`] entries; the populated count is explicit so
/// a zero offset is never mistaken for an absent plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaneLayout {
    planes: [PlaneInfo; MAX_PLANES],
    count: usize,
}

impl PlaneLayout {
    fn push(&mut self, offset: usize, stride: u32, size: usize) {
        if self.count < MAX_PLANES {
            self.planes[self.count] = PlaneInfo {
                offset,
                stride,
                size,
            };
            self.count += 1;
        }
    }

    /// Populated planes in order.
    pub fn planes(&self) -> &[PlaneInfo] {
        &self.planes[..self.count]
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bytes from the start of the buffer to the end of the last plane.
    pub fn total_size(&self) -> usize {
        self.planes()
            .iter()
            .map(|p| p.offset + p.size)
            .max()
            .unwrap_or(0)
    }
}

fn default_stride(width: u32, pixelformat: u32) -> u32 {
    match pixelformat {
        V4L2_PIX_FMT_YVYU | V4L2_PIX_FMT_YUYV | V4L2_PIX_FMT_UYVY => width * 2,
        _ => width,
    }
}

/// Compute the plane offsets and strides of a negotiated format.
///
/// `stride` is the luma line pitch reported by the device. Some drivers
/// report zero, in which case a tightly packed pitch is derived from `width`.
///
/// | format | planes (offset, stride) |
/// |--------|-------------------------|
/// | YUV420 | `(0, s)`, `(s*h, s/2)`, `(s*h*5/4, s/2)` |
/// | YVU420 | `(0, s)`, `(s*h*5/4, s/2)`, `(s*h, s/2)` |
/// | NV12   | `(0, s)`, `(s*h, s/2)` |
/// | other  | `(0, s)` |
pub fn plane_layout(width: u32, height: u32, stride: u32, pixelformat: u32) -> PlaneLayout {
    let stride = if stride == 0 {
        default_stride(width, pixelformat)
    } else {
        stride
    };
    let luma = stride as usize * height as usize;
    let mut layout = PlaneLayout::default();

    match pixelformat {
        V4L2_PIX_FMT_YUV420 => {
            layout.push(0, stride, luma);
            layout.push(luma, stride / 2, luma / 4);
            layout.push(luma * 5 / 4, stride / 2, luma / 4);
        }
        V4L2_PIX_FMT_YVU420 => {
            // V is stored first; the consumer always sees Y, U, V
            layout.push(0, stride, luma);
            layout.push(luma * 5 / 4, stride / 2, luma / 4);
            layout.push(luma, stride / 2, luma / 4);
        }
        V4L2_PIX_FMT_NV12 => {
            layout.push(0, stride, luma);
            layout.push(luma, stride / 2, luma / 2);
        }
        _ => layout.push(0, stride, luma),
    }

    layout
}

/// Color conversion parameters attached to every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorParams {
    /// Row-major 4x4 YUV to RGB matrix
    pub matrix: [f32; 16],
    pub range_min: [f32; 3],
    pub range_max: [f32; 3],
}

impl ColorParams {
    /// ITU-R BT.601, partial (studio swing) range.
    pub fn bt601_partial() -> Self {
        ColorParams {
            matrix: [
                1.164384, 0.000000, 1.596027, -0.874202, //
                1.164384, -0.391762, -0.812968, 0.531668, //
                1.164384, 2.017232, 0.000000, -1.085631, //
                0.000000, 0.000000, 0.000000, 1.000000,
            ],
            range_min: [16.0 / 255.0, 16.0 / 255.0, 16.0 / 255.0],
            range_max: [235.0 / 255.0, 240.0 / 255.0, 240.0 / 255.0],
        }
    }
}

impl Default for ColorParams {
    fn default() -> Self {
        ColorParams::bt601_partial()
    }
}
