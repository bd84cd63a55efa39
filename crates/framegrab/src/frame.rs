// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! Frame views and the consumer interface.
//!
//! A [`Frame`] borrows the mapped memory of one dequeued device buffer. It
//! is only valid for the duration of [`FrameSink::deliver_frame`]; the buffer
//! goes back to the driver as soon as the call returns, so consumers that need
//! the pixels later must copy them out.

use std::time::Duration;

use serde::Serialize;
use unix_ts::Timestamp;

use crate::format::{
    plane_layout, to_video_format, ColorParams, PlaneLayout, VideoFormat, MAX_PLANES,
};
use crate::v4l2::{DequeuedBuffer, Fraction, NegotiatedFormat};
use crate::Error;

/// Pixels and line pitch of one plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    /// Bytes per line
    pub stride: u32,
}

/// A captured frame, borrowed from the buffer pool.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    planes: [Plane<'a>; MAX_PLANES],
    plane_count: usize,
    pub width: u32,
    pub height: u32,
    pub format: VideoFormat,
    pub color: &'a ColorParams,
    /// Driver capture time in nanoseconds
    pub timestamp_ns: u64,
    /// Driver frame counter
    pub sequence: u32,
    /// Bytes of valid image data in the buffer
    pub bytes_used: u32,
}

impl<'a> Frame<'a> {
    /// Planes in Y, U, V order (or Y, UV for NV12).
    pub fn planes(&self) -> &[Plane<'a>] {
        &self.planes[..self.plane_count]
    }

    pub fn plane(&self, index: usize) -> Option<&Plane<'a>> {
        self.planes().get(index)
    }

    pub fn plane_count(&self) -> usize {
        self.plane_count
    }

    /// Capture time as a [`Timestamp`].
    ///
    /// Drivers usually report `CLOCK_MONOTONIC` time, so this is comparable
    /// between frames of one session rather than to wall-clock time.
    pub fn timestamp(&self) -> Timestamp {
        let nanos = Duration::from_nanos(self.timestamp_ns);
        Timestamp::new(nanos.as_secs() as i64, nanos.subsec_nanos())
    }
}

/// Precomputed per-session geometry used to build frame views.
#[derive(Debug, Clone)]
pub struct FrameTemplate {
    width: u32,
    height: u32,
    format: VideoFormat,
    layout: PlaneLayout,
    color: ColorParams,
}

impl FrameTemplate {
    /// Build the template for a negotiated format.
    ///
    /// Fails when the device settled on a pixel format frames cannot be built
    /// from.
    pub fn new(negotiated: &NegotiatedFormat) -> Result<Self, Error> {
        let format = to_video_format(negotiated.pixelformat)
            .ok_or_else(|| Error::UnsupportedFormat(negotiated.fourcc()))?;
        Ok(FrameTemplate {
            width: negotiated.width,
            height: negotiated.height,
            format,
            layout: plane_layout(
                negotiated.width,
                negotiated.height,
                negotiated.stride,
                negotiated.pixelformat,
            ),
            color: ColorParams::bt601_partial(),
        })
    }

    pub fn format(&self) -> VideoFormat {
        self.format
    }

    pub fn layout(&self) -> &PlaneLayout {
        &self.layout
    }

    /// View `data` (one mapped buffer) as a frame.
    ///
    /// Planes are clamped to the buffer so a short buffer yields short (or
    /// empty) planes rather than reads past the mapping.
    pub fn view<'a>(&'a self, data: &'a [u8], buffer: &DequeuedBuffer) -> Frame<'a> {
        let mut planes = [Plane::default(); MAX_PLANES];
        for (plane, info) in planes.iter_mut().zip(self.layout.planes()) {
            let start = info.offset.min(data.len());
            let end = (info.offset + info.size).min(data.len());
            *plane = Plane {
                data: &data[start..end],
                stride: info.stride,
            };
        }

        Frame {
            planes,
            plane_count: self.layout.len(),
            width: self.width,
            height: self.height,
            format: self.format,
            color: &self.color,
            timestamp_ns: buffer.timestamp.as_nanos(),
            sequence: buffer.sequence,
            bytes_used: buffer.bytes_used,
        }
    }
}

/// Description of a session that just started streaming.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub device: String,
    pub format: NegotiatedFormat,
    pub video_format: VideoFormat,
    /// Frame interval the device agreed to
    pub interval: Fraction,
    /// Buffers in the pool
    pub buffers: usize,
}

/// Receives frames from the capture thread.
///
/// All methods run on the capture thread. `deliver_frame` is on the hot
/// path: it must not block indefinitely and must not keep references into
/// the frame after returning.
pub trait FrameSink: Send + Sync {
    fn deliver_frame(&self, frame: &Frame<'_>);

    /// Called once after streaming starts, before the first frame.
    fn session_started(&self, _info: &SessionInfo) {}

    /// Called once after streaming stops, with the number of frames delivered.
    fn session_stopped(&self, _frames: u64) {}
}

impl<F> FrameSink for F
where
    F: Fn(&Frame<'_>) + Send + Sync,
{
    fn deliver_frame(&self, frame: &Frame<'_>) {
        self(frame)
    }
}
