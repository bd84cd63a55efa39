// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! V4L2 Device Access and Capability Enumeration
//!
//! Every device request the capture engine makes goes through the
//! [`VideoDevice`] trait, and every device node is opened through a
//! [`DeviceOpener`]. [`SystemOpener`] and [`V4l2Device`] are the production
//! implementations; tests substitute in-memory devices.
//!
//! # Quick Start
//!
//! ```no_run
//! use framegrab::v4l2::{DeviceEnumerator, SystemOpener};
//!
//! let opener = SystemOpener::default();
//! for device in DeviceEnumerator::devices(&opener, None) {
//!     println!("{}: {}", device.value, device.label);
//! }
//! ```
//!
//! # Backends
//!
//! Device calls use libv4l2 when it can be loaded at runtime, which adds
//! software-emulated formats (flagged "Emulated" in format lists). Set
//! `FRAMEGRAB_LIBV4L2=none` to force direct kernel calls.
//!
//! # See Also
//!
//! - [`DeviceEnumerator`] - Option lists for devices, formats, sizes and rates
//! - [`VideoDevice`] - The device seam

use std::io;
use std::ptr::NonNull;
use std::time::Duration;

mod device;
mod enumerator;
mod system;

pub use device::{
    BufferInfo, BufferTimestamp, Capability, DequeuedBuffer, FormatDescription, Fraction,
    FrameInterval, FrameSize, NegotiatedFormat, Resolution, StepwiseInterval, StepwiseSize,
};
pub use enumerator::{DeviceEnumerator, ListItem, FALLBACK_FRAMERATES, FALLBACK_RESOLUTIONS};
pub use system::{SystemOpener, V4l2Device};

/// An open video capture device.
///
/// Methods take `&self` so one handle can be shared between the control
/// context and the capture thread. Enumeration methods return `Ok(None)` past
/// the last entry.
pub trait VideoDevice: Send + Sync {
    /// Query identity and capability flags.
    fn capability(&self) -> io::Result<Capability>;

    /// Pixel format at `index` of the capture queue.
    fn enum_format(&self, index: u32) -> io::Result<Option<FormatDescription>>;

    /// Frame size at `index` for `pixelformat`.
    fn enum_frame_size(&self, pixelformat: u32, index: u32) -> io::Result<Option<FrameSize>>;

    /// Frame interval at `index` for a format and size.
    fn enum_frame_interval(
        &self,
        pixelformat: u32,
        width: u32,
        height: u32,
        index: u32,
    ) -> io::Result<Option<FrameInterval>>;

    /// Request a capture format, returning what the device actually chose.
    fn set_format(&self, width: u32, height: u32, pixelformat: u32)
        -> io::Result<NegotiatedFormat>;

    /// Request a frame interval, returning what the device actually chose.
    fn set_frame_interval(&self, interval: Fraction) -> io::Result<Fraction>;

    /// Ask for `count` memory-mapped buffers, returning how many were granted.
    fn request_buffers(&self, count: u32) -> io::Result<u32>;

    fn query_buffer(&self, index: u32) -> io::Result<BufferInfo>;

    /// Map a pool buffer into process memory.
    fn map_buffer(&self, info: &BufferInfo) -> io::Result<NonNull<u8>>;

    /// Release a mapping created by [`VideoDevice::map_buffer`].
    ///
    /// # Safety
    ///
    /// `ptr`/`length` must describe a live mapping from this device, and no
    /// slice into it may be used afterwards.
    unsafe fn unmap_buffer(&self, ptr: NonNull<u8>, length: usize) -> io::Result<()>;

    /// Hand buffer `index` to the driver for filling.
    fn queue_buffer(&self, index: u32) -> io::Result<()>;

    /// Take the next filled buffer. Fails with `WouldBlock` when none is ready.
    fn dequeue_buffer(&self) -> io::Result<DequeuedBuffer>;

    fn stream_on(&self) -> io::Result<()>;

    fn stream_off(&self) -> io::Result<()>;

    /// Wait until a filled buffer is ready. `Ok(false)` means the timeout
    /// expired.
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool>;
}

/// Opens device nodes by identifier and lists candidate identifiers.
pub trait DeviceOpener {
    type Device: VideoDevice + 'static;

    /// Open the device at `path` for non-blocking capture.
    fn open(&self, path: &str) -> io::Result<Self::Device>;

    /// Candidate device identifiers in discovery order.
    fn candidates(&self) -> io::Result<Vec<String>>;
}
