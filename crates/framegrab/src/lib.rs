// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! Framegrab V4L2 Capture Engine
//!
//! Acquires frames from a Linux video device, negotiates a pixel format,
//! resolution and frame rate the device supports, maps the device buffers
//! into process memory and delivers zero-copy frame views to a consumer at
//! the device's native cadence until stopped or reconfigured.
//!
//! # Quick Start
//!
//! ```no_run
//! use framegrab::frame::Frame;
//! use framegrab::settings::{self, Settings};
//! use framegrab::source::CaptureSource;
//! use std::sync::Arc;
//!
//! let mut settings = Settings::default();
//! settings::defaults(&mut settings);
//! settings.set_string(settings::DEVICE_ID, "/dev/video0");
//!
//! let sink = Arc::new(|frame: &Frame<'_>| {
//!     println!("{}x{} @ {} ns", frame.width, frame.height, frame.timestamp_ns);
//! });
//!
//! // Capture starts immediately; failures are logged and leave the source idle.
//! let source = CaptureSource::new(&mut settings, sink);
//! println!("capturing: {}", source.is_capturing());
//! ```
//!
//! # Architecture
//!
//! - [`tuple`] packs two small integers into one settings scalar
//! - [`format`] maps V4L2 pixel formats and computes plane layouts
//! - [`v4l2`] is the device seam plus the capability enumerator
//! - [`buffers`] owns the memory-mapped buffer pool
//! - [`capture`] runs the blocking wait/dequeue/deliver/requeue loop
//! - [`source`] is the session controller tying everything together
//!
//! All errors inside a session are logged through the `log` facade; the
//! lifecycle entry points of [`source::CaptureSource`] never fail, they fall
//! back to a non-capturing state instead.

use std::{error, fmt, io};

use crate::fourcc::FourCC;

/// Error type for capture engine operations
#[derive(Debug)]
pub enum Error {
    /// The device node could not be opened (missing, removed or busy)
    DeviceUnavailable { device: String, source: io::Error },

    /// The device rejected a format or frame interval request
    Negotiation {
        request: &'static str,
        source: io::Error,
    },

    /// The device negotiated a pixel format the engine cannot describe
    UnsupportedFormat(FourCC),

    /// The device refused to allocate a buffer pool
    RequestBuffers(io::Error),

    /// The device granted fewer buffers than double buffering needs
    TooFewBuffers { granted: u32 },

    /// A pool buffer could not be queried or mapped
    Mapping { index: u32, source: io::Error },

    /// The capture thread could not be spawned
    Thread(io::Error),

    /// I/O error from a device request
    Io(io::Error),
}

/// Coarse classification of [`Error`] values.
///
/// Only [`ErrorKind::TransientIo`] is retried; everything else aborts the
/// current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Open failure, missing or removed device
    DeviceUnavailable,
    /// Format or rate rejected
    NegotiationFailure,
    /// Too few buffers, mapping failure, thread spawn failure
    ResourceExhaustion,
    /// Interrupted or would-block, safe to retry
    TransientIo,
    /// Any other device I/O failure
    FatalIo,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DeviceUnavailable { .. } => ErrorKind::DeviceUnavailable,
            Error::Negotiation { .. } | Error::UnsupportedFormat(_) => {
                ErrorKind::NegotiationFailure
            }
            Error::RequestBuffers(_)
            | Error::TooFewBuffers { .. }
            | Error::Mapping { .. }
            | Error::Thread(_) => ErrorKind::ResourceExhaustion,
            Error::Io(err) if is_transient(err) => ErrorKind::TransientIo,
            Error::Io(_) => ErrorKind::FatalIo,
        }
    }
}

/// Whether a device I/O error only means "try again".
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::DeviceUnavailable { device, source } => {
                write!(f, "unable to open device {}: {}", device, source)
            }
            Error::Negotiation { request, source } => {
                write!(f, "unable to set {}: {}", request, source)
            }
            Error::UnsupportedFormat(fourcc) => {
                write!(f, "device negotiated unsupported pixel format {}", fourcc)
            }
            Error::RequestBuffers(err) => write!(f, "request for buffers failed: {}", err),
            Error::TooFewBuffers { granted } => {
                write!(f, "device returned {} buffers, at least 2 are required", granted)
            }
            Error::Mapping { index, source } => {
                write!(f, "mapping buffer {} failed: {}", index, source)
            }
            Error::Thread(err) => write!(f, "unable to start capture thread: {}", err),
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::DeviceUnavailable { source, .. } => Some(source),
            Error::Negotiation { source, .. } => Some(source),
            Error::UnsupportedFormat(_) => None,
            Error::RequestBuffers(err) => Some(err),
            Error::TooFewBuffers { .. } => None,
            Error::Mapping { source, .. } => Some(source),
            Error::Thread(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// The tuple module packs two small integers into one settings value.
pub mod tuple;

/// The fourcc module provides portable handling of fourcc codes.
pub mod fourcc;

/// The format module maps device pixel formats and computes plane layouts.
pub mod format;

/// The frame module provides the emitted frame view and the sink interface.
pub mod frame;

/// The settings module provides the scalar settings store and capture configuration.
pub mod settings;

/// The v4l2 module provides device access and capability enumeration.
pub mod v4l2;

/// The buffers module owns the memory-mapped device buffer pool.
pub mod buffers;

/// The capture module runs the background capture loop.
pub mod capture;

/// The properties module builds the selectable option lists for a host UI.
pub mod properties;

/// The source module provides the session controller and host lifecycle.
pub mod source;

/// Get the framegrab crate version string
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Report which path device calls take (libv4l2 or direct syscalls).
///
/// The first call loads libv4l2 if it is available.
pub fn backend() -> framegrab_sys::Backend {
    framegrab_sys::init()
}
