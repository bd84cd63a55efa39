// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! Session controller.
//!
//! A [`CaptureSource`] turns a [`Settings`] store into a running capture
//! session: open the device, negotiate format and frame rate, map the buffer
//! pool, spawn the capture thread. Teardown runs the same steps in reverse:
//! stop and join the thread, unmap, close.
//!
//! Lifecycle calls never fail. Any error is logged, everything acquired so far
//! is released, and the source stays in a non-capturing state until the next
//! configuration change.

use std::sync::Arc;

use crate::buffers::BufferPool;
use crate::capture::{CaptureState, CaptureThread};
use crate::frame::{FrameSink, FrameTemplate, SessionInfo};
use crate::settings::{CaptureConfig, Settings, DEVICE_ID};
use crate::v4l2::{
    DeviceEnumerator, DeviceOpener, Fraction, NegotiatedFormat, SystemOpener, VideoDevice,
};
use crate::Error;

/// An open device shared with the capture thread, or nothing.
#[derive(Debug)]
pub enum DeviceHandle<D> {
    Closed,
    Open(Arc<D>),
}

impl<D> Default for DeviceHandle<D> {
    fn default() -> Self {
        DeviceHandle::Closed
    }
}

impl<D> DeviceHandle<D> {
    pub fn is_open(&self) -> bool {
        matches!(self, DeviceHandle::Open(_))
    }

    pub fn get(&self) -> Option<&Arc<D>> {
        match self {
            DeviceHandle::Open(device) => Some(device),
            DeviceHandle::Closed => None,
        }
    }

    /// Release this handle. Returns `false` if it was already closed.
    ///
    /// The descriptor itself is closed once the last clone of the device is
    /// dropped.
    pub fn close(&mut self) -> bool {
        !matches!(std::mem::take(self), DeviceHandle::Closed)
    }
}

struct Session<D: VideoDevice> {
    device: DeviceHandle<D>,
    format: Option<NegotiatedFormat>,
    interval: Option<Fraction>,
    pool: Option<Arc<BufferPool<D>>>,
    thread: Option<CaptureThread>,
}

impl<D: VideoDevice> Default for Session<D> {
    fn default() -> Self {
        Session {
            device: DeviceHandle::Closed,
            format: None,
            interval: None,
            pool: None,
            thread: None,
        }
    }
}

/// A video capture source driven by settings updates.
///
/// # Example
///
/// ```no_run
/// use framegrab::frame::Frame;
/// use framegrab::settings::{self, Settings};
/// use framegrab::source::CaptureSource;
/// use framegrab::tuple::pack;
/// use std::sync::Arc;
///
/// let mut settings = Settings::default();
/// settings::defaults(&mut settings);
///
/// // A blank device_id selects the first capture device found.
/// let mut source = CaptureSource::new(&mut settings, Arc::new(|_: &Frame<'_>| {}));
///
/// // Changing any field rebuilds the whole session.
/// settings.set_int(settings::RESOLUTION, i64::from(pack(1280, 720)));
/// source.update(&mut settings);
/// ```
pub struct CaptureSource<O: DeviceOpener = SystemOpener> {
    opener: O,
    sink: Arc<dyn FrameSink>,
    config: Option<CaptureConfig>,
    session: Session<O::Device>,
}

impl CaptureSource<SystemOpener> {
    /// Create a source on the system's V4L2 devices and apply `settings`.
    pub fn new(settings: &mut Settings, sink: Arc<dyn FrameSink>) -> Self {
        Self::with_opener(SystemOpener::default(), settings, sink)
    }
}

impl<O: DeviceOpener> CaptureSource<O> {
    /// Create a source that opens devices through `opener` and apply
    /// `settings`.
    pub fn with_opener(opener: O, settings: &mut Settings, sink: Arc<dyn FrameSink>) -> Self {
        let mut source = CaptureSource {
            opener,
            sink,
            config: None,
            session: Session::default(),
        };
        source.update(settings);
        source
    }

    /// Apply a configuration update.
    ///
    /// A blank `device_id` is replaced by the first capture device found and
    /// written back to `settings`. If any of device, pixel format, resolution
    /// or frame rate differs from the active configuration the session is
    /// stopped and started again; otherwise nothing happens.
    pub fn update(&mut self, settings: &mut Settings) {
        if settings.get_string(DEVICE_ID).is_empty() {
            DeviceEnumerator::devices(&self.opener, Some(settings));
        }

        let config = CaptureConfig::from_settings(settings);
        if let Some(current) = &self.config {
            let changed = current.changed_fields(&config);
            if changed.is_empty() {
                log::debug!("configuration unchanged");
                return;
            }
            log::debug!("configuration changed: {}", changed.join(", "));
        }

        self.terminate();
        self.config = Some(config.clone());

        if config.device_id.is_empty() {
            log::warn!("No video capture device available");
            return;
        }
        if let Err(err) = self.init_session(&config) {
            log::error!("Initialization failed: {}", err);
            self.terminate();
        }
    }

    fn init_session(&mut self, config: &CaptureConfig) -> Result<(), Error> {
        log::info!("Start capture from {}", config.device_id);
        let device = self
            .opener
            .open(&config.device_id)
            .map(Arc::new)
            .map_err(|source| Error::DeviceUnavailable {
                device: config.device_id.clone(),
                source,
            })?;
        self.session.device = DeviceHandle::Open(device.clone());

        let (width, height) = config.resolution();
        let format = device
            .set_format(width, height, config.pixelformat)
            .map_err(|source| Error::Negotiation {
                request: "format",
                source,
            })?;
        self.session.format = Some(format);
        log::info!("Resolution: {}x{}", format.width, format.height);
        log::info!("Linesize: {} Bytes", format.stride);
        let template = FrameTemplate::new(&format)?;

        let interval = device
            .set_frame_interval(config.interval())
            .map_err(|source| Error::Negotiation {
                request: "framerate",
                source,
            })?;
        self.session.interval = Some(interval);
        log::info!("Framerate: {:.2} fps", interval.fps());

        let pool = Arc::new(BufferPool::map(device.clone())?);
        self.session.pool = Some(pool.clone());

        let info = SessionInfo {
            device: config.device_id.clone(),
            format,
            video_format: template.format(),
            interval,
            buffers: pool.len(),
        };
        let thread = CaptureThread::spawn(device, pool, template, self.sink.clone(), info)?;
        self.session.thread = Some(thread);
        Ok(())
    }

    /// Tear the current session down.
    ///
    /// Joins the capture thread before unmapping the pool, and unmaps before
    /// closing the device. Safe to call at any time, any number of times.
    pub fn terminate(&mut self) {
        if let Some(mut thread) = self.session.thread.take() {
            thread.stop();
        }

        if let Some(pool) = self.session.pool.take() {
            match Arc::try_unwrap(pool) {
                Ok(mut pool) => pool.unmap(),
                // unmapped when the last reference drops
                Err(_) => log::warn!("buffer pool still referenced after capture stopped"),
            }
        }

        self.session.format = None;
        self.session.interval = None;
        if self.session.device.close() {
            log::debug!("capture session closed");
        }
    }

    /// Whether a capture thread is starting or streaming.
    pub fn is_capturing(&self) -> bool {
        matches!(
            self.state(),
            Some(CaptureState::NotStarted | CaptureState::Streaming)
        )
    }

    /// State of the capture thread, if one exists.
    pub fn state(&self) -> Option<CaptureState> {
        self.session.thread.as_ref().map(|t| t.state())
    }

    /// Frames delivered by the current session.
    pub fn frames(&self) -> u64 {
        self.session.thread.as_ref().map_or(0, |t| t.frames())
    }

    /// Format the device agreed to for the current session.
    pub fn negotiated_format(&self) -> Option<NegotiatedFormat> {
        self.session.format
    }

    /// Frame interval the device agreed to for the current session.
    pub fn frame_interval(&self) -> Option<Fraction> {
        self.session.interval
    }

    /// The configuration last applied, whether or not it started.
    pub fn config(&self) -> Option<&CaptureConfig> {
        self.config.as_ref()
    }

    pub fn is_device_open(&self) -> bool {
        self.session.device.is_open()
    }
}

impl<O: DeviceOpener> Drop for CaptureSource<O> {
    fn drop(&mut self) {
        self.terminate();
    }
}
