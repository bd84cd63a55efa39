// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! Background capture loop.
//!
//! One [`CaptureThread`] per session queues every pool buffer, turns the
//! stream on and then loops: wait for a filled buffer, dequeue it, deliver a
//! frame view to the sink, queue the buffer again. The loop checks its
//! [`StopSignal`] once per iteration and the wait is bounded by
//! [`WAIT_TIMEOUT`], so a stop request is honoured within about one timeout.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::buffers::BufferPool;
use crate::frame::{FrameSink, FrameTemplate, SessionInfo};
use crate::v4l2::VideoDevice;
use crate::{is_transient, Error};

/// Longest single wait for a filled buffer.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Stop flag shared between the control context and the capture thread.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Streaming state of a capture thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CaptureState {
    /// Spawned, buffers not yet queued
    NotStarted = 0,
    /// Stream on, frames flowing
    Streaming = 1,
    /// Loop exited, stream being turned off
    Stopping = 2,
    /// Thread finished
    Stopped = 3,
}

impl CaptureState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CaptureState::NotStarted,
            1 => CaptureState::Streaming,
            2 => CaptureState::Stopping,
            _ => CaptureState::Stopped,
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    frames: AtomicU64,
}

impl Shared {
    fn set_state(&self, state: CaptureState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

struct CaptureLoop<D: VideoDevice> {
    device: Arc<D>,
    pool: Arc<BufferPool<D>>,
    template: FrameTemplate,
    sink: Arc<dyn FrameSink>,
    info: SessionInfo,
    stop: StopSignal,
    shared: Arc<Shared>,
}

impl<D: VideoDevice> CaptureLoop<D> {
    fn run(self) -> u64 {
        match self.start() {
            Ok(()) => {
                self.shared.set_state(CaptureState::Streaming);
                log::debug!("new capture started");
                if self.notify("session_started", || self.sink.session_started(&self.info)) {
                    self.stream();
                }
            }
            Err(err) => log::error!("failed to start capture: {}", err),
        }

        self.shared.set_state(CaptureState::Stopping);
        if let Err(err) = self.device.stream_off() {
            log::error!("unable to stop stream: {}", err);
        }

        let frames = self.shared.frames.load(Ordering::SeqCst);
        self.notify("session_stopped", || self.sink.session_stopped(frames));
        self.shared.set_state(CaptureState::Stopped);
        log::info!("Stopped capture after {} frames", frames);
        frames
    }

    /// Call into the sink. A panic is logged and reported as `false` so the
    /// stream is still torn down.
    fn notify(&self, callback: &str, f: impl FnOnce()) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(()) => true,
            Err(_) => {
                log::error!("frame sink panicked in {}", callback);
                false
            }
        }
    }

    fn start(&self) -> io::Result<()> {
        for index in 0..self.pool.len() as u32 {
            self.device.queue_buffer(index).map_err(|err| {
                io::Error::new(err.kind(), format!("unable to queue buffer {}: {}", index, err))
            })?;
        }
        self.device.stream_on()
    }

    fn stream(&self) {
        while !self.stop.is_set() {
            match self.device.wait_readable(WAIT_TIMEOUT) {
                Ok(true) => {}
                Ok(false) => {
                    log::debug!("select timeout");
                    continue;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    log::error!("select failed: {}", err);
                    break;
                }
            }

            let buffer = match self.device.dequeue_buffer() {
                Ok(buffer) => buffer,
                Err(err) if is_transient(&err) => continue,
                Err(err) => {
                    log::error!("failed to dequeue buffer: {}", err);
                    break;
                }
            };

            let mut sink_failed = false;
            match self.pool.get(buffer.index as usize) {
                Some(data) => {
                    let frame = self.template.view(data, &buffer);
                    if self.notify("deliver_frame", || self.sink.deliver_frame(&frame)) {
                        self.shared.frames.fetch_add(1, Ordering::SeqCst);
                    } else {
                        sink_failed = true;
                    }
                }
                None => log::warn!("device returned unknown buffer {}", buffer.index),
            }

            if let Err(err) = self.device.queue_buffer(buffer.index) {
                log::error!("failed to enqueue buffer: {}", err);
                break;
            }
            if sink_failed {
                break;
            }
        }
    }
}

/// Handle to a running capture loop.
///
/// Dropping the handle stops and joins the thread.
pub struct CaptureThread {
    handle: Option<JoinHandle<u64>>,
    stop: StopSignal,
    shared: Arc<Shared>,
}

impl CaptureThread {
    /// Start the capture loop on a new thread named `v4l2-capture`.
    ///
    /// `info` is passed to [`FrameSink::session_started`] once streaming is on.
    pub fn spawn<D: VideoDevice + 'static>(
        device: Arc<D>,
        pool: Arc<BufferPool<D>>,
        template: FrameTemplate,
        sink: Arc<dyn FrameSink>,
        info: SessionInfo,
    ) -> Result<Self, Error> {
        let stop = StopSignal::new();
        let shared = Arc::new(Shared {
            state: AtomicU8::new(CaptureState::NotStarted as u8),
            frames: AtomicU64::new(0),
        });

        let worker = CaptureLoop {
            device,
            pool,
            template,
            sink,
            info,
            stop: stop.clone(),
            shared: shared.clone(),
        };
        let handle = thread::Builder::new()
            .name("v4l2-capture".into())
            .spawn(move || worker.run())
            .map_err(Error::Thread)?;

        Ok(CaptureThread {
            handle: Some(handle),
            stop,
            shared,
        })
    }

    pub fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    /// Frames delivered so far.
    pub fn frames(&self) -> u64 {
        self.shared.frames.load(Ordering::SeqCst)
    }

    /// Whether the loop has exited on its own or after a stop.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Signal the loop to stop and wait for the thread to exit.
    ///
    /// Returns the number of frames delivered. Calling this again returns the
    /// same count without blocking.
    pub fn stop(&mut self) -> u64 {
        self.stop.signal();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("capture thread panicked");
            }
        }
        self.frames()
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.stop();
    }
}
