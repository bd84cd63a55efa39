// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers
//
// In-memory single-planar MMAP capture node shared by the integration tests.
// Device requests are tallied in Counters.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use framegrab::frame::{Frame, FrameSink, SessionInfo};
use framegrab::v4l2::{
    BufferInfo, BufferTimestamp, Capability, DequeuedBuffer, DeviceOpener, FormatDescription,
    Fraction, FrameInterval, FrameSize, NegotiatedFormat, Resolution, VideoDevice,
};
use framegrab_sys as ffi;

pub const VIDEO0: &str = "/dev/video0";

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub devices: Vec<String>,
    /// Nodes that fail to open
    pub unopenable: Vec<String>,
    /// Nodes that open but lack video capture
    pub non_capture: Vec<String>,
    pub card: String,
    pub formats: Vec<FormatDescription>,
    pub sizes: Vec<FrameSize>,
    pub intervals: Vec<FrameInterval>,
    pub granted_buffers: u32,
    pub buffer_len: u32,
    pub fail_map_index: Option<u32>,
    pub fail_set_format: bool,
    pub fail_set_interval: bool,
    pub fail_stream_on: bool,
    /// Fail every queue request once streaming
    pub fail_requeue: bool,
    /// Pixel format the device substitutes for any request
    pub substitute_format: Option<u32>,
    /// Frames produced per session; `None` is unlimited
    pub frames: Option<u32>,
    /// Delay before each frame becomes readable
    pub frame_period: Duration,
    /// How long a wait with nothing to deliver blocks; `None` blocks for the
    /// full timeout
    pub idle_wait: Option<Duration>,
}

pub fn format(index: u32, pixelformat: u32, description: &str, flags: u32) -> FormatDescription {
    FormatDescription {
        index,
        pixelformat,
        description: description.to_string(),
        flags,
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        MockConfig {
            devices: vec![VIDEO0.to_string()],
            unopenable: Vec::new(),
            non_capture: Vec::new(),
            card: "Mock Camera".to_string(),
            formats: vec![
                format(0, ffi::V4L2_PIX_FMT_YUYV, "YUYV 4:2:2", 0),
                format(1, ffi::V4L2_PIX_FMT_MJPEG, "Motion-JPEG", ffi::V4L2_FMT_FLAG_COMPRESSED),
                format(2, ffi::V4L2_PIX_FMT_NV12, "Y/CbCr 4:2:0", 0),
                format(3, ffi::V4L2_PIX_FMT_YUV420, "Planar YUV 4:2:0", ffi::V4L2_FMT_FLAG_EMULATED),
            ],
            sizes: vec![
                FrameSize::Discrete(Resolution::new(640, 480)),
                FrameSize::Discrete(Resolution::new(1280, 720)),
            ],
            intervals: vec![
                FrameInterval::Discrete(Fraction::new(1, 30)),
                FrameInterval::Discrete(Fraction::new(1, 15)),
            ],
            granted_buffers: 4,
            buffer_len: 640 * 480 * 2,
            fail_map_index: None,
            fail_set_format: false,
            fail_set_interval: false,
            fail_stream_on: false,
            fail_requeue: false,
            substitute_format: None,
            frames: None,
            frame_period: Duration::from_millis(2),
            idle_wait: Some(Duration::from_millis(10)),
        }
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub set_format: AtomicUsize,
    pub set_interval: AtomicUsize,
    pub request_buffers: AtomicUsize,
    /// Mappings currently alive
    pub live_maps: AtomicUsize,
    /// Mappings ever created
    pub maps: AtomicUsize,
    pub unmaps: AtomicUsize,
    /// Successful queue requests
    pub queues: AtomicUsize,
    pub stream_on: AtomicUsize,
    pub stream_off: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Devices currently open.
    pub fn open_devices(&self) -> usize {
        Self::get(&self.opens) - Self::get(&self.closes)
    }
}

struct MockShared {
    config: Mutex<MockConfig>,
    counters: Counters,
}

#[derive(Clone)]
pub struct MockOpener {
    shared: Arc<MockShared>,
}

impl MockOpener {
    pub fn new(config: MockConfig) -> Self {
        MockOpener {
            shared: Arc::new(MockShared {
                config: Mutex::new(config),
                counters: Counters::default(),
            }),
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.shared.counters
    }

    pub fn count(&self, counter: impl Fn(&Counters) -> &AtomicUsize) -> usize {
        Counters::get(counter(&self.shared.counters))
    }

    /// Change the device behaviour for subsequent requests.
    pub fn configure(&self, f: impl FnOnce(&mut MockConfig)) {
        f(&mut self.shared.config.lock().unwrap());
    }

    fn config(&self) -> MockConfig {
        self.shared.config.lock().unwrap().clone()
    }
}

impl Default for MockOpener {
    fn default() -> Self {
        MockOpener::new(MockConfig::default())
    }
}

impl DeviceOpener for MockOpener {
    type Device = MockDevice;

    fn open(&self, path: &str) -> io::Result<MockDevice> {
        let config = self.config();
        if !config.devices.iter().any(|d| d == path) {
            return Err(io::Error::from_raw_os_error(libc::ENOENT));
        }
        if config.unopenable.iter().any(|d| d == path) {
            return Err(io::Error::from_raw_os_error(libc::EBUSY));
        }
        self.shared.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(MockDevice {
            shared: self.shared.clone(),
            path: path.to_string(),
            state: Mutex::new(DeviceState::default()),
        })
    }

    fn candidates(&self) -> io::Result<Vec<String>> {
        Ok(self.config().devices)
    }
}

#[derive(Default)]
struct DeviceState {
    mappings: HashMap<u32, Box<[u8]>>,
    queue: VecDeque<u32>,
    streaming: bool,
    produced: u32,
    sequence: u32,
}

pub struct MockDevice {
    shared: Arc<MockShared>,
    path: String,
    state: Mutex<DeviceState>,
}

impl MockDevice {
    fn config(&self) -> MockConfig {
        self.shared.config.lock().unwrap().clone()
    }

    fn counters(&self) -> &Counters {
        &self.shared.counters
    }
}

fn einval() -> io::Error {
    io::Error::from_raw_os_error(libc::EINVAL)
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.counters().closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl VideoDevice for MockDevice {
    fn capability(&self) -> io::Result<Capability> {
        let config = self.config();
        let capabilities = if config.non_capture.contains(&self.path) {
            ffi::V4L2_CAP_VIDEO_CAPTURE_MPLANE
        } else {
            ffi::V4L2_CAP_VIDEO_CAPTURE | ffi::V4L2_CAP_STREAMING
        };
        Ok(Capability {
            driver: "mock".to_string(),
            card: format!("{} ({})", config.card, self.path),
            bus_info: "platform:mock".to_string(),
            capabilities,
            device_caps: capabilities,
        })
    }

    fn enum_format(&self, index: u32) -> io::Result<Option<FormatDescription>> {
        Ok(self.config().formats.get(index as usize).cloned())
    }

    fn enum_frame_size(&self, _pixelformat: u32, index: u32) -> io::Result<Option<FrameSize>> {
        Ok(self.config().sizes.get(index as usize).copied())
    }

    fn enum_frame_interval(
        &self,
        _pixelformat: u32,
        _width: u32,
        _height: u32,
        index: u32,
    ) -> io::Result<Option<FrameInterval>> {
        Ok(self.config().intervals.get(index as usize).copied())
    }

    fn set_format(
        &self,
        width: u32,
        height: u32,
        pixelformat: u32,
    ) -> io::Result<NegotiatedFormat> {
        self.counters().set_format.fetch_add(1, Ordering::SeqCst);
        let config = self.config();
        if config.fail_set_format {
            return Err(einval());
        }
        let pixelformat = config.substitute_format.unwrap_or(pixelformat);
        let stride = match pixelformat {
            ffi::V4L2_PIX_FMT_YUYV | ffi::V4L2_PIX_FMT_YVYU | ffi::V4L2_PIX_FMT_UYVY => width * 2,
            _ => width,
        };
        Ok(NegotiatedFormat {
            width,
            height,
            pixelformat,
            stride,
            size_image: stride * height,
        })
    }

    fn set_frame_interval(&self, interval: Fraction) -> io::Result<Fraction> {
        self.counters().set_interval.fetch_add(1, Ordering::SeqCst);
        if self.config().fail_set_interval {
            return Err(einval());
        }
        Ok(interval)
    }

    fn request_buffers(&self, count: u32) -> io::Result<u32> {
        self.counters().request_buffers.fetch_add(1, Ordering::SeqCst);
        Ok(count.min(self.config().granted_buffers))
    }

    fn query_buffer(&self, index: u32) -> io::Result<BufferInfo> {
        let config = self.config();
        if index >= config.granted_buffers {
            return Err(einval());
        }
        Ok(BufferInfo {
            index,
            length: config.buffer_len,
            offset: index * 0x1000,
        })
    }

    fn map_buffer(&self, info: &BufferInfo) -> io::Result<NonNull<u8>> {
        if self.config().fail_map_index == Some(info.index) {
            return Err(io::Error::from_raw_os_error(libc::ENOMEM));
        }
        let mut memory = vec![0u8; info.length as usize].into_boxed_slice();
        let ptr = NonNull::new(memory.as_mut_ptr()).ok_or_else(einval)?;
        self.state.lock().unwrap().mappings.insert(info.index, memory);
        self.counters().maps.fetch_add(1, Ordering::SeqCst);
        self.counters().live_maps.fetch_add(1, Ordering::SeqCst);
        Ok(ptr)
    }

    unsafe fn unmap_buffer(&self, ptr: NonNull<u8>, _length: usize) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .mappings
            .iter()
            .find(|(_, memory)| memory.as_ptr() == ptr.as_ptr() as *const u8)
            .map(|(index, _)| *index)
            .ok_or_else(einval)?;
        state.mappings.remove(&index);
        self.counters().unmaps.fetch_add(1, Ordering::SeqCst);
        self.counters().live_maps.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn queue_buffer(&self, index: u32) -> io::Result<()> {
        let config = self.config();
        let mut state = self.state.lock().unwrap();
        if index >= config.granted_buffers {
            return Err(einval());
        }
        if state.streaming && config.fail_requeue {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }
        state.queue.push_back(index);
        self.counters().queues.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn dequeue_buffer(&self) -> io::Result<DequeuedBuffer> {
        let mut state = self.state.lock().unwrap();
        if !state.streaming {
            return Err(einval());
        }
        let index = state
            .queue
            .pop_front()
            .ok_or_else(|| io::Error::from(io::ErrorKind::WouldBlock))?;
        let sequence = state.sequence;
        state.sequence += 1;
        state.produced += 1;
        if let Some(memory) = state.mappings.get_mut(&index) {
            if let Some(first) = memory.first_mut() {
                *first = sequence as u8;
            }
        }
        Ok(DequeuedBuffer {
            index,
            bytes_used: self.config().buffer_len,
            sequence,
            timestamp: BufferTimestamp {
                sec: 100 + i64::from(sequence),
                usec: 500,
            },
        })
    }

    fn stream_on(&self) -> io::Result<()> {
        self.counters().stream_on.fetch_add(1, Ordering::SeqCst);
        if self.config().fail_stream_on {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }
        self.state.lock().unwrap().streaming = true;
        Ok(())
    }

    fn stream_off(&self) -> io::Result<()> {
        self.counters().stream_off.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.streaming = false;
        state.queue.clear();
        Ok(())
    }

    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let config = self.config();
        let ready = {
            let state = self.state.lock().unwrap();
            state.streaming
                && !state.queue.is_empty()
                && config.frames.map_or(true, |limit| state.produced < limit)
        };
        if ready {
            thread::sleep(config.frame_period);
            Ok(true)
        } else {
            thread::sleep(config.idle_wait.unwrap_or(timeout).min(timeout));
            Ok(false)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFrame {
    pub sequence: u32,
    pub timestamp_ns: u64,
    pub first_byte: u8,
    pub planes: usize,
    pub width: u32,
    pub height: u32,
}

/// Sink that records what it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub frames: Mutex<Vec<RecordedFrame>>,
    pub started: Mutex<Vec<SessionInfo>>,
    pub stopped: Mutex<Vec<u64>>,
}

impl RecordingSink {
    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn sequences(&self) -> Vec<u32> {
        self.frames.lock().unwrap().iter().map(|f| f.sequence).collect()
    }
}

impl FrameSink for RecordingSink {
    fn deliver_frame(&self, frame: &Frame<'_>) {
        let first_byte = frame
            .plane(0)
            .and_then(|p| p.data.first().copied())
            .unwrap_or_default();
        self.frames.lock().unwrap().push(RecordedFrame {
            sequence: frame.sequence,
            timestamp_ns: frame.timestamp_ns,
            first_byte,
            planes: frame.plane_count(),
            width: frame.width,
            height: frame.height,
        });
    }

    fn session_started(&self, info: &SessionInfo) {
        self.started.lock().unwrap().push(info.clone());
    }

    fn session_stopped(&self, frames: u64) {
        self.stopped.lock().unwrap().push(frames);
    }
}

/// Poll `condition` until it holds or `timeout` expires.
pub fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
