// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers
//
// Capture loop behaviour against the in-memory device.
//
// The stop latency test measures wall-clock time and runs serially so other
// tests do not skew it.
//
// RUN:
//   cargo test --test capture_thread

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{MockConfig, MockDevice, MockOpener, RecordingSink, VIDEO0};
use framegrab::buffers::BufferPool;
use framegrab::capture::{CaptureState, CaptureThread, WAIT_TIMEOUT};
use framegrab::frame::{Frame, FrameSink, FrameTemplate, SessionInfo};
use framegrab::v4l2::{DeviceOpener, Fraction, VideoDevice};
use serial_test::serial;

struct Harness {
    opener: MockOpener,
    sink: Arc<RecordingSink>,
    thread: CaptureThread,
}

fn spawn(config: MockConfig) -> Harness {
    let sink = Arc::new(RecordingSink::default());
    let (opener, thread) = spawn_with_sink(config, sink.clone());
    Harness {
        opener,
        sink,
        thread,
    }
}

fn spawn_with_sink(config: MockConfig, sink: Arc<dyn FrameSink>) -> (MockOpener, CaptureThread) {
    common::init_logging();
    let opener = MockOpener::new(config);
    let device: Arc<MockDevice> = Arc::new(opener.open(VIDEO0).unwrap());
    let format = device
        .set_format(640, 480, framegrab_sys::V4L2_PIX_FMT_YUYV)
        .unwrap();
    let template = FrameTemplate::new(&format).unwrap();
    let pool = Arc::new(BufferPool::map(device.clone()).unwrap());
    let info = SessionInfo {
        device: VIDEO0.to_string(),
        format,
        video_format: template.format(),
        interval: Fraction::new(1, 30),
        buffers: pool.len(),
    };
    let thread = CaptureThread::spawn(device, pool, template, sink, info).unwrap();
    (opener, thread)
}

#[test]
fn test_frames_delivered_in_dequeue_order() {
    let mut h = spawn(MockConfig {
        frames: Some(10),
        ..Default::default()
    });

    assert!(common::wait_for(Duration::from_secs(5), || h.sink.frame_count() == 10));
    let frames = h.thread.stop();
    assert_eq!(frames, 10);

    assert_eq!(h.sink.sequences(), (0..10).collect::<Vec<_>>());
    let recorded = h.sink.frames.lock().unwrap().clone();
    for frame in &recorded {
        assert_eq!(frame.first_byte, frame.sequence as u8);
        assert_eq!(frame.timestamp_ns, (100 + u64::from(frame.sequence)) * 1_000_000_000 + 500_000);
        assert_eq!(frame.planes, 1);
        assert_eq!((frame.width, frame.height), (640, 480));
    }
    assert!(recorded.windows(2).all(|w| w[0].timestamp_ns < w[1].timestamp_ns));
}

#[test]
fn test_session_callbacks() {
    let mut h = spawn(MockConfig {
        frames: Some(3),
        ..Default::default()
    });
    assert!(common::wait_for(Duration::from_secs(5), || h.sink.frame_count() == 3));
    h.thread.stop();

    let started = h.sink.started.lock().unwrap().clone();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].buffers, 4);
    assert_eq!(*h.sink.stopped.lock().unwrap(), [3]);
}

#[test]
#[serial]
fn test_stop_while_blocked_in_wait() {
    let mut h = spawn(MockConfig {
        frames: Some(0),
        idle_wait: None,
        ..Default::default()
    });
    assert!(common::wait_for(Duration::from_secs(1), || {
        h.thread.state() == CaptureState::Streaming
    }));
    thread::sleep(Duration::from_millis(100));

    let start = Instant::now();
    let frames = h.thread.stop();
    let elapsed = start.elapsed();

    assert_eq!(frames, 0);
    assert!(
        elapsed < WAIT_TIMEOUT + Duration::from_millis(500),
        "stop took {:?}",
        elapsed
    );
    assert_eq!(h.thread.state(), CaptureState::Stopped);
    assert_eq!(h.opener.count(|c| &c.stream_off), 1);
}

#[test]
fn test_stream_on_failure_delivers_nothing() {
    let mut h = spawn(MockConfig {
        fail_stream_on: true,
        ..Default::default()
    });

    assert!(common::wait_for(Duration::from_secs(2), || h.thread.is_finished()));
    assert_eq!(h.thread.state(), CaptureState::Stopped);
    assert_eq!(h.thread.stop(), 0);
    assert_eq!(h.sink.frame_count(), 0);
    assert!(h.sink.started.lock().unwrap().is_empty());
    assert_eq!(h.opener.count(|c| &c.stream_off), 1);
}

#[test]
fn test_requeue_failure_ends_loop() {
    let mut h = spawn(MockConfig {
        fail_requeue: true,
        ..Default::default()
    });

    assert!(common::wait_for(Duration::from_secs(2), || h.thread.is_finished()));
    // the frame is delivered before the failed requeue
    assert_eq!(h.thread.stop(), 1);
    assert_eq!(h.sink.frame_count(), 1);
    assert_eq!(h.opener.count(|c| &c.stream_off), 1);
}

#[test]
fn test_panicking_sink_still_tears_down() {
    let sink = |_: &Frame<'_>| panic!("sink failure");
    let (opener, mut thread) = spawn_with_sink(MockConfig::default(), Arc::new(sink));

    assert!(common::wait_for(Duration::from_secs(2), || thread.is_finished()));
    assert_eq!(thread.stop(), 0);
    assert_eq!(thread.state(), CaptureState::Stopped);
    assert_eq!(opener.count(|c| &c.stream_off), 1);
    // four initial queues plus the requeue of the failed frame
    assert_eq!(opener.count(|c| &c.queues), 5);
}

#[test]
fn test_stop_twice() {
    let mut h = spawn(MockConfig::default());
    assert!(common::wait_for(Duration::from_secs(2), || h.sink.frame_count() > 0));

    let first = h.thread.stop();
    let second = h.thread.stop();
    assert_eq!(first, second);
    assert_eq!(h.opener.count(|c| &c.stream_off), 1);

    // nothing is delivered once stopped
    let delivered = h.sink.frame_count();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(h.sink.frame_count(), delivered);
    assert_eq!(delivered as u64, first);
}

#[test]
fn test_drop_joins_thread() {
    let h = spawn(MockConfig::default());
    let opener = h.opener.clone();
    drop(h);

    assert_eq!(opener.count(|c| &c.stream_off), 1);
    assert_eq!(opener.count(|c| &c.live_maps), 0);
    assert_eq!(opener.counters().open_devices(), 0);
}
