// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers
//
// Capability enumeration and property lists.
//
// TESTING LAYERS:
//
// Layer 1 (No hardware required):
//   - Option lists built from the in-memory device
//   - Fallback tables for ranged sizes and intervals
//   - Property cascade
//
// Layer 3 (Hardware Integration - Requires V4L2 devices):
//   - Enumeration of the real /sys/class/video4linux devices
//
// RUN LAYER 1:
//   cargo test --test enumeration
//
// RUN LAYER 3 (on hardware):
//   cargo test --test enumeration -- --ignored --nocapture

mod common;

use common::{format, MockConfig, MockOpener, VIDEO0};
use framegrab::properties::Properties;
use framegrab::settings::{self, Settings};
use framegrab::tuple::{pack, unpack};
use framegrab::v4l2::{
    DeviceEnumerator, Fraction, FrameInterval, FrameSize, Resolution, StepwiseInterval,
    StepwiseSize, SystemOpener, FALLBACK_FRAMERATES, FALLBACK_RESOLUTIONS,
};
use framegrab_sys as ffi;

// =============================================================================
// Layer 1: In-memory device
// =============================================================================

#[test]
fn test_device_list_skips_unusable_nodes() {
    common::init_logging();
    let opener = MockOpener::new(MockConfig {
        devices: vec![
            "/dev/video0".into(),
            "/dev/video1".into(),
            "/dev/video2".into(),
        ],
        unopenable: vec!["/dev/video0".into()],
        non_capture: vec!["/dev/video1".into()],
        ..Default::default()
    });

    let devices = DeviceEnumerator::devices(&opener, None);
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].value, "/dev/video2");
    assert_eq!(devices[0].label, "Mock Camera (/dev/video2)");
    // every device opened for the query was closed again
    assert_eq!(opener.counters().open_devices(), 0);
}

#[test]
fn test_device_list_selects_default() {
    let opener = MockOpener::new(MockConfig {
        devices: vec!["/dev/video3".into(), "/dev/video4".into()],
        ..Default::default()
    });

    let mut settings = Settings::default();
    DeviceEnumerator::devices(&opener, Some(&mut settings));
    assert_eq!(settings.get_string(settings::DEVICE_ID), "/dev/video3");

    settings.set_string(settings::DEVICE_ID, "/dev/video4");
    DeviceEnumerator::devices(&opener, Some(&mut settings));
    assert_eq!(settings.get_string(settings::DEVICE_ID), "/dev/video4");
}

#[test]
fn test_format_list() {
    let opener = MockOpener::default();
    let formats =
        DeviceEnumerator::with_device(&opener, VIDEO0, |dev| DeviceEnumerator::formats(dev))
            .unwrap();

    let labels: Vec<_> = formats.iter().map(|f| f.label.as_str()).collect();
    assert_eq!(
        labels,
        ["YUYV 4:2:2", "Y/CbCr 4:2:0", "Planar YUV 4:2:0 (Emulated)"]
    );
    assert_eq!(formats[0].value, ffi::V4L2_PIX_FMT_YUYV);
    // Motion-JPEG has no frame layout and is left out
    assert!(formats.iter().all(|f| f.value != ffi::V4L2_PIX_FMT_MJPEG));
    assert_eq!(opener.counters().open_devices(), 0);
}

#[test]
fn test_format_list_empty_device() {
    let opener = MockOpener::new(MockConfig {
        formats: vec![format(0, ffi::V4L2_PIX_FMT_MJPEG, "Motion-JPEG", 0)],
        ..Default::default()
    });
    let formats =
        DeviceEnumerator::with_device(&opener, VIDEO0, |dev| DeviceEnumerator::formats(dev))
            .unwrap();
    assert!(formats.is_empty());
}

#[test]
fn test_discrete_resolutions() {
    let opener = MockOpener::default();
    let sizes = DeviceEnumerator::with_device(&opener, VIDEO0, |dev| {
        DeviceEnumerator::resolutions(dev, ffi::V4L2_PIX_FMT_YUYV)
    })
    .unwrap();

    assert_eq!(sizes.len(), 2);
    assert_eq!(sizes[0].label, "640x480");
    assert_eq!(sizes[1].value, pack(1280, 720));
}

#[test]
fn test_stepwise_resolutions_fall_back() {
    let range = StepwiseSize {
        min: Resolution::new(16, 16),
        max: Resolution::new(4096, 2160),
        step: Resolution::new(16, 16),
    };
    for size in [FrameSize::Stepwise(range), FrameSize::Continuous(range)] {
        let opener = MockOpener::new(MockConfig {
            sizes: vec![size],
            ..Default::default()
        });
        let sizes = DeviceEnumerator::with_device(&opener, VIDEO0, |dev| {
            DeviceEnumerator::resolutions(dev, ffi::V4L2_PIX_FMT_YUYV)
        })
        .unwrap();

        assert_eq!(sizes.len(), 25);
        assert_eq!(sizes.len(), FALLBACK_RESOLUTIONS.len());
        assert_eq!(sizes[0].label, "160x120");
        assert_eq!(unpack(sizes[14].value), (1920, 1080));
        assert_eq!(sizes[24].label, "1024x576");
    }
}

#[test]
fn test_no_sizes_falls_back() {
    let opener = MockOpener::new(MockConfig {
        sizes: Vec::new(),
        ..Default::default()
    });
    let sizes = DeviceEnumerator::with_device(&opener, VIDEO0, |dev| {
        DeviceEnumerator::resolutions(dev, ffi::V4L2_PIX_FMT_YUYV)
    })
    .unwrap();
    assert_eq!(sizes.len(), FALLBACK_RESOLUTIONS.len());
}

#[test]
fn test_discrete_framerates() {
    let opener = MockOpener::new(MockConfig {
        intervals: vec![
            FrameInterval::Discrete(Fraction::new(1, 30)),
            FrameInterval::Discrete(Fraction::new(1001, 30000)),
        ],
        ..Default::default()
    });
    let rates = DeviceEnumerator::with_device(&opener, VIDEO0, |dev| {
        DeviceEnumerator::framerates(dev, ffi::V4L2_PIX_FMT_YUYV, 640, 480)
    })
    .unwrap();

    assert_eq!(rates.len(), 2);
    assert_eq!(rates[0].label, "30.00");
    assert_eq!(rates[1].label, "29.97");
    // the exact fraction survives, not the rounded label
    assert_eq!(unpack(rates[1].value), (1001, 30000));
}

#[test]
fn test_continuous_framerates_fall_back() {
    let opener = MockOpener::new(MockConfig {
        intervals: vec![FrameInterval::Continuous(StepwiseInterval {
            min: Fraction::new(1, 120),
            max: Fraction::new(1, 1),
            step: Fraction::new(1, 120),
        })],
        ..Default::default()
    });
    let rates = DeviceEnumerator::with_device(&opener, VIDEO0, |dev| {
        DeviceEnumerator::framerates(dev, ffi::V4L2_PIX_FMT_YUYV, 640, 480)
    })
    .unwrap();

    let labels: Vec<_> = rates.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(
        labels,
        ["60.00", "50.00", "30.00", "25.00", "20.00", "15.00", "10.00", "5.00"]
    );
    assert_eq!(rates.len(), FALLBACK_FRAMERATES.len());
    assert_eq!(rates[2].value, pack(1, 30));
}

#[test]
fn test_with_device_missing_node() {
    let opener = MockOpener::default();
    let result = DeviceEnumerator::with_device(&opener, "/dev/video7", |_| ());
    assert!(result.is_err());
}

#[test]
fn test_property_cascade() {
    let opener = MockOpener::default();
    let mut settings = Settings::default();
    settings::defaults(&mut settings);
    settings.set_string(settings::DEVICE_ID, VIDEO0);

    let mut props = Properties::build(&opener, &settings);
    assert_eq!(props.devices.len(), 1);
    assert_eq!(props.formats.len(), 3);
    assert_eq!(props.resolutions.len(), 2);
    assert_eq!(props.framerates.len(), 2);
    assert!(props.formats.contains(&ffi::V4L2_PIX_FMT_NV12));
    assert_eq!(props.framerates.name, settings::FRAMERATE);

    opener.configure(|c| c.intervals = vec![FrameInterval::Discrete(Fraction::new(1, 60))]);
    settings.set_int(settings::RESOLUTION, i64::from(pack(1280, 720)));
    assert!(props.resolution_selected(&opener, &settings));
    assert_eq!(props.framerates.len(), 1);
    assert_eq!(props.framerates.items[0].label, "60.00");

    assert_eq!(opener.counters().open_devices(), 0);
}

#[test]
fn test_property_handlers_without_device() {
    let opener = MockOpener::default();
    let mut settings = Settings::default();
    settings::defaults(&mut settings);
    settings.set_string(settings::DEVICE_ID, "/dev/video5");

    let mut props = Properties::new(&opener);
    assert!(!props.device_selected(&opener, &settings));
    assert!(!props.format_selected(&opener, &settings));
    assert!(!props.resolution_selected(&opener, &settings));
    assert!(props.formats.is_empty());
    assert!(props.framerates.is_empty());
}

// =============================================================================
// Layer 3: Hardware Integration
// =============================================================================

#[test]
#[ignore] // Requires hardware - run with `cargo test -- --ignored`
fn test_hardware_enumeration() {
    common::init_logging();
    let opener = SystemOpener::default();
    let devices = DeviceEnumerator::devices(&opener, None);
    println!("Found {} capture devices", devices.len());

    for device in &devices {
        println!("{}: {}", device.value, device.label);
        let formats = DeviceEnumerator::with_device(&opener, &device.value, |dev| {
            DeviceEnumerator::formats(dev)
        })
        .unwrap();
        for format in formats {
            let sizes = DeviceEnumerator::with_device(&opener, &device.value, |dev| {
                DeviceEnumerator::resolutions(dev, format.value)
            })
            .unwrap();
            assert!(!sizes.is_empty());
            println!("  {} ({} sizes)", format.label, sizes.len());
        }
    }
}
