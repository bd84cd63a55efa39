// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

use crate::error::CliError;
use crate::metrics::MetricsCollector;
use crate::utils;
use clap::Args as ClapArgs;
use framegrab::capture::CaptureState;
use framegrab::frame::{Frame, FrameSink, SessionInfo};
use framegrab::settings::{self, CaptureConfig, Settings};
use framegrab::source::CaptureSource;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// How long to wait for the first frame before giving up
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Main loop polling period
const POLL_PERIOD: Duration = Duration::from_millis(20);

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Capture device path (defaults to the first capture device found)
    #[arg(short, long, env = "FRAMEGRAB_DEVICE")]
    device: Option<String>,

    /// Pixel format FOURCC (YUYV, YVYU, UYVY, NV12, YU12, YV12)
    #[arg(long)]
    format: Option<String>,

    /// Resolution in WxH format
    #[arg(short, long)]
    resolution: Option<String>,

    /// Target frame rate in frames per second
    #[arg(short = 'F', long, conflicts_with = "interval")]
    framerate: Option<String>,

    /// Frame interval as N/D seconds, e.g. 1001/30000
    #[arg(long)]
    interval: Option<String>,

    /// JSON settings file applied before the flags above
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Number of frames to capture (0=unlimited)
    #[arg(short, long, default_value = "0")]
    frames: u64,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Print capture metrics on exit
    #[arg(long)]
    metrics: bool,
}

/// Frame sink feeding a metrics collector.
struct MetricsSink {
    collector: Mutex<MetricsCollector>,
    frames: AtomicU64,
}

impl MetricsSink {
    fn new() -> Self {
        Self {
            collector: Mutex::new(MetricsCollector::new()),
            frames: AtomicU64::new(0),
        }
    }

    fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    fn with_collector<T>(&self, f: impl FnOnce(&mut MetricsCollector) -> T) -> T {
        let mut guard = match self.collector.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl FrameSink for MetricsSink {
    fn deliver_frame(&self, frame: &Frame<'_>) {
        self.with_collector(|c| {
            c.record_frame(
                frame.timestamp_ns,
                frame.sequence,
                u64::from(frame.bytes_used),
            )
        });
        let count = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        log::trace!(
            "Frame {} seq {} ts {} ns, {} plane(s)",
            count,
            frame.sequence,
            frame.timestamp_ns,
            frame.plane_count()
        );
    }

    fn session_started(&self, info: &SessionInfo) {
        log::info!(
            "Streaming {} {:?} {}x{} at {} fps with {} buffers",
            info.device,
            info.video_format,
            info.format.width,
            info.format.height,
            info.interval.label(),
            info.buffers
        );
        self.with_collector(|c| c.reset_clock());
    }

    fn session_stopped(&self, frames: u64) {
        log::info!("Capture stopped after {} frames", frames);
    }
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Capture parameters: {:?}", args);

    let mut settings = build_settings(&args)?;
    let max_frames = if args.frames == 0 {
        u64::MAX
    } else {
        args.frames
    };
    let deadline = match args.duration {
        Some(secs) if secs.is_finite() && secs > 0.0 => {
            Some(Instant::now() + Duration::from_secs_f64(secs))
        }
        Some(secs) => {
            return Err(CliError::InvalidArgs(format!(
                "Duration must be positive: {}",
                secs
            )))
        }
        None => None,
    };

    // Install signal handler for graceful shutdown
    let term = utils::install_signal_handler()?;

    let sink = Arc::new(MetricsSink::new());
    let mut source = CaptureSource::new(&mut settings, sink.clone());

    let device = settings.get_string(settings::DEVICE_ID).to_string();
    if !source.is_capturing() {
        source.terminate();
        return Err(if device.is_empty() {
            CliError::DeviceNotFound("no capture devices available".to_string())
        } else if !Path::new(&device).exists() {
            CliError::DeviceNotFound(device)
        } else {
            CliError::General(format!("unable to start capture on {}", device))
        });
    }

    log::info!(
        "Capturing {} frames from {} (Ctrl+C to stop)...",
        if max_frames == u64::MAX {
            "unlimited".to_string()
        } else {
            max_frames.to_string()
        },
        device
    );

    let started = Instant::now();
    let mut result = Ok(());
    loop {
        if term.load(Ordering::Relaxed) {
            log::info!("Received interrupt, stopping capture");
            break;
        }
        if sink.frames() >= max_frames {
            break;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        if source.state() == Some(CaptureState::Stopped) {
            log::warn!("Capture thread ended on its own");
            break;
        }
        if sink.frames() == 0 && started.elapsed() >= FIRST_FRAME_TIMEOUT {
            result = Err(CliError::Timeout(format!(
                "no frames from {} within {} s",
                device,
                FIRST_FRAME_TIMEOUT.as_secs()
            )));
            break;
        }
        thread::sleep(POLL_PERIOD);
    }

    source.terminate();

    if args.metrics || json {
        sink.with_collector(|collector| {
            if json {
                collector
                    .print_json()
                    .map_err(|e| CliError::General(format!("JSON serialization failed: {}", e)))
            } else {
                collector.print_text();
                Ok(())
            }
        })?;
    } else {
        println!("Captured {} frames", sink.frames());
    }

    result
}

/// Layer the settings file, then the command-line flags, over the defaults.
fn build_settings(args: &Args) -> Result<Settings, CliError> {
    let mut settings = Settings::default();
    settings::defaults(&mut settings);

    if let Some(path) = &args.settings {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CliError::InvalidArgs(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let file: Settings = serde_json::from_str(&text).map_err(|e| {
            CliError::InvalidArgs(format!("Invalid settings file {}: {}", path.display(), e))
        })?;
        log::debug!("Loaded settings from {}: {:?}", path.display(), file);
        settings.merge(&file);
    }

    let mut config = CaptureConfig::from_settings(&settings);
    if let Some(device) = &args.device {
        config = config.with_device(device);
    }
    if let Some(format) = &args.format {
        config = config.with_format(utils::fourcc_from_str(format)?);
    }
    if let Some(resolution) = &args.resolution {
        let (width, height) = utils::parse_resolution(resolution)?;
        config = config.with_resolution(width, height);
    }
    let interval = match (&args.framerate, &args.interval) {
        (Some(fps), _) => Some(utils::parse_framerate(fps)?),
        (None, Some(interval)) => Some(utils::parse_interval(interval)?),
        (None, None) => None,
    };
    if let Some(interval) = interval {
        config = config.with_framerate(interval.numerator, interval.denominator);
    }

    config.write_to(&mut settings);
    Ok(settings)
}
