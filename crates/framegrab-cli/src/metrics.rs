// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Instant;

/// Intervals kept for the percentiles; older ones are dropped first
pub const MAX_INTERVAL_SAMPLES: usize = 8192;

/// Capture metrics collected during a session
#[derive(Debug, Clone, Serialize)]
pub struct FrameMetrics {
    /// Total number of frames received
    pub frames_processed: u64,
    /// Total payload bytes reported by the driver
    pub bytes_processed: u64,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    /// Average throughput in frames per second
    pub throughput_fps: f64,
    /// Average bandwidth in megabits per second
    pub bandwidth_mbps: f64,
    /// Minimum interval between frame timestamps in microseconds
    pub interval_min_us: u64,
    /// Maximum interval between frame timestamps in microseconds
    pub interval_max_us: u64,
    /// Average interval in microseconds
    pub interval_avg_us: u64,
    /// 50th percentile (median) interval in microseconds, over the most
    /// recent `MAX_INTERVAL_SAMPLES` intervals
    pub interval_p50_us: u64,
    /// 95th percentile interval in microseconds
    pub interval_p95_us: u64,
    /// 99th percentile interval in microseconds
    pub interval_p99_us: u64,
    /// Frames the driver skipped, from gaps in the sequence numbers
    pub dropped_frames: u64,
}

/// Metrics collector for tracking capture performance
pub struct MetricsCollector {
    start_time: Instant,
    frames: u64,
    intervals_us: VecDeque<u64>,
    interval_count: u64,
    interval_sum_us: u64,
    interval_min_us: u64,
    interval_max_us: u64,
    bytes: u64,
    prev_timestamp_ns: Option<u64>,
    prev_sequence: Option<u32>,
    dropped_frames: u64,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            frames: 0,
            intervals_us: VecDeque::with_capacity(MAX_INTERVAL_SAMPLES),
            interval_count: 0,
            interval_sum_us: 0,
            interval_min_us: u64::MAX,
            interval_max_us: 0,
            bytes: 0,
            prev_timestamp_ns: None,
            prev_sequence: None,
            dropped_frames: 0,
        }
    }

    /// Restart the clock, e.g. once streaming actually began
    pub fn reset_clock(&mut self) {
        self.start_time = Instant::now();
    }

    /// Record one frame: its capture timestamp, sequence number and size.
    pub fn record_frame(&mut self, timestamp_ns: u64, sequence: u32, bytes: u64) {
        self.frames += 1;
        self.bytes += bytes;

        if let Some(prev) = self.prev_timestamp_ns {
            match timestamp_ns.checked_sub(prev) {
                Some(delta) => self.record_interval(delta / 1000),
                None => log::warn!("Frame timestamp went backwards: {} -> {}", prev, timestamp_ns),
            }
        }
        self.prev_timestamp_ns = Some(timestamp_ns);

        self.track_sequence(sequence);
    }

    fn record_interval(&mut self, interval_us: u64) {
        self.interval_count += 1;
        self.interval_sum_us = self.interval_sum_us.saturating_add(interval_us);
        self.interval_min_us = self.interval_min_us.min(interval_us);
        self.interval_max_us = self.interval_max_us.max(interval_us);

        if self.intervals_us.len() == MAX_INTERVAL_SAMPLES {
            self.intervals_us.pop_front();
        }
        self.intervals_us.push_back(interval_us);
    }

    /// Track the driver sequence number to detect drops.
    /// Returns the number of dropped frames detected (0 or N)
    pub fn track_sequence(&mut self, sequence: u32) -> u64 {
        let drops = match self.prev_sequence {
            Some(prev) => {
                let expected = prev.wrapping_add(1);
                if sequence == expected {
                    0
                } else if sequence > expected {
                    u64::from(sequence - expected)
                } else {
                    // restarted stream or wrap; not a drop
                    log::warn!("Frame sequence number decreased: {} -> {}", prev, sequence);
                    0
                }
            }
            None => 0,
        };

        self.dropped_frames += drops;
        self.prev_sequence = Some(sequence);
        drops
    }

    /// Frames recorded so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Finalize and calculate all metrics
    pub fn finalize(&mut self) -> FrameMetrics {
        let duration = self.start_time.elapsed();
        let duration_ms = duration.as_millis() as u64;
        let duration_secs = duration.as_secs_f64();

        let throughput_fps = if duration_secs > 0.0 {
            self.frames as f64 / duration_secs
        } else {
            0.0
        };

        let bandwidth_mbps = if duration_secs > 0.0 {
            (self.bytes as f64 * 8.0) / (duration_secs * 1_000_000.0)
        } else {
            0.0
        };

        let (min_us, max_us, avg_us) = if self.interval_count > 0 {
            (
                self.interval_min_us,
                self.interval_max_us,
                self.interval_sum_us / self.interval_count,
            )
        } else {
            (0, 0, 0)
        };

        let mut sorted: Vec<u64> = self.intervals_us.iter().copied().collect();
        sorted.sort_unstable();

        FrameMetrics {
            frames_processed: self.frames,
            bytes_processed: self.bytes,
            duration_ms,
            throughput_fps,
            bandwidth_mbps,
            interval_min_us: min_us,
            interval_max_us: max_us,
            interval_avg_us: avg_us,
            interval_p50_us: percentile(&sorted, 50.0),
            interval_p95_us: percentile(&sorted, 95.0),
            interval_p99_us: percentile(&sorted, 99.0),
            dropped_frames: self.dropped_frames,
        }
    }

    /// Print metrics in human-readable format
    pub fn print_text(&mut self) {
        let metrics = self.finalize();
        println!("\n=== Capture Metrics ===");
        println!("Frames captured:   {}", metrics.frames_processed);
        println!(
            "Bytes captured:    {} ({:.2} MB)",
            metrics.bytes_processed,
            metrics.bytes_processed as f64 / 1_048_576.0
        );
        println!(
            "Duration:          {:.2} s",
            metrics.duration_ms as f64 / 1000.0
        );
        println!("Throughput:        {:.2} fps", metrics.throughput_fps);
        println!("Bandwidth:         {:.2} Mbps", metrics.bandwidth_mbps);

        if metrics.frames_processed > 1 {
            println!("\nFrame Interval (µs):");
            println!("  Min:    {}", metrics.interval_min_us);
            println!("  Max:    {}", metrics.interval_max_us);
            println!("  Avg:    {}", metrics.interval_avg_us);
            println!("  P50:    {}", metrics.interval_p50_us);
            println!("  P95:    {}", metrics.interval_p95_us);
            println!("  P99:    {}", metrics.interval_p99_us);
        }

        if metrics.dropped_frames > 0 {
            let expected = metrics.frames_processed + metrics.dropped_frames;
            println!(
                "\nDropped frames:    {} ({:.2}%)",
                metrics.dropped_frames,
                (metrics.dropped_frames as f64 / expected as f64) * 100.0
            );
        }
    }

    /// Print metrics in JSON format
    pub fn print_json(&mut self) -> Result<(), serde_json::Error> {
        let metrics = self.finalize();
        let json = serde_json::to_string_pretty(&metrics)?;
        println!("{}", json);
        Ok(())
    }
}

/// Calculate percentile from sorted interval data
fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }

    let len = sorted.len();
    let idx = ((p / 100.0) * (len - 1) as f64).round() as usize;
    sorted[idx.min(len - 1)]
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
