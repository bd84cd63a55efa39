// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

use crate::error::CliError;
use framegrab::fourcc::FourCC;
use framegrab::v4l2::Fraction;
use signal_hook::consts::SIGINT;
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Parse resolution string in format "WxH" or "W*H"
///
/// # Examples
/// ```ignore
/// assert_eq!(parse_resolution("1920x1080").unwrap(), (1920, 1080));
/// assert_eq!(parse_resolution("1280*720").unwrap(), (1280, 720));
/// ```
pub fn parse_resolution(s: &str) -> Result<(u32, u32), CliError> {
    let (width_str, height_str) = s
        .split_once('x')
        .or_else(|| s.split_once('*'))
        .ok_or_else(|| {
            CliError::InvalidArgs(format!(
                "Invalid resolution format (expected WxH or W*H): {}",
                s
            ))
        })?;

    let width = width_str
        .trim()
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid width in resolution: {}", s)))?;
    let height = height_str
        .trim()
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid height in resolution: {}", s)))?;

    // both halves travel packed into 16 bits
    if width == 0 || height == 0 || width > 0xffff || height > 0xffff {
        return Err(CliError::InvalidArgs(format!(
            "Resolution dimensions must be between 1 and 65535: {}",
            s
        )));
    }

    Ok((width, height))
}

/// Convert FOURCC string to the V4L2 pixel format code
///
/// # Examples
/// ```ignore
/// assert_eq!(fourcc_from_str("YUYV").unwrap(), 0x56595559);
/// assert_eq!(fourcc_from_str("NV12").unwrap(), 0x3231564e);
/// ```
pub fn fourcc_from_str(s: &str) -> Result<u32, CliError> {
    FourCC::try_from(s)
        .map(u32::from)
        .map_err(CliError::InvalidArgs)
}

/// Parse a frame rate in frames per second into a frame interval.
///
/// Whole rates become `1/fps`. The NTSC family (23.976, 29.97, 59.94) maps
/// onto the exact `1001/N` intervals drivers report.
pub fn parse_framerate(s: &str) -> Result<Fraction, CliError> {
    let fps = s
        .trim()
        .parse::<f64>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid frame rate: {}", s)))?;

    if !fps.is_finite() || fps < 0.01 || fps > 655.0 {
        return Err(CliError::InvalidArgs(format!(
            "Frame rate must be between 0.01 and 655: {}",
            s
        )));
    }

    if (fps - fps.round()).abs() < 1e-6 {
        return Ok(Fraction::new(1, fps.round() as u32));
    }

    let ntsc = (fps * 1.001).round();
    if ntsc <= 65.0 && (ntsc / 1.001 - fps).abs() < 0.005 {
        return Ok(Fraction::new(1001, ntsc as u32 * 1000));
    }

    Ok(Fraction::new(100, (fps * 100.0).round() as u32))
}

/// Parse a frame interval written as "N/D" seconds.
pub fn parse_interval(s: &str) -> Result<Fraction, CliError> {
    let (num, den) = s
        .split_once('/')
        .ok_or_else(|| CliError::InvalidArgs(format!("Invalid interval (expected N/D): {}", s)))?;

    let num = num
        .trim()
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid interval numerator: {}", s)))?;
    let den = den
        .trim()
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid interval denominator: {}", s)))?;

    if num == 0 || den == 0 || num > 0xffff || den > 0xffff {
        return Err(CliError::InvalidArgs(format!(
            "Interval terms must be between 1 and 65535: {}",
            s
        )));
    }

    Ok(Fraction::new(num, den))
}

/// Install signal handler for graceful shutdown on Ctrl+C
///
/// Returns an Arc<AtomicBool> that will be set to true when SIGINT is received.
/// Check this flag periodically in your main loop to exit gracefully.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, CliError> {
    let term = Arc::new(AtomicBool::new(false));

    flag::register(SIGINT, Arc::clone(&term))
        .map_err(|e| CliError::General(format!("Failed to register signal handler: {}", e)))?;

    log::debug!("Installed SIGINT handler");
    Ok(term)
}
