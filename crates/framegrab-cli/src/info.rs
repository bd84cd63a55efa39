// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! Capability tree of a single capture device.

use crate::error::CliError;
use clap::Args as ClapArgs;
use framegrab::fourcc::FourCC;
use framegrab::settings::{self, Settings};
use framegrab::tuple::unpack;
use framegrab::v4l2::{DeviceEnumerator, SystemOpener, VideoDevice};
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Capture device path (defaults to the first capture device found)
    #[arg(short, long, env = "FRAMEGRAB_DEVICE")]
    device: Option<String>,

    /// Only list formats, skip resolutions and frame rates
    #[arg(long)]
    formats_only: bool,
}

#[derive(Debug, Serialize)]
struct DeviceInfo {
    version: String,
    backend: String,
    device: String,
    card: String,
    driver: String,
    bus: String,
    formats: Vec<FormatInfo>,
}

#[derive(Debug, Serialize)]
struct FormatInfo {
    fourcc: String,
    description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    resolutions: Vec<ResolutionInfo>,
}

#[derive(Debug, Serialize)]
struct ResolutionInfo {
    width: u32,
    height: u32,
    framerates: Vec<String>,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing info command: {:?}", args);

    let opener = SystemOpener::default();
    let path = match args.device {
        Some(device) => device,
        None => {
            let mut settings = Settings::default();
            DeviceEnumerator::devices(&opener, Some(&mut settings));
            let selected = settings.get_string(settings::DEVICE_ID);
            if selected.is_empty() {
                return Err(CliError::DeviceNotFound(
                    "no capture devices available".to_string(),
                ));
            }
            selected.to_string()
        }
    };

    let info = DeviceEnumerator::with_device(&opener, &path, |device| {
        query_device(device, &path, args.formats_only)
    })
    .map_err(|e| CliError::DeviceNotFound(format!("{}: {}", path, e)))??;

    if json {
        let json_str = serde_json::to_string_pretty(&info)
            .map_err(|e| CliError::General(format!("JSON serialization failed: {}", e)))?;
        println!("{}", json_str);
    } else {
        print_text(&info);
    }

    Ok(())
}

fn query_device<D: VideoDevice + ?Sized>(
    device: &D,
    path: &str,
    formats_only: bool,
) -> Result<DeviceInfo, CliError> {
    let cap = device.capability()?;
    if !cap.is_capture() {
        return Err(CliError::DeviceNotFound(format!(
            "{} does not support video capture",
            path
        )));
    }

    let formats = DeviceEnumerator::formats(device)
        .into_iter()
        .map(|format| {
            let resolutions = if formats_only {
                Vec::new()
            } else {
                DeviceEnumerator::resolutions(device, format.value)
                    .into_iter()
                    .map(|size| {
                        let (width, height) = unpack(size.value);
                        let framerates =
                            DeviceEnumerator::framerates(device, format.value, width, height)
                                .into_iter()
                                .map(|rate| rate.label)
                                .collect();
                        ResolutionInfo {
                            width,
                            height,
                            framerates,
                        }
                    })
                    .collect()
            };
            FormatInfo {
                fourcc: FourCC::from(format.value).to_string(),
                description: format.label,
                resolutions,
            }
        })
        .collect();

    Ok(DeviceInfo {
        version: framegrab::version().to_string(),
        backend: format!("{:?}", framegrab::backend()),
        device: path.to_string(),
        card: cap.card,
        driver: cap.driver,
        bus: cap.bus_info,
        formats,
    })
}

fn print_text(info: &DeviceInfo) {
    println!("=== {} ===", info.device);
    println!("Card:     {}", info.card);
    println!("Driver:   {}", info.driver);
    println!("Bus:      {}", info.bus);
    println!("Backend:  {}", info.backend);
    println!("Version:  {}", info.version);

    if info.formats.is_empty() {
        println!("\nNo supported formats");
        return;
    }

    println!("\nFormats:");
    for format in &info.formats {
        println!("  {} - {}", format.fourcc, format.description);
        for size in &format.resolutions {
            println!(
                "    {}x{} @ {}",
                size.width,
                size.height,
                size.framerates.join(", ")
            );
        }
    }
}
