// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

//! Capture device listing.

use crate::error::CliError;
use clap::Args as ClapArgs;
use framegrab::v4l2::{DeviceEnumerator, DeviceOpener, SystemOpener, VideoDevice};
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Show driver and bus details for each device
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct DevicesOutput {
    devices: Vec<DeviceInfo>,
    summary: Summary,
}

#[derive(Debug, Serialize)]
struct DeviceInfo {
    path: String,
    card: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    driver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bus: Option<String>,
}

#[derive(Debug, Serialize)]
struct Summary {
    total_devices: usize,
    backend: String,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing devices command: {:?}", args);

    let opener = SystemOpener::default();
    let items = DeviceEnumerator::devices(&opener, None);

    let devices: Vec<DeviceInfo> = items
        .into_iter()
        .map(|item| {
            let mut info = DeviceInfo {
                path: item.value,
                card: item.label,
                driver: None,
                bus: None,
            };
            if args.verbose {
                describe(&opener, &mut info);
            }
            info
        })
        .collect();

    let output = DevicesOutput {
        summary: Summary {
            total_devices: devices.len(),
            backend: format!("{:?}", framegrab::backend()),
        },
        devices,
    };

    if json {
        let json_str = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::General(format!("JSON serialization failed: {}", e)))?;
        println!("{}", json_str);
    } else {
        print_text(&output);
    }

    Ok(())
}

fn describe<O: DeviceOpener>(opener: &O, info: &mut DeviceInfo) {
    let cap = opener
        .open(&info.path)
        .and_then(|device| device.capability());
    match cap {
        Ok(cap) => {
            info.driver = Some(cap.driver);
            info.bus = Some(cap.bus_info);
        }
        Err(err) => log::warn!("Failed to query {}: {}", info.path, err),
    }
}

fn print_text(output: &DevicesOutput) {
    if output.devices.is_empty() {
        println!("No capture devices found");
        return;
    }

    println!("=== Capture Devices ===");
    for device in &output.devices {
        println!("  {:<14} {}", device.path, device.card);
        if let (Some(driver), Some(bus)) = (&device.driver, &device.bus) {
            println!("  {:<14} driver: {}, bus: {}", "", driver, bus);
        }
    }

    println!();
    println!(
        "Total: {} device(s), backend: {}",
        output.summary.total_devices, output.summary.backend
    );
}
