//! Run one tracker or imager from a TOML configuration and print its events.
//!
//! ```text
//! igt-track --config aurora.toml --duration-s 10
//! RUST_LOG=igt_devices=debug igt-track --config sim.toml
//! ```

use clap::Parser;
use igt_devices::config::{CommunicationConfig, DeviceConfig, VendorKind};
use igt_devices::events::DeviceEvent;
use igt_devices::vendor::{
    IgtlImager, IgtlTracker, NdiModel, NdiTracker, SimulatedTracker, VendorAdapter,
};
use igt_devices::{Device, DeviceError, Frame, Transform};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Track tools from an IGT device")]
struct Args {
    /// Device configuration (TOML)
    #[arg(long)]
    config: PathBuf,
    /// Stop after this many seconds; run until interrupted when omitted
    #[arg(long)]
    duration_s: Option<f64>,
    /// Status reporter interval in milliseconds
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,
}

fn describe_pose(t: &Transform) -> String {
    let [x, y, z] = t.translation();
    format!("({:.2}, {:.2}, {:.2}) mm, error {:.4}", x, y, z, t.error())
}

fn describe_frame(f: &Frame) -> String {
    let g = f.geometry();
    format!("{}x{} frame, {} bytes", g.width, g.height, f.data().len())
}

fn run<A: VendorAdapter>(
    device: &mut Device<A>,
    args: &Args,
    describe: fn(&A::Sample) -> String,
) -> Result<(), DeviceError> {
    let events = device.subscribe();
    device.request_open()?;
    let attached = device.attach_configured_tools()?;
    info!(device = %device.name(), tools = attached, "Tools attached");
    device.request_start_tracking()?;

    let deadline = args
        .duration_s
        .map(|s| Instant::now() + Duration::from_secs_f64(s.max(0.0)));
    let tick = Duration::from_millis(args.tick_ms.max(1));

    while deadline.map_or(true, |d| Instant::now() < d) {
        let summary = device.update_status();
        for event in events.try_iter() {
            match event {
                DeviceEvent::ToolVisible { tool, sample } => {
                    println!("{:<12} {}", tool, describe(&sample))
                }
                DeviceEvent::ToolNotAvailable { tool } => println!("{:<12} not available", tool),
                other if other.is_failure() => warn!(event = other.kind(), "{:?}", other),
                other => info!(event = other.kind(), "Device event"),
            }
        }
        if summary.communication_lost {
            return Err(DeviceError::CommunicationLost(
                device.config().failure_policy.max_consecutive_failures,
            ));
        }
        std::thread::sleep(tick);
    }

    device.request_stop_tracking()?;
    device.request_close()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let config = DeviceConfig::from_file(&args.config)?;
    info!(device = %config.name, vendor = ?config.vendor, hz = config.frequency_hz, "Loaded configuration");

    let serial = match &config.communication {
        Some(CommunicationConfig::Serial(serial)) => Some(serial.clone()),
        _ => None,
    };
    let socket = match &config.communication {
        Some(CommunicationConfig::Socket(socket)) => Some(socket.clone()),
        _ => None,
    };

    match config.vendor {
        VendorKind::Simulated => {
            let tracker = SimulatedTracker::new();
            let control = tracker.control();
            for (i, tool) in config.tools.iter().enumerate() {
                control.set_translation(&tool.id, [10.0 * i as f64, 0.0, 0.0]);
            }
            run(&mut Device::new(config, tracker)?, &args, describe_pose)?;
        }
        VendorKind::Aurora | VendorKind::Polaris => {
            let model = if config.vendor == VendorKind::Aurora {
                NdiModel::Aurora
            } else {
                NdiModel::Polaris
            };
            let serial = serial.ok_or_else(|| {
                DeviceError::InvalidConfig("NDI trackers need a serial communication section".to_string())
            })?;
            let tracker = NdiTracker::new(model).with_serial(serial);
            run(&mut Device::new(config, tracker)?, &args, describe_pose)?;
        }
        VendorKind::Openigtlink => {
            let socket = socket.ok_or_else(|| {
                DeviceError::InvalidConfig("OpenIGTLink devices need a socket communication section".to_string())
            })?;
            let tracker = IgtlTracker::new().with_socket(socket);
            run(&mut Device::new(config, tracker)?, &args, describe_pose)?;
        }
        VendorKind::OpenigtlinkImager => {
            let socket = socket.ok_or_else(|| {
                DeviceError::InvalidConfig("OpenIGTLink devices need a socket communication section".to_string())
            })?;
            let imager = IgtlImager::new().with_socket(socket);
            run(&mut Device::new(config, imager)?, &args, describe_frame)?;
        }
    }
    Ok(())
}
