//! Shared helpers for device integration tests
#![allow(dead_code)]

use crossbeam_channel::Receiver;
use igt_devices::config::{DeviceConfig, ToolConfig};
use igt_devices::events::DeviceEvent;
use igt_devices::transform::RawPose;
use igt_devices::vendor::{SimulatedTracker, SimulationControl, VendorAdapter};
use igt_devices::{Device, DeviceState};
use std::time::{Duration, Instant};

pub const WAIT: Duration = Duration::from_secs(3);

pub fn sim_tracker(config: DeviceConfig) -> (Device<SimulatedTracker>, SimulationControl<RawPose>) {
    let tracker = SimulatedTracker::new().with_max_ports(4);
    let control = tracker.control();
    (Device::new(config, tracker).unwrap(), control)
}

/// A simulated device driven into `state`, with tool "T1" on port 1
/// attached once past Open
pub fn sim_in_state(state: DeviceState) -> (Device<SimulatedTracker>, SimulationControl<RawPose>) {
    let (mut device, control) = sim_tracker(DeviceConfig::new("sim", 200.0));
    control.set_translation("T1", [1.0, 2.0, 3.0]);
    if state == DeviceState::Idle {
        return (device, control);
    }
    device.request_open().unwrap();
    if state == DeviceState::Open {
        return (device, control);
    }
    device.request_attach_tool(ToolConfig::port("T1", 1)).unwrap();
    if state == DeviceState::ToolsConfigured {
        return (device, control);
    }
    device.request_start_tracking().unwrap();
    assert_eq!(device.state(), DeviceState::Tracking);
    (device, control)
}

/// Tick the status reporter until an event matches or the wait expires
pub fn wait_for<A, F>(
    device: &mut Device<A>,
    events: &Receiver<DeviceEvent<A::Sample>>,
    mut matches: F,
) -> Option<DeviceEvent<A::Sample>>
where
    A: VendorAdapter,
    F: FnMut(&DeviceEvent<A::Sample>) -> bool,
{
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        device.update_status();
        if let Some(event) = events.try_iter().find(|e| matches(e)) {
            return Some(event);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    None
}

pub fn drain<S>(events: &Receiver<DeviceEvent<S>>) -> Vec<DeviceEvent<S>> {
    events.try_iter().collect()
}
