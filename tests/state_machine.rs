//! Lifecycle tests: every (state, request) pair against the transition
//! table, plus the request-level failure paths.

mod common;

use common::{drain, sim_in_state, sim_tracker};
use igt_devices::config::{DeviceConfig, ToolConfig};
use igt_devices::events::DeviceEvent;
use igt_devices::state::{transition, Action};
use igt_devices::vendor::SimulatedTracker;
use igt_devices::{Device, DeviceError, DeviceState, Request};
use std::time::Duration;

fn issue(device: &mut Device<SimulatedTracker>, request: Request) -> igt_devices::Result<()> {
    match request {
        Request::Open => device.request_open(),
        Request::AttachTool => device.request_attach_tool(ToolConfig::port("T2", 2)),
        Request::RemoveTool => device.request_remove_tool("T1"),
        Request::StartTracking => device.request_start_tracking(),
        Request::StopTracking => device.request_stop_tracking(),
        Request::Close => device.request_close(),
        Request::Reset => device.request_reset(),
    }
}

#[test]
fn test_every_state_request_pair() {
    for state in DeviceState::ALL {
        for request in Request::ALL {
            let (mut device, _control) = sim_in_state(state);
            let events = device.subscribe();
            let result = issue(&mut device, request);

            match transition(state, request) {
                None => {
                    assert!(
                        matches!(result, Err(DeviceError::InvalidRequest { .. })),
                        "{} in {} should be rejected",
                        request,
                        state
                    );
                    assert_eq!(device.state(), state, "{} in {} changed state", request, state);
                    assert!(drain(&events)
                        .iter()
                        .any(|e| matches!(e, DeviceEvent::InvalidRequest { .. })));
                }
                Some(t) => {
                    assert!(result.is_ok(), "{} in {} failed: {:?}", request, state, result);
                    let expected = if t.action == Action::Nothing {
                        state
                    } else {
                        t.success
                    };
                    assert_eq!(device.state(), expected, "{} in {}", request, state);
                }
            }
        }
    }
}

#[test]
fn test_open_without_communication() {
    let tracker = SimulatedTracker::new().without_communication();
    let mut device = Device::new(DeviceConfig::new("sim", 50.0), tracker).unwrap();
    let events = device.subscribe();

    assert!(matches!(device.request_open(), Err(DeviceError::NoCommunication)));
    assert_eq!(device.state(), DeviceState::Idle);
    assert!(matches!(&drain(&events)[..], [DeviceEvent::OpenFailure { .. }]));
}

#[test]
fn test_open_failure_stays_idle() {
    let (mut device, control) = sim_tracker(DeviceConfig::new("sim", 50.0));
    control.set_fail_open(true);
    assert!(device.request_open().is_err());
    assert_eq!(device.state(), DeviceState::Idle);

    control.set_fail_open(false);
    device.request_open().unwrap();
    assert_eq!(device.state(), DeviceState::Open);
}

#[test]
fn test_frequency_above_device_maximum() {
    let tracker = SimulatedTracker::new().with_max_frequency(40.0);
    assert!(matches!(
        Device::new(DeviceConfig::new("sim", 60.0), tracker),
        Err(DeviceError::InvalidConfig(_))
    ));
}

#[test]
fn test_port_out_of_range_leaves_device_unchanged() {
    let (mut device, _control) = sim_in_state(DeviceState::Open);
    let events = device.subscribe();

    let result = device.request_attach_tool(ToolConfig::port("T1", 7));
    assert!(matches!(result, Err(DeviceError::ToolRejected { .. })));
    assert_eq!(device.state(), DeviceState::Open);
    assert!(device.tool_ids().is_empty());
    assert!(matches!(
        &drain(&events)[..],
        [DeviceEvent::AddToolFailure { tool, .. }] if tool == "T1"
    ));
}

#[test]
fn test_duplicate_tool_rejected() {
    let (mut device, _control) = sim_in_state(DeviceState::ToolsConfigured);
    assert!(matches!(
        device.request_attach_tool(ToolConfig::port("T1", 2)),
        Err(DeviceError::DuplicateTool(_))
    ));
    assert_eq!(device.state(), DeviceState::ToolsConfigured);
    assert_eq!(device.tool_ids(), vec!["T1".to_string()]);
}

#[test]
fn test_second_reference_tool_rejected() {
    let (mut device, _control) = sim_in_state(DeviceState::Open);
    device
        .request_attach_tool(ToolConfig::port("Ref", 0).as_reference())
        .unwrap();
    assert!(matches!(
        device.request_attach_tool(ToolConfig::port("Ref2", 2).as_reference()),
        Err(DeviceError::MultipleReferenceTools { .. })
    ));
}

#[test]
fn test_vendor_enable_failure() {
    let (mut device, control) = sim_in_state(DeviceState::Open);
    control.set_fail_enable(true);
    assert!(matches!(
        device.request_attach_tool(ToolConfig::port("T1", 1)),
        Err(DeviceError::VendorError { .. })
    ));
    assert_eq!(device.state(), DeviceState::Open);
    assert!(device.tool("T1").is_none());
}

#[test]
fn test_remove_unknown_tool() {
    let (mut device, _control) = sim_in_state(DeviceState::ToolsConfigured);
    assert!(matches!(
        device.request_remove_tool("ghost"),
        Err(DeviceError::ToolNotFound(_))
    ));
}

#[test]
fn test_remove_survives_vendor_refusal() {
    let (mut device, control) = sim_in_state(DeviceState::ToolsConfigured);
    control.set_fail_disable(true);
    device.request_remove_tool("T1").unwrap();
    assert!(device.tool("T1").is_none());
    assert_eq!(device.state(), DeviceState::ToolsConfigured);
}

#[test]
fn test_start_tracking_without_tools() {
    let (mut device, _control) = sim_in_state(DeviceState::ToolsConfigured);
    device.request_remove_tool("T1").unwrap();
    let events = device.subscribe();

    assert!(matches!(
        device.request_start_tracking(),
        Err(DeviceError::StartTrackingFailure(_))
    ));
    assert_eq!(device.state(), DeviceState::ToolsConfigured);
    assert!(!device.is_polling());
    assert!(matches!(
        &drain(&events)[..],
        [DeviceEvent::StartTrackingFailure { .. }]
    ));
}

#[test]
fn test_vendor_start_failure() {
    let (mut device, control) = sim_in_state(DeviceState::ToolsConfigured);
    control.set_fail_start(true);
    assert!(device.request_start_tracking().is_err());
    assert_eq!(device.state(), DeviceState::ToolsConfigured);
    assert!(!device.is_polling());
    assert!(device.adapter().is_some());
}

#[test]
fn test_stop_tracking_is_idempotent() {
    let (mut device, _control) = sim_in_state(DeviceState::Idle);
    device.request_stop_tracking().unwrap();
    assert_eq!(device.state(), DeviceState::Idle);

    let (mut device, control) = sim_in_state(DeviceState::Tracking);
    device.request_stop_tracking().unwrap();
    assert_eq!(device.state(), DeviceState::ToolsConfigured);
    assert!(!device.is_polling());

    let polls = control.poll_count();
    device.request_stop_tracking().unwrap();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(control.poll_count(), polls, "polling continued after stop");
    assert_eq!(device.state(), DeviceState::ToolsConfigured);
}

#[test]
fn test_close_while_tracking_joins_poller() {
    let (mut device, control) = sim_in_state(DeviceState::Tracking);
    device.request_close().unwrap();
    assert_eq!(device.state(), DeviceState::Idle);
    assert!(!device.is_polling());
    assert!(!control.is_open());
    let calls = control.calls();
    assert!(calls.ends_with(&["stop".to_string(), "close".to_string()]));
}

#[test]
fn test_kept_tools_are_reenabled_on_open() {
    let (mut device, control) = sim_in_state(DeviceState::ToolsConfigured);
    device.request_close().unwrap();
    assert_eq!(device.state(), DeviceState::Idle);
    assert_eq!(device.tool_ids(), vec!["T1".to_string()]);

    device.request_open().unwrap();
    assert_eq!(device.state(), DeviceState::ToolsConfigured);
    assert!(device.tool("T1").unwrap().is_attached());
    let enables = control.calls().iter().filter(|c| *c == "enable T1").count();
    assert_eq!(enables, 2);
}

#[test]
fn test_reset_from_tracking() {
    let (mut device, control) = sim_in_state(DeviceState::Tracking);
    let events = device.subscribe();
    device.request_reset().unwrap();
    assert_eq!(device.state(), DeviceState::Idle);
    assert!(!device.is_polling());
    assert!(control.calls().contains(&"reset".to_string()));
    assert!(drain(&events)
        .iter()
        .any(|e| matches!(e, DeviceEvent::ResetDone)));
}

#[test]
fn test_attach_configured_tools_reports_each_failure() {
    let config = DeviceConfig::new("sim", 50.0)
        .with_tool(ToolConfig::port("T1", 1))
        .with_tool(ToolConfig::port("T9", 9))
        .with_tool(ToolConfig::port("T2", 2));
    let (mut device, _control) = sim_tracker(config);
    let events = device.subscribe();
    device.request_open().unwrap();

    assert_eq!(device.attach_configured_tools().unwrap(), 2);
    assert_eq!(device.state(), DeviceState::ToolsConfigured);
    let failures: Vec<_> = drain(&events)
        .into_iter()
        .filter(|e| matches!(e, DeviceEvent::AddToolFailure { .. }))
        .collect();
    assert_eq!(failures.len(), 1);
}

#[test]
fn test_drop_stops_polling() {
    let (device, control) = sim_in_state(DeviceState::Tracking);
    drop(device);
    let polls = control.poll_count();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(control.poll_count(), polls);
    assert!(!control.is_open());
}
