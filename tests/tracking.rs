//! Polling thread and status reporter, end to end over the simulated
//! tracker and imager.

mod common;

use common::{sim_tracker, wait_for};
use igt_devices::config::{
    CalibrationConfig, DeviceConfig, FailurePolicy, OnLost, StalePolicy, ToolConfig,
};
use igt_devices::events::DeviceEvent;
use igt_devices::frame::FrameGeometry;
use igt_devices::tool::ToolStatus;
use igt_devices::transform::{Quaternion, RawPose};
use igt_devices::vendor::{SimulatedImager, SimulatedTracker, SimulationControl};
use igt_devices::{Device, DeviceState};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Open, attach the configured tools and start polling
fn tracking(config: DeviceConfig) -> (Device<SimulatedTracker>, SimulationControl<RawPose>) {
    let (mut device, control) = sim_tracker(config);
    device.request_open().unwrap();
    device.attach_configured_tools().unwrap();
    device.request_start_tracking().unwrap();
    (device, control)
}

fn assert_close(actual: [f64; 3], expected: [f64; 3]) {
    for i in 0..3 {
        assert!(
            (actual[i] - expected[i]).abs() < 1e-9,
            "{:?} != {:?}",
            actual,
            expected
        );
    }
}

#[test]
fn test_tool_becomes_visible() {
    let config = DeviceConfig::new("sim", 100.0).with_tool(ToolConfig::port("T1", 1));
    let (mut device, control) = sim_tracker(config);
    control.set_translation("T1", [1.0, 2.0, 3.0]);
    let events = device.subscribe();
    device.request_open().unwrap();
    device.attach_configured_tools().unwrap();
    device.request_start_tracking().unwrap();

    let event = wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::ToolVisible { .. })
    })
    .expect("T1 never became visible");
    let DeviceEvent::ToolVisible { tool, sample } = event else {
        unreachable!()
    };
    assert_eq!(tool, "T1");
    assert_close(sample.translation(), [1.0, 2.0, 3.0]);

    let t1 = device.tool("T1").unwrap();
    assert_eq!(t1.status(), ToolStatus::Visible);
    assert_close(t1.latest().unwrap().translation(), [1.0, 2.0, 3.0]);
    assert_eq!(t1.device(), Some("sim"));
}

#[test]
fn test_update_status_outside_tracking_is_silent() {
    let config = DeviceConfig::new("sim", 100.0).with_tool(ToolConfig::port("T1", 1));
    let (mut device, _control) = sim_tracker(config);
    let events = device.subscribe();
    device.request_open().unwrap();
    device.attach_configured_tools().unwrap();
    let _ = events.try_iter().count();

    let summary = device.update_status();
    assert!(summary.visible.is_empty() && summary.not_available.is_empty());
    assert_eq!(events.try_iter().count(), 0);
}

#[test]
fn test_out_of_view_tool() {
    let config = DeviceConfig::new("sim", 100.0).with_tool(ToolConfig::port("T1", 1));
    let (mut device, control) = tracking(config);
    control.set_out_of_view("T1");
    let events = device.subscribe();

    assert!(wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::ToolNotAvailable { tool } if tool == "T1")
    })
    .is_some());
    assert_eq!(device.tool("T1").unwrap().status(), ToolStatus::NotAvailable);
}

#[test]
fn test_degenerate_orientation_is_sanitized() {
    let config = DeviceConfig::new("sim", 100.0).with_tool(ToolConfig::port("T1", 1));
    let (mut device, control) = sim_tracker(config);
    // squared norm 1e-8
    control.set_visible(
        "T1",
        RawPose::new(Quaternion::new(1e-4, 0.0, 0.0, 0.0), [0.0, 0.0, 5.0], 0.0),
    );
    let events = device.subscribe();
    device.request_open().unwrap();
    device.attach_configured_tools().unwrap();
    device.request_start_tracking().unwrap();

    assert!(wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::OrientationSanitized { tool } if tool == "T1")
    })
    .is_some());
    let event = wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::ToolVisible { .. })
    })
    .unwrap();
    let DeviceEvent::ToolVisible { sample, .. } = event else {
        unreachable!()
    };
    assert_eq!(sample.rotation(), Quaternion::identity());
    assert!(device.sanitized_count("T1") >= 1);
}

#[test]
fn test_calibration_is_applied() {
    let tool = ToolConfig::port("T1", 1)
        .with_calibration(CalibrationConfig::from_translation([0.0, 0.0, 10.0]));
    let (mut device, control) = tracking(DeviceConfig::new("sim", 100.0).with_tool(tool));
    control.set_translation("T1", [1.0, 2.0, 3.0]);
    let events = device.subscribe();

    let event = wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::ToolVisible { .. })
    })
    .unwrap();
    let DeviceEvent::ToolVisible { sample, .. } = event else {
        unreachable!()
    };
    assert_close(sample.translation(), [1.0, 2.0, 13.0]);
}

#[test]
fn test_poses_relative_to_reference_tool() {
    let config = DeviceConfig::new("sim", 100.0)
        .with_tool(ToolConfig::port("Ref", 0).as_reference())
        .with_tool(ToolConfig::port("T1", 1));
    let (mut device, control) = tracking(config);
    control.set_translation("Ref", [10.0, 0.0, 0.0]);
    control.set_translation("T1", [15.0, 1.0, 0.0]);
    let events = device.subscribe();

    let event = wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::ToolVisible { tool, .. } if tool == "T1")
    })
    .unwrap();
    let DeviceEvent::ToolVisible { sample, .. } = event else {
        unreachable!()
    };
    assert_close(sample.translation(), [5.0, 1.0, 0.0]);

    // Without the reference nothing can be expressed in its frame
    control.set_out_of_view("Ref");
    assert!(wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::ToolNotAvailable { tool } if tool == "T1")
    })
    .is_some());
}

#[test]
fn test_observers_see_fresh_samples() {
    let config = DeviceConfig::new("sim", 100.0).with_tool(ToolConfig::port("T1", 1));
    let (mut device, control) = tracking(config);
    control.set_translation("T1", [7.0, 0.0, 0.0]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    device.tool_mut("T1").unwrap().add_observer(move |id, sample| {
        sink.lock().unwrap().push((id.to_string(), sample.translation()[0]));
    });
    let events = device.subscribe();

    wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::ToolVisible { .. })
    })
    .unwrap();
    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert_eq!(seen[0], ("T1".to_string(), 7.0));
}

#[test]
fn test_absent_tool_marked_unavailable() {
    let config = DeviceConfig::new("sim", 100.0).with_tool(ToolConfig::port("T1", 1));
    let (mut device, control) = tracking(config);
    control.set_translation("T1", [1.0, 0.0, 0.0]);
    let events = device.subscribe();
    wait_for(&mut device, &events, |e| matches!(e, DeviceEvent::ToolVisible { .. })).unwrap();

    control.set_absent("T1");
    assert!(wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::ToolNotAvailable { .. })
    })
    .is_some());
}

#[test]
fn test_reuse_stale_keeps_last_sample() {
    let config = DeviceConfig::new("sim", 100.0)
        .with_tool(ToolConfig::port("T1", 1))
        .with_stale_policy(StalePolicy::ReuseStale)
        .with_validity(Duration::from_millis(10));
    let (mut device, control) = tracking(config);
    control.set_translation("T1", [1.0, 0.0, 0.0]);
    let events = device.subscribe();
    wait_for(&mut device, &events, |e| matches!(e, DeviceEvent::ToolVisible { .. })).unwrap();

    control.set_absent("T1");
    std::thread::sleep(Duration::from_millis(60));
    let summary = device.update_status();
    assert_eq!(summary.visible, vec!["T1".to_string()]);
}

#[test]
fn test_transient_failures_are_reported() {
    let config = DeviceConfig::new("sim", 100.0).with_tool(ToolConfig::port("T1", 1));
    let (mut device, control) = tracking(config);
    control.set_translation("T1", [1.0, 0.0, 0.0]);
    control.fail_next_polls(2);
    let events = device.subscribe();

    assert!(wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::CommunicationFailure { .. })
    })
    .is_some());
    assert!(wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::ToolVisible { .. })
    })
    .is_some());
    assert_eq!(device.state(), DeviceState::Tracking);
    assert!(!device.poll_health().lost);
}

#[test]
fn test_communication_lost_forces_close() {
    let config = DeviceConfig::new("sim", 200.0)
        .with_tool(ToolConfig::port("T1", 1))
        .with_failure_policy(FailurePolicy {
            max_consecutive_failures: 3,
            on_lost: OnLost::ForceClose,
        });
    let (mut device, control) = tracking(config);
    control.set_fail_polls(true);
    let events = device.subscribe();

    assert!(wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::CommunicationLost { .. })
    })
    .is_some());
    assert_eq!(device.state(), DeviceState::Idle);
    assert!(!device.is_polling());
    assert!(!control.is_open());
    assert!(events
        .try_iter()
        .any(|e| matches!(e, DeviceEvent::Closed)));
}

#[test]
fn test_communication_lost_report_only() {
    let config = DeviceConfig::new("sim", 200.0)
        .with_tool(ToolConfig::port("T1", 1))
        .with_failure_policy(FailurePolicy {
            max_consecutive_failures: 2,
            on_lost: OnLost::ReportOnly,
        });
    let (mut device, control) = tracking(config);
    control.set_fail_polls(true);
    let events = device.subscribe();

    assert!(wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::CommunicationLost { .. })
    })
    .is_some());
    assert_eq!(device.state(), DeviceState::Tracking);
    assert!(device.poll_health().lost);

    device.request_stop_tracking().unwrap();
    assert_eq!(device.state(), DeviceState::ToolsConfigured);
}

#[test]
fn test_imager_frames() {
    let geometry = FrameGeometry::new(8, 4, 1);
    let config = DeviceConfig::new("us", 30.0).with_tool(ToolConfig::marker("US", "Image").with_frame(geometry));
    let imager = SimulatedImager::new();
    let control = imager.control();
    control.set_frame("US", geometry, 42);
    let mut device = Device::new(config, imager).unwrap();
    let events = device.subscribe();
    device.request_open().unwrap();
    device.attach_configured_tools().unwrap();
    device.request_start_tracking().unwrap();

    let event = wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::ToolVisible { .. })
    })
    .unwrap();
    let DeviceEvent::ToolVisible { sample, .. } = event else {
        unreachable!()
    };
    assert_eq!(sample.geometry(), geometry);
    assert!(sample.data().iter().all(|&b| b == 42));

    // A frame of the wrong size is rejected, not published
    control.set_frame("US", FrameGeometry::new(2, 2, 1), 0);
    assert!(wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::SampleRejected { tool, .. } if tool == "US")
    })
    .is_some());
}

#[test]
fn test_rejected_frame_is_not_presented_as_visible() {
    let geometry = FrameGeometry::new(8, 4, 1);
    let config = DeviceConfig::new("us", 30.0)
        .with_tool(ToolConfig::marker("US", "Image").with_frame(geometry))
        .with_validity(Duration::from_secs(10));
    let imager = SimulatedImager::new();
    let control = imager.control();
    control.set_frame("US", geometry, 7);
    let mut device = Device::new(config, imager).unwrap();
    let events = device.subscribe();
    device.request_open().unwrap();
    device.attach_configured_tools().unwrap();
    device.request_start_tracking().unwrap();
    wait_for(&mut device, &events, |e| matches!(e, DeviceEvent::ToolVisible { .. })).unwrap();

    // The last good frame is still valid, but the tool is no longer seen
    control.set_frame("US", FrameGeometry::new(2, 2, 1), 0);
    wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::SampleRejected { tool, .. } if tool == "US")
    })
    .unwrap();
    assert!(wait_for(&mut device, &events, |e| {
        matches!(e, DeviceEvent::ToolNotAvailable { tool } if tool == "US")
    })
    .is_some());
    assert!(device.update_status().visible.is_empty());
}
