//! Device lifecycle state machine
//!
//! The legal (state, request) pairs live in a single table,
//! [`transition`]. A pair missing from the table is an invalid request:
//! the device raises `InvalidRequest` and nothing else happens.
//!
//! ```text
//!            Open              AttachTool           StartTracking
//!   Idle ──────────► Open ──────────────► ToolsConfigured ─────────► Tracking
//!    ▲                 │                    ▲   │  AttachTool/RemoveTool  │
//!    │   Close/Reset   │                    │   └──────┘                  │
//!    └─────────────────┴────────────────────┴──────── StopTracking ◄──────┘
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// No communication handle
    Idle,
    /// Communication open, no tools attached
    Open,
    /// At least one tool attached, not polling
    ToolsConfigured,
    /// Polling thread running
    Tracking,
}

impl DeviceState {
    pub const ALL: [DeviceState; 4] = [
        DeviceState::Idle,
        DeviceState::Open,
        DeviceState::ToolsConfigured,
        DeviceState::Tracking,
    ];

    /// Whether the communication handle exists in this state
    pub fn has_communication(self) -> bool {
        self != DeviceState::Idle
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    Open,
    AttachTool,
    RemoveTool,
    StartTracking,
    StopTracking,
    Close,
    Reset,
}

impl Request {
    pub const ALL: [Request; 7] = [
        Request::Open,
        Request::AttachTool,
        Request::RemoveTool,
        Request::StartTracking,
        Request::StopTracking,
        Request::Close,
        Request::Reset,
    ];
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Side effect performed for an accepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    OpenCommunication,
    AttachTool,
    RemoveTool,
    StartTracking,
    StopTracking,
    CloseCommunication,
    ResetDevice,
    /// Accepted without effect (StopTracking while not tracking)
    Nothing,
}

/// Row of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub action: Action,
    /// State after the action succeeded
    pub success: DeviceState,
    /// State after the action failed
    pub failure: DeviceState,
}

const fn row(action: Action, success: DeviceState, failure: DeviceState) -> Option<Transition> {
    Some(Transition {
        action,
        success,
        failure,
    })
}

/// Look up the transition for `request` in `state`.
///
/// `None` means the request is invalid in that state.
pub fn transition(state: DeviceState, request: Request) -> Option<Transition> {
    use DeviceState::*;

    match (state, request) {
        (Idle, Request::Open) => row(Action::OpenCommunication, Open, Idle),

        (Open, Request::AttachTool) => row(Action::AttachTool, ToolsConfigured, Open),
        (ToolsConfigured, Request::AttachTool) => {
            row(Action::AttachTool, ToolsConfigured, ToolsConfigured)
        }
        (ToolsConfigured, Request::RemoveTool) => {
            row(Action::RemoveTool, ToolsConfigured, ToolsConfigured)
        }

        (ToolsConfigured, Request::StartTracking) => {
            row(Action::StartTracking, Tracking, ToolsConfigured)
        }

        // Halting the loop cannot be refused, and stopping twice is a no-op
        (Tracking, Request::StopTracking) => {
            row(Action::StopTracking, ToolsConfigured, ToolsConfigured)
        }
        (s, Request::StopTracking) => row(Action::Nothing, s, s),

        (Open | ToolsConfigured | Tracking, Request::Close) => {
            row(Action::CloseCommunication, Idle, Idle)
        }
        (_, Request::Reset) => row(Action::ResetDevice, Idle, Idle),

        _ => None,
    }
}
