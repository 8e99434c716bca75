//! Device notifications
//!
//! Every request outcome and every status-reporter observation is raised
//! as a [`DeviceEvent`]. Consumers subscribe to a device and receive the
//! events over a crossbeam channel; events are only ever sent from the
//! thread that owns the device.

use crate::state::{DeviceState, Request};
use crossbeam_channel::{unbounded, Receiver, Sender};

#[derive(Debug, Clone)]
pub enum DeviceEvent<S> {
    Opened,
    OpenFailure { message: String },
    ToolAdded { tool: String },
    AddToolFailure { tool: String, message: String },
    ToolRemoved { tool: String },
    TrackingStarted,
    StartTrackingFailure { message: String },
    TrackingStopped,
    StopTrackingFailure { message: String },
    Closed,
    ResetDone,
    InvalidRequest { state: DeviceState, request: Request },
    ToolVisible { tool: String, sample: S },
    ToolNotAvailable { tool: String },
    OrientationSanitized { tool: String },
    SampleRejected { tool: String, reason: String },
    CommunicationFailure { message: String, consecutive: u32 },
    CommunicationLost { message: String },
}

impl<S> DeviceEvent<S> {
    /// Short name, for logs and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceEvent::Opened => "Opened",
            DeviceEvent::OpenFailure { .. } => "OpenFailure",
            DeviceEvent::ToolAdded { .. } => "ToolAdded",
            DeviceEvent::AddToolFailure { .. } => "AddToolFailure",
            DeviceEvent::ToolRemoved { .. } => "ToolRemoved",
            DeviceEvent::TrackingStarted => "TrackingStarted",
            DeviceEvent::StartTrackingFailure { .. } => "StartTrackingFailure",
            DeviceEvent::TrackingStopped => "TrackingStopped",
            DeviceEvent::StopTrackingFailure { .. } => "StopTrackingFailure",
            DeviceEvent::Closed => "Closed",
            DeviceEvent::ResetDone => "ResetDone",
            DeviceEvent::InvalidRequest { .. } => "InvalidRequest",
            DeviceEvent::ToolVisible { .. } => "ToolVisible",
            DeviceEvent::ToolNotAvailable { .. } => "ToolNotAvailable",
            DeviceEvent::OrientationSanitized { .. } => "OrientationSanitized",
            DeviceEvent::SampleRejected { .. } => "SampleRejected",
            DeviceEvent::CommunicationFailure { .. } => "CommunicationFailure",
            DeviceEvent::CommunicationLost { .. } => "CommunicationLost",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            DeviceEvent::OpenFailure { .. }
                | DeviceEvent::AddToolFailure { .. }
                | DeviceEvent::StartTrackingFailure { .. }
                | DeviceEvent::StopTrackingFailure { .. }
                | DeviceEvent::InvalidRequest { .. }
                | DeviceEvent::CommunicationFailure { .. }
                | DeviceEvent::CommunicationLost { .. }
        )
    }
}

/// Fan-out of events to any number of subscribers
#[derive(Debug)]
pub struct EventBus<S> {
    subscribers: Vec<Sender<DeviceEvent<S>>>,
}

impl<S> Default for EventBus<S> {
    fn default() -> Self {
        EventBus {
            subscribers: Vec::new(),
        }
    }
}

impl<S: Clone> EventBus<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<DeviceEvent<S>> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Send to every live subscriber, dropping those whose receiver is gone
    pub fn emit(&mut self, event: DeviceEvent<S>) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
