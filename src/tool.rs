//! Tools: one tracked sensor, probe or video channel of a device

use crate::config::ToolConfig;
use crate::sample::Sample;
use std::fmt;
use tracing::trace;

/// Externally visible tool status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ToolStatus {
    /// Not attached to a device yet
    #[default]
    NotInitialized,
    /// Attached, but the latest sample must not be used
    NotAvailable,
    /// Attached and the latest sample is live
    Visible,
}

type Observer<S> = Box<dyn FnMut(&str, &S) + Send>;

/// A tool as seen by the foreground thread
///
/// The owning device keeps tools in its registry; the tool only remembers
/// the device name it is attached to and never refers back to the device
/// itself. Samples reach a tool exclusively through the status reporter.
pub struct Tool<S: Sample> {
    config: ToolConfig,
    device: Option<String>,
    status: ToolStatus,
    latest: Option<S>,
    observers: Vec<Observer<S>>,
}

impl<S: Sample> Tool<S> {
    pub fn new(config: ToolConfig) -> Self {
        Tool {
            config,
            device: None,
            status: ToolStatus::NotInitialized,
            latest: None,
            observers: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    pub fn is_reference(&self) -> bool {
        self.config.is_reference
    }

    pub fn status(&self) -> ToolStatus {
        self.status
    }

    /// Name of the device this tool is attached to
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn is_attached(&self) -> bool {
        self.device.is_some()
    }

    /// Latest sample handed over by the status reporter.
    ///
    /// `None` until the tool is attached and has been visible at least once.
    /// Check [`Tool::status`] before trusting it: a `NotAvailable` tool
    /// keeps its last sample.
    pub fn latest(&self) -> Option<&S> {
        if self.is_attached() {
            self.latest.as_ref()
        } else {
            None
        }
    }

    /// Register a transform-changed observer, called with the tool id and
    /// the new sample every time the tool becomes or stays visible.
    pub fn add_observer<F>(&mut self, observer: F)
    where
        F: FnMut(&str, &S) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub(crate) fn attach(&mut self, device: &str) {
        self.device = Some(device.to_string());
        self.status = ToolStatus::NotAvailable;
    }

    pub(crate) fn detach(&mut self) {
        self.device = None;
        self.status = ToolStatus::NotInitialized;
        self.latest = None;
    }

    pub(crate) fn update(&mut self, sample: S) {
        trace!(tool = %self.config.id, "Tool sample updated");
        self.status = ToolStatus::Visible;
        for observer in &mut self.observers {
            observer(&self.config.id, &sample);
        }
        self.latest = Some(sample);
    }

    pub(crate) fn mark_not_available(&mut self) {
        if self.is_attached() {
            self.status = ToolStatus::NotAvailable;
        }
    }
}

impl<S: Sample> fmt::Debug for Tool<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("id", &self.config.id)
            .field("binding", &self.config.binding)
            .field("device", &self.device)
            .field("status", &self.status)
            .field("observers", &self.observers.len())
            .finish()
    }
}
