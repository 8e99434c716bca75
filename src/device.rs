//! Devices: the state machine driver and the status reporter
//!
//! A [`Device`] owns a vendor adapter, a tool registry and the sample
//! store shared with its polling thread. All requests are issued from the
//! thread that owns the device. Each request is checked against the
//! transition table in [`crate::state`], performs its action, and raises a
//! success or failure [`DeviceEvent`]. Failures are also returned as `Err`.
//!
//! # Example
//!
//! ```no_run
//! use igt_devices::config::{DeviceConfig, ToolConfig};
//! use igt_devices::device::Device;
//! use igt_devices::vendor::SimulatedTracker;
//!
//! let config = DeviceConfig::new("sim", 50.0).with_tool(ToolConfig::port("T1", 1));
//! let mut device = Device::new(config, SimulatedTracker::new())?;
//! let events = device.subscribe();
//!
//! device.request_open()?;
//! device.attach_configured_tools()?;
//! device.request_start_tracking()?;
//! loop {
//!     device.update_status();
//!     for event in events.try_iter() {
//!         println!("{}", event.kind());
//!     }
//!     # break;
//! }
//! # Ok::<(), igt_devices::DeviceError>(())
//! ```

use crate::config::{DeviceConfig, OnLost, StalePolicy, ToolConfig};
use crate::error::{DeviceError, Result};
use crate::events::{DeviceEvent, EventBus};
use crate::polling::{PollingContext, PollingThread};
use crate::registry::ToolRegistry;
use crate::sample::Sample;
use crate::state::{transition, Action, DeviceState, Request, Transition};
use crate::store::{DataWarning, PollHealth, SampleStore};
use crate::tool::{Tool, ToolStatus};
use crate::vendor::{ResetPolicy, VendorAdapter};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What one status-reporter tick observed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub visible: Vec<String>,
    pub not_available: Vec<String>,
    /// Communication was declared lost during this tick
    pub communication_lost: bool,
}

pub struct Device<A: VendorAdapter> {
    name: String,
    config: DeviceConfig,
    state: DeviceState,
    /// `None` while the polling thread owns the adapter
    adapter: Option<A>,
    poller: Option<PollingThread<A>>,
    registry: ToolRegistry<A::Sample>,
    store: Arc<SampleStore<A::Sample>>,
    events: EventBus<A::Sample>,
    failures_reported: u64,
    lost_reported: bool,
}

impl<A: VendorAdapter> Device<A> {
    /// Create an idle device.
    ///
    /// Fails if the configured frequency is not supported by the adapter
    /// or the tool list is inconsistent.
    pub fn new(config: DeviceConfig, adapter: A) -> Result<Self> {
        config.validate(adapter.max_frequency())?;
        info!(device = %config.name, vendor = adapter.name(), frequency_hz = config.frequency_hz, "Device created");
        Ok(Device {
            name: config.name.clone(),
            config,
            state: DeviceState::Idle,
            adapter: Some(adapter),
            poller: None,
            registry: ToolRegistry::new(),
            store: Arc::new(SampleStore::new()),
            events: EventBus::new(),
            failures_reported: 0,
            lost_reported: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn subscribe(&mut self) -> Receiver<DeviceEvent<A::Sample>> {
        self.events.subscribe()
    }

    pub fn tool(&self, id: &str) -> Option<&Tool<A::Sample>> {
        self.registry.get(id)
    }

    /// Mutable access, e.g. to register transform-changed observers
    pub fn tool_mut(&mut self, id: &str) -> Option<&mut Tool<A::Sample>> {
        self.registry.get_mut(id)
    }

    pub fn tool_ids(&self) -> Vec<String> {
        self.registry.ids()
    }

    /// The adapter, unless the polling thread currently owns it
    pub fn adapter(&self) -> Option<&A> {
        self.adapter.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    pub fn poll_health(&self) -> PollHealth {
        self.store.health()
    }

    /// Number of degenerate orientations replaced for `tool` so far
    pub fn sanitized_count(&self, tool: &str) -> u64 {
        self.store.sanitized_count(tool)
    }

    fn emit(&mut self, event: DeviceEvent<A::Sample>) {
        self.events.emit(event);
    }

    fn check(&mut self, request: Request) -> Result<Transition> {
        match transition(self.state, request) {
            Some(t) => Ok(t),
            None => {
                warn!(device = %self.name, state = ?self.state, request = ?request, "Invalid request");
                self.emit(DeviceEvent::InvalidRequest {
                    state: self.state,
                    request,
                });
                Err(DeviceError::InvalidRequest {
                    state: self.state,
                    request,
                })
            }
        }
    }

    fn adapter_mut(&mut self) -> Result<&mut A> {
        self.adapter
            .as_mut()
            .ok_or_else(|| DeviceError::PollingThread("adapter was lost with the polling thread".to_string()))
    }

    /// Open communication: Idle → Open.
    ///
    /// Under [`ResetPolicy::KeepTools`] tools kept from before a close or
    /// reset are enabled again and the device lands in ToolsConfigured.
    pub fn request_open(&mut self) -> Result<()> {
        let t = self.check(Request::Open)?;
        debug_assert_eq!(t.action, Action::OpenCommunication);

        let opened = self.adapter_mut().and_then(|adapter| {
            if !adapter.has_communication() {
                return Err(DeviceError::NoCommunication);
            }
            adapter.open()
        });
        if let Err(e) = opened {
            warn!(device = %self.name, error = %e, "Open failed");
            self.state = t.failure;
            self.emit(DeviceEvent::OpenFailure {
                message: e.to_string(),
            });
            return Err(e);
        }

        info!(device = %self.name, "Device opened");
        self.state = t.success;
        self.emit(DeviceEvent::Opened);
        self.reenable_kept_tools();
        Ok(())
    }

    fn reenable_kept_tools(&mut self) {
        if self.registry.is_empty() {
            return;
        }
        let configs = self.registry.configs();
        for config in configs {
            let enabled = self.adapter_mut().and_then(|a| a.enable_tool(&config));
            match enabled {
                Ok(()) => {
                    if let Some(tool) = self.registry.get_mut(&config.id) {
                        tool.attach(&self.name);
                    }
                    self.store.register(&config.id);
                }
                Err(e) => {
                    warn!(device = %self.name, tool = %config.id, error = %e, "Kept tool could not be re-enabled");
                    let _ = self.registry.remove(&config.id);
                    self.store.unregister(&config.id);
                    self.emit(DeviceEvent::AddToolFailure {
                        tool: config.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        if !self.registry.is_empty() {
            self.state = DeviceState::ToolsConfigured;
        }
    }

    /// Validate, register and enable a tool: Open | ToolsConfigured →
    /// ToolsConfigured. On failure the state and registry are unchanged.
    pub fn request_attach_tool(&mut self, config: ToolConfig) -> Result<()> {
        let t = self.check(Request::AttachTool)?;
        let id = config.id.clone();

        match self.attach(config) {
            Ok(()) => {
                info!(device = %self.name, tool = %id, "Tool attached");
                self.state = t.success;
                self.emit(DeviceEvent::ToolAdded { tool: id });
                Ok(())
            }
            Err(e) => {
                warn!(device = %self.name, tool = %id, error = %e, "Attach tool failed");
                self.state = t.failure;
                self.emit(DeviceEvent::AddToolFailure {
                    tool: id,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn attach(&mut self, config: ToolConfig) -> Result<()> {
        self.registry.check_insert(&config)?;
        let adapter = self.adapter_mut()?;
        adapter.verify_tool(&config)?;
        adapter.enable_tool(&config)?;

        let id = config.id.clone();
        let mut tool = Tool::new(config);
        tool.attach(&self.name);
        self.registry.add(tool)?;
        self.store.register(&id);
        Ok(())
    }

    /// Attach every tool listed in the device configuration.
    ///
    /// Each failure raises its own AddToolFailure; returns how many tools
    /// were attached.
    pub fn attach_configured_tools(&mut self) -> Result<usize> {
        let mut attached = 0;
        for config in self.config.tools.clone() {
            if self.registry.contains(&config.id) {
                continue;
            }
            match self.request_attach_tool(config) {
                Ok(()) => attached += 1,
                Err(e @ DeviceError::InvalidRequest { .. }) => return Err(e),
                Err(_) => {}
            }
        }
        Ok(attached)
    }

    /// Detach a tool. The vendor disable is best effort; the tool leaves
    /// the registry and the store even if the device refuses.
    pub fn request_remove_tool(&mut self, id: &str) -> Result<()> {
        let t = self.check(Request::RemoveTool)?;
        if !self.registry.contains(id) {
            return Err(DeviceError::ToolNotFound(id.to_string()));
        }

        if let Err(e) = self.adapter_mut().and_then(|a| a.disable_tool(id)) {
            warn!(device = %self.name, tool = %id, error = %e, "Vendor disable failed, removing anyway");
        }
        self.registry.remove(id)?;
        self.store.unregister(id);
        info!(device = %self.name, tool = %id, "Tool removed");
        self.state = t.success;
        self.emit(DeviceEvent::ToolRemoved {
            tool: id.to_string(),
        });
        Ok(())
    }

    /// Start the vendor stream and the polling thread: ToolsConfigured →
    /// Tracking.
    pub fn request_start_tracking(&mut self) -> Result<()> {
        let t = self.check(Request::StartTracking)?;
        match self.start_tracking() {
            Ok(()) => {
                info!(device = %self.name, "Tracking started");
                self.state = t.success;
                self.emit(DeviceEvent::TrackingStarted);
                Ok(())
            }
            Err(e) => {
                warn!(device = %self.name, error = %e, "Start tracking failed");
                self.state = t.failure;
                self.emit(DeviceEvent::StartTrackingFailure {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn start_tracking(&mut self) -> Result<()> {
        if self.registry.is_empty() {
            return Err(DeviceError::StartTrackingFailure(
                "no tools attached".to_string(),
            ));
        }
        let mut adapter = self.adapter.take().ok_or_else(|| {
            DeviceError::PollingThread("adapter was lost with the polling thread".to_string())
        })?;
        if let Err(e) = adapter.start_tracking() {
            self.adapter = Some(adapter);
            return Err(e);
        }

        self.store.reset_health();
        self.failures_reported = 0;
        self.lost_reported = false;
        let ctx = PollingContext {
            device: self.name.clone(),
            store: self.store.clone(),
            tools: self.registry.configs(),
            period: self.config.period(),
            validity: self.config.validity(),
            stale_policy: self.config.stale_policy,
            max_consecutive_failures: self.config.failure_policy.max_consecutive_failures,
        };
        match PollingThread::spawn(adapter, ctx) {
            Ok(poller) => {
                self.poller = Some(poller);
                Ok(())
            }
            Err((e, mut adapter)) => {
                let _ = adapter.stop_tracking();
                self.adapter = Some(adapter);
                Err(e)
            }
        }
    }

    /// Join the polling thread and take the adapter back.
    ///
    /// If the thread panicked the adapter is gone; the device drops to
    /// Idle since no communication handle remains.
    fn join_poller(&mut self) -> Result<()> {
        let Some(poller) = self.poller.take() else {
            return Ok(());
        };
        match poller.stop() {
            Ok(adapter) => {
                self.adapter = Some(adapter);
                Ok(())
            }
            Err(e) => {
                error!(device = %self.name, error = %e, "Polling thread lost");
                self.state = DeviceState::Idle;
                Err(e)
            }
        }
    }

    /// Stop polling: Tracking → ToolsConfigured.
    ///
    /// A no-op in any other state. The polling thread has exited when this
    /// returns. A failing vendor stop command raises StopTrackingFailure
    /// but does not keep the device in Tracking.
    pub fn request_stop_tracking(&mut self) -> Result<()> {
        let t = self.check(Request::StopTracking)?;
        if t.action == Action::Nothing {
            debug!(device = %self.name, state = ?self.state, "Stop tracking while not tracking ignored");
            return Ok(());
        }

        if let Err(e) = self.join_poller() {
            self.emit(DeviceEvent::StopTrackingFailure {
                message: e.to_string(),
            });
            return Err(e);
        }
        if let Err(e) = self.adapter_mut().and_then(|a| a.stop_tracking()) {
            warn!(device = %self.name, error = %e, "Vendor stop tracking failed");
            self.emit(DeviceEvent::StopTrackingFailure {
                message: e.to_string(),
            });
        }

        info!(device = %self.name, "Tracking stopped");
        self.state = t.success;
        self.emit(DeviceEvent::TrackingStopped);
        Ok(())
    }

    /// Stop polling if needed and release the communication handle:
    /// any state but Idle → Idle.
    pub fn request_close(&mut self) -> Result<()> {
        let t = self.check(Request::Close)?;
        self.shut_down(false);
        self.apply_reset_policy();
        info!(device = %self.name, "Device closed");
        self.state = t.success;
        self.emit(DeviceEvent::Closed);
        Ok(())
    }

    /// Stop polling, reset the hardware and release the handle: any → Idle.
    ///
    /// Whether tools survive is decided by the adapter's
    /// [`ResetPolicy`].
    pub fn request_reset(&mut self) -> Result<()> {
        let t = self.check(Request::Reset)?;
        self.shut_down(true);
        self.apply_reset_policy();
        info!(device = %self.name, "Device reset");
        self.state = t.success;
        self.emit(DeviceEvent::ResetDone);
        Ok(())
    }

    fn shut_down(&mut self, reset: bool) {
        let was_tracking = self.poller.is_some();
        if let Err(e) = self.join_poller() {
            warn!(device = %self.name, error = %e, "Polling thread did not stop cleanly");
        }
        let communicating = self.state.has_communication();
        let name = self.name.clone();
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        if was_tracking {
            if let Err(e) = adapter.stop_tracking() {
                warn!(device = %name, error = %e, "Vendor stop tracking failed");
            }
        }
        if reset {
            if let Err(e) = adapter.reset() {
                warn!(device = %name, error = %e, "Vendor reset failed");
            }
        }
        if communicating || reset {
            if let Err(e) = adapter.close() {
                warn!(device = %name, error = %e, "Vendor close failed");
            }
        }
    }

    fn apply_reset_policy(&mut self) {
        let policy = self
            .adapter
            .as_ref()
            .map_or(ResetPolicy::ClearTools, |a| a.reset_policy());
        match policy {
            ResetPolicy::ClearTools => {
                let removed = self.registry.clear();
                if !removed.is_empty() {
                    debug!(device = %self.name, count = removed.len(), "Tools detached");
                }
                self.store.clear();
            }
            ResetPolicy::KeepTools => {
                for tool in self.registry.iter_mut() {
                    tool.mark_not_available();
                }
                self.store.clear();
            }
        }
    }

    /// The status reporter.
    ///
    /// Call once per application tick. Drains the store, hands fresh
    /// samples to the tools (which notify their observers) and raises
    /// ToolVisible / ToolNotAvailable for every attached tool, plus any
    /// data or communication warnings recorded by the polling thread.
    /// Does nothing outside Tracking.
    pub fn update_status(&mut self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        if self.state != DeviceState::Tracking {
            return summary;
        }

        for warning in self.store.take_warnings() {
            let event = match warning {
                DataWarning::OrientationSanitized { tool } => {
                    DeviceEvent::OrientationSanitized { tool }
                }
                DataWarning::SampleRejected { tool, reason } => {
                    DeviceEvent::SampleRejected { tool, reason }
                }
            };
            self.emit(event);
        }

        let health = self.store.health();
        if health.total_failures > self.failures_reported {
            self.failures_reported = health.total_failures;
            self.emit(DeviceEvent::CommunicationFailure {
                message: health.last_error.clone().unwrap_or_default(),
                consecutive: health.consecutive_failures,
            });
        }

        let ids = self.registry.ids();
        let drained = self.store.drain_all(ids.iter().map(String::as_str));
        let reuse_stale = self.config.stale_policy == StalePolicy::ReuseStale;
        let live = |status: ToolStatus, sample: &A::Sample| {
            status == ToolStatus::Visible && (reuse_stale || !sample.is_expired())
        };

        let reference_id = self.registry.reference_id().map(str::to_string);
        let reference = reference_id.as_ref().map(|rid| {
            drained
                .iter()
                .find(|(id, _)| id == rid)
                .filter(|(_, d)| live(d.status, &d.value))
                .map(|(_, d)| d.value.clone())
        });

        for (id, entry) in drained {
            let sample = if !live(entry.status, &entry.value) {
                None
            } else {
                match (&reference_id, &reference) {
                    (Some(rid), _) if *rid == id => Some(entry.value),
                    (Some(_), Some(Some(reference))) => Some(entry.value.relative_to(reference)),
                    (Some(_), _) => None,
                    (None, _) => Some(entry.value),
                }
            };

            let Some(tool) = self.registry.get_mut(&id) else {
                continue;
            };
            match sample {
                Some(sample) => {
                    tool.update(sample.clone());
                    summary.visible.push(id.clone());
                    self.events.emit(DeviceEvent::ToolVisible { tool: id, sample });
                }
                None => {
                    tool.mark_not_available();
                    summary.not_available.push(id.clone());
                    self.events.emit(DeviceEvent::ToolNotAvailable { tool: id });
                }
            }
        }

        if health.lost && !self.lost_reported {
            self.lost_reported = true;
            summary.communication_lost = true;
            let message = health.last_error.unwrap_or_default();
            error!(device = %self.name, error = %message, "Communication lost");
            self.emit(DeviceEvent::CommunicationLost { message });
            if self.config.failure_policy.on_lost == OnLost::ForceClose {
                if let Err(e) = self.request_close() {
                    error!(device = %self.name, error = %e, "Forced close failed");
                }
            }
        }

        summary
    }
}

impl<A: VendorAdapter> Drop for Device<A> {
    fn drop(&mut self) {
        if self.state != DeviceState::Idle || self.poller.is_some() {
            debug!(device = %self.name, state = ?self.state, "Closing device on drop");
            self.shut_down(false);
        }
    }
}

impl<A: VendorAdapter> std::fmt::Debug for Device<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("tools", &self.registry.ids())
            .field("polling", &self.poller.is_some())
            .finish()
    }
}
