//! The polling thread
//!
//! While a device is tracking its adapter lives on a dedicated thread that
//! repeats [`poll_cycle`] at the configured frequency and publishes into
//! the [`SampleStore`]. Stopping joins the thread and hands the adapter
//! back, so the communication handle is never reachable from two threads.

use crate::config::{StalePolicy, ToolConfig};
use crate::error::{DeviceError, Result};
use crate::sample::Sample;
use crate::store::SampleStore;
use crate::vendor::{Reading, VendorAdapter};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Longest uninterrupted sleep between cycles
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(5);

/// Everything a polling thread needs besides its adapter
#[derive(Debug, Clone)]
pub struct PollingContext<S: Sample> {
    pub device: String,
    pub store: Arc<SampleStore<S>>,
    /// Tools attached when tracking started
    pub tools: Vec<ToolConfig>,
    pub period: Duration,
    pub validity: Duration,
    pub stale_policy: StalePolicy,
    pub max_consecutive_failures: u32,
}

/// Run one poll and publish its readings.
///
/// Returns the number of samples published. Decoding problems are
/// recorded in the store and never fail the cycle; only adapter errors do.
pub fn poll_cycle<A: VendorAdapter>(
    adapter: &mut A,
    ctx: &PollingContext<A::Sample>,
) -> Result<usize> {
    let readings = adapter.poll_once()?;

    let mut reported = HashSet::with_capacity(readings.len());
    let mut published = 0;
    for reading in readings {
        let Some(tool) = ctx.tools.iter().find(|t| t.id == reading.tool()) else {
            trace!(device = %ctx.device, tool = %reading.tool(), "Reading for unattached tool ignored");
            continue;
        };
        let accounted = match reading {
            Reading::Visible { raw, .. } => {
                // Decode outside the store lock; publish is a single move
                match A::Sample::decode(raw, tool, ctx.validity) {
                    Ok(decoded) => {
                        if decoded.sanitized {
                            warn!(device = %ctx.device, tool = %tool.id, "Degenerate orientation replaced with identity");
                        }
                        if ctx.store.publish(&tool.id, decoded.sample, decoded.sanitized) {
                            published += 1;
                        }
                        true
                    }
                    Err(e) => {
                        warn!(device = %ctx.device, tool = %tool.id, error = %e, "Sample rejected");
                        ctx.store.reject(&tool.id, e.to_string());
                        false
                    }
                }
            }
            Reading::OutOfView { .. } => {
                ctx.store.publish_not_available(&tool.id);
                true
            }
        };
        // A rejected sample leaves the tool unreported for this cycle
        if accounted {
            reported.insert(tool.id.as_str());
        }
    }

    if ctx.stale_policy == StalePolicy::MarkUnavailable {
        for tool in ctx.tools.iter().filter(|t| !reported.contains(t.id.as_str())) {
            ctx.store.publish_not_available(&tool.id);
        }
    }

    Ok(published)
}

/// Handle to a running polling thread
#[derive(Debug)]
pub struct PollingThread<A: VendorAdapter> {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Option<A>>,
    device: String,
}

impl<A: VendorAdapter> PollingThread<A> {
    /// Move `adapter` onto a new named thread and start polling.
    ///
    /// If the thread cannot be created the adapter is handed back with
    /// the error.
    pub fn spawn(
        adapter: A,
        ctx: PollingContext<A::Sample>,
    ) -> std::result::Result<Self, (DeviceError, A)> {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::bounded::<A>(1);
        let device = ctx.device.clone();
        let thread_stop = stop.clone();

        let spawned = thread::Builder::new()
            .name(format!("igt-poll-{}", device))
            .spawn(move || -> Option<A> {
                let adapter = rx.recv().ok()?;
                Some(run(adapter, ctx, thread_stop))
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => return Err((DeviceError::PollingThread(e.to_string()), adapter)),
        };
        if let Err(crossbeam_channel::SendError(adapter)) = tx.send(adapter) {
            return Err((
                DeviceError::PollingThread("polling thread exited before start".to_string()),
                adapter,
            ));
        }

        info!(device = %device, "Polling thread started");
        Ok(PollingThread {
            stop,
            handle,
            device,
        })
    }

    /// True once the loop has exited by itself (communication lost)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop, wait for it to exit and take the adapter back.
    pub fn stop(self) -> Result<A> {
        self.stop.store(true, Ordering::Release);
        match self.handle.join() {
            Ok(Some(adapter)) => {
                info!(device = %self.device, "Polling thread stopped");
                Ok(adapter)
            }
            Ok(None) => Err(DeviceError::PollingThread(
                "polling thread never received its adapter".to_string(),
            )),
            Err(_) => {
                error!(device = %self.device, "Polling thread panicked");
                Err(DeviceError::PollingThread(format!(
                    "polling thread of '{}' panicked",
                    self.device
                )))
            }
        }
    }
}

fn run<A: VendorAdapter>(
    mut adapter: A,
    ctx: PollingContext<A::Sample>,
    stop: Arc<AtomicBool>,
) -> A {
    debug!(device = %ctx.device, period_ms = ctx.period.as_millis() as u64, "Polling loop running");
    while !stop.load(Ordering::Acquire) {
        let cycle_start = Instant::now();

        match poll_cycle(&mut adapter, &ctx) {
            Ok(published) => {
                trace!(device = %ctx.device, published, "Poll cycle complete");
                ctx.store.record_success();
            }
            Err(e) => {
                let failures = ctx.store.record_failure(e.to_string());
                warn!(device = %ctx.device, error = %e, consecutive = failures, "Poll cycle failed");
                if failures >= ctx.max_consecutive_failures {
                    error!(device = %ctx.device, failures, "Communication lost, polling loop exiting");
                    ctx.store.mark_lost();
                    break;
                }
            }
        }

        let deadline = cycle_start + ctx.period;
        loop {
            if stop.load(Ordering::Acquire) {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(STOP_CHECK_INTERVAL));
        }
    }
    adapter
}
