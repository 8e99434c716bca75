//! Latest-value buffer between the polling thread and the status reporter
//!
//! One mutex per device guards a map from tool id to the most recent
//! sample and its status flag. The polling thread only takes the lock to
//! move an already-built sample in; the status reporter only takes it to
//! clone the sample out. Vendor I/O never happens under the lock.
//!
//! There is at most one pending value per tool: a publish overwrites
//! whatever the reporter has not drained yet.

use crate::sample::Sample;
use crate::tool::ToolStatus;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct Entry<S> {
    value: Option<S>,
    status: ToolStatus,
    sequence: u64,
    sanitized: u64,
    rejected: u64,
}

impl<S> Entry<S> {
    fn new() -> Self {
        Entry {
            value: None,
            status: ToolStatus::NotAvailable,
            sequence: 0,
            sanitized: 0,
            rejected: 0,
        }
    }
}

impl<S: Sample> Entry<S> {
    fn snapshot(&self) -> Drained<S> {
        match &self.value {
            Some(value) => Drained {
                value: value.clone(),
                status: self.status,
                sequence: self.sequence,
            },
            None => Drained {
                value: S::empty(),
                status: ToolStatus::NotAvailable,
                sequence: 0,
            },
        }
    }
}

/// Copy of one tool's entry taken by [`SampleStore::drain`]
#[derive(Debug, Clone)]
pub struct Drained<S> {
    /// Latest published sample, or `S::empty()` if there was none
    pub value: S,
    pub status: ToolStatus,
    /// Number of visible samples published so far; 0 means never
    pub sequence: u64,
}

/// Data problem found while decoding, waiting to be reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataWarning {
    OrientationSanitized { tool: String },
    SampleRejected { tool: String, reason: String },
}

/// Outcome of the polling cycles so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollHealth {
    pub cycles: u64,
    pub total_failures: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    /// Set once the failure limit was reached; the polling loop has exited
    pub lost: bool,
}

#[derive(Debug)]
struct Inner<S> {
    entries: HashMap<String, Entry<S>>,
    warnings: Vec<DataWarning>,
    health: PollHealth,
}

#[derive(Debug)]
pub struct SampleStore<S: Sample> {
    inner: Mutex<Inner<S>>,
}

impl<S: Sample> Default for SampleStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sample> SampleStore<S> {
    pub fn new() -> Self {
        SampleStore {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                warnings: Vec::new(),
                health: PollHealth::default(),
            }),
        }
    }

    // A panic on the other side of the lock leaves a map of complete
    // values behind, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create the entry for a newly attached tool, status NotAvailable
    pub fn register(&self, tool: &str) {
        self.lock()
            .entries
            .entry(tool.to_string())
            .or_insert_with(Entry::new);
    }

    pub fn unregister(&self, tool: &str) -> bool {
        self.lock().entries.remove(tool).is_some()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.warnings.clear();
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.lock().entries.contains_key(tool)
    }

    /// Store a visible sample. Returns false for unregistered tools.
    pub fn publish(&self, tool: &str, value: S, sanitized: bool) -> bool {
        let mut inner = self.lock();
        let Inner {
            entries, warnings, ..
        } = &mut *inner;
        let Some(entry) = entries.get_mut(tool) else {
            return false;
        };
        entry.value = Some(value);
        entry.status = ToolStatus::Visible;
        entry.sequence += 1;
        if sanitized {
            entry.sanitized += 1;
            warnings.push(DataWarning::OrientationSanitized {
                tool: tool.to_string(),
            });
        }
        true
    }

    /// Flag a tool as not available, keeping its cached sample
    pub fn publish_not_available(&self, tool: &str) -> bool {
        match self.lock().entries.get_mut(tool) {
            Some(entry) => {
                entry.status = ToolStatus::NotAvailable;
                true
            }
            None => false,
        }
    }

    /// Record a sample rejected during decoding; the entry is left as is
    pub fn reject(&self, tool: &str, reason: impl Into<String>) {
        let mut inner = self.lock();
        let Inner {
            entries, warnings, ..
        } = &mut *inner;
        if let Some(entry) = entries.get_mut(tool) {
            entry.rejected += 1;
            warnings.push(DataWarning::SampleRejected {
                tool: tool.to_string(),
                reason: reason.into(),
            });
        }
    }

    /// Copy out a tool's entry. `None` for unregistered tools.
    pub fn drain(&self, tool: &str) -> Option<Drained<S>> {
        self.lock().entries.get(tool).map(Entry::snapshot)
    }

    /// Drain several tools under a single lock acquisition
    pub fn drain_all<'a, I>(&self, tools: I) -> Vec<(String, Drained<S>)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let inner = self.lock();
        tools
            .into_iter()
            .filter_map(|tool| {
                let entry = inner.entries.get(tool)?;
                Some((tool.to_string(), entry.snapshot()))
            })
            .collect()
    }

    pub fn take_warnings(&self) -> Vec<DataWarning> {
        std::mem::take(&mut self.lock().warnings)
    }

    pub fn sanitized_count(&self, tool: &str) -> u64 {
        self.lock().entries.get(tool).map_or(0, |e| e.sanitized)
    }

    pub fn rejected_count(&self, tool: &str) -> u64 {
        self.lock().entries.get(tool).map_or(0, |e| e.rejected)
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.health.cycles += 1;
        inner.health.consecutive_failures = 0;
    }

    /// Record a failed cycle; returns the current run of failures
    pub fn record_failure(&self, error: impl Into<String>) -> u32 {
        let mut inner = self.lock();
        let health = &mut inner.health;
        health.cycles += 1;
        health.total_failures += 1;
        health.consecutive_failures += 1;
        health.last_error = Some(error.into());
        health.consecutive_failures
    }

    pub fn mark_lost(&self) {
        self.lock().health.lost = true;
    }

    pub fn health(&self) -> PollHealth {
        self.lock().health.clone()
    }

    pub fn reset_health(&self) {
        self.lock().health = PollHealth::default();
    }
}
