//! Live view of the items a driver is working on.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use crate::item::{Item, ItemSnapshot, ItemStatus};

/// Shared between the driver, its item tasks and the status server.
#[derive(Debug)]
pub struct PipelineMonitor {
    in_flight: Mutex<BTreeMap<String, ItemSnapshot>>,
    accepting: AtomicBool,
    claimed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Serializable snapshot of a [`PipelineMonitor`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    /// Whether new items are still being claimed.
    pub accepting: bool,
    pub claimed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub in_flight: Vec<ItemSnapshot>,
}

impl Default for PipelineMonitor {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(BTreeMap::new()),
            accepting: AtomicBool::new(true),
            claimed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }
}

impl PipelineMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn claimed(&self, item: &Item) {
        self.claimed.fetch_add(1, Ordering::Relaxed);
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(item.name().to_string(), item.snapshot());
    }

    pub(crate) fn stage_started(&self, item: &Item, stage: &str) {
        let mut snapshot = item.snapshot();
        snapshot.current_stage = Some(stage.to_string());
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(item.name().to_string(), snapshot);
    }

    pub(crate) fn finished(&self, item: &Item) {
        match item.status() {
            ItemStatus::Succeeded => self.succeeded.fetch_add(1, Ordering::Relaxed),
            _ => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(item.name());
    }

    /// Counts an item whose task ended without returning it.
    pub(crate) fn lost(&self, name: &str) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
    }

    pub(crate) fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            accepting: self.is_accepting(),
            claimed: self.claimed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            in_flight: self
                .in_flight
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .values()
                .cloned()
                .collect(),
        }
    }
}
