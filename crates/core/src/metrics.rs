//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Items (claimed, finished by result)
//! - Stages (attempts, durations)
//! - Gates (slots in use, waiters)
//! - Supervised processes

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts};

// =============================================================================
// Items
// =============================================================================

/// Items claimed from the coordinator.
pub static ITEMS_CLAIMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("warrior_items_claimed_total", "Total items claimed").unwrap()
});

/// Items that reached a terminal status.
pub static ITEMS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("warrior_items_finished_total", "Total items finished"),
        &["result"], // "succeeded", "failed"
    )
    .unwrap()
});

// =============================================================================
// Stages
// =============================================================================

/// Stage attempts by outcome.
pub static STAGE_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("warrior_stage_attempts_total", "Total stage attempts"),
        &["stage", "result"], // result: "success", "rejected", "error", "skipped"
    )
    .unwrap()
});

/// Wall time spent in a stage, across all its attempts.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "warrior_stage_duration_seconds",
            "Duration of a stage including retries",
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// Gates
// =============================================================================

pub static GATE_IN_USE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("warrior_gate_in_use", "Gate slots currently held"),
        &["gate"],
    )
    .unwrap()
});

pub static GATE_WAITING: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("warrior_gate_waiting", "Tasks waiting to acquire a gate"),
        &["gate"],
    )
    .unwrap()
});

// =============================================================================
// Processes
// =============================================================================

pub static PROCESSES_SPAWNED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "warrior_processes_spawned_total",
        "Total external processes spawned",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ITEMS_CLAIMED.clone()),
        Box::new(ITEMS_FINISHED.clone()),
        Box::new(STAGE_ATTEMPTS.clone()),
        Box::new(STAGE_DURATION.clone()),
        Box::new(GATE_IN_USE.clone()),
        Box::new(GATE_WAITING.clone()),
        Box::new(PROCESSES_SPAWNED.clone()),
    ]
}
