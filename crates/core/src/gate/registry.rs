//! Process-wide registry of named gates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::info;

use super::concurrency::{ConcurrencyGate, GateStatus};
use super::error::GateError;

/// Operator-supplied settings for one gate name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSpec {
    pub capacity: usize,
    pub acquire_timeout: Option<Duration>,
}

impl GateSpec {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            acquire_timeout: None,
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// Registry of gates shared by every item in the process.
///
/// A gate is instantiated the first time a stage asks for it.
#[derive(Default)]
pub struct GateRegistry {
    specs: HashMap<String, GateSpec>,
    gates: Mutex<HashMap<String, Arc<ConcurrencyGate>>>,
}

impl GateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the capacity for `name`.
    pub fn with_gate(mut self, name: impl Into<String>, spec: GateSpec) -> Self {
        self.specs.insert(name.into(), spec);
        self
    }

    /// Returns the gate for `name`, creating it on first use.
    pub fn gate(&self, name: &str) -> Result<Arc<ConcurrencyGate>, GateError> {
        let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(gate) = gates.get(name) {
            return Ok(Arc::clone(gate));
        }

        let spec = self
            .specs
            .get(name)
            .ok_or_else(|| GateError::UnknownGate(name.to_string()))?;
        let gate = Arc::new(
            ConcurrencyGate::new(name, spec.capacity)?.with_acquire_timeout(spec.acquire_timeout),
        );
        info!(gate = name, capacity = spec.capacity, "Created concurrency gate");
        gates.insert(name.to_string(), Arc::clone(&gate));
        Ok(gate)
    }

    /// Usage of every gate created so far, sorted by name.
    pub fn status(&self) -> Vec<GateStatus> {
        let gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        let mut statuses: Vec<GateStatus> = gates.values().map(|g| g.status()).collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Closes every created gate.
    pub fn close_all(&self) {
        let gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        for gate in gates.values() {
            gate.close();
        }
    }
}
