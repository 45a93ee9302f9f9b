//! Port for the structured decision audit trail.
//!
//! Defines the [`DecisionLogger`] trait for recording guard events (decisions,
//! outcomes, breaker transitions, budget warnings, run lifecycle) to a
//! machine-readable log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while this port captures the audit trail.
//! Records carry tool names, fingerprints, reason codes and costs; they never
//! carry raw tool arguments or result payloads.

use aura_domain::Cost;
use serde_json::Value;
use std::sync::Mutex;

/// A structured guard event.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    /// Event type identifier (e.g., "decision", "outcome", "run_finished").
    pub event_type: &'static str,
    /// JSON payload with event-specific fields.
    pub payload: Value,
}

impl DecisionRecord {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging guard events.
///
/// The `log` method is synchronous and non-fallible: a failing sink must
/// never change a decision.
pub trait DecisionLogger: Send + Sync {
    fn log(&self, record: DecisionRecord);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoDecisionLogger;

impl DecisionLogger for NoDecisionLogger {
    fn log(&self, _record: DecisionRecord) {}
}

/// Keeps every record in memory. Used by the simulation and tests.
#[derive(Debug, Default)]
pub struct InMemoryDecisionLog {
    records: Mutex<Vec<DecisionRecord>>,
}

impl InMemoryDecisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// All records of one event type, in logging order.
    pub fn find(&self, event_type: &str) -> Vec<DecisionRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.event_type == event_type)
            .collect()
    }

    /// Sum of `estimated_cost_avoided` across all records.
    pub fn cost_avoided(&self) -> Cost {
        self.records()
            .iter()
            .filter_map(|r| r.payload.get("estimated_cost_avoided")?.as_f64())
            .filter_map(|usd| Cost::try_from_usd(usd).ok())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl DecisionLogger for InMemoryDecisionLog {
    fn log(&self, record: DecisionRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}
