//! Idempotency ledger for side-effect calls.

use super::key::IdempotencyKey;
use crate::core::ids::CallEventId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle of a recorded side-effect key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerState {
    /// Allowed, outcome not yet reported.
    InFlight,
    /// Reported as successfully executed.
    Executed,
}

/// A recorded key and the call that claimed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub call_id: CallEventId,
    pub state: LedgerState,
}

/// Set of side-effect fingerprints claimed within one run.
///
/// A key stays claimed while its call is in flight and after it executes.
/// Claims are released only when the owning call errors or never runs.
#[derive(Debug, Default)]
pub struct IdempotencyLedger {
    entries: HashMap<IdempotencyKey, LedgerEntry>,
}

impl IdempotencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &IdempotencyKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Claim `key` for `call_id`. Returns `true` only the first time.
    pub fn record_if_new(&mut self, key: &IdempotencyKey, call_id: &CallEventId) -> bool {
        if self.entries.contains_key(key) {
            return false;
        }
        self.entries.insert(
            key.clone(),
            LedgerEntry {
                call_id: call_id.clone(),
                state: LedgerState::InFlight,
            },
        );
        true
    }

    pub fn mark_executed(&mut self, key: &IdempotencyKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.state = LedgerState::Executed;
        }
    }

    /// Drop an in-flight claim held by `call_id`. Returns whether a claim
    /// was released.
    pub fn release(&mut self, key: &IdempotencyKey, call_id: &CallEventId) -> bool {
        let owned_in_flight = self
            .entries
            .get(key)
            .is_some_and(|e| e.state == LedgerState::InFlight && &e.call_id == call_id);
        if owned_in_flight {
            self.entries.remove(key);
        }
        owned_in_flight
    }

    pub fn entry(&self, key: &IdempotencyKey) -> Option<&LedgerEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
