//! Run and call-event entities.
//!
//! A [`Run`] is the ordered history of every call the agent proposed while
//! guarded. Each [`CallEvent`] wraps a [`CallEventState`] that only moves
//! forward:
//!
//! ```text
//! AwaitingOutcome ──> Executed
//!                └──> Skipped
//! (denied / cached) ──> Skipped
//! ```

use crate::core::error::DomainError;
use crate::core::ids::{CallEventId, RunId};
use crate::cost::Cost;
use crate::ledger::IdempotencyKey;
use crate::policy::{DecisionOutcome, ReasonCode};
use crate::util::current_timestamp_ms;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Active,
    Completed,
    /// Stopped by the engine after too many denials.
    Escalated,
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Active => "active",
            RunStatus::Completed => "completed",
            RunStatus::Escalated => "escalated",
            RunStatus::Aborted => "aborted",
        }
    }

    /// Whether the run accepts no further decisions.
    pub fn is_closed(&self) -> bool {
        !matches!(self, RunStatus::Active)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RunStatus::Active),
            "completed" => Ok(RunStatus::Completed),
            "escalated" => Ok(RunStatus::Escalated),
            "aborted" => Ok(RunStatus::Aborted),
            other => Err(format!("unknown run status: {}", other)),
        }
    }
}

/// How an executed call ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success,
    Error { code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CallEventState {
    /// Allowed; the caller has not reported back yet.
    AwaitingOutcome,
    /// The tool ran.
    Executed {
        outcome: ExecutionOutcome,
        latency_ms: Option<u64>,
    },
    /// The tool did not run: denied, served from cache, or not executed.
    Skipped,
}

impl CallEventState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, CallEventState::AwaitingOutcome)
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, CallEventState::Executed { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            CallEventState::Executed {
                outcome: ExecutionOutcome::Error { .. },
                ..
            }
        )
    }
}

/// One proposed call and everything decided about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallEvent {
    pub id: CallEventId,
    /// 1-indexed position in the run.
    pub seq: u64,
    pub tool_name: String,
    #[serde(skip_serializing)]
    pub normalized_args: Value,
    /// Set for side-effect calls only.
    pub idempotency_key: Option<IdempotencyKey>,
    pub side_effect: bool,
    pub outcome: DecisionOutcome,
    pub reason: ReasonCode,
    /// Outcome that enforcement would have produced, for shadow-mode allows.
    pub shadowed: Option<DecisionOutcome>,
    pub estimated_cost: Cost,
    pub actual_cost: Option<Cost>,
    pub state: CallEventState,
    pub proposed_at: u64,
    pub resolved_at: Option<u64>,
}

impl CallEvent {
    pub fn is_shadowed(&self) -> bool {
        self.shadowed.is_some()
    }

    /// Whether the engine kept this call from running.
    pub fn was_prevented(&self) -> bool {
        !matches!(self.outcome, DecisionOutcome::Allow)
    }
}

/// A guarded agent run.
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub id: RunId,
    pub started_at: u64,
    pub finished_at: Option<u64>,
    pub status: RunStatus,
    events: Vec<CallEvent>,
    #[serde(skip)]
    index: HashMap<CallEventId, usize>,
    /// Committed cost: executed tool calls plus model turns.
    pub cumulative_cost: Cost,
    /// Portion of `cumulative_cost` charged for model turns.
    pub model_cost: Cost,
}

impl Run {
    pub fn new(id: RunId) -> Self {
        Self {
            id,
            started_at: current_timestamp_ms(),
            finished_at: None,
            status: RunStatus::Active,
            events: Vec::new(),
            index: HashMap::new(),
            cumulative_cost: Cost::ZERO,
            model_cost: Cost::ZERO,
        }
    }

    /// Sequence number the next appended event will receive.
    pub fn next_seq(&self) -> u64 {
        self.events.len() as u64 + 1
    }

    /// Number of decisions made so far.
    pub fn decision_count(&self) -> u64 {
        self.events.len() as u64
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn events(&self) -> &[CallEvent] {
        &self.events
    }

    pub fn event(&self, id: &CallEventId) -> Option<&CallEvent> {
        self.index.get(id).and_then(|&i| self.events.get(i))
    }

    pub fn append(&mut self, event: CallEvent) {
        self.index.insert(event.id.clone(), self.events.len());
        self.events.push(event);
    }

    /// Move an awaiting event to its final state.
    pub fn resolve(
        &mut self,
        id: &CallEventId,
        state: CallEventState,
        actual_cost: Option<Cost>,
    ) -> Result<&CallEvent, DomainError> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| DomainError::UnknownCallEvent(id.clone()))?;
        let event = &mut self.events[idx];
        if event.state.is_resolved() {
            return Err(DomainError::CallEventAlreadyResolved(id.clone()));
        }
        event.state = state;
        event.actual_cost = actual_cost;
        event.resolved_at = Some(current_timestamp_ms());
        Ok(event)
    }

    /// Stop accepting decisions. Used when the engine escalates.
    pub fn escalate(&mut self) {
        if self.status == RunStatus::Active {
            self.status = RunStatus::Escalated;
        }
    }

    /// Close the run. An escalated run stays escalated.
    pub fn finish(&mut self, status: RunStatus) -> Result<(), DomainError> {
        if status == RunStatus::Active {
            return Err(DomainError::InvalidRunTransition {
                run_id: self.id.clone(),
                status,
            });
        }
        if self.is_finished() {
            return Err(DomainError::RunClosed {
                run_id: self.id.clone(),
                status: self.status,
            });
        }
        if self.status == RunStatus::Active {
            self.status = status;
        }
        self.finished_at = Some(current_timestamp_ms());
        Ok(())
    }
}
