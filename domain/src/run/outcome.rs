//! Outcome reports sent back by the caller after acting on a decision.

use crate::breaker::BreakerTransition;
use crate::budget::BudgetWarning;
use crate::core::ids::CallEventId;
use crate::cost::Cost;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A failed tool execution.
///
/// The `code` drives breaker qualification; common codes:
///
/// | Code | Typical cause |
/// |------|---------------|
/// | `TIMEOUT` | Tool did not answer in time |
/// | `RATE_LIMITED` | Upstream throttling |
/// | `INVALID_ARGUMENT` | Caller passed bad arguments |
/// | `EXECUTION_FAILED` | Anything else |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub code: String,
    pub message: String,
}

impl ToolFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::new("TIMEOUT", format!("Operation timed out: {}", operation.into()))
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("RATE_LIMITED", message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new("INVALID_ARGUMENT", message)
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new("EXECUTION_FAILED", message)
    }
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// What actually happened to an allowed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportedOutcome {
    /// The tool ran and succeeded. `result` feeds the call cache.
    Success { result: Option<Value> },
    /// The tool ran and failed.
    Error(ToolFailure),
    /// The caller decided not to run the tool after all.
    NotExecuted,
}

/// An outcome plus what it cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub outcome: ReportedOutcome,
    /// Observed cost; the decision's estimate is charged when absent.
    pub actual_cost: Option<Cost>,
    pub latency_ms: Option<u64>,
}

impl OutcomeReport {
    pub fn new(outcome: ReportedOutcome) -> Self {
        Self {
            outcome,
            actual_cost: None,
            latency_ms: None,
        }
    }

    pub fn success(result: Option<Value>) -> Self {
        Self::new(ReportedOutcome::Success { result })
    }

    pub fn error(failure: ToolFailure) -> Self {
        Self::new(ReportedOutcome::Error(failure))
    }

    pub fn not_executed() -> Self {
        Self::new(ReportedOutcome::NotExecuted)
    }

    pub fn with_cost(mut self, cost: Cost) -> Self {
        self.actual_cost = Some(cost);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// The engine's acknowledgement of an outcome report.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeAck {
    pub call_id: CallEventId,
    pub tool_name: String,
    /// Cost charged for this call (zero when not executed).
    pub charged: Cost,
    pub cumulative_cost: Cost,
    pub budget_warning: Option<BudgetWarning>,
    pub breaker: Option<BreakerTransition>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builders() {
        let report = OutcomeReport::success(Some(json!({"ok": true})))
            .with_cost(Cost::from_micros(10))
            .with_latency(25);
        assert_eq!(report.actual_cost, Some(Cost::from_micros(10)));
        assert_eq!(report.latency_ms, Some(25));
        assert!(matches!(report.outcome, ReportedOutcome::Success { .. }));
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            ToolFailure::timeout("search_kb").to_string(),
            "[TIMEOUT] Operation timed out: search_kb"
        );
    }

    #[test]
    fn test_outcome_serde_shape() {
        let json = serde_json::to_value(ReportedOutcome::NotExecuted).unwrap();
        assert_eq!(json, json!({"status": "not_executed"}));
        let json = serde_json::to_value(ReportedOutcome::Error(ToolFailure::rate_limited("slow down")))
            .unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "RATE_LIMITED");
    }
}
