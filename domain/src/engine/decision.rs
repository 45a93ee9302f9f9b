//! Proposed calls and the decisions returned for them.

use crate::breaker::BreakerTransition;
use crate::core::ids::CallEventId;
use crate::cost::{Cost, TokenUsage};
use crate::ledger::IdempotencyKey;
use crate::policy::{DecisionOutcome, ReasonCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call the agent wants to make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedCall {
    pub tool_name: String,
    pub args: Value,
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
    /// Overrides the policy's side-effect classification for this call.
    #[serde(default)]
    pub side_effect: Option<bool>,
}

impl ProposedCall {
    pub fn new(tool_name: impl Into<String>, args: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
            token_usage: None,
            side_effect: None,
        }
    }

    pub fn with_token_usage(mut self, usage: TokenUsage) -> Self {
        self.token_usage = Some(usage);
        self
    }

    pub fn with_side_effect(mut self, side_effect: bool) -> Self {
        self.side_effect = Some(side_effect);
        self
    }
}

/// The engine's verdict on a [`ProposedCall`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub call_id: CallEventId,
    pub seq: u64,
    pub tool_name: String,
    pub outcome: DecisionOutcome,
    pub reason: ReasonCode,
    /// Shadow mode only: the outcome enforcement would have produced.
    pub shadowed: Option<DecisionOutcome>,
    pub side_effect: bool,
    pub estimated_cost: Cost,
    pub idempotency_key: Option<IdempotencyKey>,
    /// Suggested replacement arguments for a `rewrite`.
    pub adjusted_args: Option<Value>,
    /// Result served for `allow_from_cache`.
    #[serde(skip_serializing)]
    pub cached_result: Option<Value>,
    /// Earlier call this one duplicates (duplicate side effect or cache hit).
    pub replay_of: Option<CallEventId>,
    /// Human-readable explanation of a denial.
    pub detail: Option<String>,
    /// Breaker change triggered by this proposal (cooldown counting).
    pub breaker: Option<BreakerTransition>,
}

impl Decision {
    /// Whether the caller should execute the tool and report its outcome.
    pub fn permits_execution(&self) -> bool {
        self.outcome.permits_execution()
    }

    pub fn is_shadowed(&self) -> bool {
        self.shadowed.is_some()
    }

    /// Whether enforcement would have blocked this call.
    pub fn is_denial(&self) -> bool {
        self.reason.is_denial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_proposed_call_builder() {
        let call = ProposedCall::new("refund", json!({"order_id": "o1"}))
            .with_side_effect(true)
            .with_token_usage(TokenUsage::new(100, 20));
        assert_eq!(call.tool_name, "refund");
        assert_eq!(call.side_effect, Some(true));
        assert_eq!(call.token_usage, Some(TokenUsage::new(100, 20)));
    }

    #[test]
    fn test_proposed_call_from_json() {
        let call: ProposedCall =
            serde_json::from_value(json!({"tool_name": "search_kb", "args": {"query": "x"}}))
                .unwrap();
        assert_eq!(call.side_effect, None);
        assert_eq!(call.token_usage, None);
    }
}
