//! Cost model: estimated USD cost of a tool call or model turn.
//!
//! The same [`CostModel::estimate`] is used for real-time budget checks and
//! for run reports, so it must stay pure: no clocks, no randomness, no
//! state beyond the configured prices.

use super::money::Cost;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What kind of call is being priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// A tool invocation: per-tool price plus any token usage.
    ToolCall,
    /// An LLM turn: token usage only.
    ModelTurn,
}

/// Token counts attached to a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }
}

/// Configured prices used to estimate call cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostModel {
    /// Price charged for a tool with no entry in `per_tool_cost`.
    pub default_tool_call_cost: Cost,
    /// Per-tool price overrides.
    #[serde(default)]
    pub per_tool_cost: BTreeMap<String, Cost>,
    pub input_token_cost_per_1k: Cost,
    pub output_token_cost_per_1k: Cost,
}

impl Default for CostModel {
    /// $0.04 per tool call, no token pricing.
    fn default() -> Self {
        Self {
            default_tool_call_cost: Cost::from_micros(40_000),
            per_tool_cost: BTreeMap::new(),
            input_token_cost_per_1k: Cost::ZERO,
            output_token_cost_per_1k: Cost::ZERO,
        }
    }
}

impl CostModel {
    // ==================== Builder Methods ====================

    pub fn with_default_tool_call_cost(mut self, cost: Cost) -> Self {
        self.default_tool_call_cost = cost;
        self
    }

    pub fn with_tool_cost(mut self, tool_name: impl Into<String>, cost: Cost) -> Self {
        self.per_tool_cost.insert(tool_name.into(), cost);
        self
    }

    pub fn with_token_costs(mut self, input_per_1k: Cost, output_per_1k: Cost) -> Self {
        self.input_token_cost_per_1k = input_per_1k;
        self.output_token_cost_per_1k = output_per_1k;
        self
    }

    // ==================== Estimation ====================

    /// Estimate the cost of a call.
    pub fn estimate(
        &self,
        tool_name: &str,
        kind: CallKind,
        token_usage: Option<&TokenUsage>,
    ) -> Cost {
        let base = match kind {
            CallKind::ToolCall => self.tool_price(tool_name),
            CallKind::ModelTurn => Cost::ZERO,
        };
        base + token_usage.map_or(Cost::ZERO, |usage| self.token_cost(usage))
    }

    /// Flat price of one call to `tool_name`.
    pub fn tool_price(&self, tool_name: &str) -> Cost {
        self.per_tool_cost
            .get(tool_name)
            .copied()
            .unwrap_or(self.default_tool_call_cost)
    }

    pub fn token_cost(&self, usage: &TokenUsage) -> Cost {
        per_1k(usage.input_tokens, self.input_token_cost_per_1k)
            + per_1k(usage.output_tokens, self.output_token_cost_per_1k)
    }
}

/// `tokens × price / 1000`, rounded half-up to the micro-dollar.
fn per_1k(tokens: u64, price_per_1k: Cost) -> Cost {
    let micros = i128::from(price_per_1k.micros()) * i128::from(tokens);
    let rounded = (micros + 500).div_euclid(1000);
    Cost::from_micros(i64::try_from(rounded).unwrap_or(i64::MAX))
}
