//! Simulation parameters: inputs of the scripted triage comparison.
//!
//! [`SimulationParams`] groups the static parameters that control
//! [`TriageSimulation`](crate::use_cases::triage_simulation::TriageSimulation).
//! These are application-layer concerns, not domain policy: the guarded
//! variant still runs under an ordinary [`PolicyConfig`].

use aura_domain::{Cost, CostModel, PolicyConfig, TokenUsage};

/// Parameters of the three-way triage comparison.
///
/// | Variant | Behavior |
/// |---------|----------|
/// | `no_guard` | executes every proposed tool call |
/// | `call_limit` | stops the run after `call_limit` tool calls |
/// | `aura_guard` | every call goes through the guard under `guard_policy` |
#[derive(Debug, Clone)]
pub struct SimulationParams {
    /// Flat price of one tool call, used by all variants.
    pub tool_call_cost: Cost,
    /// Hard stop for the naive `call_limit` variant.
    pub call_limit: u32,
    /// Policy of the guarded variant.
    pub guard_policy: PolicyConfig,
    /// Tokens charged per scripted model turn.
    pub model_turn_usage: TokenUsage,
}

impl Default for SimulationParams {
    fn default() -> Self {
        let tool_call_cost = Cost::from_micros(40_000);
        Self {
            tool_call_cost,
            call_limit: 5,
            guard_policy: PolicyConfig::default()
                .with_side_effect_tools(["refund", "send_reply", "cancel"])
                .with_max_cost_per_run(Some(Cost::from_micros(500_000)))
                .with_cost_model(CostModel::default().with_default_tool_call_cost(tool_call_cost))
                .with_secret_key(Some("aura_guard_demo_key".to_string())),
            model_turn_usage: TokenUsage::new(400, 60),
        }
    }
}

impl SimulationParams {
    // ==================== Builder Methods ====================

    /// Set the flat tool price for every variant, including the guard's
    /// cost model.
    pub fn with_tool_call_cost(mut self, cost: Cost) -> Self {
        self.tool_call_cost = cost;
        self.guard_policy.cost_model.default_tool_call_cost = cost;
        self
    }

    pub fn with_call_limit(mut self, limit: u32) -> Self {
        self.call_limit = limit;
        self
    }

    pub fn with_guard_policy(mut self, policy: PolicyConfig) -> Self {
        self.guard_policy = policy;
        self
    }

    pub fn with_model_turn_usage(mut self, usage: TokenUsage) -> Self {
        self.model_turn_usage = usage;
        self
    }
}
