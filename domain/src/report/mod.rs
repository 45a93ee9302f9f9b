//! Run report: the exportable summary of one run.

use crate::core::ids::RunId;
use crate::cost::Cost;
use crate::policy::{DecisionOutcome, ReasonCode};
use crate::run::{CallEventState, Run, RunStatus};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-tool totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolStats {
    pub proposed: u32,
    pub executed: u32,
    pub errors: u32,
    pub denied: u32,
    pub cached: u32,
    pub cost: Cost,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub status: RunStatus,
    pub started_at: u64,
    pub finished_at: Option<u64>,
    pub enforce: bool,

    pub calls_proposed: u32,
    pub calls_executed: u32,
    /// Denied or escalated.
    pub calls_denied: u32,
    pub calls_cached: u32,
    pub calls_rewritten: u32,
    pub escalations: u32,
    /// Would-be denials let through in shadow mode.
    pub shadowed: u32,
    pub duplicate_side_effects_prevented: u32,

    pub total_cost: Cost,
    pub model_cost: Cost,
    /// Estimated cost of calls the guard kept from running.
    pub cost_avoided: Cost,

    pub reason_histogram: BTreeMap<ReasonCode, u32>,
    pub per_tool: BTreeMap<String, ToolStats>,
    pub open_breakers: Vec<String>,
}

impl RunReport {
    pub fn from_run(run: &Run, enforce: bool, open_breakers: Vec<String>) -> Self {
        let mut report = Self {
            run_id: run.id.clone(),
            status: run.status,
            started_at: run.started_at,
            finished_at: run.finished_at,
            enforce,
            calls_proposed: 0,
            calls_executed: 0,
            calls_denied: 0,
            calls_cached: 0,
            calls_rewritten: 0,
            escalations: 0,
            shadowed: 0,
            duplicate_side_effects_prevented: 0,
            total_cost: run.cumulative_cost,
            model_cost: run.model_cost,
            cost_avoided: Cost::ZERO,
            reason_histogram: BTreeMap::new(),
            per_tool: BTreeMap::new(),
            open_breakers,
        };

        for event in run.events() {
            report.calls_proposed += 1;
            *report.reason_histogram.entry(event.reason).or_insert(0) += 1;
            let tool = report.per_tool.entry(event.tool_name.clone()).or_default();
            tool.proposed += 1;

            match event.outcome {
                DecisionOutcome::Allow => {}
                DecisionOutcome::AllowFromCache => {
                    report.calls_cached += 1;
                    tool.cached += 1;
                }
                DecisionOutcome::Deny => {
                    report.calls_denied += 1;
                    tool.denied += 1;
                }
                DecisionOutcome::Rewrite => {
                    report.calls_rewritten += 1;
                    tool.denied += 1;
                }
                DecisionOutcome::Escalate => {
                    report.calls_denied += 1;
                    report.escalations += 1;
                    tool.denied += 1;
                }
            }

            if event.is_shadowed() {
                report.shadowed += 1;
                if event.shadowed == Some(DecisionOutcome::Escalate) {
                    report.escalations += 1;
                }
            }
            if event.was_prevented() {
                report.cost_avoided += event.estimated_cost;
                if event.reason == ReasonCode::DuplicateSideEffect {
                    report.duplicate_side_effects_prevented += 1;
                }
            }

            if let CallEventState::Executed { .. } = event.state {
                report.calls_executed += 1;
                tool.executed += 1;
                if event.state.is_error() {
                    tool.errors += 1;
                }
                tool.cost += event.actual_cost.unwrap_or(Cost::ZERO);
            }
        }

        report
    }

    /// Count for one reason code (zero when absent).
    pub fn reason_count(&self, reason: ReasonCode) -> u32 {
        self.reason_histogram.get(&reason).copied().unwrap_or(0)
    }
}
