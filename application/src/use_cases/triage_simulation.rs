//! Triage simulation use case
//!
//! Replays a scripted misbehaving support agent three times: with no
//! protection, with a naive call limit, and through the guard. The agent
//! issues the same refund three times, jitters its knowledge-base query and
//! then loops on apologies before finalizing.

use super::guard_service::{GuardError, GuardService};
use crate::config::SimulationParams;
use crate::ports::decision_log::{DecisionLogger, NoDecisionLogger};
use aura_domain::{
    Cost, DecisionOutcome, OutcomeReport, PolicyHooks, ProposedCall, RunId, RunReport, RunStatus,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

/// One step of the scripted agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Tool { name: String, args: Value },
    ModelTurn { text: String },
}

impl ScriptStep {
    fn tool(name: &str, args: Value) -> Self {
        ScriptStep::Tool {
            name: name.to_string(),
            args,
        }
    }

    fn model(text: &str) -> Self {
        ScriptStep::ModelTurn {
            text: text.to_string(),
        }
    }
}

/// The misbehaving agent: triple refund, query jitter, apology loop.
pub fn triage_script() -> Vec<ScriptStep> {
    let mut steps = Vec::new();

    for _ in 0..3 {
        steps.push(ScriptStep::tool(
            "refund",
            json!({"order_id": "o1", "amount": 10}),
        ));
    }

    let queries = [
        "refund policy",
        "refund policy EU",
        "refund policy Germany",
        "refund policy EU Germany",
        "refund policy EU Germany 2024",
        "refund policy EU Germany 2024",
        "refund policy EU Germany 2024",
        "refund policy EU Germany 2024",
    ];
    for query in queries {
        steps.push(ScriptStep::tool("search_kb", json!({ "query": query })));
    }

    for _ in 0..6 {
        steps.push(ScriptStep::model(
            "I apologize for the inconvenience. We're looking into it.",
        ));
    }
    steps.push(ScriptStep::model(
        r#"{"action":"finalize","reason":"ready","reply_draft":"Your refund has been processed.","escalation":null}"#,
    ));
    steps
}

/// Canned tool results for the script.
fn mock_execute(name: &str, args: &Value) -> Value {
    match name {
        "refund" => {
            let mut result = json!({"status": "refunded"});
            if let (Some(out), Some(input)) = (result.as_object_mut(), args.as_object()) {
                out.extend(input.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            result
        }
        "search_kb" => {
            let query = args.get("query").and_then(Value::as_str).unwrap_or_default();
            json!({ "hits": [format!("KB:{}", query)] })
        }
        _ => json!({"status": "ok"}),
    }
}

/// Outcome of one simulated variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantResult {
    pub variant: String,
    pub tool_calls: u32,
    pub side_effects: u32,
    pub blocks: u32,
    pub cache_hits: u32,
    pub rewrites: u32,
    #[serde(rename = "cost_usd")]
    pub cost: Cost,
    pub terminated: Option<String>,
}

impl VariantResult {
    fn new(variant: impl Into<String>) -> Self {
        Self {
            variant: variant.into(),
            tool_calls: 0,
            side_effects: 0,
            blocks: 0,
            cache_hits: 0,
            rewrites: 0,
            cost: Cost::ZERO,
            terminated: None,
        }
    }
}

/// Guarded variant measured against the unprotected baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationComparison {
    #[serde(rename = "cost_saved_usd")]
    pub cost_saved: Cost,
    pub cost_saved_pct: f64,
    pub side_effects_prevented: i64,
    pub rewrites_issued: u32,
}

impl SimulationComparison {
    fn between(baseline: &VariantResult, guarded: &VariantResult) -> Self {
        let cost_saved = baseline.cost.saturating_sub(guarded.cost);
        let pct = if baseline.cost.is_zero() {
            0.0
        } else {
            cost_saved.micros() as f64 / baseline.cost.micros() as f64 * 100.0
        };
        Self {
            cost_saved,
            cost_saved_pct: (pct * 10.0).round() / 10.0,
            side_effects_prevented: i64::from(baseline.side_effects)
                - i64::from(guarded.side_effects),
            rewrites_issued: guarded.rewrites,
        }
    }
}

/// Results of all three variants.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub tool_call_cost: Cost,
    pub no_guard: VariantResult,
    pub call_limit: VariantResult,
    pub aura_guard: VariantResult,
    pub comparison: SimulationComparison,
    /// Final report of the guarded run.
    pub guard_run: RunReport,
}

impl SimulationReport {
    pub fn variants(&self) -> [&VariantResult; 3] {
        [&self.no_guard, &self.call_limit, &self.aura_guard]
    }

    /// Machine-readable report, stamped with the current UTC time.
    pub fn to_json(&self, version: &str) -> Value {
        json!({
            "type": "aura_guard_demo",
            "version": version,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "tool_call_cost_usd": self.tool_call_cost,
            "variants": {
                "no_guard": self.no_guard,
                "call_limit": self.call_limit,
                "aura_guard": self.aura_guard,
            },
            "comparison": self.comparison,
        })
    }
}

/// Runs the scripted agent under each variant.
pub struct TriageSimulation {
    params: SimulationParams,
    logger: Arc<dyn DecisionLogger>,
}

impl TriageSimulation {
    pub fn new(params: SimulationParams) -> Self {
        Self {
            params,
            logger: Arc::new(NoDecisionLogger),
        }
    }

    /// Decision log for the guarded variant.
    pub fn with_logger(mut self, logger: Arc<dyn DecisionLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn run(&self) -> Result<SimulationReport, GuardError> {
        let script = triage_script();
        let no_guard = self.run_no_guard(&script);
        let call_limit = self.run_call_limit(&script);
        let (aura_guard, guard_run) = self.run_guarded(&script)?;
        let comparison = SimulationComparison::between(&no_guard, &aura_guard);

        info!(
            "Simulation finished: guard saved {} ({}%), prevented {} side effects",
            comparison.cost_saved, comparison.cost_saved_pct, comparison.side_effects_prevented
        );

        Ok(SimulationReport {
            tool_call_cost: self.params.tool_call_cost,
            no_guard,
            call_limit,
            aura_guard,
            comparison,
            guard_run,
        })
    }

    fn run_no_guard(&self, script: &[ScriptStep]) -> VariantResult {
        let mut row = VariantResult::new("no_guard");
        for step in script {
            if let ScriptStep::Tool { name, args } = step {
                self.execute_unguarded(&mut row, name, args);
            }
        }
        row
    }

    fn run_call_limit(&self, script: &[ScriptStep]) -> VariantResult {
        let limit = self.params.call_limit;
        let mut row = VariantResult::new(format!("call_limit({})", limit));
        for step in script {
            if let ScriptStep::Tool { name, args } = step {
                if row.tool_calls >= limit {
                    row.terminated = Some("call_limit".to_string());
                    break;
                }
                self.execute_unguarded(&mut row, name, args);
            }
        }
        row
    }

    fn execute_unguarded(&self, row: &mut VariantResult, name: &str, args: &Value) {
        mock_execute(name, args);
        row.tool_calls += 1;
        row.cost += self.params.tool_call_cost;
        if self.params.guard_policy.is_side_effect(name) {
            row.side_effects += 1;
        }
    }

    fn run_guarded(
        &self,
        script: &[ScriptStep],
    ) -> Result<(VariantResult, RunReport), GuardError> {
        let policy = self.params.guard_policy.clone();
        let hooks = PolicyHooks::from_policy(&policy);
        let service = GuardService::new(policy.clone()).with_logger(self.logger.clone());
        let run_id = service.start_run_with(RunId::new("triage-demo"), policy, hooks)?;

        let mut row = VariantResult::new("aura_guard");
        for step in script {
            if row.terminated.is_some() {
                break;
            }
            match step {
                ScriptStep::Tool { name, args } => {
                    let decision =
                        service.decide(&run_id, ProposedCall::new(name.clone(), args.clone()))?;
                    match decision.outcome {
                        DecisionOutcome::Allow => {
                            let result = mock_execute(name, args);
                            service.report_outcome(
                                &run_id,
                                &decision.call_id,
                                OutcomeReport::success(Some(result)),
                            )?;
                            row.tool_calls += 1;
                            if decision.side_effect {
                                row.side_effects += 1;
                            }
                        }
                        DecisionOutcome::AllowFromCache => row.cache_hits += 1,
                        DecisionOutcome::Deny => row.blocks += 1,
                        DecisionOutcome::Rewrite => row.rewrites += 1,
                        DecisionOutcome::Escalate => {
                            row.terminated = Some(DecisionOutcome::Escalate.to_string())
                        }
                    }
                }
                ScriptStep::ModelTurn { .. } => {
                    service.charge_model_usage(&run_id, self.params.model_turn_usage)?;
                }
            }
        }

        let report = service.finish_run(&run_id, RunStatus::Completed)?;
        row.cost = report.total_cost;
        Ok((row, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::decision_log::InMemoryDecisionLog;
    use aura_domain::CostModel;

    #[test]
    fn test_script_shape() {
        let script = triage_script();
        assert_eq!(script.len(), 18);
        let tools = script
            .iter()
            .filter(|s| matches!(s, ScriptStep::Tool { .. }))
            .count();
        assert_eq!(tools, 11);
    }

    #[test]
    fn test_mock_execute() {
        let refund = mock_execute("refund", &json!({"order_id": "o1", "amount": 10}));
        assert_eq!(
            refund,
            json!({"status": "refunded", "order_id": "o1", "amount": 10})
        );
        let search = mock_execute("search_kb", &json!({"query": "x"}));
        assert_eq!(search, json!({"hits": ["KB:x"]}));
    }

    #[test]
    fn test_default_simulation_numbers() {
        let report = TriageSimulation::new(SimulationParams::default())
            .run()
            .unwrap();

        assert_eq!(report.no_guard.tool_calls, 11);
        assert_eq!(report.no_guard.side_effects, 3);
        assert_eq!(report.no_guard.cost, Cost::from_micros(440_000));
        assert_eq!(report.no_guard.terminated, None);

        assert_eq!(report.call_limit.variant, "call_limit(5)");
        assert_eq!(report.call_limit.tool_calls, 5);
        assert_eq!(report.call_limit.side_effects, 3);
        assert_eq!(report.call_limit.cost, Cost::from_micros(200_000));
        assert_eq!(report.call_limit.terminated.as_deref(), Some("call_limit"));

        let guarded = &report.aura_guard;
        assert_eq!(guarded.tool_calls, 6);
        assert_eq!(guarded.side_effects, 1);
        assert_eq!(guarded.blocks, 2);
        assert_eq!(guarded.cache_hits, 3);
        assert_eq!(guarded.rewrites, 0);
        assert_eq!(guarded.cost, Cost::from_micros(240_000));
        assert_eq!(guarded.terminated, None);

        assert_eq!(report.comparison.cost_saved, Cost::from_micros(200_000));
        assert_eq!(report.comparison.cost_saved_pct, 45.5);
        assert_eq!(report.comparison.side_effects_prevented, 2);
        assert_eq!(report.comparison.rewrites_issued, 0);

        let run = &report.guard_run;
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.calls_proposed, 11);
        assert_eq!(run.duplicate_side_effects_prevented, 2);
        assert_eq!(run.cost_avoided, Cost::from_micros(200_000));
    }

    #[test]
    fn test_model_turns_charged_to_guarded_run() {
        let mut params = SimulationParams::default();
        params.guard_policy.cost_model = CostModel::default()
            .with_default_tool_call_cost(params.tool_call_cost)
            .with_token_costs(Cost::from_micros(1_000), Cost::ZERO);
        let report = TriageSimulation::new(params).run().unwrap();
        // 7 turns of 400 input tokens at $0.001 per 1k
        assert_eq!(
            report.aura_guard.cost,
            Cost::from_micros(240_000 + 7 * 400)
        );
    }

    #[test]
    fn test_guarded_run_is_logged() {
        let log = Arc::new(InMemoryDecisionLog::new());
        TriageSimulation::new(SimulationParams::default())
            .with_logger(log.clone())
            .run()
            .unwrap();
        assert_eq!(log.find("decision").len(), 11);
        assert_eq!(log.find("model_usage").len(), 7);
        assert_eq!(log.find("run_finished").len(), 1);
        assert_eq!(log.cost_avoided(), Cost::from_micros(200_000));
    }

    #[test]
    fn test_json_report() {
        let report = TriageSimulation::new(SimulationParams::default())
            .run()
            .unwrap();
        let json = report.to_json("0.1.0");
        assert_eq!(json["type"], "aura_guard_demo");
        assert_eq!(json["version"], "0.1.0");
        assert_eq!(json["tool_call_cost_usd"], 0.04);
        assert_eq!(json["variants"]["aura_guard"]["cache_hits"], 3);
        assert_eq!(json["variants"]["call_limit"]["terminated"], "call_limit");
        assert_eq!(json["variants"]["no_guard"]["terminated"], Value::Null);
        assert_eq!(json["comparison"]["cost_saved_pct"], 45.5);
        assert_eq!(json["comparison"]["side_effects_prevented"], 2);
        assert!(json["timestamp"].as_str().is_some());
    }
}
