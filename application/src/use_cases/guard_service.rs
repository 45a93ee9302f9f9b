//! Guard service use case
//!
//! Hosts many guarded runs at once. Each run's [`DecisionEngine`] sits behind
//! its own mutex, so decisions within a run are serialized while distinct
//! runs proceed in parallel. Every decision, outcome and lifecycle change is
//! traced and written to the [`DecisionLogger`] port.

use crate::ports::decision_log::{DecisionLogger, DecisionRecord, NoDecisionLogger};
use aura_domain::{
    BreakerTransition, BudgetWarning, CallEventId, CommitReceipt, Cost, Decision, DecisionEngine,
    DecisionOutcome, DomainError, OutcomeAck, OutcomeReport, PolicyConfig, PolicyHooks,
    ProposedCall, ReportedOutcome, RunId, RunReport, RunStatus, TokenUsage,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors returned by [`GuardService`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    #[error("Unknown run: {0}")]
    UnknownRun(RunId),

    #[error("Run already exists: {0}")]
    DuplicateRun(RunId),

    #[error("Lock poisoned for {0}")]
    LockPoisoned(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

type EngineHandle = Arc<Mutex<DecisionEngine>>;

/// Registry of active guarded runs.
pub struct GuardService {
    default_policy: PolicyConfig,
    runs: RwLock<HashMap<RunId, EngineHandle>>,
    logger: Arc<dyn DecisionLogger>,
}

impl GuardService {
    pub fn new(default_policy: PolicyConfig) -> Self {
        Self {
            default_policy,
            runs: RwLock::new(HashMap::new()),
            logger: Arc::new(NoDecisionLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn DecisionLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn default_policy(&self) -> &PolicyConfig {
        &self.default_policy
    }

    // ==================== Run Lifecycle ====================

    /// Start a run under the default policy with a fresh id.
    pub fn start_run(&self) -> Result<RunId, GuardError> {
        let policy = self.default_policy.clone();
        let hooks = PolicyHooks::from_policy(&policy);
        self.start_run_with(new_run_id(), policy, hooks)
    }

    /// Start a run with an explicit id, policy and hooks.
    pub fn start_run_with(
        &self,
        run_id: RunId,
        policy: PolicyConfig,
        hooks: PolicyHooks,
    ) -> Result<RunId, GuardError> {
        let enforce = policy.enforce;
        let max_cost = policy.max_cost_per_run;
        let side_effect_tools: Vec<String> = policy.side_effect_tools.iter().cloned().collect();

        let engine = DecisionEngine::with_hooks(run_id.clone(), policy, hooks).inspect_err(|e| {
            warn!("Rejected run {}: {}", run_id, e);
        })?;

        {
            let mut runs = self
                .runs
                .write()
                .map_err(|_| GuardError::LockPoisoned("run registry".to_string()))?;
            if runs.contains_key(&run_id) {
                return Err(GuardError::DuplicateRun(run_id));
            }
            runs.insert(run_id.clone(), Arc::new(Mutex::new(engine)));
        }

        info!(
            "Started run {} ({} mode)",
            run_id,
            if enforce { "enforce" } else { "shadow" }
        );
        self.logger.log(DecisionRecord::new(
            "run_started",
            json!({
                "run_id": run_id,
                "enforce": enforce,
                "max_cost_per_run": max_cost,
                "side_effect_tools": side_effect_tools,
            }),
        ));
        Ok(run_id)
    }

    /// Close a run and drop its state, returning the final report.
    pub fn finish_run(&self, run_id: &RunId, status: RunStatus) -> Result<RunReport, GuardError> {
        let handle = self.engine(run_id)?;
        let report = {
            let mut engine = lock(&handle, run_id)?;
            engine.finish(status)?
        };

        self.runs
            .write()
            .map_err(|_| GuardError::LockPoisoned("run registry".to_string()))?
            .remove(run_id);

        info!(
            "Finished run {} as {}: {} proposed, {} executed, {} denied, {} cached, cost {}",
            run_id,
            report.status,
            report.calls_proposed,
            report.calls_executed,
            report.calls_denied,
            report.calls_cached,
            report.total_cost
        );
        self.logger.log(DecisionRecord::new(
            "run_finished",
            json!({
                "run_id": run_id,
                "status": report.status,
                "calls_proposed": report.calls_proposed,
                "calls_executed": report.calls_executed,
                "calls_denied": report.calls_denied,
                "calls_cached": report.calls_cached,
                "calls_rewritten": report.calls_rewritten,
                "escalations": report.escalations,
                "total_cost_usd": report.total_cost,
                "cost_avoided_usd": report.cost_avoided,
            }),
        ));
        Ok(report)
    }

    /// Report for a run that is still active.
    pub fn snapshot(&self, run_id: &RunId) -> Result<RunReport, GuardError> {
        let handle = self.engine(run_id)?;
        let engine = lock(&handle, run_id)?;
        Ok(engine.report())
    }

    /// Ids of all runs not yet finished, sorted.
    pub fn active_runs(&self) -> Vec<RunId> {
        let mut ids: Vec<RunId> = self
            .runs
            .read()
            .map(|runs| runs.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    // ==================== Decision API ====================

    pub fn decide(&self, run_id: &RunId, call: ProposedCall) -> Result<Decision, GuardError> {
        let handle = self.engine(run_id)?;
        let args_keys = arg_keys(&call.args);
        let decision = {
            let mut engine = lock(&handle, run_id)?;
            engine.decide(call)
        }
        .inspect_err(|e| warn!("Decision refused for run {}: {}", run_id, e))?;

        self.trace_decision(run_id, &decision);
        self.logger
            .log(decision_record(run_id, &decision, args_keys));
        if let Some(transition) = decision.breaker {
            self.log_breaker(run_id, &decision.tool_name, transition);
        }
        Ok(decision)
    }

    pub fn report_outcome(
        &self,
        run_id: &RunId,
        call_id: &CallEventId,
        report: OutcomeReport,
    ) -> Result<OutcomeAck, GuardError> {
        let handle = self.engine(run_id)?;
        let status = outcome_status(&report.outcome);
        let error_code = match &report.outcome {
            ReportedOutcome::Error(failure) => Some(failure.code.clone()),
            _ => None,
        };
        let latency_ms = report.latency_ms;

        let ack = {
            let mut engine = lock(&handle, run_id)?;
            engine.report_outcome(call_id, report)
        }
        .inspect_err(|e| warn!("Outcome rejected for {}: {}", call_id, e))?;

        debug!(
            "Outcome {} for {} ({}): charged {}, cumulative {}",
            status, call_id, ack.tool_name, ack.charged, ack.cumulative_cost
        );
        self.logger.log(DecisionRecord::new(
            "outcome",
            json!({
                "run_id": run_id,
                "call_id": call_id,
                "tool": ack.tool_name,
                "status": status,
                "error_code": error_code,
                "latency_ms": latency_ms,
                "charged_usd": ack.charged,
                "cumulative_cost_usd": ack.cumulative_cost,
            }),
        ));
        if let Some(transition) = ack.breaker {
            self.log_breaker(run_id, &ack.tool_name, transition);
        }
        if let Some(warning) = ack.budget_warning {
            self.log_budget_warning(run_id, &warning);
        }
        Ok(ack)
    }

    /// Charge an LLM turn to a run's budget.
    pub fn charge_model_usage(
        &self,
        run_id: &RunId,
        usage: TokenUsage,
    ) -> Result<CommitReceipt, GuardError> {
        let handle = self.engine(run_id)?;
        let receipt = {
            let mut engine = lock(&handle, run_id)?;
            engine.charge_model_usage(&usage)?
        };

        debug!(
            "Model turn for run {}: {} in / {} out tokens, charged {}",
            run_id, usage.input_tokens, usage.output_tokens, receipt.charged
        );
        self.logger.log(DecisionRecord::new(
            "model_usage",
            json!({
                "run_id": run_id,
                "input_tokens": usage.input_tokens,
                "output_tokens": usage.output_tokens,
                "charged_usd": receipt.charged,
                "cumulative_cost_usd": receipt.cumulative,
            }),
        ));
        if let Some(warning) = receipt.budget_warning {
            self.log_budget_warning(run_id, &warning);
        }
        Ok(receipt)
    }

    // ==================== Internals ====================

    fn engine(&self, run_id: &RunId) -> Result<EngineHandle, GuardError> {
        let runs = self
            .runs
            .read()
            .map_err(|_| GuardError::LockPoisoned("run registry".to_string()))?;
        runs.get(run_id)
            .cloned()
            .ok_or_else(|| GuardError::UnknownRun(run_id.clone()))
    }

    fn trace_decision(&self, run_id: &RunId, decision: &Decision) {
        match (decision.outcome, decision.shadowed) {
            (DecisionOutcome::Escalate, _) => warn!(
                "Run {} escalated at {} ({})",
                run_id, decision.call_id, decision.tool_name
            ),
            (DecisionOutcome::Deny | DecisionOutcome::Rewrite, _) => warn!(
                "{} {} for {}: {}",
                decision.outcome,
                decision.tool_name,
                decision.call_id,
                decision.reason
            ),
            (_, Some(would_be)) => info!(
                "Shadow {} for {} ({}): {}",
                would_be, decision.tool_name, decision.call_id, decision.reason
            ),
            _ => debug!(
                "{} {} for {}",
                decision.outcome, decision.tool_name, decision.call_id
            ),
        }
    }

    fn log_breaker(&self, run_id: &RunId, tool: &str, transition: BreakerTransition) {
        match transition {
            BreakerTransition::Opened | BreakerTransition::Reopened => {
                warn!("Circuit breaker for {} {} in run {}", tool, transition, run_id)
            }
            _ => info!("Circuit breaker for {} {} in run {}", tool, transition, run_id),
        }
        self.logger.log(DecisionRecord::new(
            "breaker_transition",
            json!({
                "run_id": run_id,
                "tool": tool,
                "transition": transition,
            }),
        ));
    }

    fn log_budget_warning(&self, run_id: &RunId, warning: &BudgetWarning) {
        warn!(
            "Run {} spent {} of its {} budget",
            run_id, warning.cumulative, warning.limit
        );
        self.logger.log(DecisionRecord::new(
            "budget_warning",
            json!({
                "run_id": run_id,
                "threshold_usd": warning.threshold,
                "limit_usd": warning.limit,
                "cumulative_cost_usd": warning.cumulative,
            }),
        ));
    }
}

fn new_run_id() -> RunId {
    RunId::new(format!("run-{}", uuid::Uuid::new_v4().simple()))
}

fn lock<'a>(
    handle: &'a EngineHandle,
    run_id: &RunId,
) -> Result<std::sync::MutexGuard<'a, DecisionEngine>, GuardError> {
    handle
        .lock()
        .map_err(|_| GuardError::LockPoisoned(run_id.to_string()))
}

fn outcome_status(outcome: &ReportedOutcome) -> &'static str {
    match outcome {
        ReportedOutcome::Success { .. } => "success",
        ReportedOutcome::Error(_) => "error",
        ReportedOutcome::NotExecuted => "not_executed",
    }
}

/// Top-level argument names, sorted. Values are never logged.
fn arg_keys(args: &Value) -> Vec<String> {
    let mut keys: Vec<String> = args
        .as_object()
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default();
    keys.sort();
    keys
}

fn decision_record(run_id: &RunId, decision: &Decision, args_keys: Vec<String>) -> DecisionRecord {
    let cost_avoided: Option<Cost> =
        (!decision.permits_execution()).then_some(decision.estimated_cost);
    DecisionRecord::new(
        "decision",
        json!({
            "run_id": run_id,
            "call_id": decision.call_id,
            "seq": decision.seq,
            "tool": decision.tool_name,
            "outcome": decision.outcome,
            "reason": decision.reason,
            "shadowed": decision.shadowed,
            "side_effect": decision.side_effect,
            "idempotency_key": decision.idempotency_key,
            "args_keys": args_keys,
            "estimated_cost_usd": decision.estimated_cost,
            "estimated_cost_avoided": cost_avoided,
            "replay_of": decision.replay_of,
            "detail": decision.detail,
        }),
    )
}
