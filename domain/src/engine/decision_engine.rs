//! The per-run decision engine.
//!
//! [`DecisionEngine`] owns every piece of state one run needs (ledger,
//! cache, counters, breakers, call history) and mutates it only through
//! `&mut self`. Callers that share a run across threads wrap the engine in
//! a lock; check-and-reserve and ledger check-and-set are then atomic.
//!
//! # Evaluation order
//!
//! First applicable rule wins:
//!
//! 1. breaker open → `deny(circuit_open)`
//! 2. side-effect call already in the ledger → `deny(duplicate_side_effect)`
//! 3. read-only call with a fresh cache entry → `allow_from_cache`
//! 4. a call or cost ceiling would be exceeded → `deny(<ceiling>)`
//! 5. `allow`
//!
//! A denial past the escalation threshold becomes `escalate`. In shadow
//! mode every would-be denial is returned as `allow` with the would-be
//! outcome in `shadowed` and the reason unchanged.

use super::decision::{Decision, ProposedCall};
use super::hooks::{PolicyHooks, RewriteContext};
use crate::breaker::CircuitBreaker;
use crate::budget::{CommitReceipt, Reservation, RunCounters};
use crate::cache::{CachedEntry, CallCache};
use crate::core::error::DomainError;
use crate::core::ids::{CallEventId, RunId};
use crate::cost::{CallKind, Cost, TokenUsage};
use crate::ledger::{IdempotencyKey, IdempotencyLedger, KeyDeriver};
use crate::policy::{DecisionOutcome, PolicyConfig, ReasonCode};
use crate::report::RunReport;
use crate::run::{
    CallEvent, CallEventState, ExecutionOutcome, OutcomeAck, OutcomeReport, ReportedOutcome, Run,
    RunStatus,
};
use crate::util::current_timestamp_ms;
use serde_json::Value;
use std::collections::HashMap;

/// An allowed call waiting for its outcome.
#[derive(Debug)]
struct PendingCall {
    tool_name: String,
    reservation: Reservation,
    /// Ledger claim owned by this call.
    ledger_key: Option<IdempotencyKey>,
    /// Where a successful result is cached.
    cache_key: Option<IdempotencyKey>,
    probe: bool,
}

/// Result of running the evaluation rules, before enforcement.
enum Verdict {
    Allow(Reservation),
    Cached(CachedEntry),
    Deny {
        reason: ReasonCode,
        detail: Option<String>,
        replay_of: Option<CallEventId>,
    },
}

/// Decides proposed tool calls for one run and tracks their outcomes.
pub struct DecisionEngine {
    policy: PolicyConfig,
    hooks: PolicyHooks,
    keys: KeyDeriver,
    run: Run,
    ledger: IdempotencyLedger,
    cache: CallCache,
    counters: RunCounters,
    breaker: CircuitBreaker,
    pending: HashMap<CallEventId, PendingCall>,
    denials: u32,
    escalated: bool,
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("run_id", &self.run.id)
            .field("status", &self.run.status)
            .field("decisions", &self.run.decision_count())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl DecisionEngine {
    /// Start a run with default hooks derived from `policy`.
    pub fn new(run_id: RunId, policy: PolicyConfig) -> Result<Self, DomainError> {
        let hooks = PolicyHooks::from_policy(&policy);
        Self::with_hooks(run_id, policy, hooks)
    }

    /// Start a run. Fails if `policy` has any error-severity issue.
    pub fn with_hooks(
        run_id: RunId,
        policy: PolicyConfig,
        hooks: PolicyHooks,
    ) -> Result<Self, DomainError> {
        let policy = policy.validated()?;
        Ok(Self {
            keys: KeyDeriver::new(policy.secret_key.as_deref()),
            cache: CallCache::new(policy.cache),
            counters: RunCounters::from_policy(&policy),
            breaker: CircuitBreaker::new(policy.error_retry_threshold, policy.breaker_reset),
            ledger: IdempotencyLedger::new(),
            run: Run::new(run_id),
            pending: HashMap::new(),
            denials: 0,
            escalated: false,
            policy,
            hooks,
        })
    }

    // ==================== Decide ====================

    /// Decide what to do with a proposed call and record the call event.
    pub fn decide(&mut self, call: ProposedCall) -> Result<Decision, DomainError> {
        if self.run.status.is_closed() {
            return Err(self.closed_error());
        }

        let seq = self.run.next_seq();
        let call_id = CallEventId::for_run(&self.run.id, seq);
        let tool = call.tool_name.as_str();
        let side_effect = call
            .side_effect
            .unwrap_or_else(|| self.policy.is_side_effect(tool));
        let normalized = self.hooks.normalizer.normalize(tool, &call.args);
        let key = self.keys.derive(tool, &normalized);
        let estimated_cost =
            self.policy
                .cost_model
                .estimate(tool, CallKind::ToolCall, call.token_usage.as_ref());

        let mut decision = Decision {
            call_id: call_id.clone(),
            seq,
            tool_name: call.tool_name.clone(),
            outcome: DecisionOutcome::Allow,
            reason: ReasonCode::Allow,
            shadowed: None,
            side_effect,
            estimated_cost,
            idempotency_key: side_effect.then(|| key.clone()),
            adjusted_args: None,
            cached_result: None,
            replay_of: None,
            detail: None,
            breaker: None,
        };

        let mut state = CallEventState::Skipped;
        match self.evaluate(tool, side_effect, &key, estimated_cost, seq) {
            Verdict::Allow(reservation) => {
                self.admit(&call_id, tool, side_effect, &key, reservation);
                state = CallEventState::AwaitingOutcome;
            }
            Verdict::Cached(entry) => {
                decision.outcome = DecisionOutcome::AllowFromCache;
                decision.reason = ReasonCode::AllowFromCache;
                decision.cached_result = Some(entry.result);
                decision.replay_of = Some(entry.source_call);
            }
            Verdict::Deny {
                reason,
                detail,
                replay_of,
            } => {
                decision.reason = reason;
                decision.detail = detail;
                decision.replay_of = replay_of;
                if reason == ReasonCode::CircuitOpen {
                    decision.breaker = self.breaker.note_blocked(tool);
                }
                let would_be = self.denial_outcome(&call, side_effect, reason, &mut decision);

                if self.policy.enforce {
                    decision.outcome = would_be;
                    if would_be == DecisionOutcome::Escalate {
                        self.run.escalate();
                    }
                } else {
                    decision.shadowed = Some(would_be);
                    decision.adjusted_args = None;
                    let reservation = self.counters.force_reserve(tool, estimated_cost);
                    self.admit(&call_id, tool, side_effect, &key, reservation);
                    state = CallEventState::AwaitingOutcome;
                }
            }
        }

        self.run.append(CallEvent {
            id: call_id,
            seq,
            tool_name: call.tool_name,
            normalized_args: normalized,
            idempotency_key: decision.idempotency_key.clone(),
            side_effect,
            outcome: decision.outcome,
            reason: decision.reason,
            shadowed: decision.shadowed,
            estimated_cost,
            actual_cost: None,
            state,
            proposed_at: current_timestamp_ms(),
            resolved_at: None,
        });

        Ok(decision)
    }

    fn evaluate(
        &mut self,
        tool: &str,
        side_effect: bool,
        key: &IdempotencyKey,
        estimated_cost: Cost,
        seq: u64,
    ) -> Verdict {
        if self.breaker.should_block(tool) {
            return Verdict::Deny {
                reason: ReasonCode::CircuitOpen,
                detail: Some(format!("circuit breaker for '{}' is open", tool)),
                replay_of: None,
            };
        }

        if side_effect {
            if let Some(entry) = self.ledger.entry(key) {
                return Verdict::Deny {
                    reason: ReasonCode::DuplicateSideEffect,
                    detail: Some(format!("same side effect already issued by {}", entry.call_id)),
                    replay_of: Some(entry.call_id.clone()),
                };
            }
        } else if let Some(entry) = self.cache.lookup(key, seq) {
            return Verdict::Cached(entry.clone());
        }

        match self.counters.check_and_reserve(tool, estimated_cost) {
            Ok(reservation) => Verdict::Allow(reservation),
            Err(denial) => Verdict::Deny {
                reason: denial.reason(),
                detail: Some(denial.to_string()),
                replay_of: None,
            },
        }
    }

    /// Turn a denial into the outcome enforcement would return: `deny`,
    /// `rewrite` when the advisor offers arguments, or `escalate` past the
    /// threshold.
    fn denial_outcome(
        &mut self,
        call: &ProposedCall,
        side_effect: bool,
        reason: ReasonCode,
        decision: &mut Decision,
    ) -> DecisionOutcome {
        self.denials += 1;
        if let Some(threshold) = self.policy.escalation_threshold
            && self.denials > threshold
            && !self.escalated
        {
            self.escalated = true;
            decision.reason = ReasonCode::Escalate;
            decision.detail = Some(format!(
                "{} denials exceed escalation threshold {}",
                self.denials, threshold
            ));
            return DecisionOutcome::Escalate;
        }

        if !side_effect {
            let ctx = RewriteContext {
                tool_name: &call.tool_name,
                args: &call.args,
                reason,
                executed_calls: self.counters.executed_calls(&call.tool_name),
            };
            if let Some(adjusted) = self.hooks.rewrite.suggest(&ctx) {
                decision.adjusted_args = Some(adjusted);
                return DecisionOutcome::Rewrite;
            }
        }

        DecisionOutcome::Deny
    }

    fn admit(
        &mut self,
        call_id: &CallEventId,
        tool: &str,
        side_effect: bool,
        key: &IdempotencyKey,
        reservation: Reservation,
    ) {
        let ledger_key = (side_effect && self.ledger.record_if_new(key, call_id)).then(|| key.clone());
        let cache_key = (!side_effect).then(|| key.clone());
        let probe = self.breaker.begin_probe(tool);
        self.pending.insert(
            call_id.clone(),
            PendingCall {
                tool_name: tool.to_string(),
                reservation,
                ledger_key,
                cache_key,
                probe,
            },
        );
    }

    // ==================== Outcomes ====================

    /// Record what happened to an allowed call.
    pub fn report_outcome(
        &mut self,
        call_id: &CallEventId,
        report: OutcomeReport,
    ) -> Result<OutcomeAck, DomainError> {
        if self.run.is_finished() {
            return Err(self.closed_error());
        }
        let pending = match self.pending.remove(call_id) {
            Some(p) => p,
            None if self.run.event(call_id).is_some() => {
                return Err(DomainError::CallEventAlreadyResolved(call_id.clone()));
            }
            None => return Err(DomainError::UnknownCallEvent(call_id.clone())),
        };
        let PendingCall {
            tool_name,
            reservation,
            ledger_key,
            cache_key,
            probe,
        } = pending;

        let (receipt, breaker, state) = match report.outcome {
            ReportedOutcome::Success { result } => {
                if let Some(key) = &ledger_key {
                    self.ledger.mark_executed(key);
                }
                let receipt = self.counters.commit(reservation, report.actual_cost);
                let transition = self.breaker.record_success(&tool_name, probe);
                if let (Some(key), Some(result)) = (cache_key, result) {
                    let now = self.run.decision_count();
                    self.cache.store(key, result, call_id.clone(), now);
                }
                let state = CallEventState::Executed {
                    outcome: ExecutionOutcome::Success,
                    latency_ms: report.latency_ms,
                };
                (receipt, transition, state)
            }
            ReportedOutcome::Error(failure) => {
                if let Some(key) = &ledger_key {
                    self.ledger.release(key, call_id);
                }
                let receipt = self.counters.commit(reservation, report.actual_cost);
                let qualifying = self.hooks.classifier.is_qualifying(&tool_name, &failure);
                let transition = self.breaker.record_failure(&tool_name, qualifying);
                let state = CallEventState::Executed {
                    outcome: ExecutionOutcome::Error { code: failure.code },
                    latency_ms: report.latency_ms,
                };
                (receipt, transition, state)
            }
            ReportedOutcome::NotExecuted => {
                self.abandon(call_id, reservation, ledger_key.as_ref(), &tool_name, probe);
                let receipt = CommitReceipt {
                    charged: Cost::ZERO,
                    cumulative: self.counters.committed_cost(),
                    budget_warning: None,
                };
                (receipt, None, CallEventState::Skipped)
            }
        };

        let actual = state.is_executed().then_some(receipt.charged);
        self.run.resolve(call_id, state, actual)?;
        self.run.cumulative_cost = self.counters.committed_cost();

        Ok(OutcomeAck {
            call_id: call_id.clone(),
            tool_name,
            charged: receipt.charged,
            cumulative_cost: receipt.cumulative,
            budget_warning: receipt.budget_warning,
            breaker,
        })
    }

    /// Charge an LLM turn's token usage to the run budget.
    pub fn charge_model_usage(&mut self, usage: &TokenUsage) -> Result<CommitReceipt, DomainError> {
        if self.run.is_finished() {
            return Err(self.closed_error());
        }
        let cost = self
            .policy
            .cost_model
            .estimate("", CallKind::ModelTurn, Some(usage));
        let receipt = self.counters.charge(cost);
        self.run.model_cost += receipt.charged;
        self.run.cumulative_cost = self.counters.committed_cost();
        Ok(receipt)
    }

    /// Close the run. Calls still awaiting an outcome are treated as not
    /// executed.
    pub fn finish(&mut self, status: RunStatus) -> Result<RunReport, DomainError> {
        if status == RunStatus::Active {
            return Err(DomainError::InvalidRunTransition {
                run_id: self.run.id.clone(),
                status,
            });
        }
        if self.run.is_finished() {
            return Err(self.closed_error());
        }
        let mut outstanding: Vec<(CallEventId, PendingCall)> = self.pending.drain().collect();
        outstanding.sort_by_key(|(id, _)| self.run.event(id).map(|e| e.seq));
        for (call_id, pending) in outstanding {
            self.abandon(
                &call_id,
                pending.reservation,
                pending.ledger_key.as_ref(),
                &pending.tool_name,
                pending.probe,
            );
            self.run.resolve(&call_id, CallEventState::Skipped, None)?;
        }
        self.run.finish(status)?;
        Ok(self.report())
    }

    fn abandon(
        &mut self,
        call_id: &CallEventId,
        reservation: Reservation,
        ledger_key: Option<&IdempotencyKey>,
        tool_name: &str,
        probe: bool,
    ) {
        if let Some(key) = ledger_key {
            self.ledger.release(key, call_id);
        }
        self.counters.rollback(reservation);
        if probe {
            self.breaker.release_probe(tool_name);
        }
    }

    fn closed_error(&self) -> DomainError {
        DomainError::RunClosed {
            run_id: self.run.id.clone(),
            status: self.run.status,
        }
    }

    // ==================== Accessors ====================

    pub fn report(&self) -> RunReport {
        RunReport::from_run(&self.run, self.policy.enforce, self.breaker.open_tools())
    }

    pub fn run(&self) -> &Run {
        &self.run
    }

    pub fn run_id(&self) -> &RunId {
        &self.run.id
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn ledger(&self) -> &IdempotencyLedger {
        &self.ledger
    }

    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    pub fn denials(&self) -> u32 {
        self.denials
    }

    /// Normalized arguments of a recorded call.
    pub fn normalized_args(&self, call_id: &CallEventId) -> Option<&Value> {
        self.run.event(call_id).map(|e| &e.normalized_args)
    }
}
