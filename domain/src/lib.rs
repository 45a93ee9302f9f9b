//! Domain layer for aura-guard
//!
//! This crate contains the guard's decision logic and its value objects.
//! It performs no I/O and has no dependencies on infrastructure or
//! presentation concerns.
//!
//! # Core Concepts
//!
//! ## Run
//!
//! A run is one guarded agent task. Every tool call the agent proposes is
//! recorded as a call event in the run, together with the decision made
//! for it and the outcome the caller reported.
//!
//! ## Decision Engine
//!
//! [`DecisionEngine`] decides each proposed call against the run's
//! [`PolicyConfig`]:
//!
//! - **Idempotency ledger**: a side effect (refund, cancel, send) runs once
//! - **Call cache**: identical read-only calls are served from memory
//! - **Counters**: per-tool, total, and cost ceilings
//! - **Circuit breaker**: tools that keep failing are cut off
//!
//! Denials are values, not errors. In shadow mode (`enforce = false`) every
//! decision is computed and recorded but nothing is blocked.

pub mod breaker;
pub mod budget;
pub mod cache;
pub mod core;
pub mod cost;
pub mod engine;
pub mod ledger;
pub mod policy;
pub mod report;
pub mod run;
pub mod util;

// Re-export commonly used types
pub use breaker::{
    AllErrorsQualify, BreakerState, BreakerTransition, CircuitBreaker, CircuitState,
    CodeListClassifier, ErrorClassifier,
};
pub use budget::{BudgetDenial, BudgetWarning, CommitReceipt, Reservation, RunCounters};
pub use cache::{CachedEntry, CallCache};
pub use core::{
    error::DomainError,
    ids::{CallEventId, RunId},
};
pub use cost::{CallKind, Cost, CostModel, InvalidCost, TokenUsage};
pub use engine::{
    Decision, DecisionEngine, NoRewrite, PolicyHooks, ProposedCall, RewriteAdvisor,
    RewriteContext,
};
pub use ledger::{
    ArgsNormalizer, CanonicalArgsNormalizer, IdempotencyKey, IdempotencyLedger, KeyDeriver,
    LedgerEntry, LedgerState,
};
pub use policy::{
    BreakerReset, CachePolicy, ConfigIssue, ConfigIssueCode, DecisionOutcome, PolicyConfig,
    ReasonCode, Severity, UnknownReasonCode,
};
pub use report::{RunReport, ToolStats};
pub use run::{
    CallEvent, CallEventState, ExecutionOutcome, OutcomeAck, OutcomeReport, ReportedOutcome, Run,
    RunStatus, ToolFailure,
};
