//! Decision outcomes and the stable reason-code vocabulary.
//!
//! [`ReasonCode`] is a closed enum; its snake_case strings are part of the
//! external contract (logs, reports) and must not change.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the engine reached a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    CircuitOpen,
    DuplicateSideEffect,
    MaxCallsPerTool,
    MaxTotalCalls,
    MaxCostPerRun,
    Allow,
    AllowFromCache,
    Escalate,
}

impl ReasonCode {
    pub const ALL: [ReasonCode; 8] = [
        ReasonCode::CircuitOpen,
        ReasonCode::DuplicateSideEffect,
        ReasonCode::MaxCallsPerTool,
        ReasonCode::MaxTotalCalls,
        ReasonCode::MaxCostPerRun,
        ReasonCode::Allow,
        ReasonCode::AllowFromCache,
        ReasonCode::Escalate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::CircuitOpen => "circuit_open",
            ReasonCode::DuplicateSideEffect => "duplicate_side_effect",
            ReasonCode::MaxCallsPerTool => "max_calls_per_tool",
            ReasonCode::MaxTotalCalls => "max_total_calls",
            ReasonCode::MaxCostPerRun => "max_cost_per_run",
            ReasonCode::Allow => "allow",
            ReasonCode::AllowFromCache => "allow_from_cache",
            ReasonCode::Escalate => "escalate",
        }
    }

    /// Whether this reason blocks execution when enforced.
    pub fn is_denial(&self) -> bool {
        match self {
            ReasonCode::CircuitOpen
            | ReasonCode::DuplicateSideEffect
            | ReasonCode::MaxCallsPerTool
            | ReasonCode::MaxTotalCalls
            | ReasonCode::MaxCostPerRun
            | ReasonCode::Escalate => true,
            ReasonCode::Allow | ReasonCode::AllowFromCache => false,
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown reason code: {0}")]
pub struct UnknownReasonCode(pub String);

impl std::str::FromStr for ReasonCode {
    type Err = UnknownReasonCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReasonCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownReasonCode(s.to_string()))
    }
}

/// What the caller should do with a proposed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Execute the call and report its outcome.
    Allow,
    /// Do not execute; use the cached result carried on the decision.
    AllowFromCache,
    /// Do not execute.
    Deny,
    /// Do not execute as proposed; retry with the suggested arguments.
    Rewrite,
    /// Stop the run and hand control to a human or fallback path.
    Escalate,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionOutcome::Allow => "allow",
            DecisionOutcome::AllowFromCache => "allow_from_cache",
            DecisionOutcome::Deny => "deny",
            DecisionOutcome::Rewrite => "rewrite",
            DecisionOutcome::Escalate => "escalate",
        }
    }

    /// Whether the caller is expected to execute the tool and report back.
    pub fn permits_execution(&self) -> bool {
        matches!(self, DecisionOutcome::Allow)
    }
}

impl std::fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
