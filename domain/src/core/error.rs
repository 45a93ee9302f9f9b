//! Domain error types
//!
//! Policy denials are *not* errors: they are returned as
//! [`Decision`](crate::engine::decision::Decision) values. The variants here
//! cover the two contract failures the engine signals explicitly: an invalid
//! policy at run start, and a caller reporting against a call event it does
//! not own (unknown, already resolved, or on a closed run).

use crate::core::ids::{CallEventId, RunId};
use crate::policy::validation::ConfigIssue;
use crate::run::entities::RunStatus;
use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid policy configuration: {}", summarize(.issues))]
    InvalidPolicy { issues: Vec<ConfigIssue> },

    #[error("Unknown call event: {0}")]
    UnknownCallEvent(CallEventId),

    #[error("Call event {0} is already resolved")]
    CallEventAlreadyResolved(CallEventId),

    #[error("Run {run_id} is closed ({status})")]
    RunClosed { run_id: RunId, status: RunStatus },

    #[error("Cannot finish run {run_id} with non-terminal status {status}")]
    InvalidRunTransition { run_id: RunId, status: RunStatus },
}

impl DomainError {
    /// Whether this error is a caller contract violation while reporting
    /// outcomes (as opposed to a configuration problem).
    pub fn is_reporting_error(&self) -> bool {
        matches!(
            self,
            DomainError::UnknownCallEvent(_) | DomainError::CallEventAlreadyResolved(_)
        )
    }
}

fn summarize(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::validation::ConfigIssueCode;

    #[test]
    fn test_invalid_policy_display_joins_messages() {
        let error = DomainError::InvalidPolicy {
            issues: vec![
                ConfigIssue::error(
                    ConfigIssueCode::ZeroLimit {
                        field: "max_total_calls".to_string(),
                    },
                    "max_total_calls must be >= 1",
                ),
                ConfigIssue::error(
                    ConfigIssueCode::ZeroLimit {
                        field: "error_retry_threshold".to_string(),
                    },
                    "error_retry_threshold must be >= 1",
                ),
            ],
        };
        assert_eq!(
            error.to_string(),
            "Invalid policy configuration: max_total_calls must be >= 1; error_retry_threshold must be >= 1"
        );
    }

    #[test]
    fn test_is_reporting_error() {
        assert!(DomainError::UnknownCallEvent(CallEventId::new("x")).is_reporting_error());
        assert!(DomainError::CallEventAlreadyResolved(CallEventId::new("x")).is_reporting_error());
        assert!(
            !DomainError::RunClosed {
                run_id: RunId::new("r"),
                status: RunStatus::Escalated,
            }
            .is_reporting_error()
        );
    }
}
