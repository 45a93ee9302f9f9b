//! Policy configuration validation issues.
//!
//! Both the domain [`PolicyConfig`](super::config::PolicyConfig) and the raw
//! file configuration report problems as [`ConfigIssue`]s. Any issue with
//! [`Severity::Error`] rejects a run before its first decision.

use serde::{Deserialize, Serialize};

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fatal: the run cannot start with this configuration.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ConfigIssueCode {
    /// A limit or threshold is zero where at least 1 is required.
    ZeroLimit { field: String },
    /// A count, price or ceiling is negative.
    NegativeValue { field: String },
    /// A decimal value is NaN or infinite.
    NonFiniteValue { field: String },
    /// A value is outside its permitted range.
    OutOfRange { field: String },
    /// A tool name is empty.
    EmptyToolName { field: String },
    /// An enum-like string is not one of the recognized values.
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },
    /// The breaker can never open because the call limit is reached first.
    UnreachableBreaker,
    /// A setting has no effect given the rest of the configuration.
    IneffectiveSetting { field: String },
    /// A string value cannot be parsed (e.g. a URL).
    MalformedValue { field: String },
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Check whether any issue in the list is fatal.
    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(ConfigIssue::is_error)
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_errors_returns_true_for_errors() {
        let issues = vec![
            ConfigIssue::warning(ConfigIssueCode::UnreachableBreaker, "w"),
            ConfigIssue::error(
                ConfigIssueCode::ZeroLimit {
                    field: "max_total_calls".to_string(),
                },
                "e",
            ),
        ];
        assert!(ConfigIssue::has_errors(&issues));
    }

    #[test]
    fn has_errors_returns_false_for_warnings_only() {
        let issues = vec![ConfigIssue::warning(ConfigIssueCode::UnreachableBreaker, "w")];
        assert!(!ConfigIssue::has_errors(&issues));
    }

    #[test]
    fn has_errors_returns_false_for_empty() {
        assert!(!ConfigIssue::has_errors(&[]));
    }

    #[test]
    fn display_prefixes_severity() {
        let issue = ConfigIssue::warning(ConfigIssueCode::UnreachableBreaker, "never opens");
        assert_eq!(issue.to_string(), "warning: never opens");
    }
}
