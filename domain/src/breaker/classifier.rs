//! Which tool errors count toward opening a breaker.

use crate::run::outcome::ToolFailure;
use std::collections::BTreeSet;

pub trait ErrorClassifier: Send + Sync {
    /// Whether `failure` counts toward the consecutive-error streak.
    fn is_qualifying(&self, tool_name: &str, failure: &ToolFailure) -> bool;
}

/// Every error qualifies.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllErrorsQualify;

impl ErrorClassifier for AllErrorsQualify {
    fn is_qualifying(&self, _tool_name: &str, _failure: &ToolFailure) -> bool {
        true
    }
}

/// Every error qualifies except those with a listed code.
///
/// Codes compare case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct CodeListClassifier {
    non_qualifying: BTreeSet<String>,
}

impl CodeListClassifier {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            non_qualifying: codes
                .into_iter()
                .map(|c| c.as_ref().to_ascii_uppercase())
                .collect(),
        }
    }
}

impl ErrorClassifier for CodeListClassifier {
    fn is_qualifying(&self, _tool_name: &str, failure: &ToolFailure) -> bool {
        !self
            .non_qualifying
            .contains(&failure.code.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_list() {
        let classifier = CodeListClassifier::new(["invalid_argument"]);
        assert!(!classifier.is_qualifying("t", &ToolFailure::invalid_argument("bad")));
        assert!(classifier.is_qualifying("t", &ToolFailure::timeout("t")));
    }

    #[test]
    fn test_empty_list_matches_all_errors() {
        let failure = ToolFailure::execution_failed("boom");
        assert!(CodeListClassifier::default().is_qualifying("t", &failure));
        assert!(AllErrorsQualify.is_qualifying("t", &failure));
    }
}
