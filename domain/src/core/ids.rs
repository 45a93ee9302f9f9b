//! Identifiers for runs and call events.

use serde::{Deserialize, Serialize};

/// Identifier of one guarded agent run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<String>> From<T> for RunId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

/// Identifier of a call event within a run.
///
/// Engine-issued ids have the form `<run_id>#<seq>`, where `seq` is the
/// 1-indexed position of the event in the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallEventId(String);

impl CallEventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn for_run(run_id: &RunId, seq: u64) -> Self {
        Self(format!("{}#{}", run_id, seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<String>> From<T> for CallEventId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_event_id_for_run() {
        let run = RunId::new("run-7");
        let id = CallEventId::for_run(&run, 3);
        assert_eq!(id.as_str(), "run-7#3");
        assert_eq!(id.to_string(), "run-7#3");
    }

    #[test]
    fn test_from_str() {
        let run: RunId = "abc".into();
        assert_eq!(run.as_str(), "abc");
        let call: CallEventId = "abc#1".into();
        assert_eq!(call.as_str(), "abc#1");
    }
}
