//! Per-tool circuit breakers.
//!
//! # State Transitions
//!
//! ```text
//! Closed ──(threshold qualifying errors)──> Open
//! Open ──(on-success: any success reported)──> Closed
//! Open ──(cooldown: N blocked proposals)──> HalfOpen
//! HalfOpen ──(probe succeeds)──> Closed
//! HalfOpen ──(probe fails)──> Open
//! ```
//!
//! Cooldown counts blocked proposals rather than elapsed time, so a replayed
//! run behaves identically.

use crate::policy::BreakerReset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls are denied.
    Open,
    /// One probe call is admitted.
    HalfOpen,
}

/// Breaker bookkeeping for a single tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerState {
    pub state: CircuitState,
    pub consecutive_errors: u32,
    pub total_errors: u32,
    /// Proposals denied since the breaker last opened.
    pub blocked_since_open: u32,
    pub probe_in_flight: bool,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_errors: 0,
            total_errors: 0,
            blocked_since_open: 0,
            probe_in_flight: false,
        }
    }
}

/// A state change worth logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerTransition {
    Opened,
    HalfOpened,
    Closed,
    Reopened,
}

impl BreakerTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerTransition::Opened => "opened",
            BreakerTransition::HalfOpened => "half_opened",
            BreakerTransition::Closed => "closed",
            BreakerTransition::Reopened => "reopened",
        }
    }
}

impl std::fmt::Display for BreakerTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    reset: BreakerReset,
    tools: BTreeMap<String, BreakerState>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, reset: BreakerReset) -> Self {
        Self {
            threshold: threshold.max(1),
            reset,
            tools: BTreeMap::new(),
        }
    }

    /// Whether a new proposal for `tool` must be denied.
    ///
    /// A half-open breaker blocks only while its probe is outstanding.
    pub fn should_block(&self, tool: &str) -> bool {
        match self.tools.get(tool) {
            Some(s) => match s.state {
                CircuitState::Closed => false,
                CircuitState::Open => true,
                CircuitState::HalfOpen => s.probe_in_flight,
            },
            None => false,
        }
    }

    /// Count a denied proposal. Under cooldown reset this may half-open
    /// the breaker.
    pub fn note_blocked(&mut self, tool: &str) -> Option<BreakerTransition> {
        let BreakerReset::Cooldown { blocked_calls } = self.reset else {
            return None;
        };
        let s = self.tools.get_mut(tool)?;
        if s.state != CircuitState::Open {
            return None;
        }
        s.blocked_since_open += 1;
        if s.blocked_since_open >= blocked_calls {
            s.state = CircuitState::HalfOpen;
            s.probe_in_flight = false;
            return Some(BreakerTransition::HalfOpened);
        }
        None
    }

    /// Mark an allowed call as the half-open probe. Returns `true` when the
    /// call is a probe.
    pub fn begin_probe(&mut self, tool: &str) -> bool {
        match self.tools.get_mut(tool) {
            Some(s) if s.state == CircuitState::HalfOpen && !s.probe_in_flight => {
                s.probe_in_flight = true;
                true
            }
            _ => false,
        }
    }

    /// Probe was never executed: admit another.
    pub fn release_probe(&mut self, tool: &str) {
        if let Some(s) = self.tools.get_mut(tool)
            && s.state == CircuitState::HalfOpen
        {
            s.probe_in_flight = false;
        }
    }

    /// Record a success. Under cooldown reset only the half-open probe may
    /// close the breaker; other successes just clear the error streak.
    pub fn record_success(&mut self, tool: &str, probe: bool) -> Option<BreakerTransition> {
        let cooldown = matches!(self.reset, BreakerReset::Cooldown { .. });
        let s = self.tools.entry(tool.to_string()).or_default();
        s.consecutive_errors = 0;
        match s.state {
            CircuitState::Closed => return None,
            CircuitState::Open if cooldown => return None,
            CircuitState::HalfOpen if cooldown && !probe => return None,
            _ => {}
        }
        s.state = CircuitState::Closed;
        s.blocked_since_open = 0;
        s.probe_in_flight = false;
        Some(BreakerTransition::Closed)
    }

    /// Record an error. Non-qualifying errors leave the streak untouched.
    pub fn record_failure(&mut self, tool: &str, qualifying: bool) -> Option<BreakerTransition> {
        let threshold = self.threshold;
        let s = self.tools.entry(tool.to_string()).or_default();
        s.total_errors += 1;

        if !qualifying {
            if s.state == CircuitState::HalfOpen {
                s.probe_in_flight = false;
            }
            return None;
        }

        s.consecutive_errors += 1;
        match s.state {
            CircuitState::Closed if s.consecutive_errors >= threshold => {
                open(s);
                Some(BreakerTransition::Opened)
            }
            CircuitState::HalfOpen => {
                open(s);
                Some(BreakerTransition::Reopened)
            }
            _ => None,
        }
    }

    pub fn state(&self, tool: &str) -> Option<&BreakerState> {
        self.tools.get(tool)
    }

    pub fn circuit_state(&self, tool: &str) -> CircuitState {
        self.tools
            .get(tool)
            .map(|s| s.state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Tools whose breaker is not closed, in name order.
    pub fn open_tools(&self) -> Vec<String> {
        self.tools
            .iter()
            .filter(|(_, s)| s.state != CircuitState::Closed)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn states(&self) -> &BTreeMap<String, BreakerState> {
        &self.tools
    }
}

fn open(s: &mut BreakerState) {
    s.state = CircuitState::Open;
    s.blocked_since_open = 0;
    s.probe_in_flight = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_at_threshold() {
        let mut breaker = CircuitBreaker::new(2, BreakerReset::OnSuccess);
        assert_eq!(breaker.record_failure("t", true), None);
        assert!(!breaker.should_block("t"));
        assert_eq!(breaker.record_failure("t", true), Some(BreakerTransition::Opened));
        assert!(breaker.should_block("t"));
        assert_eq!(breaker.open_tools(), vec!["t".to_string()]);
        assert!(!breaker.should_block("other"));
    }

    #[test]
    fn test_success_resets_streak() {
        let mut breaker = CircuitBreaker::new(2, BreakerReset::OnSuccess);
        breaker.record_failure("t", true);
        breaker.record_success("t", false);
        breaker.record_failure("t", true);
        assert!(!breaker.should_block("t"));
        let s = breaker.state("t").unwrap();
        assert_eq!(s.consecutive_errors, 1);
        assert_eq!(s.total_errors, 2);
    }

    #[test]
    fn test_non_qualifying_errors_ignored() {
        let mut breaker = CircuitBreaker::new(2, BreakerReset::OnSuccess);
        breaker.record_failure("t", true);
        breaker.record_failure("t", false);
        assert_eq!(breaker.state("t").unwrap().consecutive_errors, 1);
        assert_eq!(breaker.record_failure("t", true), Some(BreakerTransition::Opened));
    }

    #[test]
    fn test_on_success_reset() {
        let mut breaker = CircuitBreaker::new(1, BreakerReset::OnSuccess);
        breaker.record_failure("t", true);
        assert_eq!(breaker.note_blocked("t"), None);
        assert_eq!(breaker.record_success("t", false), Some(BreakerTransition::Closed));
        assert!(!breaker.should_block("t"));
    }

    #[test]
    fn test_cooldown_half_open_single_probe() {
        let mut breaker = CircuitBreaker::new(1, BreakerReset::Cooldown { blocked_calls: 2 });
        breaker.record_failure("t", true);
        assert_eq!(breaker.note_blocked("t"), None);
        assert_eq!(breaker.note_blocked("t"), Some(BreakerTransition::HalfOpened));
        assert!(!breaker.should_block("t"));
        assert!(breaker.begin_probe("t"));
        assert!(breaker.should_block("t"));
        assert!(!breaker.begin_probe("t"));

        assert_eq!(breaker.record_failure("t", true), Some(BreakerTransition::Reopened));
        assert_eq!(breaker.circuit_state("t"), CircuitState::Open);
        assert_eq!(breaker.state("t").unwrap().blocked_since_open, 0);
    }

    #[test]
    fn test_probe_success_closes() {
        let mut breaker = CircuitBreaker::new(1, BreakerReset::Cooldown { blocked_calls: 1 });
        breaker.record_failure("t", true);
        breaker.note_blocked("t");
        assert!(breaker.begin_probe("t"));
        assert_eq!(breaker.record_success("t", true), Some(BreakerTransition::Closed));
        assert_eq!(breaker.circuit_state("t"), CircuitState::Closed);
    }

    #[test]
    fn test_cooldown_ignores_non_probe_success() {
        let mut breaker = CircuitBreaker::new(1, BreakerReset::Cooldown { blocked_calls: 1 });
        breaker.record_failure("t", true);
        assert_eq!(breaker.record_success("t", false), None);
        assert_eq!(breaker.circuit_state("t"), CircuitState::Open);
        assert_eq!(breaker.state("t").unwrap().consecutive_errors, 0);

        breaker.note_blocked("t");
        assert!(breaker.begin_probe("t"));
        assert_eq!(breaker.record_success("t", false), None);
        assert_eq!(breaker.circuit_state("t"), CircuitState::HalfOpen);
        assert_eq!(breaker.record_success("t", true), Some(BreakerTransition::Closed));
    }

    #[test]
    fn test_released_probe_admits_another() {
        let mut breaker = CircuitBreaker::new(1, BreakerReset::Cooldown { blocked_calls: 1 });
        breaker.record_failure("t", true);
        breaker.note_blocked("t");
        assert!(breaker.begin_probe("t"));
        breaker.release_probe("t");
        assert_eq!(breaker.circuit_state("t"), CircuitState::HalfOpen);
        assert!(breaker.begin_probe("t"));
    }
}
