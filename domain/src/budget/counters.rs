//! Rate and budget counters with reservation semantics.
//!
//! An allowed call *reserves* its slot and estimated cost at decision time,
//! so concurrent proposals inside one run cannot jointly overshoot a limit.
//! The reservation is later committed (the call ran) or rolled back (it did
//! not). Committed counters only ever grow.

use crate::cost::Cost;
use crate::policy::{PolicyConfig, ReasonCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// The first ceiling a proposed call would break.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BudgetDenial {
    #[error("tool '{tool}' reached its call limit ({count}/{limit})")]
    MaxCallsPerTool { tool: String, limit: u32, count: u32 },

    #[error("run reached its total call limit ({count}/{limit})")]
    MaxTotalCalls { limit: u32, count: u32 },

    #[error("projected run cost {projected} exceeds budget {limit}")]
    MaxCostPerRun { limit: Cost, projected: Cost },
}

impl BudgetDenial {
    pub fn reason(&self) -> ReasonCode {
        match self {
            BudgetDenial::MaxCallsPerTool { .. } => ReasonCode::MaxCallsPerTool,
            BudgetDenial::MaxTotalCalls { .. } => ReasonCode::MaxTotalCalls,
            BudgetDenial::MaxCostPerRun { .. } => ReasonCode::MaxCostPerRun,
        }
    }
}

/// A held call slot plus its estimated cost.
///
/// Must be passed to exactly one of [`RunCounters::commit`] or
/// [`RunCounters::rollback`].
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct Reservation {
    tool: String,
    estimated_cost: Cost,
}

impl Reservation {
    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn estimated_cost(&self) -> Cost {
        self.estimated_cost
    }
}

/// One-shot notice that cumulative cost crossed the warning fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetWarning {
    pub threshold: Cost,
    pub limit: Cost,
    pub cumulative: Cost,
}

/// Result of charging cost to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    pub charged: Cost,
    pub cumulative: Cost,
    pub budget_warning: Option<BudgetWarning>,
}

#[derive(Debug, Default)]
pub struct RunCounters {
    max_calls_per_tool: Option<u32>,
    per_tool_limits: BTreeMap<String, u32>,
    max_total_calls: Option<u32>,
    max_cost: Option<Cost>,
    warning_threshold: Option<Cost>,
    warning_raised: bool,

    executed_per_tool: HashMap<String, u32>,
    reserved_per_tool: HashMap<String, u32>,
    executed_total: u32,
    reserved_total: u32,
    committed_cost: Cost,
    reserved_cost: Cost,
}

impl RunCounters {
    pub fn from_policy(policy: &PolicyConfig) -> Self {
        let warning_threshold = match (policy.max_cost_per_run, policy.budget_warning_ratio) {
            (Some(max), Some(ratio)) => Some(Cost::from_micros(
                (max.micros() as f64 * ratio).round() as i64,
            )),
            _ => None,
        };
        Self {
            max_calls_per_tool: policy.max_calls_per_tool,
            per_tool_limits: policy.per_tool_max_calls.clone(),
            max_total_calls: policy.max_total_calls,
            max_cost: policy.max_cost_per_run,
            warning_threshold,
            ..Self::default()
        }
    }

    /// Check every ceiling and, if all pass, reserve a slot for `tool`.
    ///
    /// Checks run per-tool, then global, then cost; the first failure wins.
    pub fn check_and_reserve(
        &mut self,
        tool: &str,
        estimated_cost: Cost,
    ) -> Result<Reservation, BudgetDenial> {
        if let Some(limit) = self.tool_limit(tool) {
            let count = self.tool_count(tool);
            if count >= limit {
                return Err(BudgetDenial::MaxCallsPerTool {
                    tool: tool.to_string(),
                    limit,
                    count,
                });
            }
        }

        if let Some(limit) = self.max_total_calls {
            let count = self.executed_total + self.reserved_total;
            if count >= limit {
                return Err(BudgetDenial::MaxTotalCalls { limit, count });
            }
        }

        if let Some(limit) = self.max_cost {
            let projected = self.committed_cost + self.reserved_cost + estimated_cost;
            if projected > limit {
                return Err(BudgetDenial::MaxCostPerRun { limit, projected });
            }
        }

        Ok(self.force_reserve(tool, estimated_cost))
    }

    /// Reserve without checking ceilings. Used when a would-be denial is
    /// let through in shadow mode.
    pub fn force_reserve(&mut self, tool: &str, estimated_cost: Cost) -> Reservation {
        *self.reserved_per_tool.entry(tool.to_string()).or_insert(0) += 1;
        self.reserved_total += 1;
        self.reserved_cost += estimated_cost;
        Reservation {
            tool: tool.to_string(),
            estimated_cost,
        }
    }

    /// Move a reservation into the committed counters, charging `actual`
    /// or, when absent, the estimate.
    pub fn commit(&mut self, reservation: Reservation, actual: Option<Cost>) -> CommitReceipt {
        self.release_reservation(&reservation);
        *self
            .executed_per_tool
            .entry(reservation.tool.clone())
            .or_insert(0) += 1;
        self.executed_total += 1;
        let charged = actual
            .unwrap_or(reservation.estimated_cost)
            .max(Cost::ZERO);
        self.charge(charged)
    }

    pub fn rollback(&mut self, reservation: Reservation) {
        self.release_reservation(&reservation);
    }

    /// Add cost that did not come from a reserved call (model turns).
    pub fn charge(&mut self, cost: Cost) -> CommitReceipt {
        let charged = cost.max(Cost::ZERO);
        self.committed_cost = self.committed_cost.saturating_add(charged);
        CommitReceipt {
            charged,
            cumulative: self.committed_cost,
            budget_warning: self.take_budget_warning(),
        }
    }

    // ==================== Accessors ====================

    pub fn executed_calls(&self, tool: &str) -> u32 {
        self.executed_per_tool.get(tool).copied().unwrap_or(0)
    }

    pub fn executed_total(&self) -> u32 {
        self.executed_total
    }

    pub fn reserved_total(&self) -> u32 {
        self.reserved_total
    }

    pub fn committed_cost(&self) -> Cost {
        self.committed_cost
    }

    pub fn reserved_cost(&self) -> Cost {
        self.reserved_cost
    }

    fn tool_limit(&self, tool: &str) -> Option<u32> {
        self.per_tool_limits
            .get(tool)
            .copied()
            .or(self.max_calls_per_tool)
    }

    fn tool_count(&self, tool: &str) -> u32 {
        self.executed_calls(tool) + self.reserved_per_tool.get(tool).copied().unwrap_or(0)
    }

    fn release_reservation(&mut self, reservation: &Reservation) {
        if let Some(n) = self.reserved_per_tool.get_mut(&reservation.tool) {
            *n = n.saturating_sub(1);
        }
        self.reserved_total = self.reserved_total.saturating_sub(1);
        self.reserved_cost = self.reserved_cost.saturating_sub(reservation.estimated_cost);
    }

    fn take_budget_warning(&mut self) -> Option<BudgetWarning> {
        let threshold = self.warning_threshold?;
        let limit = self.max_cost?;
        if self.warning_raised || self.committed_cost < threshold {
            return None;
        }
        self.warning_raised = true;
        Some(BudgetWarning {
            threshold,
            limit,
            cumulative: self.committed_cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(v: f64) -> Cost {
        Cost::try_from_usd(v).unwrap()
    }

    fn counters(policy: PolicyConfig) -> RunCounters {
        RunCounters::from_policy(&policy)
    }

    #[test]
    fn test_per_tool_limit() {
        let mut c = counters(PolicyConfig::default().with_max_calls_per_tool(Some(2)));
        let r1 = c.check_and_reserve("search", Cost::ZERO).unwrap();
        let r2 = c.check_and_reserve("search", Cost::ZERO).unwrap();
        let denial = c.check_and_reserve("search", Cost::ZERO).unwrap_err();
        assert_eq!(denial.reason(), ReasonCode::MaxCallsPerTool);
        assert!(c.check_and_reserve("other", Cost::ZERO).is_ok());

        c.rollback(r1);
        let _ = c.commit(r2, None);
        assert!(c.check_and_reserve("search", Cost::ZERO).is_ok());
    }

    #[test]
    fn test_per_tool_override() {
        let mut c = counters(
            PolicyConfig::default()
                .with_max_calls_per_tool(Some(10))
                .with_tool_call_limit("refund", 1),
        );
        let _r = c.check_and_reserve("refund", Cost::ZERO).unwrap();
        assert_eq!(
            c.check_and_reserve("refund", Cost::ZERO).unwrap_err(),
            BudgetDenial::MaxCallsPerTool {
                tool: "refund".to_string(),
                limit: 1,
                count: 1,
            }
        );
    }

    #[test]
    fn test_global_limit_after_tool_limit() {
        let mut c = counters(
            PolicyConfig::default()
                .with_max_calls_per_tool(Some(1))
                .with_max_total_calls(Some(1)),
        );
        let _r = c.check_and_reserve("a", Cost::ZERO).unwrap();
        assert_eq!(
            c.check_and_reserve("a", Cost::ZERO).unwrap_err().reason(),
            ReasonCode::MaxCallsPerTool
        );
        assert_eq!(
            c.check_and_reserve("b", Cost::ZERO).unwrap_err().reason(),
            ReasonCode::MaxTotalCalls
        );
    }

    #[test]
    fn test_cost_budget_third_call_denied() {
        let mut c = counters(PolicyConfig::default().with_max_cost_per_run(Some(usd(0.50))));
        let r1 = c.check_and_reserve("t", usd(0.20)).unwrap();
        let _ = c.commit(r1, None);
        let r2 = c.check_and_reserve("t", usd(0.20)).unwrap();
        let _ = c.commit(r2, None);
        let denial = c.check_and_reserve("t", usd(0.20)).unwrap_err();
        assert_eq!(
            denial,
            BudgetDenial::MaxCostPerRun {
                limit: usd(0.50),
                projected: usd(0.60),
            }
        );
        assert_eq!(c.committed_cost(), usd(0.40));
    }

    #[test]
    fn test_reserved_cost_counts_toward_budget() {
        let mut c = counters(PolicyConfig::default().with_max_cost_per_run(Some(usd(0.30))));
        let _r = c.check_and_reserve("t", usd(0.20)).unwrap();
        assert!(c.check_and_reserve("t", usd(0.20)).is_err());
        assert!(c.check_and_reserve("t", usd(0.10)).is_ok());
    }

    #[test]
    fn test_commit_uses_actual_cost() {
        let mut c = counters(PolicyConfig::default());
        let r = c.check_and_reserve("t", usd(0.04)).unwrap();
        let receipt = c.commit(r, Some(usd(0.10)));
        assert_eq!(receipt.charged, usd(0.10));
        assert_eq!(c.committed_cost(), usd(0.10));
        assert_eq!(c.reserved_cost(), Cost::ZERO);
        assert_eq!(c.executed_total(), 1);
        assert_eq!(c.reserved_total(), 0);
    }

    #[test]
    fn test_rollback_does_not_touch_committed() {
        let mut c = counters(PolicyConfig::default());
        let r = c.check_and_reserve("t", usd(0.04)).unwrap();
        c.rollback(r);
        assert_eq!(c.executed_total(), 0);
        assert_eq!(c.committed_cost(), Cost::ZERO);
        assert_eq!(c.reserved_cost(), Cost::ZERO);
    }

    #[test]
    fn test_force_reserve_ignores_limits() {
        let mut c = counters(PolicyConfig::default().with_max_total_calls(Some(1)));
        let _a = c.check_and_reserve("t", Cost::ZERO).unwrap();
        let forced = c.force_reserve("t", Cost::ZERO);
        assert_eq!(c.reserved_total(), 2);
        let _ = c.commit(forced, None);
        assert_eq!(c.executed_total(), 1);
    }

    #[test]
    fn test_budget_warning_is_one_shot() {
        let mut c = counters(
            PolicyConfig::default()
                .with_max_cost_per_run(Some(usd(1.0)))
                .with_budget_warning_ratio(Some(0.5)),
        );
        let r = c.check_and_reserve("t", usd(0.30)).unwrap();
        assert!(c.commit(r, None).budget_warning.is_none());
        let r = c.check_and_reserve("t", usd(0.30)).unwrap();
        let warning = c.commit(r, None).budget_warning.unwrap();
        assert_eq!(warning.threshold, usd(0.5));
        assert_eq!(warning.cumulative, usd(0.6));
        let r = c.check_and_reserve("t", usd(0.30)).unwrap();
        assert!(c.commit(r, None).budget_warning.is_none());
    }

    #[test]
    fn test_unlimited_when_unset() {
        let mut c = counters(
            PolicyConfig::default()
                .with_max_calls_per_tool(None)
                .with_max_total_calls(None),
        );
        for _ in 0..500 {
            let r = c.check_and_reserve("t", usd(1.0)).unwrap();
            let _ = c.commit(r, None);
        }
        assert_eq!(c.executed_calls("t"), 500);
    }
}
