//! Policy configuration: the immutable rule set of one run.
//!
//! A [`PolicyConfig`] is validated once when a run starts and is never
//! mutated afterwards; changing policy means starting a new run.
//!
//! # Limits
//!
//! | Field | Unset means | Zero |
//! |-------|-------------|------|
//! | `max_calls_per_tool` | unlimited | rejected |
//! | `per_tool_max_calls[tool]` | falls back to `max_calls_per_tool` | rejected |
//! | `max_total_calls` | unlimited | rejected |
//! | `max_cost_per_run` | unlimited | rejected |
//! | `escalation_threshold` | never escalate | rejected |
//! | `error_retry_threshold` | n/a (always set) | rejected |

use super::validation::{ConfigIssue, ConfigIssueCode};
use crate::core::error::DomainError;
use crate::cost::{Cost, CostModel};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How an open circuit breaker closes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BreakerReset {
    /// A success reported for the tool closes the breaker.
    OnSuccess,
    /// After `blocked_calls` denied proposals the breaker turns half-open
    /// and admits one probe call.
    Cooldown { blocked_calls: u32 },
}

/// Call cache behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    pub enabled: bool,
    /// Entries older than this many run decisions are stale. `None` keeps
    /// entries for the whole run.
    pub ttl_calls: Option<u64>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_calls: None,
        }
    }
}

/// Immutable per-run guard policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Tools whose execution changes external state.
    pub side_effect_tools: BTreeSet<String>,
    pub max_calls_per_tool: Option<u32>,
    /// Per-tool call limits overriding `max_calls_per_tool`.
    pub per_tool_max_calls: BTreeMap<String, u32>,
    pub max_total_calls: Option<u32>,
    /// Consecutive qualifying errors that open a tool's breaker.
    pub error_retry_threshold: u32,
    pub max_cost_per_run: Option<Cost>,
    pub cost_model: CostModel,
    /// `false` = shadow mode: decisions are logged but never enforced.
    pub enforce: bool,
    /// Denials tolerated before the run escalates.
    pub escalation_threshold: Option<u32>,
    pub breaker_reset: BreakerReset,
    /// Error codes that do not count toward the breaker threshold.
    pub non_qualifying_error_codes: BTreeSet<String>,
    pub cache: CachePolicy,
    /// Top-level argument names excluded from idempotency fingerprints.
    pub idempotency_ignored_args: BTreeSet<String>,
    /// Key for HMAC fingerprints; plain SHA-256 when unset.
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    /// Fraction of `max_cost_per_run` at which a one-shot warning is raised.
    pub budget_warning_ratio: Option<f64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            side_effect_tools: BTreeSet::new(),
            max_calls_per_tool: Some(25),
            per_tool_max_calls: BTreeMap::new(),
            max_total_calls: Some(100),
            error_retry_threshold: 3,
            max_cost_per_run: None,
            cost_model: CostModel::default(),
            enforce: true,
            escalation_threshold: Some(10),
            breaker_reset: BreakerReset::OnSuccess,
            non_qualifying_error_codes: BTreeSet::new(),
            cache: CachePolicy::default(),
            idempotency_ignored_args: BTreeSet::new(),
            secret_key: None,
            budget_warning_ratio: None,
        }
    }
}

impl PolicyConfig {
    // ==================== Builder Methods ====================

    pub fn with_side_effect_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.side_effect_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_calls_per_tool(mut self, max: Option<u32>) -> Self {
        self.max_calls_per_tool = max;
        self
    }

    pub fn with_tool_call_limit(mut self, tool_name: impl Into<String>, max: u32) -> Self {
        self.per_tool_max_calls.insert(tool_name.into(), max);
        self
    }

    pub fn with_max_total_calls(mut self, max: Option<u32>) -> Self {
        self.max_total_calls = max;
        self
    }

    pub fn with_error_retry_threshold(mut self, threshold: u32) -> Self {
        self.error_retry_threshold = threshold;
        self
    }

    pub fn with_max_cost_per_run(mut self, max: Option<Cost>) -> Self {
        self.max_cost_per_run = max;
        self
    }

    pub fn with_cost_model(mut self, model: CostModel) -> Self {
        self.cost_model = model;
        self
    }

    pub fn with_enforce(mut self, enforce: bool) -> Self {
        self.enforce = enforce;
        self
    }

    pub fn with_escalation_threshold(mut self, threshold: Option<u32>) -> Self {
        self.escalation_threshold = threshold;
        self
    }

    pub fn with_breaker_reset(mut self, reset: BreakerReset) -> Self {
        self.breaker_reset = reset;
        self
    }

    pub fn with_non_qualifying_error_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.non_qualifying_error_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_idempotency_ignored_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.idempotency_ignored_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_secret_key(mut self, key: Option<String>) -> Self {
        self.secret_key = key;
        self
    }

    pub fn with_budget_warning_ratio(mut self, ratio: Option<f64>) -> Self {
        self.budget_warning_ratio = ratio;
        self
    }

    // ==================== Queries ====================

    pub fn is_side_effect(&self, tool_name: &str) -> bool {
        self.side_effect_tools.contains(tool_name)
    }

    /// Effective call limit for a tool (per-tool override, else global).
    pub fn tool_call_limit(&self, tool_name: &str) -> Option<u32> {
        self.per_tool_max_calls
            .get(tool_name)
            .copied()
            .or(self.max_calls_per_tool)
    }

    // ==================== Validation ====================

    /// Validate this policy, returning every detected issue.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.error_retry_threshold == 0 {
            issues.push(zero_limit("error_retry_threshold"));
        }
        if self.max_calls_per_tool == Some(0) {
            issues.push(zero_limit("max_calls_per_tool"));
        }
        if self.max_total_calls == Some(0) {
            issues.push(zero_limit("max_total_calls"));
        }
        if self.escalation_threshold == Some(0) {
            issues.push(zero_limit("escalation_threshold"));
        }
        for (tool, max) in &self.per_tool_max_calls {
            if tool.trim().is_empty() {
                issues.push(empty_tool_name("per_tool_max_calls"));
            }
            if *max == 0 {
                issues.push(zero_limit(&format!("per_tool_max_calls.{}", tool)));
            }
        }
        if self.side_effect_tools.iter().any(|t| t.trim().is_empty()) {
            issues.push(empty_tool_name("side_effect_tools"));
        }

        if let Some(max_cost) = self.max_cost_per_run {
            if max_cost.is_zero() {
                issues.push(zero_limit("max_cost_per_run"));
            } else if max_cost.is_negative() {
                issues.push(negative("max_cost_per_run"));
            }
        }
        issues.extend(self.validate_prices());

        if let BreakerReset::Cooldown { blocked_calls: 0 } = self.breaker_reset {
            issues.push(zero_limit("breaker_reset.blocked_calls"));
        }

        if self.cache.ttl_calls == Some(0) {
            issues.push(zero_limit("cache.ttl_calls"));
        }
        if !self.cache.enabled && self.cache.ttl_calls.is_some() {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::IneffectiveSetting {
                    field: "cache.ttl_calls".to_string(),
                },
                "cache.ttl_calls is set but the cache is disabled",
            ));
        }

        if let Some(ratio) = self.budget_warning_ratio {
            if !ratio.is_finite() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::NonFiniteValue {
                        field: "budget_warning_ratio".to_string(),
                    },
                    "budget_warning_ratio must be a finite number",
                ));
            } else if ratio <= 0.0 || ratio > 1.0 {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::OutOfRange {
                        field: "budget_warning_ratio".to_string(),
                    },
                    format!("budget_warning_ratio ({}) must be in (0, 1]", ratio),
                ));
            }
            if self.max_cost_per_run.is_none() {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::IneffectiveSetting {
                        field: "budget_warning_ratio".to_string(),
                    },
                    "budget_warning_ratio is set but max_cost_per_run is unlimited",
                ));
            }
        }

        if let Some(limit) = self.max_calls_per_tool
            && limit > 0
            && self.error_retry_threshold > limit
        {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::UnreachableBreaker,
                format!(
                    "error_retry_threshold ({}) exceeds max_calls_per_tool ({}); breakers can never open",
                    self.error_retry_threshold, limit
                ),
            ));
        }

        issues
    }

    /// Validate and return `self`, or fail with every fatal issue.
    pub fn validated(self) -> Result<Self, DomainError> {
        let errors: Vec<ConfigIssue> = self
            .validate()
            .into_iter()
            .filter(ConfigIssue::is_error)
            .collect();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(DomainError::InvalidPolicy { issues: errors })
        }
    }

    fn validate_prices(&self) -> Vec<ConfigIssue> {
        let model = &self.cost_model;
        let mut issues = Vec::new();
        let mut check = |field: String, cost: Cost| {
            if cost.is_negative() {
                issues.push(negative(&field));
            }
        };
        check(
            "default_tool_call_cost".to_string(),
            model.default_tool_call_cost,
        );
        check(
            "input_token_cost_per_1k".to_string(),
            model.input_token_cost_per_1k,
        );
        check(
            "output_token_cost_per_1k".to_string(),
            model.output_token_cost_per_1k,
        );
        for (tool, cost) in &model.per_tool_cost {
            check(format!("per_tool_cost.{}", tool), *cost);
        }
        issues
    }
}

fn zero_limit(field: &str) -> ConfigIssue {
    ConfigIssue::error(
        ConfigIssueCode::ZeroLimit {
            field: field.to_string(),
        },
        format!("{} must be >= 1", field),
    )
}

fn negative(field: &str) -> ConfigIssue {
    ConfigIssue::error(
        ConfigIssueCode::NegativeValue {
            field: field.to_string(),
        },
        format!("{} must not be negative", field),
    )
}

fn empty_tool_name(field: &str) -> ConfigIssue {
    ConfigIssue::error(
        ConfigIssueCode::EmptyToolName {
            field: field.to_string(),
        },
        format!("{} contains an empty tool name", field),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::validation::Severity;

    fn usd(v: f64) -> Cost {
        Cost::try_from_usd(v).unwrap()
    }

    #[test]
    fn test_default_is_valid() {
        let policy = PolicyConfig::default();
        assert!(policy.validate().is_empty());
        assert!(policy.enforce);
        assert_eq!(policy.error_retry_threshold, 3);
    }

    #[test]
    fn test_builder() {
        let policy = PolicyConfig::default()
            .with_side_effect_tools(["refund", "cancel"])
            .with_max_cost_per_run(Some(usd(0.5)))
            .with_enforce(false)
            .with_tool_call_limit("search_kb", 4);

        assert!(policy.is_side_effect("refund"));
        assert!(!policy.is_side_effect("search_kb"));
        assert_eq!(policy.max_cost_per_run, Some(usd(0.5)));
        assert!(!policy.enforce);
        assert_eq!(policy.tool_call_limit("search_kb"), Some(4));
        assert_eq!(policy.tool_call_limit("refund"), Some(25));
    }

    #[test]
    fn test_zero_thresholds_are_rejected() {
        let policy = PolicyConfig::default()
            .with_error_retry_threshold(0)
            .with_max_total_calls(Some(0))
            .with_max_calls_per_tool(Some(0))
            .with_escalation_threshold(Some(0));
        let issues = policy.validate();
        let zero_fields: Vec<String> = issues
            .iter()
            .filter_map(|i| match &i.code {
                ConfigIssueCode::ZeroLimit { field } => Some(field.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            zero_fields,
            vec![
                "error_retry_threshold",
                "max_calls_per_tool",
                "max_total_calls",
                "escalation_threshold",
            ]
        );
        assert!(issues.iter().all(|i| i.severity == Severity::Error));
    }

    #[test]
    fn test_negative_prices_are_rejected() {
        let model = CostModel::default()
            .with_default_tool_call_cost(usd(-0.01))
            .with_tool_cost("refund", usd(-1.0));
        let policy = PolicyConfig::default()
            .with_cost_model(model)
            .with_max_cost_per_run(Some(usd(-2.0)));
        let issues = policy.validate();
        assert_eq!(issues.len(), 3);
        assert!(
            issues
                .iter()
                .all(|i| matches!(i.code, ConfigIssueCode::NegativeValue { .. }))
        );
    }

    #[test]
    fn test_zero_cooldown_rejected() {
        let policy =
            PolicyConfig::default().with_breaker_reset(BreakerReset::Cooldown { blocked_calls: 0 });
        assert!(ConfigIssue::has_errors(&policy.validate()));
    }

    #[test]
    fn test_warning_ratio_range() {
        let policy = PolicyConfig::default()
            .with_max_cost_per_run(Some(usd(1.0)))
            .with_budget_warning_ratio(Some(1.5));
        let issues = policy.validate();
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0].code, ConfigIssueCode::OutOfRange { .. }));

        let ok = PolicyConfig::default()
            .with_max_cost_per_run(Some(usd(1.0)))
            .with_budget_warning_ratio(Some(0.8));
        assert!(ok.validate().is_empty());
    }

    #[test]
    fn test_warning_only_issues_do_not_reject() {
        let policy = PolicyConfig::default()
            .with_max_calls_per_tool(Some(2))
            .with_error_retry_threshold(5);
        let issues = policy.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ConfigIssueCode::UnreachableBreaker);
        assert!(policy.validated().is_ok());
    }

    #[test]
    fn test_validated_reports_only_errors() {
        let policy = PolicyConfig::default()
            .with_max_calls_per_tool(Some(2))
            .with_error_retry_threshold(5)
            .with_max_total_calls(Some(0));
        match policy.validated() {
            Err(DomainError::InvalidPolicy { issues }) => {
                assert_eq!(issues.len(), 1);
                assert!(issues[0].is_error());
            }
            other => panic!("expected InvalidPolicy, got {:?}", other),
        }
    }

    #[test]
    fn test_secret_key_not_serialized() {
        let policy = PolicyConfig::default().with_secret_key(Some("hunter2".to_string()));
        let json = serde_json::to_string(&policy).unwrap();
        assert!(!json.contains("hunter2"));
    }
}
