//! Guard policy configuration from TOML (`[policy]` section and subtables)

use aura_domain::{
    BreakerReset, CachePolicy, ConfigIssue, ConfigIssueCode, Cost, CostModel, PolicyConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw guard policy from TOML.
///
/// Counts are read as signed integers and prices as decimal USD so that
/// negative or non-finite input is reported as a [`ConfigIssue`] instead of
/// failing deserialization.
///
/// # Example
///
/// ```toml
/// [policy]
/// side_effect_tools = ["refund", "cancel"]
/// max_calls_per_tool = 10
/// max_cost_per_run = 0.50
/// enforce = false
///
/// [policy.per_tool_max_calls]
/// search_kb = 4
///
/// [policy.cost]
/// default_tool_call_cost = 0.04
///
/// [policy.breaker]
/// reset = "cooldown"
/// cooldown_blocked_calls = 2
///
/// [policy.cache]
/// ttl_calls = 20
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePolicyConfig {
    pub side_effect_tools: Vec<String>,
    pub max_calls_per_tool: Option<i64>,
    pub per_tool_max_calls: BTreeMap<String, i64>,
    pub max_total_calls: Option<i64>,
    pub error_retry_threshold: i64,
    /// USD ceiling per run; unset means unlimited.
    pub max_cost_per_run: Option<f64>,
    /// `false` runs the guard in shadow mode.
    pub enforce: bool,
    pub escalation_threshold: Option<i64>,
    pub idempotency_ignored_args: Vec<String>,
    /// HMAC key for argument fingerprints. Prefer the
    /// `AURA_GUARD_POLICY__SECRET_KEY` environment variable.
    pub secret_key: Option<String>,
    pub budget_warning_ratio: Option<f64>,
    pub cost: FileCostConfig,
    pub breaker: FileBreakerConfig,
    pub cache: FileCacheConfig,
}

impl Default for FilePolicyConfig {
    fn default() -> Self {
        let policy = PolicyConfig::default();
        Self {
            side_effect_tools: policy.side_effect_tools.into_iter().collect(),
            max_calls_per_tool: policy.max_calls_per_tool.map(i64::from),
            per_tool_max_calls: BTreeMap::new(),
            max_total_calls: policy.max_total_calls.map(i64::from),
            error_retry_threshold: i64::from(policy.error_retry_threshold),
            max_cost_per_run: policy.max_cost_per_run.map(Cost::as_usd),
            enforce: policy.enforce,
            escalation_threshold: policy.escalation_threshold.map(i64::from),
            idempotency_ignored_args: Vec::new(),
            secret_key: None,
            budget_warning_ratio: policy.budget_warning_ratio,
            cost: FileCostConfig::default(),
            breaker: FileBreakerConfig::default(),
            cache: FileCacheConfig::default(),
        }
    }
}

/// `[policy.cost]`: prices in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCostConfig {
    pub default_tool_call_cost: f64,
    pub per_tool_cost: BTreeMap<String, f64>,
    pub input_token_cost_per_1k: f64,
    pub output_token_cost_per_1k: f64,
}

impl Default for FileCostConfig {
    fn default() -> Self {
        let model = CostModel::default();
        Self {
            default_tool_call_cost: model.default_tool_call_cost.as_usd(),
            per_tool_cost: BTreeMap::new(),
            input_token_cost_per_1k: model.input_token_cost_per_1k.as_usd(),
            output_token_cost_per_1k: model.output_token_cost_per_1k.as_usd(),
        }
    }
}

/// `[policy.breaker]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBreakerConfig {
    /// `"on_success"` or `"cooldown"`.
    pub reset: String,
    /// Blocked proposals before a cooling-down breaker admits a probe.
    pub cooldown_blocked_calls: i64,
    pub non_qualifying_error_codes: Vec<String>,
}

impl Default for FileBreakerConfig {
    fn default() -> Self {
        Self {
            reset: "on_success".to_string(),
            cooldown_blocked_calls: 3,
            non_qualifying_error_codes: Vec::new(),
        }
    }
}

/// `[policy.cache]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCacheConfig {
    pub enabled: bool,
    pub ttl_calls: Option<i64>,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        let cache = CachePolicy::default();
        Self {
            enabled: cache.enabled,
            ttl_calls: cache.ttl_calls.and_then(|ttl| i64::try_from(ttl).ok()),
        }
    }
}

const VALID_BREAKER_RESETS: [&str; 2] = ["on_success", "cooldown"];

impl FilePolicyConfig {
    /// Convert to domain `PolicyConfig`, returning validation issues.
    ///
    /// Values that cannot be represented (negative counts, non-finite
    /// prices, unknown enum strings) fall back to the domain default and
    /// are reported as errors. The resulting policy is then validated as a
    /// whole, so the issue list is complete.
    pub fn to_policy_config(&self) -> (PolicyConfig, Vec<ConfigIssue>) {
        let defaults = PolicyConfig::default();
        let mut issues = Vec::new();

        let mut per_tool_max_calls = BTreeMap::new();
        for (tool, max) in &self.per_tool_max_calls {
            let field = format!("per_tool_max_calls.{}", tool);
            if let Some(max) = count(&field, *max, &mut issues) {
                per_tool_max_calls.insert(tool.clone(), max);
            }
        }

        let policy = PolicyConfig {
            side_effect_tools: self.side_effect_tools.iter().cloned().collect(),
            max_calls_per_tool: optional_count(
                "max_calls_per_tool",
                self.max_calls_per_tool,
                defaults.max_calls_per_tool,
                &mut issues,
            ),
            per_tool_max_calls,
            max_total_calls: optional_count(
                "max_total_calls",
                self.max_total_calls,
                defaults.max_total_calls,
                &mut issues,
            ),
            error_retry_threshold: count(
                "error_retry_threshold",
                self.error_retry_threshold,
                &mut issues,
            )
            .unwrap_or(defaults.error_retry_threshold),
            max_cost_per_run: match self.max_cost_per_run {
                Some(usd) => price("max_cost_per_run", usd, &mut issues).or(defaults.max_cost_per_run),
                None => None,
            },
            cost_model: self.cost.to_cost_model(&mut issues),
            enforce: self.enforce,
            escalation_threshold: optional_count(
                "escalation_threshold",
                self.escalation_threshold,
                defaults.escalation_threshold,
                &mut issues,
            ),
            breaker_reset: self.breaker.to_breaker_reset(&mut issues),
            non_qualifying_error_codes: self
                .breaker
                .non_qualifying_error_codes
                .iter()
                .cloned()
                .collect(),
            cache: self.cache.to_cache_policy(&mut issues),
            idempotency_ignored_args: self.idempotency_ignored_args.iter().cloned().collect(),
            secret_key: self.secret_key.clone().filter(|key| !key.is_empty()),
            budget_warning_ratio: self.budget_warning_ratio,
        };

        issues.extend(policy.validate());
        (policy, issues)
    }
}

impl FileCostConfig {
    fn to_cost_model(&self, issues: &mut Vec<ConfigIssue>) -> CostModel {
        let defaults = CostModel::default();
        let mut model = CostModel::default()
            .with_default_tool_call_cost(
                price("cost.default_tool_call_cost", self.default_tool_call_cost, issues)
                    .unwrap_or(defaults.default_tool_call_cost),
            )
            .with_token_costs(
                price("cost.input_token_cost_per_1k", self.input_token_cost_per_1k, issues)
                    .unwrap_or(defaults.input_token_cost_per_1k),
                price("cost.output_token_cost_per_1k", self.output_token_cost_per_1k, issues)
                    .unwrap_or(defaults.output_token_cost_per_1k),
            );
        for (tool, usd) in &self.per_tool_cost {
            if let Some(cost) = price(&format!("cost.per_tool_cost.{}", tool), *usd, issues) {
                model = model.with_tool_cost(tool.clone(), cost);
            }
        }
        model
    }
}

impl FileBreakerConfig {
    fn to_breaker_reset(&self, issues: &mut Vec<ConfigIssue>) -> BreakerReset {
        match self.reset.to_lowercase().as_str() {
            "on_success" => BreakerReset::OnSuccess,
            "cooldown" => {
                match count("breaker.cooldown_blocked_calls", self.cooldown_blocked_calls, issues) {
                    Some(blocked_calls) => BreakerReset::Cooldown { blocked_calls },
                    None => BreakerReset::OnSuccess,
                }
            }
            _ => {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "policy.breaker.reset".to_string(),
                        value: self.reset.clone(),
                        valid_values: VALID_BREAKER_RESETS.iter().map(|s| s.to_string()).collect(),
                    },
                    format!(
                        "policy.breaker.reset: unknown value '{}' (expected one of: {})",
                        self.reset,
                        VALID_BREAKER_RESETS.join(", ")
                    ),
                ));
                BreakerReset::OnSuccess
            }
        }
    }
}

impl FileCacheConfig {
    fn to_cache_policy(&self, issues: &mut Vec<ConfigIssue>) -> CachePolicy {
        let ttl_calls = self.ttl_calls.and_then(|ttl| {
            count("cache.ttl_calls", ttl, issues).map(u64::from)
        });
        CachePolicy {
            enabled: self.enabled,
            ttl_calls,
        }
    }
}

fn negative_issue(field: &str, value: impl std::fmt::Display) -> ConfigIssue {
    ConfigIssue::error(
        ConfigIssueCode::NegativeValue {
            field: format!("policy.{}", field),
        },
        format!("policy.{}: must not be negative (got {})", field, value),
    )
}

/// Narrow a raw count, reporting negative or oversized values.
fn count(field: &str, value: i64, issues: &mut Vec<ConfigIssue>) -> Option<u32> {
    if value < 0 {
        issues.push(negative_issue(field, value));
        return None;
    }
    match u32::try_from(value) {
        Ok(value) => Some(value),
        Err(_) => {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: format!("policy.{}", field),
                },
                format!("policy.{}: {} is too large", field, value),
            ));
            None
        }
    }
}

fn optional_count(
    field: &str,
    value: Option<i64>,
    fallback: Option<u32>,
    issues: &mut Vec<ConfigIssue>,
) -> Option<u32> {
    match value {
        Some(value) => count(field, value, issues).or(fallback),
        None => None,
    }
}

/// Convert a USD amount, reporting negative or non-finite values.
fn price(field: &str, usd: f64, issues: &mut Vec<ConfigIssue>) -> Option<Cost> {
    if !usd.is_finite() {
        issues.push(ConfigIssue::error(
            ConfigIssueCode::NonFiniteValue {
                field: format!("policy.{}", field),
            },
            format!("policy.{}: must be a finite number", field),
        ));
        return None;
    }
    if usd < 0.0 {
        issues.push(negative_issue(field, usd));
        return None;
    }
    Cost::try_from_usd(usd).ok()
}
