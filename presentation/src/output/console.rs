//! Console output formatter for guard reports

use crate::output::formatter::OutputFormatter;
use aura_application::{SimulationReport, VariantResult};
use aura_domain::{ConfigIssue, Cost, PolicyConfig, RunReport, Severity};
use colored::Colorize;
use serde::Serialize;

const WIDTH: usize = 64;

/// Formats guard results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the three-way triage comparison
    pub fn format_simulation(report: &SimulationReport) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str(&Self::header("Aura Guard: Triage Simulation"));
        output.push('\n');
        output.push_str(&format!(
            "  Assumed tool-call cost: {} per call\n\n",
            usd(report.tool_call_cost)
        ));

        output.push_str(
            &format!(
                "  {:<24} {:>6} {:>7} {:>7} {:>7} {:>8}  {}\n",
                "Variant", "Calls", "SideFX", "Blocks", "Cache", "Cost", "Terminated"
            )
            .bold()
            .to_string(),
        );
        output.push_str(&format!("  {}\n", "─".repeat(72).dimmed()));
        for row in report.variants() {
            output.push_str(&Self::variant_row(row));
        }

        let comparison = &report.comparison;
        output.push('\n');
        output.push_str(&format!(
            "  {} {} ({:.0}%)\n",
            "Cost saved vs no_guard:    ".cyan(),
            usd(comparison.cost_saved).green().bold(),
            comparison.cost_saved_pct
        ));
        output.push_str(&format!(
            "  {} {}\n",
            "Side-effects prevented:    ".cyan(),
            comparison.side_effects_prevented
        ));
        output.push_str(&format!(
            "  {} {}\n",
            "Rewrites issued:           ".cyan(),
            comparison.rewrites_issued
        ));

        output.push_str(&Self::format_run_report(&report.guard_run));
        output
    }

    /// Format as JSON (simulation report with metadata)
    pub fn format_simulation_json(report: &SimulationReport, version: &str) -> String {
        Self::format_json(&report.to_json(version))
    }

    /// Format one run's final report
    pub fn format_run_report(report: &RunReport) -> String {
        let mut output = String::new();

        output.push_str(&Self::section_header(&format!(
            "Run {} ({})",
            report.run_id, report.status
        )));
        output.push_str(&format!(
            "  {} {}\n",
            "Mode:".cyan().bold(),
            if report.enforce { "enforce" } else { "shadow" }
        ));
        output.push_str(&format!(
            "  {} {} proposed, {} executed, {} denied, {} cached, {} rewritten\n",
            "Calls:".cyan().bold(),
            report.calls_proposed,
            report.calls_executed,
            report.calls_denied,
            report.calls_cached,
            report.calls_rewritten
        ));
        if report.shadowed > 0 {
            output.push_str(&format!(
                "  {} {} would have been blocked\n",
                "Shadowed:".yellow().bold(),
                report.shadowed
            ));
        }
        if report.escalations > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                "Escalations:".red().bold(),
                report.escalations
            ));
        }
        output.push_str(&format!(
            "  {} {} (model {}), avoided {}\n",
            "Cost:".cyan().bold(),
            usd(report.total_cost),
            usd(report.model_cost),
            usd(report.cost_avoided).green()
        ));

        if !report.reason_histogram.is_empty() {
            output.push_str(&format!("\n  {}\n", "Reasons:".cyan().bold()));
            for (reason, count) in &report.reason_histogram {
                let label = format!("{:<24}", reason.as_str());
                let label = if reason.is_denial() {
                    label.yellow()
                } else {
                    label.normal()
                };
                output.push_str(&format!("    {} {:>4}\n", label, count));
            }
        }

        if !report.per_tool.is_empty() {
            output.push_str(&format!("\n  {}\n", "Tools:".cyan().bold()));
            for (tool, stats) in &report.per_tool {
                output.push_str(&format!(
                    "    {:<20} {:>3} proposed {:>3} executed {:>3} errors {:>3} denied {:>3} cached  {}\n",
                    tool,
                    stats.proposed,
                    stats.executed,
                    stats.errors,
                    stats.denied,
                    stats.cached,
                    usd(stats.cost)
                ));
            }
        }

        if !report.open_breakers.is_empty() {
            output.push_str(&format!(
                "\n  {} {}\n",
                "Open breakers:".red().bold(),
                report.open_breakers.join(", ")
            ));
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format configuration issues, errors first
    pub fn format_issues(issues: &[ConfigIssue]) -> String {
        if issues.is_empty() {
            return format!("{} configuration is valid\n", "✓".green().bold());
        }

        let mut sorted: Vec<&ConfigIssue> = issues.iter().collect();
        sorted.sort_by_key(|issue| match issue.severity {
            Severity::Error => 0,
            Severity::Warning => 1,
        });

        let mut output = String::new();
        for issue in sorted {
            let label = match issue.severity {
                Severity::Error => "error:".red().bold(),
                Severity::Warning => "warning:".yellow().bold(),
            };
            output.push_str(&format!("{} {}\n", label, issue.message));
        }
        output
    }

    /// Format the effective policy
    pub fn format_policy(policy: &PolicyConfig) -> String {
        let mut output = String::new();
        output.push_str(&Self::section_header("Effective policy"));

        let limit = |value: Option<u32>| value.map_or("unlimited".to_string(), |v| v.to_string());
        let list = |items: Vec<&String>| {
            if items.is_empty() {
                "(none)".dimmed().to_string()
            } else {
                items
                    .into_iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        };

        let mut field = |name: &str, value: String| {
            output.push_str(&format!("  {:<28} {}\n", name.cyan(), value));
        };
        field(
            "mode",
            if policy.enforce { "enforce" } else { "shadow" }.to_string(),
        );
        field(
            "side_effect_tools",
            list(policy.side_effect_tools.iter().collect()),
        );
        field("max_calls_per_tool", limit(policy.max_calls_per_tool));
        for (tool, max) in &policy.per_tool_max_calls {
            field(&format!("  {}", tool), max.to_string());
        }
        field("max_total_calls", limit(policy.max_total_calls));
        field(
            "max_cost_per_run",
            policy
                .max_cost_per_run
                .map_or("unlimited".to_string(), usd),
        );
        field(
            "default_tool_call_cost",
            usd(policy.cost_model.default_tool_call_cost),
        );
        for (tool, cost) in &policy.cost_model.per_tool_cost {
            field(&format!("  {}", tool), usd(*cost));
        }
        field("error_retry_threshold", policy.error_retry_threshold.to_string());
        field("breaker_reset", format!("{:?}", policy.breaker_reset));
        field(
            "non_qualifying_error_codes",
            list(policy.non_qualifying_error_codes.iter().collect()),
        );
        field("escalation_threshold", limit(policy.escalation_threshold));
        field(
            "cache",
            match (policy.cache.enabled, policy.cache.ttl_calls) {
                (false, _) => "disabled".to_string(),
                (true, None) => "enabled".to_string(),
                (true, Some(ttl)) => format!("enabled (ttl {} calls)", ttl),
            },
        );
        field(
            "idempotency_ignored_args",
            list(policy.idempotency_ignored_args.iter().collect()),
        );
        field(
            "fingerprints",
            if policy.secret_key.is_some() {
                "HMAC-SHA256"
            } else {
                "SHA-256"
            }
            .to_string(),
        );

        output
    }

    /// Pretty JSON for any serializable value
    pub fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }

    fn variant_row(row: &VariantResult) -> String {
        let line = format!(
            "  {:<24} {:>6} {:>7} {:>7} {:>7} {:>8}  {}\n",
            row.variant,
            row.tool_calls,
            row.side_effects,
            row.blocks,
            row.cache_hits,
            usd(row.cost),
            row.terminated.as_deref().unwrap_or("-")
        );
        if row.variant == "aura_guard" {
            line.green().to_string()
        } else {
            line
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(WIDTH);
        format!("{}\n  {}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(WIDTH).cyan())
    }
}

fn usd(cost: Cost) -> String {
    format!("${:.2}", cost.as_usd())
}

impl OutputFormatter for ConsoleFormatter {
    fn format_simulation(&self, report: &SimulationReport) -> String {
        Self::format_simulation(report)
    }

    fn format_run_report(&self, report: &RunReport) -> String {
        Self::format_run_report(report)
    }

    fn format_issues(&self, issues: &[ConfigIssue]) -> String {
        Self::format_issues(issues)
    }
}
