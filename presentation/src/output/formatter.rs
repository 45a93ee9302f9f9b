//! Output formatter trait

use aura_application::SimulationReport;
use aura_domain::{ConfigIssue, RunReport};

/// Trait for formatting guard results
pub trait OutputFormatter {
    /// Format the triage simulation comparison
    fn format_simulation(&self, report: &SimulationReport) -> String;

    /// Format one run's final report
    fn format_run_report(&self, report: &RunReport) -> String;

    /// Format configuration issues
    fn format_issues(&self, issues: &[ConfigIssue]) -> String;
}
