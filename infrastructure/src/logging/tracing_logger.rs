//! Decision records as `tracing` events.

use aura_application::ports::decision_log::{DecisionLogger, DecisionRecord};
use tracing::info;

/// Forwards every record to `tracing` under the `aura_guard::decisions`
/// target, so decisions can be filtered with `RUST_LOG`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDecisionLogger;

impl DecisionLogger for TracingDecisionLogger {
    fn log(&self, record: DecisionRecord) {
        info!(
            target: "aura_guard::decisions",
            event_type = record.event_type,
            payload = %record.payload
        );
    }
}
