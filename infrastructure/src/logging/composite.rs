//! Fan-out decision logger.

use aura_application::ports::decision_log::{DecisionLogger, DecisionRecord};
use std::sync::Arc;

/// Sends each record to every inner logger, in order.
#[derive(Default, Clone)]
pub struct CompositeDecisionLogger {
    sinks: Vec<Arc<dyn DecisionLogger>>,
}

impl CompositeDecisionLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn DecisionLogger>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl DecisionLogger for CompositeDecisionLogger {
    fn log(&self, record: DecisionRecord) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.log(record.clone());
            }
            last.log(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aura_application::InMemoryDecisionLog;
    use serde_json::json;

    #[test]
    fn test_fans_out_to_every_sink() {
        let a = Arc::new(InMemoryDecisionLog::new());
        let b = Arc::new(InMemoryDecisionLog::new());
        let composite = CompositeDecisionLogger::new()
            .with_sink(a.clone())
            .with_sink(b.clone());
        assert_eq!(composite.len(), 2);

        composite.log(DecisionRecord::new("decision", json!({"seq": 1})));
        composite.log(DecisionRecord::new("decision", json!({"seq": 2})));

        assert_eq!(a.len(), 2);
        assert_eq!(b.records(), a.records());
    }

    #[test]
    fn test_empty_composite_is_noop() {
        let composite = CompositeDecisionLogger::new();
        assert!(composite.is_empty());
        composite.log(DecisionRecord::new("decision", json!({})));
    }
}
