//! Logging infrastructure: decision record sinks.
//!
//! Adapters for the [`DecisionLogger`](aura_application::DecisionLogger) port:
//! a JSONL file writer, an HTTP webhook, a `tracing` forwarder, and a fan-out
//! composite.

mod composite;
mod jsonl_logger;
mod tracing_logger;
mod webhook_logger;

pub use composite::CompositeDecisionLogger;
pub use jsonl_logger::JsonlDecisionLogger;
pub use tracing_logger::TracingDecisionLogger;
pub use webhook_logger::{WebhookDecisionLogger, WebhookFormat, WebhookTarget};

use aura_application::ports::decision_log::DecisionRecord;
use serde_json::Value;

/// RFC 3339 UTC timestamp with millisecond precision.
fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Merge `type` (and `timestamp`, when given) into the payload object.
/// Non-object payloads are nested under `data`.
fn flatten_record(record: DecisionRecord, timestamp: Option<String>) -> Value {
    let mut map = match record.payload {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    map.insert(
        "type".to_string(),
        Value::String(record.event_type.to_string()),
    );
    if let Some(timestamp) = timestamp {
        map.insert("timestamp".to_string(), Value::String(timestamp));
    }
    Value::Object(map)
}
