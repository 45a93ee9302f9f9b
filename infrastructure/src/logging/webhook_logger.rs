//! HTTP webhook sink for guard decision records.
//!
//! Records are queued to a background thread that POSTs them, so a slow or
//! unreachable endpoint never delays a decision. Failed deliveries are logged
//! with `warn!` and dropped.

use super::{flatten_record, timestamp_now};
use aura_application::ports::decision_log::{DecisionLogger, DecisionRecord};
use reqwest::Url;
use serde_json::{Value, json};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// Records waiting for delivery beyond this are dropped.
const QUEUE_CAPACITY: usize = 256;

/// Body layout sent to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookFormat {
    /// Every record as a flat JSON object with a `type` field.
    Json { include_timestamp: bool },
    /// Slack incoming-webhook message. Routine records are skipped.
    Slack { channel: Option<String> },
}

/// Where and how to deliver records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub url: String,
    pub format: WebhookFormat,
    /// Sent verbatim as the `Authorization` header, e.g. `Bearer <token>`.
    pub auth_header: Option<String>,
    pub timeout: Duration,
}

impl WebhookTarget {
    pub fn json(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: WebhookFormat::Json {
                include_timestamp: true,
            },
            auth_header: None,
            timeout: Duration::from_secs(2),
        }
    }

    pub fn slack(url: impl Into<String>, channel: Option<String>) -> Self {
        Self {
            format: WebhookFormat::Slack { channel },
            ..Self::json(url)
        }
    }

    pub fn with_auth_header(mut self, header: impl Into<String>) -> Self {
        self.auth_header = Some(header.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn without_timestamp(mut self) -> Self {
        if let WebhookFormat::Json { include_timestamp } = &mut self.format {
            *include_timestamp = false;
        }
        self
    }

    /// Request body for a record, or `None` when the format skips it.
    fn body(&self, record: DecisionRecord) -> Option<Value> {
        match &self.format {
            WebhookFormat::Json { include_timestamp } => {
                let timestamp = include_timestamp.then(timestamp_now);
                Some(flatten_record(record, timestamp))
            }
            WebhookFormat::Slack { channel } => {
                is_notable(&record).then(|| slack_message(&record, channel.as_deref()))
            }
        }
    }
}

/// Decision logger that POSTs records to an HTTP endpoint.
///
/// Dropping the logger waits for queued records to be delivered.
pub struct WebhookDecisionLogger {
    target: WebhookTarget,
    /// Host only; webhook URLs often embed credentials.
    endpoint: String,
    sender: Option<SyncSender<Value>>,
    worker: Option<JoinHandle<()>>,
}

impl WebhookDecisionLogger {
    /// Start the delivery thread. Returns `None` if the URL is not http(s)
    /// or the HTTP client cannot be built.
    pub fn new(target: WebhookTarget) -> Option<Self> {
        let url = match Url::parse(&target.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                warn!("Webhook disabled: unsupported scheme {}", url.scheme());
                return None;
            }
            Err(e) => {
                warn!("Webhook disabled: invalid URL: {}", e);
                return None;
            }
        };
        let endpoint = url.host_str().unwrap_or("webhook").to_string();

        let client = match reqwest::blocking::Client::builder()
            .timeout(target.timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!("Webhook disabled: cannot build HTTP client: {}", e);
                return None;
            }
        };

        let (sender, receiver) = mpsc::sync_channel::<Value>(QUEUE_CAPACITY);
        let auth_header = target.auth_header.clone();
        let host = endpoint.clone();
        let worker = std::thread::Builder::new()
            .name("aura-guard-webhook".to_string())
            .spawn(move || {
                for body in receiver {
                    let mut request = client.post(url.clone()).json(&body);
                    if let Some(auth) = &auth_header {
                        request = request.header(reqwest::header::AUTHORIZATION, auth);
                    }
                    match request.send() {
                        Ok(response) if response.status().is_success() => {
                            debug!("Delivered decision record to {}", host);
                        }
                        Ok(response) => {
                            warn!("Webhook {} rejected decision record: {}", host, response.status());
                        }
                        Err(e) => warn!("Webhook {} delivery failed: {}", host, e),
                    }
                }
            });
        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Webhook disabled: cannot start delivery thread: {}", e);
                return None;
            }
        };

        Some(Self {
            target,
            endpoint,
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Host part of the webhook URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl DecisionLogger for WebhookDecisionLogger {
    fn log(&self, record: DecisionRecord) {
        let Some(body) = self.target.body(record) else {
            return;
        };
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(body) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Webhook {} queue full, dropping decision record", self.endpoint);
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("Webhook {} delivery thread stopped", self.endpoint);
            }
        }
    }
}

impl Drop for WebhookDecisionLogger {
    fn drop(&mut self) {
        // Closing the channel ends the worker once the queue drains.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Denials, shadowed denials, errors and lifecycle events. Plain allows,
/// successful outcomes and model charges are routine.
fn is_notable(record: &DecisionRecord) -> bool {
    let payload = &record.payload;
    match record.event_type {
        "decision" => {
            payload.get("outcome").and_then(Value::as_str) != Some("allow")
                || !payload.get("shadowed").is_none_or(Value::is_null)
        }
        "outcome" => payload.get("status").and_then(Value::as_str) == Some("error"),
        "model_usage" => false,
        _ => true,
    }
}

fn slack_marker(event_type: &str, reason: Option<&str>) -> &'static str {
    match (event_type, reason) {
        (_, Some("allow_from_cache")) => ":arrows_counterclockwise:",
        (_, Some("duplicate_side_effect")) => ":repeat:",
        (_, Some("circuit_open")) => ":no_entry_sign:",
        (_, Some("max_calls_per_tool" | "max_total_calls")) => ":octagonal_sign:",
        (_, Some("max_cost_per_run")) => ":money_with_wings:",
        (_, Some("escalate")) => ":rotating_light:",
        ("budget_warning", _) => ":warning:",
        ("breaker_transition", _) => ":zap:",
        ("outcome", _) => ":boom:",
        _ => ":shield:",
    }
}

fn slack_message(record: &DecisionRecord, channel: Option<&str>) -> Value {
    let payload = &record.payload;
    let field = |name: &str| payload.get(name).and_then(Value::as_str);
    let reason = field("reason");

    let mut lines = vec![format!(
        "{} *Aura Guard*: `{}`",
        slack_marker(record.event_type, reason),
        record.event_type
    )];
    if let Some(tool) = field("tool").filter(|t| !t.is_empty()) {
        lines.push(format!("Tool: `{}`", tool));
    }
    if let Some(reason) = reason {
        lines.push(format!("Reason: {}", reason));
    }
    if let Some(transition) = field("transition") {
        lines.push(format!("Breaker: {}", transition));
    }
    if let Some(code) = field("error_code") {
        lines.push(format!("Error: {}", code));
    }
    if let Some(run_id) = field("run_id") {
        lines.push(format!("Run: `{}`", run_id));
    }
    if let Some(cost) = payload.get("estimated_cost_avoided").and_then(Value::as_f64) {
        lines.push(format!("Cost avoided: ${:.4}", cost));
    }

    let mut message = json!({ "text": lines.join("\n") });
    if let Some(channel) = channel {
        message["channel"] = json!(channel);
    }
    message
}
