//! Logging configuration from TOML (`[logging]` section)

use crate::logging::WebhookTarget;
use aura_domain::{ConfigIssue, ConfigIssueCode};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw logging configuration from TOML.
///
/// # Example
///
/// ```toml
/// [logging]
/// decision_log = "~/.local/share/aura-guard/decisions.jsonl"
/// tracing_decisions = true
///
/// [logging.webhook]
/// url = "https://hooks.slack.com/services/T000/B000/XXXX"
/// format = "slack"
/// channel = "#agent-alerts"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL file receiving every decision record. Disabled when unset.
    pub decision_log: Option<String>,
    /// Also emit decision records as `tracing` events.
    pub tracing_decisions: bool,
    /// HTTP endpoint receiving decision records. Disabled without a `url`.
    pub webhook: FileWebhookConfig,
}

/// Webhook body layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileWebhookFormat {
    #[default]
    Json,
    Slack,
}

/// Raw `[logging.webhook]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileWebhookConfig {
    pub url: Option<String>,
    pub format: FileWebhookFormat,
    /// `Authorization` header value, e.g. `"Bearer <token>"`.
    pub auth_header: Option<String>,
    /// Slack channel override.
    pub channel: Option<String>,
    /// Add an RFC 3339 `timestamp` to JSON bodies.
    pub include_timestamp: bool,
    pub timeout_ms: u64,
}

impl Default for FileWebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            format: FileWebhookFormat::Json,
            auth_header: None,
            channel: None,
            include_timestamp: true,
            timeout_ms: 2000,
        }
    }
}

impl FileLoggingConfig {
    /// Decision log path with a leading `~/` expanded.
    pub fn decision_log_path(&self) -> Option<std::path::PathBuf> {
        let raw = self.decision_log.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.strip_prefix("~/") {
            Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
            None => Some(std::path::PathBuf::from(raw)),
        }
    }

    /// Webhook delivery settings, when a URL is configured.
    pub fn webhook_target(&self) -> Option<WebhookTarget> {
        let webhook = &self.webhook;
        let url = webhook.url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }

        let mut target = match webhook.format {
            FileWebhookFormat::Json => WebhookTarget::json(url),
            FileWebhookFormat::Slack => WebhookTarget::slack(url, webhook.channel.clone()),
        }
        .with_timeout(Duration::from_millis(webhook.timeout_ms));
        if let Some(auth) = &webhook.auth_header {
            target = target.with_auth_header(auth.clone());
        }
        if !webhook.include_timestamp {
            target = target.without_timestamp();
        }
        Some(target)
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let webhook = &self.webhook;
        let Some(url) = webhook.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            return issues;
        };

        let valid = Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::MalformedValue {
                    field: "logging.webhook.url".to_string(),
                },
                "logging.webhook.url must be an http:// or https:// URL",
            ));
        }
        if webhook.timeout_ms == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroLimit {
                    field: "logging.webhook.timeout_ms".to_string(),
                },
                "logging.webhook.timeout_ms must be at least 1",
            ));
        }
        if webhook.format == FileWebhookFormat::Json && webhook.channel.is_some() {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::IneffectiveSetting {
                    field: "logging.webhook.channel".to_string(),
                },
                "logging.webhook.channel only applies to format = \"slack\"",
            ));
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::WebhookFormat;

    #[test]
    fn test_logging_deserialize() {
        let toml_str = r#"
[logging]
decision_log = "/tmp/decisions.jsonl"
tracing_decisions = true
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.logging.tracing_decisions);
        assert_eq!(
            config.logging.decision_log_path(),
            Some(std::path::PathBuf::from("/tmp/decisions.jsonl"))
        );
        assert_eq!(config.logging.webhook_target(), None);
    }

    #[test]
    fn test_empty_path_disables_log() {
        let config = FileLoggingConfig {
            decision_log: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.decision_log_path(), None);
        assert_eq!(FileLoggingConfig::default().decision_log_path(), None);
    }

    #[test]
    fn test_slack_webhook_section() {
        let toml_str = r##"
[logging.webhook]
url = "https://hooks.slack.com/services/T0/B0/X"
format = "slack"
channel = "#agent-alerts"
timeout_ms = 500
"##;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.logging.validate().is_empty());

        let target = config.logging.webhook_target().unwrap();
        assert_eq!(target.url, "https://hooks.slack.com/services/T0/B0/X");
        assert_eq!(
            target.format,
            WebhookFormat::Slack {
                channel: Some("#agent-alerts".to_string())
            }
        );
        assert_eq!(target.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_json_webhook_options() {
        let toml_str = r#"
[logging.webhook]
url = "http://localhost:9000/events"
auth_header = "Bearer abc"
include_timestamp = false
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        let target = config.logging.webhook_target().unwrap();
        assert_eq!(
            target.format,
            WebhookFormat::Json {
                include_timestamp: false
            }
        );
        assert_eq!(target.auth_header.as_deref(), Some("Bearer abc"));
        assert_eq!(target.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_webhook_validation() {
        let mut config = FileLoggingConfig::default();
        config.webhook.url = Some("ftp://example.com".to_string());
        config.webhook.timeout_ms = 0;
        config.webhook.channel = Some("#x".to_string());

        let issues = config.validate();
        assert_eq!(issues.iter().filter(|i| i.is_error()).count(), 2);
        assert!(issues.iter().any(|i| matches!(
            &i.code,
            ConfigIssueCode::IneffectiveSetting { field } if field == "logging.webhook.channel"
        )));

        config.webhook.url = Some("  ".to_string());
        assert!(config.validate().is_empty());
        assert_eq!(config.webhook_target(), None);
    }
}
