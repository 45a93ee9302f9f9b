//! Infrastructure layer for aura-guard
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod logging;

// Re-export commonly used types
pub use config::{
    ConfigLoadError, ConfigLoader, ConfigSource, ConfigSourceKind, FileBreakerConfig,
    FileCacheConfig, FileConfig, FileCostConfig, FileLoggingConfig, FileOutputConfig,
    FileOutputFormat, FilePolicyConfig, FileWebhookConfig, FileWebhookFormat,
};
pub use logging::{
    CompositeDecisionLogger, JsonlDecisionLogger, TracingDecisionLogger, WebhookDecisionLogger,
    WebhookFormat, WebhookTarget,
};
