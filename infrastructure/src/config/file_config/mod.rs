//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into domain types, with
//! every problem reported as a [`ConfigIssue`].

mod logging;
mod output;
mod policy;

pub use logging::{FileLoggingConfig, FileWebhookConfig, FileWebhookFormat};
pub use output::{FileOutputConfig, FileOutputFormat};
pub use policy::{FileBreakerConfig, FileCacheConfig, FileCostConfig, FilePolicyConfig};

use aura_domain::{ConfigIssue, PolicyConfig};
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Guard policy applied to new runs
    pub policy: FilePolicyConfig,
    /// Decision log settings
    pub logging: FileLoggingConfig,
    /// Output settings
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.policy.to_policy_config().1;
        issues.extend(self.logging.validate());
        issues
    }

    /// The effective policy together with its issues.
    pub fn to_policy_config(&self) -> (PolicyConfig, Vec<ConfigIssue>) {
        self.policy.to_policy_config()
    }
}
