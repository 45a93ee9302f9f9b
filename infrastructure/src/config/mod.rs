//! Configuration file loading for aura-guard
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. Environment variables `AURA_GUARD_*` (`__` separates nested keys)
//! 2. `--config <path>` specified file
//! 3. Project root: `./aura-guard.toml` or `./.aura-guard.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/aura-guard/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileBreakerConfig, FileCacheConfig, FileConfig, FileCostConfig, FileLoggingConfig,
    FileOutputConfig, FileOutputFormat, FilePolicyConfig, FileWebhookConfig, FileWebhookFormat,
};
pub use loader::{ConfigLoadError, ConfigLoader, ConfigSource, ConfigSourceKind};
