//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const PROJECT_FILENAMES: [&str; 2] = ["aura-guard.toml", ".aura-guard.toml"];
const ENV_PREFIX: &str = "AURA_GUARD_";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

/// Where a configuration layer comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSourceKind {
    Explicit,
    Project,
    Global,
    Environment,
    Default,
}

impl ConfigSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigSourceKind::Explicit => "Explicit",
            ConfigSourceKind::Project => "Project",
            ConfigSourceKind::Global => "Global",
            ConfigSourceKind::Environment => "Env",
            ConfigSourceKind::Default => "Default",
        }
    }
}

/// One configuration layer, for `show-config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub kind: ConfigSourceKind,
    /// File path, or a description for non-file layers.
    pub location: String,
    pub found: bool,
}

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. Environment: `AURA_GUARD_POLICY__MAX_TOTAL_CALLS=50` etc.
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./aura-guard.toml` or `./.aura-guard.toml`
    /// 4. XDG config: `$XDG_CONFIG_HOME/aura-guard/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, ConfigLoadError> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(project_path) = Self::project_config_path() {
            debug!("Loading project config from {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigLoadError::NotFound(path.to_path_buf()));
            }
            debug!("Loading config from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract().map_err(|e| ConfigLoadError::from(Box::new(e)))
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    ///
    /// Returns XDG_CONFIG_HOME/aura-guard/config.toml if set,
    /// otherwise falls back to ~/.config/aura-guard/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("aura-guard").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILENAMES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Configuration layers in priority order (highest first).
    pub fn config_sources(config_path: Option<&Path>) -> Vec<ConfigSource> {
        let mut sources = Vec::new();

        sources.push(ConfigSource {
            kind: ConfigSourceKind::Environment,
            location: format!("{}* variables", ENV_PREFIX),
            found: std::env::vars().any(|(key, _)| key.starts_with(ENV_PREFIX)),
        });

        if let Some(path) = config_path {
            sources.push(ConfigSource {
                kind: ConfigSourceKind::Explicit,
                location: path.display().to_string(),
                found: path.exists(),
            });
        }

        sources.push(match Self::project_config_path() {
            Some(path) => ConfigSource {
                kind: ConfigSourceKind::Project,
                location: path.display().to_string(),
                found: true,
            },
            None => ConfigSource {
                kind: ConfigSourceKind::Project,
                location: format!("./{} or ./{}", PROJECT_FILENAMES[0], PROJECT_FILENAMES[1]),
                found: false,
            },
        });

        if let Some(path) = Self::global_config_path() {
            sources.push(ConfigSource {
                kind: ConfigSourceKind::Global,
                found: path.exists(),
                location: path.display().to_string(),
            });
        }

        sources.push(ConfigSource {
            kind: ConfigSourceKind::Default,
            location: "built-in defaults".to_string(),
            found: true,
        });
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert!(config.policy.enforce);
        assert_eq!(config.policy.max_calls_per_tool, Some(25));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_global_config_path_returns_some() {
        // Should return a path (even if file doesn't exist)
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("aura-guard"));
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[policy]
side_effect_tools = ["refund"]
max_total_calls = 12

[policy.breaker]
reset = "cooldown"
"#
        )
        .unwrap();

        let config = ConfigLoader::load(Some(file.path())).unwrap();
        assert_eq!(config.policy.side_effect_tools, vec!["refund".to_string()]);
        assert_eq!(config.policy.max_total_calls, Some(12));
        assert_eq!(config.policy.breaker.reset, "cooldown");
        // Untouched keys keep their defaults
        assert_eq!(config.policy.breaker.cooldown_blocked_calls, 3);
        assert_eq!(config.policy.error_retry_threshold, 3);
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            ConfigLoader::load(Some(&missing)),
            Err(ConfigLoadError::NotFound(path)) if path == missing
        ));
    }

    #[test]
    fn test_invalid_type_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[policy]\nmax_total_calls = \"many\"").unwrap();
        assert!(matches!(
            ConfigLoader::load(Some(file.path())),
            Err(ConfigLoadError::Invalid(_))
        ));
    }

    #[test]
    fn test_config_sources_order() {
        let sources = ConfigLoader::config_sources(Some(Path::new("custom.toml")));
        let kinds: Vec<ConfigSourceKind> = sources.iter().map(|s| s.kind).collect();
        assert_eq!(kinds.first(), Some(&ConfigSourceKind::Environment));
        assert_eq!(kinds.get(1), Some(&ConfigSourceKind::Explicit));
        assert_eq!(kinds.last(), Some(&ConfigSourceKind::Default));
    }
}
