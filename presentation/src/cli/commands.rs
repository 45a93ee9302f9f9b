//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored tables for the terminal
    Text,
    /// JSON output
    Json,
}

/// CLI arguments for aura-guard
#[derive(Parser, Debug)]
#[command(name = "aura-guard")]
#[command(author, version, about = "Tool-call guard for AI agents")]
#[command(long_about = r#"
Aura Guard decides, before each tool call an agent proposes, whether the call
may run. It blocks duplicate side effects, serves repeated reads from a cache,
enforces call and cost ceilings, and cuts off tools that keep failing.

Configuration files are loaded from (in priority order):
1. AURA_GUARD_* environment variables (e.g. AURA_GUARD_POLICY__MAX_TOTAL_CALLS=50)
2. --config <path>        Explicit config file
3. ./aura-guard.toml      Project-level config
4. ~/.config/aura-guard/config.toml   Global config

Example:
  aura-guard demo
  aura-guard demo --json-out demo.json
  aura-guard --config guard.toml check
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format (overrides [output] format in config)
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the triage simulation: no guard vs call limit vs guard
    Demo {
        /// Also write the comparison as JSON to this file
        #[arg(long, value_name = "PATH")]
        json_out: Option<PathBuf>,

        /// Stop the naive variant after this many tool calls
        #[arg(long, value_name = "N", default_value_t = 5)]
        call_limit: u32,
    },

    /// Validate the effective configuration
    Check,

    /// Show configuration sources and the effective policy
    ShowConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_demo() {
        let cli = Cli::try_parse_from(["aura-guard", "demo", "--json-out", "out.json"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Demo {
                json_out: Some(PathBuf::from("out.json")),
                call_limit: 5,
            }
        );
        assert_eq!(cli.output, None);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "aura-guard",
            "check",
            "-vv",
            "--output",
            "json",
            "--config",
            "guard.toml",
        ])
        .unwrap();
        assert_eq!(cli.command, Command::Check);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output, Some(OutputFormat::Json));
        assert_eq!(cli.config, Some(PathBuf::from("guard.toml")));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["aura-guard"]).is_err());
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
