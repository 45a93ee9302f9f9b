//! CLI entrypoint for Aura Guard
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use aura_application::{DecisionLogger, SimulationParams, TriageSimulation};
use aura_domain::ConfigIssue;
use aura_infrastructure::{
    CompositeDecisionLogger, ConfigLoader, FileConfig, FileOutputFormat, JsonlDecisionLogger,
    TracingDecisionLogger, WebhookDecisionLogger,
};
use aura_presentation::{Cli, Command, ConsoleFormatter, OutputFormat};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.verbose, cli.log_file.as_deref())?;

    info!("Starting Aura Guard");

    // === Configuration ===
    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())?
    };

    if cli.no_color || !config.output.color {
        colored::control::set_override(false);
    }

    let format = cli.output.unwrap_or(match config.output.format {
        Some(FileOutputFormat::Json) => OutputFormat::Json,
        Some(FileOutputFormat::Text) | None => OutputFormat::Text,
    });

    match &cli.command {
        Command::Demo {
            json_out,
            call_limit,
        } => run_demo(&config, format, *call_limit, json_out.as_deref()),
        Command::Check => run_check(&config, format),
        Command::ShowConfig => run_show_config(&cli, &config, format),
    }
}

/// Verbosity flag wins; otherwise `RUST_LOG`, then `warn`.
fn init_tracing(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("--log-file {} has no file name", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            Ok(None)
        }
    }
}

/// Decision sinks requested by `[logging]`.
fn decision_logger(config: &FileConfig) -> Arc<dyn DecisionLogger> {
    let mut composite = CompositeDecisionLogger::new();

    if let Some(path) = config.logging.decision_log_path() {
        match JsonlDecisionLogger::new(&path) {
            Some(logger) => {
                info!("Decision log: {}", logger.path().display());
                composite = composite.with_sink(Arc::new(logger));
            }
            None => warn!("Decision log disabled: cannot open {}", path.display()),
        }
    }
    if let Some(target) = config.logging.webhook_target()
        && let Some(logger) = WebhookDecisionLogger::new(target)
    {
        info!("Decision webhook: {}", logger.endpoint());
        composite = composite.with_sink(Arc::new(logger));
    }
    if config.logging.tracing_decisions {
        composite = composite.with_sink(Arc::new(TracingDecisionLogger));
    }

    Arc::new(composite)
}

/// Effective policy, refusing configurations with fatal issues.
fn checked_policy(config: &FileConfig) -> Result<aura_domain::PolicyConfig> {
    let (policy, issues) = config.to_policy_config();
    for issue in issues.iter().filter(|i| !i.is_error()) {
        warn!("{}", issue);
    }
    if ConfigIssue::has_errors(&issues) {
        eprint!("{}", ConsoleFormatter::format_issues(&issues));
        bail!("invalid configuration");
    }
    Ok(policy)
}

fn run_demo(
    config: &FileConfig,
    format: OutputFormat,
    call_limit: u32,
    json_out: Option<&Path>,
) -> Result<()> {
    // The scripted scenario runs under its fixed policy; only logging is configurable.
    let params = SimulationParams::default().with_call_limit(call_limit);
    let report = TriageSimulation::new(params)
        .with_logger(decision_logger(config))
        .run()?;

    let version = env!("CARGO_PKG_VERSION");
    match format {
        OutputFormat::Text => print!("{}", ConsoleFormatter::format_simulation(&report)),
        OutputFormat::Json => println!(
            "{}",
            ConsoleFormatter::format_simulation_json(&report, version)
        ),
    }

    if let Some(path) = json_out {
        let json = ConsoleFormatter::format_simulation_json(&report, version);
        std::fs::write(path, json + "\n")
            .with_context(|| format!("writing JSON report to {}", path.display()))?;
        if format == OutputFormat::Text {
            println!("  JSON report saved to: {}\n", path.display());
        }
    }

    Ok(())
}

fn run_check(config: &FileConfig, format: OutputFormat) -> Result<()> {
    let issues = config.validate();

    match format {
        OutputFormat::Text => print!("{}", ConsoleFormatter::format_issues(&issues)),
        OutputFormat::Json => println!("{}", ConsoleFormatter::format_json(&issues)),
    }

    if ConfigIssue::has_errors(&issues) {
        bail!(
            "configuration has {} error(s)",
            issues.iter().filter(|i| i.is_error()).count()
        );
    }
    Ok(())
}

fn run_show_config(cli: &Cli, config: &FileConfig, format: OutputFormat) -> Result<()> {
    let policy = checked_policy(config)?;

    match format {
        OutputFormat::Json => println!("{}", ConsoleFormatter::format_json(&policy)),
        OutputFormat::Text => {
            println!("Configuration sources (in priority order):");
            if cli.no_config {
                println!("  [FOUND] Default: built-in defaults (--no-config)");
            } else {
                for source in ConfigLoader::config_sources(cli.config.as_deref()) {
                    println!(
                        "  [{}] {:<8} {}",
                        if source.found { "FOUND" } else { "     " },
                        format!("{}:", source.kind.as_str()),
                        source.location
                    );
                }
            }
            print!("{}", ConsoleFormatter::format_policy(&policy));
            if let Some(path) = config.logging.decision_log_path() {
                println!("  {:<28} {}", "decision_log", path.display());
            }
            if let Some(target) = config.logging.webhook_target() {
                println!("  {:<28} {:?}", "decision_webhook", target.format);
            }
        }
    }
    Ok(())
}
