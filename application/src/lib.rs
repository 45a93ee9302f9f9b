//! Application layer for aura-guard
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::SimulationParams;
pub use ports::decision_log::{
    DecisionLogger, DecisionRecord, InMemoryDecisionLog, NoDecisionLogger,
};
pub use use_cases::guard_service::{GuardError, GuardService};
pub use use_cases::triage_simulation::{
    ScriptStep, SimulationComparison, SimulationReport, TriageSimulation, VariantResult,
    triage_script,
};
