//! Application-level configuration.
//!
//! This module provides configuration types that control how use cases behave:
//!
//! - [`SimulationParams`]: inputs of the scripted triage comparison

pub mod simulation_params;

pub use simulation_params::SimulationParams;
