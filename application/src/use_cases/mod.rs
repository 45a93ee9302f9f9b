//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod guard_service;
pub mod triage_simulation;
