//! Core domain concepts shared across all subdomains.
//!
//! - [`ids::RunId`] / [`ids::CallEventId`]: run and call event identifiers
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod ids;
