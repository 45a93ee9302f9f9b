//! Guard policy: configuration, validation issues, and the reason-code vocabulary.

pub mod config;
pub mod reason;
pub mod validation;

pub use config::{BreakerReset, CachePolicy, PolicyConfig};
pub use reason::{DecisionOutcome, ReasonCode, UnknownReasonCode};
pub use validation::{ConfigIssue, ConfigIssueCode, Severity};
