//! Circuit breakers and error classification.

pub mod circuit;
pub mod classifier;

pub use circuit::{BreakerState, BreakerTransition, CircuitBreaker, CircuitState};
pub use classifier::{AllErrorsQualify, CodeListClassifier, ErrorClassifier};
