//! Call-count and cost ceilings.

pub mod counters;

pub use counters::{BudgetDenial, BudgetWarning, CommitReceipt, Reservation, RunCounters};
