//! The decision engine and its inputs and outputs.

pub mod decision;
pub mod decision_engine;
pub mod hooks;

pub use decision::{Decision, ProposedCall};
pub use decision_engine::DecisionEngine;
pub use hooks::{NoRewrite, PolicyHooks, RewriteAdvisor, RewriteContext};
