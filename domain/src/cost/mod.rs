//! Cost accounting: exact money type and the pure cost model.

pub mod model;
pub mod money;

pub use model::{CallKind, CostModel, TokenUsage};
pub use money::{Cost, InvalidCost};
