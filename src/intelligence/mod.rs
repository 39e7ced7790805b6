//! Conflict classification, cost estimation and RFI drafting.

pub mod cost;
pub mod detection;
pub mod drafter;
pub mod messages;

pub use cost::CostEstimator;
pub use detection::ConflictClassifier;
pub use drafter::{next_friday, RfiContext, RfiDrafter};
