//! Model Module - Scoring & Decision
//!
//! Inference (tree ensemble → probability) is kept apart from the decision
//! policy (probability → label) so either can be swapped independently.

pub mod inference;
pub mod threshold;

// Re-export common types
pub use inference::{sigmoid, ModelMetadata, Node, ScoringModel, Tree, TreeEnsemble};
pub use threshold::{DecisionPolicy, RiskLabel};
