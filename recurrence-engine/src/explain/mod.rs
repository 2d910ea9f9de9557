//! Explain Module - Additive Feature Attribution
//!
//! Local explanations are computed per request against a bounded background;
//! the global summary is computed once over the full reference population.

pub mod engine;
pub mod types;

pub use engine::{TreeExplainer, DEFAULT_BACKGROUND_LIMIT};
pub use types::{Direction, FeatureContribution, FeatureImportance, GlobalImportance};
