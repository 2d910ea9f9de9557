//! Recurrence Risk Engine
//!
//! Scores a clinical feature vector with a pre-fitted tree ensemble, applies
//! the tuned decision threshold and explains the result with additive
//! per-feature attributions.
//!
//! ## Layout
//! - `features/` - feature schema, payload validation, vectors
//! - `model/` - tree ensemble inference, decision threshold
//! - `explain/` - Tree SHAP attribution, global importance
//! - `dataset/` - reference population
//! - `context` - `RiskEngine`, the immutable process-wide context

pub mod context;
pub mod dataset;
pub mod error;
pub mod explain;
pub mod features;
pub mod model;

#[cfg(test)]
mod fixtures;

pub use context::{ArtifactPaths, RiskAssessment, RiskEngine};
pub use dataset::ReferencePopulation;
pub use error::{Artifact, EngineError, EngineResult};
pub use explain::{
    Direction, FeatureContribution, FeatureImportance, GlobalImportance, TreeExplainer,
    DEFAULT_BACKGROUND_LIMIT,
};
pub use features::{FeatureSchema, FeatureVector};
pub use model::{DecisionPolicy, ModelMetadata, RiskLabel, ScoringModel, TreeEnsemble};
