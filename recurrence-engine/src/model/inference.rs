//! Inference Engine - Tree Ensemble Scoring
//!
//! Loads a pre-fitted gradient-boosted tree ensemble from its JSON artifact
//! and turns a feature vector into a recurrence probability.
//!
//! Artifact layout:
//!
//! ```json
//! {
//!   "feature_names": ["age", "tumor_size"],
//!   "base_score": -0.2,
//!   "trees": [
//!     { "nodes": [
//!         { "feature": 0, "threshold": 50.0, "left": 1, "right": 2 },
//!         { "leaf": -0.4 },
//!         { "leaf": 0.6 }
//!     ] }
//!   ]
//! }
//! ```
//!
//! Splits route `x < threshold` to `left`. `base_score` and leaf values are
//! log-odds margins; the probability is `sigmoid(base_score + sum(leaves))`.

use std::ops::Index;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Artifact, EngineError, EngineResult};
use crate::features::{FeatureSchema, FeatureVector};

// ============================================================================
// SCORING MODEL TRAIT
// ============================================================================

/// Pre-fitted scoring model
pub trait ScoringModel: Send + Sync {
    fn schema(&self) -> &FeatureSchema;

    /// Probability of the positive (recurrence) class, in [0, 1]
    fn probability(&self, vector: &FeatureVector) -> EngineResult<f64>;
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// One node of a decision tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: f64,
    },
}

/// Decision tree stored as a flat node array, root at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Margin contribution of this tree for `x`
    pub fn predict<X>(&self, x: &X) -> f64
    where
        X: Index<usize, Output = f64> + ?Sized,
    {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { leaf } => return leaf,
                Node::Split { feature, threshold, left, right } => {
                    idx = if x[feature] < threshold { left } else { right };
                }
            }
        }
    }

    /// Children must point forward, which also rules out cycles
    fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        let len = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Leaf { leaf } => {
                    if !leaf.is_finite() {
                        return Err(format!("node {}: leaf value is not finite", i));
                    }
                }
                Node::Split { feature, threshold, left, right } => {
                    if feature >= feature_count {
                        return Err(format!(
                            "node {}: feature index {} out of range (schema has {})",
                            i, feature, feature_count
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {}: threshold is not finite", i));
                    }
                    for child in [left, right] {
                        if child <= i || child >= len {
                            return Err(format!("node {}: invalid child index {}", i, child));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Serialized ensemble as written by the training pipeline
#[derive(Debug, Deserialize)]
struct EnsembleArtifact {
    feature_names: Vec<String>,
    #[serde(default)]
    base_score: f64,
    trees: Vec<Tree>,
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub source: String,
    pub tree_count: usize,
    pub feature_count: usize,
    pub layout_hash: u32,
}

// ============================================================================
// TREE ENSEMBLE
// ============================================================================

/// Gradient-boosted tree ensemble with a logistic link
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    schema: FeatureSchema,
    base_score: f64,
    trees: Vec<Tree>,
    source: String,
}

impl TreeEnsemble {
    /// Load ensemble from file
    pub fn load(path: &Path) -> EngineResult<Self> {
        log::info!("Loading tree ensemble from: {}", path.display());

        let text = std::fs::read_to_string(path).map_err(|e| {
            EngineError::artifact(Artifact::Model, format!("{}: {}", path.display(), e))
        })?;

        let mut model = Self::from_json(&text)?;
        model.source = path.display().to_string();

        log::info!(
            "Tree ensemble loaded: {} trees over {} features (layout {:08x})",
            model.trees.len(),
            model.schema.len(),
            model.schema.fingerprint()
        );
        Ok(model)
    }

    /// Parse and validate an ensemble from its JSON form
    pub fn from_json(text: &str) -> EngineResult<Self> {
        let artifact: EnsembleArtifact = serde_json::from_str(text)
            .map_err(|e| EngineError::artifact(Artifact::Model, e.to_string()))?;

        let schema = FeatureSchema::new(artifact.feature_names)
            .map_err(|e| EngineError::artifact(Artifact::Model, e.to_string()))?;

        Self::from_parts(schema, artifact.base_score, artifact.trees)
    }

    pub fn from_parts(schema: FeatureSchema, base_score: f64, trees: Vec<Tree>) -> EngineResult<Self> {
        if trees.is_empty() {
            return Err(EngineError::artifact(Artifact::Model, "ensemble has no trees"));
        }
        if !base_score.is_finite() {
            return Err(EngineError::artifact(Artifact::Model, "base_score is not finite"));
        }

        for (i, tree) in trees.iter().enumerate() {
            tree.validate(schema.len())
                .map_err(|reason| EngineError::artifact(Artifact::Model, format!("tree {}: {}", i, reason)))?;
        }

        Ok(Self {
            schema,
            base_score,
            trees,
            source: "<memory>".to_string(),
        })
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    /// Raw log-odds output for values in schema order
    pub fn margin<X>(&self, x: &X) -> f64
    where
        X: Index<usize, Output = f64> + ?Sized,
    {
        self.base_score + self.trees.iter().map(|t| t.predict(x)).sum::<f64>()
    }

    pub fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            source: self.source.clone(),
            tree_count: self.trees.len(),
            feature_count: self.schema.len(),
            layout_hash: self.schema.fingerprint(),
        }
    }
}

impl ScoringModel for TreeEnsemble {
    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn probability(&self, vector: &FeatureVector) -> EngineResult<f64> {
        self.schema.check(vector)?;
        Ok(sigmoid(self.margin(vector.values())))
    }
}

/// Logistic link, stable for large |margin|
pub fn sigmoid(margin: f64) -> f64 {
    if margin >= 0.0 {
        1.0 / (1.0 + (-margin).exp())
    } else {
        let e = margin.exp();
        e / (1.0 + e)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_load_fixture() {
        let model = fixtures::ensemble();
        assert_eq!(model.trees().len(), 2);
        assert_eq!(model.schema().names(), &["age", "tumor_size", "nodes_positive"]);

        let meta = model.metadata();
        assert_eq!(meta.tree_count, 2);
        assert_eq!(meta.feature_count, 3);
        assert_eq!(meta.source, "<memory>");
    }

    #[test]
    fn test_margin_follows_splits() {
        let model = fixtures::ensemble();
        // tree 1: age < 50, tumor_size >= 2.0 -> 0.3
        // tree 2: nodes_positive >= 1, age >= 40, nodes_positive < 3 -> 0.4
        let m = model.margin(&[45.0, 2.3, 1.0]);
        assert!((m - (-0.2 + 0.3 + 0.4)).abs() < 1e-12);
    }

    #[test]
    fn test_probability_in_unit_interval() {
        let model = fixtures::ensemble();
        let schema = model.schema().clone();

        for age in [0.0, 39.0, 40.0, 49.9, 50.0, 90.0] {
            for size in [0.0, 1.99, 2.0, 8.0] {
                for nodes in [0.0, 1.0, 3.0, 20.0] {
                    let v = schema.vector(vec![age, size, nodes]).unwrap();
                    let p = model.probability(&v).unwrap();
                    assert!((0.0..=1.0).contains(&p), "p={} out of range", p);
                }
            }
        }
    }

    #[test]
    fn test_probability_rejects_foreign_vector() {
        let model = fixtures::ensemble();
        let other = FeatureSchema::new(vec!["x".to_string(), "y".to_string(), "z".to_string()]).unwrap();
        let v = other.vector(vec![1.0, 2.0, 3.0]).unwrap();

        let err = model.probability(&v).unwrap_err();
        assert!(matches!(err, EngineError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_sigmoid_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_rejects_malformed_artifacts() {
        let cases = [
            // not json
            "not json",
            // no trees
            r#"{"feature_names": ["a"], "trees": []}"#,
            // feature index out of range
            r#"{"feature_names": ["a"], "trees": [{"nodes": [
                {"feature": 1, "threshold": 0.5, "left": 1, "right": 2},
                {"leaf": 0.1}, {"leaf": 0.2}]}]}"#,
            // backward child (cycle)
            r#"{"feature_names": ["a"], "trees": [{"nodes": [
                {"feature": 0, "threshold": 0.5, "left": 0, "right": 1},
                {"leaf": 0.2}]}]}"#,
            // child past the end
            r#"{"feature_names": ["a"], "trees": [{"nodes": [
                {"feature": 0, "threshold": 0.5, "left": 1, "right": 5},
                {"leaf": 0.2}]}]}"#,
            // duplicate feature names
            r#"{"feature_names": ["a", "a"], "trees": [{"nodes": [{"leaf": 0.2}]}]}"#,
        ];

        for case in cases {
            let err = TreeEnsemble::from_json(case).unwrap_err();
            assert!(
                matches!(err, EngineError::UpstreamArtifact { artifact: Artifact::Model, .. }),
                "expected model artifact error for {case}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = TreeEnsemble::load(Path::new("/nonexistent/final_model.json")).unwrap_err();
        assert!(matches!(err, EngineError::UpstreamArtifact { artifact: Artifact::Model, .. }));
    }

    #[test]
    fn test_load_from_disk_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final_model.json");
        std::fs::write(&path, fixtures::ENSEMBLE_JSON).unwrap();

        let model = TreeEnsemble::load(&path).unwrap();
        assert_eq!(model.metadata().source, path.display().to_string());
    }
}
