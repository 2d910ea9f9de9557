//! Risk Engine - process-wide scoring context
//!
//! Built once at startup from the three artifacts and shared read-only
//! (`Arc<RiskEngine>`) by every request. There is no reload path: the
//! model, threshold and cached global importance live as long as the process.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dataset::ReferencePopulation;
use crate::error::EngineResult;
use crate::explain::{FeatureContribution, GlobalImportance, TreeExplainer};
use crate::features::{FeatureSchema, FeatureVector};
use crate::model::{DecisionPolicy, ModelMetadata, RiskLabel, ScoringModel, TreeEnsemble};

/// Locations of the startup artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub threshold: PathBuf,
    pub reference_data: PathBuf,
}

/// Outcome of scoring one feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub prediction: RiskLabel,
    /// Rounded to 3 decimals for reporting; the label uses the exact value
    pub probability: f64,
    pub shap_summary: Vec<FeatureContribution>,
}

pub struct RiskEngine {
    model: Arc<TreeEnsemble>,
    policy: DecisionPolicy,
    explainer: TreeExplainer,
    global: GlobalImportance,
}

impl RiskEngine {
    /// Load every artifact and precompute global importance
    pub fn load(paths: &ArtifactPaths, background_limit: usize) -> EngineResult<Self> {
        let model = TreeEnsemble::load(&paths.model)?;
        let policy = DecisionPolicy::load(&paths.threshold)?;
        let population = ReferencePopulation::load(&paths.reference_data, model.schema())?;

        Self::new(model, policy, &population, background_limit)
    }

    pub fn new(
        model: TreeEnsemble,
        policy: DecisionPolicy,
        population: &ReferencePopulation,
        background_limit: usize,
    ) -> EngineResult<Self> {
        let model = Arc::new(model);
        let explainer = TreeExplainer::new(Arc::clone(&model), population, background_limit)?;

        let started = Instant::now();
        let global = explainer.global_importance(population)?;
        log::info!(
            "Global importance computed over {} rows in {:.2?} (background {})",
            population.len(),
            started.elapsed(),
            explainer.background_size()
        );
        if let Some(top) = global.top(1).first() {
            log::debug!("Most influential feature: {} ({:.4})", top.feature, top.mean_shap);
        }

        Ok(Self {
            model,
            policy,
            explainer,
            global,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.model.schema()
    }

    /// Ordered feature names
    pub fn feature_schema(&self) -> &[String] {
        self.model.schema().names()
    }

    /// Validate an inbound payload against the schema
    pub fn parse_features(&self, payload: &Map<String, Value>) -> EngineResult<FeatureVector> {
        self.model.schema().parse(payload)
    }

    pub fn probability(&self, vector: &FeatureVector) -> EngineResult<f64> {
        self.model.probability(vector)
    }

    pub fn classify(&self, probability: f64) -> RiskLabel {
        self.policy.classify(probability)
    }

    pub fn explain_local(&self, vector: &FeatureVector) -> EngineResult<Vec<FeatureContribution>> {
        self.explainer.explain_local(vector)
    }

    /// Model → policy → explainer for one input
    pub fn score_and_explain(&self, vector: &FeatureVector) -> EngineResult<RiskAssessment> {
        let probability = self.probability(vector)?;
        let prediction = self.classify(probability);
        let shap_summary = self.explain_local(vector)?;

        log::debug!("Scored vector: p={:.4} -> {}", probability, prediction);

        Ok(RiskAssessment {
            prediction,
            probability: round_to(probability, 3),
            shap_summary,
        })
    }

    /// Cached at construction; never recomputed
    pub fn global_importance(&self) -> &GlobalImportance {
        &self.global
    }

    pub fn expected_value(&self) -> f64 {
        self.explainer.expected_value()
    }

    pub fn threshold(&self) -> f64 {
        self.policy.threshold()
    }

    pub fn model_metadata(&self) -> ModelMetadata {
        self.model.metadata()
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
