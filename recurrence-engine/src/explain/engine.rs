//! Tree attribution engine (interventional Tree SHAP)
//!
//! For one input `x` and one background row `r`, a leaf reached while walking
//! the tree is only reachable for coalitions that contain every feature where
//! the walk followed `x` against `r` ("present") and none where it followed `r`
//! ("absent"). The Shapley values of that indicator game have a closed form,
//! so one walk per (tree, background row) yields exact margin attributions.
//!
//! Margin attributions are rescaled per background row into probability
//! space and averaged, so the attributions for `x` sum to
//! `p(x) - mean_r p(r)`.

use std::cmp::Ordering;
use std::sync::Arc;

use ndarray::{Array2, ArrayView1, Axis};
use rayon::prelude::*;

use super::types::{Direction, FeatureContribution, FeatureImportance, GlobalImportance};
use crate::dataset::ReferencePopulation;
use crate::error::{Artifact, EngineError, EngineResult};
use crate::features::FeatureVector;
use crate::model::{sigmoid, Node, ScoringModel, Tree, TreeEnsemble};

/// Default cap on background rows kept for local explanations
pub const DEFAULT_BACKGROUND_LIMIT: usize = 100;

/// Below this margin gap the secant rescale is replaced by the derivative
const MARGIN_EPSILON: f64 = 1e-12;

// ============================================================================
// EXPLAINER
// ============================================================================

pub struct TreeExplainer {
    model: Arc<TreeEnsemble>,
    background: Array2<f64>,
    background_margins: Vec<f64>,
    expected_value: f64,
}

impl TreeExplainer {
    /// Bind to a model with a bounded background drawn from `population`
    pub fn new(
        model: Arc<TreeEnsemble>,
        population: &ReferencePopulation,
        background_limit: usize,
    ) -> EngineResult<Self> {
        if population.feature_count() != model.schema().len() {
            return Err(EngineError::artifact(
                Artifact::ReferenceData,
                format!(
                    "population has {} features, model expects {}",
                    population.feature_count(),
                    model.schema().len()
                ),
            ));
        }

        let background = population.background(background_limit);
        let background_margins: Vec<f64> = background
            .outer_iter()
            .map(|row| model.margin(&row))
            .collect();

        let expected_value = background_margins.iter().map(|m| sigmoid(*m)).sum::<f64>()
            / background_margins.len() as f64;

        log::debug!(
            "Tree explainer ready: {} background rows, expected value {:.4}",
            background.nrows(),
            expected_value
        );

        Ok(Self {
            model,
            background,
            background_margins,
            expected_value,
        })
    }

    /// Mean model probability over the background
    pub fn expected_value(&self) -> f64 {
        self.expected_value
    }

    pub fn background_size(&self) -> usize {
        self.background.nrows()
    }

    /// Raw attributions in schema order (probability units)
    pub fn shap_values(&self, vector: &FeatureVector) -> EngineResult<Vec<f64>> {
        self.model.schema().check(vector)?;
        Ok(self.attribute(vector.values()))
    }

    /// One contribution per schema feature, in schema order
    pub fn explain_local(&self, vector: &FeatureVector) -> EngineResult<Vec<FeatureContribution>> {
        let values = self.shap_values(vector)?;

        Ok(self
            .model
            .schema()
            .names()
            .iter()
            .zip(vector.values())
            .zip(values)
            .map(|((name, &value), attribution)| contribution(name, value, attribution))
            .collect())
    }

    /// Mean |attribution| per feature over the whole population.
    ///
    /// Costs one local explanation per population row; run once at startup.
    pub fn global_importance(&self, population: &ReferencePopulation) -> EngineResult<GlobalImportance> {
        let width = self.model.schema().len();
        let rows: Vec<ArrayView1<'_, f64>> = population.rows().collect();

        let flat: Vec<f64> = rows
            .par_iter()
            .flat_map_iter(|row| self.attribute(&row.to_vec()))
            .collect();

        let attributions = Array2::from_shape_vec((rows.len(), width), flat)
            .map_err(|e| EngineError::artifact(Artifact::ReferenceData, e.to_string()))?;
        let means = attributions
            .mapv(f64::abs)
            .mean_axis(Axis(0))
            .ok_or_else(|| EngineError::artifact(Artifact::ReferenceData, "reference population is empty"))?;

        let mut entries: Vec<FeatureImportance> = self
            .model
            .schema()
            .names()
            .iter()
            .zip(means.iter())
            .map(|(name, &mean_shap)| FeatureImportance {
                feature: name.clone(),
                mean_shap,
            })
            .collect();

        // Stable: ties keep schema order
        entries.sort_by(|a, b| b.mean_shap.partial_cmp(&a.mean_shap).unwrap_or(Ordering::Equal));

        Ok(GlobalImportance { entries })
    }

    fn attribute(&self, x: &[f64]) -> Vec<f64> {
        let width = x.len();
        let fx = self.model.margin(x);
        let px = sigmoid(fx);

        let mut total = vec![0.0; width];
        let mut raw = vec![0.0; width];
        let mut walk = PathState::new(width);

        for (r, &fr) in self.background.outer_iter().zip(&self.background_margins) {
            raw.iter_mut().for_each(|v| *v = 0.0);
            for tree in self.model.trees() {
                walk.run(tree, x, r, &mut raw);
            }

            let gap = fx - fr;
            let scale = if gap.abs() > MARGIN_EPSILON {
                (px - sigmoid(fr)) / gap
            } else {
                px * (1.0 - px)
            };

            for (t, v) in total.iter_mut().zip(&raw) {
                *t += scale * v;
            }
        }

        let n = self.background.nrows() as f64;
        total.iter_mut().for_each(|t| *t /= n);
        total
    }
}

/// Margin attributions of `x` against a single reference row, summed over trees
#[cfg(test)]
fn margin_attributions(model: &TreeEnsemble, x: &[f64], r: &[f64]) -> Vec<f64> {
    let mut phi = vec![0.0; x.len()];
    let mut walk = PathState::new(x.len());
    let r = ArrayView1::from(r);
    for tree in model.trees() {
        walk.run(tree, x, r, &mut phi);
    }
    phi
}

fn contribution(name: &str, value: f64, attribution: f64) -> FeatureContribution {
    let direction = Direction::of(attribution);
    // impact is printed from the rounded magnitude so the two never disagree
    let magnitude = ((attribution * 100.0).abs() * 10.0).round() / 10.0;

    FeatureContribution {
        feature: name.to_string(),
        value,
        attribution,
        magnitude,
        direction,
        impact: format!("{} {:.1}%", direction.arrow(), magnitude),
    }
}

// ============================================================================
// PATH WALK
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Unset,
    Present,
    Absent,
}

/// Scratch state reused across walks of the same width
struct PathState {
    side: Vec<Side>,
    present: Vec<usize>,
    absent: Vec<usize>,
}

impl PathState {
    fn new(width: usize) -> Self {
        Self {
            side: vec![Side::Unset; width],
            present: Vec::new(),
            absent: Vec::new(),
        }
    }

    fn run(&mut self, tree: &Tree, x: &[f64], r: ArrayView1<'_, f64>, phi: &mut [f64]) {
        self.visit(tree, 0, x, r, phi);
    }

    fn visit(&mut self, tree: &Tree, idx: usize, x: &[f64], r: ArrayView1<'_, f64>, phi: &mut [f64]) {
        match tree.nodes[idx] {
            Node::Leaf { leaf } => self.credit(leaf, phi),
            Node::Split { feature, threshold, left, right } => {
                let x_child = if x[feature] < threshold { left } else { right };
                let r_child = if r[feature] < threshold { left } else { right };

                if x_child == r_child {
                    return self.visit(tree, x_child, x, r, phi);
                }

                match self.side[feature] {
                    Side::Present => self.visit(tree, x_child, x, r, phi),
                    Side::Absent => self.visit(tree, r_child, x, r, phi),
                    Side::Unset => {
                        self.side[feature] = Side::Present;
                        self.present.push(feature);
                        self.visit(tree, x_child, x, r, phi);
                        self.present.pop();

                        self.side[feature] = Side::Absent;
                        self.absent.push(feature);
                        self.visit(tree, r_child, x, r, phi);
                        self.absent.pop();

                        self.side[feature] = Side::Unset;
                    }
                }
            }
        }
    }

    /// Shapley values of "all of `present` in S and none of `absent` in S"
    fn credit(&self, leaf: f64, phi: &mut [f64]) {
        let a = self.present.len();
        let b = self.absent.len();
        if a + b == 0 {
            return;
        }

        let c = binomial(a + b, a);
        if a > 0 {
            let w = leaf / (a as f64 * c);
            for &i in &self.present {
                phi[i] += w;
            }
        }
        if b > 0 {
            let w = leaf / (b as f64 * c);
            for &j in &self.absent {
                phi[j] -= w;
            }
        }
    }
}

fn binomial(n: usize, k: usize) -> f64 {
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

// ============================================================================
// TESTS
// ============================================================================
