//! Shared test fixtures: a small ensemble over three clinical features

use crate::dataset::ReferencePopulation;
use crate::model::{ScoringModel, TreeEnsemble};

/// Two trees; tree 2 splits twice on `nodes_positive` along one path.
pub const ENSEMBLE_JSON: &str = r#"{
    "feature_names": ["age", "tumor_size", "nodes_positive"],
    "base_score": -0.2,
    "trees": [
        {"nodes": [
            {"feature": 0, "threshold": 50.0, "left": 1, "right": 4},
            {"feature": 1, "threshold": 2.0, "left": 2, "right": 3},
            {"leaf": -0.4},
            {"leaf": 0.3},
            {"leaf": 0.6}
        ]},
        {"nodes": [
            {"feature": 2, "threshold": 1.0, "left": 1, "right": 2},
            {"leaf": -0.5},
            {"feature": 0, "threshold": 40.0, "left": 3, "right": 4},
            {"leaf": 0.2},
            {"feature": 2, "threshold": 3.0, "left": 5, "right": 6},
            {"leaf": 0.4},
            {"leaf": 0.9}
        ]}
    ]
}"#;

pub fn ensemble() -> TreeEnsemble {
    TreeEnsemble::from_json(ENSEMBLE_JSON).unwrap()
}

pub fn population_rows() -> Vec<Vec<f64>> {
    vec![
        vec![35.0, 1.2, 0.0],
        vec![62.0, 3.1, 2.0],
        vec![48.0, 2.5, 4.0],
        vec![55.0, 0.8, 0.0],
        vec![41.0, 1.9, 1.0],
        vec![70.0, 4.4, 5.0],
    ]
}

pub fn population() -> ReferencePopulation {
    ReferencePopulation::from_rows(ensemble().schema(), population_rows()).unwrap()
}
