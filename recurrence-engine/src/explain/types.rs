use serde::{Deserialize, Serialize};

/// Sign of a contribution. Zero counts as `Negative`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "+")]
    Positive,
    #[serde(rename = "-")]
    Negative,
}

impl Direction {
    pub fn of(attribution: f64) -> Self {
        if attribution > 0.0 {
            Direction::Positive
        } else {
            Direction::Negative
        }
    }

    pub fn arrow(&self) -> char {
        match self {
            Direction::Positive => '↑',
            Direction::Negative => '↓',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub value: f64,
    /// Raw attribution in probability units (sums to p - expected value)
    pub attribution: f64,
    pub magnitude: f64, // |attribution * 100|, one decimal
    pub direction: Direction,
    pub impact: String, // e.g. "↑ 12.3%"
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub mean_shap: f64,
}

/// Mean |attribution| per feature, highest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalImportance {
    pub entries: Vec<FeatureImportance>,
}

impl GlobalImportance {
    pub fn entries(&self) -> &[FeatureImportance] {
        &self.entries
    }

    pub fn top(&self, n: usize) -> &[FeatureImportance] {
        &self.entries[..n.min(self.entries.len())]
    }
}
