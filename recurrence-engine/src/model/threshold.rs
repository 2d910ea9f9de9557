//! Decision Threshold
//!
//! A single tuned cutoff, loaded once at startup and never adjusted.
//! `probability >= threshold` is High Risk; the tie goes to High Risk.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Artifact, EngineError, EngineResult};

/// Categorical risk decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLabel {
    #[serde(rename = "Low Risk")]
    LowRisk,
    #[serde(rename = "High Risk")]
    HighRisk,
}

impl RiskLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::LowRisk => "Low Risk",
            RiskLabel::HighRisk => "High Risk",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "High Risk" => Ok(RiskLabel::HighRisk),
            "Low Risk" => Ok(RiskLabel::LowRisk),
            other => Err(format!("unknown risk label '{}'", other)),
        }
    }
}

/// Fixed-threshold decision policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecisionPolicy {
    threshold: f64,
}

impl DecisionPolicy {
    pub fn new(threshold: f64) -> EngineResult<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(EngineError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    /// Parse the contents of a threshold file (one real number)
    pub fn parse(text: &str) -> EngineResult<Self> {
        let value: f64 = text.trim().parse().map_err(|e| {
            EngineError::artifact(Artifact::Threshold, format!("'{}': {}", text.trim(), e))
        })?;
        Self::new(value)
    }

    /// Load threshold file
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EngineError::artifact(Artifact::Threshold, format!("{}: {}", path.display(), e))
        })?;

        let policy = Self::parse(&text)?;
        log::info!("Decision threshold loaded: {:.4} ({})", policy.threshold, path.display());
        Ok(policy)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn classify(&self, probability: f64) -> RiskLabel {
        if probability >= self.threshold {
            RiskLabel::HighRisk
        } else {
            RiskLabel::LowRisk
        }
    }
}
