//! Engine errors
//!
//! Per-request failures (`SchemaMismatch`) are recoverable and carry enough
//! detail for the caller to fix the payload. Artifact and threshold failures
//! happen at startup and are fatal for the service.

use std::fmt;

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Startup artifact an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Model,
    Threshold,
    ReferenceData,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Model => write!(f, "model"),
            Artifact::Threshold => write!(f, "threshold"),
            Artifact::ReferenceData => write!(f, "reference data"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Feature payload does not match the schema (missing / extra / mistyped)
    #[error("feature schema mismatch: {}", describe_mismatch(.missing, .unexpected, .invalid))]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
        invalid: Vec<String>,
    },

    /// Decision threshold outside [0, 1]
    #[error("decision threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    /// Model / threshold / reference data missing or malformed
    #[error("{artifact} artifact unusable: {reason}")]
    UpstreamArtifact { artifact: Artifact, reason: String },
}

impl EngineError {
    pub fn artifact(artifact: Artifact, reason: impl Into<String>) -> Self {
        EngineError::UpstreamArtifact {
            artifact,
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, EngineError::SchemaMismatch { .. })
    }
}

fn describe_mismatch(missing: &[String], unexpected: &[String], invalid: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing [{}]", missing.join("; ")));
    }
    if !unexpected.is_empty() {
        parts.push(format!("unexpected [{}]", unexpected.join("; ")));
    }
    if !invalid.is_empty() {
        parts.push(format!("invalid [{}]", invalid.join("; ")));
    }
    parts.join(", ")
}
