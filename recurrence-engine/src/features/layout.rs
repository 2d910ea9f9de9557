//! Feature Layout - Ordered Feature Schema
//!
//! **This type controls the feature schema**
//!
//! The schema is read from the model artifact and is the single source of
//! truth for feature order. Every other artifact (reference dataset) and every
//! inbound payload is checked against it.
//!
//! ## Rules:
//! 1. Names are unique and non-empty
//! 2. Order is significant: the fingerprint changes when order changes
//! 3. All features are numeric

use crc32fast::Hasher;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::vector::FeatureVector;
use crate::error::{EngineError, EngineResult};

// ============================================================================
// LAYOUT ERRORS
// ============================================================================

/// Error when a list of names cannot form a schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("feature schema is empty")]
    Empty,
    #[error("feature name at position {0} is blank")]
    BlankName(usize),
    #[error("feature '{0}' appears more than once")]
    Duplicate(String),
}

// ============================================================================
// FEATURE SCHEMA
// ============================================================================

/// Ordered, named feature schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSchema {
    names: Vec<String>,
    #[serde(skip)]
    hash: u32,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Result<Self, LayoutError> {
        if names.is_empty() {
            return Err(LayoutError::Empty);
        }

        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(LayoutError::BlankName(i));
            }
            if names[..i].contains(name) {
                return Err(LayoutError::Duplicate(name.clone()));
            }
        }

        let hash = compute_layout_hash(&names);
        Ok(Self { names, hash })
    }

    /// Feature names in schema order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// CRC32 of the ordered names, used to detect layout mismatches
    pub fn fingerprint(&self) -> u32 {
        self.hash
    }

    /// Get feature index by name (O(n) but features are few)
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Get feature name by index
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Convert a loosely-typed payload into a validated vector.
    ///
    /// Every schema feature must be present as a finite JSON number and no
    /// other keys are allowed. All offending features are reported at once.
    pub fn parse(&self, payload: &Map<String, Value>) -> EngineResult<FeatureVector> {
        let mut values = Vec::with_capacity(self.names.len());
        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        for name in &self.names {
            match payload.get(name) {
                None => missing.push(name.clone()),
                Some(Value::Number(n)) => match n.as_f64() {
                    Some(v) if v.is_finite() => values.push(v),
                    _ => invalid.push(format!("{}: not a finite number", name)),
                },
                Some(other) => invalid.push(format!(
                    "{}: expected a number, got {}",
                    name,
                    json_type_name(other)
                )),
            }
        }

        let unexpected: Vec<String> = payload
            .keys()
            .filter(|key| self.index_of(key).is_none())
            .cloned()
            .collect();

        if !missing.is_empty() || !unexpected.is_empty() || !invalid.is_empty() {
            return Err(EngineError::SchemaMismatch {
                missing,
                unexpected,
                invalid,
            });
        }

        Ok(FeatureVector::new(self.hash, values))
    }

    /// Build a vector from values already in schema order
    pub fn vector(&self, values: Vec<f64>) -> EngineResult<FeatureVector> {
        if values.len() != self.names.len() {
            return Err(self.arity_mismatch(values.len()));
        }

        let invalid: Vec<String> = values
            .iter()
            .zip(&self.names)
            .filter(|(v, _)| !v.is_finite())
            .map(|(_, name)| format!("{}: not a finite number", name))
            .collect();
        if !invalid.is_empty() {
            return Err(EngineError::SchemaMismatch {
                missing: Vec::new(),
                unexpected: Vec::new(),
                invalid,
            });
        }

        Ok(FeatureVector::new(self.hash, values))
    }

    /// Check that a vector was built for this schema
    pub fn check(&self, vector: &FeatureVector) -> EngineResult<()> {
        if vector.len() != self.names.len() {
            return Err(self.arity_mismatch(vector.len()));
        }

        if vector.layout_hash() != self.hash {
            return Err(EngineError::SchemaMismatch {
                missing: Vec::new(),
                unexpected: Vec::new(),
                invalid: vec![format!(
                    "layout {:08x} does not match schema {:08x}",
                    vector.layout_hash(),
                    self.hash
                )],
            });
        }

        Ok(())
    }

    fn arity_mismatch(&self, actual: usize) -> EngineError {
        let missing = self.names.iter().skip(actual).cloned().collect();
        let unexpected = (self.names.len()..actual)
            .map(|i| format!("column {}", i + 1))
            .collect();
        EngineError::SchemaMismatch {
            missing,
            unexpected,
            invalid: Vec::new(),
        }
    }
}

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 hash of an ordered list of names
pub fn compute_layout_hash<S: AsRef<str>>(names: &[S]) -> u32 {
    let mut hasher = Hasher::new();

    for name in names {
        hasher.update(name.as_ref().as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// TESTS
// ============================================================================
