//! Feature Vector - Core data structure for model input
//!
//! Vectors are only created through `FeatureSchema::parse` / `FeatureSchema::vector`,
//! so holding one means the values are finite and in schema order.

use serde::Serialize;

/// Validated feature values tagged with the layout they were built for
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    /// CRC32 hash of the feature layout (for mismatch detection)
    layout_hash: u32,
    /// Feature values in schema order
    values: Vec<f64>,
}

impl FeatureVector {
    pub(crate) fn new(layout_hash: u32, values: Vec<f64>) -> Self {
        Self { layout_hash, values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn layout_hash(&self) -> u32 {
        self.layout_hash
    }
}

#[cfg(test)]
mod tests {
    use crate::features::FeatureSchema;
    use serde_json::json;

    #[test]
    fn test_parse_and_vector_agree() {
        let schema = FeatureSchema::new(vec!["age".to_string(), "ki67".to_string()]).unwrap();
        let v = schema.vector(vec![45.0, 12.5]).unwrap();

        let payload = json!({"ki67": 12.5, "age": 45.0});
        assert_eq!(schema.parse(payload.as_object().unwrap()).unwrap(), v);
        assert_eq!(v.layout_hash(), schema.fingerprint());
    }

    #[test]
    fn test_accessors() {
        let schema = FeatureSchema::new(vec!["a".to_string(), "b".to_string()]).unwrap();
        let v = schema.vector(vec![1.0, 2.0]).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v.get(1), Some(2.0));
        assert_eq!(v.get(2), None);
        assert!(!v.is_empty());
    }
}
