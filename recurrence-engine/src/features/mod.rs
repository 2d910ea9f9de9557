//! Features Module - Feature Schema & Vectors
//!
//! Inbound payloads are validated here, at the boundary, before any other
//! component sees them.

pub mod layout;
pub mod vector;

// Re-export common types
pub use layout::{compute_layout_hash, FeatureSchema, LayoutError};
pub use vector::FeatureVector;
