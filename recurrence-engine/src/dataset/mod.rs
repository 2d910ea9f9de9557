//! Dataset Module - Reference Population
//!
//! The population used for the explanation baseline and for global
//! importance. Read-only after startup.

pub mod reference;

pub use reference::ReferencePopulation;
