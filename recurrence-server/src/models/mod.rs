//! Data models

pub mod assessment;
pub mod reference;

pub use assessment::*;
