//! HTTP handlers

pub mod extract;
pub mod health;
pub mod patients;
pub mod predict;
