//! # Configuration Module
//!
//! Detector and overlap tuning, loaded from JSON or built in code.

pub mod config;

pub use config::{DetectorConfig, StitchConfig};
