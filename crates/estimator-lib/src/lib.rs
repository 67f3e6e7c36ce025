//! Cycle-time estimation library for robotic welding cells
//!
//! This crate provides the core functionality for:
//! - Offline training of a linear cycle-time model from historical projects
//! - Hybrid online prediction with a heuristic fallback
//! - Capacity planning and sensitivity analysis
//! - Model artifact persistence and observability

pub mod artifact;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod planning;
pub mod predictor;
pub mod training;

pub use artifact::ModelArtifact;
pub use config::EngineConfig;
pub use error::{EstimatorError, Result};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use predictor::{HybridPredictionEngine, Predictor};
