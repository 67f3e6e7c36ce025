//! Online cycle-time prediction

mod engine;
mod heuristic;
mod proxy;

pub use engine::{HybridPredictionEngine, RegressionAttempt};
pub use heuristic::{validate_inputs, HeuristicBreakdown, HeuristicCalculator, WorkGroup};
pub use proxy::{resolve, resolve_all, ProxyRule, ResolvedFeature};

use crate::error::Result;
use crate::models::{PredictionResult, ProcessInputs};

/// Trait for cycle-time prediction implementations
pub trait Predictor: Send + Sync {
    /// Predict the cycle time for one set of process inputs
    fn predict(&self, inputs: &ProcessInputs) -> Result<PredictionResult>;

    /// Whether `name` is an input this predictor reads from `inputs`
    fn provides(&self, name: &str, inputs: &ProcessInputs) -> bool;
}
