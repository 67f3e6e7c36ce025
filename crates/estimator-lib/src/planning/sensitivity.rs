//! One-variable percentage sweeps through the full prediction path

use crate::error::{EstimatorError, Result};
use crate::models::{ProcessInputs, Provenance};
use crate::predictor::Predictor;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of points in the default ±20 % sweep
pub const DEFAULT_SWEEP_STEPS: usize = 9;

/// Inclusive range of percentage offsets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepRange {
    pub min_percent: f64,
    pub max_percent: f64,
}

impl Default for SweepRange {
    fn default() -> Self {
        Self {
            min_percent: -20.0,
            max_percent: 20.0,
        }
    }
}

impl SweepRange {
    pub fn new(min_percent: f64, max_percent: f64) -> Self {
        Self {
            min_percent,
            max_percent,
        }
    }

    /// `steps` evenly spaced offsets; a single step yields `min_percent`
    pub fn offsets(&self, steps: usize) -> Vec<f64> {
        if steps == 1 {
            return vec![self.min_percent];
        }
        let span = self.max_percent - self.min_percent;
        let last = (steps - 1) as f64;
        (0..steps)
            .map(|i| self.min_percent + span * i as f64 / last)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub offset_percent: f64,
    /// Perturbed value of the swept variable
    pub value: f64,
    pub predicted_time: f64,
    /// Predicted time minus that of the first point
    pub delta: f64,
    pub provenance: Provenance,
}

/// Re-predicts with `variable` scaled by each offset of `range`
pub fn sweep<P: Predictor + ?Sized>(
    predictor: &P,
    base: &ProcessInputs,
    variable: &str,
    range: SweepRange,
    steps: usize,
) -> Result<Vec<SensitivityPoint>> {
    if steps == 0 {
        return Err(EstimatorError::invalid("steps", "must be at least 1"));
    }
    if !range.min_percent.is_finite() || !range.max_percent.is_finite() {
        return Err(EstimatorError::invalid("range", "bounds must be finite"));
    }
    if range.min_percent > range.max_percent {
        return Err(EstimatorError::invalid(
            "range",
            format!("min {} exceeds max {}", range.min_percent, range.max_percent),
        ));
    }
    if !predictor.provides(variable, base) {
        return Err(EstimatorError::MissingFeature(variable.to_string()));
    }
    let base_value = base
        .get(variable)
        .ok_or_else(|| EstimatorError::MissingFeature(variable.to_string()))?;

    let mut points: Vec<SensitivityPoint> = Vec::with_capacity(steps);
    for offset in range.offsets(steps) {
        let value = base_value * (1.0 + offset / 100.0);
        let mut inputs = base.clone();
        inputs.set(variable, value)?;
        let prediction = predictor.predict(&inputs)?;

        let reference = points.first().map_or(prediction.cycle_time, |p| p.predicted_time);
        points.push(SensitivityPoint {
            offset_percent: offset,
            value,
            predicted_time: prediction.cycle_time,
            delta: prediction.cycle_time - reference,
            provenance: prediction.provenance,
        });
    }

    debug!(variable, steps, "Sensitivity sweep completed");
    Ok(points)
}
