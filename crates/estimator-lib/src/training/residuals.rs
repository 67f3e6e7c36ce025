//! Residual diagnostics of a fitted model

use super::regression::RegressionModel;
use super::stats;
use crate::error::{EstimatorError, Result};
use crate::models::Dataset;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Observed vs predicted for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualEntry {
    pub project: String,
    pub observed: f64,
    pub predicted: f64,
    /// observed − predicted
    pub residual: f64,
    /// residual / observed × 100; NaN when observed is 0
    pub percent_error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualReport {
    pub entries: Vec<ResidualEntry>,
    /// Expected near zero for an unbiased fit; reported, not enforced
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl ResidualReport {
    pub fn residuals(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.residual).collect()
    }

    /// Entry with the largest absolute residual
    pub fn worst(&self) -> Option<&ResidualEntry> {
        self.entries
            .iter()
            .max_by(|a, b| a.residual.abs().total_cmp(&b.residual.abs()))
    }
}

/// Computes per-record residuals and their aggregate statistics
pub fn analyze(model: &RegressionModel, dataset: &Dataset) -> Result<ResidualReport> {
    if dataset.is_empty() {
        return Err(EstimatorError::InsufficientData("no records to analyze".to_string()));
    }

    let target = model.target();
    let mut entries = Vec::with_capacity(dataset.len());
    for record in &dataset.records {
        let observed = record
            .get(target)
            .ok_or_else(|| EstimatorError::MissingFeature(target.to_string()))?;
        let predicted = model.predict_record(record)?;
        let residual = observed - predicted;
        let percent_error = if observed == 0.0 {
            warn!(project = %record.project, "Observed cycle time is zero, percent error undefined");
            f64::NAN
        } else {
            residual / observed * 100.0
        };
        entries.push(ResidualEntry {
            project: record.project.clone(),
            observed,
            predicted,
            residual,
            percent_error,
        });
    }

    let residuals = DVector::from_iterator(entries.len(), entries.iter().map(|e| e.residual));
    let report = ResidualReport {
        mean: stats::mean(&residuals),
        std_dev: stats::population_std(&residuals),
        min: stats::min(&residuals),
        max: stats::max(&residuals),
        entries,
    };
    debug!(mean = report.mean, std_dev = report.std_dev, "Residuals analyzed");
    Ok(report)
}
