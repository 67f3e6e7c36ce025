//! Offline training pipeline
//!
//! Historical records flow through feature selection, OLS fitting,
//! k-fold cross-validation and residual analysis. Every step surfaces its
//! errors to the caller: training is operator-supervised and fails loudly.

mod cross_validation;
mod features;
mod regression;
mod report;
mod residuals;
mod stats;

pub use cross_validation::{
    CrossValidationReport, CrossValidator, FoldScore, Stability, DEFAULT_STABILITY_THRESHOLD,
};
pub use features::{
    collinear_pairs, describe, select, CollinearPair, ColumnSummary, DatasetSummary, MIN_RECORDS,
};
pub use regression::{fit, FeatureRange, FitMetrics, RankedCoefficient, RegressionModel};
pub use report::ModelReport;
pub use residuals::{analyze, ResidualEntry, ResidualReport};

use crate::config::TrainingParams;
use crate::error::{EstimatorError, Result};
use crate::models::{Dataset, FeatureSet, TIEMPO_REAL_OFERTADO};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Everything produced by one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub feature_set: FeatureSet,
    pub collinear_pairs: Vec<CollinearPair>,
    pub model: RegressionModel,
    pub cross_validation: CrossValidationReport,
    pub residuals: ResidualReport,
}

/// Runs select → fit → cross-validate → residuals
///
/// The target is always `Tiempo_Real_Ofertado`, the only output a persisted
/// model may carry.
pub struct TrainingPipeline {
    params: TrainingParams,
}

impl TrainingPipeline {
    pub fn new(params: TrainingParams) -> Self {
        Self { params }
    }

    pub fn run(&self, dataset: &Dataset) -> Result<TrainingOutcome> {
        info!(
            records = dataset.len(),
            target = TIEMPO_REAL_OFERTADO,
            threshold = self.params.r2_threshold,
            "Starting training run"
        );

        let feature_set = select(dataset, TIEMPO_REAL_OFERTADO, self.params.r2_threshold)?;
        if feature_set.is_empty() {
            return Err(EstimatorError::InsufficientData(format!(
                "no variable reaches R² >= {}",
                self.params.r2_threshold
            )));
        }

        let collinear = collinear_pairs(
            dataset,
            &feature_set.names(),
            self.params.collinearity_threshold,
        );
        for pair in &collinear {
            warn!(
                first = %pair.first,
                second = %pair.second,
                correlation = pair.correlation,
                "Selected features are strongly correlated"
            );
        }

        let model = fit(dataset, &feature_set)?;
        let cross_validation = CrossValidator::new(self.params.stability_threshold).evaluate(
            dataset,
            &feature_set,
            self.params.folds,
            self.params.seed,
        )?;
        let residuals = analyze(&model, dataset)?;

        Ok(TrainingOutcome {
            feature_set,
            collinear_pairs: collinear,
            model,
            cross_validation,
            residuals,
        })
    }
}

impl Default for TrainingPipeline {
    fn default() -> Self {
        Self::new(TrainingParams::default())
    }
}
