//! Ordinary least squares training
//!
//! The design matrix (intercept column plus the selected features) is solved
//! with an SVD. The numerical rank is checked first so that perfectly
//! collinear features, or fewer records than parameters, fail with
//! [`EstimatorError::SingularDesign`] instead of yielding a minimum-norm
//! solution with meaningless coefficients.

use super::stats;
use crate::error::{EstimatorError, Result};
use crate::models::{Dataset, FeatureSet, HistoricalRecord};
use chrono::{DateTime, Utc};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Residual RMSE, relative to the target magnitude, still counted as an exact fit
const PERFECT_FIT_TOLERANCE: f64 = 1e-9;

/// In-sample fit quality
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
}

/// Observed range of a feature in the training data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub min: f64,
    pub max: f64,
}

impl FeatureRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// A coefficient with its importance relative to the largest one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCoefficient {
    pub feature: String,
    pub coefficient: f64,
    /// |coefficient| / max |coefficient| × 100
    pub relative_importance: f64,
}

/// Fitted linear model, immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    pub feature_set: FeatureSet,
    pub intercept: f64,
    pub coefficients: BTreeMap<String, f64>,
    pub metrics: FitMetrics,
    pub n_samples: usize,
    pub feature_ranges: BTreeMap<String, FeatureRange>,
    pub trained_at: DateTime<Utc>,
}

impl RegressionModel {
    pub fn target(&self) -> &str {
        &self.feature_set.target
    }

    /// Feature names in estimator order
    pub fn feature_names(&self) -> Vec<String> {
        self.feature_set.names()
    }

    /// Coefficients in estimator order
    pub fn coefficient_vector(&self) -> Vec<f64> {
        self.feature_set
            .features
            .iter()
            .map(|f| self.coefficients.get(&f.name).copied().unwrap_or(0.0))
            .collect()
    }

    /// Prediction for feature values given in estimator order
    pub fn predict_ordered(&self, values: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficient_vector()
                .iter()
                .zip(values)
                .map(|(c, v)| c * v)
                .sum::<f64>()
    }

    /// Prediction for a historical record carrying every feature
    pub fn predict_record(&self, record: &HistoricalRecord) -> Result<f64> {
        let values = self
            .feature_set
            .features
            .iter()
            .map(|f| {
                record
                    .get(&f.name)
                    .ok_or_else(|| EstimatorError::MissingFeature(f.name.clone()))
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(self.predict_ordered(&values))
    }

    /// Coefficients sorted by magnitude, largest first
    pub fn ranked_coefficients(&self) -> Vec<RankedCoefficient> {
        let max_abs = self
            .coefficients
            .values()
            .map(|c| c.abs())
            .fold(0.0_f64, f64::max);
        let mut ranked: Vec<RankedCoefficient> = self
            .feature_set
            .features
            .iter()
            .map(|f| {
                let coefficient = self.coefficients.get(&f.name).copied().unwrap_or(0.0);
                let relative_importance = if max_abs > 0.0 {
                    coefficient.abs() / max_abs * 100.0
                } else {
                    0.0
                };
                RankedCoefficient {
                    feature: f.name.clone(),
                    coefficient,
                    relative_importance,
                }
            })
            .collect();
        ranked.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
        ranked
    }
}

/// Fits OLS of the feature set's target on its features
pub fn fit(dataset: &Dataset, feature_set: &FeatureSet) -> Result<RegressionModel> {
    let n = dataset.len();
    if n == 0 {
        return Err(EstimatorError::InsufficientData("no records to train on".to_string()));
    }

    let names = feature_set.names();
    let mut seen = HashSet::new();
    if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
        return Err(EstimatorError::invalid("feature_set", format!("duplicate feature `{}`", dup)));
    }

    let columns = names.len() + 1;
    let mut design = DMatrix::<f64>::zeros(n, columns);
    let mut target = DVector::<f64>::zeros(n);

    for (i, record) in dataset.records.iter().enumerate() {
        design[(i, 0)] = 1.0;
        for (j, name) in names.iter().enumerate() {
            design[(i, j + 1)] = record
                .get(name)
                .ok_or_else(|| EstimatorError::MissingFeature(name.clone()))?;
        }
        target[i] = record
            .get(&feature_set.target)
            .ok_or_else(|| EstimatorError::MissingFeature(feature_set.target.clone()))?;
    }

    let beta = solve_least_squares(&design, &target)?;
    let intercept = beta[0];
    let coefficients: BTreeMap<String, f64> = names
        .iter()
        .enumerate()
        .map(|(j, name)| (name.clone(), beta[j + 1]))
        .collect();

    let fitted = &design * &beta;
    let metrics = FitMetrics {
        r2: in_sample_r2(&target, &fitted),
        rmse: stats::rmse(&target, &fitted),
        mae: stats::mae(&target, &fitted),
    };

    let feature_ranges = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let column = design.column(j + 1).into_owned();
            (
                name.clone(),
                FeatureRange {
                    min: stats::min(&column),
                    max: stats::max(&column),
                },
            )
        })
        .collect();

    info!(
        samples = n,
        features = names.len(),
        r2 = metrics.r2,
        rmse = metrics.rmse,
        mae = metrics.mae,
        "Regression model trained"
    );

    Ok(RegressionModel {
        feature_set: feature_set.clone(),
        intercept,
        coefficients,
        metrics,
        n_samples: n,
        feature_ranges,
        trained_at: Utc::now(),
    })
}

/// Solves min ‖Xβ − y‖² after checking X has full column rank
fn solve_least_squares(design: &DMatrix<f64>, target: &DVector<f64>) -> Result<DVector<f64>> {
    let (rows, columns) = design.shape();
    let svd = design.clone().svd(true, true);
    let largest = svd.singular_values.max();
    let tolerance = largest * rows.max(columns) as f64 * f64::EPSILON;
    let rank = svd.rank(tolerance);
    debug!(rows, columns, rank, tolerance, "Design matrix decomposed");

    if rank < columns {
        return Err(EstimatorError::SingularDesign { rank, columns });
    }

    let beta = svd
        .solve(target, tolerance)
        .map_err(|_| EstimatorError::SingularDesign { rank, columns })?;
    if beta.iter().any(|v| !v.is_finite()) {
        return Err(EstimatorError::SingularDesign { rank, columns });
    }
    Ok(beta)
}

/// R² where a constant target counts as perfectly (or not at all) explained
fn in_sample_r2(observed: &DVector<f64>, predicted: &DVector<f64>) -> f64 {
    let r2 = stats::r2_score(observed, predicted);
    if !r2.is_nan() {
        return r2;
    }
    let tolerance = PERFECT_FIT_TOLERANCE * observed.amax().max(1.0);
    if stats::rmse(observed, predicted) <= tolerance {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PESO, SPW, TIEMPO_REAL_OFERTADO};

    fn linear_dataset() -> Dataset {
        // t = 12 + 1.5·SPW + 4·Peso, no noise
        let samples = [
            (58.0, 9.0),
            (75.0, 15.5),
            (90.0, 11.0),
            (110.0, 22.0),
            (130.0, 18.0),
            (158.0, 30.0),
        ];
        let records = samples
            .iter()
            .enumerate()
            .map(|(i, (spw, peso))| {
                HistoricalRecord::new(format!("P{}", i))
                    .with(SPW, *spw)
                    .with(PESO, *peso)
                    .with(TIEMPO_REAL_OFERTADO, 12.0 + 1.5 * spw + 4.0 * peso)
            })
            .collect();
        Dataset::with_standard_columns(records)
    }

    #[test]
    fn test_recovers_exact_linear_relation() {
        let features = FeatureSet::from_names(TIEMPO_REAL_OFERTADO, &[SPW, PESO]);
        let model = fit(&linear_dataset(), &features).unwrap();

        assert!((model.intercept - 12.0).abs() < 1e-8);
        assert!((model.coefficients[SPW] - 1.5).abs() < 1e-10);
        assert!((model.coefficients[PESO] - 4.0).abs() < 1e-10);
        assert!((model.metrics.r2 - 1.0).abs() < 1e-12);
        assert!(model.metrics.rmse < 1e-9);
        assert!(model.metrics.mae < 1e-9);
        assert_eq!(model.n_samples, 6);
        assert_eq!(model.feature_ranges[SPW], FeatureRange { min: 58.0, max: 158.0 });
    }

    #[test]
    fn test_collinear_features_are_rejected() {
        let records = (0..5)
            .map(|i| {
                let x = i as f64;
                HistoricalRecord::new(format!("P{}", i))
                    .with(SPW, x)
                    .with(PESO, 2.0 * x + 1.0)
                    .with(TIEMPO_REAL_OFERTADO, 3.0 * x)
            })
            .collect();
        let dataset = Dataset::with_standard_columns(records);
        let features = FeatureSet::from_names(TIEMPO_REAL_OFERTADO, &[SPW, PESO]);
        match fit(&dataset, &features) {
            Err(EstimatorError::SingularDesign { rank, columns }) => {
                assert_eq!(columns, 3);
                assert_eq!(rank, 2);
            }
            other => panic!("expected SingularDesign, got {:?}", other),
        }
    }

    #[test]
    fn test_too_few_records_is_singular() {
        let mut dataset = linear_dataset();
        dataset.records.truncate(2);
        let features = FeatureSet::from_names(TIEMPO_REAL_OFERTADO, &[SPW, PESO]);
        assert!(matches!(
            fit(&dataset, &features),
            Err(EstimatorError::SingularDesign { .. })
        ));
    }

    #[test]
    fn test_intercept_only_model() {
        let features = FeatureSet::from_names::<&str>(TIEMPO_REAL_OFERTADO, &[]);
        let dataset = linear_dataset();
        let model = fit(&dataset, &features).unwrap();
        let mean = dataset
            .column(TIEMPO_REAL_OFERTADO)
            .iter()
            .flatten()
            .sum::<f64>()
            / 6.0;
        assert!((model.intercept - mean).abs() < 1e-9);
        assert!(model.coefficients.is_empty());
        assert!(model.metrics.r2.abs() < 1e-12);
    }

    #[test]
    fn test_constant_target_is_a_perfect_fit() {
        let records = (1..=5)
            .map(|i| {
                HistoricalRecord::new(format!("C{}", i))
                    .with(SPW, 50.0 + 10.0 * i as f64)
                    .with(TIEMPO_REAL_OFERTADO, 123456.7)
            })
            .collect();
        let dataset = Dataset::with_standard_columns(records);
        let features = FeatureSet::from_names(TIEMPO_REAL_OFERTADO, &[SPW]);
        let model = fit(&dataset, &features).unwrap();

        assert_eq!(model.metrics.r2, 1.0);
        assert!(model.coefficients[SPW].abs() < 1e-6);
    }

    #[test]
    fn test_missing_feature_in_record() {
        let mut dataset = linear_dataset();
        dataset.records[3].values.remove(PESO);
        let features = FeatureSet::from_names(TIEMPO_REAL_OFERTADO, &[SPW, PESO]);
        assert!(matches!(
            fit(&dataset, &features),
            Err(EstimatorError::MissingFeature(f)) if f == PESO
        ));
    }

    #[test]
    fn test_duplicate_features_rejected() {
        let features = FeatureSet::from_names(TIEMPO_REAL_OFERTADO, &[SPW, SPW]);
        assert!(matches!(
            fit(&linear_dataset(), &features),
            Err(EstimatorError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let features = FeatureSet::from_names(TIEMPO_REAL_OFERTADO, &[SPW, PESO]);
        let a = fit(&linear_dataset(), &features).unwrap();
        let b = fit(&linear_dataset(), &features).unwrap();
        assert_eq!(a.intercept.to_bits(), b.intercept.to_bits());
        assert_eq!(a.coefficient_vector(), b.coefficient_vector());
    }

    #[test]
    fn test_ranked_coefficients_and_predictions() {
        let features = FeatureSet::from_names(TIEMPO_REAL_OFERTADO, &[SPW, PESO]);
        let model = fit(&linear_dataset(), &features).unwrap();

        let ranked = model.ranked_coefficients();
        assert_eq!(ranked[0].feature, PESO);
        assert!((ranked[0].relative_importance - 100.0).abs() < 1e-9);
        assert!((ranked[1].relative_importance - 37.5).abs() < 1e-6);

        let record = HistoricalRecord::new("X").with(SPW, 100.0).with(PESO, 20.0);
        let predicted = model.predict_record(&record).unwrap();
        assert!((predicted - (12.0 + 150.0 + 80.0)).abs() < 1e-8);

        let incomplete = HistoricalRecord::new("Y").with(SPW, 100.0);
        assert!(model.predict_record(&incomplete).is_err());
    }
}
