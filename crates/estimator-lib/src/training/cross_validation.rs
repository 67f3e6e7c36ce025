//! Seeded k-fold cross-validation
//!
//! Record indices are shuffled with a ChaCha8 generator seeded from the
//! caller, then cut into `folds` contiguous groups. The first `n % folds`
//! groups hold one extra record. A fresh model is fitted on every
//! complement and scored on its holdout, so identical seeds produce
//! identical reports.

use super::regression::fit;
use super::stats;
use crate::error::{EstimatorError, Result};
use crate::models::{Dataset, FeatureSet};
use nalgebra::DVector;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Std of fold R² below which a model is reported stable
pub const DEFAULT_STABILITY_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    Stable,
    Unstable,
}

/// Scores of one holdout fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldScore {
    pub fold: usize,
    pub train_size: usize,
    pub test_size: usize,
    /// NaN when the holdout target has no variance
    pub r2: f64,
    pub rmse: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub folds: usize,
    pub seed: u64,
    pub scores: Vec<FoldScore>,
    pub r2_mean: f64,
    pub r2_std: f64,
    pub rmse_mean: f64,
    pub rmse_std: f64,
    pub stability: Stability,
}

impl CrossValidationReport {
    pub fn r2_scores(&self) -> Vec<f64> {
        self.scores.iter().map(|s| s.r2).collect()
    }

    pub fn rmse_scores(&self) -> Vec<f64> {
        self.scores.iter().map(|s| s.rmse).collect()
    }
}

/// Cross-validator with a configurable stability threshold
#[derive(Debug, Clone)]
pub struct CrossValidator {
    pub stability_threshold: f64,
}

impl Default for CrossValidator {
    fn default() -> Self {
        Self {
            stability_threshold: DEFAULT_STABILITY_THRESHOLD,
        }
    }
}

impl CrossValidator {
    pub fn new(stability_threshold: f64) -> Self {
        Self { stability_threshold }
    }

    /// Runs k-fold cross-validation of an OLS model over `feature_set`
    pub fn evaluate(
        &self,
        dataset: &Dataset,
        feature_set: &FeatureSet,
        folds: usize,
        seed: u64,
    ) -> Result<CrossValidationReport> {
        let n = dataset.len();
        if folds < 2 || folds > n {
            return Err(EstimatorError::InvalidFoldCount { folds, records: n });
        }

        let assignments = fold_indices(n, folds, seed);
        let mut scores = Vec::with_capacity(folds);

        for (fold, test_idx) in assignments.iter().enumerate() {
            let train_idx: Vec<usize> = assignments
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != fold)
                .flat_map(|(_, idx)| idx.iter().copied())
                .collect();

            let model = fit(&dataset.subset(&train_idx), feature_set)?;
            let holdout = dataset.subset(test_idx);

            let mut observed = Vec::with_capacity(holdout.len());
            let mut predicted = Vec::with_capacity(holdout.len());
            for record in &holdout.records {
                let y = record
                    .get(&feature_set.target)
                    .ok_or_else(|| EstimatorError::MissingFeature(feature_set.target.clone()))?;
                observed.push(y);
                predicted.push(model.predict_record(record)?);
            }

            let observed = DVector::from_vec(observed);
            let predicted = DVector::from_vec(predicted);
            let score = FoldScore {
                fold: fold + 1,
                train_size: train_idx.len(),
                test_size: test_idx.len(),
                r2: stats::r2_score(&observed, &predicted),
                rmse: stats::rmse(&observed, &predicted),
            };
            debug!(fold = score.fold, r2 = score.r2, rmse = score.rmse, "Fold evaluated");
            scores.push(score);
        }

        let r2 = DVector::from_iterator(scores.len(), scores.iter().map(|s| s.r2));
        let rmse = DVector::from_iterator(scores.len(), scores.iter().map(|s| s.rmse));
        let r2_std = stats::population_std(&r2);
        let stability = if r2_std < self.stability_threshold {
            Stability::Stable
        } else {
            Stability::Unstable
        };

        let report = CrossValidationReport {
            folds,
            seed,
            scores,
            r2_mean: stats::mean(&r2),
            r2_std,
            rmse_mean: stats::mean(&rmse),
            rmse_std: stats::population_std(&rmse),
            stability,
        };

        info!(
            folds,
            seed,
            r2_mean = report.r2_mean,
            r2_std = report.r2_std,
            rmse_mean = report.rmse_mean,
            stability = ?report.stability,
            "Cross-validation completed"
        );

        Ok(report)
    }
}

/// Shuffled index groups for each fold
fn fold_indices(n: usize, folds: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let base = n / folds;
    let extra = n % folds;
    let mut groups = Vec::with_capacity(folds);
    let mut start = 0;
    for fold in 0..folds {
        let size = base + usize::from(fold < extra);
        groups.push(indices[start..start + size].to_vec());
        start += size;
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HistoricalRecord, PESO, SPW, TIEMPO_REAL_OFERTADO};

    fn noisy_dataset(n: usize) -> Dataset {
        let records = (0..n)
            .map(|i| {
                let spw = 50.0 + 7.0 * i as f64;
                let peso = 5.0 + (i % 3) as f64;
                let noise = if i % 2 == 0 { 0.2 } else { -0.2 };
                HistoricalRecord::new(format!("P{}", i))
                    .with(SPW, spw)
                    .with(PESO, peso)
                    .with(TIEMPO_REAL_OFERTADO, 20.0 + 1.2 * spw + 2.0 * peso + noise)
            })
            .collect();
        Dataset::with_standard_columns(records)
    }

    #[test]
    fn test_fold_indices_partition() {
        let groups = fold_indices(10, 3, 42);
        let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);

        let mut all: Vec<usize> = groups.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_scores() {
        let dataset = noisy_dataset(12);
        let features = FeatureSet::from_names(TIEMPO_REAL_OFERTADO, &[SPW, PESO]);
        let cv = CrossValidator::default();

        let a = cv.evaluate(&dataset, &features, 3, 42).unwrap();
        let b = cv.evaluate(&dataset, &features, 3, 42).unwrap();
        let bits = |v: Vec<f64>| v.into_iter().map(f64::to_bits).collect::<Vec<_>>();
        assert_eq!(bits(a.r2_scores()), bits(b.r2_scores()));
        assert_eq!(bits(a.rmse_scores()), bits(b.rmse_scores()));
        assert_eq!(a.scores.len(), 3);
        assert!(a.scores.iter().all(|s| s.train_size + s.test_size == 12));
    }

    #[test]
    fn test_near_linear_data_is_stable() {
        let dataset = noisy_dataset(15);
        let features = FeatureSet::from_names(TIEMPO_REAL_OFERTADO, &[SPW, PESO]);
        let report = CrossValidator::default()
            .evaluate(&dataset, &features, 5, 7)
            .unwrap();
        assert!(report.r2_mean > 0.95, "r2_mean was {}", report.r2_mean);
        assert_eq!(report.stability, Stability::Stable);
        assert!(report.rmse_mean < 5.0);
    }

    #[test]
    fn test_invalid_fold_counts() {
        let dataset = noisy_dataset(4);
        let features = FeatureSet::from_names(TIEMPO_REAL_OFERTADO, &[SPW]);
        let cv = CrossValidator::default();
        for folds in [0, 1, 5] {
            assert!(matches!(
                cv.evaluate(&dataset, &features, folds, 42),
                Err(EstimatorError::InvalidFoldCount { records: 4, .. })
            ));
        }
    }

    #[test]
    fn test_threshold_controls_verdict() {
        let dataset = noisy_dataset(12);
        let features = FeatureSet::from_names(TIEMPO_REAL_OFERTADO, &[SPW, PESO]);
        let report = CrossValidator::new(0.0)
            .evaluate(&dataset, &features, 3, 42)
            .unwrap();
        assert_eq!(report.stability, Stability::Unstable);
    }
}
