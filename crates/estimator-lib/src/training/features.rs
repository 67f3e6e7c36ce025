//! Feature selection and exploratory statistics
//!
//! Ranks candidate columns by explained variance (squared Pearson
//! correlation) against the target, screens selected features for
//! collinearity and summarizes the historical corpus.

use super::stats;
use crate::error::{EstimatorError, Result};
use crate::models::{Dataset, FeatureScore, FeatureSet};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum number of records for selection and training
pub const MIN_RECORDS: usize = 2;

/// Selects the candidate columns whose R² against the target is at least
/// `threshold`, sorted descending by R² with ties kept in column order.
pub fn select(dataset: &Dataset, target: &str, threshold: f64) -> Result<FeatureSet> {
    if dataset.len() < MIN_RECORDS {
        return Err(EstimatorError::InsufficientData(format!(
            "{} records, need at least {}",
            dataset.len(),
            MIN_RECORDS
        )));
    }
    if !dataset.has_column(target) {
        return Err(EstimatorError::InsufficientData(format!(
            "target column `{}` not present",
            target
        )));
    }
    if !threshold.is_finite() {
        return Err(EstimatorError::invalid("threshold", "must be finite"));
    }

    let target_values = dataset.column(target);
    let mut features: Vec<FeatureScore> = Vec::new();

    for column in dataset.columns.iter().filter(|c| c.as_str() != target) {
        let r_squared = match stats::pearson(&dataset.column(column), &target_values) {
            Some(r) => r * r,
            None => {
                debug!(column = %column, "Skipping column with undefined correlation");
                continue;
            }
        };
        debug!(column = %column, r_squared, "Scored candidate");
        if r_squared >= threshold {
            features.push(FeatureScore {
                name: column.clone(),
                r_squared,
            });
        }
    }

    // stable: equal scores keep column order
    features.sort_by(|a, b| b.r_squared.total_cmp(&a.r_squared));

    Ok(FeatureSet {
        target: target.to_string(),
        features,
    })
}

/// Pair of features whose mutual correlation exceeds the collinearity limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollinearPair {
    pub first: String,
    pub second: String,
    pub correlation: f64,
}

/// Flags every pair of `columns` with |r| > `threshold`
pub fn collinear_pairs(dataset: &Dataset, columns: &[String], threshold: f64) -> Vec<CollinearPair> {
    let values: Vec<Vec<Option<f64>>> = columns.iter().map(|c| dataset.column(c)).collect();
    let mut pairs = Vec::new();
    for i in 0..columns.len() {
        for j in (i + 1)..columns.len() {
            if let Some(r) = stats::pearson(&values[i], &values[j]) {
                if r.abs() > threshold {
                    pairs.push(CollinearPair {
                        first: columns[i].clone(),
                        second: columns[j].clone(),
                        correlation: r,
                    });
                }
            }
        }
    }
    pairs
}

/// Descriptive statistics of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub missing: usize,
    pub mean: f64,
    /// Sample standard deviation
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Coefficient of variation in percent (0 when the mean is 0)
    pub cv_percent: f64,
    /// Pearson r against the target, when defined
    pub correlation: Option<f64>,
}

/// Summary of the historical corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub records: usize,
    pub target: String,
    pub columns: Vec<ColumnSummary>,
}

impl DatasetSummary {
    pub fn target_summary(&self) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.column == self.target)
    }
}

/// Summarizes every column of the dataset
pub fn describe(dataset: &Dataset, target: &str) -> DatasetSummary {
    let target_values = dataset.column(target);
    let columns = dataset
        .columns
        .iter()
        .map(|column| {
            let raw = dataset.column(column);
            let present = DVector::from_vec(raw.iter().flatten().copied().collect());
            let mean = stats::mean(&present);
            let std_dev = stats::sample_std(&present);
            let cv_percent = if mean != 0.0 && mean.is_finite() {
                std_dev / mean * 100.0
            } else {
                0.0
            };
            let correlation = if column == target {
                None
            } else {
                stats::pearson(&raw, &target_values)
            };
            ColumnSummary {
                column: column.clone(),
                count: present.len(),
                missing: raw.len() - present.len(),
                mean,
                std_dev,
                min: stats::min(&present),
                max: stats::max(&present),
                cv_percent,
                correlation,
            }
        })
        .collect();

    DatasetSummary {
        records: dataset.len(),
        target: target.to_string(),
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HistoricalRecord, ANCHO_ASSY, PESO, SPW, TIEMPO_REAL_OFERTADO, TUCKER};

    fn dataset() -> Dataset {
        // time = 10 + 2·SPW; Peso tracks SPW loosely; Tucker is noise
        let rows = [
            ("P1", 50.0, 9.0, 3.0, 110.0),
            ("P2", 60.0, 13.0, 1.0, 130.0),
            ("P3", 70.0, 14.0, 4.0, 150.0),
            ("P4", 80.0, 15.0, 1.0, 170.0),
            ("P5", 90.0, 19.0, 5.0, 190.0),
        ];
        let records = rows
            .iter()
            .map(|(p, spw, peso, tucker, t)| {
                HistoricalRecord::new(*p)
                    .with(SPW, *spw)
                    .with(PESO, *peso)
                    .with(TUCKER, *tucker)
                    .with(ANCHO_ASSY, 500.0)
                    .with(TIEMPO_REAL_OFERTADO, *t)
            })
            .collect();
        Dataset::new(
            vec![
                SPW.to_string(),
                TUCKER.to_string(),
                PESO.to_string(),
                ANCHO_ASSY.to_string(),
                TIEMPO_REAL_OFERTADO.to_string(),
            ],
            records,
        )
    }

    #[test]
    fn test_select_filters_and_sorts() {
        for threshold in [0.0, 0.3, 0.5, 0.9, 0.99, 1.0] {
            let set = select(&dataset(), TIEMPO_REAL_OFERTADO, threshold).unwrap();
            assert!(set.features.iter().all(|f| f.r_squared >= threshold));
            assert!(set
                .features
                .windows(2)
                .all(|w| w[0].r_squared >= w[1].r_squared));
        }

        let set = select(&dataset(), TIEMPO_REAL_OFERTADO, 0.5).unwrap();
        assert_eq!(set.names(), vec![SPW.to_string(), PESO.to_string()]);
        assert!((set.features[0].r_squared - 1.0).abs() < 1e-12);
        assert_eq!(set.target, TIEMPO_REAL_OFERTADO);
    }

    #[test]
    fn test_select_skips_constant_columns() {
        let set = select(&dataset(), TIEMPO_REAL_OFERTADO, 0.0).unwrap();
        assert!(!set.names().contains(&ANCHO_ASSY.to_string()));
        assert!(!set.names().contains(&TIEMPO_REAL_OFERTADO.to_string()));
    }

    #[test]
    fn test_select_ties_keep_column_order() {
        let records = (0..4)
            .map(|i| {
                let x = i as f64;
                HistoricalRecord::new(format!("P{}", i))
                    .with("b", x)
                    .with("a", 2.0 * x)
                    .with("y", 3.0 * x + 1.0)
            })
            .collect();
        let dataset = Dataset::new(
            vec!["b".to_string(), "a".to_string(), "y".to_string()],
            records,
        );
        let set = select(&dataset, "y", 0.5).unwrap();
        assert_eq!(set.names(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_select_keeps_small_magnitude_feature() {
        let records = (1..=5)
            .map(|i| {
                let x = i as f64 * 1e-9;
                HistoricalRecord::new(format!("P{}", i))
                    .with("x", x)
                    .with("y", 3e9 * x + 1.0)
            })
            .collect();
        let dataset = Dataset::new(vec!["x".to_string(), "y".to_string()], records);
        let set = select(&dataset, "y", 0.5).unwrap();
        assert_eq!(set.names(), vec!["x".to_string()]);
        assert!((set.features[0].r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_select_insufficient_data() {
        let mut small = dataset();
        small.records.truncate(1);
        assert!(matches!(
            select(&small, TIEMPO_REAL_OFERTADO, 0.5),
            Err(EstimatorError::InsufficientData(_))
        ));
        assert!(matches!(
            select(&dataset(), "Missing", 0.5),
            Err(EstimatorError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_collinear_pairs() {
        let data = dataset();
        let pairs = collinear_pairs(&data, &[SPW.to_string(), PESO.to_string(), TUCKER.to_string()], 0.7);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].first, SPW);
        assert_eq!(pairs[0].second, PESO);
        assert!(pairs[0].correlation > 0.7);
    }

    #[test]
    fn test_describe() {
        let summary = describe(&dataset(), TIEMPO_REAL_OFERTADO);
        assert_eq!(summary.records, 5);
        let target = summary.target_summary().unwrap();
        assert_eq!(target.count, 5);
        assert_eq!(target.mean, 150.0);
        assert_eq!(target.min, 110.0);
        assert_eq!(target.max, 190.0);
        assert_eq!(target.correlation, None);

        let width = summary.columns.iter().find(|c| c.column == ANCHO_ASSY).unwrap();
        assert_eq!(width.std_dev, 0.0);
        assert_eq!(width.cv_percent, 0.0);
        assert_eq!(width.correlation, None);
    }
}
