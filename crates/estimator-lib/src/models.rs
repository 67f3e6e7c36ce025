//! Core data models for the cycle-time estimator

use crate::error::{EstimatorError, Result};
use crate::predictor::HeuristicBreakdown;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Weld-point count (historical column and live input)
pub const SPW: &str = "SPW";
/// Adhesive (mastic) bead length in mm
pub const MASTICO_MM: &str = "Mastico_mm";
/// Clip (tucker) count
pub const TUCKER: &str = "Tucker";
/// Part mass in kg
pub const PESO: &str = "Peso";
pub const LONGITUD_ASSY: &str = "LONGITUD_ASSY";
pub const ANCHO_ASSY: &str = "ANCHO_ASSY";
pub const ALTO_ASSY: &str = "ALTO_ASSY";
/// Observed cycle time in seconds (regression target)
pub const TIEMPO_REAL_OFERTADO: &str = "Tiempo_Real_Ofertado";

/// Clinch (tox) count, live input only
pub const TOX: &str = "Tox";
/// Hem (roller hemming) length in mm, live input only
pub const RH_MM: &str = "RH_mm";
/// Riveted nut (fastener) count, live input only
pub const TUERCAS: &str = "Tuercas";

/// Documented column vocabulary of the historical data, in column order
pub const HISTORICAL_COLUMNS: [&str; 8] = [
    SPW,
    MASTICO_MM,
    TUCKER,
    PESO,
    LONGITUD_ASSY,
    ANCHO_ASSY,
    ALTO_ASSY,
    TIEMPO_REAL_OFERTADO,
];

/// One historical manufacturing project sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub project: String,
    pub values: BTreeMap<String, f64>,
}

impl HistoricalRecord {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: f64) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    /// Value of a column; NaN and infinities count as missing
    pub fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied().filter(|v| v.is_finite())
    }
}

/// Historical training corpus with an explicit column order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub records: Vec<HistoricalRecord>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, records: Vec<HistoricalRecord>) -> Self {
        Self { columns, records }
    }

    /// Dataset over the documented historical vocabulary
    pub fn with_standard_columns(records: Vec<HistoricalRecord>) -> Self {
        Self::new(
            HISTORICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            records,
        )
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Column values with missing entries as `None`
    pub fn column(&self, column: &str) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.get(column)).collect()
    }

    /// Subset of records by index, keeping the column order
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
        }
    }
}

/// A selected variable tagged with its explained variance against the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScore {
    pub name: String,
    pub r_squared: f64,
}

/// Ordered list of variables selected for modeling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub target: String,
    pub features: Vec<FeatureScore>,
}

impl FeatureSet {
    /// Feature set from explicit names, without scores
    pub fn from_names<S: AsRef<str>>(target: &str, names: &[S]) -> Self {
        Self {
            target: target.to_string(),
            features: names
                .iter()
                .map(|n| FeatureScore {
                    name: n.as_ref().to_string(),
                    r_squared: f64::NAN,
                })
                .collect(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Live process parameters collected for one prediction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessInputs {
    pub weld_points: f64,
    pub adhesive_mm: f64,
    pub clinch_count: f64,
    pub hem_mm: f64,
    pub fastener_count: f64,
    pub clip_count: f64,
    pub marking: bool,
    /// Additional directly measured model features (e.g. `Peso`)
    #[serde(default)]
    pub measured: BTreeMap<String, f64>,
}

impl ProcessInputs {
    pub fn with_weld_points(weld_points: f64) -> Self {
        Self {
            weld_points,
            ..Self::default()
        }
    }

    pub fn with_measured(mut self, name: impl Into<String>, value: f64) -> Self {
        self.measured.insert(name.into(), value);
        self
    }

    /// Look up an input by its column name
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            SPW => Some(self.weld_points),
            MASTICO_MM => Some(self.adhesive_mm),
            TOX => Some(self.clinch_count),
            RH_MM => Some(self.hem_mm),
            TUERCAS => Some(self.fastener_count),
            TUCKER => Some(self.clip_count),
            other => self.measured.get(other).copied(),
        }
    }

    /// Overwrite an input by its column name
    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        match name {
            SPW => self.weld_points = value,
            MASTICO_MM => self.adhesive_mm = value,
            TOX => self.clinch_count = value,
            RH_MM => self.hem_mm = value,
            TUERCAS => self.fastener_count = value,
            TUCKER => self.clip_count = value,
            other => match self.measured.get_mut(other) {
                Some(slot) => *slot = value,
                None => return Err(EstimatorError::MissingFeature(other.to_string())),
            },
        }
        Ok(())
    }
}

/// Which path produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Regression,
    Heuristic,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Regression => "regression",
            Provenance::Heuristic => "heuristic",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a prediction did not use the regression model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    NoModel,
    MissingFeature(String),
    NonFinitePrediction(f64),
}

impl FallbackReason {
    /// Short label used in metrics
    pub fn label(&self) -> &'static str {
        match self {
            FallbackReason::NoModel => "no_model",
            FallbackReason::MissingFeature(_) => "missing_feature",
            FallbackReason::NonFinitePrediction(_) => "non_finite_prediction",
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NoModel => write!(f, "no trained model loaded"),
            FallbackReason::MissingFeature(name) => {
                write!(f, "feature `{}` unavailable and no proxy configured", name)
            }
            FallbackReason::NonFinitePrediction(v) => {
                write!(f, "regression produced a non-finite value ({})", v)
            }
        }
    }
}

/// Contribution of one feature to a regression prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub feature: String,
    pub value: f64,
    pub coefficient: f64,
    pub contribution: f64,
    /// Whether the value came from a proxy rather than the inputs
    pub estimated: bool,
}

/// Intercept plus per-feature contributions of a regression prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionBreakdown {
    pub base_time: f64,
    pub contributions: Vec<Contribution>,
    /// Raw model output (base time plus all contributions)
    pub total: f64,
}

/// Final cycle-time estimate with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub cycle_time: f64,
    pub provenance: Provenance,
    /// R² of the model when regression was used
    pub quality: Option<f64>,
    pub contributions: Option<ContributionBreakdown>,
    pub heuristic: Option<HeuristicBreakdown>,
    pub fallback_reason: Option<FallbackReason>,
    pub scaling_factor: f64,
    /// True when the minimum floor replaced the scaled value
    pub floored: bool,
    /// Features whose value lies outside the training range
    pub out_of_range: Vec<String>,
}

impl PredictionResult {
    pub fn is_degraded(&self) -> bool {
        self.provenance == Provenance::Heuristic
    }
}
