//! Engine configuration
//!
//! Every tunable constant of the heuristic, the hybrid engine, the planner and
//! the training pipeline lives here. Values come from serde defaults, then an
//! optional TOML/JSON file, then `CTE_`-prefixed environment variables using
//! `__` between sections (e.g. `CTE_PREDICTION__MIN_CYCLE_TIME=12`).

use crate::error::Result;
use crate::models::{ANCHO_ASSY, PESO, SPW};
use crate::predictor::ProxyRule;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CTE";

/// Default minimum cycle time in seconds
pub const DEFAULT_MIN_CYCLE_TIME: f64 = 10.0;

/// Default seed for the cross-validation shuffle
pub const DEFAULT_CV_SEED: u64 = 42;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub heuristic: HeuristicParams,
    pub prediction: PredictionParams,
    pub planner: PlannerParams,
    pub training: TrainingParams,
}

/// Constants of the two-group heuristic formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicParams {
    /// Fixed handling-robot time per cycle (s)
    pub handling_base_time: f64,
    pub fastener_unit_time: f64,
    pub clip_unit_time: f64,
    pub marking_time: f64,
    pub weld_point_time: f64,
    /// Adhesive application rate (mm/s)
    pub adhesive_rate: f64,
    pub clinch_unit_time: f64,
    /// Hemming rate (mm/s)
    pub hem_rate: f64,
    pub welding_robots: f64,
    pub welding_efficiency: f64,
    /// Tool change penalty when any adhesive is applied (s)
    pub adhesive_tool_change: f64,
    /// Tool change penalty when any clinch is present (s)
    pub clinch_tool_change: f64,
}

impl Default for HeuristicParams {
    fn default() -> Self {
        Self {
            handling_base_time: 16.0,
            fastener_unit_time: 8.0,
            clip_unit_time: 7.0,
            marking_time: 14.0,
            weld_point_time: 6.5,
            adhesive_rate: 10.0,
            clinch_unit_time: 5.0,
            hem_rate: 10.0,
            welding_robots: 3.0,
            welding_efficiency: 0.8,
            adhesive_tool_change: 41.0,
            clinch_tool_change: 25.0,
        }
    }
}

/// Hybrid engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionParams {
    pub min_cycle_time: f64,
    /// Fixed global multiplier; derived from the model R² when unset
    pub scaling_factor: Option<f64>,
    /// R² at which the derived factor is exactly 1.0
    pub reference_r2: f64,
    /// Change of the derived factor per unit of R²
    pub r2_sensitivity: f64,
    /// Linear proxies for model features the inputs do not carry
    pub proxies: Vec<ProxyRule>,
}

impl Default for PredictionParams {
    fn default() -> Self {
        Self {
            min_cycle_time: DEFAULT_MIN_CYCLE_TIME,
            scaling_factor: None,
            reference_r2: 0.7,
            r2_sensitivity: 0.1,
            proxies: vec![
                ProxyRule::new(PESO, SPW, 0.2),
                ProxyRule::new(ANCHO_ASSY, SPW, 4.5),
            ],
        }
    }
}

/// Manual-work and capacity constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerParams {
    pub kit_time_per_unit: f64,
    /// Mass (kg) from which the heavy rack formula applies
    pub heavy_mass_threshold: f64,
    pub heavy_rack_time_per_unit: f64,
    pub light_rack_time_per_unit: f64,
    pub light_rack_time_per_kg: f64,
    /// Overall equipment effectiveness
    pub oee: f64,
}

impl Default for PlannerParams {
    fn default() -> Self {
        Self {
            kit_time_per_unit: 5.0,
            heavy_mass_threshold: 10.0,
            heavy_rack_time_per_unit: 25.0,
            light_rack_time_per_unit: 6.0,
            light_rack_time_per_kg: 0.5,
            oee: 0.80,
        }
    }
}

/// Offline training pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    /// Minimum R² against the target for a variable to be selected
    pub r2_threshold: f64,
    pub folds: usize,
    pub seed: u64,
    /// Std of fold R² below which the model is reported stable
    pub stability_threshold: f64,
    /// |r| above which two features are flagged as collinear
    pub collinearity_threshold: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            r2_threshold: 0.5,
            folds: 3,
            seed: DEFAULT_CV_SEED,
            stability_threshold: 0.1,
            collinearity_threshold: 0.7,
        }
    }
}

impl EngineConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.prediction.min_cycle_time, 10.0);
        let divisor = config.heuristic.welding_robots * config.heuristic.welding_efficiency;
        assert!((divisor - 2.4).abs() < 1e-12);
        assert_eq!(config.planner.oee, 0.8);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.prediction.proxies.len(), 2);
    }

    #[test]
    fn test_load_from_toml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[prediction]
min_cycle_time = 12.5
scaling_factor = 1.1

[[prediction.proxies]]
feature = "Peso"
source = "SPW"
factor = 0.25

[training]
folds = 5
"#
        )
        .unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.prediction.min_cycle_time, 12.5);
        assert_eq!(config.prediction.scaling_factor, Some(1.1));
        assert_eq!(config.prediction.proxies, vec![ProxyRule::new(PESO, SPW, 0.25)]);
        assert_eq!(config.training.folds, 5);
        // untouched sections keep their defaults
        assert_eq!(config.heuristic, HeuristicParams::default());
        assert_eq!(config.training.seed, DEFAULT_CV_SEED);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = EngineConfig::load(Some(Path::new("/nonexistent/cte.toml")));
        assert!(result.is_err());
    }
}
