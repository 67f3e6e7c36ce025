//! Hybrid regression/heuristic prediction engine
//!
//! Every call tries the loaded regression model first. When no model is
//! loaded, or a model feature cannot be resolved, or the model output is not
//! finite, that call alone falls back to the heuristic. The chosen time is then
//! scaled by the global factor and clamped to the minimum cycle time.

use super::heuristic::{validate_inputs, HeuristicCalculator};
use super::proxy::resolve_all;
use super::Predictor;
use crate::artifact::ModelArtifact;
use crate::config::EngineConfig;
use crate::error::{EstimatorError, Result};
use crate::models::{
    Contribution, ContributionBreakdown, FallbackReason, PredictionResult, ProcessInputs,
    Provenance,
};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::training::RegressionModel;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Outcome of trying the regression path for one call
#[derive(Debug, Clone, PartialEq)]
pub enum RegressionAttempt {
    Ok {
        raw_time: f64,
        breakdown: ContributionBreakdown,
        out_of_range: Vec<String>,
    },
    Fallback(FallbackReason),
}

/// Prediction engine over an optional, immutable regression model
#[derive(Clone)]
pub struct HybridPredictionEngine {
    config: EngineConfig,
    heuristic: HeuristicCalculator,
    model: Option<Arc<RegressionModel>>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl HybridPredictionEngine {
    pub fn new(config: EngineConfig, model: Option<Arc<RegressionModel>>) -> Self {
        let metrics = EngineMetrics::new();
        metrics.set_model_r2(model.as_ref().map(|m| m.metrics.r2));
        Self {
            heuristic: HeuristicCalculator::new(config.heuristic.clone()),
            config,
            model,
            metrics,
            logger: StructuredLogger::default(),
        }
    }

    /// Engine in heuristic-only mode
    pub fn heuristic_only(config: EngineConfig) -> Self {
        Self::new(config, None)
    }

    /// Loads the artifact in `dir`; an absent or unusable artifact leaves the
    /// engine in heuristic mode
    pub fn from_artifact_dir(config: EngineConfig, dir: &Path) -> Self {
        let logger = StructuredLogger::default();
        let model = match ModelArtifact::new(dir).load() {
            Ok(Some(model)) => {
                logger.log_model_loaded(dir, &model);
                Some(Arc::new(model))
            }
            Ok(None) => {
                logger.log_model_missing(dir);
                None
            }
            Err(e) => {
                logger.log_model_rejected(dir, &e);
                None
            }
        };
        Self::new(config, model)
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// New engine sharing this configuration but serving another model
    pub fn with_model(&self, model: Option<Arc<RegressionModel>>) -> Self {
        Self::new(self.config.clone(), model).with_logger(self.logger.clone())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model(&self) -> Option<&RegressionModel> {
        self.model.as_deref()
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Configured factor, else derived from the model R², else 1.0
    pub fn scaling_factor(&self) -> f64 {
        let p = &self.config.prediction;
        if let Some(factor) = p.scaling_factor {
            return factor;
        }
        match &self.model {
            Some(model) => 1.0 + (model.metrics.r2 - p.reference_r2) * p.r2_sensitivity,
            None => 1.0,
        }
    }

    /// Runs the regression path without falling back
    pub fn try_regression(&self, inputs: &ProcessInputs) -> RegressionAttempt {
        let Some(model) = self.model.as_deref() else {
            return RegressionAttempt::Fallback(FallbackReason::NoModel);
        };

        let names = model.feature_names();
        let resolved = match resolve_all(&names, inputs, &self.config.prediction.proxies) {
            Ok(resolved) => resolved,
            Err(missing) => return RegressionAttempt::Fallback(FallbackReason::MissingFeature(missing)),
        };

        let values: Vec<f64> = resolved.iter().map(|r| r.value).collect();
        let raw_time = model.predict_ordered(&values);
        if !raw_time.is_finite() {
            return RegressionAttempt::Fallback(FallbackReason::NonFinitePrediction(raw_time));
        }

        let contributions = resolved
            .iter()
            .zip(model.coefficient_vector())
            .map(|(feature, coefficient)| Contribution {
                feature: feature.name.clone(),
                value: feature.value,
                coefficient,
                contribution: coefficient * feature.value,
                estimated: feature.estimated,
            })
            .collect();

        let out_of_range = resolved
            .iter()
            .filter(|f| {
                model
                    .feature_ranges
                    .get(&f.name)
                    .is_some_and(|range| !range.contains(f.value))
            })
            .map(|f| f.name.clone())
            .collect();

        RegressionAttempt::Ok {
            raw_time,
            breakdown: ContributionBreakdown {
                base_time: model.intercept,
                contributions,
                total: raw_time,
            },
            out_of_range,
        }
    }

    fn compute(&self, inputs: &ProcessInputs) -> Result<PredictionResult> {
        validate_inputs(inputs)?;

        let scaling_factor = self.scaling_factor();
        if !scaling_factor.is_finite() || scaling_factor <= 0.0 {
            return Err(EstimatorError::invalid(
                "scaling_factor",
                format!("must be positive and finite, got {}", scaling_factor),
            ));
        }
        let min_cycle_time = self.config.prediction.min_cycle_time;
        if !min_cycle_time.is_finite() || min_cycle_time < 0.0 {
            return Err(EstimatorError::invalid(
                "min_cycle_time",
                format!("must be non-negative and finite, got {}", min_cycle_time),
            ));
        }

        let (raw_time, mut result) = match self.try_regression(inputs) {
            RegressionAttempt::Ok {
                raw_time,
                breakdown,
                out_of_range,
            } => {
                if !out_of_range.is_empty() {
                    self.logger.log_out_of_range(&out_of_range);
                }
                let result = PredictionResult {
                    cycle_time: 0.0,
                    provenance: Provenance::Regression,
                    quality: self.model.as_ref().map(|m| m.metrics.r2),
                    contributions: Some(breakdown),
                    heuristic: None,
                    fallback_reason: None,
                    scaling_factor,
                    floored: false,
                    out_of_range,
                };
                (raw_time, result)
            }
            RegressionAttempt::Fallback(reason) => {
                self.metrics.inc_fallback(&reason);
                match reason {
                    // already reported when the engine was built
                    FallbackReason::NoModel => debug!("No model loaded, using heuristic"),
                    _ => self.logger.log_fallback(&reason),
                }
                let breakdown = self.heuristic.calculate(inputs)?;
                let result = PredictionResult {
                    cycle_time: 0.0,
                    provenance: Provenance::Heuristic,
                    quality: None,
                    contributions: None,
                    heuristic: Some(breakdown),
                    fallback_reason: Some(reason),
                    scaling_factor,
                    floored: false,
                    out_of_range: Vec::new(),
                };
                (breakdown.cycle_time, result)
            }
        };

        let scaled = raw_time * scaling_factor;
        if scaled < min_cycle_time {
            result.cycle_time = min_cycle_time;
            result.floored = true;
            self.metrics.inc_floored();
        } else {
            result.cycle_time = scaled;
        }
        Ok(result)
    }
}

impl Predictor for HybridPredictionEngine {
    fn predict(&self, inputs: &ProcessInputs) -> Result<PredictionResult> {
        let start = Instant::now();
        let outcome = self.compute(inputs);
        self.metrics
            .observe_prediction_latency(start.elapsed().as_secs_f64());

        match &outcome {
            Ok(result) => {
                self.metrics.inc_prediction(result.provenance);
                self.logger.log_prediction(result);
            }
            Err(_) => self.metrics.inc_prediction_errors(),
        }
        outcome
    }

    fn provides(&self, name: &str, inputs: &ProcessInputs) -> bool {
        inputs.get(name).is_some()
    }
}
