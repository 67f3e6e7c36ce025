//! Observability infrastructure for the estimator
//!
//! Provides:
//! - Prometheus metrics (prediction counts by provenance, fallback reasons,
//!   prediction latency, model quality)
//! - Structured logging of engine events with tracing

use crate::models::{FallbackReason, PredictionResult, Provenance};
use crate::planning::CapacityPlan;
use crate::training::RegressionModel;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec, Encoder,
    Gauge, Histogram, IntCounter, IntCounterVec, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    predictions_total: IntCounterVec,
    fallbacks_total: IntCounterVec,
    floored_predictions_total: IntCounter,
    prediction_errors_total: IntCounter,
    prediction_latency_seconds: Histogram,
    model_r2: Gauge,
    training_runs_total: IntCounter,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            predictions_total: register_int_counter_vec!(
                "cycle_time_predictions_total",
                "Predictions served, by provenance",
                &["provenance"]
            )
            .expect("Failed to register predictions_total"),

            fallbacks_total: register_int_counter_vec!(
                "cycle_time_fallbacks_total",
                "Predictions that fell back to the heuristic, by reason",
                &["reason"]
            )
            .expect("Failed to register fallbacks_total"),

            floored_predictions_total: register_int_counter!(
                "cycle_time_floored_predictions_total",
                "Predictions raised to the minimum cycle time"
            )
            .expect("Failed to register floored_predictions_total"),

            prediction_errors_total: register_int_counter!(
                "cycle_time_prediction_errors_total",
                "Predictions rejected because of invalid inputs"
            )
            .expect("Failed to register prediction_errors_total"),

            prediction_latency_seconds: register_histogram!(
                "cycle_time_prediction_latency_seconds",
                "Time spent computing one prediction",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            model_r2: register_gauge!(
                "cycle_time_model_r2",
                "In-sample R² of the loaded regression model (0 when none)"
            )
            .expect("Failed to register model_r2"),

            training_runs_total: register_int_counter!(
                "cycle_time_training_runs_total",
                "Completed training runs"
            )
            .expect("Failed to register training_runs_total"),
        }
    }
}

/// Lightweight handle to the global metrics; clones share the same metrics
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn inc_prediction(&self, provenance: Provenance) {
        self.inner()
            .predictions_total
            .with_label_values(&[provenance.as_str()])
            .inc();
    }

    pub fn inc_fallback(&self, reason: &FallbackReason) {
        self.inner()
            .fallbacks_total
            .with_label_values(&[reason.label()])
            .inc();
    }

    pub fn inc_floored(&self) {
        self.inner().floored_predictions_total.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors_total.inc();
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn set_model_r2(&self, r2: Option<f64>) {
        self.inner().model_r2.set(r2.unwrap_or(0.0));
    }

    pub fn inc_training_runs(&self) {
        self.inner().training_runs_total.inc();
    }

    pub fn predictions(&self, provenance: Provenance) -> u64 {
        self.inner()
            .predictions_total
            .with_label_values(&[provenance.as_str()])
            .get()
    }

    pub fn fallbacks(&self, label: &str) -> u64 {
        self.inner().fallbacks_total.with_label_values(&[label]).get()
    }

    /// Prometheus text exposition of every registered metric
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for engine events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new("cycle-time-estimator")
    }
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn log_prediction(&self, result: &PredictionResult) {
        let estimated: Vec<&str> = result
            .contributions
            .iter()
            .flat_map(|b| b.contributions.iter())
            .filter(|c| c.estimated)
            .map(|c| c.feature.as_str())
            .collect();

        info!(
            event = "prediction_generated",
            instance = %self.instance,
            provenance = %result.provenance,
            cycle_time = result.cycle_time,
            quality = ?result.quality,
            scaling_factor = result.scaling_factor,
            floored = result.floored,
            estimated_features = ?estimated,
            out_of_range = ?result.out_of_range,
            "Generated cycle time prediction"
        );
    }

    pub fn log_fallback(&self, reason: &FallbackReason) {
        warn!(
            event = "prediction_fallback",
            instance = %self.instance,
            reason = reason.label(),
            detail = %reason,
            "Regression unavailable, using heuristic"
        );
    }

    pub fn log_out_of_range(&self, features: &[String]) {
        warn!(
            event = "prediction_extrapolation",
            instance = %self.instance,
            features = ?features,
            "Inputs outside the training range, regression is extrapolating"
        );
    }

    pub fn log_model_trained(&self, model: &RegressionModel) {
        info!(
            event = "model_trained",
            instance = %self.instance,
            features = ?model.feature_names(),
            samples = model.n_samples,
            r2 = model.metrics.r2,
            rmse = model.metrics.rmse,
            mae = model.metrics.mae,
            "Regression model trained"
        );
    }

    pub fn log_model_loaded(&self, dir: &Path, model: &RegressionModel) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            dir = %dir.display(),
            features = ?model.feature_names(),
            r2 = model.metrics.r2,
            trained_at = %model.trained_at.to_rfc3339(),
            "Regression model loaded"
        );
    }

    pub fn log_model_missing(&self, dir: &Path) {
        info!(
            event = "model_missing",
            instance = %self.instance,
            dir = %dir.display(),
            "No model artifact found, running in heuristic mode"
        );
    }

    pub fn log_model_rejected(&self, dir: &Path, error: &dyn std::error::Error) {
        warn!(
            event = "model_load_failed",
            instance = %self.instance,
            dir = %dir.display(),
            error = %error,
            "Model artifact unusable, running in heuristic mode"
        );
    }

    pub fn log_capacity_plan(&self, plan: &CapacityPlan) {
        info!(
            event = "capacity_planned",
            instance = %self.instance,
            manual_time = plan.manual_time,
            saturation = plan.saturation,
            operators_per_cell = plan.operators_per_cell,
            max_capacity = plan.max_capacity,
            years = plan.entries.len(),
            max_lines = plan.entries.iter().map(|e| e.lines).max().unwrap_or(0),
            "Capacity plan computed"
        );
    }
}
