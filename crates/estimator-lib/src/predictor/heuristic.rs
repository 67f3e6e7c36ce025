//! Two-group heuristic cycle time
//!
//! The handling robot and the welding robots work in parallel; the slower
//! group is the bottleneck and sets the cycle time. When both groups take
//! exactly the same time the welding group is reported as the bottleneck.

use crate::config::HeuristicParams;
use crate::error::{EstimatorError, Result};
use crate::models::{ProcessInputs, MASTICO_MM, RH_MM, SPW, TOX, TUCKER, TUERCAS};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkGroup {
    Handling,
    Welding,
}

impl fmt::Display for WorkGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkGroup::Handling => f.write_str("handling"),
            WorkGroup::Welding => f.write_str("welding"),
        }
    }
}

/// Group times and the resulting bottleneck
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeuristicBreakdown {
    pub handling_time: f64,
    pub welding_time: f64,
    pub cycle_time: f64,
    pub bottleneck: WorkGroup,
}

/// Closed-form fallback estimator; needs no historical data
#[derive(Debug, Clone, Default)]
pub struct HeuristicCalculator {
    params: HeuristicParams,
}

impl HeuristicCalculator {
    pub fn new(params: HeuristicParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &HeuristicParams {
        &self.params
    }

    pub fn calculate(&self, inputs: &ProcessInputs) -> Result<HeuristicBreakdown> {
        validate_inputs(inputs)?;
        let handling_time = self.handling_time(inputs);
        let welding_time = self.welding_time(inputs)?;

        let (cycle_time, bottleneck) = if handling_time > welding_time {
            (handling_time, WorkGroup::Handling)
        } else {
            (welding_time, WorkGroup::Welding)
        };

        Ok(HeuristicBreakdown {
            handling_time,
            welding_time,
            cycle_time,
            bottleneck,
        })
    }

    fn handling_time(&self, inputs: &ProcessInputs) -> f64 {
        let p = &self.params;
        let marking = if inputs.marking { p.marking_time } else { 0.0 };
        p.handling_base_time
            + inputs.fastener_count * p.fastener_unit_time
            + inputs.clip_count * p.clip_unit_time
            + marking
    }

    fn welding_time(&self, inputs: &ProcessInputs) -> Result<f64> {
        let p = &self.params;
        let divisor = p.welding_robots * p.welding_efficiency;
        if !(divisor > 0.0) || !(p.adhesive_rate > 0.0) || !(p.hem_rate > 0.0) {
            return Err(EstimatorError::invalid(
                "heuristic",
                "robot count, efficiency and rates must be positive",
            ));
        }

        let process = inputs.weld_points * p.weld_point_time
            + inputs.adhesive_mm / p.adhesive_rate
            + inputs.clinch_count * p.clinch_unit_time
            + inputs.hem_mm / p.hem_rate;

        // penalties depend on presence, not magnitude
        let adhesive_penalty = if inputs.adhesive_mm > 0.0 { p.adhesive_tool_change } else { 0.0 };
        let clinch_penalty = if inputs.clinch_count > 0.0 { p.clinch_tool_change } else { 0.0 };

        Ok(process / divisor + adhesive_penalty + clinch_penalty)
    }
}

/// Rejects negative or non-finite process inputs
pub fn validate_inputs(inputs: &ProcessInputs) -> Result<()> {
    let fields = [
        (SPW, inputs.weld_points),
        (MASTICO_MM, inputs.adhesive_mm),
        (TOX, inputs.clinch_count),
        (RH_MM, inputs.hem_mm),
        (TUERCAS, inputs.fastener_count),
        (TUCKER, inputs.clip_count),
    ];
    let measured = inputs.measured.iter().map(|(k, v)| (k.as_str(), *v));
    for (name, value) in fields.into_iter().chain(measured) {
        if !value.is_finite() {
            return Err(EstimatorError::invalid(name, format!("must be finite, got {}", value)));
        }
        if value < 0.0 {
            return Err(EstimatorError::invalid(name, format!("must be non-negative, got {}", value)));
        }
    }
    Ok(())
}
