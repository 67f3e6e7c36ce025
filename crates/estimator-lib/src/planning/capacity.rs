//! Staffing and line-count planning from a cycle time
//!
//! Manual work (kitting and racking) runs alongside the automatic cycle; a
//! cell whose manual time exceeds the cycle time needs a second operator.
//! Annual line count follows from the available time at the configured OEE.

use crate::config::PlannerParams;
use crate::error::{EstimatorError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Working calendar of one line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftConfig {
    pub days_per_year: f64,
    pub shifts_per_day: f64,
    pub hours_per_shift: f64,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            days_per_year: 230.0,
            shifts_per_day: 2.0,
            hours_per_shift: 8.0,
        }
    }
}

impl ShiftConfig {
    pub fn available_seconds(&self) -> f64 {
        self.days_per_year * self.shifts_per_day * self.hours_per_shift * SECONDS_PER_HOUR
    }
}

/// Packaging of finished parts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticsConfig {
    pub units_per_kit: f64,
    pub units_per_rack: f64,
    /// Part mass in kg
    pub mass_kg: f64,
}

impl Default for LogisticsConfig {
    fn default() -> Self {
        Self {
            units_per_kit: 1.0,
            units_per_rack: 1.0,
            mass_kg: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityPlanEntry {
    /// 1-based year index
    pub year: usize,
    pub volume: f64,
    pub lines: u64,
    pub operators_per_shift: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityPlan {
    pub cycle_time: f64,
    pub manual_time: f64,
    /// Manual time over cycle time
    pub saturation: f64,
    pub operators_per_cell: u64,
    /// Parts per year one line can produce
    pub max_capacity: f64,
    /// Set when no production time is available; every entry then has 0 lines
    pub zero_capacity: bool,
    pub entries: Vec<CapacityPlanEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct CapacityPlanner {
    params: PlannerParams,
}

impl CapacityPlanner {
    pub fn new(params: PlannerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PlannerParams {
        &self.params
    }

    /// Manual kitting plus racking time per cycle
    pub fn manual_time(&self, logistics: &LogisticsConfig) -> f64 {
        let p = &self.params;
        let kit_time = logistics.units_per_kit * p.kit_time_per_unit;
        let rack_time = if logistics.mass_kg >= p.heavy_mass_threshold {
            logistics.units_per_rack * p.heavy_rack_time_per_unit
        } else {
            logistics.units_per_rack * p.light_rack_time_per_unit
                + logistics.mass_kg * p.light_rack_time_per_kg
        };
        kit_time + rack_time
    }

    pub fn plan(
        &self,
        cycle_time: f64,
        shift: &ShiftConfig,
        demand: &[f64],
        logistics: &LogisticsConfig,
    ) -> Result<CapacityPlan> {
        if !cycle_time.is_finite() || cycle_time <= 0.0 {
            return Err(EstimatorError::ZeroCycleTime(cycle_time));
        }
        if demand.is_empty() {
            return Err(EstimatorError::InsufficientData(
                "demand plan has no years".to_string(),
            ));
        }
        validate_non_negative("days_per_year", shift.days_per_year)?;
        validate_non_negative("shifts_per_day", shift.shifts_per_day)?;
        validate_non_negative("hours_per_shift", shift.hours_per_shift)?;
        validate_non_negative("units_per_kit", logistics.units_per_kit)?;
        validate_non_negative("units_per_rack", logistics.units_per_rack)?;
        validate_non_negative("mass_kg", logistics.mass_kg)?;
        for (i, volume) in demand.iter().enumerate() {
            validate_non_negative(&format!("demand[{}]", i), *volume)?;
        }
        if !(self.params.oee > 0.0 && self.params.oee <= 1.0) {
            return Err(EstimatorError::invalid(
                "oee",
                format!("must lie in (0, 1], got {}", self.params.oee),
            ));
        }

        let manual_time = self.manual_time(logistics);
        let saturation = manual_time / cycle_time;
        let operators_per_cell = if saturation > 1.0 { 2 } else { 1 };

        let max_capacity = shift.available_seconds() * self.params.oee / cycle_time;
        let zero_capacity = max_capacity <= 0.0;

        let entries = demand
            .iter()
            .enumerate()
            .map(|(i, &volume)| {
                let lines = if zero_capacity {
                    0
                } else {
                    (volume / max_capacity).ceil() as u64
                };
                CapacityPlanEntry {
                    year: i + 1,
                    volume,
                    lines,
                    operators_per_shift: lines * operators_per_cell,
                }
            })
            .collect();

        debug!(
            cycle_time,
            manual_time,
            saturation,
            max_capacity,
            zero_capacity,
            "Capacity plan computed"
        );

        Ok(CapacityPlan {
            cycle_time,
            manual_time,
            saturation,
            operators_per_cell,
            max_capacity,
            zero_capacity,
            entries,
        })
    }
}

fn validate_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EstimatorError::invalid(
            name,
            format!("must be non-negative and finite, got {}", value),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> CapacityPlanner {
        CapacityPlanner::default()
    }

    #[test]
    fn test_manual_time_heavy_and_light() {
        let heavy = LogisticsConfig {
            units_per_kit: 2.0,
            units_per_rack: 3.0,
            mass_kg: 10.0,
        };
        assert_eq!(planner().manual_time(&heavy), 10.0 + 75.0);

        let light = LogisticsConfig {
            mass_kg: 4.0,
            ..heavy
        };
        assert_eq!(planner().manual_time(&light), 10.0 + 18.0 + 2.0);
    }

    #[test]
    fn test_plan_lines_and_operators() {
        let shift = ShiftConfig {
            days_per_year: 100.0,
            shifts_per_day: 1.0,
            hours_per_shift: 10.0,
        };
        // 3.6e6 s · 0.8 / 60 s = 48 000 parts per line
        let plan = planner()
            .plan(60.0, &shift, &[0.0, 48_000.0, 48_001.0, 100_000.0], &LogisticsConfig::default())
            .unwrap();

        assert!((plan.max_capacity - 48_000.0).abs() < 1e-6);
        assert!(!plan.zero_capacity);
        let lines: Vec<u64> = plan.entries.iter().map(|e| e.lines).collect();
        assert_eq!(lines, vec![0, 1, 2, 3]);
        assert_eq!(plan.entries[0].year, 1);
        assert_eq!(plan.entries[3].year, 4);
        assert_eq!(plan.operators_per_cell, 1);
        assert_eq!(plan.entries[3].operators_per_shift, 3);
    }

    #[test]
    fn test_saturated_cell_needs_two_operators() {
        let logistics = LogisticsConfig {
            units_per_kit: 4.0,
            units_per_rack: 2.0,
            mass_kg: 12.0,
        };
        // manual = 20 + 50 = 70 s against a 50 s cycle
        let plan = planner()
            .plan(50.0, &ShiftConfig::default(), &[500_000.0], &logistics)
            .unwrap();
        assert_eq!(plan.manual_time, 70.0);
        assert!((plan.saturation - 1.4).abs() < 1e-12);
        assert_eq!(plan.operators_per_cell, 2);
        assert_eq!(
            plan.entries[0].operators_per_shift,
            plan.entries[0].lines * 2
        );
    }

    #[test]
    fn test_saturation_exactly_one_keeps_single_operator() {
        let logistics = LogisticsConfig {
            units_per_kit: 1.0,
            units_per_rack: 1.0,
            mass_kg: 10.0,
        };
        let plan = planner()
            .plan(30.0, &ShiftConfig::default(), &[1.0], &logistics)
            .unwrap();
        assert_eq!(plan.saturation, 1.0);
        assert_eq!(plan.operators_per_cell, 1);
    }

    #[test]
    fn test_zero_available_time_flags_zero_capacity() {
        let shift = ShiftConfig {
            days_per_year: 0.0,
            ..ShiftConfig::default()
        };
        let plan = planner()
            .plan(60.0, &shift, &[10_000.0, 20_000.0], &LogisticsConfig::default())
            .unwrap();
        assert!(plan.zero_capacity);
        assert_eq!(plan.max_capacity, 0.0);
        assert!(plan.entries.iter().all(|e| e.lines == 0 && e.operators_per_shift == 0));
    }

    #[test]
    fn test_invalid_inputs() {
        let shift = ShiftConfig::default();
        let logistics = LogisticsConfig::default();
        for cycle in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                planner().plan(cycle, &shift, &[1.0], &logistics),
                Err(EstimatorError::ZeroCycleTime(_))
            ));
        }
        assert!(matches!(
            planner().plan(60.0, &shift, &[], &logistics),
            Err(EstimatorError::InsufficientData(_))
        ));
        assert!(matches!(
            planner().plan(60.0, &shift, &[1.0, -5.0], &logistics),
            Err(EstimatorError::InvalidParameter { name, .. }) if name == "demand[1]"
        ));
        let negative_mass = LogisticsConfig {
            mass_kg: -1.0,
            ..logistics
        };
        assert!(planner().plan(60.0, &shift, &[1.0], &negative_mass).is_err());
    }
}
