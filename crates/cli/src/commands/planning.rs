//! Capacity planning command

use anyhow::{Context, Result};
use colored::Colorize;
use estimator_lib::config::EngineConfig;
use estimator_lib::models::{ProcessInputs, PESO};
use estimator_lib::planning::{CapacityPlanner, LogisticsConfig, ShiftConfig};
use estimator_lib::predictor::{resolve, ProxyRule};
use estimator_lib::{HybridPredictionEngine, Predictor, StructuredLogger};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    color_provenance, format_number, format_seconds, print_header, print_json, print_table,
    print_warning, OutputFormat,
};

/// Everything the plan command needs
pub struct PlanRequest {
    pub inputs: ProcessInputs,
    /// Skip prediction and plan with this cycle time
    pub cycle_time: Option<f64>,
    pub volumes: Vec<f64>,
    pub shift: ShiftConfig,
    pub units_per_kit: f64,
    pub units_per_rack: f64,
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    provenance: Option<&'a str>,
    mass_kg: f64,
    mass_estimated: bool,
    plan: &'a estimator_lib::planning::CapacityPlan,
}

/// Part mass for the rack time, resolved like the model feature `Peso`
///
/// Returns the mass and whether it came from a proxy. Without a mass or a
/// proxy source the light-part formula applies with 0 kg.
fn part_mass(inputs: &ProcessInputs, proxies: &[ProxyRule]) -> (f64, bool) {
    resolve(PESO, inputs, proxies).map_or((0.0, false), |f| (f.value, f.estimated))
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Year")]
    year: usize,
    #[tabled(rename = "Volume")]
    volume: String,
    #[tabled(rename = "Lines")]
    lines: u64,
    #[tabled(rename = "Operators/Shift")]
    operators: u64,
}

/// Compute lines and staffing for the demand plan
pub fn plan(
    config: EngineConfig,
    artifact_dir: &Path,
    request: PlanRequest,
    format: OutputFormat,
) -> Result<()> {
    let planner = CapacityPlanner::new(config.planner.clone());
    let (mass_kg, mass_estimated) = part_mass(&request.inputs, &config.prediction.proxies);
    let logistics = LogisticsConfig {
        units_per_kit: request.units_per_kit,
        units_per_rack: request.units_per_rack,
        mass_kg,
    };

    let (cycle_time, provenance) = match request.cycle_time {
        Some(cycle_time) => (cycle_time, None),
        None => {
            let engine = HybridPredictionEngine::from_artifact_dir(config, artifact_dir);
            let prediction = engine
                .predict(&request.inputs)
                .context("Prediction failed")?;
            (prediction.cycle_time, Some(prediction.provenance))
        }
    };

    let plan = planner
        .plan(cycle_time, &request.shift, &request.volumes, &logistics)
        .context("Capacity planning failed")?;
    StructuredLogger::default().log_capacity_plan(&plan);

    match format {
        OutputFormat::Json => print_json(&PlanOutput {
            provenance: provenance.map(|p| p.as_str()),
            mass_kg,
            mass_estimated,
            plan: &plan,
        })?,
        OutputFormat::Table => {
            print_header("Capacity Plan");
            println!("Cycle time:             {}", format_seconds(plan.cycle_time).bold());
            if let Some(p) = provenance {
                println!("Source:                 {}", color_provenance(p.as_str()));
            }
            let mass_note = if mass_estimated { " (estimated)" } else { "" };
            println!("Part mass:              {:.1} kg{}", mass_kg, mass_note);
            println!("Manual time:            {}", format_seconds(plan.manual_time));
            println!("Saturation:             {:.1}%", plan.saturation * 100.0);
            println!("Operators per cell:     {}", plan.operators_per_cell);
            println!("Capacity per line:      {} parts/year", format_number(plan.max_capacity));
            println!();

            let rows: Vec<PlanRow> = plan
                .entries
                .iter()
                .map(|e| PlanRow {
                    year: e.year,
                    volume: format!("{:.0}", e.volume),
                    lines: e.lines,
                    operators: e.operators_per_shift,
                })
                .collect();
            print_table(&rows);

            if plan.zero_capacity {
                print_warning("No production time available; line counts are zero");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use estimator_lib::models::SPW;

    fn proxies() -> Vec<ProxyRule> {
        vec![ProxyRule::new(PESO, SPW, 0.2)]
    }

    #[test]
    fn test_part_mass_prefers_measured_value() {
        let inputs = ProcessInputs::with_weld_points(100.0).with_measured(PESO, 7.5);
        assert_eq!(part_mass(&inputs, &proxies()), (7.5, false));
    }

    #[test]
    fn test_part_mass_uses_proxy() {
        let inputs = ProcessInputs::with_weld_points(100.0);
        assert_eq!(part_mass(&inputs, &proxies()), (20.0, true));
    }

    #[test]
    fn test_part_mass_without_source() {
        let inputs = ProcessInputs::with_weld_points(100.0);
        assert_eq!(part_mass(&inputs, &[]), (0.0, false));
    }
}
