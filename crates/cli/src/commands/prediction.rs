//! Prediction-related CLI commands

use anyhow::{Context, Result};
use colored::Colorize;
use estimator_lib::config::EngineConfig;
use estimator_lib::models::{PredictionResult, ProcessInputs};
use estimator_lib::planning::{sweep, SweepRange};
use estimator_lib::{EngineMetrics, HybridPredictionEngine, Predictor};
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    color_provenance, color_r2, format_number, format_seconds, print_header, print_json,
    print_table, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct ContributionRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Coefficient")]
    coefficient: String,
    #[tabled(rename = "Contribution (s)")]
    contribution: String,
}

#[derive(Tabled)]
struct SensitivityRow {
    #[tabled(rename = "Offset %")]
    offset: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Time (s)")]
    time: String,
    #[tabled(rename = "Delta (s)")]
    delta: String,
    #[tabled(rename = "Source")]
    provenance: String,
}

/// Predict the cycle time of one part
pub fn predict(
    config: EngineConfig,
    artifact_dir: &Path,
    inputs: &ProcessInputs,
    format: OutputFormat,
) -> Result<()> {
    let engine = HybridPredictionEngine::from_artifact_dir(config, artifact_dir);
    let result = engine.predict(inputs).context("Prediction failed")?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_prediction(&result),
    }
    Ok(())
}

fn print_prediction(result: &PredictionResult) {
    print_header("Cycle Time Prediction");
    println!(
        "Cycle time:             {}",
        format_seconds(result.cycle_time).bold()
    );
    println!(
        "Source:                 {}",
        color_provenance(result.provenance.as_str())
    );
    if let Some(quality) = result.quality {
        println!("Model R²:               {}", color_r2(quality));
    }
    println!("Scaling factor:         {:.4}", result.scaling_factor);
    println!();

    if let Some(breakdown) = &result.contributions {
        println!("{}", "Contributions".bold());
        println!("Base time:              {}", format_seconds(breakdown.base_time));
        let rows: Vec<ContributionRow> = breakdown
            .contributions
            .iter()
            .map(|c| ContributionRow {
                feature: if c.estimated {
                    format!("{} (estimated)", c.feature)
                } else {
                    c.feature.clone()
                },
                value: format_number(c.value),
                coefficient: format!("{:.4}", c.coefficient),
                contribution: format_number(c.contribution),
            })
            .collect();
        print_table(&rows);
    }

    if let Some(heuristic) = &result.heuristic {
        println!("{}", "Heuristic groups".bold());
        println!("Handling:               {}", format_seconds(heuristic.handling_time));
        println!("Welding:                {}", format_seconds(heuristic.welding_time));
        println!("Bottleneck:             {}", heuristic.bottleneck.to_string().cyan());
    }

    if let Some(reason) = &result.fallback_reason {
        print_warning(&format!("Heuristic fallback: {}", reason));
    }
    if result.floored {
        print_warning("Raised to the minimum cycle time");
    }
    if !result.out_of_range.is_empty() {
        print_warning(&format!(
            "Outside the training range: {}",
            result.out_of_range.join(", ")
        ));
    }
}

/// Sweep one input and show the predicted times
pub fn sensitivity(
    config: EngineConfig,
    artifact_dir: &Path,
    inputs: &ProcessInputs,
    variable: &str,
    range: SweepRange,
    steps: usize,
    format: OutputFormat,
) -> Result<()> {
    let engine = HybridPredictionEngine::from_artifact_dir(config, artifact_dir);
    let points = sweep(&engine, inputs, variable, range, steps)
        .with_context(|| format!("Sensitivity sweep of `{}` failed", variable))?;

    match format {
        OutputFormat::Json => print_json(&points)?,
        OutputFormat::Table => {
            print_header(&format!("Sensitivity: {}", variable));
            let rows: Vec<SensitivityRow> = points
                .iter()
                .map(|p| SensitivityRow {
                    offset: format!("{:+.1}", p.offset_percent),
                    value: format_number(p.value),
                    time: format_number(p.predicted_time),
                    delta: format!("{:+.2}", p.delta),
                    provenance: color_provenance(p.provenance.as_str()),
                })
                .collect();
            print_table(&rows);
        }
    }
    Ok(())
}

/// Load the engine and print the metrics registry
pub fn metrics(config: EngineConfig, artifact_dir: &Path) -> Result<()> {
    let _engine = HybridPredictionEngine::from_artifact_dir(config, artifact_dir);
    print!("{}", EngineMetrics::new().gather_text());
    Ok(())
}
