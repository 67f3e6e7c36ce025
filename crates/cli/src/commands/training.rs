//! Dataset and model training commands

use anyhow::{Context, Result};
use colored::Colorize;
use estimator_lib::config::TrainingParams;
use estimator_lib::training::{
    describe as describe_dataset, ModelReport, Stability, TrainingPipeline,
};
use estimator_lib::{EngineMetrics, ModelArtifact, StructuredLogger};
use std::path::Path;
use tabled::Tabled;

use crate::config::load_dataset;
use crate::output::{
    format_number, format_score, print_header, print_info, print_json, print_success, print_table,
    print_warning, OutputFormat,
};

#[derive(Tabled)]
struct ColumnRow {
    #[tabled(rename = "Column")]
    column: String,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Missing")]
    missing: usize,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Std")]
    std_dev: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "CV %")]
    cv_percent: String,
    #[tabled(rename = "r (target)")]
    correlation: String,
}

#[derive(Tabled)]
struct SelectionRow {
    #[tabled(rename = "Variable")]
    feature: String,
    #[tabled(rename = "Selection R²")]
    r_squared: String,
}

/// Show descriptive statistics of a dataset
pub fn describe(data: &Path, target: &str, format: OutputFormat) -> Result<()> {
    let dataset = load_dataset(data)?;
    let summary = describe_dataset(&dataset, target);

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            print_header("Dataset Summary");
            println!("Records:                {}", summary.records);
            println!("Target:                 {}", summary.target.cyan());
            println!();

            let rows: Vec<ColumnRow> = summary
                .columns
                .iter()
                .map(|c| ColumnRow {
                    column: c.column.clone(),
                    count: c.count,
                    missing: c.missing,
                    mean: format_number(c.mean),
                    std_dev: format_number(c.std_dev),
                    min: format_number(c.min),
                    max: format_number(c.max),
                    cv_percent: format_number(c.cv_percent),
                    correlation: format_score(c.correlation),
                })
                .collect();
            print_table(&rows);
        }
    }
    Ok(())
}

/// Run the training pipeline and optionally persist the model
pub fn train(
    data: &Path,
    params: TrainingParams,
    artifact_dir: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let dataset = load_dataset(data)?;
    let outcome = TrainingPipeline::new(params)
        .run(&dataset)
        .context("Training failed")?;

    StructuredLogger::default().log_model_trained(&outcome.model);
    EngineMetrics::new().inc_training_runs();

    if let Some(dir) = artifact_dir {
        ModelArtifact::new(dir)
            .save(&outcome.model)
            .with_context(|| format!("Failed to save model artifact to {}", dir.display()))?;
    }

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Table => {
            print!(
                "{}",
                ModelReport::new(&outcome.model).with_cross_validation(&outcome.cross_validation)
            );
            println!();

            let rows: Vec<SelectionRow> = outcome
                .feature_set
                .features
                .iter()
                .map(|f| SelectionRow {
                    feature: f.name.clone(),
                    r_squared: format_score(Some(f.r_squared)),
                })
                .collect();
            print_table(&rows);
            println!();

            match outcome.cross_validation.stability {
                Stability::Stable => print_success("Model is stable across folds"),
                Stability::Unstable => print_warning("Model is unstable across folds"),
            }

            let residuals = &outcome.residuals;
            println!(
                "Residuals: mean {} s, std {} s, range [{}, {}] s",
                format_number(residuals.mean),
                format_number(residuals.std_dev),
                format_number(residuals.min),
                format_number(residuals.max)
            );
            if let Some(worst) = residuals.worst() {
                println!(
                    "Largest residual: {} ({} s)",
                    worst.project.cyan(),
                    format_number(worst.residual)
                );
            }

            for pair in &outcome.collinear_pairs {
                print_warning(&format!(
                    "{} and {} are strongly correlated (r = {:.3})",
                    pair.first, pair.second, pair.correlation
                ));
            }

            println!();
            match artifact_dir {
                Some(dir) => print_success(&format!("Model saved to {}", dir.display())),
                None => print_info("Dry run, model not saved"),
            }
        }
    }
    Ok(())
}

/// Show the report of the persisted model
pub fn report(artifact_dir: &Path, format: OutputFormat) -> Result<()> {
    let model = ModelArtifact::new(artifact_dir)
        .load()
        .with_context(|| format!("Failed to load model from {}", artifact_dir.display()))?;

    let Some(model) = model else {
        match format {
            OutputFormat::Json => print_json(&serde_json::Value::Null)?,
            OutputFormat::Table => print_warning(&format!(
                "No model found in {}; predictions use the heuristic",
                artifact_dir.display()
            )),
        }
        return Ok(());
    };

    match format {
        OutputFormat::Json => print_json(&model)?,
        OutputFormat::Table => print!("{}", ModelReport::new(&model)),
    }
    Ok(())
}
