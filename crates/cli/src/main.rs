//! Cycle Time Estimator CLI
//!
//! A command-line tool for training the cycle-time model on historical
//! projects, predicting new parts and planning line capacity.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{planning, prediction, training};
use estimator_lib::models::{ProcessInputs, PESO, TIEMPO_REAL_OFERTADO};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Cycle Time Estimator CLI
#[derive(Parser)]
#[command(name = "cte")]
#[command(author, version, about = "CLI for the Cycle Time Estimator", long_about = None)]
pub struct Cli {
    /// Engine configuration file, TOML or JSON (can also be set via CTE_CONFIG)
    #[arg(long, env = "CTE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Model artifact directory (can also be set via CTE_MODEL_DIR)
    #[arg(long, env = "CTE_MODEL_DIR", global = true)]
    pub model_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize a historical dataset
    Describe {
        /// Dataset file (JSON with `columns` and `records`)
        #[arg(long, short)]
        data: PathBuf,

        /// Target column
        #[arg(long, default_value = TIEMPO_REAL_OFERTADO)]
        target: String,
    },

    /// Train the regression model and save the artifact
    Train {
        /// Dataset file (JSON with `columns` and `records`)
        #[arg(long, short)]
        data: PathBuf,

        /// Minimum R² for a variable to be selected
        #[arg(long)]
        threshold: Option<f64>,

        /// Cross-validation folds
        #[arg(long)]
        folds: Option<usize>,

        /// Cross-validation shuffle seed
        #[arg(long)]
        seed: Option<u64>,

        /// Train and report without writing the artifact
        #[arg(long)]
        dry_run: bool,
    },

    /// Predict the cycle time of a part
    Predict {
        #[command(flatten)]
        inputs: InputArgs,
    },

    /// Plan lines and operators for a multi-year demand
    Plan {
        #[command(flatten)]
        inputs: InputArgs,

        /// Use this cycle time instead of predicting one
        #[arg(long)]
        cycle_time: Option<f64>,

        /// Annual volumes, comma separated (year 1 first)
        #[arg(long, value_delimiter = ',', required = true)]
        volumes: Vec<f64>,

        /// Working days per year
        #[arg(long, default_value_t = 230.0)]
        days: f64,

        /// Shifts per day
        #[arg(long, default_value_t = 2.0)]
        shifts: f64,

        /// Hours per shift
        #[arg(long, default_value_t = 8.0)]
        hours: f64,

        /// Parts per kit
        #[arg(long, default_value_t = 1.0)]
        units_per_kit: f64,

        /// Parts per rack
        #[arg(long, default_value_t = 1.0)]
        units_per_rack: f64,
    },

    /// Sweep one input by a percentage range and re-predict
    Sensitivity {
        #[command(flatten)]
        inputs: InputArgs,

        /// Input to sweep
        #[arg(long, default_value = "SPW")]
        variable: String,

        /// Lowest offset in percent
        #[arg(long, default_value_t = -20.0, allow_negative_numbers = true)]
        min: f64,

        /// Highest offset in percent
        #[arg(long, default_value_t = 20.0, allow_negative_numbers = true)]
        max: f64,

        /// Number of points
        #[arg(long, default_value_t = estimator_lib::planning::DEFAULT_SWEEP_STEPS)]
        steps: usize,
    },

    /// Show the loaded model report
    Report,

    /// Print engine metrics in Prometheus text format
    Metrics,
}

/// Process parameters of the part
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Weld points (SPW)
    #[arg(long, default_value_t = 0.0)]
    pub spw: f64,

    /// Adhesive bead length in mm
    #[arg(long, default_value_t = 0.0)]
    pub mastic_mm: f64,

    /// Clinch points
    #[arg(long, default_value_t = 0.0)]
    pub clinches: f64,

    /// Roller hemming length in mm
    #[arg(long, default_value_t = 0.0)]
    pub hem_mm: f64,

    /// Riveted nuts
    #[arg(long, default_value_t = 0.0)]
    pub nuts: f64,

    /// Clips (tuckers)
    #[arg(long, default_value_t = 0.0)]
    pub clips: f64,

    /// Part carries a marking operation
    #[arg(long)]
    pub marking: bool,

    /// Part mass in kg (model feature `Peso`); estimated from SPW when omitted
    #[arg(long)]
    pub mass: Option<f64>,

    /// Additional measured feature, e.g. `--measure ALTO_ASSY=450`
    #[arg(long = "measure", value_parser = parse_measure)]
    pub measured: Vec<(String, f64)>,
}

impl InputArgs {
    pub fn to_inputs(&self) -> ProcessInputs {
        let mut inputs = ProcessInputs {
            weld_points: self.spw,
            adhesive_mm: self.mastic_mm,
            clinch_count: self.clinches,
            hem_mm: self.hem_mm,
            fastener_count: self.nuts,
            clip_count: self.clips,
            marking: self.marking,
            ..ProcessInputs::default()
        };
        if let Some(mass) = self.mass {
            inputs.measured.insert(PESO.to_string(), mass);
        }
        for (name, value) in &self.measured {
            inputs.measured.insert(name.clone(), *value);
        }
        inputs
    }
}

fn parse_measure(s: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{}`", s))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid value for `{}`: {}", name, e))?;
    Ok((name.trim().to_string(), value))
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let engine_config = config::load_engine_config(cli.config.as_deref())?;
    let model_dir = config::model_dir(cli.model_dir.as_deref())?;

    match cli.command {
        Commands::Describe { data, target } => {
            training::describe(&data, &target, cli.format)?;
        }
        Commands::Train {
            data,
            threshold,
            folds,
            seed,
            dry_run,
        } => {
            let mut params = engine_config.training.clone();
            if let Some(threshold) = threshold {
                params.r2_threshold = threshold;
            }
            if let Some(folds) = folds {
                params.folds = folds;
            }
            if let Some(seed) = seed {
                params.seed = seed;
            }
            let target = if dry_run { None } else { Some(model_dir.as_path()) };
            training::train(&data, params, target, cli.format)?;
        }
        Commands::Predict { inputs } => {
            prediction::predict(engine_config, &model_dir, &inputs.to_inputs(), cli.format)?;
        }
        Commands::Plan {
            inputs,
            cycle_time,
            volumes,
            days,
            shifts,
            hours,
            units_per_kit,
            units_per_rack,
        } => {
            let request = planning::PlanRequest {
                inputs: inputs.to_inputs(),
                cycle_time,
                volumes,
                shift: estimator_lib::planning::ShiftConfig {
                    days_per_year: days,
                    shifts_per_day: shifts,
                    hours_per_shift: hours,
                },
                units_per_kit,
                units_per_rack,
            };
            planning::plan(engine_config, &model_dir, request, cli.format)?;
        }
        Commands::Sensitivity {
            inputs,
            variable,
            min,
            max,
            steps,
        } => {
            let range = estimator_lib::planning::SweepRange::new(min, max);
            prediction::sensitivity(
                engine_config,
                &model_dir,
                &inputs.to_inputs(),
                &variable,
                range,
                steps,
                cli.format,
            )?;
        }
        Commands::Report => {
            training::report(&model_dir, cli.format)?;
        }
        Commands::Metrics => {
            prediction::metrics(engine_config, &model_dir)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_measure() {
        assert_eq!(parse_measure("ALTO_ASSY=450").unwrap(), ("ALTO_ASSY".to_string(), 450.0));
        assert_eq!(parse_measure(" Peso = 12.5 ").unwrap(), ("Peso".to_string(), 12.5));
        assert!(parse_measure("ALTO_ASSY").is_err());
        assert!(parse_measure("ALTO_ASSY=tall").is_err());
    }

    #[test]
    fn test_input_args_map_to_process_inputs() {
        let cli = Cli::parse_from([
            "cte", "predict", "--spw", "100", "--mass", "20", "--marking", "--measure", "ALTO_ASSY=300",
        ]);
        let Commands::Predict { inputs } = cli.command else {
            panic!("expected predict");
        };
        let inputs = inputs.to_inputs();
        assert_eq!(inputs.weld_points, 100.0);
        assert!(inputs.marking);
        assert_eq!(inputs.get(PESO), Some(20.0));
        assert_eq!(inputs.get("ALTO_ASSY"), Some(300.0));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
