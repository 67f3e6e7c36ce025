//! Plain-text model report

use super::cross_validation::{CrossValidationReport, Stability};
use super::regression::RegressionModel;
use std::fmt;

const RULE_WIDTH: usize = 72;

/// Metrics, intercept and ranked coefficients of a model, optionally with a
/// cross-validation summary
pub struct ModelReport<'a> {
    model: &'a RegressionModel,
    cv: Option<&'a CrossValidationReport>,
}

impl<'a> ModelReport<'a> {
    pub fn new(model: &'a RegressionModel) -> Self {
        Self { model, cv: None }
    }

    pub fn with_cross_validation(mut self, cv: &'a CrossValidationReport) -> Self {
        self.cv = Some(cv);
        self
    }
}

impl fmt::Display for ModelReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = self.model;
        let rule = "=".repeat(RULE_WIDTH);

        writeln!(f, "{}", rule)?;
        writeln!(f, "CYCLE TIME REGRESSION MODEL")?;
        writeln!(f, "{}", rule)?;
        writeln!(f)?;
        writeln!(f, "Target:        {}", model.target())?;
        writeln!(f, "Samples:       {}", model.n_samples)?;
        writeln!(f, "Trained at:    {}", model.trained_at.to_rfc3339())?;
        writeln!(f)?;
        writeln!(f, "QUALITY METRICS:")?;
        writeln!(f, "  R² score: {:.4}", model.metrics.r2)?;
        writeln!(f, "  RMSE:     {:.2} s", model.metrics.rmse)?;
        writeln!(f, "  MAE:      {:.2} s", model.metrics.mae)?;

        if let Some(cv) = self.cv {
            let verdict = match cv.stability {
                Stability::Stable => "stable",
                Stability::Unstable => "unstable",
            };
            writeln!(f)?;
            writeln!(f, "CROSS-VALIDATION ({} folds, seed {}):", cv.folds, cv.seed)?;
            for score in &cv.scores {
                writeln!(
                    f,
                    "  Fold {}: R² {:.4}  RMSE {:.2} s",
                    score.fold, score.r2, score.rmse
                )?;
            }
            writeln!(f, "  R² mean:   {:.4} ± {:.4} ({})", cv.r2_mean, cv.r2_std, verdict)?;
            writeln!(f, "  RMSE mean: {:.2} s ± {:.2} s", cv.rmse_mean, cv.rmse_std)?;
        }

        writeln!(f)?;
        writeln!(f, "COEFFICIENTS:")?;
        writeln!(f, "  Intercept (base time): {:.4}", model.intercept)?;
        for ranked in model.ranked_coefficients() {
            let filled = ((ranked.relative_importance / 5.0) as usize).min(20);
            let bar = format!("{}{}", "#".repeat(filled), ".".repeat(20 - filled));
            writeln!(
                f,
                "  {:<20} {:>12.4}  {} {:5.1}%",
                ranked.feature, ranked.coefficient, bar, ranked.relative_importance
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{}", rule)
    }
}
