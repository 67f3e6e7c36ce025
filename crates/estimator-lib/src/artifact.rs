//! Persisted model artifact
//!
//! A trained model lives in one directory as two JSON files that are always
//! written and read together:
//! - `model_state.json`: ordered features, coefficient vector, intercept
//! - `model_config.json`: descriptive metadata plus the SHA-256 of the state
//!
//! Both files absent means "no model". Any other inconsistency is an
//! [`EstimatorError::ArtifactLoad`].

use crate::error::{EstimatorError, Result};
use crate::models::{FeatureScore, FeatureSet, TIEMPO_REAL_OFERTADO};
use crate::training::{FeatureRange, FitMetrics, RegressionModel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const STATE_FILE: &str = "model_state.json";
pub const CONFIG_FILE: &str = "model_config.json";

/// Relative tolerance when cross-checking the two files
const CONSISTENCY_TOLERANCE: f64 = 1e-9;

/// Estimator state, sufficient on its own to predict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorState {
    pub features: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

/// Descriptive metadata stored next to the state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(rename = "variables_entrada")]
    pub input_variables: Vec<String>,
    #[serde(rename = "variable_salida")]
    pub output_variable: String,
    #[serde(rename = "coeficientes")]
    pub coefficients: BTreeMap<String, f64>,
    pub r2_score: f64,
    pub rmse: f64,
    pub mae: f64,
    pub intercept: f64,
    #[serde(rename = "n_muestras")]
    pub n_samples: usize,
    #[serde(rename = "rangos_entrada", default)]
    pub input_ranges: BTreeMap<String, [f64; 2]>,
    /// Selection scores; only finite values are stored
    #[serde(rename = "r2_variables", default)]
    pub selection_scores: BTreeMap<String, f64>,
    #[serde(rename = "entrenado_en")]
    pub trained_at: DateTime<Utc>,
    #[serde(rename = "checksum_estado")]
    pub state_checksum: String,
}

/// Reads and writes the artifact files in one directory
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    dir: PathBuf,
}

impl ModelArtifact {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// Whether both files are present
    pub fn exists(&self) -> bool {
        self.state_path().is_file() && self.config_path().is_file()
    }

    /// Writes both files, each through a temporary sibling and a rename
    pub fn save(&self, model: &RegressionModel) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let state = EstimatorState {
            features: model.feature_names(),
            coefficients: model.coefficient_vector(),
            intercept: model.intercept,
        };
        let state_bytes = serde_json::to_vec_pretty(&state)?;

        let metadata = ModelMetadata {
            input_variables: state.features.clone(),
            output_variable: model.target().to_string(),
            coefficients: model.coefficients.clone(),
            r2_score: model.metrics.r2,
            rmse: model.metrics.rmse,
            mae: model.metrics.mae,
            intercept: model.intercept,
            n_samples: model.n_samples,
            input_ranges: model
                .feature_ranges
                .iter()
                .map(|(name, range)| (name.clone(), [range.min, range.max]))
                .collect(),
            selection_scores: model
                .feature_set
                .features
                .iter()
                .filter(|f| f.r_squared.is_finite())
                .map(|f| (f.name.clone(), f.r_squared))
                .collect(),
            trained_at: model.trained_at,
            state_checksum: compute_checksum(&state_bytes),
        };
        let config_bytes = serde_json::to_vec_pretty(&metadata)?;

        write_atomic(&self.state_path(), &state_bytes)?;
        write_atomic(&self.config_path(), &config_bytes)?;

        info!(
            dir = %self.dir.display(),
            features = ?metadata.input_variables,
            r2 = metadata.r2_score,
            "Model artifact saved"
        );
        Ok(())
    }

    /// Loads the model; `Ok(None)` when neither file exists
    pub fn load(&self) -> Result<Option<RegressionModel>> {
        let state_path = self.state_path();
        let config_path = self.config_path();

        match (state_path.is_file(), config_path.is_file()) {
            (false, false) => {
                debug!(dir = %self.dir.display(), "No model artifact present");
                return Ok(None);
            }
            (true, false) => {
                return Err(EstimatorError::artifact(&config_path, "metadata file missing"));
            }
            (false, true) => {
                return Err(EstimatorError::artifact(&state_path, "state file missing"));
            }
            (true, true) => {}
        }

        let state_bytes = fs::read(&state_path)
            .map_err(|e| EstimatorError::artifact(&state_path, e.to_string()))?;
        let config_bytes = fs::read(&config_path)
            .map_err(|e| EstimatorError::artifact(&config_path, e.to_string()))?;

        let state: EstimatorState = serde_json::from_slice(&state_bytes)
            .map_err(|e| EstimatorError::artifact(&state_path, format!("unparsable state: {}", e)))?;
        let metadata: ModelMetadata = serde_json::from_slice(&config_bytes).map_err(|e| {
            EstimatorError::artifact(&config_path, format!("unparsable metadata: {}", e))
        })?;

        let checksum = compute_checksum(&state_bytes);
        if checksum != metadata.state_checksum {
            return Err(EstimatorError::artifact(
                &state_path,
                format!(
                    "checksum mismatch: expected {}, got {}",
                    metadata.state_checksum, checksum
                ),
            ));
        }

        check_consistency(&state, &metadata).map_err(|reason| EstimatorError::artifact(&self.dir, reason))?;

        let model = build_model(state, metadata);
        debug!(dir = %self.dir.display(), features = ?model.feature_names(), "Model artifact loaded");
        Ok(Some(model))
    }
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= CONSISTENCY_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

fn check_consistency(
    state: &EstimatorState,
    metadata: &ModelMetadata,
) -> std::result::Result<(), String> {
    if state.features.len() != state.coefficients.len() {
        return Err(format!(
            "state lists {} features but {} coefficients",
            state.features.len(),
            state.coefficients.len()
        ));
    }
    if state.features != metadata.input_variables {
        return Err("feature list differs between state and metadata".to_string());
    }
    if metadata.coefficients.len() != state.features.len() {
        return Err("coefficient keys differ between state and metadata".to_string());
    }
    for (name, value) in state.features.iter().zip(&state.coefficients) {
        match metadata.coefficients.get(name) {
            Some(stored) if close(*stored, *value) => {}
            Some(stored) => {
                return Err(format!(
                    "coefficient `{}` differs: state {} vs metadata {}",
                    name, value, stored
                ))
            }
            None => return Err(format!("metadata has no coefficient for `{}`", name)),
        }
    }
    if !close(state.intercept, metadata.intercept) {
        return Err(format!(
            "intercept differs: state {} vs metadata {}",
            state.intercept, metadata.intercept
        ));
    }
    if metadata.output_variable != TIEMPO_REAL_OFERTADO {
        return Err(format!(
            "unexpected output variable `{}`",
            metadata.output_variable
        ));
    }
    Ok(())
}

fn build_model(state: EstimatorState, metadata: ModelMetadata) -> RegressionModel {
    let features = state
        .features
        .iter()
        .map(|name| FeatureScore {
            name: name.clone(),
            r_squared: metadata
                .selection_scores
                .get(name)
                .copied()
                .unwrap_or(f64::NAN),
        })
        .collect();

    RegressionModel {
        feature_set: FeatureSet {
            target: metadata.output_variable,
            features,
        },
        intercept: state.intercept,
        coefficients: state.features.into_iter().zip(state.coefficients).collect(),
        metrics: FitMetrics {
            r2: metadata.r2_score,
            rmse: metadata.rmse,
            mae: metadata.mae,
        },
        n_samples: metadata.n_samples,
        feature_ranges: metadata
            .input_ranges
            .into_iter()
            .map(|(name, [min, max])| (name, FeatureRange { min, max }))
            .collect(),
        trained_at: metadata.trained_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dataset, HistoricalRecord, PESO, SPW};
    use crate::training::fit;
    use tempfile::TempDir;

    fn model() -> RegressionModel {
        let records = [(60.0, 10.0), (80.0, 14.0), (100.0, 11.0), (120.0, 20.0)]
            .iter()
            .enumerate()
            .map(|(i, (spw, peso))| {
                HistoricalRecord::new(format!("P{}", i))
                    .with(SPW, *spw)
                    .with(PESO, *peso)
                    .with(TIEMPO_REAL_OFERTADO, 7.0 + 0.85 * spw + 3.2 * peso)
            })
            .collect();
        let dataset = Dataset::with_standard_columns(records);
        fit(&dataset, &FeatureSet::from_names(TIEMPO_REAL_OFERTADO, &[SPW, PESO])).unwrap()
    }

    #[test]
    fn test_compute_checksum() {
        let checksum = compute_checksum(b"model");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, compute_checksum(b"model"));
        assert_ne!(checksum, compute_checksum(b"model2"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let artifact = ModelArtifact::new(dir.path());
        let original = model();
        artifact.save(&original).unwrap();
        assert!(artifact.exists());
        assert!(!dir.path().join("model_state.tmp").exists());

        let loaded = artifact.load().unwrap().unwrap();
        assert_eq!(loaded.feature_names(), original.feature_names());
        assert_eq!(loaded.target(), TIEMPO_REAL_OFERTADO);
        assert_eq!(loaded.n_samples, 4);
        assert_eq!(loaded.trained_at, original.trained_at);
        assert_eq!(loaded.feature_ranges[SPW], FeatureRange { min: 60.0, max: 120.0 });
        for (a, b) in loaded.coefficient_vector().iter().zip(original.coefficient_vector()) {
            assert!((a - b).abs() < 1e-9);
        }
        assert!((loaded.intercept - original.intercept).abs() < 1e-9);
    }

    #[test]
    fn test_metadata_uses_documented_keys() {
        let dir = TempDir::new().unwrap();
        let artifact = ModelArtifact::new(dir.path());
        artifact.save(&model()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(artifact.config_path()).unwrap()).unwrap();
        for key in [
            "variables_entrada",
            "variable_salida",
            "coeficientes",
            "r2_score",
            "rmse",
            "mae",
            "intercept",
            "n_muestras",
            "rangos_entrada",
            "entrenado_en",
            "checksum_estado",
        ] {
            assert!(raw.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(raw["variable_salida"], TIEMPO_REAL_OFERTADO);
    }

    #[test]
    fn test_absent_artifact_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(ModelArtifact::new(dir.path()).load().unwrap().is_none());
        assert!(ModelArtifact::new(dir.path().join("never-created"))
            .load()
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_partial_artifact_rejected() {
        let dir = TempDir::new().unwrap();
        let artifact = ModelArtifact::new(dir.path());
        artifact.save(&model()).unwrap();
        fs::remove_file(artifact.config_path()).unwrap();
        assert!(matches!(
            artifact.load(),
            Err(EstimatorError::ArtifactLoad { .. })
        ));
    }

    #[test]
    fn test_tampered_state_rejected() {
        let dir = TempDir::new().unwrap();
        let artifact = ModelArtifact::new(dir.path());
        artifact.save(&model()).unwrap();

        let mut state: EstimatorState =
            serde_json::from_slice(&fs::read(artifact.state_path()).unwrap()).unwrap();
        state.intercept += 1.0;
        fs::write(artifact.state_path(), serde_json::to_vec_pretty(&state).unwrap()).unwrap();

        let err = artifact.load().unwrap_err();
        assert!(err.to_string().contains("checksum"), "{}", err);
    }

    #[test]
    fn test_inconsistent_metadata_rejected() {
        let dir = TempDir::new().unwrap();
        let artifact = ModelArtifact::new(dir.path());
        artifact.save(&model()).unwrap();

        let mut metadata: ModelMetadata =
            serde_json::from_slice(&fs::read(artifact.config_path()).unwrap()).unwrap();
        metadata.coefficients.insert(SPW.to_string(), 99.0);
        fs::write(artifact.config_path(), serde_json::to_vec(&metadata).unwrap()).unwrap();

        let err = artifact.load().unwrap_err();
        assert!(matches!(err, EstimatorError::ArtifactLoad { .. }));
        assert!(err.to_string().contains(SPW), "{}", err);
    }

    #[test]
    fn test_corrupt_file_rejected() {
        let dir = TempDir::new().unwrap();
        let artifact = ModelArtifact::new(dir.path());
        artifact.save(&model()).unwrap();
        fs::write(artifact.config_path(), b"{ not json").unwrap();
        assert!(matches!(
            artifact.load(),
            Err(EstimatorError::ArtifactLoad { .. })
        ));
    }
}
