//! Configuration management for the CLI

use anyhow::{Context, Result};
use estimator_lib::config::EngineConfig;
use estimator_lib::models::Dataset;
use std::path::{Path, PathBuf};

/// Load the engine configuration from an explicit file, else the user
/// config file when present, else defaults; `CTE_*` variables apply on top
pub fn load_engine_config(explicit: Option<&Path>) -> Result<EngineConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => user_config_path().filter(|p| p.is_file()),
    };

    EngineConfig::load(path.as_deref()).with_context(|| match &path {
        Some(p) => format!("Failed to load configuration from {}", p.display()),
        None => "Failed to load configuration from environment".to_string(),
    })
}

/// Model artifact directory: explicit flag, else the user data directory
pub fn model_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let data = dirs_next::data_dir().context("Could not determine data directory")?;
    Ok(data.join("cte").join("model"))
}

/// Read a JSON dataset (`columns` plus `records`)
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse dataset {}", path.display()))
}

fn user_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".config").join("cte").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_model_dir_wins() {
        let dir = model_dir(Some(Path::new("/tmp/models"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/models"));
    }

    #[test]
    fn test_load_dataset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"columns": ["SPW", "Tiempo_Real_Ofertado"],
                "records": [{{"project": "P1", "values": {{"SPW": 60, "Tiempo_Real_Ofertado": 120}}}}]}}"#
        )
        .unwrap();
        let dataset = load_dataset(file.path()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records[0].get("SPW"), Some(60.0));
    }

    #[test]
    fn test_load_dataset_reports_path() {
        let err = load_dataset(Path::new("/nonexistent/data.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/data.json"));
    }
}
