//! Runtime settings: file locations and aggregation options

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aggregator::MeanOfMeans;
use crate::error::{EstimateError, Result};

/// Settings read from an optional JSON file. Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Statistics catalog
    pub database: PathBuf,
    /// Directory listed for model files
    pub models_dir: PathBuf,
    /// Model used when `predict` is given none
    pub default_model: String,
    /// Scratch file shared by `predict` and `visualize`
    pub result_file: PathBuf,
    pub cities_file: PathBuf,
    /// Listing used with `--default-listing`
    pub default_listing: PathBuf,
    pub mean_of_means: MeanOfMeans,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database: PathBuf::from("data/grs.db"),
            models_dir: PathBuf::from("models"),
            default_model: "Classificacao.json".to_string(),
            result_file: PathBuf::from("data/result.json"),
            cities_file: PathBuf::from("data/cidades_ms.json"),
            default_listing: PathBuf::from("data/IPTU_MEDIO_RESIDENCIAL_CG.xlsx"),
            mean_of_means: MeanOfMeans::default(),
        }
    }
}

impl Settings {
    pub fn from_json(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| EstimateError::io(path, e))?;
        let settings: Settings = serde_json::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let paths = [
            ("database", &self.database),
            ("models_dir", &self.models_dir),
            ("result_file", &self.result_file),
            ("cities_file", &self.cities_file),
            ("default_listing", &self.default_listing),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(EstimateError::invalid_parameter(name, "path must not be empty"));
            }
        }
        if self.default_model.trim().is_empty() {
            return Err(EstimateError::invalid_parameter(
                "default_model",
                "model name must not be empty",
            ));
        }
        Ok(())
    }
}
