//! Pre-trained household classifiers
//!
//! A model file is JSON with a `kind` field. Only `classification` models
//! (one-feature Gaussian naive Bayes over the IPTU value) produce the class
//! labels the statistics catalog is keyed by; every other kind is reported
//! as not yet implemented.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{EstimateError, Result};
use crate::models::ClassLabel;

pub const CLASSIFICATION_KIND: &str = "classification";

/// A model that assigns a waste-generation class to each household
pub trait HouseholdClassifier {
    fn name(&self) -> &str;

    /// One label per IPTU value, in input order
    fn classify(&self, iptu: &[f64]) -> Vec<ClassLabel>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianClass {
    pub label: ClassLabel,
    pub prior: f64,
    pub mean: f64,
    pub variance: f64,
}

fn default_var_smoothing() -> f64 {
    1e-9
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    #[serde(skip)]
    name: String,
    pub classes: Vec<GaussianClass>,
    #[serde(default = "default_var_smoothing")]
    pub var_smoothing: f64,
}

impl GaussianNaiveBayes {
    /// Build a model from per-class parameters, rejecting an empty class list,
    /// priors outside (0, 1] and non-positive variances
    pub fn new(
        name: impl Into<String>,
        classes: Vec<GaussianClass>,
        var_smoothing: f64,
    ) -> Result<Self> {
        let model = GaussianNaiveBayes {
            name: name.into(),
            classes,
            var_smoothing,
        };
        model
            .validate()
            .map_err(|reason| EstimateError::invalid_parameter("classes", reason))?;
        Ok(model)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.classes.is_empty() {
            return Err("model defines no classes".to_string());
        }
        for class in &self.classes {
            if !(class.prior > 0.0 && class.prior <= 1.0) {
                return Err(format!("class {} has prior {}", class.label, class.prior));
            }
            if !(class.variance > 0.0 && class.mean.is_finite()) {
                return Err(format!("class {} has invalid mean or variance", class.label));
            }
        }
        Ok(())
    }

    fn epsilon(&self) -> f64 {
        let max_variance = self
            .classes
            .iter()
            .map(|c| c.variance)
            .fold(0.0, f64::max);
        self.var_smoothing * max_variance
    }

    fn joint_log_likelihood(class: &GaussianClass, x: f64, epsilon: f64) -> f64 {
        let variance = class.variance + epsilon;
        class.prior.ln() - 0.5 * (2.0 * PI * variance).ln() - (x - class.mean).powi(2) / (2.0 * variance)
    }
}

impl HouseholdClassifier for GaussianNaiveBayes {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, iptu: &[f64]) -> Vec<ClassLabel> {
        let epsilon = self.epsilon();
        iptu.iter()
            .map(|&x| {
                let mut best = &self.classes[0];
                let mut best_score = Self::joint_log_likelihood(best, x, epsilon);
                for class in &self.classes[1..] {
                    let score = Self::joint_log_likelihood(class, x, epsilon);
                    if score > best_score {
                        best = class;
                        best_score = score;
                    }
                }
                best.label
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct ModelHeader {
    kind: String,
}

/// Load a model file, rejecting kinds that cannot produce class labels
pub fn load_model(path: &Path) -> Result<Box<dyn HouseholdClassifier>> {
    let contents = fs::read_to_string(path).map_err(|e| EstimateError::io(path, e))?;
    let invalid = |reason: String| EstimateError::InvalidModel {
        path: path.to_path_buf(),
        reason,
    };

    let header: ModelHeader = serde_json::from_str(&contents).map_err(|e| invalid(e.to_string()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    match header.kind.as_str() {
        CLASSIFICATION_KIND => {
            let mut model: GaussianNaiveBayes =
                serde_json::from_str(&contents).map_err(|e| invalid(e.to_string()))?;
            model.validate().map_err(invalid)?;
            model.name = name;
            debug!(model = %model.name, classes = model.classes.len(), "classifier loaded");
            Ok(Box::new(model))
        }
        other => Err(EstimateError::UnsupportedModel(format!("{name} ({other})"))),
    }
}

/// Regular files directly inside `dir`, sorted by name
pub fn list_models(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(EstimateError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "models directory not found"),
        ));
    }

    let mut models: Vec<String> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    models.sort();
    Ok(models)
}

pub fn model_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, json: serde_json::Value) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, json.to_string()).unwrap();
        path
    }

    fn three_classes() -> serde_json::Value {
        serde_json::json!({
            "kind": "classification",
            "classes": [
                {"label": 1, "prior": 0.5, "mean": 350.0, "variance": 22500.0},
                {"label": 2, "prior": 0.35, "mean": 900.0, "variance": 62500.0},
                {"label": 3, "prior": 0.15, "mean": 2200.0, "variance": 490000.0}
            ]
        })
    }

    #[test]
    fn naive_bayes_assigns_nearest_class() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "Classificacao.json", three_classes());

        let model = load_model(&path).unwrap();
        assert_eq!(model.name(), "Classificacao.json");
        assert_eq!(model.classify(&[120.0, 380.0, 950.0, 4_000.0]), vec![1, 1, 2, 3]);
        assert!(model.classify(&[]).is_empty());
    }

    #[test]
    fn other_kinds_are_not_implemented() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "Regressao.json",
            serde_json::json!({"kind": "regression", "coefficients": [1.0, 2.0]}),
        );

        let err = load_model(&path).err().unwrap();
        assert!(matches!(err, EstimateError::UnsupportedModel(_)));
        assert!(err.to_string().contains("not yet implemented"));
    }

    #[test]
    fn malformed_models_are_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let no_classes = write(
            dir.path(),
            "empty.json",
            serde_json::json!({"kind": "classification", "classes": []}),
        );
        assert!(matches!(
            load_model(&no_classes).err().unwrap(),
            EstimateError::InvalidModel { .. }
        ));

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "not json").unwrap();
        assert!(matches!(
            load_model(&garbage).err().unwrap(),
            EstimateError::InvalidModel { .. }
        ));
    }

    #[test]
    fn constructor_rejects_models_without_classes() {
        let err = GaussianNaiveBayes::new("empty.json", Vec::new(), 1e-9).unwrap_err();
        assert!(matches!(err, EstimateError::InvalidParameter { name: "classes", .. }));

        let zero_variance = GaussianClass {
            label: 1,
            prior: 1.0,
            mean: 500.0,
            variance: 0.0,
        };
        assert!(GaussianNaiveBayes::new("flat.json", vec![zero_variance], 1e-9).is_err());

        let single = GaussianClass {
            label: 4,
            prior: 1.0,
            mean: 500.0,
            variance: 100.0,
        };
        let model = GaussianNaiveBayes::new("single.json", vec![single], 1e-9).unwrap();
        assert_eq!(model.classify(&[10.0, 5_000.0]), vec![4, 4]);
    }

    #[test]
    fn lists_model_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.json", three_classes());
        write(dir.path(), "a.json", three_classes());
        fs::create_dir(dir.path().join("archive")).unwrap();

        assert_eq!(list_models(dir.path()).unwrap(), vec!["a.json", "b.json"]);
        assert!(list_models(&dir.path().join("missing")).is_err());
    }
}
