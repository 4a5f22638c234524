//! Error types for the estimation pipeline

use std::path::PathBuf;

use thiserror::Error;

use crate::models::ClassLabel;

#[derive(Debug, Error)]
pub enum EstimateError {
    /// The household listing is missing a column or holds an unreadable value
    #[error("invalid input in column '{column}': {detail}")]
    InvalidInput { column: String, detail: String },

    #[error("model '{0}' is not yet implemented; only classification models are supported")]
    UnsupportedModel(String),

    #[error("invalid model file {path}: {reason}")]
    InvalidModel { path: PathBuf, reason: String },

    #[error("no statistics available for household class {0}")]
    MissingClassStatistics(ClassLabel),

    #[error("no households were classified")]
    EmptyClassification,

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("no prediction result found at {0}")]
    ResultNotFound(PathBuf),

    #[error("result file {path} is unusable: {reason}")]
    CorruptResult { path: PathBuf, reason: String },

    #[error("unknown city '{0}'")]
    UnknownCity(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("cannot read workbook: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),
}

impl EstimateError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EstimateError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        EstimateError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EstimateError>;
