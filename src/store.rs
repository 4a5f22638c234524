//! Persistent scratch file holding the latest prediction result

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{EstimateError, Result};
use crate::models::PredictionRecord;

/// Tag written into every result file; files with another tag are rejected
pub const SCHEMA: &str = "grs-estimator/prediction/v1";

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    schema: &'a str,
    checksum: String,
    result: &'a PredictionRecord,
}

#[derive(Deserialize)]
struct Envelope {
    schema: String,
    checksum: String,
    result: PredictionRecord,
}

/// Single-record JSON store written with write-then-rename
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ResultStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the stored record
    pub fn save(&self, record: &PredictionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| EstimateError::io(parent, e))?;
        }

        let envelope = EnvelopeRef {
            schema: SCHEMA,
            checksum: checksum(record)?,
            result: record,
        };
        let json = serde_json::to_string_pretty(&envelope)?;

        let staging = self.staging_path();
        write_synced(&staging, json.as_bytes()).map_err(|e| EstimateError::io(&staging, e))?;
        fs::rename(&staging, &self.path).map_err(|e| EstimateError::io(&self.path, e))?;

        info!(path = %self.path.display(), "prediction result saved");
        Ok(())
    }

    /// Load the stored record, verifying schema tag and checksum
    pub fn load(&self) -> Result<PredictionRecord> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(EstimateError::ResultNotFound(self.path.clone()));
            }
            Err(e) => return Err(EstimateError::io(&self.path, e)),
        };

        let envelope: Envelope =
            serde_json::from_str(&contents).map_err(|e| self.corrupt(e.to_string()))?;

        if envelope.schema != SCHEMA {
            return Err(self.corrupt(format!("unsupported schema '{}'", envelope.schema)));
        }
        if checksum(&envelope.result)? != envelope.checksum {
            return Err(self.corrupt("checksum mismatch".to_string()));
        }

        debug!(path = %self.path.display(), "prediction result loaded");
        Ok(envelope.result)
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn corrupt(&self, reason: String) -> EstimateError {
        EstimateError::CorruptResult {
            path: self.path.clone(),
            reason,
        }
    }
}

/// Write `data` and flush it to disk before the caller renames the file
fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn checksum(record: &PredictionRecord) -> Result<String> {
    let bytes = serde_json::to_vec(record)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
