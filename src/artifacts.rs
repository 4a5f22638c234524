//! Import of pre-trained class statistics artifacts
//!
//! Scans a directory for the per-class files written when the model was
//! trained and loads them into the statistics catalog:
//!
//! - `media_classe_<k>.json`: per-household mean by material
//! - `margem_classe_<k>.json`: per-household error margin by material
//! - `media_emb_<k>.json`: packaging (`P_Emb`) and non-packaging (`P_N_Emb`) fractions

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use rusqlite::Connection;
use serde_json::Value;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::db::{self, VectorTable};
use crate::models::{ClassLabel, Material, MaterialVector, PackagingRatio};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Mean,
    Margin,
    Packaging,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub class_id: ClassLabel,
    pub path: PathBuf,
}

/// Find all statistics artifacts below `dir`
pub fn find_artifacts(dir: &Path) -> Result<Vec<Artifact>> {
    let name_re = Regex::new(r"^(media_classe|margem_classe|media_emb)_(\d+)\.json$")?;
    let mut artifacts = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let filename = entry.file_name().to_str().unwrap_or("");
        let Some(cap) = name_re.captures(filename) else {
            continue;
        };
        let kind = match &cap[1] {
            "media_classe" => ArtifactKind::Mean,
            "margem_classe" => ArtifactKind::Margin,
            _ => ArtifactKind::Packaging,
        };
        let class_id = cap[2]
            .parse::<ClassLabel>()
            .with_context(|| format!("class label in {}", filename))?;
        artifacts.push(Artifact {
            kind,
            class_id,
            path: entry.path().to_path_buf(),
        });
    }

    artifacts.sort_by(|a, b| (a.class_id, &a.path).cmp(&(b.class_id, &b.path)));
    Ok(artifacts)
}

/// Reduce a pandas-style export to a single number: plain numbers, one-element
/// arrays and one-entry objects are accepted
fn scalar(value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| anyhow!("number out of range")),
        Value::Null => Ok(f64::NAN),
        Value::Array(items) if items.len() == 1 => scalar(&items[0]),
        Value::Object(map) if map.len() == 1 => map.values().next().map_or(Ok(f64::NAN), scalar),
        other => Err(anyhow!("expected a single number, found {}", other)),
    }
}

fn parse_material_vector(contents: &str) -> Result<MaterialVector> {
    let value: Value = serde_json::from_str(contents)?;
    let object = value
        .as_object()
        .ok_or_else(|| anyhow!("expected an object keyed by material"))?;

    let mut vector = MaterialVector::zeros();
    let mut seen = [false; 8];
    for (key, value) in object {
        let material =
            Material::from_label(key).ok_or_else(|| anyhow!("unknown material column '{}'", key))?;
        vector.set(material, scalar(value).with_context(|| format!("column '{}'", key))?);
        seen[material.index()] = true;
    }

    let missing: Vec<&str> = Material::ALL
        .into_iter()
        .filter(|m| !seen[m.index()])
        .map(|m| m.label())
        .collect();
    if !missing.is_empty() {
        return Err(anyhow!("missing material columns: {}", missing.join(", ")));
    }
    Ok(vector)
}

fn parse_packaging(contents: &str) -> Result<PackagingRatio> {
    let value: Value = serde_json::from_str(contents)?;
    let field = |name: &str| -> Result<f64> {
        let v = value
            .get(name)
            .ok_or_else(|| anyhow!("missing column '{}'", name))?;
        scalar(v).with_context(|| format!("column '{}'", name))
    };
    Ok(PackagingRatio {
        packaging: field("P_Emb")?,
        non_packaging: field("P_N_Emb")?,
    })
}

fn import_artifact(conn: &Connection, artifact: &Artifact) -> Result<()> {
    let contents = fs::read_to_string(&artifact.path)
        .with_context(|| format!("Failed to read {}", artifact.path.display()))?;

    match artifact.kind {
        ArtifactKind::Mean => {
            let vector = parse_material_vector(&contents)?;
            db::upsert_class_vector(conn, VectorTable::Means, artifact.class_id, &vector)
        }
        ArtifactKind::Margin => {
            let vector = parse_material_vector(&contents)?;
            db::upsert_class_vector(conn, VectorTable::Margins, artifact.class_id, &vector)
        }
        ArtifactKind::Packaging => {
            let ratio = parse_packaging(&contents)?;
            db::upsert_packaging(conn, artifact.class_id, &ratio)
        }
    }
}

/// Import every artifact below `dir` into the catalog
pub fn import_to_catalog(conn: &Connection, dir: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    info!(dir = %dir.display(), "scanning for class statistics artifacts");
    let artifacts = find_artifacts(dir)?;
    info!(count = artifacts.len(), "artifacts found");

    for artifact in &artifacts {
        match import_artifact(conn, artifact) {
            Ok(()) => {
                match artifact.kind {
                    ArtifactKind::Mean => stats.means += 1,
                    ArtifactKind::Margin => stats.margins += 1,
                    ArtifactKind::Packaging => stats.packaging += 1,
                }
                if !stats.classes.contains(&artifact.class_id) {
                    stats.classes.push(artifact.class_id);
                }
                info!(class = artifact.class_id, path = %artifact.path.display(), "imported");
            }
            Err(e) => {
                warn!(path = %artifact.path.display(), "skipping artifact: {:#}", e);
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}

#[derive(Debug, Default)]
pub struct ImportStats {
    pub classes: Vec<ClassLabel>,
    pub means: usize,
    pub margins: usize,
    pub packaging: usize,
    pub errors: usize,
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Imported statistics for {} classes ({} means, {} margins, {} packaging ratios). Errors: {}",
            self.classes.len(),
            self.means,
            self.margins,
            self.packaging,
            self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material_json(base: f64) -> String {
        let map: serde_json::Map<String, Value> = Material::ALL
            .into_iter()
            .enumerate()
            .map(|(i, m)| (m.label().to_string(), serde_json::json!({"0": base + i as f64})))
            .collect();
        Value::Object(map).to_string()
    }

    #[test]
    fn finds_artifacts_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("media_classe_2.json"), "{}").unwrap();
        fs::write(dir.path().join("nested").join("margem_classe_1.json"), "{}").unwrap();
        fs::write(dir.path().join("media_emb_1.json"), "{}").unwrap();
        fs::write(dir.path().join("result.json"), "{}").unwrap();
        fs::write(dir.path().join("media_classe_x.json"), "{}").unwrap();

        let found = find_artifacts(dir.path()).unwrap();
        let summary: Vec<_> = found.iter().map(|a| (a.kind, a.class_id)).collect();
        assert_eq!(summary.len(), 3);
        assert!(summary.contains(&(ArtifactKind::Mean, 2)));
        assert!(summary.contains(&(ArtifactKind::Margin, 1)));
        assert!(summary.contains(&(ArtifactKind::Packaging, 1)));
        assert_eq!(found[2].class_id, 2);
    }

    #[test]
    fn parses_pandas_style_exports() {
        let vector = parse_material_vector(&material_json(100.0)).unwrap();
        assert_eq!(vector.get(Material::Plastic), 100.0);
        assert_eq!(vector.get(Material::Rejects), 107.0);

        let ratio = parse_packaging(r#"{"P_Emb": [0.42], "P_N_Emb": 0.58}"#).unwrap();
        assert_eq!(ratio.packaging, 0.42);
        assert_eq!(ratio.non_packaging, 0.58);

        let err = parse_material_vector(r#"{"Plástico": 1.0}"#).unwrap_err();
        assert!(err.to_string().contains("missing material columns"));
    }

    #[test]
    fn imports_into_catalog_and_counts_errors() {
        let dir = tempfile::tempdir().unwrap();
        for class_id in 1..=2 {
            fs::write(
                dir.path().join(format!("media_classe_{class_id}.json")),
                material_json(100.0 * class_id as f64),
            )
            .unwrap();
            fs::write(
                dir.path().join(format!("margem_classe_{class_id}.json")),
                material_json(10.0 * class_id as f64),
            )
            .unwrap();
            fs::write(
                dir.path().join(format!("media_emb_{class_id}.json")),
                r#"{"P_Emb": 0.4, "P_N_Emb": 0.6}"#,
            )
            .unwrap();
        }
        fs::write(dir.path().join("media_emb_3.json"), "not json").unwrap();

        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let stats = import_to_catalog(&conn, dir.path()).unwrap();

        assert_eq!(stats.classes, vec![1, 2]);
        assert_eq!((stats.means, stats.margins, stats.packaging), (2, 2, 2));
        assert_eq!(stats.errors, 1);

        let catalog = db::load_class_statistics(&conn).unwrap();
        assert_eq!(catalog.get(2).unwrap().mean.get(Material::Glass), 202.0);
    }
}
