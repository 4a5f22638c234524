//! Statistics catalog schema and operations

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use rusqlite::Connection;

use crate::models::{ClassLabel, ClassProfile, ClassStatistics, Material, MaterialVector, PackagingRatio};

/// Per-material tables of the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorTable {
    Means,
    Margins,
}

impl VectorTable {
    fn name(self) -> &'static str {
        match self {
            VectorTable::Means => "class_means",
            VectorTable::Margins => "class_margins",
        }
    }
}

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Per-household mean generation by class, grams per day
        CREATE TABLE IF NOT EXISTS class_means (
            class_id INTEGER NOT NULL,
            material TEXT NOT NULL,
            grams REAL,
            PRIMARY KEY (class_id, material)
        );

        -- Per-household error margin by class, grams per day
        CREATE TABLE IF NOT EXISTS class_margins (
            class_id INTEGER NOT NULL,
            material TEXT NOT NULL,
            grams REAL,
            PRIMARY KEY (class_id, material)
        );

        -- Packaging / non-packaging fractions by class
        CREATE TABLE IF NOT EXISTS class_packaging (
            class_id INTEGER PRIMARY KEY,
            packaging REAL NOT NULL,
            non_packaging REAL NOT NULL
        );
        "#,
    )?;
    Ok(())
}

/// Insert or replace all materials of one class vector
pub fn upsert_class_vector(
    conn: &Connection,
    table: VectorTable,
    class_id: ClassLabel,
    vector: &MaterialVector,
) -> Result<()> {
    let sql = format!(
        "INSERT OR REPLACE INTO {} (class_id, material, grams) VALUES (?1, ?2, ?3)",
        table.name()
    );
    let mut stmt = conn.prepare(&sql)?;
    for (material, grams) in vector.iter() {
        // SQLite has no NaN; undefined values are stored as NULL
        let grams = if grams.is_nan() { None } else { Some(grams) };
        stmt.execute((class_id, material.key(), grams))?;
    }
    Ok(())
}

/// Insert or replace the packaging ratio of a class
pub fn upsert_packaging(conn: &Connection, class_id: ClassLabel, ratio: &PackagingRatio) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO class_packaging (class_id, packaging, non_packaging)
         VALUES (?1, ?2, ?3)",
        (class_id, ratio.packaging, ratio.non_packaging),
    )?;
    Ok(())
}

/// Clear all imported statistics (for re-import)
pub fn clear_statistics(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM class_packaging;
        DELETE FROM class_margins;
        DELETE FROM class_means;
        "#,
    )?;
    Ok(())
}

fn load_vectors(conn: &Connection, table: VectorTable) -> Result<BTreeMap<ClassLabel, MaterialVector>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT class_id, material, grams FROM {} ORDER BY class_id",
        table.name()
    ))?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, ClassLabel>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<f64>>(2)?,
        ))
    })?;

    let mut vectors: BTreeMap<ClassLabel, (MaterialVector, usize)> = BTreeMap::new();
    for row in rows {
        let (class_id, key, grams) = row?;
        let material = Material::from_label(&key)
            .ok_or_else(|| anyhow!("unknown material '{}' in {}", key, table.name()))?;
        let entry = vectors.entry(class_id).or_default();
        entry.0.set(material, grams.unwrap_or(f64::NAN));
        entry.1 += 1;
    }

    let mut results = BTreeMap::new();
    for (class_id, (vector, count)) in vectors {
        if count != Material::ALL.len() {
            return Err(anyhow!(
                "class {} has {} of {} materials in {}",
                class_id,
                count,
                Material::ALL.len(),
                table.name()
            ));
        }
        results.insert(class_id, vector);
    }
    Ok(results)
}

fn load_packaging(conn: &Connection) -> Result<BTreeMap<ClassLabel, PackagingRatio>> {
    let mut stmt = conn.prepare("SELECT class_id, packaging, non_packaging FROM class_packaging")?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, ClassLabel>(0)?,
            PackagingRatio {
                packaging: row.get(1)?,
                non_packaging: row.get(2)?,
            },
        ))
    })?;

    let mut results = BTreeMap::new();
    for row in rows {
        let (class_id, ratio) = row?;
        results.insert(class_id, ratio);
    }
    Ok(results)
}

/// Assemble the class statistics held in the catalog
pub fn load_class_statistics(conn: &Connection) -> Result<ClassStatistics> {
    let means = load_vectors(conn, VectorTable::Means)?;
    let mut margins = load_vectors(conn, VectorTable::Margins)?;
    let mut packaging = load_packaging(conn)?;

    let mut stats = ClassStatistics::new();
    for (class_id, mean) in means {
        let margin = margins
            .remove(&class_id)
            .ok_or_else(|| anyhow!("class {} has means but no margins", class_id))?;
        let packaging = packaging
            .remove(&class_id)
            .ok_or_else(|| anyhow!("class {} has means but no packaging ratio", class_id))?;
        stats.insert(
            class_id,
            ClassProfile {
                mean,
                margin,
                packaging,
            },
        );
    }

    if stats.is_empty() {
        return Err(anyhow!(
            "No class statistics in catalog. Run 'import-stats' or 'load-sample' first."
        ));
    }
    Ok(stats)
}
