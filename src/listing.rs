//! Household listing: one row per household with its IPTU assessment

use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, Reader, Xlsx, XlsxError};
use tracing::info;

use crate::error::{EstimateError, Result};

pub const IPTU_COLUMN: &str = "IPTU";

#[derive(Debug, Clone)]
pub struct HouseholdListing {
    pub source: PathBuf,
    pub iptu: Vec<f64>,
}

impl HouseholdListing {
    pub fn household_count(&self) -> usize {
        self.iptu.len()
    }
}

/// Read a listing, as an `.xlsx` workbook or as CSV text by file extension
pub fn read_listing(path: &Path) -> Result<HouseholdListing> {
    let iptu = if is_workbook(path) {
        read_workbook(path)?
    } else {
        let contents = fs::read_to_string(path).map_err(|e| EstimateError::io(path, e))?;
        parse_listing(&contents)?
    };
    info!(path = %path.display(), households = iptu.len(), "household listing loaded");
    Ok(HouseholdListing {
        source: path.to_path_buf(),
        iptu,
    })
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"))
}

fn iptu_column<'a>(mut headers: impl Iterator<Item = &'a str>) -> Result<usize> {
    headers
        .position(|h| {
            h.trim()
                .trim_start_matches('\u{feff}')
                .eq_ignore_ascii_case(IPTU_COLUMN)
        })
        .ok_or_else(|| EstimateError::InvalidInput {
            column: IPTU_COLUMN.to_string(),
            detail: "required column not found".to_string(),
        })
}

/// `row` is numbered as a spreadsheet shows it, header being row 1
fn unreadable(row: usize, raw: &str) -> EstimateError {
    EstimateError::InvalidInput {
        column: IPTU_COLUMN.to_string(),
        detail: format!("row {row}: cannot read {raw:?} as a number"),
    }
}

/// Parse CSV text with a header row. Semicolon-separated files, common in
/// Brazilian spreadsheet exports, are detected from the header line.
pub fn parse_listing(contents: &str) -> Result<Vec<f64>> {
    let header_line = contents.lines().next().unwrap_or("");
    let delimiter = if header_line.contains(';') { b';' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    let column = iptu_column(reader.headers()?.iter())?;

    let mut values = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let raw = record.get(column).unwrap_or("");
        let value = parse_decimal(raw).ok_or_else(|| unreadable(i + 2, raw))?;
        values.push(value);
    }
    Ok(values)
}

/// Read the first worksheet of an `.xlsx` workbook, header in its first
/// used row. Numeric cells are taken as they are, text cells go through
/// [`parse_decimal`].
pub fn read_workbook(path: &Path) -> Result<Vec<f64>> {
    let mut workbook = open_workbook::<Xlsx<_>, _>(path).map_err(|e| match e {
        XlsxError::Io(source) => EstimateError::io(path, source),
        other => EstimateError::Spreadsheet(other),
    })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| EstimateError::InvalidInput {
            column: IPTU_COLUMN.to_string(),
            detail: "workbook has no worksheets".to_string(),
        })??;

    // 0-based index of the header row within the sheet
    let header_row = range.start().map_or(0, |(row, _)| row as usize);
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|cells| cells.iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();
    let column = iptu_column(headers.iter().map(String::as_str))?;

    let mut values = Vec::new();
    for (i, cells) in rows.enumerate() {
        let value = match cells.get(column) {
            Some(Data::Float(v)) if v.is_finite() => Some(*v),
            Some(Data::Int(v)) => Some(*v as f64),
            Some(Data::String(raw)) => parse_decimal(raw),
            _ => None,
        };
        let value = value.ok_or_else(|| {
            let raw = cells.get(column).map(|c| c.to_string()).unwrap_or_default();
            unreadable(header_row + i + 2, &raw)
        })?;
        values.push(value);
    }
    Ok(values)
}

/// Accepts `1234.56`, `1.234,56`, `1234,56` and an optional `R$` prefix
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_start_matches("R$").trim();
    if cleaned.is_empty() {
        return None;
    }
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned.to_string()
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}
