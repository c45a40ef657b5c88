//! Market snapshot and end-of-round update loading (CSV or JSON).
//!
//! The format is picked from the file extension. CSV categories accept the
//! English names and short codes in any case; an empty status column means
//! `probable`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use rosterlab_core::domain::{AvailabilityStatus, CandidateId, Category, SnapshotRecord};
use rosterlab_core::history::RoundUpdate;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: unsupported extension (expected .csv or .json)")]
    UnsupportedFormat { path: PathBuf },
    #[error("{path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} row {row}: {message}")]
    Row { path: PathBuf, row: usize, message: String },
}

enum Format {
    Csv,
    Json,
}

fn format_of(path: &Path) -> Result<Format, LoadError> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("csv") => Ok(Format::Csv),
        Some("json") => Ok(Format::Json),
        _ => Err(LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// CSV row before category parsing.
#[derive(Debug, Deserialize)]
struct SnapshotRow {
    id: u32,
    category: String,
    price: f64,
    nominal_average: f64,
    #[serde(default)]
    price_variation: Option<f64>,
    #[serde(default)]
    participated: Option<bool>,
    #[serde(default)]
    status: Option<AvailabilityStatus>,
    #[serde(default)]
    club: Option<String>,
}

pub fn load_snapshot(path: &Path) -> Result<Vec<SnapshotRecord>, LoadError> {
    let records = match format_of(path)? {
        Format::Json => serde_json::from_str(&read(path)?).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        Format::Csv => parse_snapshot_csv(path, read(path)?.as_bytes())?,
    };
    debug!(path = %path.display(), records = records.len(), "snapshot loaded");
    Ok(records)
}

pub fn parse_snapshot_csv(path: &Path, data: &[u8]) -> Result<Vec<SnapshotRecord>, LoadError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(data);
    let mut out = Vec::new();
    for (i, row) in reader.deserialize::<SnapshotRow>().enumerate() {
        let row = row.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let category: Category = row.category.parse().map_err(|e| LoadError::Row {
            path: path.to_path_buf(),
            row: i + 1,
            message: format!("{e}"),
        })?;
        out.push(SnapshotRecord {
            id: CandidateId(row.id),
            category,
            price: row.price,
            nominal_average: row.nominal_average,
            price_variation: row.price_variation.unwrap_or(0.0),
            participated: row.participated.unwrap_or(false),
            status: row.status.unwrap_or_default(),
            club: row.club.unwrap_or_default(),
        });
    }
    Ok(out)
}

pub fn load_round_updates(path: &Path) -> Result<Vec<RoundUpdate>, LoadError> {
    let updates: Vec<RoundUpdate> = match format_of(path)? {
        Format::Json => serde_json::from_str(&read(path)?).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        Format::Csv => {
            let data = read(path)?;
            let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(data.as_bytes());
            reader
                .deserialize::<RoundUpdate>()
                .collect::<Result<_, _>>()
                .map_err(|source| LoadError::Csv {
                    path: path.to_path_buf(),
                    source,
                })?
        }
    };
    debug!(path = %path.display(), updates = updates.len(), "round updates loaded");
    Ok(updates)
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}
