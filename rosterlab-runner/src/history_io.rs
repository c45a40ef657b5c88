//! Persisted history blob.
//!
//! One JSON document `{schema_version, saved_at, table}` per file, written
//! to a sibling temp file and renamed into place so readers never see a
//! partial write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use rosterlab_core::history::HistoryTable;

pub const HISTORY_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum HistoryIoError {
    #[error("history I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("history blob {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("history blob {path} has schema version {found} (max supported: {supported})")]
    UnsupportedVersion { path: PathBuf, found: u32, supported: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryBlob {
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
    pub table: HistoryTable,
}

/// Load a blob and re-bound it to `window`. A missing file is an empty table.
pub fn load_history(path: &Path, window: usize) -> Result<HistoryTable, HistoryIoError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "no history file; starting empty");
            return Ok(HistoryTable::new(window));
        }
        Err(source) => {
            return Err(HistoryIoError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let blob: HistoryBlob = serde_json::from_str(&content).map_err(|source| HistoryIoError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    if blob.schema_version > HISTORY_SCHEMA_VERSION {
        return Err(HistoryIoError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: blob.schema_version,
            supported: HISTORY_SCHEMA_VERSION,
        });
    }
    info!(
        path = %path.display(),
        round = blob.table.round(),
        candidates = blob.table.len(),
        saved_at = %blob.saved_at,
        "history loaded"
    );
    Ok(blob.table.with_window(window))
}

/// Write atomically: temp file in the same directory, fsync, rename.
pub fn save_history(path: &Path, table: &HistoryTable) -> Result<(), HistoryIoError> {
    let io_err = |source: std::io::Error| HistoryIoError::Io {
        path: path.to_path_buf(),
        source,
    };
    let blob = HistoryBlob {
        schema_version: HISTORY_SCHEMA_VERSION,
        saved_at: Utc::now(),
        table: table.clone(),
    };
    let json = serde_json::to_vec_pretty(&blob).map_err(|source| HistoryIoError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err)?;
    }
    let tmp = temp_path(path);
    let written = fs::File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(&json)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));
    if let Err(source) = written {
        // Best effort.
        let _ = fs::remove_file(&tmp);
        return Err(io_err(source));
    }
    info!(path = %path.display(), round = table.round(), "history saved");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
