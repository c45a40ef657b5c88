//! RosterLab Runner: selection orchestration on top of `rosterlab-core`.
//!
//! This crate provides:
//! - TOML selection config with per-category overrides
//! - Snapshot and round-update loading from CSV or JSON
//! - Atomic persistence of the candidate history table
//! - Multi-formation runs, sequential or on the rayon pool
//! - JSON, CSV and text export of the resulting report

pub mod config;
pub mod export;
pub mod history_io;
pub mod runner;
pub mod snapshot;

pub use config::{AdjustmentKind, ConfigError, CustomFormation, SelectionConfig};
pub use export::{export_json, export_roster_csv, import_json, render_report, render_roster, ExportError};
pub use history_io::{load_history, save_history, HistoryBlob, HistoryIoError, HISTORY_SCHEMA_VERSION};
pub use runner::{
    best_roster, evaluate_formations, run_selection, FormationOutcome, RunError, RunOptions, SelectionReport,
    REPORT_SCHEMA_VERSION,
};
pub use snapshot::{load_round_updates, load_snapshot, parse_snapshot_csv, LoadError};
