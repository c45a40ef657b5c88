//! RosterLab Core: budget-constrained roster selection.
//!
//! This crate contains the selection engine:
//! - Domain types (candidates, categories, formations, roster results)
//! - Bounded per-candidate history with atomic round publication
//! - Leak-safe feature derivation and trap detection
//! - Scoring with an injectable oracle and a composite fallback
//! - Allocation: exact pass, feasibility-aware greedy, bounded local search
//! - Roster finalization (leader, luxury backup, regular backups)

pub mod allocation;
pub mod domain;
pub mod features;
pub mod finalize;
pub mod history;
pub mod oracle;
pub mod params;
pub mod pipeline;
pub mod scoring;
pub mod synthetic;
pub mod trap;

pub use domain::{Candidate, CandidateId, Category, Formation, RosterResult, SnapshotRecord};
pub use history::{HistoryStore, HistoryTable, RoundUpdate};
pub use params::SelectionParams;
pub use pipeline::{select_roster, PreparedPool, SelectionError};
