//! Domain types for RosterLab

pub mod candidate;
pub mod category;
pub mod formation;
pub mod ids;
pub mod roster;

pub use candidate::{AvailabilityStatus, Candidate, CompositeBreakdown, SnapshotRecord, TieBreakKey};
pub use category::{Category, UnknownCategory, ALLOCATION_PRIORITY};
pub use formation::{Formation, PRESET_NAMES};
pub use ids::{CandidateId, RosterDigest};
pub use roster::{
    Completeness, RosterResult, ScoreSource, SolverPath, StarterPick, UnfillReason, UnfilledSlot,
    SCHEMA_VERSION,
};
