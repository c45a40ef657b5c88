use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::candidate::Candidate;
use super::category::Category;
use super::ids::{CandidateId, RosterDigest};

/// Current schema version for serialized roster results.
pub const SCHEMA_VERSION: u32 = 1;

/// A selected starter as reported in the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarterPick {
    pub id: CandidateId,
    pub category: Category,
    pub price: f64,
    pub final_score: f64,
}

impl From<&Candidate> for StarterPick {
    fn from(c: &Candidate) -> Self {
        Self {
            id: c.id,
            category: c.category,
            price: c.price,
            final_score: c.final_score,
        }
    }
}

/// Why a formation slot stayed empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnfillReason {
    /// Every remaining candidate of the category was already used.
    NoCandidates,
    /// Candidates exist but none fits the remaining budget.
    BudgetExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnfilledSlot {
    pub category: Category,
    pub missing: usize,
    pub reason: UnfillReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Completeness {
    Full,
    Partial { unfilled: Vec<UnfilledSlot> },
}

impl Completeness {
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }
}

/// Which allocation path produced the starters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverPath {
    Exact,
    Greedy,
}

/// Where candidates' base scores came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreSource {
    Oracle { name: String },
    /// Composite heuristic; `reason` is set when an oracle was configured but failed.
    Composite { reason: Option<String> },
}

/// Output of one allocation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterResult {
    pub schema_version: u32,
    pub formation: String,
    pub starters: Vec<StarterPick>,
    pub leader: Option<CandidateId>,
    pub regular_backups: BTreeMap<Category, CandidateId>,
    pub luxury_backup: Option<CandidateId>,
    pub total_cost: f64,
    pub expected_score: f64,
    pub budget: f64,
    pub completeness: Completeness,
    /// Set when even the cheapest completion over the full pool exceeds the budget.
    pub budget_infeasible: bool,
    pub solver: SolverPath,
    pub local_search_iterations: usize,
    pub score_source: ScoreSource,
}

impl RosterResult {
    pub fn is_full(&self) -> bool {
        self.completeness.is_full()
    }

    pub fn starter_ids(&self) -> Vec<CandidateId> {
        self.starters.iter().map(|s| s.id).collect()
    }

    /// Every id used by the roster: starters, luxury backup, regular backups.
    ///
    /// Returns `None` if any id appears twice.
    pub fn unique_ids(&self) -> Option<BTreeSet<CandidateId>> {
        let mut seen = BTreeSet::new();
        let all = self
            .starters
            .iter()
            .map(|s| s.id)
            .chain(self.luxury_backup)
            .chain(self.regular_backups.values().copied());
        for id in all {
            if !seen.insert(id) {
                return None;
            }
        }
        Some(seen)
    }

    pub fn starters_in(&self, category: Category) -> impl Iterator<Item = &StarterPick> {
        self.starters.iter().filter(move |s| s.category == category)
    }

    pub fn cheapest_starter_price(&self, category: Category) -> Option<f64> {
        self.starters_in(category).map(|s| s.price).min_by(f64::total_cmp)
    }

    /// BLAKE3 digest of the canonical JSON encoding.
    ///
    /// Every map in the result is a `BTreeMap`, so the encoding is canonical.
    pub fn digest(&self) -> Result<RosterDigest, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        Ok(RosterDigest::from_bytes(&json))
    }
}
