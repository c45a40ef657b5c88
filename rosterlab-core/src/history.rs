//! Candidate history: bounded per-candidate outcome series.
//!
//! `HistoryTable` is the plain data structure: one FIFO window per candidate.
//! `HistoryStore` wraps it for the single-writer / many-reader round cycle:
//! readers take an immutable `Arc` snapshot, and the writer publishes a whole
//! round's batch with one pointer swap, so no reader ever sees half a round.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::domain::CandidateId;

/// Default number of rounds kept per candidate.
pub const DEFAULT_WINDOW: usize = 15;

/// One round of recorded outcome for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub outcome: f64,
    pub participated: bool,
    pub price_delta: f64,
}

/// End-of-round update for a single candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundUpdate {
    pub id: CandidateId,
    pub outcome: f64,
    #[serde(default)]
    pub participated: bool,
    #[serde(default)]
    pub price_delta: f64,
}

/// Per-candidate bounded history (oldest entry first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTable {
    window: usize,
    round: u32,
    series: BTreeMap<CandidateId, Vec<HistoryEntry>>,
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl HistoryTable {
    /// A zero window is clamped to 1.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            round: 0,
            series: BTreeMap::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of rounds applied through [`HistoryStore::apply_round`] or
    /// [`HistoryTable::apply_round`].
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Append one entry, evicting the oldest entries beyond the window.
    pub fn update(&mut self, id: CandidateId, outcome: f64, participated: bool, price_delta: f64) {
        let series = self.series.entry(id).or_default();
        series.push(HistoryEntry {
            outcome,
            participated,
            price_delta,
        });
        if series.len() > self.window {
            let excess = series.len() - self.window;
            series.drain(..excess);
        }
    }

    /// Oldest-first view of a candidate's series; empty for unknown ids.
    pub fn series(&self, id: CandidateId) -> &[HistoryEntry] {
        self.series.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Apply a whole round in place and advance the round counter.
    pub fn apply_round(&mut self, updates: &[RoundUpdate]) {
        for u in updates {
            self.update(u.id, u.outcome, u.participated, u.price_delta);
        }
        self.round += 1;
    }

    /// Re-bound every series to a new window (used after loading a blob
    /// persisted with a different window).
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        for series in self.series.values_mut() {
            if series.len() > self.window {
                let excess = series.len() - self.window;
                series.drain(..excess);
            }
        }
        self
    }

    pub fn ids(&self) -> impl Iterator<Item = CandidateId> + '_ {
        self.series.keys().copied()
    }
}

/// Shared history with atomic per-round publication.
#[derive(Debug, Default)]
pub struct HistoryStore {
    current: RwLock<Arc<HistoryTable>>,
    writer: Mutex<()>,
}

impl HistoryStore {
    pub fn new(table: HistoryTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
            writer: Mutex::new(()),
        }
    }

    /// Immutable view of the latest fully-applied round.
    pub fn snapshot(&self) -> Arc<HistoryTable> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Apply a round's batch and publish it. Returns the new round number.
    ///
    /// The batch is applied to a private copy; the shared pointer is swapped
    /// only once the whole batch is in.
    pub fn apply_round(&self, updates: &[RoundUpdate]) -> u32 {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = HistoryTable::clone(&self.snapshot());
        next.apply_round(updates);
        let round = next.round();
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(next);
        round
    }

    /// Replace the whole table (load-at-init).
    pub fn replace(&self, table: HistoryTable) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(table);
    }
}
