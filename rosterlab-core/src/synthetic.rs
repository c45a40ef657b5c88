//! Seeded synthetic markets for tests, benchmarks and the CLI demo.
//!
//! A master seed is expanded into per-stream sub-seeds with BLAKE3, so the
//! quality of candidate 7 or the outcomes of round 3 do not depend on how
//! many other candidates or rounds were generated.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{AvailabilityStatus, CandidateId, Category, SnapshotRecord};
use crate::history::{HistoryTable, RoundUpdate, DEFAULT_WINDOW};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticMarket {
    pub seed: u64,
    pub per_category: usize,
    /// Rounds of history played before the snapshot.
    pub rounds: u32,
    pub window: usize,
}

/// A snapshot and the history that led to it.
#[derive(Debug, Clone)]
pub struct SyntheticRound {
    pub records: Vec<SnapshotRecord>,
    pub history: HistoryTable,
}

impl SyntheticMarket {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            per_category: 30,
            rounds: 8,
            window: DEFAULT_WINDOW,
        }
    }

    pub fn with_size(mut self, per_category: usize) -> Self {
        self.per_category = per_category;
        self
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    /// Order-independent sub-seed for one `(stream, index)` pair.
    pub fn sub_seed(&self, stream: &str, index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(stream.as_bytes());
        hasher.update(&index.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, stream: &str, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(stream, index))
    }

    pub fn generate(&self) -> SyntheticRound {
        let ids: Vec<(CandidateId, Category)> = Category::ALL
            .iter()
            .enumerate()
            .flat_map(|(ci, category)| {
                (0..self.per_category).map(move |i| (CandidateId((ci * self.per_category + i + 1) as u32), *category))
            })
            .collect();

        let quality: Vec<f64> = ids
            .iter()
            .map(|(id, _)| self.rng_for("quality", u64::from(id.0)).gen_range(1.0..10.0))
            .collect();

        let mut history = HistoryTable::new(self.window);
        for round in 0..self.rounds {
            let mut rng = self.rng_for("round", u64::from(round));
            let updates: Vec<RoundUpdate> = ids
                .iter()
                .zip(&quality)
                .map(|((id, _), q)| {
                    let participated = rng.gen_bool(0.8);
                    let outcome = if participated { q + rng.gen_range(-3.0..3.0) } else { 0.0 };
                    RoundUpdate {
                        id: *id,
                        outcome: round2(outcome),
                        participated,
                        price_delta: round2(rng.gen_range(-1.0..1.0)),
                    }
                })
                .collect();
            history.apply_round(&updates);
        }

        let mut rng = self.rng_for("snapshot", 0);
        let records = ids
            .iter()
            .zip(&quality)
            .map(|((id, category), q)| {
                let status = match rng.gen_range(0..100) {
                    0..=79 => AvailabilityStatus::Probable,
                    80..=89 => AvailabilityStatus::Doubtful,
                    90..=94 => AvailabilityStatus::Injured,
                    _ => AvailabilityStatus::Suspended,
                };
                SnapshotRecord {
                    id: *id,
                    category: *category,
                    price: round2((2.0 + q * 1.6 + rng.gen_range(-1.5..1.5)).max(0.5)),
                    nominal_average: round2(q + rng.gen_range(-1.0..1.0)),
                    price_variation: round2(rng.gen_range(-1.0..1.0)),
                    participated: rng.gen_bool(0.8),
                    status,
                    club: format!("club-{:02}", rng.gen_range(1..=20)),
                }
            })
            .collect();

        SyntheticRound { records, history }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
