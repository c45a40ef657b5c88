//! Trap detection: candidates whose published average is not backed by
//! recent real participation or output.

use serde::{Deserialize, Serialize};

use crate::history::HistoryEntry;

/// Thresholds for the trap rule.
///
/// Trap iff `len(series) >= min_entries` AND
/// (`participation_rate < min_participation_rate` OR
/// `real_avg / nominal_average < min_real_ratio`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapDetector {
    pub min_entries: usize,
    pub min_participation_rate: f64,
    pub min_real_ratio: f64,
}

impl Default for TrapDetector {
    fn default() -> Self {
        Self {
            min_entries: 5,
            min_participation_rate: 0.30,
            min_real_ratio: 0.20,
        }
    }
}

/// Why a candidate was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapReason {
    LowParticipation,
    LowRealOutput,
}

impl TrapDetector {
    /// `nominal_average` is the snapshot's pre-round average, not the
    /// leak-safe derived baseline.
    pub fn check(&self, series: &[HistoryEntry], nominal_average: f64) -> Option<TrapReason> {
        if series.len() < self.min_entries || series.is_empty() {
            return None;
        }
        let n = series.len() as f64;
        let participation_rate = series.iter().filter(|e| e.participated).count() as f64 / n;
        if participation_rate < self.min_participation_rate {
            return Some(TrapReason::LowParticipation);
        }
        if nominal_average > 0.0 {
            let real_avg = series.iter().map(|e| e.outcome).sum::<f64>() / n;
            if real_avg / nominal_average < self.min_real_ratio {
                return Some(TrapReason::LowRealOutput);
            }
        }
        None
    }

    pub fn is_trap(&self, series: &[HistoryEntry], nominal_average: f64) -> bool {
        self.check(series, nominal_average).is_some()
    }
}
