use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::category::Category;
use super::ids::CandidateId;
use crate::features::FeatureVector;

/// Pre-round availability reported by the market feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    #[default]
    #[serde(alias = "provavel")]
    Probable,
    #[serde(alias = "duvida")]
    Doubtful,
    #[serde(alias = "suspenso")]
    Suspended,
    #[serde(alias = "contundido")]
    Injured,
    #[serde(alias = "nulo")]
    Null,
}

impl AvailabilityStatus {
    pub fn is_selectable(self, include_doubtful: bool) -> bool {
        match self {
            Self::Probable => true,
            Self::Doubtful => include_doubtful,
            Self::Suspended | Self::Injured | Self::Null => false,
        }
    }
}

/// One row of the market snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: CandidateId,
    pub category: Category,
    pub price: f64,
    /// Pre-round average published by the feed.
    pub nominal_average: f64,
    #[serde(default)]
    pub price_variation: f64,
    #[serde(default)]
    pub participated: bool,
    #[serde(default)]
    pub status: AvailabilityStatus,
    #[serde(default)]
    pub club: String,
}

/// Sub-terms of the internal composite heuristic.
///
/// Kept on every candidate even when an oracle supplied the primary score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeBreakdown {
    pub regression_score: f64,
    pub recovery_score: f64,
    pub composite: f64,
}

/// A scored, selectable entity. Immutable once allocation starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub category: Category,
    pub price: f64,
    pub club: String,
    pub status: AvailabilityStatus,
    pub nominal_average: f64,
    pub features: FeatureVector,
    pub composite: CompositeBreakdown,
    /// Oracle output, or the composite when the oracle is unavailable.
    pub base_score: f64,
    /// Base score after category weight, premium bonus and adjustment hooks.
    pub final_score: f64,
}

impl Candidate {
    pub fn tie_break_key(&self) -> TieBreakKey {
        TieBreakKey {
            final_score: self.final_score,
            evolution: self.features.evolution,
            momentum_sign: sign(self.features.momentum),
            regression_opportunity: self.features.regression_opportunity,
            value_for_money: self.features.value_for_money,
            id: self.id,
        }
    }

    /// Compare by tie-break priority: `Less` means `self` ranks first.
    pub fn rank_cmp(&self, other: &Candidate) -> Ordering {
        self.tie_break_key().cmp(&other.tie_break_key())
    }
}

/// Deterministic ranking key.
///
/// Ascending `Ord` is ranking order: final score desc, evolution desc,
/// momentum sign desc, regression opportunity desc, value for money desc,
/// id asc.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TieBreakKey {
    pub final_score: f64,
    pub evolution: i8,
    pub momentum_sign: i8,
    pub regression_opportunity: bool,
    pub value_for_money: f64,
    pub id: CandidateId,
}

impl Ord for TieBreakKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .final_score
            .total_cmp(&self.final_score)
            .then_with(|| other.evolution.cmp(&self.evolution))
            .then_with(|| other.momentum_sign.cmp(&self.momentum_sign))
            .then_with(|| other.regression_opportunity.cmp(&self.regression_opportunity))
            .then_with(|| other.value_for_money.total_cmp(&self.value_for_money))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for TieBreakKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TieBreakKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TieBreakKey {}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(final_score: f64, evolution: i8, momentum_sign: i8, id: u32) -> TieBreakKey {
        TieBreakKey {
            final_score,
            evolution,
            momentum_sign,
            regression_opportunity: false,
            value_for_money: 0.0,
            id: CandidateId(id),
        }
    }

    #[test]
    fn higher_score_ranks_first() {
        assert!(key(5.0, 0, 0, 9) < key(4.0, 1, 1, 1));
    }

    #[test]
    fn evolution_then_momentum_break_score_ties() {
        assert!(key(5.0, 1, -1, 9) < key(5.0, 0, 1, 1));
        assert!(key(5.0, 0, 1, 9) < key(5.0, 0, 0, 1));
    }

    #[test]
    fn regression_then_value_break_remaining_ties() {
        let mut a = key(5.0, 0, 0, 9);
        let mut b = key(5.0, 0, 0, 1);
        a.regression_opportunity = true;
        assert!(a < b);
        a.regression_opportunity = false;
        a.value_for_money = 0.5;
        b.value_for_money = 0.4;
        assert!(a < b);
    }

    #[test]
    fn id_ascending_is_last_resort() {
        assert!(key(5.0, 0, 0, 1) < key(5.0, 0, 0, 2));
        assert_eq!(key(5.0, 0, 0, 3), key(5.0, 0, 0, 3));
    }

    #[test]
    fn doubtful_is_opt_in() {
        assert!(AvailabilityStatus::Probable.is_selectable(false));
        assert!(!AvailabilityStatus::Doubtful.is_selectable(false));
        assert!(AvailabilityStatus::Doubtful.is_selectable(true));
        assert!(!AvailabilityStatus::Injured.is_selectable(true));
    }
}
