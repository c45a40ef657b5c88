//! Candidate preprocessing: base score, final score, adjustment hooks.
//!
//! Base score is the oracle output when an oracle is configured and honours
//! its contract; otherwise the internal composite. The final comparable
//! score applies the per-category weight and the premium bonus on top.

use tracing::warn;

use crate::domain::{Candidate, CompositeBreakdown, ScoreSource, SnapshotRecord};
use crate::features::FeatureVector;
use crate::oracle::{checked_scores, ScoringOracle};
use crate::params::ScoringParams;

const W_REGRESSION: f64 = 0.3;
const W_RECOVERY: f64 = 0.2;
const W_BASELINE: f64 = 0.2;
const W_STREAK: f64 = 0.1;
const W_PARTICIPATION: f64 = 0.1;
const W_VALUE: f64 = 0.1;
const PARTICIPATION_CLIP: f64 = 5.0;
const REGRESSION_MULTIPLIER: f64 = 1.2;

/// Internal composite heuristic and its sub-terms.
pub fn composite_breakdown(f: &FeatureVector) -> CompositeBreakdown {
    let regression_score = if f.regression_opportunity {
        f.baseline - f.avg_last_3
    } else {
        0.0
    };
    let recovery_score = if f.trend >= 0 { f.momentum.max(0.0) } else { 0.0 };

    let mut composite = W_REGRESSION * regression_score
        + W_RECOVERY * recovery_score
        + W_BASELINE * f.baseline
        + W_STREAK * f64::from(f.positive_delta_streak)
        + W_PARTICIPATION * f64::from(f.total_participations).clamp(0.0, PARTICIPATION_CLIP)
        + W_VALUE * f.value_for_money;
    if f.regression_opportunity {
        composite *= REGRESSION_MULTIPLIER;
    }

    CompositeBreakdown {
        regression_score,
        recovery_score,
        composite,
    }
}

/// Candidates with base and final scores, plus where the base came from.
#[derive(Debug, Clone)]
pub struct ScoredPool {
    pub candidates: Vec<Candidate>,
    pub source: ScoreSource,
}

/// Build scored candidates. `records` and `features` are index-aligned.
pub fn score_candidates(
    records: &[SnapshotRecord],
    features: &[FeatureVector],
    oracle: Option<&dyn ScoringOracle>,
    params: &ScoringParams,
) -> ScoredPool {
    debug_assert_eq!(records.len(), features.len());

    let (oracle_scores, source) = match oracle {
        None => (None, ScoreSource::Composite { reason: None }),
        Some(o) => match checked_scores(o, features) {
            Ok(scores) => (
                Some(scores),
                ScoreSource::Oracle {
                    name: o.name().to_string(),
                },
            ),
            Err(err) => {
                warn!(oracle = o.name(), error = %err, "oracle failed, scoring with composite fallback");
                (
                    None,
                    ScoreSource::Composite {
                        reason: Some(err.to_string()),
                    },
                )
            }
        },
    };

    let candidates = records
        .iter()
        .zip(features)
        .enumerate()
        .map(|(i, (record, f))| {
            let composite = composite_breakdown(f);
            let base_score = oracle_scores
                .as_ref()
                .map_or(composite.composite, |s| s[i]);
            let mut final_score = base_score * params.weight(record.category);
            if params.premium.applies(record.category, record.price, f.baseline) {
                final_score += params.premium.bonus;
            }
            Candidate {
                id: record.id,
                category: record.category,
                price: record.price,
                club: record.club.clone(),
                status: record.status,
                nominal_average: record.nominal_average,
                features: *f,
                composite,
                base_score,
                final_score,
            }
        })
        .collect();

    ScoredPool { candidates, source }
}

// ─── Adjustment hooks ────────────────────────────────────────────────

/// Context handed to adjustment hooks.
#[derive(Debug, Clone, Copy)]
pub struct AdjustmentContext<'a> {
    /// Rounds already recorded in history (0 before the first round).
    pub rounds_recorded: u32,
    pub scoring: &'a ScoringParams,
}

/// Pre-allocation score adjustment (early-round strategies and the like).
///
/// Runs after scoring and before trap filtering; only `final_score` should change.
pub trait ScoreAdjustment: Send + Sync {
    fn name(&self) -> &str;

    fn adjust(&self, candidates: &mut [Candidate], ctx: &AdjustmentContext<'_>);
}

/// No history yet: price is the market's own quality signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceProxy {
    pub weight: f64,
}

impl Default for PriceProxy {
    fn default() -> Self {
        Self { weight: 0.25 }
    }
}

impl ScoreAdjustment for PriceProxy {
    fn name(&self) -> &str {
        "price_proxy"
    }

    fn adjust(&self, candidates: &mut [Candidate], _ctx: &AdjustmentContext<'_>) {
        for c in candidates {
            c.final_score += self.weight * c.price;
        }
    }
}

/// One round of history: blend the last observed outcome into the score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastRoundBlend {
    pub weight: f64,
}

impl Default for LastRoundBlend {
    fn default() -> Self {
        Self { weight: 0.3 }
    }
}

impl ScoreAdjustment for LastRoundBlend {
    fn name(&self) -> &str {
        "last_round_blend"
    }

    fn adjust(&self, candidates: &mut [Candidate], ctx: &AdjustmentContext<'_>) {
        let w = self.weight.clamp(0.0, 1.0);
        for c in candidates {
            let last = c.features.last_outcome * ctx.scoring.weight(c.category);
            c.final_score = (1.0 - w) * c.final_score + w * last;
        }
    }
}

/// Picks the early-round strategy from the history round counter:
/// [`PriceProxy`] before any round, [`LastRoundBlend`] after exactly one,
/// nothing afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AutoRound {
    pub price_proxy: PriceProxy,
    pub blend: LastRoundBlend,
}

impl ScoreAdjustment for AutoRound {
    fn name(&self) -> &str {
        "auto_round"
    }

    fn adjust(&self, candidates: &mut [Candidate], ctx: &AdjustmentContext<'_>) {
        match ctx.rounds_recorded {
            0 => self.price_proxy.adjust(candidates, ctx),
            1 => self.blend.adjust(candidates, ctx),
            _ => {}
        }
    }
}
