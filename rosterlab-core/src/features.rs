//! Feature derivation: snapshot + history series → fixed feature vector.
//!
//! In `Retrospective` mode the baseline comes from history alone, so a
//! backtest never sees the round it is predicting. `Live` mode may also use
//! the snapshot's pre-round nominal average, which is published before the
//! round and cannot leak its outcome.
//!
//! Every history-derived value is zero when the series is empty.

use serde::{Deserialize, Serialize};

use crate::domain::SnapshotRecord;
use crate::history::HistoryEntry;

/// How the baseline average is formed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationMode {
    /// History only.
    Retrospective,
    /// History mixed with the snapshot's nominal average.
    #[default]
    Live,
}

/// Relative band around the first-half mean inside which evolution is flat.
const EVOLUTION_BAND: f64 = 0.10;

/// Distance below baseline (as a ratio) that counts as "below baseline".
const BELOW_BASELINE_RATIO: f64 = -0.10;

/// Number of recent price deltas summed into `recent_price_delta`.
const PRICE_DELTA_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub baseline: f64,
    pub avg_last_3: f64,
    pub avg_last_5: f64,
    pub avg_last_10: f64,
    pub std_last_5: f64,
    pub max_last_5: f64,
    pub last_outcome: f64,
    pub lifetime_avg: f64,
    pub total_participations: u32,
    pub trend: i8,
    pub momentum: f64,
    pub recent_price_delta: f64,
    pub positive_delta_streak: u32,
    pub evolution: i8,
    pub baseline_distance: f64,
    pub below_baseline: bool,
    pub regression_opportunity: bool,
    pub value_for_money: f64,
    pub price: f64,
    pub nominal_average: f64,
    pub price_variation: f64,
    pub participated: bool,
}

impl FeatureVector {
    /// Column names in the order produced by [`FeatureVector::to_array`].
    pub const NAMES: [&'static str; 22] = [
        "baseline",
        "avg_last_3",
        "avg_last_5",
        "avg_last_10",
        "std_last_5",
        "max_last_5",
        "last_outcome",
        "lifetime_avg",
        "total_participations",
        "trend",
        "momentum",
        "recent_price_delta",
        "positive_delta_streak",
        "evolution",
        "baseline_distance",
        "below_baseline",
        "regression_opportunity",
        "value_for_money",
        "price",
        "nominal_average",
        "price_variation",
        "participated",
    ];

    /// Numeric encoding for oracles (booleans as 0/1).
    pub fn to_array(&self) -> [f64; 22] {
        [
            self.baseline,
            self.avg_last_3,
            self.avg_last_5,
            self.avg_last_10,
            self.std_last_5,
            self.max_last_5,
            self.last_outcome,
            self.lifetime_avg,
            f64::from(self.total_participations),
            f64::from(self.trend),
            self.momentum,
            self.recent_price_delta,
            f64::from(self.positive_delta_streak),
            f64::from(self.evolution),
            self.baseline_distance,
            flag(self.below_baseline),
            flag(self.regression_opportunity),
            self.value_for_money,
            self.price,
            self.nominal_average,
            self.price_variation,
            flag(self.participated),
        ]
    }

    pub fn index_of(name: &str) -> Option<usize> {
        Self::NAMES.iter().position(|n| *n == name)
    }
}

/// Derive the feature vector for one candidate.
pub fn derive_features(
    record: &SnapshotRecord,
    series: &[HistoryEntry],
    mode: DerivationMode,
) -> FeatureVector {
    let outcomes: Vec<f64> = series.iter().map(|e| e.outcome).collect();

    let played: Vec<f64> = series
        .iter()
        .filter(|e| e.participated)
        .map(|e| e.outcome)
        .collect();
    let history_baseline = mean(&played);
    let baseline = match mode {
        DerivationMode::Retrospective => history_baseline,
        DerivationMode::Live if series.is_empty() => record.nominal_average,
        DerivationMode::Live => (history_baseline + record.nominal_average) / 2.0,
    };

    let value_for_money = if record.price > 0.0 {
        baseline / record.price
    } else {
        0.0
    };

    let passthrough = FeatureVector {
        baseline,
        value_for_money,
        price: record.price,
        nominal_average: record.nominal_average,
        price_variation: record.price_variation,
        participated: record.participated,
        ..FeatureVector::default()
    };
    if series.is_empty() {
        return passthrough;
    }

    let avg_last_3 = window_mean(&outcomes, 3, baseline);
    let avg_last_5 = window_mean(&outcomes, 5, baseline);
    let avg_last_10 = window_mean(&outcomes, 10, baseline);
    let last5 = tail(&outcomes, 5);
    let last_outcome = outcomes[outcomes.len() - 1];

    let trend = if outcomes.len() >= 3 {
        sign(last_outcome - outcomes[outcomes.len() - 3])
    } else {
        0
    };

    let positive_delta_streak = series
        .iter()
        .rev()
        .take_while(|e| e.price_delta > 0.0)
        .count() as u32;

    let recent_price_delta = series
        .iter()
        .rev()
        .take(PRICE_DELTA_WINDOW)
        .map(|e| e.price_delta)
        .sum();

    let evolution = evolution_pattern(&outcomes);
    let baseline_distance = if baseline > 0.0 {
        (avg_last_3 - baseline) / baseline
    } else {
        0.0
    };
    let below_baseline = baseline_distance < BELOW_BASELINE_RATIO;

    FeatureVector {
        avg_last_3,
        avg_last_5,
        avg_last_10,
        std_last_5: population_std(last5),
        max_last_5: last5.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        last_outcome,
        lifetime_avg: mean(&outcomes),
        total_participations: played.len() as u32,
        trend,
        momentum: last_outcome - avg_last_5,
        recent_price_delta,
        positive_delta_streak,
        evolution,
        baseline_distance,
        below_baseline,
        regression_opportunity: below_baseline && evolution >= 0,
        ..passthrough
    }
}

/// First-half vs second-half comparison with a hysteresis band.
fn evolution_pattern(outcomes: &[f64]) -> i8 {
    if outcomes.len() < 2 {
        return 0;
    }
    let mid = outcomes.len() / 2;
    let first = mean(&outcomes[..mid]);
    let second = mean(&outcomes[mid..]);
    let band = EVOLUTION_BAND * first.abs();
    if second > first + band {
        1
    } else if second < first - band {
        -1
    } else {
        0
    }
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

fn window_mean(values: &[f64], n: usize, fallback: f64) -> f64 {
    if values.len() < n {
        fallback
    } else {
        mean(tail(values, n))
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}
