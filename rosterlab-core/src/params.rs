//! Selection parameters and caller-error validation.
//!
//! Malformed parameters are the only hard failure of the pipeline; they are
//! rejected here before any computation starts.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Category, Formation};
use crate::features::DerivationMode;
use crate::trap::TrapDetector;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    #[error("budget must be positive and finite, got {0}")]
    InvalidBudget(f64),
    #[error("formation '{0}' requires no starters")]
    EmptyFormation(String),
    #[error("top_k must be at least 1")]
    ZeroTopK,
    #[error("{table} for {category} must be non-negative and finite, got {value}")]
    InvalidWeight {
        table: &'static str,
        category: Category,
        value: f64,
    },
    #[error("premium rule has a non-finite threshold or bonus")]
    InvalidPremium,
    #[error("trap thresholds must be finite and non-negative")]
    InvalidTrap,
}

/// Additive bonus for expensive, proven candidates in selected categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PremiumRule {
    pub price_threshold: f64,
    pub score_threshold: f64,
    pub bonus: f64,
    pub categories: BTreeSet<Category>,
}

impl Default for PremiumRule {
    fn default() -> Self {
        Self {
            price_threshold: 15.0,
            score_threshold: 5.0,
            bonus: 1.0,
            categories: BTreeSet::from([Category::Midfielder, Category::Attacker]),
        }
    }
}

impl PremiumRule {
    pub fn applies(&self, category: Category, price: f64, baseline: f64) -> bool {
        self.categories.contains(&category)
            && price > self.price_threshold
            && baseline > self.score_threshold
    }
}

/// How regular backups are chosen under the strict price ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupPolicy {
    /// Lowest price first, tie-break order second.
    #[default]
    Cheapest,
    /// Best tie-break rank among candidates under the ceiling.
    BestScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringParams {
    pub mode: DerivationMode,
    pub category_weight: BTreeMap<Category, f64>,
    pub premium: PremiumRule,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            mode: DerivationMode::Live,
            category_weight: default_category_weight(),
            premium: PremiumRule::default(),
        }
    }
}

impl ScoringParams {
    /// Missing categories weigh 1.0.
    pub fn weight(&self, category: Category) -> f64 {
        self.category_weight.get(&category).copied().unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationParams {
    pub budget: f64,
    pub formation: Formation,
    /// Candidates kept per category for the exact pass.
    pub top_k: usize,
    /// Upper bound on local-search swaps.
    pub local_search_cap: usize,
    /// Frontier states the exact pass may generate before giving up.
    pub exact_state_limit: u64,
}

impl AllocationParams {
    pub fn new(budget: f64, formation: Formation) -> Self {
        Self {
            budget,
            formation,
            top_k: 20,
            local_search_cap: 100,
            exact_state_limit: 20_000_000,
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.budget.is_finite() && self.budget > 0.0) {
            return Err(ParamsError::InvalidBudget(self.budget));
        }
        if self.formation.total() == 0 {
            return Err(ParamsError::EmptyFormation(self.formation.name.clone()));
        }
        if self.top_k == 0 {
            return Err(ParamsError::ZeroTopK);
        }
        Ok(())
    }

    /// Same limits for another formation.
    pub fn with_formation(&self, formation: Formation) -> Self {
        Self {
            formation,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeParams {
    pub leader_multiplier: BTreeMap<Category, f64>,
    pub backup_policy: BackupPolicy,
}

impl Default for FinalizeParams {
    fn default() -> Self {
        Self {
            leader_multiplier: default_leader_multiplier(),
            backup_policy: BackupPolicy::Cheapest,
        }
    }
}

impl FinalizeParams {
    /// Missing categories get multiplier 0 (never preferred as leader).
    pub fn multiplier(&self, category: Category) -> f64 {
        self.leader_multiplier.get(&category).copied().unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        check_table("leader_multiplier", &self.leader_multiplier)
    }
}

/// Everything one selection call needs besides the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionParams {
    pub allocation: AllocationParams,
    pub scoring: ScoringParams,
    pub finalize: FinalizeParams,
    pub trap: TrapDetector,
    pub include_doubtful: bool,
}

impl SelectionParams {
    pub fn new(budget: f64, formation: Formation) -> Self {
        Self {
            allocation: AllocationParams::new(budget, formation),
            scoring: ScoringParams::default(),
            finalize: FinalizeParams::default(),
            trap: TrapDetector::default(),
            include_doubtful: false,
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        self.allocation.validate()?;
        self.finalize.validate()?;
        check_table("category_weight", &self.scoring.category_weight)?;

        let p = &self.scoring.premium;
        if ![p.price_threshold, p.score_threshold, p.bonus]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ParamsError::InvalidPremium);
        }

        let t = &self.trap;
        if ![t.min_participation_rate, t.min_real_ratio]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
        {
            return Err(ParamsError::InvalidTrap);
        }
        Ok(())
    }
}

fn check_table(table: &'static str, values: &BTreeMap<Category, f64>) -> Result<(), ParamsError> {
    match values.iter().find(|(_, v)| !(v.is_finite() && **v >= 0.0)) {
        Some((category, value)) => Err(ParamsError::InvalidWeight {
            table,
            category: *category,
            value: *value,
        }),
        None => Ok(()),
    }
}

pub fn default_category_weight() -> BTreeMap<Category, f64> {
    BTreeMap::from([
        (Category::Goalkeeper, 1.0),
        (Category::Fullback, 1.0),
        (Category::Defender, 1.0),
        (Category::Midfielder, 1.05),
        (Category::Attacker, 1.10),
        (Category::Coach, 1.0),
    ])
}

pub fn default_leader_multiplier() -> BTreeMap<Category, f64> {
    BTreeMap::from([
        (Category::Goalkeeper, 0.8),
        (Category::Fullback, 1.0),
        (Category::Defender, 1.0),
        (Category::Midfielder, 1.2),
        (Category::Attacker, 1.5),
        (Category::Coach, 0.0),
    ])
}
