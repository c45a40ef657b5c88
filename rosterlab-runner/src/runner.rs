//! Selection runner: wires config, candidate preparation and allocation.
//!
//! Two entry points:
//! - `run_selection()`: prepares the pool once and evaluates every configured
//!   formation. Used by the CLI.
//! - `evaluate_formations()`: takes a prepared pool and explicit parameters.
//!   Used by benchmarks and tests.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use rosterlab_core::domain::{Formation, RosterResult, ScoreSource, SnapshotRecord};
use rosterlab_core::history::HistoryTable;
use rosterlab_core::oracle::ScoringOracle;
use rosterlab_core::params::SelectionParams;
use rosterlab_core::pipeline::{PreparedPool, SelectionError};

use crate::config::{ConfigError, SelectionConfig};
use crate::history_io::HistoryIoError;
use crate::snapshot::LoadError;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("selection error: {0}")]
    Selection(#[from] SelectionError),
    #[error("input error: {0}")]
    Load(#[from] LoadError),
    #[error("history error: {0}")]
    History(#[from] HistoryIoError),
}

/// Current schema version for persisted reports.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Evaluate formations on the rayon pool.
    pub parallel: bool,
    /// Formations not started before this much time has passed are skipped.
    pub deadline: Option<Duration>,
}

/// Result for one formation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FormationOutcome {
    Completed { roster: RosterResult },
    Skipped { formation: String },
}

impl FormationOutcome {
    pub fn roster(&self) -> Option<&RosterResult> {
        match self {
            Self::Completed { roster } => Some(roster),
            Self::Skipped { .. } => None,
        }
    }
}

/// Everything one selection run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub history_round: u32,
    pub candidates: usize,
    pub eligible: usize,
    pub traps: usize,
    pub score_source: ScoreSource,
    /// In configured formation order.
    pub outcomes: Vec<FormationOutcome>,
    /// Formation name of the best completed roster.
    pub best: Option<String>,
}

fn default_schema_version() -> u32 {
    REPORT_SCHEMA_VERSION
}

impl SelectionReport {
    pub fn best_roster(&self) -> Option<&RosterResult> {
        let name = self.best.as_deref()?;
        self.outcomes
            .iter()
            .filter_map(FormationOutcome::roster)
            .find(|r| r.formation == name)
    }
}

/// Allocate one roster per formation from a shared prepared pool.
///
/// Output order follows `formations` in both modes.
pub fn evaluate_formations(
    prepared: &PreparedPool,
    base: &SelectionParams,
    formations: &[Formation],
    opts: &RunOptions,
) -> Result<Vec<FormationOutcome>, RunError> {
    let started = Instant::now();
    let run_one = |formation: &Formation| -> Result<FormationOutcome, RunError> {
        if opts.deadline.is_some_and(|limit| started.elapsed() >= limit) {
            warn!(formation = %formation.name, "deadline passed; formation skipped");
            return Ok(FormationOutcome::Skipped {
                formation: formation.name.clone(),
            });
        }
        let allocation = base.allocation.with_formation(formation.clone());
        let roster = prepared.roster_for(&allocation, &base.finalize)?;
        info!(
            formation = %roster.formation,
            cost = roster.total_cost,
            score = roster.expected_score,
            full = roster.is_full(),
            solver = ?roster.solver,
            "formation evaluated"
        );
        Ok(FormationOutcome::Completed { roster })
    };

    if opts.parallel {
        formations.par_iter().map(run_one).collect()
    } else {
        formations.iter().map(run_one).collect()
    }
}

/// Best completed roster: full rosters before partial ones, then highest
/// expected score, then earliest in formation order.
pub fn best_roster(outcomes: &[FormationOutcome]) -> Option<&RosterResult> {
    let mut best: Option<&RosterResult> = None;
    for roster in outcomes.iter().filter_map(FormationOutcome::roster) {
        let better = match best {
            None => true,
            Some(b) => (roster.is_full(), roster.expected_score) > (b.is_full(), b.expected_score),
        };
        if better {
            best = Some(roster);
        }
    }
    best
}

/// Prepare the pool once and evaluate every configured formation.
pub fn run_selection(
    config: &SelectionConfig,
    records: &[SnapshotRecord],
    history: &HistoryTable,
    oracle: Option<&dyn ScoringOracle>,
    parallel: bool,
) -> Result<SelectionReport, RunError> {
    let formations = config.formations()?;
    let first = formations.first().cloned().ok_or(ConfigError::NoFormations)?;
    let base = config.params_for(first);
    let hook = config.adjustment.hook();
    let prepared = PreparedPool::prepare(records, history, &base, oracle, hook.as_deref())?;

    let opts = RunOptions {
        parallel,
        deadline: config.deadline(),
    };
    let outcomes = evaluate_formations(&prepared, &base, &formations, &opts)?;
    let best = best_roster(&outcomes).map(|r| r.formation.clone());
    if best.is_none() {
        warn!("no formation completed");
    }

    Ok(SelectionReport {
        schema_version: REPORT_SCHEMA_VERSION,
        history_round: history.round(),
        candidates: prepared.candidates().len(),
        eligible: prepared.eligible().count(),
        traps: prepared.traps().len(),
        score_source: prepared.score_source().clone(),
        outcomes,
        best,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosterlab_core::synthetic::SyntheticMarket;

    fn market() -> (Vec<SnapshotRecord>, HistoryTable) {
        let round = SyntheticMarket::new(5).with_size(15).generate();
        (round.records, round.history)
    }

    fn config() -> SelectionConfig {
        let mut config = SelectionConfig::with_budget(110.0);
        config.formations = vec!["4-3-3".into(), "3-5-2".into(), "5-4-1".into()];
        config
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let (records, history) = market();
        let seq = run_selection(&config(), &records, &history, None, false).unwrap();
        let par = run_selection(&config(), &records, &history, None, true).unwrap();
        assert_eq!(seq, par);
        assert_eq!(seq.outcomes.len(), 3);
        let names: Vec<_> = seq.outcomes.iter().filter_map(|o| o.roster()).map(|r| r.formation.as_str()).collect();
        assert_eq!(names, vec!["4-3-3", "3-5-2", "5-4-1"]);
    }

    #[test]
    fn best_prefers_full_then_score() {
        let (records, history) = market();
        let report = run_selection(&config(), &records, &history, None, false).unwrap();
        let best = report.best_roster().unwrap();
        for roster in report.outcomes.iter().filter_map(FormationOutcome::roster) {
            if roster.is_full() == best.is_full() {
                assert!(roster.expected_score <= best.expected_score);
            } else {
                assert!(best.is_full());
            }
        }
    }

    #[test]
    fn elapsed_deadline_skips_formations() {
        let (records, history) = market();
        let base = config().params_for(Formation::preset("4-3-3").unwrap());
        let prepared = PreparedPool::prepare(&records, &history, &base, None, None).unwrap();
        let opts = RunOptions {
            parallel: false,
            deadline: Some(Duration::ZERO),
        };
        let outcomes = evaluate_formations(&prepared, &base, &[base.allocation.formation.clone()], &opts).unwrap();
        assert_eq!(
            outcomes,
            vec![FormationOutcome::Skipped {
                formation: "4-3-3".into()
            }]
        );
        assert!(best_roster(&outcomes).is_none());
    }

    #[test]
    fn selection_errors_propagate() {
        let (mut records, history) = market();
        records.push(records[0].clone());
        let err = run_selection(&config(), &records, &history, None, false).unwrap_err();
        assert!(matches!(err, RunError::Selection(SelectionError::DuplicateCandidate(_))));
    }
}
