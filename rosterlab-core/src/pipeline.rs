//! One selection pipeline: derive → score → adjust → filter → allocate → finalize.
//!
//! Preparation does not depend on the formation or budget, so a
//! [`PreparedPool`] can serve any number of allocations.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::allocation::{AllocationEngine, CandidatePool, MAX_PRICE};
use crate::domain::{
    Candidate, CandidateId, Completeness, RosterResult, ScoreSource, SnapshotRecord, StarterPick, SCHEMA_VERSION,
};
use crate::features::{derive_features, FeatureVector};
use crate::finalize::RosterFinalizer;
use crate::history::HistoryTable;
use crate::oracle::ScoringOracle;
use crate::params::{AllocationParams, FinalizeParams, ParamsError, SelectionParams};
use crate::scoring::{score_candidates, AdjustmentContext, ScoreAdjustment};
use crate::trap::TrapReason;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error("candidate {0} appears more than once in the snapshot")]
    DuplicateCandidate(CandidateId),
    #[error("candidate {id} has invalid price {price}")]
    InvalidPrice { id: CandidateId, price: f64 },
}

/// Scored candidates plus eligibility, ready for allocation.
#[derive(Debug, Clone)]
pub struct PreparedPool {
    /// Sorted by id.
    candidates: Vec<Candidate>,
    eligible: Vec<bool>,
    traps: BTreeMap<CandidateId, TrapReason>,
    source: ScoreSource,
}

impl PreparedPool {
    pub fn prepare(
        records: &[SnapshotRecord],
        history: &HistoryTable,
        params: &SelectionParams,
        oracle: Option<&dyn ScoringOracle>,
        adjustment: Option<&dyn ScoreAdjustment>,
    ) -> Result<Self, SelectionError> {
        params.validate()?;

        let mut records = records.to_vec();
        records.sort_by_key(|r| r.id);
        for pair in records.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(SelectionError::DuplicateCandidate(pair[0].id));
            }
        }
        if let Some(bad) = records.iter().find(|r| !(r.price.is_finite() && r.price > 0.0 && r.price <= MAX_PRICE)) {
            return Err(SelectionError::InvalidPrice {
                id: bad.id,
                price: bad.price,
            });
        }

        let features: Vec<FeatureVector> = records
            .iter()
            .map(|r| derive_features(r, history.series(r.id), params.scoring.mode))
            .collect();
        let scored = score_candidates(&records, &features, oracle, &params.scoring);
        let mut candidates = scored.candidates;

        if let Some(hook) = adjustment {
            debug!(hook = hook.name(), round = history.round(), "applying score adjustment");
            let ctx = AdjustmentContext {
                rounds_recorded: history.round(),
                scoring: &params.scoring,
            };
            hook.adjust(&mut candidates, &ctx);
        }

        let mut traps = BTreeMap::new();
        let eligible = candidates
            .iter()
            .map(|c| {
                let trap = params.trap.check(history.series(c.id), c.nominal_average);
                if let Some(reason) = trap {
                    traps.insert(c.id, reason);
                }
                trap.is_none() && c.status.is_selectable(params.include_doubtful)
            })
            .collect::<Vec<_>>();

        info!(
            candidates = candidates.len(),
            eligible = eligible.iter().filter(|e| **e).count(),
            traps = traps.len(),
            "candidate pool prepared"
        );
        Ok(Self {
            candidates,
            eligible,
            traps,
            source: scored.source,
        })
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn eligible(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates
            .iter()
            .zip(&self.eligible)
            .filter_map(|(c, ok)| ok.then_some(c))
    }

    pub fn traps(&self) -> &BTreeMap<CandidateId, TrapReason> {
        &self.traps
    }

    pub fn score_source(&self) -> &ScoreSource {
        &self.source
    }

    pub fn pool(&self) -> CandidatePool<'_> {
        CandidatePool::new(self.eligible(), &self.candidates)
    }

    /// Allocate and finalize one roster.
    pub fn roster_for(&self, allocation: &AllocationParams, finalize: &FinalizeParams) -> Result<RosterResult, SelectionError> {
        allocation.validate()?;
        finalize.validate()?;

        let pool = self.pool();
        let alloc = AllocationEngine::new(allocation).allocate(&pool);
        let done = RosterFinalizer::new(finalize).finalize(&alloc.starters, &pool, &allocation.formation);

        let completeness = if alloc.unfilled.is_empty() {
            Completeness::Full
        } else {
            warn!(
                formation = %allocation.formation.name,
                missing = alloc.unfilled.iter().map(|u| u.missing).sum::<usize>(),
                "partial roster"
            );
            Completeness::Partial {
                unfilled: alloc.unfilled.clone(),
            }
        };

        Ok(RosterResult {
            schema_version: SCHEMA_VERSION,
            formation: allocation.formation.name.clone(),
            starters: alloc.starters.iter().map(|c| StarterPick::from(*c)).collect(),
            leader: done.leader,
            regular_backups: done.regular_backups,
            luxury_backup: done.luxury_backup,
            total_cost: alloc.total_cost(),
            expected_score: alloc.total_score(),
            budget: allocation.budget,
            completeness,
            budget_infeasible: alloc.budget_infeasible,
            solver: alloc.path,
            local_search_iterations: alloc.local_search.iterations,
            score_source: self.source.clone(),
        })
    }
}

/// Full pipeline for one formation.
pub fn select_roster(
    records: &[SnapshotRecord],
    history: &HistoryTable,
    params: &SelectionParams,
    oracle: Option<&dyn ScoringOracle>,
    adjustment: Option<&dyn ScoreAdjustment>,
) -> Result<RosterResult, SelectionError> {
    PreparedPool::prepare(records, history, params, oracle, adjustment)?.roster_for(&params.allocation, &params.finalize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AvailabilityStatus, Category, Formation, SolverPath};
    use crate::history::RoundUpdate;

    fn record(id: u32, category: Category, price: f64, nominal: f64) -> SnapshotRecord {
        SnapshotRecord {
            id: CandidateId(id),
            category,
            price,
            nominal_average: nominal,
            price_variation: 0.0,
            participated: true,
            status: AvailabilityStatus::Probable,
            club: String::new(),
        }
    }

    fn single_slot(budget: f64) -> SelectionParams {
        SelectionParams::new(budget, Formation::new("solo", [(Category::Defender, 1)]))
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let records = [record(1, Category::Defender, 3.0, 1.0), record(1, Category::Coach, 3.0, 1.0)];
        let err = select_roster(&records, &HistoryTable::default(), &single_slot(10.0), None, None).unwrap_err();
        assert_eq!(err, SelectionError::DuplicateCandidate(CandidateId(1)));
    }

    #[test]
    fn invalid_price_is_rejected() {
        let records = [record(4, Category::Defender, 0.0, 1.0)];
        let err = select_roster(&records, &HistoryTable::default(), &single_slot(10.0), None, None).unwrap_err();
        assert!(matches!(err, SelectionError::InvalidPrice { .. }));
    }

    #[test]
    fn absurd_price_is_rejected() {
        let records = [record(4, Category::Defender, 1e17, 1.0), record(5, Category::Defender, 2.0, 1.0)];
        let err = select_roster(&records, &HistoryTable::default(), &single_slot(100.0), None, None).unwrap_err();
        assert_eq!(
            err,
            SelectionError::InvalidPrice {
                id: CandidateId(4),
                price: 1e17
            }
        );
    }

    #[test]
    fn sub_cent_prices_report_actual_spend() {
        let params = SelectionParams::new(10.0, Formation::new("pair", [(Category::Attacker, 2)]));
        let records = [record(1, Category::Attacker, 5.004, 4.0), record(2, Category::Attacker, 5.004, 3.0)];
        let out = select_roster(&records, &HistoryTable::default(), &params, None, None).unwrap();
        assert!(!out.is_full());
        assert_eq!(out.starters.len(), 1);
        assert!((out.total_cost - 5.004).abs() < 1e-9);
        assert!(out.total_cost <= out.budget);
    }

    #[test]
    fn unavailable_candidate_completes_roster_when_budget_needs_it() {
        let mut injured = record(3, Category::Coach, 2.0, 1.0);
        injured.status = AvailabilityStatus::Injured;
        let records = [
            record(1, Category::Attacker, 5.0, 6.0),
            record(2, Category::Coach, 8.0, 5.0),
            injured,
        ];
        let params = SelectionParams::new(10.0, Formation::new("pair", [(Category::Attacker, 1), (Category::Coach, 1)]));
        let out = select_roster(&records, &HistoryTable::default(), &params, None, None).unwrap();
        assert!(out.is_full());
        assert!(!out.budget_infeasible);
        assert_eq!(out.starter_ids(), vec![CandidateId(1), CandidateId(3)]);
        assert!(out.total_cost <= 10.0);
    }

    #[test]
    fn bad_params_fail_before_work() {
        let err = select_roster(&[], &HistoryTable::default(), &single_slot(-1.0), None, None).unwrap_err();
        assert!(matches!(err, SelectionError::Params(ParamsError::InvalidBudget(_))));
    }

    #[test]
    fn empty_snapshot_gives_partial_result() {
        let out = select_roster(&[], &HistoryTable::default(), &single_slot(10.0), None, None).unwrap();
        assert!(!out.is_full());
        assert!(out.starters.is_empty());
        assert_eq!(out.solver, SolverPath::Greedy);
    }

    #[test]
    fn injured_candidates_stay_in_full_pool_only() {
        let mut injured = record(2, Category::Defender, 2.0, 9.0);
        injured.status = AvailabilityStatus::Injured;
        let records = [record(1, Category::Defender, 3.0, 4.0), injured];
        let prepared =
            PreparedPool::prepare(&records, &HistoryTable::default(), &single_slot(10.0), None, None).unwrap();
        assert_eq!(prepared.candidates().len(), 2);
        assert_eq!(prepared.eligible().count(), 1);
        let params = single_slot(10.0);
        let out = prepared.roster_for(&params.allocation, &params.finalize).unwrap();
        assert_eq!(out.starter_ids(), vec![CandidateId(1)]);
    }

    #[test]
    fn traps_are_excluded_from_eligible_pool() {
        let mut history = HistoryTable::new(15);
        for _ in 0..6 {
            history.apply_round(&[RoundUpdate {
                id: CandidateId(1),
                outcome: 0.0,
                participated: false,
                price_delta: 0.0,
            }]);
        }
        let records = [record(1, Category::Defender, 3.0, 8.0), record(2, Category::Defender, 3.0, 1.0)];
        let prepared = PreparedPool::prepare(&records, &history, &single_slot(10.0), None, None).unwrap();
        assert_eq!(prepared.traps().get(&CandidateId(1)), Some(&TrapReason::LowParticipation));
        let ids: Vec<_> = prepared.eligible().map(|c| c.id).collect();
        assert_eq!(ids, vec![CandidateId(2)]);
    }

    #[test]
    fn input_order_does_not_matter() {
        let a = [
            record(3, Category::Defender, 3.0, 4.0),
            record(1, Category::Defender, 4.0, 4.0),
            record(2, Category::Coach, 2.0, 2.0),
        ];
        let mut b = a.clone();
        b.reverse();
        let params = SelectionParams::new(
            20.0,
            Formation::new("pair", [(Category::Defender, 1), (Category::Coach, 1)]),
        );
        let history = HistoryTable::default();
        let ra = select_roster(&a, &history, &params, None, None).unwrap();
        let rb = select_roster(&b, &history, &params, None, None).unwrap();
        assert_eq!(ra, rb);
        assert_eq!(ra.digest().unwrap(), rb.digest().unwrap());
    }
}
