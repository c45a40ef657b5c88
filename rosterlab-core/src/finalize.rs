//! Roster finalization: leader, luxury backup and regular backups.
//!
//! Runs after allocation and never changes the starters. Every id appears
//! at most once across starters and backups.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::allocation::{to_cents, CandidatePool, Cents};
use crate::domain::{Candidate, CandidateId, Category, Formation};
use crate::params::{BackupPolicy, FinalizeParams};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Finalized {
    pub leader: Option<CandidateId>,
    pub luxury_backup: Option<CandidateId>,
    pub regular_backups: BTreeMap<Category, CandidateId>,
}

pub struct RosterFinalizer<'p> {
    params: &'p FinalizeParams,
}

impl<'p> RosterFinalizer<'p> {
    pub fn new(params: &'p FinalizeParams) -> Self {
        Self { params }
    }

    pub fn finalize(&self, starters: &[&Candidate], pool: &CandidatePool<'_>, formation: &Formation) -> Finalized {
        let mut used: BTreeSet<CandidateId> = starters.iter().map(|c| c.id).collect();
        let leader = self.leader(starters);
        let leader_category = leader.map(|c| c.category);

        let luxury_backup = leader_category.and_then(|category| {
            let ceiling = cheapest_starter(starters, category)?;
            let pick = [pool.eligible_in(category), pool.full_in(category)]
                .into_iter()
                .flatten()
                .find(|c| !used.contains(&c.id) && to_cents(c.price) <= ceiling)?;
            used.insert(pick.id);
            Some(pick.id)
        });

        let mut regular_backups = BTreeMap::new();
        for category in formation.categories() {
            if Some(category) == leader_category {
                continue;
            }
            let Some(ceiling) = cheapest_starter(starters, category) else {
                continue;
            };
            let pick = self
                .backup_from(pool.eligible_in(category), ceiling, &used)
                .or_else(|| self.backup_from(pool.full_in(category), ceiling, &used));
            if let Some(pick) = pick {
                used.insert(pick.id);
                regular_backups.insert(category, pick.id);
            }
        }

        debug!(
            leader = ?leader.map(|c| c.id),
            luxury = ?luxury_backup,
            backups = regular_backups.len(),
            "roster finalized"
        );
        Finalized {
            leader: leader.map(|c| c.id),
            luxury_backup,
            regular_backups,
        }
    }

    /// Starter maximizing `final_score × multiplier`, preferring categories
    /// with a positive multiplier. Ties go to tie-break order.
    fn leader<'a>(&self, starters: &[&'a Candidate]) -> Option<&'a Candidate> {
        let mut ranked: Vec<&'a Candidate> = starters.to_vec();
        ranked.sort_by(|a, b| a.rank_cmp(b));

        let pick = |eligible: &dyn Fn(&Candidate) -> bool| {
            let mut best: Option<(&'a Candidate, f64)> = None;
            for c in ranked.iter().copied().filter(|c| eligible(*c)) {
                let value = c.final_score * self.params.multiplier(c.category);
                if best.map_or(true, |(_, v)| value.total_cmp(&v).is_gt()) {
                    best = Some((c, value));
                }
            }
            best.map(|(c, _)| c)
        };
        pick(&|c| self.params.multiplier(c.category) > 0.0).or_else(|| pick(&|_| true))
    }

    fn backup_from<'a>(&self, ranked: &[&'a Candidate], ceiling: Cents, used: &BTreeSet<CandidateId>) -> Option<&'a Candidate> {
        let mut open = ranked
            .iter()
            .copied()
            .filter(|c| !used.contains(&c.id) && to_cents(c.price) < ceiling);
        match self.params.backup_policy {
            BackupPolicy::BestScore => open.next(),
            // `min_by_key` keeps the first of equal keys, which is tie-break order.
            BackupPolicy::Cheapest => open.min_by_key(|c| to_cents(c.price)),
        }
    }
}

fn cheapest_starter(starters: &[&Candidate], category: Category) -> Option<Cents> {
    starters
        .iter()
        .filter(|c| c.category == category)
        .map(|c| to_cents(c.price))
        .min()
}
