//! Feasibility-aware greedy construction and the relaxing backfill.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::{quotas, sum_cents, to_cents, CandidatePool, Cents};
use crate::domain::{Candidate, CandidateId, Category, Formation, UnfillReason, UnfilledSlot};

/// Fill categories in allocation priority order, best candidates first.
///
/// A candidate is taken only if, after paying for it, the remaining budget
/// still covers the cheapest completion of every open slot (the rest of the
/// current category and all later categories).
///
/// The completion bound is priced over the eligible pool when that pool can
/// complete the roster within budget on its own. Otherwise it is priced over
/// the full pool, leaving room for the backfill to widen.
pub fn greedy_construct<'a>(pool: &CandidatePool<'a>, formation: &Formation, budget: Cents) -> Vec<&'a Candidate> {
    let needs = quotas(formation);
    let eligible_bound =
        pool.eligible_covers(&needs) && pool.eligible_completion_cost(&needs, &BTreeSet::new()) <= budget;
    if !eligible_bound {
        debug!("eligible pool cannot complete the roster; bounding with the full pool");
    }
    let completion = |open: &[(Category, usize)], used: &BTreeSet<CandidateId>| {
        if eligible_bound {
            pool.eligible_completion_cost(open, used)
        } else {
            pool.full_completion_cost(open, used)
        }
    };
    let mut used: BTreeSet<CandidateId> = BTreeSet::new();
    let mut picks: Vec<&'a Candidate> = Vec::with_capacity(formation.total());
    let mut remaining = budget;

    for (idx, (category, required)) in needs.iter().enumerate() {
        let mut taken = 0usize;
        for candidate in pool.eligible_in(*category) {
            if taken == *required {
                break;
            }
            let price = to_cents(candidate.price);
            if price > remaining || used.contains(&candidate.id) {
                continue;
            }

            let mut open: Vec<(Category, usize)> = Vec::with_capacity(needs.len() - idx);
            open.push((*category, required - taken - 1));
            open.extend_from_slice(&needs[idx + 1..]);

            used.insert(candidate.id);
            if remaining - price >= completion(&open, &used) {
                picks.push(candidate);
                remaining -= price;
                taken += 1;
            } else {
                used.remove(&candidate.id);
            }
        }
        if taken < *required {
            debug!(%category, taken, required, "greedy left slots open");
        }
    }
    picks
}

/// Fill slots the greedy pass left open, relaxing the feasibility rule.
///
/// Stage one takes the best unused eligible candidate that fits the
/// remaining budget; stage two widens to the full pool. Slots still empty
/// are reported.
pub fn backfill<'a>(
    pool: &CandidatePool<'a>,
    formation: &Formation,
    budget: Cents,
    starters: &mut Vec<&'a Candidate>,
) -> Vec<UnfilledSlot> {
    let mut used: BTreeSet<CandidateId> = starters.iter().map(|c| c.id).collect();
    let mut remaining = budget.saturating_sub(sum_cents(starters.iter().map(|c| to_cents(c.price))));
    let mut unfilled = Vec::new();

    for (category, required) in quotas(formation) {
        let have = starters.iter().filter(|c| c.category == category).count();
        let mut short = required.saturating_sub(have);
        if short == 0 {
            continue;
        }

        for stage in [pool.eligible_in(category), pool.full_in(category)] {
            for candidate in stage {
                if short == 0 {
                    break;
                }
                let price = to_cents(candidate.price);
                if price <= remaining && used.insert(candidate.id) {
                    starters.push(candidate);
                    remaining -= price;
                    short -= 1;
                }
            }
        }

        if short > 0 {
            let any_unused = pool.full_in(category).iter().any(|c| !used.contains(&c.id));
            let reason = if any_unused {
                UnfillReason::BudgetExhausted
            } else {
                UnfillReason::NoCandidates
            };
            warn!(%category, missing = short, ?reason, "slot left unfilled");
            unfilled.push(UnfilledSlot {
                category,
                missing: short,
                reason,
            });
        }
    }
    unfilled
}
