//! Bounded best-improvement hill climb over a greedy roster.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{sum_cents, to_cents, CandidatePool, Cents};
use crate::domain::{Candidate, CandidateId};

/// Leftover at or below this stops the search.
pub const LEFTOVER_FLOOR_CENTS: Cents = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalSearchReport {
    pub iterations: usize,
    /// An improving swap existed when the iteration cap stopped the search.
    pub cap_reached: bool,
    /// Total score gained by the applied swaps.
    pub gain: f64,
}

struct Swap<'a> {
    gain: f64,
    slot: usize,
    incoming: &'a Candidate,
}

/// Swap starters for better unused eligible candidates of the same category
/// while leftover budget exceeds the floor.
///
/// Each iteration applies the single swap with the largest score gain; ties
/// go to the earliest starter.
pub fn refine<'a>(
    starters: &mut [&'a Candidate],
    pool: &CandidatePool<'a>,
    budget: Cents,
    cap: usize,
) -> LocalSearchReport {
    let mut used: BTreeSet<CandidateId> = starters.iter().map(|c| c.id).collect();
    let mut report = LocalSearchReport::default();

    loop {
        let spent = sum_cents(starters.iter().map(|c| to_cents(c.price)));
        let remaining = budget - spent;
        if remaining <= LEFTOVER_FLOOR_CENTS {
            break;
        }

        let Some(swap) = best_swap(starters, pool, &used, remaining) else {
            break;
        };
        if report.iterations >= cap {
            report.cap_reached = true;
            break;
        }

        used.remove(&starters[swap.slot].id);
        used.insert(swap.incoming.id);
        starters[swap.slot] = swap.incoming;
        report.iterations += 1;
        report.gain += swap.gain;
    }
    report
}

fn best_swap<'a>(
    starters: &[&'a Candidate],
    pool: &CandidatePool<'a>,
    used: &BTreeSet<CandidateId>,
    remaining: Cents,
) -> Option<Swap<'a>> {
    let mut best: Option<Swap<'a>> = None;
    for (slot, current) in starters.iter().enumerate() {
        let ceiling = to_cents(current.price).saturating_add(remaining);
        for candidate in pool.eligible_in(current.category) {
            if candidate.final_score <= current.final_score {
                break;
            }
            if used.contains(&candidate.id) || to_cents(candidate.price) > ceiling {
                continue;
            }
            let gain = candidate.final_score - current.final_score;
            if best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(Swap {
                    gain,
                    slot,
                    incoming: candidate,
                });
            }
            break;
        }
    }
    best
}
