//! Exact pass over a top-K pruned pool.
//!
//! Each category contributes the combinations of exactly its quota drawn
//! from its best `top_k` eligible candidates. Combinations are reduced to
//! their cost/score Pareto frontier, then frontiers are folded category by
//! category, keeping only Pareto-optimal partial rosters that can still be
//! completed within budget. The highest-scoring final state is optimal for
//! the pruned pool.

use thiserror::Error;

use super::{budget_cents, quotas, sum_cents, to_cents, CandidatePool, Cents};
use crate::domain::{Candidate, Category};
use crate::params::AllocationParams;

const SCORE_EPS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExactError {
    #[error("{category} has {available} eligible candidates, {required} required")]
    ShortCategory {
        category: Category,
        available: usize,
        required: usize,
    },
    #[error("state limit {limit} exceeded")]
    StateLimit { limit: u64 },
    #[error("no complete roster fits the budget in the pruned pool")]
    Infeasible,
    #[error("exact pass picked {picked} of {required} starters")]
    Incomplete { picked: usize, required: usize },
}

#[derive(Debug, Clone)]
pub struct ExactSolution<'a> {
    pub picks: Vec<&'a Candidate>,
    pub score: f64,
    pub cost: Cents,
    /// Frontier states generated, combinations included.
    pub states: u64,
}

#[derive(Debug, Clone)]
struct Combo {
    cost: Cents,
    score: f64,
    members: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
struct State {
    cost: Cents,
    score: f64,
    parent: usize,
    choice: usize,
}

struct StateCounter {
    count: u64,
    limit: u64,
}

impl StateCounter {
    fn bump(&mut self) -> Result<(), ExactError> {
        self.count += 1;
        if self.count > self.limit {
            Err(ExactError::StateLimit { limit: self.limit })
        } else {
            Ok(())
        }
    }
}

pub fn solve_exact<'a>(pool: &CandidatePool<'a>, params: &AllocationParams) -> Result<ExactSolution<'a>, ExactError> {
    let budget = budget_cents(params.budget);
    let needs = quotas(&params.formation);
    let mut counter = StateCounter {
        count: 0,
        limit: params.exact_state_limit,
    };

    let mut shortlists: Vec<&[&'a Candidate]> = Vec::with_capacity(needs.len());
    let mut frontiers: Vec<Vec<Combo>> = Vec::with_capacity(needs.len());
    for (category, required) in &needs {
        let ranked = pool.eligible_in(*category);
        let shortlist = &ranked[..ranked.len().min(params.top_k)];
        if shortlist.len() < *required {
            return Err(ExactError::ShortCategory {
                category: *category,
                available: shortlist.len(),
                required: *required,
            });
        }
        let frontier = category_frontier(shortlist, *required, budget, &mut counter)?;
        if frontier.is_empty() {
            return Err(ExactError::Infeasible);
        }
        shortlists.push(shortlist);
        frontiers.push(frontier);
    }

    // cheap_rest[i]: minimum spend for categories i.. (frontiers are cost-sorted).
    let mut cheap_rest: Vec<Cents> = vec![0; frontiers.len() + 1];
    for i in (0..frontiers.len()).rev() {
        cheap_rest[i] = cheap_rest[i + 1].saturating_add(frontiers[i][0].cost);
    }
    if cheap_rest[0] > budget {
        return Err(ExactError::Infeasible);
    }

    let mut layers: Vec<Vec<State>> = Vec::with_capacity(frontiers.len());
    for (i, frontier) in frontiers.iter().enumerate() {
        let mut next = Vec::new();
        match layers.last() {
            None => {
                for (choice, combo) in frontier.iter().enumerate() {
                    if combo.cost.saturating_add(cheap_rest[i + 1]) > budget {
                        break;
                    }
                    counter.bump()?;
                    next.push(State {
                        cost: combo.cost,
                        score: combo.score,
                        parent: 0,
                        choice,
                    });
                }
            }
            Some(prev) => {
                for (parent, state) in prev.iter().enumerate() {
                    for (choice, combo) in frontier.iter().enumerate() {
                        let cost = state.cost.saturating_add(combo.cost);
                        if cost.saturating_add(cheap_rest[i + 1]) > budget {
                            break;
                        }
                        counter.bump()?;
                        next.push(State {
                            cost,
                            score: state.score + combo.score,
                            parent,
                            choice,
                        });
                    }
                }
            }
        }
        let next = pareto(next);
        if next.is_empty() {
            return Err(ExactError::Infeasible);
        }
        layers.push(next);
    }

    let last = layers.last().and_then(|l| l.last()).copied().ok_or(ExactError::Infeasible)?;
    let mut picks = Vec::with_capacity(params.formation.total());
    let mut cursor = last;
    for depth in (0..layers.len()).rev() {
        let combo = &frontiers[depth][cursor.choice];
        picks.extend(combo.members.iter().map(|m| shortlists[depth][*m]));
        if depth > 0 {
            cursor = layers[depth - 1][cursor.parent];
        }
    }

    Ok(ExactSolution {
        picks,
        score: last.score,
        cost: last.cost,
        states: counter.count,
    })
}

/// All quota-sized combinations of `shortlist` within budget, reduced to
/// their Pareto frontier and sorted by cost.
fn category_frontier(
    shortlist: &[&Candidate],
    required: usize,
    budget: Cents,
    counter: &mut StateCounter,
) -> Result<Vec<Combo>, ExactError> {
    let prices: Vec<Cents> = shortlist.iter().map(|c| to_cents(c.price)).collect();
    let mut combos = Vec::new();
    let mut idx: Vec<usize> = (0..required).collect();
    let n = shortlist.len();
    loop {
        counter.bump()?;
        let cost = sum_cents(idx.iter().map(|i| prices[*i]));
        if cost <= budget {
            combos.push(Combo {
                cost,
                score: idx.iter().map(|i| shortlist[*i].final_score).sum(),
                members: idx.clone(),
            });
        }
        // Advance to the next lexicographic combination.
        let Some(pos) = (0..required).rev().find(|&p| idx[p] < n - required + p) else {
            break;
        };
        idx[pos] += 1;
        for p in pos + 1..required {
            idx[p] = idx[p - 1] + 1;
        }
    }

    // Stable sort keeps generation order among exact ties.
    combos.sort_by(|a, b| a.cost.cmp(&b.cost).then_with(|| b.score.total_cmp(&a.score)));
    let mut frontier: Vec<Combo> = Vec::new();
    for combo in combos {
        if frontier.last().map_or(true, |kept| combo.score > kept.score + SCORE_EPS) {
            frontier.push(combo);
        }
    }
    Ok(frontier)
}

fn pareto(mut states: Vec<State>) -> Vec<State> {
    states.sort_by(|a, b| {
        a.cost
            .cmp(&b.cost)
            .then_with(|| b.score.total_cmp(&a.score))
            .then_with(|| (a.parent, a.choice).cmp(&(b.parent, b.choice)))
    });
    let mut kept: Vec<State> = Vec::new();
    for s in states {
        if kept.last().map_or(true, |k| s.score > k.score + SCORE_EPS) {
            kept.push(s);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::super::test_support::cand;
    use super::*;
    use crate::domain::{CandidateId, Formation};

    fn ids(sol: &ExactSolution<'_>) -> Vec<u32> {
        let mut v: Vec<u32> = sol.picks.iter().map(|c| c.id.0).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn picks_best_combination_within_budget() {
        let cs = vec![
            cand(1, Category::Attacker, 9.0, 10.0),
            cand(2, Category::Attacker, 4.0, 6.0),
            cand(3, Category::Attacker, 4.0, 5.5),
            cand(4, Category::Coach, 2.0, 1.0),
            cand(5, Category::Coach, 6.0, 4.0),
        ];
        let pool = CandidatePool::from_candidates(&cs);
        let formation = Formation::new("x", [(Category::Attacker, 2), (Category::Coach, 1)]);
        let params = AllocationParams::new(16.0, formation);
        let sol = solve_exact(&pool, &params).unwrap();
        // 1+2+4 = 15.0 for 17.0 beats 2+3+5 = 14.0 for 15.5.
        assert_eq!(ids(&sol), vec![1, 2, 4]);
        assert_eq!(sol.cost, 1500);
        assert!((sol.score - 17.0).abs() < 1e-9);
    }

    #[test]
    fn matches_brute_force_on_small_pool() {
        let cs: Vec<_> = (0..8)
            .map(|i| {
                let category = if i < 5 { Category::Midfielder } else { Category::Goalkeeper };
                cand(i, category, 2.0 + ((i * 7) % 5) as f64, 1.0 + ((i * 3) % 7) as f64)
            })
            .collect();
        let pool = CandidatePool::from_candidates(&cs);
        let formation = Formation::new("x", [(Category::Midfielder, 3), (Category::Goalkeeper, 1)]);
        let params = AllocationParams::new(15.0, formation);
        let sol = solve_exact(&pool, &params).unwrap();

        let mut best = f64::MIN;
        for a in 0..5 {
            for b in a + 1..5 {
                for c in b + 1..5 {
                    for g in 5..8 {
                        let set = [a, b, c, g];
                        let cost: f64 = set.iter().map(|i| cs[*i].price).sum();
                        if cost <= 15.0 {
                            best = best.max(set.iter().map(|i| cs[*i].final_score).sum());
                        }
                    }
                }
            }
        }
        assert!((sol.score - best).abs() < 1e-9);
        assert!(sol.cost <= 1500);
    }

    #[test]
    fn short_category_is_reported() {
        let cs = vec![cand(1, Category::Defender, 3.0, 1.0)];
        let pool = CandidatePool::from_candidates(&cs);
        let params = AllocationParams::new(50.0, Formation::new("x", [(Category::Defender, 2)]));
        assert_eq!(
            solve_exact(&pool, &params).unwrap_err(),
            ExactError::ShortCategory {
                category: Category::Defender,
                available: 1,
                required: 2
            }
        );
    }

    #[test]
    fn top_k_limits_the_shortlist() {
        let cs = vec![
            cand(1, Category::Defender, 30.0, 9.0),
            cand(2, Category::Defender, 3.0, 1.0),
        ];
        let pool = CandidatePool::from_candidates(&cs);
        let mut params = AllocationParams::new(10.0, Formation::new("x", [(Category::Defender, 1)]));
        params.top_k = 1;
        assert_eq!(solve_exact(&pool, &params).unwrap_err(), ExactError::Infeasible);
        params.top_k = 2;
        let sol = solve_exact(&pool, &params).unwrap();
        assert_eq!(sol.picks[0].id, CandidateId(2));
    }

    #[test]
    fn state_limit_aborts() {
        let cs: Vec<_> = (0..10).map(|i| cand(i, Category::Attacker, 1.0, i as f64)).collect();
        let pool = CandidatePool::from_candidates(&cs);
        let mut params = AllocationParams::new(100.0, Formation::new("x", [(Category::Attacker, 3)]));
        params.exact_state_limit = 10;
        assert_eq!(
            solve_exact(&pool, &params).unwrap_err(),
            ExactError::StateLimit { limit: 10 }
        );
    }

    #[test]
    fn equal_scores_resolve_to_first_generated() {
        let cs = vec![
            cand(7, Category::Attacker, 5.0, 3.0),
            cand(3, Category::Attacker, 5.0, 3.0),
        ];
        let pool = CandidatePool::from_candidates(&cs);
        let params = AllocationParams::new(5.0, Formation::new("x", [(Category::Attacker, 1)]));
        let sol = solve_exact(&pool, &params).unwrap();
        assert_eq!(sol.picks[0].id, CandidateId(3));
    }
}
