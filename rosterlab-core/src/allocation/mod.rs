//! Allocation engine: chooses starters per category under the budget.
//!
//! Three stages:
//! 1. Exact pass over a top-K pruned pool (`exact`). Accepted as-is when it
//!    returns a complete roster.
//! 2. Otherwise a feasibility-aware greedy construction followed by a
//!    relaxing backfill (`greedy`).
//! 3. A bounded best-improvement hill climb over the greedy result
//!    (`local_search`).
//!
//! Money is tracked in integer cents so budget checks are exact.

pub mod exact;
pub mod greedy;
pub mod local_search;

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::domain::{
    Candidate, CandidateId, Category, Formation, SolverPath, UnfilledSlot, ALLOCATION_PRIORITY,
};
use crate::params::AllocationParams;

pub use exact::{solve_exact, ExactError, ExactSolution};
pub use greedy::{backfill, greedy_construct};
pub use local_search::{refine, LocalSearchReport, LEFTOVER_FLOOR_CENTS};

/// Money in hundredths of a currency unit.
pub type Cents = i64;

/// Largest accepted price. Keeps every cent sum far from `i64` limits.
pub const MAX_PRICE: f64 = 1e9;

/// Prices round up to the next cent, so a sub-cent remainder can never make
/// an unaffordable candidate look affordable. The epsilon absorbs binary
/// representation noise such as `1.1 * 100.0 = 110.00000000000001`.
pub fn to_cents(price: f64) -> Cents {
    (price * 100.0 - 1e-6).ceil() as Cents
}

/// Budgets are floored so rounding can never create spending room: the
/// result converted back never exceeds `budget`.
pub fn budget_cents(budget: f64) -> Cents {
    let mut cents = (budget * 100.0 + 1e-6).floor() as Cents;
    while cents > 0 && from_cents(cents) > budget {
        cents -= 1;
    }
    cents
}

pub fn from_cents(cents: Cents) -> f64 {
    cents as f64 / 100.0
}

/// Saturating sum; saturated totals always exceed any valid budget.
pub(crate) fn sum_cents(values: impl IntoIterator<Item = Cents>) -> Cents {
    values.into_iter().fold(0, Cents::saturating_add)
}

// ─── Candidate pool ──────────────────────────────────────────────────

/// Borrowed view over the scored candidates of one selection call.
///
/// `eligible` holds selectable, non-trap candidates; `full` holds every
/// scored candidate and serves the relaxation and widening stages. Both are
/// kept per category in tie-break order and in price order.
#[derive(Debug, Clone)]
pub struct CandidatePool<'a> {
    eligible: BTreeMap<Category, Vec<&'a Candidate>>,
    full: BTreeMap<Category, Vec<&'a Candidate>>,
    eligible_by_price: BTreeMap<Category, Vec<&'a Candidate>>,
    full_by_price: BTreeMap<Category, Vec<&'a Candidate>>,
}

impl<'a> CandidatePool<'a> {
    pub fn new(
        eligible: impl IntoIterator<Item = &'a Candidate>,
        full: impl IntoIterator<Item = &'a Candidate>,
    ) -> Self {
        let eligible = group_ranked(eligible);
        let full = group_ranked(full);
        let eligible_by_price = by_price(&eligible);
        let full_by_price = by_price(&full);
        Self {
            eligible,
            full,
            eligible_by_price,
            full_by_price,
        }
    }

    /// Pool where every candidate is eligible.
    pub fn from_candidates(candidates: &'a [Candidate]) -> Self {
        Self::new(candidates, candidates)
    }

    /// Eligible candidates of a category, best first.
    pub fn eligible_in(&self, category: Category) -> &[&'a Candidate] {
        self.eligible.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All candidates of a category, best first.
    pub fn full_in(&self, category: Category) -> &[&'a Candidate] {
        self.full.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the eligible pool alone has enough candidates for `needs`.
    pub fn eligible_covers(&self, needs: &[(Category, usize)]) -> bool {
        needs.iter().all(|(category, n)| self.eligible_in(*category).len() >= *n)
    }

    /// Lower bound on the cost of filling `needs` from the eligible pool:
    /// the sum of the N cheapest unused candidates per category. Categories
    /// short of candidates contribute what they have.
    pub fn eligible_completion_cost(&self, needs: &[(Category, usize)], used: &BTreeSet<CandidateId>) -> Cents {
        completion_cost(&self.eligible_by_price, needs, used)
    }

    /// Same bound over the full pool.
    pub fn full_completion_cost(&self, needs: &[(Category, usize)], used: &BTreeSet<CandidateId>) -> Cents {
        completion_cost(&self.full_by_price, needs, used)
    }
}

fn group_ranked<'a>(candidates: impl IntoIterator<Item = &'a Candidate>) -> BTreeMap<Category, Vec<&'a Candidate>> {
    let mut groups: BTreeMap<Category, Vec<&'a Candidate>> = BTreeMap::new();
    for c in candidates {
        groups.entry(c.category).or_default().push(c);
    }
    for list in groups.values_mut() {
        list.sort_by(|a, b| a.rank_cmp(b));
        list.dedup_by_key(|c| c.id);
    }
    groups
}

fn by_price<'a>(ranked: &BTreeMap<Category, Vec<&'a Candidate>>) -> BTreeMap<Category, Vec<&'a Candidate>> {
    ranked
        .iter()
        .map(|(category, list)| {
            let mut sorted = list.clone();
            sorted.sort_by(|a, b| to_cents(a.price).cmp(&to_cents(b.price)).then_with(|| a.rank_cmp(b)));
            (*category, sorted)
        })
        .collect()
}

fn completion_cost(
    by_price: &BTreeMap<Category, Vec<&Candidate>>,
    needs: &[(Category, usize)],
    used: &BTreeSet<CandidateId>,
) -> Cents {
    sum_cents(needs.iter().map(|(category, n)| {
        by_price
            .get(category)
            .map(|list| {
                sum_cents(
                    list.iter()
                        .filter(|c| !used.contains(&c.id))
                        .take(*n)
                        .map(|c| to_cents(c.price)),
                )
            })
            .unwrap_or(0)
    }))
}

/// Per-category quotas in allocation priority order, zero counts skipped.
pub fn quotas(formation: &Formation) -> Vec<(Category, usize)> {
    ALLOCATION_PRIORITY
        .iter()
        .map(|c| (*c, formation.count(*c)))
        .filter(|(_, n)| *n > 0)
        .collect()
}

// ─── Engine ──────────────────────────────────────────────────────────

/// Outcome of one allocation.
#[derive(Debug, Clone)]
pub struct Allocation<'a> {
    /// Starters in category order, then tie-break order.
    pub starters: Vec<&'a Candidate>,
    pub path: SolverPath,
    pub unfilled: Vec<UnfilledSlot>,
    pub budget_infeasible: bool,
    pub local_search: LocalSearchReport,
    /// Why the exact pass was not used, if it was not.
    pub exact_error: Option<ExactError>,
}

impl Allocation<'_> {
    /// Spend as the budget checks see it (prices rounded up to the cent).
    pub fn total_cost_cents(&self) -> Cents {
        sum_cents(self.starters.iter().map(|c| to_cents(c.price)))
    }

    /// Actual spend, capped at the cent total.
    pub fn total_cost(&self) -> f64 {
        let actual: f64 = self.starters.iter().map(|c| c.price).sum();
        actual.min(from_cents(self.total_cost_cents()))
    }

    pub fn total_score(&self) -> f64 {
        self.starters.iter().map(|c| c.final_score).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.unfilled.is_empty()
    }
}

/// Runs exact pass → greedy + backfill → local search.
#[derive(Debug, Clone, Copy)]
pub struct AllocationEngine<'p> {
    params: &'p AllocationParams,
}

impl<'p> AllocationEngine<'p> {
    pub fn new(params: &'p AllocationParams) -> Self {
        Self { params }
    }

    pub fn allocate<'a>(&self, pool: &CandidatePool<'a>) -> Allocation<'a> {
        let budget = budget_cents(self.params.budget);
        let needs = quotas(&self.params.formation);
        let total = self.params.formation.total();

        let budget_infeasible = pool.full_completion_cost(&needs, &BTreeSet::new()) > budget;
        if budget_infeasible {
            warn!(
                formation = %self.params.formation.name,
                budget = self.params.budget,
                "cheapest completion exceeds budget"
            );
        }

        let exact_error = match solve_exact(pool, self.params) {
            Ok(solution) if solution.picks.len() == total => {
                debug!(
                    formation = %self.params.formation.name,
                    states = solution.states,
                    "exact pass accepted"
                );
                return Allocation {
                    starters: ordered(solution.picks),
                    path: SolverPath::Exact,
                    unfilled: Vec::new(),
                    budget_infeasible,
                    local_search: LocalSearchReport::default(),
                    exact_error: None,
                };
            }
            Ok(solution) => ExactError::Incomplete {
                picked: solution.picks.len(),
                required: total,
            },
            Err(err) => err,
        };
        match exact_error {
            ExactError::StateLimit { .. } => {
                info!(formation = %self.params.formation.name, error = %exact_error, "exact pass gave up; using greedy")
            }
            _ => debug!(formation = %self.params.formation.name, error = %exact_error, "exact pass unusable; using greedy"),
        }

        let mut starters = greedy_construct(pool, &self.params.formation, budget);
        let unfilled = backfill(pool, &self.params.formation, budget, &mut starters);
        let local_search = refine(&mut starters, pool, budget, self.params.local_search_cap);
        debug!(
            formation = %self.params.formation.name,
            iterations = local_search.iterations,
            gain = local_search.gain,
            cap_reached = local_search.cap_reached,
            "local search finished"
        );

        Allocation {
            starters: ordered(starters),
            path: SolverPath::Greedy,
            unfilled,
            budget_infeasible,
            local_search,
            exact_error: Some(exact_error),
        }
    }
}

fn ordered(mut starters: Vec<&Candidate>) -> Vec<&Candidate> {
    starters.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.rank_cmp(b)));
    starters
}


#[cfg(test)]
mod tests {
    use super::test_support::cand;
    use super::*;

    #[test]
    fn cents_round_up_and_budget_floors() {
        assert_eq!(to_cents(4.35), 435);
        assert_eq!(to_cents(0.29), 29);
        assert_eq!(to_cents(1.1), 110);
        assert_eq!(to_cents(5.004), 501);
        assert_eq!(to_cents(5.0001), 501);
        assert_eq!(budget_cents(10.0), 1000);
        assert_eq!(budget_cents(10.009), 1000);
        assert_eq!(budget_cents(0.29), 29);
        assert_eq!(budget_cents(0.289_999_999), 28);
        for b in [0.289_999_999, 0.1 + 0.2, 99.999_999_99, 140.0] {
            assert!(from_cents(budget_cents(b)) <= b, "{b}");
        }
    }

    #[test]
    fn sub_cent_prices_never_overspend() {
        let cs = vec![
            cand(1, Category::Attacker, 5.004, 3.0),
            cand(2, Category::Attacker, 5.004, 2.0),
            cand(3, Category::Attacker, 4.99, 1.0),
        ];
        let pool = CandidatePool::from_candidates(&cs);
        let formation = Formation::new("x", [(Category::Attacker, 2)]);
        let params = AllocationParams::new(10.0, formation);
        let alloc = AllocationEngine::new(&params).allocate(&pool);
        assert!(alloc.is_complete());
        let actual: f64 = alloc.starters.iter().map(|c| c.price).sum();
        assert!(actual <= 10.0);
        assert!(alloc.total_cost() <= 10.0);
        assert!((alloc.total_cost() - actual).abs() < 1e-9);
        let mut ids: Vec<u32> = alloc.starters.iter().map(|c| c.id.0).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn huge_prices_do_not_overflow_cost_sums() {
        let cs = vec![
            cand(1, Category::Attacker, 1e17, 9.0),
            cand(2, Category::Attacker, 1e17, 8.0),
            cand(3, Category::Attacker, 2.0, 1.0),
        ];
        let pool = CandidatePool::from_candidates(&cs);
        let formation = Formation::new("x", [(Category::Attacker, 2)]);
        assert!(pool.full_completion_cost(&quotas(&formation), &BTreeSet::new()) > budget_cents(100.0));
        let params = AllocationParams::new(100.0, formation);
        let alloc = AllocationEngine::new(&params).allocate(&pool);
        assert!(alloc.budget_infeasible);
        assert!(alloc.total_cost() <= 100.0);
        assert_eq!(alloc.starters.len(), 1);
        assert_eq!(alloc.starters[0].id, CandidateId(3));
    }

    #[test]
    fn pool_orders_by_rank_and_price() {
        let cs = vec![
            cand(1, Category::Attacker, 9.0, 3.0),
            cand(2, Category::Attacker, 4.0, 8.0),
            cand(3, Category::Attacker, 6.0, 5.0),
        ];
        let pool = CandidatePool::from_candidates(&cs);
        let ranked: Vec<u32> = pool.eligible_in(Category::Attacker).iter().map(|c| c.id.0).collect();
        assert_eq!(ranked, vec![2, 3, 1]);
        let needs = [(Category::Attacker, 2)];
        assert_eq!(pool.eligible_completion_cost(&needs, &BTreeSet::new()), 1000);
        let used = BTreeSet::from([CandidateId(2)]);
        assert_eq!(pool.eligible_completion_cost(&needs, &used), 1500);
    }

    #[test]
    fn quotas_follow_priority_and_skip_zero() {
        let f = Formation::preset("3-4-3").unwrap();
        let q = quotas(&f);
        assert_eq!(q.first(), Some(&(Category::Attacker, 3)));
        assert!(q.iter().all(|(c, _)| *c != Category::Fullback));
    }

    #[test]
    fn exact_path_used_when_pool_is_complete() {
        let cs = vec![
            cand(1, Category::Attacker, 4.0, 3.0),
            cand(2, Category::Attacker, 5.0, 4.0),
            cand(3, Category::Attacker, 6.0, 5.0),
        ];
        let pool = CandidatePool::from_candidates(&cs);
        let params = AllocationParams::new(10.0, Formation::new("x", [(Category::Attacker, 1)]));
        let alloc = AllocationEngine::new(&params).allocate(&pool);
        assert_eq!(alloc.path, SolverPath::Exact);
        assert_eq!(alloc.starters[0].id, CandidateId(3));
        assert!(alloc.is_complete());
    }

    #[test]
    fn short_pool_falls_back_and_reports_unfilled() {
        let cs = vec![cand(1, Category::Attacker, 4.0, 3.0)];
        let pool = CandidatePool::from_candidates(&cs);
        let params = AllocationParams::new(10.0, Formation::new("x", [(Category::Attacker, 2)]));
        let alloc = AllocationEngine::new(&params).allocate(&pool);
        assert_eq!(alloc.path, SolverPath::Greedy);
        assert!(matches!(alloc.exact_error, Some(ExactError::ShortCategory { .. })));
        assert_eq!(alloc.starters.len(), 1);
        assert_eq!(alloc.unfilled.len(), 1);
        assert_eq!(alloc.unfilled[0].missing, 1);
    }

    #[test]
    fn infeasible_budget_is_flagged_and_never_exceeded() {
        let cs = vec![
            cand(1, Category::Attacker, 8.0, 3.0),
            cand(2, Category::Coach, 7.0, 2.0),
        ];
        let pool = CandidatePool::from_candidates(&cs);
        let formation = Formation::new("x", [(Category::Attacker, 1), (Category::Coach, 1)]);
        let params = AllocationParams::new(10.0, formation);
        let alloc = AllocationEngine::new(&params).allocate(&pool);
        assert!(alloc.budget_infeasible);
        assert!(alloc.total_cost() <= 10.0);
        assert!(!alloc.is_complete());
    }
}
