//! Constraint-propagation search over issue cycles.
//!
//! Finite-domain formulation of modulo scheduling at a fixed II: one
//! cycle domain per operation, precedence bounds from the distance
//! matrix, and modulo resource legality against the committed
//! assignments. Binary branching with full-state snapshots; exhausting
//! the search tree is a proof that no schedule of this length exists at
//! this II, while hitting the fail limit says nothing either way.
//!
//! # Reference
//! - Baptiste et al. (2001), "Constraint-Based Scheduling"
//! - Rau (1994), "Iterative Modulo Scheduling" (HPL-94-115)

mod domain;

pub use domain::Domain;

use tracing::{debug, trace};

use crate::config::{DecisionStrategy, SchedulerConfig};
use crate::graph::{DistanceMatrix, PrecedenceGraph};
use crate::models::OpId;
use crate::resources::{ClassId, ReservationTable, ResourceModel};

/// Search counters for one attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpStats {
    /// Propagation failures (empty domain or resource conflict).
    pub fails: u64,
    /// Branching decisions taken.
    pub decisions: u64,
}

/// Result of one constraint-engine attempt at a fixed II.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CpOutcome {
    /// Issue cycle per operation, indexed by [`OpId`].
    Solution(Vec<i64>),
    /// The search tree was exhausted: no schedule exists at this II and
    /// schedule length.
    ProvedInfeasible,
    /// The fail limit was hit before the tree was exhausted.
    BudgetExhausted,
}

/// One branching decision. Commit and alternative together cover the
/// domain, so popping a frame and applying the alternative loses no
/// solutions.
#[derive(Debug, Clone, Copy)]
enum Branch {
    /// Commit: `op = v`. Alternative: `op != v`.
    Value { op: OpId, v: i64 },
    /// Commit: `op <= bound`. Alternative: `op > bound`.
    SplitLe { op: OpId, bound: i64 },
}

#[derive(Debug, Clone)]
struct SearchState {
    domains: Vec<Domain>,
}

/// One constraint-propagation attempt at a fixed II.
#[derive(Debug)]
pub struct CpScheduler<'a> {
    graph: &'a PrecedenceGraph,
    model: &'a ResourceModel,
    config: &'a SchedulerConfig,
}

impl<'a> CpScheduler<'a> {
    pub fn new(
        graph: &'a PrecedenceGraph,
        model: &'a ResourceModel,
        config: &'a SchedulerConfig,
    ) -> Self {
        Self {
            graph,
            model,
            config,
        }
    }

    /// Runs the attempt against the distance matrix of one candidate II.
    pub fn solve(&self, dm: &DistanceMatrix) -> (CpOutcome, CpStats) {
        let ii = dm.ii();
        let length = self.graph.schedule_length(ii);
        let n = self.graph.len();
        let mut stats = CpStats::default();
        let mut state = SearchState {
            domains: vec![Domain::full(length); n],
        };

        debug!(ii, length, strategy = ?self.config.decision_strategy, "cp attempt");

        if !self.propagate(dm, &mut state) {
            stats.fails = 1;
            debug!(ii, "root propagation failed");
            return (CpOutcome::ProvedInfeasible, stats);
        }

        let mut stack: Vec<(SearchState, Branch)> = Vec::new();
        loop {
            let Some(branch) = self.decide(dm, &state) else {
                let cycles = state
                    .domains
                    .iter()
                    .map(|d| d.min().expect("fixed domain is nonempty"))
                    .collect();
                debug!(ii, decisions = stats.decisions, fails = stats.fails, "cp solution");
                return (CpOutcome::Solution(cycles), stats);
            };
            stats.decisions += 1;
            trace!(?branch, "branching");
            stack.push((state.clone(), branch));
            apply_commit(&mut state, branch);

            while !self.propagate(dm, &mut state) {
                stats.fails += 1;
                if stats.fails >= self.config.cp_fail_limit {
                    debug!(ii, fails = stats.fails, "cp fail limit hit");
                    return (CpOutcome::BudgetExhausted, stats);
                }
                match stack.pop() {
                    None => {
                        debug!(ii, fails = stats.fails, "cp search exhausted");
                        return (CpOutcome::ProvedInfeasible, stats);
                    }
                    Some((snapshot, branch)) => {
                        state = snapshot;
                        apply_alternative(&mut state, branch);
                    }
                }
            }
        }
    }

    /// Runs precedence and resource propagation to a fixpoint. Returns
    /// false on a wipeout or a resource conflict among fixed operations.
    fn propagate(&self, dm: &DistanceMatrix, state: &mut SearchState) -> bool {
        let n = self.graph.len();
        let ii = dm.ii();
        loop {
            if state.domains.iter().any(Domain::is_empty) {
                return false;
            }
            let mut changed = false;

            // Precedence: cycle(j) >= cycle(i) + dist(i, j).
            for i in 0..n {
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let Some(d) = dm.get(OpId(i), OpId(j)) else {
                        continue;
                    };
                    if let Some(lo) = state.domains[i].min() {
                        changed |= state.domains[j].remove_below(lo + d);
                    }
                    if let Some(hi) = state.domains[j].max() {
                        changed |= state.domains[i].remove_above(hi - d);
                    }
                }
            }
            if state.domains.iter().any(Domain::is_empty) {
                return false;
            }

            // Replay the fixed operations into a fresh table; a conflict
            // among them is a dead branch.
            let mut table = ReservationTable::new(self.model, ii);
            for i in 0..n {
                if state.domains[i].is_fixed() {
                    let c = state.domains[i].min().expect("fixed domain is nonempty");
                    if !table.reserve(OpId(i), self.graph.op(OpId(i)).class, c) {
                        return false;
                    }
                }
            }

            // Filter unfixed domains against the committed rows.
            let free: Vec<Vec<bool>> = (0..self.model.class_count())
                .map(|c| {
                    (0..ii)
                        .map(|r| table.is_available(ClassId(c), r))
                        .collect()
                })
                .collect();
            for i in 0..n {
                if state.domains[i].is_fixed() {
                    continue;
                }
                let class = self.graph.op(OpId(i)).class;
                let blocked: Vec<i64> = state.domains[i]
                    .iter()
                    .filter(|&v| !free[class.index()][(v % ii) as usize])
                    .collect();
                for v in blocked {
                    state.domains[i].remove(v);
                    changed = true;
                }
            }
            if state.domains.iter().any(Domain::is_empty) {
                return false;
            }

            if !changed {
                return true;
            }
        }
    }

    /// Chooses the next branching decision, or `None` when every domain
    /// is fixed (a solution).
    fn decide(&self, dm: &DistanceMatrix, state: &SearchState) -> Option<Branch> {
        let op = match self.config.decision_strategy {
            DecisionStrategy::EarliestReadySmallestDomain | DecisionStrategy::ProjectedSplit => {
                self.pick_earliest(state, |_| true)
            }
            DecisionStrategy::Clustered => {
                let adjacent = |i: usize| {
                    (0..self.graph.len()).any(|j| {
                        state.domains[j].is_fixed()
                            && (dm.get(OpId(i), OpId(j)).is_some()
                                || dm.get(OpId(j), OpId(i)).is_some())
                    })
                };
                self.pick_earliest(state, adjacent)
                    .or_else(|| self.pick_earliest(state, |_| true))
            }
        }?;

        let d = &state.domains[op.index()];
        let lo = d.min().expect("nonempty after propagation");
        let hi = d.max().expect("nonempty after propagation");
        match self.config.decision_strategy {
            DecisionStrategy::ProjectedSplit => {
                let offset = (self.config.cluster_bias * (hi - lo) as f64).round() as i64;
                let bound = (lo + offset).clamp(lo, hi - 1);
                Some(Branch::SplitLe { op, bound })
            }
            _ => Some(Branch::Value { op, v: lo }),
        }
    }

    /// Unfixed operation with the smallest `(min, size, id)` key among
    /// those accepted by `admit`.
    fn pick_earliest(
        &self,
        state: &SearchState,
        admit: impl Fn(usize) -> bool,
    ) -> Option<OpId> {
        (0..self.graph.len())
            .filter(|&i| !state.domains[i].is_fixed() && admit(i))
            .min_by_key(|&i| {
                let d = &state.domains[i];
                (d.min().expect("nonempty after propagation"), d.size(), i)
            })
            .map(OpId)
    }
}

fn apply_commit(state: &mut SearchState, branch: Branch) {
    match branch {
        Branch::Value { op, v } => state.domains[op.index()].fix(v),
        Branch::SplitLe { op, bound } => {
            state.domains[op.index()].remove_above(bound);
        }
    }
}

fn apply_alternative(state: &mut SearchState, branch: Branch) {
    match branch {
        Branch::Value { op, v } => {
            state.domains[op.index()].remove(v);
        }
        Branch::SplitLe { op, bound } => {
            state.domains[op.index()].remove_below(bound + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operation, PrecedenceEdge};
    use crate::resources::ResourceSpec;

    fn alu_model() -> ResourceModel {
        ResourceModel::new(&[ResourceSpec::new("alu").with_units(&[0])]).unwrap()
    }

    fn op() -> Operation {
        Operation::new(ClassId(0), 1)
    }

    #[test]
    fn test_ring_solved_by_propagation_alone() {
        let graph = PrecedenceGraph::new(
            vec![op(), op(), op()],
            vec![
                PrecedenceEdge::data(0, 1, 1),
                PrecedenceEdge::data(1, 2, 1),
                PrecedenceEdge::carried(2, 0, 1, 1),
            ],
        )
        .unwrap();
        let model = alu_model();
        let config = SchedulerConfig::default();
        let dm = DistanceMatrix::build(&graph, 3).unwrap();

        let (outcome, stats) = CpScheduler::new(&graph, &model, &config).solve(&dm);
        assert_eq!(outcome, CpOutcome::Solution(vec![0, 1, 2]));
        // The tight recurrence leaves singleton domains at the root.
        assert_eq!(stats.decisions, 0);
        assert_eq!(stats.fails, 0);
    }

    #[test]
    fn test_independent_ops_share_one_unit() {
        let graph = PrecedenceGraph::new(vec![op(), op()], vec![]).unwrap();
        let model = alu_model();
        let config = SchedulerConfig::default();
        let dm = DistanceMatrix::build(&graph, 2).unwrap();

        let (outcome, stats) = CpScheduler::new(&graph, &model, &config).solve(&dm);
        assert_eq!(outcome, CpOutcome::Solution(vec![0, 1]));
        assert_eq!(stats.decisions, 1);
        assert_eq!(stats.fails, 0);
    }

    #[test]
    fn test_proves_infeasibility_at_root() {
        // II=1 leaves a single row for two operations of the same class.
        let graph = PrecedenceGraph::new(vec![op(), op()], vec![]).unwrap();
        let model = alu_model();
        let config = SchedulerConfig::default();
        let dm = DistanceMatrix::build(&graph, 1).unwrap();

        let (outcome, stats) = CpScheduler::new(&graph, &model, &config).solve(&dm);
        assert_eq!(outcome, CpOutcome::ProvedInfeasible);
        assert_eq!(stats.fails, 1);
    }

    #[test]
    fn test_proves_infeasibility_after_search() {
        // Three ops, one unit, two rows: every branch dies.
        let graph = PrecedenceGraph::new(vec![op(), op(), op()], vec![]).unwrap();
        let model = alu_model();
        let config = SchedulerConfig::default();
        let dm = DistanceMatrix::build(&graph, 2).unwrap();

        let (outcome, stats) = CpScheduler::new(&graph, &model, &config).solve(&dm);
        assert_eq!(outcome, CpOutcome::ProvedInfeasible);
        assert!(stats.fails >= 2);
        assert!(stats.decisions >= 1);
    }

    #[test]
    fn test_fail_limit_stops_search() {
        let graph = PrecedenceGraph::new(vec![op(), op(), op()], vec![]).unwrap();
        let model = alu_model();
        let config = SchedulerConfig::default().with_cp_fail_limit(1);
        let dm = DistanceMatrix::build(&graph, 2).unwrap();

        let (outcome, stats) = CpScheduler::new(&graph, &model, &config).solve(&dm);
        assert_eq!(outcome, CpOutcome::BudgetExhausted);
        assert_eq!(stats.fails, 1);
    }

    #[test]
    fn test_clustered_branching_solves() {
        let graph = PrecedenceGraph::new(
            vec![op(), op(), op()],
            vec![PrecedenceEdge::data(0, 1, 1)],
        )
        .unwrap();
        let model = alu_model();
        let config =
            SchedulerConfig::default().with_decision_strategy(DecisionStrategy::Clustered);
        let dm = DistanceMatrix::build(&graph, 3).unwrap();

        let (outcome, _) = CpScheduler::new(&graph, &model, &config).solve(&dm);
        let CpOutcome::Solution(cycles) = outcome else {
            panic!("expected a solution");
        };
        assert!(cycles[1] >= cycles[0] + 1);
        let mut rows: Vec<i64> = cycles.iter().map(|c| c.rem_euclid(3)).collect();
        rows.sort_unstable();
        rows.dedup();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_projected_split_branching_solves() {
        let graph = PrecedenceGraph::new(vec![op(), op()], vec![]).unwrap();
        let model = alu_model();
        let config =
            SchedulerConfig::default().with_decision_strategy(DecisionStrategy::ProjectedSplit);
        let dm = DistanceMatrix::build(&graph, 2).unwrap();

        let (outcome, _) = CpScheduler::new(&graph, &model, &config).solve(&dm);
        assert_eq!(outcome, CpOutcome::Solution(vec![0, 1]));
    }

    #[test]
    fn test_deterministic_across_runs() {
        let graph = PrecedenceGraph::new(
            vec![op(), op(), op(), op()],
            vec![
                PrecedenceEdge::data(0, 2, 1),
                PrecedenceEdge::data(1, 3, 2),
            ],
        )
        .unwrap();
        let model = alu_model();
        let config = SchedulerConfig::default();
        let dm = DistanceMatrix::build(&graph, 4).unwrap();

        let scheduler = CpScheduler::new(&graph, &model, &config);
        let (a, sa) = scheduler.solve(&dm);
        let (b, sb) = scheduler.solve(&dm);
        assert_eq!(a, b);
        assert_eq!(sa, sb);
    }
}
