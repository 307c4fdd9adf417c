//! Heuristic list scheduler with ejection.
//!
//! Iterative modulo scheduling in the style of Rau's "Iterative Modulo
//! Scheduling" (HPL-94-115): pick the highest-priority unscheduled
//! operation, scan at most one II of its slack window for a free row,
//! and when no row fits, force a placement and eject whatever it
//! displaces. Ejected operations return to the pool with their windows
//! rebuilt from the survivors.
//!
//! Termination comes from the per-operation retry budget: every loop
//! iteration places exactly one operation and charges its counter, so a
//! counter passing the budget aborts the attempt with
//! [`ScheduleError::SearchBudgetExhausted`] and the driver moves on.
//!
//! # Example
//! ```
//! use modsched::config::SchedulerConfig;
//! use modsched::graph::{DistanceMatrix, PrecedenceGraph};
//! use modsched::heuristic::ListScheduler;
//! use modsched::models::{Operation, PrecedenceEdge};
//! use modsched::resources::{ResourceModel, ResourceSpec};
//!
//! let graph = PrecedenceGraph::new(
//!     vec![
//!         Operation::new(modsched::resources::ClassId(0), 1),
//!         Operation::new(modsched::resources::ClassId(0), 1),
//!     ],
//!     vec![PrecedenceEdge::data(0, 1, 1)],
//! )
//! .unwrap();
//! let model = ResourceModel::new(&[ResourceSpec::new("alu").with_units(&[0])]).unwrap();
//! let config = SchedulerConfig::default();
//!
//! let dm = DistanceMatrix::build(&graph, 2).unwrap();
//! let solution = ListScheduler::new(&graph, &model, &config).solve(&dm).unwrap();
//! assert_eq!(solution.cycles, vec![0, 1]);
//! ```

mod policies;

pub use policies::{
    PolicyContext, PolicyScore, PriorityPolicy, ProjectedCycle, ResourceMerit, SlackDriven,
};

use tracing::{debug, trace};

use crate::config::{PolicyKind, SchedulerConfig};
use crate::error::ScheduleError;
use crate::graph::{DistanceMatrix, PrecedenceGraph, SlackWindows};
use crate::models::OpId;
use crate::resources::{ReservationTable, ResourceModel};

/// Score difference below which two candidates are considered tied.
const SCORE_EPSILON: f64 = 1e-9;

/// Successful outcome of one heuristic attempt.
#[derive(Debug, Clone)]
pub struct HeuristicSchedule {
    /// Issue cycle per operation, indexed by [`OpId`].
    pub cycles: Vec<i64>,
    /// Number of ejections performed along the way.
    pub ejections: u32,
}

/// Failed heuristic attempt: the terminal error plus the work performed
/// before giving up, kept for the attempt history.
#[derive(Debug, Clone)]
pub struct HeuristicFailure {
    /// Why the attempt stopped.
    pub error: ScheduleError,
    /// Number of ejections performed before the budget ran out.
    pub ejections: u32,
}

/// One heuristic scheduling attempt at a fixed II.
#[derive(Debug)]
pub struct ListScheduler<'a> {
    graph: &'a PrecedenceGraph,
    model: &'a ResourceModel,
    config: &'a SchedulerConfig,
    policy: Box<dyn PriorityPolicy>,
}

impl<'a> ListScheduler<'a> {
    /// Builds a scheduler using the policy named in the configuration.
    pub fn new(
        graph: &'a PrecedenceGraph,
        model: &'a ResourceModel,
        config: &'a SchedulerConfig,
    ) -> Self {
        let policy: Box<dyn PriorityPolicy> = match config.policy {
            PolicyKind::SlackDriven => Box::new(SlackDriven),
            PolicyKind::ResourceMerit => Box::new(ResourceMerit),
            PolicyKind::ProjectedCycle => Box::new(ProjectedCycle),
        };
        Self {
            graph,
            model,
            config,
            policy,
        }
    }

    /// Overrides the candidate-selection policy.
    pub fn with_policy(mut self, policy: Box<dyn PriorityPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Runs the attempt against the distance matrix of one candidate II.
    pub fn solve(&self, dm: &DistanceMatrix) -> Result<HeuristicSchedule, HeuristicFailure> {
        let ii = dm.ii();
        let n = self.graph.len();
        let length = self.graph.schedule_length(ii);
        let pressure = self.class_pressure();

        let mut windows = SlackWindows::new(dm, length);
        let mut table = ReservationTable::new(self.model, ii);
        let mut cycles: Vec<Option<i64>> = vec![None; n];
        let mut last_cycle: Vec<Option<i64>> = vec![None; n];
        let mut tries = vec![0u32; n];
        let mut ejections = 0u32;
        let mut unscheduled = n;

        debug!(ii, length, policy = self.policy.name(), "heuristic attempt");

        while unscheduled > 0 {
            let ctx = PolicyContext {
                graph: self.graph,
                windows: &windows,
                class_pressure: &pressure,
                projected_bias: self.config.projected_bias,
            };
            let op = self.select(&ctx, &cycles);
            let (earliest, latest) = windows.window(op);
            let class = self.graph.op(op).class;

            // Scan at most one kernel of the window, starting at the
            // policy's preferred cycle and wrapping to the window start.
            let capped = latest.min(earliest + ii - 1);
            let target = self
                .policy
                .target_cycle(op, &ctx)
                .clamp(earliest, capped.max(earliest));
            let found = table
                .find_in_range(class, target, capped, true)
                .or_else(|| table.find_in_range(class, earliest, target - 1, true));
            let cycle = match found {
                Some(c) => c,
                None => self.force(
                    dm, op, earliest, &mut table, &mut cycles, &last_cycle, &tries,
                    &mut unscheduled, &mut ejections,
                ),
            };

            let reserved = table.reserve(op, class, cycle);
            assert!(reserved, "forced row must have room after ejection");
            cycles[op.index()] = Some(cycle);
            last_cycle[op.index()] = Some(cycle);
            tries[op.index()] += 1;
            unscheduled -= 1;
            trace!(%op, cycle, tries = tries[op.index()], "placed");

            if tries[op.index()] > self.config.retry_budget {
                debug!(%op, ii, ejections, "retry budget exhausted");
                return Err(HeuristicFailure {
                    error: ScheduleError::SearchBudgetExhausted {
                        ii,
                        detail: format!(
                            "{op} placed {} times (budget {})",
                            tries[op.index()],
                            self.config.retry_budget
                        ),
                    },
                    ejections,
                });
            }

            // Rebuild windows from the surviving placements.
            windows = SlackWindows::new(dm, length);
            for (j, c) in cycles.iter().enumerate() {
                if let Some(c) = *c {
                    windows.tighten(dm, OpId(j), c);
                }
            }
        }

        let cycles = cycles
            .into_iter()
            .map(|c| c.expect("all operations placed"))
            .collect();
        debug!(ii, ejections, "heuristic attempt succeeded");
        Ok(HeuristicSchedule { cycles, ejections })
    }

    /// Population over per-cycle capacity, per resource class.
    fn class_pressure(&self) -> Vec<f64> {
        let mut population = vec![0usize; self.model.class_count()];
        for op in self.graph.ops() {
            population[op.class.index()] += 1;
        }
        population
            .iter()
            .enumerate()
            .map(|(c, &pop)| {
                pop as f64 / self.model.class_capacity(crate::resources::ClassId(c)) as f64
            })
            .collect()
    }

    /// Highest-priority unscheduled operation. Ties fall to the smaller
    /// window, then the higher degree, then the lower handle.
    fn select(&self, ctx: &PolicyContext<'_>, cycles: &[Option<i64>]) -> OpId {
        let mut best: Option<(OpId, f64, i64, usize)> = None;
        for i in 0..cycles.len() {
            if cycles[i].is_some() {
                continue;
            }
            let op = OpId(i);
            let score = self.policy.evaluate(op, ctx);
            let width = ctx.windows.width(op);
            let degree = self.graph.degree(op);
            let better = match best {
                None => true,
                Some((_, bs, bw, bd)) => {
                    if (score - bs).abs() > SCORE_EPSILON {
                        score < bs
                    } else if width != bw {
                        width < bw
                    } else {
                        degree > bd
                    }
                }
            };
            if better {
                best = Some((op, score, width, degree));
            }
        }
        best.map(|(op, ..)| op)
            .unwrap_or_else(|| unreachable!("select called with an empty pool"))
    }

    /// Forces a placement for `op` when its window held no free row,
    /// ejecting precedence violators and row occupants that block it.
    /// Returns the forced cycle; the row is guaranteed free afterwards.
    /// The caller rebuilds the slack windows after placing `op`.
    #[allow(clippy::too_many_arguments)]
    fn force(
        &self,
        dm: &DistanceMatrix,
        op: OpId,
        earliest: i64,
        table: &mut ReservationTable<'_>,
        cycles: &mut [Option<i64>],
        last_cycle: &[Option<i64>],
        tries: &[u32],
        unscheduled: &mut usize,
        ejections: &mut u32,
    ) -> i64 {
        // One past the previous home, wrapping back to the window start
        // once the probe drifts a full kernel away.
        let mut forced = match last_cycle[op.index()] {
            Some(prev) => earliest.max(prev + 1),
            None => earliest,
        };
        if forced > earliest + dm.ii() - 1 {
            forced = earliest;
        }
        trace!(%op, forced, "forcing placement");

        let eject = |j: OpId,
                     table: &mut ReservationTable<'_>,
                     cycles: &mut [Option<i64>],
                     unscheduled: &mut usize,
                     ejections: &mut u32| {
            let c = cycles[j.index()].take().expect("ejecting a scheduled op");
            table.unreserve(j, c);
            *unscheduled += 1;
            *ejections += 1;
            trace!(op = %j, cycle = c, "ejected");
        };

        // Scheduled operations whose constraint against the forced cycle
        // no longer holds must go back to the pool.
        for j in 0..cycles.len() {
            let Some(cj) = cycles[j] else { continue };
            let j = OpId(j);
            let forward = dm.get(op, j).is_some_and(|d| cj < forced + d);
            let backward = dm.get(j, op).is_some_and(|d| forced < cj + d);
            if forward || backward {
                eject(j, table, cycles, unscheduled, ejections);
            }
        }

        // Free the row itself, cheapest occupant first. An empty row
        // accepts any known class, so this loop always terminates.
        let class = self.graph.op(op).class;
        while !table.is_available(class, forced) {
            let victim = table
                .occupants(forced)
                .iter()
                .map(|&(o, _)| o)
                .min_by_key(|o| (tries[o.index()], o.index()))
                .unwrap_or_else(|| unreachable!("unavailable row with no occupants"));
            eject(victim, table, cycles, unscheduled, ejections);
        }

        forced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operation, PrecedenceEdge};
    use crate::resources::{ClassId, ResourceSpec};

    fn alu_model() -> ResourceModel {
        ResourceModel::new(&[ResourceSpec::new("alu").with_units(&[0])]).unwrap()
    }

    fn op() -> Operation {
        Operation::new(ClassId(0), 1)
    }

    #[test]
    fn test_ring_schedules_at_rec_mii() {
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

        let s = ListScheduler::new(&graph, &model, &config)
            .solve(&dm)
            .unwrap();
        assert_eq!(s.cycles, vec![0, 1, 2]);
        assert_eq!(s.ejections, 0);
    }

    #[test]
    fn test_independent_ops_share_one_unit() {
        let graph = PrecedenceGraph::new(vec![op(), op()], vec![]).unwrap();
        let model = alu_model();
        let config = SchedulerConfig::default();
        let dm = DistanceMatrix::build(&graph, 2).unwrap();

        let s = ListScheduler::new(&graph, &model, &config)
            .solve(&dm)
            .unwrap();
        assert_eq!(s.cycles, vec![0, 1]);
    }

    #[test]
    fn test_ejection_recovers_from_bad_greedy_order() {
        // Two producers feed a join on a single unit. The join is placed
        // first (highest degree), pinning both producers onto the same
        // row; ejection shuffles them apart.
        let graph = PrecedenceGraph::new(
            vec![op(), op(), op()],
            vec![
                PrecedenceEdge::data(0, 2, 1),
                PrecedenceEdge::data(1, 2, 1),
            ],
        )
        .unwrap();
        let model = alu_model();
        let config = SchedulerConfig::default();
        let dm = DistanceMatrix::build(&graph, 3).unwrap();

        let s = ListScheduler::new(&graph, &model, &config)
            .solve(&dm)
            .unwrap();
        assert_eq!(s.cycles, vec![1, 0, 2]);
        assert_eq!(s.ejections, 2);

        // Precedence holds and the rows are distinct.
        assert!(s.cycles[2] >= s.cycles[0] + 1);
        assert!(s.cycles[2] >= s.cycles[1] + 1);
        let rows: Vec<i64> = s.cycles.iter().map(|c| c.rem_euclid(3)).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[0] != rows[1] && rows[1] != rows[2] && rows[0] != rows[2]);
    }

    #[test]
    fn test_budget_exhaustion_on_overcommitted_row() {
        // Two independent ops, one unit, II=1: only one row exists, so
        // every placement ejects the other op until the budget runs out.
        let graph = PrecedenceGraph::new(vec![op(), op()], vec![]).unwrap();
        let model = alu_model();
        let config = SchedulerConfig::default();
        let dm = DistanceMatrix::build(&graph, 1).unwrap();

        let failure = ListScheduler::new(&graph, &model, &config)
            .solve(&dm)
            .unwrap_err();
        assert!(matches!(
            failure.error,
            ScheduleError::SearchBudgetExhausted { ii: 1, .. }
        ));
        // The work done before giving up stays visible for diagnostics.
        assert!(failure.ejections > 0);
    }

    #[test]
    fn test_projected_target_shifts_placement() {
        // A lone op with a wide window: the projected policy starts the
        // scan one cycle into the window instead of at the front.
        let graph = PrecedenceGraph::new(vec![op()], vec![]).unwrap();
        let model = alu_model();
        let config = SchedulerConfig::default();
        let dm = DistanceMatrix::build(&graph, 4).unwrap();

        let s = ListScheduler::new(&graph, &model, &config)
            .with_policy(Box::new(ProjectedCycle))
            .solve(&dm)
            .unwrap();
        assert_eq!(s.cycles, vec![1]);
    }

    #[test]
    fn test_policy_override() {
        let graph = PrecedenceGraph::new(vec![op(), op()], vec![]).unwrap();
        let model = alu_model();
        let config = SchedulerConfig::default();
        let dm = DistanceMatrix::build(&graph, 2).unwrap();

        let s = ListScheduler::new(&graph, &model, &config)
            .with_policy(Box::new(ProjectedCycle))
            .solve(&dm)
            .unwrap();
        assert_eq!(s.cycles.len(), 2);
        assert_ne!(
            s.cycles[0].rem_euclid(2),
            s.cycles[1].rem_euclid(2)
        );
    }
}
