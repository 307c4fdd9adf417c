//! Top-level II search loop.
//!
//! Computes the lower bound `max(ResMII, RecMII)`, then walks candidate
//! IIs upward, running the configured strategies at each one. The first
//! schedule found is verified and returned; running out of IIs yields a
//! [`PipelineFailure`] carrying the full attempt history, which the
//! caller treats as "leave this loop unpipelined".
//!
//! A lower bound above the II ceiling fails immediately, with no search
//! and an empty history.
//!
//! # Example
//! ```
//! use modsched::config::SchedulerConfig;
//! use modsched::driver::Pipeliner;
//! use modsched::graph::PrecedenceGraph;
//! use modsched::models::{Operation, PrecedenceEdge};
//! use modsched::resources::{ClassId, ResourceModel, ResourceSpec};
//!
//! let graph = PrecedenceGraph::new(
//!     vec![
//!         Operation::new(ClassId(0), 1),
//!         Operation::new(ClassId(0), 1),
//!         Operation::new(ClassId(0), 1),
//!     ],
//!     vec![
//!         PrecedenceEdge::data(0, 1, 1),
//!         PrecedenceEdge::data(1, 2, 1),
//!         PrecedenceEdge::carried(2, 0, 1, 1),
//!     ],
//! )
//! .unwrap();
//! let model = ResourceModel::new(&[ResourceSpec::new("alu").with_units(&[0])]).unwrap();
//!
//! let result = Pipeliner::new(SchedulerConfig::default())
//!     .schedule(&graph, &model)
//!     .unwrap();
//! assert_eq!(result.ii(), 3);
//! ```

use tracing::{debug, info};

use crate::config::{SchedulerConfig, StrategyKind};
use crate::cp::{CpOutcome, CpScheduler};
use crate::error::{AttemptOutcome, AttemptRecord, PipelineFailure, ScheduleError};
use crate::graph::{DistanceMatrix, PrecedenceGraph};
use crate::heuristic::ListScheduler;
use crate::models::ScheduleResult;
use crate::resources::ResourceModel;
use crate::validation;

/// The modulo scheduler entry point.
#[derive(Debug, Clone)]
pub struct Pipeliner {
    config: SchedulerConfig,
}

impl Pipeliner {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Searches for the smallest feasible II and returns its schedule.
    ///
    /// Every returned schedule has been re-verified against the raw
    /// edges and the resource automaton; a verification failure is an
    /// engine defect and panics.
    pub fn schedule(
        &self,
        graph: &PrecedenceGraph,
        model: &ResourceModel,
    ) -> Result<ScheduleResult, PipelineFailure> {
        model
            .check_classes(graph.ops())
            .map_err(PipelineFailure::new)?;

        let res_mii = model.res_mii(graph.ops());
        let rec_mii = graph.rec_mii();
        let min_ii = res_mii.max(rec_mii);
        info!(res_mii, rec_mii, min_ii, max_ii = self.config.max_ii, "II search");

        if min_ii > self.config.max_ii {
            info!(min_ii, "lower bound exceeds II ceiling, not pipelining");
            return Err(PipelineFailure::new(ScheduleError::GlobalInfeasible {
                min_ii,
                max_ii: self.config.max_ii,
            }));
        }

        let strategies = self.config.strategy_order.sequence();
        let mut attempts = Vec::new();

        for ii in min_ii..=self.config.max_ii {
            let dm = match DistanceMatrix::build(graph, ii) {
                Ok(dm) => dm,
                Err(_) => {
                    // Cannot happen for ii >= RecMII; recorded, not hidden.
                    attempts.push(AttemptRecord {
                        ii,
                        strategy: strategies[0],
                        outcome: AttemptOutcome::RecurrenceInfeasible,
                        ejections: 0,
                        fails: 0,
                    });
                    continue;
                }
            };

            for &strategy in strategies {
                match self.attempt(graph, model, &dm, strategy, &mut attempts) {
                    AttemptControl::Done(cycles) => {
                        let result = ScheduleResult::new(
                            ii,
                            graph.schedule_length(ii),
                            strategy,
                            &cycles,
                        );
                        if let Err(errors) = validation::verify(graph, model, &result) {
                            panic!("schedule failed verification at II={ii}: {errors:?}");
                        }
                        info!(ii, ?strategy, stages = result.stage_count(), "scheduled");
                        return Ok(result);
                    }
                    AttemptControl::NextStrategy => {}
                    AttemptControl::NextIi => break,
                }
            }
        }

        Err(PipelineFailure::with_attempts(
            ScheduleError::GlobalInfeasible {
                min_ii,
                max_ii: self.config.max_ii,
            },
            attempts,
        ))
    }

    fn attempt(
        &self,
        graph: &PrecedenceGraph,
        model: &ResourceModel,
        dm: &DistanceMatrix,
        strategy: StrategyKind,
        attempts: &mut Vec<AttemptRecord>,
    ) -> AttemptControl {
        let ii = dm.ii();
        match strategy {
            StrategyKind::Heuristic => {
                match ListScheduler::new(graph, model, &self.config).solve(dm) {
                    Ok(s) => {
                        attempts.push(AttemptRecord {
                            ii,
                            strategy,
                            outcome: AttemptOutcome::Feasible,
                            ejections: s.ejections,
                            fails: 0,
                        });
                        AttemptControl::Done(s.cycles)
                    }
                    Err(failure) => {
                        debug!(ii, error = %failure.error, "heuristic attempt failed");
                        attempts.push(AttemptRecord {
                            ii,
                            strategy,
                            outcome: AttemptOutcome::BudgetExhausted,
                            ejections: failure.ejections,
                            fails: 0,
                        });
                        AttemptControl::NextStrategy
                    }
                }
            }
            StrategyKind::ConstraintPropagation => {
                let (outcome, stats) = CpScheduler::new(graph, model, &self.config).solve(dm);
                match outcome {
                    CpOutcome::Solution(cycles) => {
                        attempts.push(AttemptRecord {
                            ii,
                            strategy,
                            outcome: AttemptOutcome::Feasible,
                            ejections: 0,
                            fails: stats.fails,
                        });
                        AttemptControl::Done(cycles)
                    }
                    CpOutcome::ProvedInfeasible => {
                        debug!(ii, fails = stats.fails, "no schedule exists at this II");
                        attempts.push(AttemptRecord {
                            ii,
                            strategy,
                            outcome: AttemptOutcome::ProvedInfeasible,
                            ejections: 0,
                            fails: stats.fails,
                        });
                        // A proof covers every strategy at this II.
                        AttemptControl::NextIi
                    }
                    CpOutcome::BudgetExhausted => {
                        debug!(ii, fails = stats.fails, "cp attempt gave up");
                        attempts.push(AttemptRecord {
                            ii,
                            strategy,
                            outcome: AttemptOutcome::BudgetExhausted,
                            ejections: 0,
                            fails: stats.fails,
                        });
                        AttemptControl::NextStrategy
                    }
                }
            }
        }
    }
}

enum AttemptControl {
    Done(Vec<i64>),
    NextStrategy,
    NextIi,
}
