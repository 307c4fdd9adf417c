//! Error taxonomy and structured failure reporting.
//!
//! Scheduling failures fall into four categories with different scopes:
//!
//! - [`ScheduleError::RecurrenceInfeasible`]: a dependence cycle cannot be
//!   satisfied at the current II; the driver raises II and retries.
//! - Resource conflicts are transient and handled locally by ejection or
//!   backtracking; they surface as [`ScheduleError::SearchBudgetExhausted`]
//!   only once a retry or fail budget runs out, abandoning the current II.
//! - [`ScheduleError::GlobalInfeasible`]: II exceeded the configured
//!   maximum and the loop is not pipelined at all. This is a recoverable
//!   outcome for the caller (the loop falls back to unpipelined code),
//!   never a process-fatal error.
//! - Configuration errors ([`ScheduleError::UnknownResourceClass`],
//!   [`ScheduleError::MalformedGraph`], [`ScheduleError::InvalidResourceSpec`])
//!   are fatal to the whole scheduling attempt: the inputs are broken.
//!
//! Internal invariant violations (a "legal" automaton state becoming
//! inconsistent, a verified schedule failing verification) are defects and
//! fail loudly via assertions rather than producing an invalid schedule.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::StrategyKind;

/// Scheduling error classification.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ScheduleError {
    /// A dependence cycle cannot be satisfied at this II.
    #[error("recurrence infeasible at II={ii}")]
    RecurrenceInfeasible {
        /// The II that was attempted.
        ii: i64,
    },

    /// The retry or fail budget for this II ran out.
    #[error("search budget exhausted at II={ii}: {detail}")]
    SearchBudgetExhausted {
        /// The II that was attempted.
        ii: i64,
        /// What ran out (operation retry budget or propagation fail limit).
        detail: String,
    },

    /// No feasible II within the configured maximum.
    #[error("no feasible schedule with II <= {max_ii} (lower bound {min_ii})")]
    GlobalInfeasible {
        /// Lower bound `max(ResMII, RecMII)` computed from the inputs.
        min_ii: i64,
        /// Configured II ceiling.
        max_ii: i64,
    },

    /// An operation references a resource class the automaton does not know.
    #[error("unknown resource class: {0}")]
    UnknownResourceClass(String),

    /// The precedence graph is structurally invalid.
    #[error("malformed precedence graph: {0}")]
    MalformedGraph(String),

    /// The resource specification cannot be turned into an automaton.
    #[error("invalid resource specification: {0}")]
    InvalidResourceSpec(String),
}

/// Outcome of one (II, strategy) attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    /// A schedule was found.
    Feasible,
    /// The distance matrix had a positive-weight cycle at this II.
    RecurrenceInfeasible,
    /// The strategy gave up within its budget.
    BudgetExhausted,
    /// The constraint engine exhausted the search space: no schedule
    /// exists at this II (within the attempted schedule length).
    ProvedInfeasible,
}

/// Record of one scheduling attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Candidate initiation interval.
    pub ii: i64,
    /// Which strategy ran.
    pub strategy: StrategyKind,
    /// How the attempt ended.
    pub outcome: AttemptOutcome,
    /// Ejections performed by the heuristic scheduler (0 for CP).
    pub ejections: u32,
    /// Propagation failures recorded by the CP engine (0 for heuristic).
    pub fails: u64,
}

/// Structured failure report returned when no II succeeds.
///
/// Carries the terminal error plus the full per-attempt history so the
/// caller can log why pipelining was abandoned. The engine itself performs
/// no I/O; this is the diagnostic payload.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{error}")]
pub struct PipelineFailure {
    /// Terminal error (usually [`ScheduleError::GlobalInfeasible`]).
    pub error: ScheduleError,
    /// Every (II, strategy) attempt made, in order.
    pub attempts: Vec<AttemptRecord>,
}

impl PipelineFailure {
    /// Creates a failure report with no attempt history.
    pub fn new(error: ScheduleError) -> Self {
        Self {
            error,
            attempts: Vec::new(),
        }
    }

    /// Creates a failure report with the given attempt history.
    pub fn with_attempts(error: ScheduleError, attempts: Vec<AttemptRecord>) -> Self {
        Self { error, attempts }
    }

    /// Largest II that was actually attempted, if any.
    pub fn last_attempted_ii(&self) -> Option<i64> {
        self.attempts.iter().map(|a| a.ii).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = ScheduleError::GlobalInfeasible {
            min_ii: 4,
            max_ii: 2,
        };
        assert_eq!(
            e.to_string(),
            "no feasible schedule with II <= 2 (lower bound 4)"
        );
    }

    #[test]
    fn test_failure_report_history() {
        let report = PipelineFailure::with_attempts(
            ScheduleError::GlobalInfeasible {
                min_ii: 2,
                max_ii: 3,
            },
            vec![
                AttemptRecord {
                    ii: 2,
                    strategy: StrategyKind::Heuristic,
                    outcome: AttemptOutcome::BudgetExhausted,
                    ejections: 9,
                    fails: 0,
                },
                AttemptRecord {
                    ii: 3,
                    strategy: StrategyKind::ConstraintPropagation,
                    outcome: AttemptOutcome::ProvedInfeasible,
                    ejections: 0,
                    fails: 17,
                },
            ],
        );
        assert_eq!(report.last_attempted_ii(), Some(3));
        assert_eq!(report.attempts.len(), 2);
    }

    #[test]
    fn test_empty_report() {
        let report = PipelineFailure::new(ScheduleError::MalformedGraph("empty".into()));
        assert_eq!(report.last_attempted_ii(), None);
    }

    #[test]
    fn test_report_serde_round_trip() {
        let report = PipelineFailure::new(ScheduleError::RecurrenceInfeasible { ii: 3 });
        let json = serde_json::to_string(&report).unwrap();
        let back: PipelineFailure = serde_json::from_str(&json).unwrap();
        assert_eq!(report, back);
    }
}
