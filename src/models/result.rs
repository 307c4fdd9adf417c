//! Schedule result model.
//!
//! The solution of one successful search: for every operation a physical
//! issue cycle and the derived pipeline stage, plus the global II.
//! Immutable once returned; consumed by prologue/kernel/epilogue emission
//! and by register allocation (which needs per-stage lifetimes).

use serde::{Deserialize, Serialize};

use super::OpId;
use crate::config::StrategyKind;

/// Placement of a single operation in the pipelined schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    /// The placed operation.
    pub op: OpId,
    /// Physical issue cycle in the flat schedule.
    pub cycle: i64,
    /// Pipeline stage: `cycle / II`.
    pub stage: i64,
    /// Issue cycle within the kernel: `cycle % II`.
    pub kernel_cycle: i64,
}

/// A complete modulo schedule at a fixed II.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResult {
    ii: i64,
    schedule_length: i64,
    strategy: StrategyKind,
    assignments: Vec<SlotAssignment>,
}

impl ScheduleResult {
    /// Builds a result from per-operation cycles (indexed by `OpId`).
    ///
    /// # Panics
    /// Panics if any cycle is negative; placements are physical cycles in
    /// `[0, schedule_length)`.
    pub fn new(ii: i64, schedule_length: i64, strategy: StrategyKind, cycles: &[i64]) -> Self {
        assert!(ii > 0, "II must be positive");
        let assignments = cycles
            .iter()
            .enumerate()
            .map(|(i, &cycle)| {
                assert!(cycle >= 0, "negative cycle for op{i}");
                SlotAssignment {
                    op: OpId(i),
                    cycle,
                    stage: cycle / ii,
                    kernel_cycle: cycle % ii,
                }
            })
            .collect();
        Self {
            ii,
            schedule_length,
            strategy,
            assignments,
        }
    }

    /// The initiation interval of this schedule.
    #[inline]
    pub fn ii(&self) -> i64 {
        self.ii
    }

    /// Flat schedule length the search assumed.
    #[inline]
    pub fn schedule_length(&self) -> i64 {
        self.schedule_length
    }

    /// Which strategy found this schedule.
    #[inline]
    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    /// Number of scheduled operations.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Whether the schedule is empty.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Placement of one operation.
    pub fn assignment(&self, op: OpId) -> &SlotAssignment {
        &self.assignments[op.index()]
    }

    /// Issue cycle of one operation.
    pub fn cycle(&self, op: OpId) -> i64 {
        self.assignments[op.index()].cycle
    }

    /// Pipeline stage of one operation.
    pub fn stage(&self, op: OpId) -> i64 {
        self.assignments[op.index()].stage
    }

    /// All placements.
    pub fn assignments(&self) -> &[SlotAssignment] {
        &self.assignments
    }

    /// Number of pipeline stages (`max(stage) + 1`); determines
    /// prologue/epilogue size.
    pub fn stage_count(&self) -> i64 {
        self.assignments
            .iter()
            .map(|a| a.stage)
            .max()
            .map_or(0, |s| s + 1)
    }

    /// Operations issued at a given kernel cycle, in `OpId` order.
    pub fn ops_at_kernel_cycle(&self, kernel_cycle: i64) -> Vec<OpId> {
        self.assignments
            .iter()
            .filter(|a| a.kernel_cycle == kernel_cycle)
            .map(|a| a.op)
            .collect()
    }
}
