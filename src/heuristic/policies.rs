//! Candidate-selection policies for the list scheduler.
//!
//! # Score Convention
//! All policies return lower scores for operations that should be
//! scheduled first. Ties are broken by the engine (smaller window, then
//! higher degree, then lower handle).

use std::fmt::Debug;

use crate::graph::{PrecedenceGraph, SlackWindows};
use crate::models::OpId;

/// Score returned by a priority policy. Lower = scheduled first.
pub type PolicyScore = f64;

/// Snapshot of the search state a policy may consult.
#[derive(Debug)]
pub struct PolicyContext<'a> {
    /// The (immutable) precedence graph.
    pub graph: &'a PrecedenceGraph,
    /// Current slack windows.
    pub windows: &'a SlackWindows,
    /// Per resource class: population / per-cycle capacity.
    pub class_pressure: &'a [f64],
    /// Projected-cycle bias constant from the configuration.
    pub projected_bias: f64,
}

/// A candidate-selection policy.
///
/// # Score Convention
/// **Lower score = higher priority.** The most constrained operation
/// should receive the smallest score.
pub trait PriorityPolicy: Debug {
    /// Policy name for logs.
    fn name(&self) -> &'static str;

    /// Evaluates an unscheduled operation; lower = scheduled first.
    fn evaluate(&self, op: OpId, ctx: &PolicyContext<'_>) -> PolicyScore;

    /// Preferred scan start for `op` within its window. The engine scans
    /// from here to the window cap and wraps back to the window start.
    /// Defaults to the earliest cycle.
    fn target_cycle(&self, op: OpId, ctx: &PolicyContext<'_>) -> i64 {
        ctx.windows.earliest(op)
    }

    /// Policy description.
    fn description(&self) -> &'static str {
        self.name()
    }
}

/// Most constrained first: smallest slack window.
///
/// The classic modulo-scheduling ordering: operations whose feasible
/// range is almost gone must be placed before the range disappears.
#[derive(Debug, Clone, Copy)]
pub struct SlackDriven;

impl PriorityPolicy for SlackDriven {
    fn name(&self) -> &'static str {
        "SLACK"
    }

    fn evaluate(&self, op: OpId, ctx: &PolicyContext<'_>) -> PolicyScore {
        ctx.windows.width(op) as f64
    }

    fn description(&self) -> &'static str {
        "Smallest slack window first"
    }
}

/// Scarce resources first.
///
/// Operations competing for the most oversubscribed resource class are
/// placed before ops with slack in their class, so the tight rows of the
/// reservation table fill while windows are still wide.
#[derive(Debug, Clone, Copy)]
pub struct ResourceMerit;

impl PriorityPolicy for ResourceMerit {
    fn name(&self) -> &'static str {
        "MERIT"
    }

    fn evaluate(&self, op: OpId, ctx: &PolicyContext<'_>) -> PolicyScore {
        -ctx.class_pressure[ctx.graph.op(op).class.index()]
    }

    fn description(&self) -> &'static str {
        "Most contended resource class first"
    }
}

/// Smallest projected issue cycle first.
///
/// Projects each operation a configured fraction into its window and
/// schedules in projected order, approximating a top-down level walk.
#[derive(Debug, Clone, Copy)]
pub struct ProjectedCycle;

impl PriorityPolicy for ProjectedCycle {
    fn name(&self) -> &'static str {
        "PROJECTED"
    }

    fn evaluate(&self, op: OpId, ctx: &PolicyContext<'_>) -> PolicyScore {
        let earliest = ctx.windows.earliest(op) as f64;
        let span = (ctx.windows.width(op) - 1).max(0) as f64;
        earliest + ctx.projected_bias * span
    }

    fn target_cycle(&self, op: OpId, ctx: &PolicyContext<'_>) -> i64 {
        let span = (ctx.windows.width(op) - 1).max(0) as f64;
        ctx.windows.earliest(op) + (ctx.projected_bias * span).round() as i64
    }

    fn description(&self) -> &'static str {
        "Smallest projected issue cycle first"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DistanceMatrix, PrecedenceGraph};
    use crate::models::{Operation, PrecedenceEdge};
    use crate::resources::ClassId;

    fn chain() -> PrecedenceGraph {
        PrecedenceGraph::new(
            vec![
                Operation::new(ClassId(0), 1),
                Operation::new(ClassId(0), 1),
                Operation::new(ClassId(1), 1),
            ],
            vec![
                PrecedenceEdge::data(0, 1, 1),
                PrecedenceEdge::data(1, 2, 1),
            ],
        )
        .unwrap()
    }

    fn ctx<'a>(
        graph: &'a PrecedenceGraph,
        windows: &'a SlackWindows,
        pressure: &'a [f64],
    ) -> PolicyContext<'a> {
        PolicyContext {
            graph,
            windows,
            class_pressure: pressure,
            projected_bias: 0.19,
        }
    }

    #[test]
    fn test_slack_driven_prefers_narrow_window() {
        // Fork with unequal latencies: the latency-3 edge squeezes op1
        // into [3, 5] while op2 keeps [1, 5].
        let g = PrecedenceGraph::new(
            vec![
                Operation::new(ClassId(0), 1),
                Operation::new(ClassId(0), 1),
                Operation::new(ClassId(1), 1),
            ],
            vec![
                PrecedenceEdge::data(0, 1, 3),
                PrecedenceEdge::data(0, 2, 1),
            ],
        )
        .unwrap();
        let dm = DistanceMatrix::build(&g, 4).unwrap();
        let w = SlackWindows::new(&dm, 6);
        assert_eq!(w.window(OpId(1)), (3, 5));
        assert_eq!(w.window(OpId(2)), (1, 5));
        let pressure = [1.0, 1.0];
        let c = ctx(&g, &w, &pressure);
        assert!(SlackDriven.evaluate(OpId(1), &c) < SlackDriven.evaluate(OpId(2), &c));
    }

    #[test]
    fn test_resource_merit_prefers_contended_class() {
        let g = chain();
        let dm = DistanceMatrix::build(&g, 4).unwrap();
        let w = SlackWindows::new(&dm, 8);
        // Class 0 holds two ops on one slot, class 1 one op.
        let pressure = [2.0, 1.0];
        let c = ctx(&g, &w, &pressure);
        assert!(ResourceMerit.evaluate(OpId(0), &c) < ResourceMerit.evaluate(OpId(2), &c));
    }

    #[test]
    fn test_projected_cycle_orders_by_level() {
        let g = chain();
        let dm = DistanceMatrix::build(&g, 4).unwrap();
        let w = SlackWindows::new(&dm, 8);
        let pressure = [1.0, 1.0];
        let c = ctx(&g, &w, &pressure);
        let s0 = ProjectedCycle.evaluate(OpId(0), &c);
        let s1 = ProjectedCycle.evaluate(OpId(1), &c);
        let s2 = ProjectedCycle.evaluate(OpId(2), &c);
        assert!(s0 < s1 && s1 < s2);
    }

    #[test]
    fn test_target_cycle() {
        let g = chain();
        let dm = DistanceMatrix::build(&g, 4).unwrap();
        let w = SlackWindows::new(&dm, 8);
        let pressure = [1.0, 1.0];
        let c = ctx(&g, &w, &pressure);
        // Default target is the window start.
        assert_eq!(SlackDriven.target_cycle(OpId(0), &c), 0);
        // Projection pushes into the window: 0.19 * 5 rounds to 1.
        assert_eq!(ProjectedCycle.target_cycle(OpId(0), &c), 1);
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(SlackDriven.name(), "SLACK");
        assert_eq!(ResourceMerit.name(), "MERIT");
        assert_eq!(ProjectedCycle.name(), "PROJECTED");
        assert_eq!(SlackDriven.description(), "Smallest slack window first");
    }
}
