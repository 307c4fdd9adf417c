//! Flattened distance matrix and slack windows for a candidate II.
//!
//! Substituting `latency - omega * II` for every edge turns the cyclic
//! precedence graph into an acyclic constraint system for that II, the
//! key modulo-scheduling transformation. The matrix holds, for every
//! ordered pair, the tightest constraint `cycle(j) >= cycle(i) +
//! dist(i, j)` implied by any path; unreachable pairs carry a
//! distinguished no-constraint value, never zero.
//!
//! A strictly positive diagonal entry after closure means some recurrence
//! cannot be met at this II ([`ScheduleError::RecurrenceInfeasible`]);
//! the driver responds by trying a larger II.

use crate::error::ScheduleError;
use crate::graph::PrecedenceGraph;
use crate::models::OpId;

/// Absence of any path constraint between a pair of operations.
const NO_PATH: i64 = i64::MIN;

/// Max-plus closure of the substituted edge weights.
fn closure(graph: &PrecedenceGraph, ii: i64) -> Vec<i64> {
    let n = graph.len();
    let mut dist = vec![NO_PATH; n * n];
    for e in graph.edges() {
        let cell = &mut dist[e.src.index() * n + e.dst.index()];
        *cell = (*cell).max(e.weight(ii));
    }
    for k in 0..n {
        for i in 0..n {
            let ik = dist[i * n + k];
            if ik == NO_PATH {
                continue;
            }
            for j in 0..n {
                let kj = dist[k * n + j];
                if kj == NO_PATH {
                    continue;
                }
                let cell = &mut dist[i * n + j];
                *cell = (*cell).max(ik + kj);
            }
        }
    }
    dist
}

/// Whether every recurrence can be met at `ii` (no positive diagonal).
pub(crate) fn recurrence_feasible(graph: &PrecedenceGraph, ii: i64) -> bool {
    let n = graph.len();
    let dist = closure(graph, ii);
    (0..n).all(|i| dist[i * n + i] <= 0)
}

/// All-pairs tightest path constraints at a fixed II.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    n: usize,
    ii: i64,
    dist: Vec<i64>,
}

impl DistanceMatrix {
    /// Computes the closure for `ii`, failing when a recurrence is
    /// infeasible. Diagonal entries are fixed at 0 on success (an
    /// operation trivially constrains itself to its own cycle).
    pub fn build(graph: &PrecedenceGraph, ii: i64) -> Result<Self, ScheduleError> {
        let n = graph.len();
        let mut dist = closure(graph, ii);
        for i in 0..n {
            if dist[i * n + i] > 0 {
                return Err(ScheduleError::RecurrenceInfeasible { ii });
            }
            dist[i * n + i] = 0;
        }
        Ok(Self { n, ii, dist })
    }

    /// The II this matrix was computed for.
    #[inline]
    pub fn ii(&self) -> i64 {
        self.ii
    }

    /// Tightest constraint `cycle(j) >= cycle(i) + d`, or `None` when no
    /// path connects the pair.
    #[inline]
    pub fn get(&self, i: OpId, j: OpId) -> Option<i64> {
        let d = self.dist[i.index() * self.n + j.index()];
        (d != NO_PATH).then_some(d)
    }
}

/// Feasible `[earliest, latest]` cycle range per operation at a fixed II
/// and schedule length.
///
/// Recomputed from scratch on restart; [`SlackWindows::tighten`] narrows
/// windows transitively when an operation is placed (the matrix is
/// transitively closed, so one pass per placement suffices). Windows
/// never widen except by rebuilding.
#[derive(Debug, Clone)]
pub struct SlackWindows {
    earliest: Vec<i64>,
    latest: Vec<i64>,
    length: i64,
}

impl SlackWindows {
    /// Initial windows for an empty schedule of `length` cycles.
    pub fn new(dm: &DistanceMatrix, length: i64) -> Self {
        let n = dm.n;
        let mut earliest = vec![0i64; n];
        let mut latest = vec![length - 1; n];
        for i in 0..n {
            for j in 0..n {
                let d = dm.dist[j * n + i];
                if d != NO_PATH {
                    earliest[i] = earliest[i].max(d);
                }
                let d = dm.dist[i * n + j];
                if d != NO_PATH {
                    latest[i] = latest[i].min(length - 1 - d);
                }
            }
        }
        Self {
            earliest,
            latest,
            length,
        }
    }

    /// Schedule length these windows assume.
    #[inline]
    pub fn length(&self) -> i64 {
        self.length
    }

    /// Earliest feasible cycle.
    #[inline]
    pub fn earliest(&self, op: OpId) -> i64 {
        self.earliest[op.index()]
    }

    /// Latest feasible cycle.
    #[inline]
    pub fn latest(&self, op: OpId) -> i64 {
        self.latest[op.index()]
    }

    /// `(earliest, latest)` pair.
    #[inline]
    pub fn window(&self, op: OpId) -> (i64, i64) {
        (self.earliest[op.index()], self.latest[op.index()])
    }

    /// Window size in cycles; 0 when the window has inverted.
    pub fn width(&self, op: OpId) -> i64 {
        (self.latest[op.index()] - self.earliest[op.index()] + 1).max(0)
    }

    /// Whether `earliest <= latest` still holds.
    pub fn is_consistent(&self, op: OpId) -> bool {
        self.earliest[op.index()] <= self.latest[op.index()]
    }

    /// Collapses `op`'s window toward `cycle` and tightens every
    /// connected window transitively (the zero diagonal pins `op`
    /// itself). A placement outside the current window inverts the
    /// windows it conflicts with; the caller resolves that by ejection
    /// and rebuild.
    pub fn tighten(&mut self, dm: &DistanceMatrix, op: OpId, cycle: i64) {
        let n = dm.n;
        for i in 0..n {
            let d = dm.dist[op.index() * n + i];
            if d != NO_PATH {
                self.earliest[i] = self.earliest[i].max(cycle + d);
            }
            let d = dm.dist[i * n + op.index()];
            if d != NO_PATH {
                self.latest[i] = self.latest[i].min(cycle - d);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operation, PrecedenceEdge};
    use crate::resources::ClassId;

    fn op() -> Operation {
        Operation::new(ClassId(0), 1)
    }

    fn ring() -> PrecedenceGraph {
        PrecedenceGraph::new(
            vec![op(), op(), op()],
            vec![
                PrecedenceEdge::data(0, 1, 1),
                PrecedenceEdge::data(1, 2, 1),
                PrecedenceEdge::carried(2, 0, 1, 1),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_ring_distances_at_rec_mii() {
        let g = ring();
        let dm = DistanceMatrix::build(&g, 3).unwrap();
        assert_eq!(dm.get(OpId(0), OpId(1)), Some(1));
        assert_eq!(dm.get(OpId(0), OpId(2)), Some(2));
        // Around the back edge: 1 - 1*3 = -2.
        assert_eq!(dm.get(OpId(2), OpId(0)), Some(-2));
        assert_eq!(dm.get(OpId(1), OpId(0)), Some(-1));
        // Diagonal is fixed at zero.
        assert_eq!(dm.get(OpId(0), OpId(0)), Some(0));
    }

    #[test]
    fn test_ring_infeasible_below_rec_mii() {
        let g = ring();
        assert!(matches!(
            DistanceMatrix::build(&g, 2),
            Err(ScheduleError::RecurrenceInfeasible { ii: 2 })
        ));
        assert!(!recurrence_feasible(&g, 2));
        assert!(recurrence_feasible(&g, 3));
    }

    #[test]
    fn test_no_path_is_not_zero() {
        let g = PrecedenceGraph::new(
            vec![op(), op(), op()],
            vec![PrecedenceEdge::data(0, 1, 1)],
        )
        .unwrap();
        let dm = DistanceMatrix::build(&g, 1).unwrap();
        assert_eq!(dm.get(OpId(0), OpId(1)), Some(1));
        assert_eq!(dm.get(OpId(1), OpId(0)), None);
        assert_eq!(dm.get(OpId(0), OpId(2)), None);
    }

    #[test]
    fn test_ring_windows_collapse_to_points() {
        let g = ring();
        let dm = DistanceMatrix::build(&g, 3).unwrap();
        let w = SlackWindows::new(&dm, g.schedule_length(3));
        // The recurrence is tight at II=3: every window is a point.
        assert_eq!(w.window(OpId(0)), (0, 0));
        assert_eq!(w.window(OpId(1)), (1, 1));
        assert_eq!(w.window(OpId(2)), (2, 2));
        assert!(w.is_consistent(OpId(0)));
        assert_eq!(w.width(OpId(1)), 1);
    }

    #[test]
    fn test_windows_unconstrained_ops() {
        let g = PrecedenceGraph::new(vec![op(), op()], vec![]).unwrap();
        let dm = DistanceMatrix::build(&g, 2).unwrap();
        let w = SlackWindows::new(&dm, 2);
        assert_eq!(w.window(OpId(0)), (0, 1));
        assert_eq!(w.window(OpId(1)), (0, 1));
        assert_eq!(w.width(OpId(0)), 2);
    }

    #[test]
    fn test_tighten_propagates() {
        // Chain 0 -> 1 -> 2, latency 1 each, II=4, length 4.
        let g = PrecedenceGraph::new(
            vec![op(), op(), op()],
            vec![
                PrecedenceEdge::data(0, 1, 1),
                PrecedenceEdge::data(1, 2, 1),
            ],
        )
        .unwrap();
        let dm = DistanceMatrix::build(&g, 4).unwrap();
        let mut w = SlackWindows::new(&dm, 4);
        assert_eq!(w.window(OpId(1)), (1, 2));

        // Placing op0 at cycle 1 pushes op1 to [2, 2] and op2 to [3, 3]
        // through the closed matrix in a single tighten pass.
        w.tighten(&dm, OpId(0), 1);
        assert_eq!(w.window(OpId(0)), (1, 1));
        assert_eq!(w.window(OpId(1)), (2, 2));
        assert_eq!(w.window(OpId(2)), (3, 3));
    }

    #[test]
    fn test_tighten_can_invert_window() {
        let g = PrecedenceGraph::new(
            vec![op(), op()],
            vec![PrecedenceEdge::data(0, 1, 3)],
        )
        .unwrap();
        let dm = DistanceMatrix::build(&g, 4).unwrap();
        let mut w = SlackWindows::new(&dm, 4);
        // op1 must sit 3 cycles after op0; placing op0 at 3 leaves no room.
        w.tighten(&dm, OpId(0), 3);
        assert!(!w.is_consistent(OpId(1)));
        assert_eq!(w.width(OpId(1)), 0);
    }
}
