//! Precedence graph over the loop body.
//!
//! Builds a normalized dependence graph from operations and edges,
//! validates its structure, and computes the recurrence-driven lower
//! bound on II. The graph is immutable after construction; all mutable
//! search state (windows, reservations, domains) lives elsewhere, keyed
//! by [`OpId`].
//!
//! # Validation
//!
//! A cycle whose edges carry a total omega of 0 is a circular dependence
//! within one iteration that no II can satisfy, so it is rejected as
//! [`ScheduleError::MalformedGraph`] at construction (detected by DFS
//! over the omega-0 subgraph). Loop-carried cycles (total omega >= 1)
//! are the recurrences modulo scheduling exists to handle.
//!
//! # Normalization
//!
//! An edge subsumed by an alternative path (no more iterations spanned,
//! at least the same latency, see [`CyclicDistance::subsumes`]) adds no
//! constraint at any II and is dropped to bound search cost. The original
//! edge list is kept for independent verification.

mod distance;

pub use distance::{DistanceMatrix, SlackWindows};

use crate::error::ScheduleError;
use crate::models::{CyclicDistance, OpId, Operation, PrecedenceEdge};

/// Immutable, normalized precedence graph of one loop body.
#[derive(Debug, Clone)]
pub struct PrecedenceGraph {
    ops: Vec<Operation>,
    edges: Vec<PrecedenceEdge>,
    raw_edges: Vec<PrecedenceEdge>,
    succs: Vec<Vec<usize>>,
    preds: Vec<Vec<usize>>,
    critical_path: i64,
}

impl PrecedenceGraph {
    /// Validates, normalizes, and freezes a dependence graph.
    pub fn new(ops: Vec<Operation>, edges: Vec<PrecedenceEdge>) -> Result<Self, ScheduleError> {
        if ops.is_empty() {
            return Err(ScheduleError::MalformedGraph("no operations".into()));
        }
        let n = ops.len();
        for e in &edges {
            if e.src.index() >= n || e.dst.index() >= n {
                return Err(ScheduleError::MalformedGraph(format!(
                    "edge {} -> {} references a missing operation",
                    e.src, e.dst
                )));
            }
            if e.latency < 0 {
                return Err(ScheduleError::MalformedGraph(format!(
                    "edge {} -> {} has negative latency {}",
                    e.src, e.dst, e.latency
                )));
            }
        }
        if let Some(op) = find_zero_omega_cycle(n, &edges) {
            return Err(ScheduleError::MalformedGraph(format!(
                "intra-iteration dependence cycle through {op}"
            )));
        }

        let raw_edges = edges.clone();
        let edges = normalize(n, edges);

        let mut succs = vec![Vec::new(); n];
        let mut preds = vec![Vec::new(); n];
        for (idx, e) in edges.iter().enumerate() {
            succs[e.src.index()].push(idx);
            preds[e.dst.index()].push(idx);
        }

        let critical_path = critical_path_length(n, &edges);

        Ok(Self {
            ops,
            edges,
            raw_edges,
            succs,
            preds,
            critical_path,
        })
    }

    /// The operations, indexed by [`OpId`].
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    /// One operation.
    pub fn op(&self, id: OpId) -> &Operation {
        &self.ops[id.index()]
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the graph has no operations (never true after `new`).
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Normalized edges, used by all search machinery.
    pub fn edges(&self) -> &[PrecedenceEdge] {
        &self.edges
    }

    /// Edges as given, before normalization; verification replays these.
    pub fn raw_edges(&self) -> &[PrecedenceEdge] {
        &self.raw_edges
    }

    /// Outgoing normalized edges of `op`.
    pub fn succ_edges(&self, op: OpId) -> impl Iterator<Item = &PrecedenceEdge> {
        self.succs[op.index()].iter().map(|&i| &self.edges[i])
    }

    /// Incoming normalized edges of `op`.
    pub fn pred_edges(&self, op: OpId) -> impl Iterator<Item = &PrecedenceEdge> {
        self.preds[op.index()].iter().map(|&i| &self.edges[i])
    }

    /// Total degree of `op` in the normalized graph.
    pub fn degree(&self, op: OpId) -> usize {
        self.succs[op.index()].len() + self.preds[op.index()].len()
    }

    /// Longest latency path over intra-iteration (omega-0) edges.
    pub fn critical_path(&self) -> i64 {
        self.critical_path
    }

    /// Flat schedule length assumed at a candidate II:
    /// `II * ceil((critical_path + 1) / II)`.
    pub fn schedule_length(&self, ii: i64) -> i64 {
        ii * ((self.critical_path + ii) / ii)
    }

    /// Recurrence-driven lower bound on II: the smallest II at which no
    /// positive-weight cycle survives the `latency - omega * II`
    /// substitution.
    ///
    /// Every cycle carries total omega >= 1 (validated), so cycle weight
    /// strictly decreases as II grows and feasibility is monotone —
    /// binary search with the distance-matrix closure as oracle.
    pub fn rec_mii(&self) -> i64 {
        if distance::recurrence_feasible(self, 1) {
            return 1;
        }
        let mut lo = 1; // infeasible
        let mut hi = 1 + self.edges.iter().map(|e| e.latency).sum::<i64>(); // feasible
        debug_assert!(distance::recurrence_feasible(self, hi));
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if distance::recurrence_feasible(self, mid) {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        hi
    }
}

/// DFS cycle detection restricted to omega-0 edges. Returns an operation
/// on a cycle, if one exists.
fn find_zero_omega_cycle(n: usize, edges: &[PrecedenceEdge]) -> Option<OpId> {
    let mut adj = vec![Vec::new(); n];
    for e in edges {
        if e.omega == 0 {
            adj[e.src.index()].push(e.dst.index());
        }
    }

    let mut visited = vec![false; n];
    let mut in_stack = vec![false; n];
    for start in 0..n {
        if !visited[start] && dfs_cycle(start, &adj, &mut visited, &mut in_stack) {
            return Some(OpId(start));
        }
    }
    None
}

fn dfs_cycle(
    node: usize,
    adj: &[Vec<usize>],
    visited: &mut [bool],
    in_stack: &mut [bool],
) -> bool {
    visited[node] = true;
    in_stack[node] = true;
    for &next in &adj[node] {
        if in_stack[next] {
            return true; // back edge
        }
        if !visited[next] && dfs_cycle(next, adj, visited, in_stack) {
            return true;
        }
    }
    in_stack[node] = false;
    false
}

/// Drops every edge subsumed by an alternative path through the
/// remaining edges.
fn normalize(n: usize, edges: Vec<PrecedenceEdge>) -> Vec<PrecedenceEdge> {
    let mut kept = edges;
    let mut i = 0;
    while i < kept.len() {
        if is_redundant(n, &kept, i) {
            kept.remove(i);
        } else {
            i += 1;
        }
    }
    kept
}

/// Whether `edges[skip]` is subsumed by a path over the other edges.
///
/// Longest-latency relaxation over states (node, omega spent), bounded by
/// the edge's own omega; path summaries compose via
/// [`CyclicDistance::of_edge`] and `+`. Paths within a fixed omega cannot
/// revisit a zero-omega cycle (none exist), so `n * (omega + 1)`
/// relaxation rounds reach a fixpoint.
fn is_redundant(n: usize, edges: &[PrecedenceEdge], skip: usize) -> bool {
    let e = edges[skip];
    let budget = e.omega as usize;
    // best[om][v]: tightest nonempty path src -> v spending om omega.
    let mut best: Vec<Vec<Option<CyclicDistance>>> = vec![vec![None; n]; budget + 1];

    // Seed with single-edge paths so the empty path never counts.
    for (idx, f) in edges.iter().enumerate() {
        if idx == skip || f.src != e.src {
            continue;
        }
        let d = CyclicDistance::of_edge(f);
        if (d.omega as usize) <= budget {
            relax(&mut best[d.omega as usize][f.dst.index()], d);
        }
    }

    let rounds = n * (budget + 1);
    for _ in 0..rounds {
        let mut changed = false;
        for (idx, f) in edges.iter().enumerate() {
            if idx == skip {
                continue;
            }
            let step = CyclicDistance::of_edge(f);
            let fo = step.omega as usize;
            for om in 0..=budget.saturating_sub(fo) {
                let Some(from) = best[om][f.src.index()] else {
                    continue;
                };
                if relax(&mut best[om + fo][f.dst.index()], from + step) {
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    (0..=budget).any(|om| best[om][e.dst.index()].is_some_and(|d| d.subsumes(&e)))
}

/// Keeps the longer-latency path summary; reports whether `cell` changed.
fn relax(cell: &mut Option<CyclicDistance>, cand: CyclicDistance) -> bool {
    match cell {
        Some(cur) if cur.latency >= cand.latency => false,
        _ => {
            *cell = Some(cand);
            true
        }
    }
}

/// Longest latency path over the omega-0 subgraph (a DAG after
/// validation), via memoized DFS.
fn critical_path_length(n: usize, edges: &[PrecedenceEdge]) -> i64 {
    let mut adj = vec![Vec::new(); n];
    for e in edges {
        if e.omega == 0 {
            adj[e.dst.index()].push((e.src.index(), e.latency));
        }
    }
    let mut memo = vec![None; n];
    (0..n).map(|v| longest_to(v, &adj, &mut memo)).max().unwrap_or(0)
}

fn longest_to(v: usize, adj: &[Vec<(usize, i64)>], memo: &mut [Option<i64>]) -> i64 {
    if let Some(d) = memo[v] {
        return d;
    }
    let mut d = 0;
    for &(src, lat) in &adj[v] {
        d = d.max(longest_to(src, adj, memo) + lat);
    }
    memo[v] = Some(d);
    d
}
