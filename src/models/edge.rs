//! Precedence edges and cyclic path summaries.
//!
//! An edge `(src, dst, latency, omega)` constrains any schedule to
//! `cycle(dst) >= cycle(src) + latency - omega * II`. `omega` is the
//! number of loop iterations the dependence spans: 0 for intra-iteration
//! edges, >= 1 for loop-carried ones.

use serde::{Deserialize, Serialize};
use std::ops::Add;

use super::OpId;

/// Dependence classification, preserved from the analysis that produced
/// the edge. Search treats all kinds uniformly; the tag exists for
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepKind {
    /// True (read-after-write) dependence.
    Data,
    /// Anti (write-after-read) dependence.
    Anti,
    /// Output (write-after-write) dependence.
    Output,
    /// Memory aliasing dependence.
    Memory,
    /// Control dependence.
    Control,
}

/// A dependence edge of the loop body's precedence graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecedenceEdge {
    /// Source operation.
    pub src: OpId,
    /// Destination operation.
    pub dst: OpId,
    /// Minimum cycle distance when both ends are in the same iteration.
    pub latency: i64,
    /// Iteration distance (0 = intra-iteration, >= 1 = loop-carried).
    pub omega: u32,
    /// Dependence classification.
    pub kind: DepKind,
}

impl PrecedenceEdge {
    /// Creates an edge of the given kind.
    pub fn new(src: usize, dst: usize, latency: i64, omega: u32, kind: DepKind) -> Self {
        Self {
            src: OpId(src),
            dst: OpId(dst),
            latency,
            omega,
            kind,
        }
    }

    /// Intra-iteration data edge.
    pub fn data(src: usize, dst: usize, latency: i64) -> Self {
        Self::new(src, dst, latency, 0, DepKind::Data)
    }

    /// Loop-carried data edge spanning `omega` iterations.
    pub fn carried(src: usize, dst: usize, latency: i64, omega: u32) -> Self {
        Self::new(src, dst, latency, omega, DepKind::Data)
    }

    /// Sets the iteration distance.
    pub fn with_omega(mut self, omega: u32) -> Self {
        self.omega = omega;
        self
    }

    /// Sets the dependence kind.
    pub fn with_kind(mut self, kind: DepKind) -> Self {
        self.kind = kind;
        self
    }

    /// Constraint weight of this edge at a candidate II:
    /// `latency - omega * II`.
    #[inline]
    pub fn weight(&self, ii: i64) -> i64 {
        self.latency - i64::from(self.omega) * ii
    }
}

/// Path summary over the cyclic precedence graph.
///
/// Composed with `+` along a path. For redundancy pruning, a path
/// *subsumes* an edge when it spans no more iterations, enforces at least
/// the same latency, and is not the edge itself; see
/// [`CyclicDistance::subsumes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclicDistance {
    /// Total iteration distance along the path.
    pub omega: u32,
    /// Total latency along the path.
    pub latency: i64,
    /// Number of edges along the path.
    pub hops: u32,
}

impl CyclicDistance {
    /// Summary of a single edge.
    pub fn of_edge(edge: &PrecedenceEdge) -> Self {
        Self {
            omega: edge.omega,
            latency: edge.latency,
            hops: 1,
        }
    }

    /// Whether a path with this summary makes `edge` redundant: it runs
    /// between the same endpoints (checked by the caller), spans at most
    /// `edge.omega` iterations, and enforces at least `edge.latency`.
    pub fn subsumes(&self, edge: &PrecedenceEdge) -> bool {
        self.omega <= edge.omega && self.latency >= edge.latency
    }
}

impl Add for CyclicDistance {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            omega: self.omega + rhs.omega,
            latency: self.latency + rhs.latency,
            hops: self.hops + rhs.hops,
        }
    }
}
