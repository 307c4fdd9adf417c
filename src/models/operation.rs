//! Operation model.
//!
//! An operation is one instruction of the loop body being pipelined.
//! Operations are created once at scheduling start and are immutable
//! during search; all derived state (windows, reservations, domains) is
//! stored separately, keyed by [`OpId`].

use serde::{Deserialize, Serialize};

use crate::resources::ClassId;

/// Stable integer handle of an operation (index into the graph arena).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OpId(pub usize);

impl OpId {
    /// Index into per-operation arrays.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for OpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op{}", self.0)
    }
}

/// One instruction of the loop body.
///
/// Carries the resource class it occupies for one cycle and its result
/// latency (the default latency of data edges leaving it). The handle of
/// an operation is its index in the list passed to the precedence graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Resource class occupied at the issue cycle.
    pub class: ClassId,
    /// Result latency in cycles (>= 0).
    pub latency: i64,
    /// Optional mnemonic for diagnostics.
    pub name: String,
}

impl Operation {
    /// Creates an operation of the given resource class and latency.
    pub fn new(class: ClassId, latency: i64) -> Self {
        Self {
            class,
            latency,
            name: String::new(),
        }
    }

    /// Sets a mnemonic used in logs and failure reports.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
