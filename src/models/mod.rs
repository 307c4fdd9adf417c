//! Scheduling domain models.
//!
//! Core data types for the modulo-scheduling problem and its solution.
//! All types here are plain values: the graph arena owns operations and
//! edges, handles ([`OpId`]) key every piece of derived search state.
//!
//! | Type | Role |
//! |------|------|
//! | [`Operation`] | one loop-body instruction (resource class + latency) |
//! | [`PrecedenceEdge`] | dependence with latency and iteration distance |
//! | [`CyclicDistance`] | path summary used by edge normalization |
//! | [`ScheduleResult`] | per-operation (cycle, stage) at a fixed II |

mod edge;
mod operation;
mod result;

pub use edge::{CyclicDistance, DepKind, PrecedenceEdge};
pub use operation::{OpId, Operation};
pub use result::{ScheduleResult, SlotAssignment};
