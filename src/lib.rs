//! Cyclic instruction scheduling (modulo scheduling) for loop pipelining.
//!
//! Overlaps successive loop iterations at a fixed initiation interval
//! (II): iteration `k + 1` starts II cycles after iteration `k`, so one
//! kernel of II cycles carries every operation of the loop body, each at
//! its own pipeline stage. The engine searches for the smallest II that
//! satisfies both the loop-carried dependences and the machine's
//! per-cycle resource limits, and returns the placement or a structured
//! account of why none was found.
//!
//! # Modules
//!
//! - **`models`**: Domain types — `Operation`, `PrecedenceEdge`,
//!   `ScheduleResult`, `SlotAssignment`
//! - **`resources`**: Resource automaton and the modulo reservation table
//! - **`graph`**: Validated precedence graph, distance matrix, slack windows
//! - **`heuristic`**: List scheduler with ejection and priority policies
//! - **`cp`**: Constraint-propagation search with backtracking
//! - **`driver`**: The II search loop ([`driver::Pipeliner`])
//! - **`validation`**: Independent verification of finished schedules
//!
//! # Determinism
//!
//! Identical inputs and configuration produce identical schedules: no
//! randomness, no time-dependent decisions, fully ordered tie-breaking.
//!
//! # References
//!
//! - Rau (1994), "Iterative Modulo Scheduling" (HPL-94-115)
//! - Lam (1988), "Software Pipelining: An Effective Scheduling Technique
//!   for VLIW Machines"
//! - Baptiste et al. (2001), "Constraint-Based Scheduling"

pub mod config;
pub mod cp;
pub mod driver;
pub mod error;
pub mod graph;
pub mod heuristic;
pub mod models;
pub mod resources;
pub mod validation;
