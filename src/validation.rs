//! Independent verification of finished schedules.
//!
//! Re-checks a [`ScheduleResult`] against the raw precedence edges and
//! the resource automaton, without trusting anything the search
//! computed. Detects:
//! - Violated precedence constraints (including loop-carried ones)
//! - Oversubscribed kernel rows
//! - Inconsistent derived fields (stage, kernel cycle)
//!
//! The driver runs this on every schedule before returning it; a
//! violation there is an engine defect, not a user error.

use crate::graph::PrecedenceGraph;
use crate::models::ScheduleResult;
use crate::resources::ResourceModel;

/// Verification result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A single verification failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of verification failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// The schedule covers a different number of operations than the graph.
    CountMismatch,
    /// A precedence edge constraint does not hold.
    PrecedenceViolation,
    /// A kernel row holds more operations than its resources admit.
    ResourceOverflow,
    /// A stored stage or kernel cycle disagrees with the issue cycle.
    DerivedFieldMismatch,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Verifies a schedule against its graph and resource model.
///
/// Checks:
/// 1. One assignment per operation
/// 2. `stage = cycle / II` and `kernel_cycle = cycle % II` for every
///    assignment
/// 3. `cycle(dst) >= cycle(src) + latency - omega * II` for every raw
///    edge, subsumed or not
/// 4. Every kernel row replays legally from the empty automaton state
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn verify(
    graph: &PrecedenceGraph,
    model: &ResourceModel,
    result: &ScheduleResult,
) -> ValidationResult {
    let ii = result.ii();

    if result.len() != graph.len() {
        // Everything below indexes by OpId; bail out on the first check.
        return Err(vec![ValidationError::new(
            ValidationErrorKind::CountMismatch,
            format!(
                "schedule covers {} operations, graph has {}",
                result.len(),
                graph.len()
            ),
        )]);
    }

    let mut errors = Vec::new();

    for a in result.assignments() {
        if a.stage != a.cycle / ii || a.kernel_cycle != a.cycle % ii {
            errors.push(ValidationError::new(
                ValidationErrorKind::DerivedFieldMismatch,
                format!(
                    "{}: cycle {} at II {} implies stage {} / kernel cycle {}, stored {} / {}",
                    a.op,
                    a.cycle,
                    ii,
                    a.cycle / ii,
                    a.cycle % ii,
                    a.stage,
                    a.kernel_cycle
                ),
            ));
        }
    }

    // Raw edges, not the normalized set: subsumption is an internal
    // optimization the verifier must not rely on.
    for e in graph.raw_edges() {
        let src = result.cycle(e.src);
        let dst = result.cycle(e.dst);
        if dst < src + e.weight(ii) {
            errors.push(ValidationError::new(
                ValidationErrorKind::PrecedenceViolation,
                format!(
                    "{} at {} -> {} at {}: needs {} cycles across {} iterations",
                    e.src, src, e.dst, dst, e.latency, e.omega
                ),
            ));
        }
    }

    for kc in 0..ii {
        let mut state = model.empty_state();
        for op in result.ops_at_kernel_cycle(kc) {
            state = model.reserve(state, graph.op(op).class);
            if !model.is_legal(state) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::ResourceOverflow,
                    format!("kernel cycle {kc} cannot accommodate {op}"),
                ));
                break;
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyKind;
    use crate::models::{Operation, PrecedenceEdge};
    use crate::resources::{ClassId, ResourceSpec};

    fn alu_model() -> ResourceModel {
        ResourceModel::new(&[ResourceSpec::new("alu").with_units(&[0])]).unwrap()
    }

    fn ring() -> PrecedenceGraph {
        PrecedenceGraph::new(
            vec![
                Operation::new(ClassId(0), 1),
                Operation::new(ClassId(0), 1),
                Operation::new(ClassId(0), 1),
            ],
            vec![
                PrecedenceEdge::data(0, 1, 1),
                PrecedenceEdge::data(1, 2, 1),
                PrecedenceEdge::carried(2, 0, 1, 1),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_valid_ring_schedule() {
        let g = ring();
        let m = alu_model();
        let r = ScheduleResult::new(3, 3, StrategyKind::Heuristic, &[0, 1, 2]);
        assert!(verify(&g, &m, &r).is_ok());
    }

    #[test]
    fn test_carried_edge_violation() {
        let g = ring();
        let m = alu_model();
        // op2 at cycle 5 breaks the back edge: 0 >= 5 + 1 - 3 fails.
        let r = ScheduleResult::new(3, 6, StrategyKind::Heuristic, &[0, 1, 5]);
        let errors = verify(&g, &m, &r).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::PrecedenceViolation));
    }

    #[test]
    fn test_intra_iteration_violation() {
        let g = ring();
        let m = alu_model();
        // op1 issued in the same cycle as its producer.
        let r = ScheduleResult::new(3, 3, StrategyKind::Heuristic, &[0, 0, 2]);
        let errors = verify(&g, &m, &r).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::PrecedenceViolation));
    }

    #[test]
    fn test_resource_overflow() {
        let g = PrecedenceGraph::new(
            vec![
                Operation::new(ClassId(0), 1),
                Operation::new(ClassId(0), 1),
            ],
            vec![],
        )
        .unwrap();
        let m = alu_model();
        // Cycles 0 and 2 share kernel row 0 at II=2 on a single unit.
        let r = ScheduleResult::new(2, 4, StrategyKind::Heuristic, &[0, 2]);
        let errors = verify(&g, &m, &r).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::ResourceOverflow));
    }

    #[test]
    fn test_count_mismatch() {
        let g = ring();
        let m = alu_model();
        let r = ScheduleResult::new(3, 3, StrategyKind::Heuristic, &[0, 1]);
        let errors = verify(&g, &m, &r).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::CountMismatch);
    }

    #[test]
    fn test_collects_multiple_errors() {
        let g = ring();
        let m = alu_model();
        // op1 and op2 share a row and op1 also breaks its input edge.
        let r = ScheduleResult::new(3, 6, StrategyKind::Heuristic, &[0, 0, 3]);
        let errors = verify(&g, &m, &r).unwrap_err();
        assert!(errors.len() >= 2);
    }
}
