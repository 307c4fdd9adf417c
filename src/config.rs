//! Scheduler configuration.
//!
//! All search budgets, strategy selection, and heuristic bias constants
//! live here as explicit configuration with documented defaults. The bias
//! constants (0.19, 0.13) and the per-operation retry budget (8) are
//! empirically tuned values carried over as defaults, not re-derived.

use serde::{Deserialize, Serialize};

/// Which search strategy produced a schedule (or ran in an attempt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Greedy list scheduling with ejection.
    Heuristic,
    /// Finite-domain constraint propagation with backtracking.
    ConstraintPropagation,
}

/// Order in which the search strategies are tried at each II.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrategyOrder {
    /// Heuristic first, constraint propagation as fallback (default).
    #[default]
    HeuristicFirst,
    /// Constraint propagation first, heuristic as fallback.
    CpFirst,
    /// Heuristic only.
    HeuristicOnly,
    /// Constraint propagation only.
    CpOnly,
}

impl StrategyOrder {
    /// Strategies to run, in order.
    pub fn sequence(self) -> &'static [StrategyKind] {
        match self {
            StrategyOrder::HeuristicFirst => &[
                StrategyKind::Heuristic,
                StrategyKind::ConstraintPropagation,
            ],
            StrategyOrder::CpFirst => &[
                StrategyKind::ConstraintPropagation,
                StrategyKind::Heuristic,
            ],
            StrategyOrder::HeuristicOnly => &[StrategyKind::Heuristic],
            StrategyOrder::CpOnly => &[StrategyKind::ConstraintPropagation],
        }
    }
}

/// Candidate-selection policy for the heuristic list scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PolicyKind {
    /// Most constrained first: smallest slack window (default).
    #[default]
    SlackDriven,
    /// Operations on the scarcest resource class first.
    ResourceMerit,
    /// Smallest projected issue cycle first.
    ProjectedCycle,
}

/// Variable/value ordering used by the constraint engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecisionStrategy {
    /// Pick the uncommitted operation with the earliest lower bound,
    /// breaking ties by smallest domain; try its minimum cycle (default).
    #[default]
    EarliestReadySmallestDomain,
    /// Prefer operations adjacent to already committed ones; try their
    /// minimum cycle first, so placements grow outward from the
    /// committed cluster.
    Clustered,
    /// Bisect the domain at the [`SchedulerConfig::cluster_bias`] point
    /// instead of enumerating values.
    ProjectedSplit,
}

/// Configuration for a scheduling session.
///
/// # Example
/// ```
/// use modsched::config::{SchedulerConfig, StrategyOrder};
///
/// let config = SchedulerConfig::default()
///     .with_max_ii(32)
///     .with_strategy_order(StrategyOrder::CpFirst);
/// assert_eq!(config.max_ii, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Largest II the driver will attempt before abandoning pipelining.
    pub max_ii: i64,
    /// Placements allowed per operation in one heuristic attempt.
    pub retry_budget: u32,
    /// Propagation failures allowed in one constraint-engine attempt.
    pub cp_fail_limit: u64,
    /// Which strategies run at each II, and in what order.
    pub strategy_order: StrategyOrder,
    /// Candidate-selection policy for the heuristic scheduler.
    pub policy: PolicyKind,
    /// Branching heuristic for the constraint engine.
    pub decision_strategy: DecisionStrategy,
    /// Projected-cycle bias: fraction of the slack window added to the
    /// earliest start when projecting an issue cycle.
    pub projected_bias: f64,
    /// Fraction of the domain span used to offset the split point under
    /// [`DecisionStrategy::ProjectedSplit`] branching.
    pub cluster_bias: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_ii: 64,
            retry_budget: 8,
            cp_fail_limit: 10_000,
            strategy_order: StrategyOrder::default(),
            policy: PolicyKind::default(),
            decision_strategy: DecisionStrategy::default(),
            projected_bias: 0.19,
            cluster_bias: 0.13,
        }
    }
}

impl SchedulerConfig {
    /// Sets the II ceiling.
    pub fn with_max_ii(mut self, max_ii: i64) -> Self {
        self.max_ii = max_ii;
        self
    }

    /// Sets the per-operation retry budget.
    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Sets the constraint-engine fail limit.
    pub fn with_cp_fail_limit(mut self, limit: u64) -> Self {
        self.cp_fail_limit = limit;
        self
    }

    /// Sets the strategy order.
    pub fn with_strategy_order(mut self, order: StrategyOrder) -> Self {
        self.strategy_order = order;
        self
    }

    /// Sets the heuristic candidate-selection policy.
    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the constraint-engine branching heuristic.
    pub fn with_decision_strategy(mut self, strategy: DecisionStrategy) -> Self {
        self.decision_strategy = strategy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = SchedulerConfig::default();
        assert_eq!(c.retry_budget, 8);
        assert_eq!(c.max_ii, 64);
        assert!((c.projected_bias - 0.19).abs() < 1e-12);
        assert!((c.cluster_bias - 0.13).abs() < 1e-12);
        assert_eq!(c.strategy_order, StrategyOrder::HeuristicFirst);
    }

    #[test]
    fn test_builder() {
        let c = SchedulerConfig::default()
            .with_max_ii(16)
            .with_retry_budget(4)
            .with_cp_fail_limit(100)
            .with_strategy_order(StrategyOrder::CpOnly)
            .with_policy(PolicyKind::ResourceMerit)
            .with_decision_strategy(DecisionStrategy::Clustered);
        assert_eq!(c.max_ii, 16);
        assert_eq!(c.retry_budget, 4);
        assert_eq!(c.cp_fail_limit, 100);
        assert_eq!(c.strategy_order, StrategyOrder::CpOnly);
        assert_eq!(c.policy, PolicyKind::ResourceMerit);
        assert_eq!(c.decision_strategy, DecisionStrategy::Clustered);
    }

    #[test]
    fn test_strategy_sequences() {
        assert_eq!(
            StrategyOrder::HeuristicFirst.sequence(),
            &[
                StrategyKind::Heuristic,
                StrategyKind::ConstraintPropagation
            ]
        );
        assert_eq!(
            StrategyOrder::CpOnly.sequence(),
            &[StrategyKind::ConstraintPropagation]
        );
        assert_eq!(StrategyOrder::HeuristicOnly.sequence().len(), 1);
    }
}
