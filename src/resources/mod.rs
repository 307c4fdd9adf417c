//! Resource-conflict model: a deterministic finite automaton over
//! per-cycle occupancy states.
//!
//! Every operation occupies one functional unit of its resource class for
//! its issue cycle. A [`ResourceModel`] is built once, explicitly, from a
//! [`ResourceSpec`] table and injected by reference into every search
//! attempt; there is no lazily initialized global state. The automaton
//! is read-only and shared by both search strategies.
//!
//! # Contract
//!
//! [`ResourceModel::reserve`] is pure and total: given a state and a
//! resource class it returns the successor state, or the [`ILLEGAL_STATE`]
//! sentinel when no compatible unit is free. Callers always thread the
//! returned state explicitly; the sentinel absorbs (`reserve(ILLEGAL, _)`
//! stays illegal).

mod table;

pub use table::ReservationTable;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ScheduleError;
use crate::models::Operation;

/// Handle of a resource class within a [`ResourceModel`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClassId(pub usize);

impl ClassId {
    /// Index into per-class arrays.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Automaton state handle. State 0 is the empty-occupancy state.
pub type StateId = u32;

/// Sentinel state: the requested reservation is not legal.
pub const ILLEGAL_STATE: StateId = StateId::MAX;

/// Maximum number of functional units a model may describe.
pub const MAX_UNITS: u8 = 16;

/// Declaration of one resource class: a name and the functional units
/// operations of this class may occupy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Class name (target-specific, e.g. "alu", "mem").
    pub name: String,
    /// Indices of compatible functional units (each `< MAX_UNITS`).
    pub units: Vec<u8>,
}

impl ResourceSpec {
    /// Creates a spec with no units; add them with [`Self::with_units`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: Vec::new(),
        }
    }

    /// Sets the compatible unit indices.
    pub fn with_units(mut self, units: &[u8]) -> Self {
        self.units = units.to_vec();
        self
    }
}

#[derive(Debug, Clone)]
struct ResourceClass {
    name: String,
    unit_mask: u16,
}

/// The resource-legality automaton.
///
/// States are occupancy bitmasks over functional units, enumerated
/// exhaustively at construction; transitions are tabled per (state,
/// class). Reservation always takes the lowest-numbered free compatible
/// unit, which keeps the automaton deterministic.
#[derive(Debug, Clone)]
pub struct ResourceModel {
    classes: Vec<ResourceClass>,
    /// Occupancy mask of each state.
    states: Vec<u16>,
    /// `transitions[state][class]` -> successor or `ILLEGAL_STATE`.
    transitions: Vec<Vec<StateId>>,
}

impl ResourceModel {
    /// Builds the automaton from a class table.
    ///
    /// Fails with [`ScheduleError::InvalidResourceSpec`] on empty tables,
    /// duplicate class names, classes without units, or unit indices
    /// outside `0..MAX_UNITS`.
    pub fn new(specs: &[ResourceSpec]) -> Result<Self, ScheduleError> {
        if specs.is_empty() {
            return Err(ScheduleError::InvalidResourceSpec(
                "no resource classes declared".into(),
            ));
        }

        let mut classes = Vec::with_capacity(specs.len());
        let mut seen = HashMap::new();
        for spec in specs {
            if seen.insert(spec.name.clone(), ()).is_some() {
                return Err(ScheduleError::InvalidResourceSpec(format!(
                    "duplicate class name `{}`",
                    spec.name
                )));
            }
            if spec.units.is_empty() {
                return Err(ScheduleError::InvalidResourceSpec(format!(
                    "class `{}` has no units",
                    spec.name
                )));
            }
            let mut unit_mask: u16 = 0;
            for &u in &spec.units {
                if u >= MAX_UNITS {
                    return Err(ScheduleError::InvalidResourceSpec(format!(
                        "class `{}`: unit index {u} out of range",
                        spec.name
                    )));
                }
                unit_mask |= 1 << u;
            }
            classes.push(ResourceClass {
                name: spec.name.clone(),
                unit_mask,
            });
        }

        // Enumerate all reachable occupancy states breadth-first.
        let mut states: Vec<u16> = vec![0];
        let mut index: HashMap<u16, StateId> = HashMap::from([(0u16, 0)]);
        let mut transitions: Vec<Vec<StateId>> = Vec::new();
        let mut next = 0usize;
        while next < states.len() {
            let mask = states[next];
            let mut row = Vec::with_capacity(classes.len());
            for class in &classes {
                let free = class.unit_mask & !mask;
                if free == 0 {
                    row.push(ILLEGAL_STATE);
                    continue;
                }
                // Lowest free compatible unit keeps transitions deterministic.
                let unit = free & free.wrapping_neg();
                let successor = mask | unit;
                let id = *index.entry(successor).or_insert_with(|| {
                    states.push(successor);
                    (states.len() - 1) as StateId
                });
                row.push(id);
            }
            transitions.push(row);
            next += 1;
        }

        Ok(Self {
            classes,
            states,
            transitions,
        })
    }

    /// The empty-occupancy state.
    #[inline]
    pub fn empty_state(&self) -> StateId {
        0
    }

    /// Successor state after reserving one unit of `class`, or
    /// [`ILLEGAL_STATE`]. Pure; the sentinel absorbs.
    #[inline]
    pub fn reserve(&self, state: StateId, class: ClassId) -> StateId {
        if state == ILLEGAL_STATE {
            return ILLEGAL_STATE;
        }
        self.transitions[state as usize][class.index()]
    }

    /// Whether `state` is a legal (non-sentinel) state.
    #[inline]
    pub fn is_legal(&self, state: StateId) -> bool {
        state != ILLEGAL_STATE
    }

    /// Resolves a class name.
    pub fn class(&self, name: &str) -> Option<ClassId> {
        self.classes.iter().position(|c| c.name == name).map(ClassId)
    }

    /// Name of a class.
    pub fn class_name(&self, class: ClassId) -> &str {
        &self.classes[class.index()].name
    }

    /// Number of declared classes.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Number of automaton states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// How many operations of `class` fit in a single cycle: reserves
    /// from the empty state until the automaton rejects.
    pub fn class_capacity(&self, class: ClassId) -> usize {
        let mut state = self.empty_state();
        let mut count = 0;
        loop {
            state = self.reserve(state, class);
            if !self.is_legal(state) {
                return count;
            }
            count += 1;
        }
    }

    /// Rejects operations tagged with a class this model does not know.
    pub fn check_classes(&self, ops: &[Operation]) -> Result<(), ScheduleError> {
        for (i, op) in ops.iter().enumerate() {
            if op.class.index() >= self.classes.len() {
                return Err(ScheduleError::UnknownResourceClass(format!(
                    "op{i} uses class index {}, model has {} classes",
                    op.class.index(),
                    self.classes.len()
                )));
            }
        }
        Ok(())
    }

    /// Resource-driven lower bound on II: the most utilized class's
    /// `ceil(population / capacity)`, at least 1.
    pub fn res_mii(&self, ops: &[Operation]) -> i64 {
        let mut population = vec![0i64; self.classes.len()];
        for op in ops {
            population[op.class.index()] += 1;
        }
        let mut bound = 1;
        for (idx, &n) in population.iter().enumerate() {
            if n == 0 {
                continue;
            }
            let cap = self.class_capacity(ClassId(idx)) as i64;
            debug_assert!(cap > 0, "class with zero capacity");
            bound = bound.max((n + cap - 1) / cap);
        }
        bound
    }
}
