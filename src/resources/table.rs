//! Modulo reservation table.
//!
//! Tracks one automaton state per kernel row (cycle mod II) plus the
//! operations occupying it. Owned and mutated by exactly one search
//! attempt; discarded when II changes or the attempt aborts.
//!
//! The DFA has no inverse transition, so [`ReservationTable::unreserve`]
//! replays the row's remaining occupants from the empty state.

use crate::models::OpId;
use crate::resources::{ClassId, ResourceModel, StateId};

#[derive(Debug, Clone)]
struct Row {
    state: StateId,
    occupants: Vec<(OpId, ClassId)>,
}

/// Per-kernel-cycle resource state at a fixed II.
#[derive(Debug, Clone)]
pub struct ReservationTable<'a> {
    model: &'a ResourceModel,
    ii: i64,
    rows: Vec<Row>,
}

impl<'a> ReservationTable<'a> {
    /// Creates an empty table with `ii` rows.
    pub fn new(model: &'a ResourceModel, ii: i64) -> Self {
        assert!(ii > 0, "II must be positive");
        Self {
            model,
            ii,
            rows: (0..ii)
                .map(|_| Row {
                    state: model.empty_state(),
                    occupants: Vec::new(),
                })
                .collect(),
        }
    }

    /// The II this table was built for.
    #[inline]
    pub fn ii(&self) -> i64 {
        self.ii
    }

    #[inline]
    fn row_index(&self, cycle: i64) -> usize {
        cycle.rem_euclid(self.ii) as usize
    }

    /// Non-mutating probe: would one unit of `class` fit at `cycle`?
    pub fn is_available(&self, class: ClassId, cycle: i64) -> bool {
        let row = &self.rows[self.row_index(cycle)];
        self.model.is_legal(self.model.reserve(row.state, class))
    }

    /// Reserves one unit of `class` for `op` at `cycle`. Returns false
    /// (leaving the table untouched) when the row cannot accept it.
    pub fn reserve(&mut self, op: OpId, class: ClassId, cycle: i64) -> bool {
        let idx = self.row_index(cycle);
        let row = &mut self.rows[idx];
        let next = self.model.reserve(row.state, class);
        if !self.model.is_legal(next) {
            return false;
        }
        row.state = next;
        row.occupants.push((op, class));
        true
    }

    /// Releases `op`'s reservation at `cycle` and replays the row.
    ///
    /// # Panics
    /// Panics if `op` holds no reservation in that row; unreserving what
    /// was never reserved is a caller defect.
    pub fn unreserve(&mut self, op: OpId, cycle: i64) {
        let idx = self.row_index(cycle);
        let row = &mut self.rows[idx];
        let pos = row
            .occupants
            .iter()
            .position(|&(o, _)| o == op)
            .unwrap_or_else(|| panic!("{op} holds no reservation in row {idx}"));
        row.occupants.remove(pos);

        let mut state = self.model.empty_state();
        for &(_, class) in &row.occupants {
            state = self.model.reserve(state, class);
            assert!(
                self.model.is_legal(state),
                "row replay became illegal after unreserve"
            );
        }
        row.state = state;
    }

    /// Scans `[earliest, latest]` in the given direction and returns the
    /// first cycle whose row can accept `class`, if any. This is the
    /// central placement primitive of both search strategies.
    pub fn find_in_range(
        &self,
        class: ClassId,
        earliest: i64,
        latest: i64,
        topdown: bool,
    ) -> Option<i64> {
        if earliest > latest {
            return None;
        }
        // A window spanning a full II covers every row.
        let span = (latest - earliest + 1).min(self.ii);
        if topdown {
            (earliest..earliest + span).find(|&c| self.is_available(class, c))
        } else {
            (latest - span + 1..=latest)
                .rev()
                .find(|&c| self.is_available(class, c))
        }
    }

    /// Operations occupying the row of `cycle`.
    pub fn occupants(&self, cycle: i64) -> &[(OpId, ClassId)] {
        &self.rows[self.row_index(cycle)].occupants
    }

    /// Automaton state of the row of `cycle`.
    pub fn row_state(&self, cycle: i64) -> StateId {
        self.rows[self.row_index(cycle)].state
    }

    /// Drops every reservation.
    pub fn clear(&mut self) {
        for row in &mut self.rows {
            row.state = self.model.empty_state();
            row.occupants.clear();
        }
    }
}
