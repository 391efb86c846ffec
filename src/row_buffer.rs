//! Client-side row buffer
//!
//! Rows pulled from the forward-only result stream are kept in an arena of
//! [`RowSlot`]s addressed by [`SlotId`]. Absolute positions (1-based) map to
//! slots through a separate order vector, so growing the buffer never moves
//! a slot and never invalidates a bookmark that names one.
//!
//! Rows added through the cursor are stored as detached slots: reachable by
//! id (and so by bookmark) but outside the positional order.

use crate::constants::RowStatus;
use crate::row::Value;

/// Stable index of a slot in the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    /// Raw arena index
    pub fn index(self) -> usize {
        self.0
    }
}

/// One buffered row
#[derive(Debug, Clone, PartialEq)]
pub struct RowSlot {
    values: Vec<Value>,
    /// Values as the server last reported them; key predicates read these
    image: Vec<Value>,
    status: RowStatus,
    position: Option<usize>,
}

impl RowSlot {
    fn new(values: Vec<Value>, status: RowStatus, position: Option<usize>) -> Self {
        Self {
            image: values.clone(),
            values,
            status,
            position,
        }
    }

    /// Current column values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Values as last seen on the server
    pub fn image(&self) -> &[Value] {
        &self.image
    }

    /// Row status
    pub fn status(&self) -> RowStatus {
        self.status
    }

    /// Absolute position (None for detached slots)
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Whether the row was deleted
    pub fn is_deleted(&self) -> bool {
        self.status == RowStatus::Deleted
    }

    pub(crate) fn set_status(&mut self, status: RowStatus) {
        self.status = status;
    }

    /// Replace both current values and image with a fresh server read
    pub(crate) fn reload(&mut self, values: Vec<Value>) {
        self.image = values.clone();
        self.values = values;
    }

    /// Record values written to the server
    pub(crate) fn apply(&mut self, assignments: &[(usize, Value)]) {
        for (ordinal, value) in assignments {
            if let Some(slot) = self.values.get_mut(*ordinal) {
                *slot = value.clone();
            }
            if let Some(slot) = self.image.get_mut(*ordinal) {
                *slot = value.clone();
            }
        }
    }
}

/// Arena of buffered rows ordered by absolute position
#[derive(Debug, Default)]
pub struct RowBuffer {
    slots: Vec<RowSlot>,
    order: Vec<SlotId>,
    /// Rows discarded ahead of `order[0]` (forward-only cursors)
    base: usize,
    exhausted: bool,
}

impl RowBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row read from the stream; it takes the next position
    pub fn push(&mut self, values: Vec<Value>) -> SlotId {
        let id = SlotId(self.slots.len());
        let position = self.known_rows() + 1;
        self.slots
            .push(RowSlot::new(values, RowStatus::Success, Some(position)));
        self.order.push(id);
        id
    }

    /// Store a row that has no position (added through the cursor)
    pub fn push_detached(&mut self, values: Vec<Value>, status: RowStatus) -> SlotId {
        let id = SlotId(self.slots.len());
        self.slots.push(RowSlot::new(values, status, None));
        id
    }

    /// Number of positions read from the stream so far
    pub fn known_rows(&self) -> usize {
        self.base + self.order.len()
    }

    /// Number of slots held in memory
    pub fn resident(&self) -> usize {
        self.slots.len()
    }

    /// Slot at a 1-based absolute position, if resident
    pub fn slot_at(&self, position: usize) -> Option<SlotId> {
        if position <= self.base {
            return None;
        }
        self.order.get(position - self.base - 1).copied()
    }

    /// Slot by id
    pub fn get(&self, id: SlotId) -> Option<&RowSlot> {
        self.slots.get(id.0)
    }

    /// Mutable slot by id
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut RowSlot> {
        self.slots.get_mut(id.0)
    }

    /// Whether the stream has been read to the end
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }

    /// Drop every resident row; later rows start after `position`
    ///
    /// Slot ids handed out before the call are invalid afterwards.
    pub fn discard_through(&mut self, position: usize) {
        self.base = position.max(self.base);
        self.slots.clear();
        self.order.clear();
    }

    /// Drop everything, including the position counter
    pub fn clear(&mut self) {
        self.slots.clear();
        self.order.clear();
        self.base = 0;
        self.exhausted = false;
    }
}
