//! Table Core (component C): the open-addressed hash table with insertion-order preservation.
//!
//! This module knows nothing about keys, probes, or kinds — it only ever sees 64-bit hashes and
//! `i64` ordinals, with equality supplied by the caller as a closure. That split is what lets the
//! same table implementation serve both opaque-mode and buffer-mode indices (§2, component C).

use tracing::{debug, trace};

/// Minimum slot-array capacity, always a power of two.
pub(crate) const MIN_CAPACITY: usize = 16;
/// Load factor is kept strictly below `MAX_LOAD_NUM / MAX_LOAD_DEN` (0.6) by growth.
const MAX_LOAD_NUM: usize = 3;
const MAX_LOAD_DEN: usize = 5;

const EMPTY: i64 = -1;

/// Yields the perturbed-quadratic probe sequence required by §4.3, starting at `hash mod
/// capacity` and continuing via `i_{n+1} = (5*i_n + 1 + p) mod capacity, p >>= 5`.
fn probe_sequence(capacity: usize, hash: u64) -> impl Iterator<Item = usize> {
    let mask = (capacity - 1) as u64;
    let mut idx = hash & mask;
    let mut perturb = hash;
    let mut first = true;
    std::iter::from_fn(move || {
        if first {
            first = false;
        } else {
            idx = idx
                .wrapping_mul(5)
                .wrapping_add(1)
                .wrapping_add(perturb)
                & mask;
            perturb >>= 5;
        }
        Some(idx as usize)
    })
}

fn smallest_capacity_for(min_elements: usize) -> usize {
    let mut cap = MIN_CAPACITY;
    while cap * MAX_LOAD_NUM <= min_elements * MAX_LOAD_DEN {
        cap *= 2;
    }
    cap
}

/// The Slot array plus insertion count. Slots hold either `EMPTY` or an insertion ordinal.
#[derive(Clone, Debug)]
pub(crate) struct Table {
    slots: Vec<i64>,
    len: usize,
}

impl Table {
    pub fn new() -> Self {
        Table {
            slots: vec![EMPTY; MIN_CAPACITY],
            len: 0,
        }
    }

    /// A table pre-sized so that inserting `n` elements never triggers growth — the
    /// buffer-mode construction shortcut of §4.3.
    pub fn with_capacity_hint(n: usize) -> Self {
        Table {
            slots: vec![EMPTY; smallest_capacity_for(n)],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Walk the probe sequence for `hash`, calling `eq(ordinal)` at each occupied slot. Returns
    /// the matching ordinal, or `None` once an empty slot is reached.
    pub fn lookup(&self, hash: u64, mut eq: impl FnMut(i64) -> bool) -> Option<i64> {
        for idx in probe_sequence(self.capacity(), hash) {
            match self.slots[idx] {
                EMPTY => return None,
                ordinal => {
                    if eq(ordinal) {
                        return Some(ordinal);
                    }
                }
            }
        }
        unreachable!("probe sequence must reach an empty slot before exhausting the table")
    }

    /// Insert `ordinal` at the first empty slot, checking for a duplicate via `eq` at every
    /// occupied slot visited along the way. On success, grows the table (rehashing via
    /// `hash_of`) if the load factor bound would otherwise be exceeded.
    ///
    /// Returns the ordinal of the pre-existing duplicate, if any, instead of inserting.
    pub fn insert(
        &mut self,
        hash: u64,
        ordinal: i64,
        mut eq: impl FnMut(i64) -> bool,
        hash_of: impl Fn(i64) -> u64,
    ) -> Option<i64> {
        for idx in probe_sequence(self.capacity(), hash) {
            match self.slots[idx] {
                EMPTY => {
                    self.slots[idx] = ordinal;
                    self.len += 1;
                    self.maybe_grow(hash_of);
                    return None;
                }
                existing => {
                    if eq(existing) {
                        trace!(ordinal = existing, "non-unique key: slot already occupied");
                        return Some(existing);
                    }
                }
            }
        }
        unreachable!("probe sequence must reach an empty slot before exhausting the table")
    }

    fn needs_growth(&self) -> bool {
        (self.len) * MAX_LOAD_DEN > self.capacity() * MAX_LOAD_NUM
    }

    fn maybe_grow(&mut self, hash_of: impl Fn(i64) -> u64) {
        if !self.needs_growth() {
            return;
        }
        let old_capacity = self.capacity();
        let new_capacity = old_capacity * 2;
        debug!(old_capacity, new_capacity, len = self.len, "growing table");
        let old_slots = std::mem::replace(&mut self.slots, vec![EMPTY; new_capacity]);
        self.len = 0;
        for ordinal in old_slots.into_iter().filter(|&s| s != EMPTY) {
            let hash = hash_of(ordinal);
            for idx in probe_sequence(self.capacity(), hash) {
                if self.slots[idx] == EMPTY {
                    self.slots[idx] = ordinal;
                    self.len += 1;
                    break;
                }
            }
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}
