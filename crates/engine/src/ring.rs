//! Fixed-capacity ring buffer shared by the sensor histories, the water
//! predictor's moisture history, and the offline cache.
//!
//! The cursor/`wrapped` bookkeeping lives here once so none of the callers
//! carry their own modulo arithmetic.  Logical length is `index` until the
//! buffer has wrapped, then `N` forever; new pushes silently overwrite the
//! oldest entry.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ring<T, const N: usize> {
    slots: Vec<T>,
    index: usize,
    wrapped: bool,
}

impl<T, const N: usize> Default for Ring<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Ring<T, N> {
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(N),
            index: 0,
            wrapped: false,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Logical number of entries: `index` while filling, `N` once wrapped.
    pub fn len(&self) -> usize {
        if self.wrapped {
            N
        } else {
            self.index
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an entry, overwriting the oldest once at capacity.
    pub fn push(&mut self, value: T) {
        if self.slots.len() < N {
            self.slots.push(value);
        } else {
            self.slots[self.index] = value;
        }
        self.index = (self.index + 1) % N;
        if self.index == 0 {
            self.wrapped = true;
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.index = 0;
        self.wrapped = false;
    }

    /// Iterate from the oldest entry to the newest.
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = &T> {
        let len = self.len();
        let start = if self.wrapped { self.index } else { 0 };
        (0..len).map(move |i| &self.slots[(start + i) % N])
    }

    /// Iterate from the newest entry back to the oldest.
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &T> {
        let len = self.len();
        (0..len).map(move |i| &self.slots[(self.index + N - 1 - i) % N])
    }

    /// Structural sanity check for snapshots loaded from storage.  A blob
    /// from a different build or a torn write fails here and the caller
    /// falls back to an empty buffer.
    pub fn is_well_formed(&self) -> bool {
        if self.index >= N && N > 0 {
            return false;
        }
        if self.wrapped {
            self.slots.len() == N
        } else {
            self.slots.len() == self.index
        }
    }
}

impl<T: Copy, const N: usize> Ring<T, N> {
    /// Newest entry, if any.
    pub fn latest(&self) -> Option<T> {
        self.iter_newest_first().next().copied()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
