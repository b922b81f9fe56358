// Copyright (c) 2020 Helge Wrede, Alexander Schultheiß, Lukas Simon
// Copyright (c) 2022 Alexis Sellier
//
// Licensed under the MIT license.

//! Saturating counter vector.
use std::fmt::Debug;

/// Largest value a single counter can hold.
pub const MAX_COUNT: u8 = u8::MAX;

/// A fixed-length vector of 8-bit counters that saturate at [`MAX_COUNT`].
#[derive(Clone, PartialEq, Eq)]
pub struct CounterVec {
    counts: Vec<u8>,
}

impl CounterVec {
    /// Create a new counter vector with `len` counters, all set to zero.
    pub fn new(len: usize) -> Self {
        Self {
            counts: vec![0; len],
        }
    }

    /// Get the number of counters.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Check whether this vector is empty, ie. has a length of zero.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Increment a single counter by one. Counters never wrap: once a counter
    /// reaches [`MAX_COUNT`] it stays there.
    pub fn increment(&mut self, index: usize) {
        if index >= self.len() {
            panic!(
                "index out of bounds: the len is {} but the index is {}",
                self.len(),
                index,
            )
        }
        let count = &mut self.counts[index];
        *count = count.saturating_add(1);
    }

    /// Read a single counter.
    pub fn get(&self, index: usize) -> u8 {
        if index >= self.len() {
            panic!(
                "index out of bounds: the len is {} but the index is {}",
                self.len(),
                index,
            )
        }
        self.counts[index]
    }

    /// Count the counters holding a non-zero value.
    pub fn count_nonzero(&self) -> usize {
        self.counts.iter().filter(|c| **c != 0).count()
    }

    /// Return the underlying counters, one byte per counter.
    pub fn as_bytes(&self) -> &[u8] {
        &self.counts
    }
}

impl From<Vec<u8>> for CounterVec {
    fn from(counts: Vec<u8>) -> Self {
        Self { counts }
    }
}

impl From<CounterVec> for Vec<u8> {
    fn from(other: CounterVec) -> Vec<u8> {
        other.counts
    }
}

impl Debug for CounterVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CounterVec(len={}, nonzero={})",
            self.len(),
            self.count_nonzero()
        )
    }
}
