//! Random unique track UIDs.

use std::collections::HashSet;

use rand::Rng;

/// The set of track UIDs already handed out in this process. Matroska
/// requires UIDs to be non-zero and unique within one output file; this
/// enforces uniqueness by reject sampling.
#[derive(Debug, Default)]
pub struct UidSet {
    seen: HashSet<u32>,
}

impl UidSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a uniformly random `u32` from `[1, u32::MAX]` that has not
    /// been returned before.
    pub fn create_unique_u32<R: Rng>(&mut self, rng: &mut R) -> u32 {
        loop {
            let number = rng.random_range(1..=u32::MAX);
            if self.seen.insert(number) {
                return number;
            }
        }
    }

    /// Whether the given value has been handed out.
    pub fn contains(&self, number: u32) -> bool {
        self.seen.contains(&number)
    }

    /// How many UIDs have been handed out.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether no UID has been handed out yet.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
