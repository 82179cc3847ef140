use crate::uid::UidSet;

/// Process-wide muxing state, passed explicitly instead of living in
/// globals: the verbosity level and the set of allocated track UIDs.
#[derive(Debug, Default)]
pub struct RuntimeContext {
    /// Verbosity level; 0 is quiet, higher values enable the
    /// informational notices the packetizers log.
    pub verbose: u8,
    /// Track UIDs handed out so far.
    pub uids: UidSet,
}

impl RuntimeContext {
    /// A context with verbosity 1, matching the historical default.
    pub fn new() -> Self {
        Self {
            verbose: 1,
            uids: UidSet::new(),
        }
    }

    /// Allocate a fresh track UID from the process-wide set.
    pub fn create_track_uid(&mut self) -> u32 {
        self.uids.create_unique_u32(&mut rand::rng())
    }
}
