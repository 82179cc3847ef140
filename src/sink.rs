//! The interface between the muxing core and the Matroska byte-level
//! writer.

use bytes::Bytes;

use crate::error::Result;
use crate::packet::References;
use crate::track::TrackHeaders;

/// One finalized block, ready for serialization into a cluster.
#[derive(Debug)]
pub struct Block {
    /// UID of the track the block belongs to.
    pub track_uid: u32,
    /// Timecode in nanoseconds.
    pub timecode: i64,
    /// Duration in nanoseconds.
    pub duration: i64,
    /// The payload bytes.
    pub payload: Bytes,
    /// Reference timecodes; empty for key blocks.
    pub references: References,
}

/// Consumer of the muxer's output: track headers first, then blocks in
/// emission order, then a final `finish`.
pub trait BlockSink {
    /// Accept a track's headers. Called once per track before any of its
    /// blocks, and possibly again near the end of the mux when a
    /// packetizer re-rendered its headers from extracted metadata; the
    /// writer should then update the stored TrackEntry in place.
    fn add_track(&mut self, headers: &TrackHeaders) -> Result<()>;

    /// Accept one finalized block.
    fn write_block(&mut self, block: Block) -> Result<()>;

    /// The mux is complete; finalize the output.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A sink that keeps everything in memory. Used by the test suite and
/// handy for inspecting a mux without a real writer.
#[derive(Debug, Default)]
pub struct CollectSink {
    /// Track headers in the order they were added; re-renders appear as
    /// additional entries with the same UID.
    pub tracks: Vec<TrackHeaders>,
    /// Blocks in emission order.
    pub blocks: Vec<Block>,
    /// Whether `finish` has been called.
    pub finished: bool,
}

impl CollectSink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The blocks belonging to the given track.
    pub fn blocks_for(&self, track_uid: u32) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(move |b| b.track_uid == track_uid)
    }
}

impl BlockSink for CollectSink {
    fn add_track(&mut self, headers: &TrackHeaders) -> Result<()> {
        self.tracks.push(headers.clone());
        Ok(())
    }

    fn write_block(&mut self, block: Block) -> Result<()> {
        self.blocks.push(block);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
