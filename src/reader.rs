//! The interface the muxing core requires from format-specific readers.

use std::fmt;

use crate::error::Result;
use crate::packetizer::{PacketizerId, PacketizerSet};
use crate::track::TrackType;

/// What a read step accomplished.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    /// Progress was made and more data remains.
    MoreData,
    /// The requested target is exhausted.
    Done,
}

/// How prominently a reader's progress should be displayed when several
/// files are muxed at once.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DisplayPriority {
    /// Progress is only shown when nothing better is available.
    Low,
    /// Default prominence.
    Medium,
    /// This reader drives the progress display (e.g. it owns the video
    /// track).
    High,
}

/// A source-file demultiplexer. One reader owns one input file and feeds
/// one or more packetizers.
pub trait Reader {
    /// Make progress for the given target packetizer: demux one unit of
    /// work and push the resulting frames into it (and possibly into
    /// sibling targets). Returns [`ReadStatus::Done`] when the target is
    /// exhausted.
    fn read(&mut self, target: PacketizerId, packetizers: &mut PacketizerSet) -> Result<ReadStatus>;

    /// The packetizers this reader feeds, in track order.
    fn packetizers(&self) -> Vec<PacketizerId>;

    /// Describe the file and its tracks without demuxing it.
    fn identify(&self) -> FileIdentification;

    /// How prominently this reader's progress should be displayed.
    fn display_priority(&self) -> DisplayPriority {
        DisplayPriority::Low
    }

    /// Print or update a progress report. `finished` is set once after
    /// the last block has been written.
    fn display_progress(&mut self, finished: bool) {
        let _ = finished;
    }
}

/// A cheap content probe: does the given file prefix look like this
/// reader's format?
pub trait FormatProbe {
    /// Inspect the first bytes of a file. Readers only need a magic
    /// number check here, nothing expensive.
    fn probe(data: &[u8]) -> bool;
}

/// One track row of a file identification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifiedTrack {
    /// Track id within the source file.
    pub id: i64,
    /// Track classification.
    pub track_type: TrackType,
    /// Codec label, e.g. a FourCC or `MP3`.
    pub codec: String,
}

/// The result of `identify()`: the container name and one row per track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentification {
    /// Name of the identified file.
    pub file_name: String,
    /// Container format label, e.g. `AVI`.
    pub container: String,
    /// The tracks found in the file.
    pub tracks: Vec<IdentifiedTrack>,
}

impl fmt::Display for FileIdentification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File '{}': container: {}", self.file_name, self.container)?;
        for track in &self.tracks {
            writeln!(f, "Track ID {}: {} ({})", track.id, track.track_type.label(), track.codec)?;
        }
        Ok(())
    }
}
