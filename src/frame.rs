use bytes::Bytes;

use crate::timecode;

/// Classification of one codec access unit as received from a source
/// demuxer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameType {
    /// Key frame, self-decodable, no references.
    I,
    /// Forward-predicted frame, one past reference.
    P,
    /// Bidirectionally predicted frame, one past and one future reference.
    B,
    /// A not-coded dummy MPEG-4 frame; may be dropped.
    NVop,
    /// Key-or-P; the packetizer derives the real type from the payload.
    Automatic,
}

/// One codec access unit handed from a reader to a packetizer.
#[derive(Debug)]
pub struct Frame {
    /// The payload bytes. Exclusively owned until handed to a packet.
    pub payload: Bytes,
    /// Source timecode in nanoseconds, if the container supplied one.
    pub timecode: Option<i64>,
    /// Source duration in nanoseconds, if the container supplied one.
    pub duration: Option<i64>,
    /// Frame classification.
    pub frame_type: FrameType,
}

impl Frame {
    /// A frame with no source timing.
    pub fn new(payload: Bytes, frame_type: FrameType) -> Self {
        Self {
            payload,
            timecode: None,
            duration: None,
            frame_type,
        }
    }

    /// A frame with timing given in the external `-1`-sentinel form, as
    /// readers receive it from container libraries.
    pub fn with_raw_timing(payload: Bytes, frame_type: FrameType, timecode: i64, duration: i64) -> Self {
        Self {
            payload,
            timecode: timecode::from_raw(timecode),
            duration: timecode::from_raw(duration),
            frame_type,
        }
    }

    /// Builder-style source timecode.
    pub fn timecode(mut self, timecode: i64) -> Self {
        self.timecode = Some(timecode);
        self
    }

    /// Builder-style source duration.
    pub fn duration(mut self, duration: i64) -> Self {
        self.duration = Some(duration);
        self
    }
}
