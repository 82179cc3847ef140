#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

/// Error types for this crate.
mod error;
pub use error::*;

mod bitread;

/// Codec header parsers.
pub mod codec;
/// MPEG-4 part 2 bitstream services.
pub mod mpeg4;

mod context;
mod frame;
/// The output controller.
mod merge;
mod packet;
/// The per-track packetizer framework.
pub mod packetizer;
mod progress;
/// The reader interface.
mod reader;
/// The block-sink interface.
mod sink;
/// Timecode handling.
pub mod timecode;
mod track;
mod uid;

/// A prelude for common types and traits.
pub mod prelude {
    pub use crate::context::*;
    pub use crate::frame::*;
    pub use crate::merge::*;
    pub use crate::packet::*;
    pub use crate::packetizer::{
        AacPacketizer, Ac3Packetizer, Common, KeyframeHeuristic, Mp3Packetizer, Mpeg4P2Packetizer,
        Packetizer, PacketizerId, PacketizerSet, PcmPacketizer, VideoPacketizer,
    };
    pub use crate::progress::*;
    pub use crate::reader::*;
    pub use crate::sink::*;
    pub use crate::timecode::{FactoryMode, TimecodeFactory};
    pub use crate::track::*;
    pub use crate::uid::*;
}
