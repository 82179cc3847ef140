//! Codec header parsers used by the audio packetizers to re-segment
//! container chunks into codec-native frames.

pub mod aac;
pub mod ac3;
pub mod mpeg_audio;
