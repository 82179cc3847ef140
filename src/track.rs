//! Track configuration and the rendered track-header record.

use bytes::Bytes;

/// Matroska track classification.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrackType {
    /// A video track.
    Video,
    /// An audio track.
    Audio,
    /// A subtitle track.
    Subtitle,
}

impl TrackType {
    /// Lower-case label as printed by `identify()`.
    pub fn label(&self) -> &'static str {
        match self {
            TrackType::Video => "video",
            TrackType::Audio => "audio",
            TrackType::Subtitle => "subtitle",
        }
    }
}

/// Matroska codec identifiers emitted by the packetizers in this crate.
pub mod codec_id {
    /// MPEG-4 part 2 advanced simple profile, native storage.
    pub const V_MPEG4_ASP: &str = "V_MPEG4/ISO/ASP";
    /// Video wrapped in a Microsoft BITMAPINFOHEADER (non-native storage).
    pub const V_MSCOMP: &str = "V_MS/VFW/FOURCC";
    /// MPEG-1/2 audio layer III.
    pub const A_MP3: &str = "A_MPEG/L3";
    /// AC-3 audio.
    pub const A_AC3: &str = "A_AC3";
    /// Little-endian integer PCM audio.
    pub const A_PCM: &str = "A_PCM/INT/LIT";
    /// MPEG-4 AAC prefix; the profile suffix is appended per stream.
    pub const A_AAC_MPEG4: &str = "A_AAC/MPEG4";
}

/// Configuration for one output track. Created by the caller, consumed by
/// a packetizer at construction, and immutable during processing except
/// for the fields the packetizer itself updates (codec private data
/// extracted from the bitstream).
#[derive(Debug, Clone, Default)]
pub struct TrackInfo {
    /// Name of the source file, used in messages and errors.
    pub file_name: String,
    /// Track id within the source file.
    pub id: i64,
    /// Codec private data, if the container carried any.
    pub private: Option<Bytes>,
    /// Display aspect ratio, if explicitly given by the user or container.
    pub aspect_ratio: Option<f32>,
    /// Explicit display width, overriding any derived value.
    pub display_width: Option<u32>,
    /// Explicit display height, overriding any derived value.
    pub display_height: Option<u32>,
    /// ISO-639-2 language code.
    pub language: Option<String>,
    /// Block alignment from an AVI WAVEFORMATEX header.
    pub avi_block_align: u16,
    /// Average bytes per second from an AVI WAVEFORMATEX header.
    pub avi_avg_bytes_per_sec: u32,
    /// Samples per chunk from an AVI stream header.
    pub avi_samples_per_chunk: u32,
    /// Position in the user-requested track order. Tracks without one are
    /// ordered after all tracks that have one, in creation order.
    pub order: Option<usize>,
}

impl TrackInfo {
    /// Convenience constructor with the two fields every track has.
    pub fn new(file_name: impl Into<String>, id: i64) -> Self {
        Self {
            file_name: file_name.into(),
            id,
            ..Self::default()
        }
    }
}

/// Video-specific track-header fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoHeaders {
    /// Coded picture width in pixels.
    pub pixel_width: u32,
    /// Coded picture height in pixels.
    pub pixel_height: u32,
    /// Display width; defaults to the pixel width when absent.
    pub display_width: Option<u32>,
    /// Display height; defaults to the pixel height when absent.
    pub display_height: Option<u32>,
}

/// Audio-specific track-header fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioHeaders {
    /// Sampling frequency in Hz.
    pub sampling_freq: f64,
    /// Real output sampling frequency, when it differs (SBR doubling).
    pub output_sampling_freq: Option<f64>,
    /// Channel count.
    pub channels: u32,
    /// Bits per sample, for PCM-like codecs.
    pub bit_depth: Option<u32>,
}

/// The logical track-header record handed to the block sink. The sink
/// serializes it into a Matroska TrackEntry.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackHeaders {
    /// The unique non-zero track UID.
    pub uid: u32,
    /// Track classification.
    pub track_type: TrackType,
    /// Matroska codec identifier.
    pub codec_id: String,
    /// Codec private bytes, if any.
    pub codec_private: Option<Bytes>,
    /// ISO-639-2 language code, if any.
    pub language: Option<String>,
    /// Video fields; present exactly for video tracks.
    pub video: Option<VideoHeaders>,
    /// Audio fields; present exactly for audio tracks.
    pub audio: Option<AudioHeaders>,
}
