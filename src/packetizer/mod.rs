//! The per-track packetizer framework.
//!
//! A packetizer accepts raw [`Frame`]s from its reader, transforms them
//! into Matroska-native form (which may involve re-segmentation,
//! reordering, reference assignment and config-data extraction) and
//! queues fully-formed [`Packet`]s for the muxer to drain.
//!
//! The variants are a tagged union over one capability set; the only
//! shared state is [`Common`], holding the track configuration, the
//! rendered headers and the output queue.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::context::RuntimeContext;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::packet::Packet;
use crate::reader::ReadStatus;
use crate::timecode::FactoryMode;
use crate::track::{AudioHeaders, TrackHeaders, TrackInfo, TrackType, VideoHeaders};

mod aac;
mod ac3;
mod mp3;
mod mpeg4_p2;
mod pcm;
mod video;

pub use aac::AacPacketizer;
pub use ac3::Ac3Packetizer;
pub use mp3::Mp3Packetizer;
pub use mpeg4_p2::Mpeg4P2Packetizer;
pub use pcm::{PCM_INTERLEAVE, PcmPacketizer};
pub use video::{KeyframeHeuristic, VideoPacketizer};

/// Index of a packetizer within the muxer's [`PacketizerSet`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PacketizerId(pub(crate) usize);

impl PacketizerId {
    /// The raw index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// State shared by every packetizer variant.
#[derive(Debug)]
pub struct Common {
    info: TrackInfo,
    codec_id: String,
    track_type: TrackType,
    factory_mode: FactoryMode,
    uid: Option<u32>,
    headers: Option<TrackHeaders>,
    headers_stale: bool,
    queue: VecDeque<Packet>,
    video: Option<VideoHeaders>,
    audio: Option<AudioHeaders>,
    avi_block_sizes: VecDeque<usize>,
    packets_emitted: u64,
}

impl Common {
    pub(crate) fn new(info: TrackInfo, codec_id: impl Into<String>, track_type: TrackType) -> Self {
        Self {
            info,
            codec_id: codec_id.into(),
            track_type,
            factory_mode: FactoryMode::None,
            uid: None,
            headers: None,
            headers_stale: false,
            queue: VecDeque::new(),
            video: None,
            audio: None,
            avi_block_sizes: VecDeque::new(),
            packets_emitted: 0,
        }
    }

    /// The track configuration this packetizer was built from.
    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    /// The Matroska codec id this track will be written with.
    pub fn codec_id(&self) -> &str {
        &self.codec_id
    }

    /// Track classification.
    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    /// The timecode-factory application mode of this packetizer.
    pub fn factory_mode(&self) -> FactoryMode {
        self.factory_mode
    }

    /// The allocated track UID; `None` before the first header render.
    pub fn uid(&self) -> Option<u32> {
        self.uid
    }

    /// Packets emitted so far on this track.
    pub fn packets_emitted(&self) -> u64 {
        self.packets_emitted
    }

    pub(crate) fn set_codec_id(&mut self, codec_id: impl Into<String>) {
        self.codec_id = codec_id.into();
        self.headers_stale = true;
    }

    pub(crate) fn set_factory_mode(&mut self, mode: FactoryMode) {
        self.factory_mode = mode;
    }

    pub(crate) fn set_video_params(&mut self, params: VideoHeaders) {
        self.video = Some(params);
    }

    pub(crate) fn set_audio_params(&mut self, params: AudioHeaders) {
        self.audio = Some(params);
    }

    pub(crate) fn video_params(&self) -> Option<&VideoHeaders> {
        self.video.as_ref()
    }

    pub(crate) fn audio_params_mut(&mut self) -> Option<&mut AudioHeaders> {
        self.audio.as_mut()
    }

    /// Queue one finished packet for the muxer.
    pub(crate) fn add_packet(&mut self, packet: Packet) {
        debug_assert!(packet.timecode >= 0);
        debug_assert!(packet.duration >= 0);
        debug_assert!(!packet.payload.is_empty());
        self.packets_emitted += 1;
        self.queue.push_back(packet);
    }

    /// Timecode of the oldest queued packet.
    pub fn peek_timecode(&self) -> Option<i64> {
        self.queue.front().map(|p| p.timecode)
    }

    /// Hand the oldest queued packet to the caller.
    pub fn pop_packet(&mut self) -> Option<Packet> {
        self.queue.pop_front()
    }

    /// Whether no packet is currently queued.
    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Render the track headers from the current metadata. Idempotent;
    /// allocates the UID on the first call.
    pub fn set_headers(&mut self, ctx: &mut RuntimeContext) {
        let uid = *self.uid.get_or_insert_with(|| ctx.create_track_uid());

        let video = self.video.clone().map(|mut v| {
            let (display_width, display_height) = self.display_dimensions(&v);
            v.display_width = display_width;
            v.display_height = display_height;
            v
        });

        self.headers = Some(TrackHeaders {
            uid,
            track_type: self.track_type,
            codec_id: self.codec_id.clone(),
            codec_private: self.info.private.clone(),
            language: self.info.language.clone(),
            video,
            audio: self.audio.clone(),
        });
        self.headers_stale = false;
    }

    /// Display dimensions from, in order of precedence: explicit track
    /// configuration, the aspect ratio (given or extracted), the coded
    /// picture size.
    fn display_dimensions(&self, v: &VideoHeaders) -> (Option<u32>, Option<u32>) {
        if self.info.display_width.is_some() || self.info.display_height.is_some() {
            return (self.info.display_width, self.info.display_height);
        }
        if let Some(aspect) = self.info.aspect_ratio {
            if v.pixel_width == 0 || v.pixel_height == 0 {
                return (None, None);
            }
            let pixel_aspect = v.pixel_width as f32 / v.pixel_height as f32;
            return if aspect > pixel_aspect {
                (Some((v.pixel_height as f32 * aspect).round() as u32), Some(v.pixel_height))
            } else {
                (Some(v.pixel_width), Some((v.pixel_width as f32 / aspect).round() as u32))
            };
        }
        (v.display_width, v.display_height)
    }

    /// The rendered headers, if `set_headers` has run.
    pub fn headers(&self) -> Option<&TrackHeaders> {
        self.headers.as_ref()
    }

    /// Whether metadata changed since the last header render.
    pub fn headers_stale(&self) -> bool {
        self.headers_stale
    }

    /// Mark the rendered headers stale so the muxer re-renders and
    /// re-emits them.
    pub fn rerender_track_headers(&mut self) {
        self.headers_stale = true;
    }

    /// Install new codec private data, e.g. extracted from the bitstream.
    pub fn set_codec_private(&mut self, private: Bytes) {
        self.info.private = Some(private);
        self.headers_stale = true;
    }

    /// Override the coded picture width.
    pub fn set_video_pixel_width(&mut self, width: u32) {
        if let Some(v) = self.video.as_mut() {
            v.pixel_width = width;
            self.headers_stale = true;
        }
    }

    /// Override the coded picture height.
    pub fn set_video_pixel_height(&mut self, height: u32) {
        if let Some(v) = self.video.as_mut() {
            v.pixel_height = height;
            self.headers_stale = true;
        }
    }

    /// Mark the display aspect ratio as given, e.g. after extracting it
    /// from the bitstream. Display dimensions are derived from it at the
    /// next header render.
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.info.aspect_ratio = Some(aspect);
        self.headers_stale = true;
    }

    /// Set the real output sampling frequency (SBR doubling).
    pub fn set_audio_output_sampling_freq(&mut self, freq: f64) {
        if let Some(a) = self.audio.as_mut() {
            a.output_sampling_freq = Some(freq);
            self.headers_stale = true;
        }
    }

    /// Record the size of one source container block, as AVI readers
    /// report it before each `process` call. Codecs without their own
    /// framing (raw AAC) use the recorded boundaries to split chunks.
    pub fn add_avi_block_size(&mut self, size: usize) {
        self.avi_block_sizes.push_back(size);
    }

    pub(crate) fn pop_avi_block_size(&mut self) -> Option<usize> {
        self.avi_block_sizes.pop_front()
    }

    /// Self-framing codecs resync on their own headers and ignore the
    /// recorded block boundaries.
    pub(crate) fn clear_avi_block_sizes(&mut self) {
        self.avi_block_sizes.clear();
    }

    // Error constructors with this track's context attached.

    pub(crate) fn error_invalid_config(&self, reason: impl Into<String>) -> Error {
        Error::InvalidConfig {
            file: self.info.file_name.clone(),
            id: self.info.id,
            reason: reason.into(),
        }
    }

    pub(crate) fn error_missing_config(&self) -> Error {
        Error::MissingConfig {
            file: self.info.file_name.clone(),
            id: self.info.id,
        }
    }

    pub(crate) fn error_no_timing(&self) -> Error {
        Error::NoTimingInfo {
            file: self.info.file_name.clone(),
            id: self.info.id,
        }
    }

    pub(crate) fn error_format(&self, reason: impl Into<String>) -> Error {
        Error::Format {
            file: self.info.file_name.clone(),
            id: self.info.id,
            reason: reason.into(),
        }
    }
}

/// A packetizer for one output track.
#[derive(Debug)]
pub enum Packetizer {
    /// Raw PCM audio.
    Pcm(PcmPacketizer),
    /// MPEG audio layer III.
    Mp3(Mp3Packetizer),
    /// AC-3 audio.
    Ac3(Ac3Packetizer),
    /// AAC audio.
    Aac(AacPacketizer),
    /// Generic video passthrough.
    Video(VideoPacketizer),
    /// MPEG-4 part 2 video with reordering.
    Mpeg4P2(Mpeg4P2Packetizer),
}

impl Packetizer {
    /// Accept one frame; zero or more packets become available.
    pub fn process(&mut self, frame: Frame) -> Result<ReadStatus> {
        match self {
            Packetizer::Pcm(p) => p.process(frame),
            Packetizer::Mp3(p) => p.process(frame),
            Packetizer::Ac3(p) => p.process(frame),
            Packetizer::Aac(p) => p.process(frame),
            Packetizer::Video(p) => p.process(frame),
            Packetizer::Mpeg4P2(p) => p.process(frame),
        }
    }

    /// Drain internally queued state at end of stream.
    pub fn flush(&mut self) -> Result<()> {
        match self {
            Packetizer::Pcm(p) => p.flush(),
            Packetizer::Mp3(p) => p.flush(),
            Packetizer::Ac3(p) => p.flush(),
            Packetizer::Aac(p) => p.flush(),
            Packetizer::Video(p) => p.flush(),
            Packetizer::Mpeg4P2(p) => p.flush(),
        }
    }

    /// The shared state.
    pub fn common(&self) -> &Common {
        match self {
            Packetizer::Pcm(p) => &p.common,
            Packetizer::Mp3(p) => &p.common,
            Packetizer::Ac3(p) => &p.common,
            Packetizer::Aac(p) => &p.common,
            Packetizer::Video(p) => &p.common,
            Packetizer::Mpeg4P2(p) => &p.common,
        }
    }

    /// The shared state, mutable.
    pub fn common_mut(&mut self) -> &mut Common {
        match self {
            Packetizer::Pcm(p) => &mut p.common,
            Packetizer::Mp3(p) => &mut p.common,
            Packetizer::Ac3(p) => &mut p.common,
            Packetizer::Aac(p) => &mut p.common,
            Packetizer::Video(p) => &mut p.common,
            Packetizer::Mpeg4P2(p) => &mut p.common,
        }
    }

    /// Render (or re-render) this track's headers.
    pub fn set_headers(&mut self, ctx: &mut RuntimeContext) {
        self.common_mut().set_headers(ctx);
    }
}

impl From<PcmPacketizer> for Packetizer {
    fn from(p: PcmPacketizer) -> Self {
        Packetizer::Pcm(p)
    }
}
impl From<Mp3Packetizer> for Packetizer {
    fn from(p: Mp3Packetizer) -> Self {
        Packetizer::Mp3(p)
    }
}
impl From<Ac3Packetizer> for Packetizer {
    fn from(p: Ac3Packetizer) -> Self {
        Packetizer::Ac3(p)
    }
}
impl From<AacPacketizer> for Packetizer {
    fn from(p: AacPacketizer) -> Self {
        Packetizer::Aac(p)
    }
}
impl From<VideoPacketizer> for Packetizer {
    fn from(p: VideoPacketizer) -> Self {
        Packetizer::Video(p)
    }
}
impl From<Mpeg4P2Packetizer> for Packetizer {
    fn from(p: Mpeg4P2Packetizer) -> Self {
        Packetizer::Mpeg4P2(p)
    }
}

/// The muxer's collection of packetizers. Readers receive it during
/// `read` to push frames into their targets.
#[derive(Debug, Default)]
pub struct PacketizerSet {
    items: Vec<Packetizer>,
}

impl PacketizerSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a packetizer and return its id.
    pub fn add(&mut self, packetizer: impl Into<Packetizer>) -> PacketizerId {
        self.items.push(packetizer.into());
        PacketizerId(self.items.len() - 1)
    }

    /// Look up a packetizer.
    pub fn get(&self, id: PacketizerId) -> Option<&Packetizer> {
        self.items.get(id.0)
    }

    /// Look up a packetizer, mutable.
    pub fn get_mut(&mut self, id: PacketizerId) -> Option<&mut Packetizer> {
        self.items.get_mut(id.0)
    }

    /// Number of registered packetizers.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no packetizer is registered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over `(id, packetizer)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (PacketizerId, &Packetizer)> {
        self.items.iter().enumerate().map(|(i, p)| (PacketizerId(i), p))
    }

    /// Iterate mutably over `(id, packetizer)` pairs.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PacketizerId, &mut Packetizer)> {
        self.items.iter_mut().enumerate().map(|(i, p)| (PacketizerId(i), p))
    }
}
