use super::Common;
use crate::error::Result;
use crate::frame::{Frame, FrameType};
use crate::mpeg4;
use crate::packet::{Packet, References};
use crate::reader::ReadStatus;
use crate::timecode::NANOS_PER_SECOND;
use crate::track::{TrackInfo, TrackType, VideoHeaders, codec_id};

/// Payload family of a VFW-wrapped video track, decided from the
/// BITMAPINFOHEADER compression fourcc. Controls how key status is
/// derived for frames the reader tagged [`FrameType::Automatic`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum KeyframeHeuristic {
    /// Unknown payload format; `Automatic` frames count as non-key.
    #[default]
    None,
    /// DivX 3 family: the first four payload bytes, read as a
    /// little-endian `u32`, have bit 30 clear for keyframes.
    Divx3,
    /// MPEG-4 part 2 family: the first VOP start code carries the coding
    /// type.
    Mpeg4,
}

impl KeyframeHeuristic {
    /// Classify a VFW compression fourcc, case-insensitively.
    pub fn from_fourcc(fourcc: &[u8]) -> Self {
        const DIVX3: [&[u8; 4]; 4] = [b"DIV3", b"AP41", b"MPG3", b"MP43"];
        const MPEG4: [&[u8; 4]; 5] = [b"MP42", b"DIV2", b"DIVX", b"XVID", b"DX50"];

        if DIVX3.iter().any(|f| fourcc.eq_ignore_ascii_case(&f[..])) {
            KeyframeHeuristic::Divx3
        } else if MPEG4.iter().any(|f| fourcc.eq_ignore_ascii_case(&f[..])) {
            KeyframeHeuristic::Mpeg4
        } else {
            KeyframeHeuristic::None
        }
    }
}

/// Generic video passthrough: frames go out as they come in, wrapped in
/// `V_MS/VFW/FOURCC` with the container's BITMAPINFOHEADER as codec
/// private data. Frames the reader could not classify have their key
/// status re-derived from the payload where the codec family allows;
/// timecodes are synthesized from the frame rate when absent.
#[derive(Debug)]
pub struct VideoPacketizer {
    pub(super) common: Common,
    fps: f64,
    keyframe_heuristic: KeyframeHeuristic,
    frames_output: u64,
    last_ref: Option<i64>,
}

impl VideoPacketizer {
    /// Create a passthrough video packetizer. The keyframe heuristic is
    /// picked from the compression fourcc inside the track's
    /// BITMAPINFOHEADER private data, when present.
    pub fn new(info: TrackInfo, fps: f64, width: u32, height: u32) -> Result<Self> {
        let mut common = Common::new(info, codec_id::V_MSCOMP, TrackType::Video);
        if width == 0 || height == 0 {
            return Err(common.error_invalid_config(format!("impossible picture size {width}x{height}")));
        }
        common.set_video_params(VideoHeaders {
            pixel_width: width,
            pixel_height: height,
            display_width: None,
            display_height: None,
        });

        // biCompression sits at offset 16 of a BITMAPINFOHEADER.
        let keyframe_heuristic = common
            .info()
            .private
            .as_ref()
            .filter(|bih| bih.len() >= 20)
            .map(|bih| KeyframeHeuristic::from_fourcc(&bih[16..20]))
            .unwrap_or_default();

        Ok(Self {
            common,
            fps,
            keyframe_heuristic,
            frames_output: 0,
            last_ref: None,
        })
    }

    /// The keyframe heuristic in use for `Automatic`-tagged frames.
    pub fn keyframe_heuristic(&self) -> KeyframeHeuristic {
        self.keyframe_heuristic
    }

    pub(super) fn next_timecode(&self) -> Option<i64> {
        if self.fps > 0.0 {
            Some((self.frames_output as f64 * NANOS_PER_SECOND as f64 / self.fps) as i64)
        } else {
            None
        }
    }

    pub(super) fn default_duration(&self) -> i64 {
        if self.fps > 0.0 {
            (NANOS_PER_SECOND as f64 / self.fps) as i64
        } else {
            0
        }
    }

    /// Key-or-P frames carry no classification from the container; read
    /// it out of the payload where the codec family allows.
    fn derive_keyframe(&self, payload: &[u8]) -> bool {
        match self.keyframe_heuristic {
            KeyframeHeuristic::Divx3 => mpeg4::is_divx3_keyframe(payload),
            KeyframeHeuristic::Mpeg4 => mpeg4::is_keyframe(payload).unwrap_or(false),
            KeyframeHeuristic::None => false,
        }
    }

    /// Accept one frame.
    pub fn process(&mut self, frame: Frame) -> Result<ReadStatus> {
        let timecode = match frame.timecode.or_else(|| self.next_timecode()) {
            Some(t) => t,
            None => return Err(self.common.error_no_timing()),
        };
        let duration = frame.duration.unwrap_or_else(|| self.default_duration());

        let key = match frame.frame_type {
            FrameType::I => true,
            FrameType::Automatic => self.derive_keyframe(&frame.payload),
            FrameType::P | FrameType::B | FrameType::NVop => false,
        };
        // The very first frame has nothing to refer to and goes out as a
        // key regardless.
        let references = if key || self.last_ref.is_none() {
            References::None
        } else {
            References::P {
                prev: self.last_ref.unwrap_or_default(),
            }
        };
        self.last_ref = Some(timecode);

        self.common
            .add_packet(Packet::with_references(frame.payload, timecode, duration, references));
        self.frames_output += 1;
        Ok(ReadStatus::MoreData)
    }

    /// Passthrough holds no inter-call state; nothing to drain.
    pub fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    /// A minimal BITMAPINFOHEADER with the given compression fourcc.
    fn bih(fourcc: &[u8; 4]) -> Bytes {
        let mut data = vec![0u8; 40];
        data[0] = 40; // biSize
        data[16..20].copy_from_slice(fourcc);
        Bytes::from(data)
    }

    fn packetizer_for(fourcc: &[u8; 4]) -> VideoPacketizer {
        let mut info = TrackInfo::new("a.avi", 0);
        info.private = Some(bih(fourcc));
        VideoPacketizer::new(info, 25.0, 320, 240).unwrap()
    }

    #[test]
    fn test_fourcc_classification() {
        let test_pair = [
            (*b"DIV3", KeyframeHeuristic::Divx3),
            (*b"ap41", KeyframeHeuristic::Divx3),
            (*b"MPG3", KeyframeHeuristic::Divx3),
            (*b"MP43", KeyframeHeuristic::Divx3),
            (*b"DIVX", KeyframeHeuristic::Mpeg4),
            (*b"xvid", KeyframeHeuristic::Mpeg4),
            (*b"DX50", KeyframeHeuristic::Mpeg4),
            (*b"MP42", KeyframeHeuristic::Mpeg4),
            (*b"DIV2", KeyframeHeuristic::Mpeg4),
            (*b"H263", KeyframeHeuristic::None),
        ];
        for (fourcc, heuristic) in test_pair {
            assert_eq!(KeyframeHeuristic::from_fourcc(&fourcc), heuristic);
            assert_eq!(packetizer_for(&fourcc).keyframe_heuristic(), heuristic);
        }
        // No private data at all: nothing to classify by.
        let p = VideoPacketizer::new(TrackInfo::new("a.avi", 0), 25.0, 320, 240).unwrap();
        assert_eq!(p.keyframe_heuristic(), KeyframeHeuristic::None);
    }

    #[test]
    fn test_automatic_frames_derive_keys_from_mpeg4_payloads() {
        let mut p = packetizer_for(b"XVID");
        // VOP start code with coding type in the top two payload bits.
        let i_vop = Bytes::from_static(&[0x00, 0x00, 0x01, 0xb6, 0x00, 0x00]);
        let p_vop = Bytes::from_static(&[0x00, 0x00, 0x01, 0xb6, 0x40, 0x00]);

        p.process(Frame::new(i_vop.clone(), FrameType::Automatic)).unwrap();
        p.process(Frame::new(p_vop, FrameType::Automatic)).unwrap();
        p.process(Frame::new(i_vop, FrameType::Automatic)).unwrap();

        let first = p.common.pop_packet().unwrap();
        assert_eq!(first.timecode, 0);
        assert_eq!(first.duration, 40_000_000);
        assert!(first.references.is_key());

        let second = p.common.pop_packet().unwrap();
        assert_eq!(second.timecode, 40_000_000);
        assert_eq!(second.references, References::P { prev: 0 });

        // A mid-stream I VOP is recognized as a new key frame.
        let third = p.common.pop_packet().unwrap();
        assert_eq!(third.timecode, 80_000_000);
        assert!(third.references.is_key());
    }

    #[test]
    fn test_automatic_frames_use_the_divx3_bit() {
        let mut p = packetizer_for(b"DIV3");
        // Bit 30 of the little-endian word is byte 3, bit 6.
        let key_frame = Bytes::from_static(&[0x00, 0x00, 0x00, 0x00, 0xaa]);
        let delta_frame = Bytes::from_static(&[0x00, 0x00, 0x00, 0x40, 0xaa]);

        p.process(Frame::new(key_frame.clone(), FrameType::Automatic)).unwrap();
        p.process(Frame::new(delta_frame, FrameType::Automatic)).unwrap();
        p.process(Frame::new(key_frame, FrameType::Automatic)).unwrap();

        assert!(p.common.pop_packet().unwrap().references.is_key());
        assert_eq!(
            p.common.pop_packet().unwrap().references,
            References::P { prev: 0 }
        );
        assert!(p.common.pop_packet().unwrap().references.is_key());
    }

    #[test]
    fn test_unknown_payloads_trust_the_reader() {
        let mut p = packetizer_for(b"H263");
        for frame_type in [FrameType::I, FrameType::Automatic, FrameType::I] {
            p.process(Frame::new(Bytes::from_static(b"fr"), frame_type)).unwrap();
        }

        assert!(p.common.pop_packet().unwrap().references.is_key());
        // Underivable key status counts as non-key.
        assert_eq!(
            p.common.pop_packet().unwrap().references,
            References::P { prev: 0 }
        );
        assert!(p.common.pop_packet().unwrap().references.is_key());
    }

    #[test]
    fn test_no_timing_is_fatal() {
        let mut p = VideoPacketizer::new(TrackInfo::new("a.avi", 0), 0.0, 320, 240).unwrap();
        assert!(p.process(Frame::new(Bytes::from_static(b"fr"), FrameType::I)).is_err());
        // With an explicit timecode it works.
        assert!(
            p.process(Frame::new(Bytes::from_static(b"fr"), FrameType::I).timecode(0))
                .is_ok()
        );
    }

    #[test]
    fn test_source_timecodes_pass_through() {
        let mut p = VideoPacketizer::new(TrackInfo::new("a.avi", 0), 25.0, 320, 240).unwrap();
        p.process(
            Frame::new(Bytes::from_static(b"fr"), FrameType::I)
                .timecode(100)
                .duration(50),
        )
        .unwrap();
        let packet = p.common.pop_packet().unwrap();
        assert_eq!(packet.timecode, 100);
        assert_eq!(packet.duration, 50);
    }
}
