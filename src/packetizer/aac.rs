use super::Common;
use crate::codec::aac::{self, AacConfig};
use crate::error::Result;
use crate::frame::Frame;
use crate::packet::Packet;
use crate::reader::ReadStatus;
use crate::timecode::NANOS_PER_SECOND;
use crate::track::{AudioHeaders, TrackInfo, TrackType};

/// Emits one packet per AAC access unit.
///
/// Raw AAC has no in-band framing, so multi-unit container chunks are
/// split along the block boundaries the reader records with
/// `add_avi_block_size` before each `process` call.
#[derive(Debug)]
pub struct AacPacketizer {
    pub(super) common: Common,
    config: AacConfig,
    units_output: u64,
}

impl AacPacketizer {
    /// Create an AAC packetizer. The track's codec private data must hold
    /// a 2- or 5-byte AudioSpecificConfig; its values override the
    /// container's claimed parameters.
    pub fn new(info: TrackInfo, samples_per_sec: u32, channels: u32) -> Result<Self> {
        let mut common = Common::new(info, "", TrackType::Audio);

        let private = match common.info().private.clone() {
            Some(p) => p,
            None => return Err(common.error_invalid_config("AAC track carries no AudioSpecificConfig")),
        };
        if private.len() != 2 && private.len() != 5 {
            return Err(common.error_invalid_config(format!(
                "the AudioSpecificConfig size is {} bytes, expected were 2 or 5 bytes",
                private.len()
            )));
        }
        let config = match aac::parse_audio_specific_config(&private) {
            Some(c) => c,
            None => return Err(common.error_invalid_config("could not parse the AudioSpecificConfig")),
        };

        if config.sampling_frequency != samples_per_sec || config.channels != channels {
            let info = common.info();
            log::warn!(
                "'{}' track {}: the AAC configuration ({} Hz, {} channels) differs from the \
                 container's claims ({} Hz, {} channels); using the configuration values",
                info.file_name,
                info.id,
                config.sampling_frequency,
                config.channels,
                samples_per_sec,
                channels,
            );
        }

        common.set_codec_id(config.codec_id());
        common.set_audio_params(AudioHeaders {
            sampling_freq: f64::from(config.sampling_frequency),
            output_sampling_freq: None,
            channels: config.channels,
            bit_depth: None,
        });
        if config.sbr {
            common.set_audio_output_sampling_freq(f64::from(config.output_sampling_frequency));
        }

        Ok(Self {
            common,
            config,
            units_output: 0,
        })
    }

    /// The parsed AudioSpecificConfig.
    pub fn config(&self) -> &AacConfig {
        &self.config
    }

    fn emit(&mut self, payload: bytes::Bytes) {
        let samples_per_unit = i128::from(self.config.samples_per_frame());
        let rate = i128::from(self.config.output_sampling_frequency);
        let samples = self.units_output as i128 * samples_per_unit;
        let timecode = (samples * NANOS_PER_SECOND as i128 / rate) as i64;
        let duration = (samples_per_unit * NANOS_PER_SECOND as i128 / rate) as i64;
        self.common.add_packet(Packet::key(payload, timecode, duration));
        self.units_output += 1;
    }

    /// Accept one container chunk holding one or more access units.
    pub fn process(&mut self, frame: Frame) -> Result<ReadStatus> {
        let mut payload = frame.payload;
        if payload.is_empty() {
            return Err(self.common.error_format("empty AAC access unit"));
        }

        while !payload.is_empty() {
            let take = match self.common.pop_avi_block_size() {
                Some(size) if size > 0 && size <= payload.len() => size,
                _ => payload.len(),
            };
            let unit = payload.split_to(take);
            self.emit(unit);
        }

        Ok(ReadStatus::MoreData)
    }

    /// AAC holds no inter-call state; nothing to drain.
    pub fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameType;
    use bytes::Bytes;

    fn lc_48k_info() -> TrackInfo {
        let mut info = TrackInfo::new("a.avi", 4);
        info.private = Some(Bytes::from_static(&[0x11, 0x90]));
        info
    }

    #[test]
    fn test_lc_duration() {
        let mut p = AacPacketizer::new(lc_48k_info(), 48_000, 2).unwrap();
        assert_eq!(p.common.codec_id(), "A_AAC/MPEG4/LC");

        p.process(Frame::new(Bytes::from(vec![1u8; 200]), FrameType::Automatic)).unwrap();
        p.process(Frame::new(Bytes::from(vec![2u8; 210]), FrameType::Automatic)).unwrap();

        let first = p.common.pop_packet().unwrap();
        assert_eq!(first.timecode, 0);
        assert_eq!(first.duration, 1024 * 1_000_000_000 / 48_000);
        let second = p.common.pop_packet().unwrap();
        assert_eq!(second.timecode, 21_333_333);
    }

    #[test]
    fn test_chunk_split_along_avi_blocks() {
        let mut p = AacPacketizer::new(lc_48k_info(), 48_000, 2).unwrap();
        p.common.add_avi_block_size(120);
        p.common.add_avi_block_size(80);
        p.process(Frame::new(Bytes::from(vec![0u8; 200]), FrameType::Automatic)).unwrap();

        assert_eq!(p.common.pop_packet().unwrap().payload.len(), 120);
        assert_eq!(p.common.pop_packet().unwrap().payload.len(), 80);
        assert!(p.common.pop_packet().is_none());
    }

    #[test]
    fn test_sbr_sets_output_rate() {
        let mut info = TrackInfo::new("a.avi", 4);
        info.private = Some(Bytes::from_static(&[0x13, 0x12, 0xb7, 0x2c, 0xc0]));
        let mut p = AacPacketizer::new(info, 24_000, 2).unwrap();
        assert_eq!(p.common.codec_id(), "A_AAC/MPEG4/LC/SBR");

        p.process(Frame::new(Bytes::from(vec![0u8; 64]), FrameType::Automatic)).unwrap();
        let packet = p.common.pop_packet().unwrap();
        // 2048 samples at the doubled output rate.
        assert_eq!(packet.duration, 2048 * 1_000_000_000 / 48_000);
    }

    #[test]
    fn test_invalid_config() {
        // Missing private data.
        assert!(AacPacketizer::new(TrackInfo::new("a.avi", 4), 48_000, 2).is_err());
        // Wrong size.
        let mut info = TrackInfo::new("a.avi", 4);
        info.private = Some(Bytes::from_static(&[0x11, 0x90, 0x00]));
        assert!(AacPacketizer::new(info, 48_000, 2).is_err());
    }
}
