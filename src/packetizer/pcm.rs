use bytes::{Bytes, BytesMut};

use super::Common;
use crate::error::Result;
use crate::frame::Frame;
use crate::packet::Packet;
use crate::reader::ReadStatus;
use crate::timecode::NANOS_PER_SECOND;
use crate::track::{AudioHeaders, TrackInfo, TrackType, codec_id};

/// Samples per emitted PCM packet.
pub const PCM_INTERLEAVE: u32 = 16;

/// Splits raw PCM into packets of a fixed interleave of
/// [`PCM_INTERLEAVE`] samples.
///
/// Timecodes are derived from the running byte-output counter, so
/// non-integer packet boundaries never accumulate drift: the sum of all
/// durations equals the stream duration to within one nanosecond.
#[derive(Debug)]
pub struct PcmPacketizer {
    pub(super) common: Common,
    packet_size: usize,
    bytes_per_second: u64,
    bytes_output: u64,
    /// Input carried across `process` calls until a full packet's worth
    /// of bytes is available.
    pending: BytesMut,
}

impl PcmPacketizer {
    /// Create a PCM packetizer for the given stream parameters.
    pub fn new(info: TrackInfo, samples_per_sec: u32, channels: u32, bits_per_sample: u32) -> Result<Self> {
        let mut common = Common::new(info, codec_id::A_PCM, TrackType::Audio);

        if channels == 0 {
            return Err(common.error_invalid_config("channel count is zero"));
        }
        if bits_per_sample == 0 || bits_per_sample % 8 != 0 {
            return Err(common.error_invalid_config(format!("unsupported sample depth {bits_per_sample}")));
        }
        if samples_per_sec == 0 {
            return Err(common.error_invalid_config("sampling frequency is zero"));
        }

        common.set_audio_params(AudioHeaders {
            sampling_freq: f64::from(samples_per_sec),
            output_sampling_freq: None,
            channels,
            bit_depth: Some(bits_per_sample),
        });

        let bytes_per_sample = channels * bits_per_sample / 8;
        Ok(Self {
            common,
            packet_size: (PCM_INTERLEAVE * bytes_per_sample) as usize,
            bytes_per_second: u64::from(samples_per_sec * bytes_per_sample),
            bytes_output: 0,
            pending: BytesMut::new(),
        })
    }

    fn timecode_at(&self, bytes: u64) -> i64 {
        (bytes as i128 * NANOS_PER_SECOND as i128 / self.bytes_per_second as i128) as i64
    }

    fn emit(&mut self, payload: Bytes) {
        let start = self.timecode_at(self.bytes_output);
        self.bytes_output += payload.len() as u64;
        let end = self.timecode_at(self.bytes_output);
        self.common.add_packet(Packet::key(payload, start, end - start));
    }

    /// Accept one chunk of raw PCM.
    pub fn process(&mut self, frame: Frame) -> Result<ReadStatus> {
        self.pending.extend_from_slice(&frame.payload);
        while self.pending.len() >= self.packet_size {
            let payload = self.pending.split_to(self.packet_size).freeze();
            self.emit(payload);
        }
        Ok(ReadStatus::MoreData)
    }

    /// Emit the final partial packet, if any bytes are pending.
    pub fn flush(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            let payload = self.pending.split().freeze();
            self.emit(payload);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packetizer() -> PcmPacketizer {
        PcmPacketizer::new(TrackInfo::new("a.avi", 1), 48_000, 2, 16).unwrap()
    }

    #[test]
    fn test_invalid_config() {
        assert!(PcmPacketizer::new(TrackInfo::new("a.avi", 1), 48_000, 0, 16).is_err());
        assert!(PcmPacketizer::new(TrackInfo::new("a.avi", 1), 48_000, 2, 0).is_err());
        assert!(PcmPacketizer::new(TrackInfo::new("a.avi", 1), 48_000, 2, 12).is_err());
        assert!(PcmPacketizer::new(TrackInfo::new("a.avi", 1), 0, 2, 16).is_err());
    }

    #[test]
    fn test_interleave_and_timecodes() {
        // 48 kHz stereo 16 bit: 64-byte packets, 192000 bytes/s.
        let mut p = packetizer();
        p.process(Frame::new(Bytes::from(vec![0u8; 160]), crate::frame::FrameType::Automatic))
            .unwrap();

        let first = p.common.pop_packet().unwrap();
        assert_eq!(first.payload.len(), 64);
        assert_eq!(first.timecode, 0);
        let second = p.common.pop_packet().unwrap();
        assert_eq!(second.timecode, 333_333);
        assert!(p.common.pop_packet().is_none());

        // 32 bytes pending; flush emits them as a short packet.
        p.flush().unwrap();
        let tail = p.common.pop_packet().unwrap();
        assert_eq!(tail.payload.len(), 32);
        assert_eq!(tail.timecode, 666_666);
        assert_eq!(
            first.duration + second.duration + tail.duration,
            (160i64 * 1_000_000_000 / 192_000)
        );
    }

    #[test]
    fn test_carry_across_chunk_boundaries() {
        let mut p = packetizer();
        // 100 + 100 bytes: packets at 64 and 128, 72 bytes pending.
        for _ in 0..2 {
            p.process(Frame::new(Bytes::from(vec![0u8; 100]), crate::frame::FrameType::Automatic))
                .unwrap();
        }
        let mut count = 0;
        while p.common.pop_packet().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
        p.flush().unwrap();
        assert_eq!(p.common.pop_packet().unwrap().payload.len(), 8);
    }
}
