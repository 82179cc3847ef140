use bytes::BytesMut;

use super::Common;
use crate::codec::mpeg_audio::{self, MpegAudioHeader};
use crate::error::Result;
use crate::frame::Frame;
use crate::packet::Packet;
use crate::reader::ReadStatus;
use crate::timecode::NANOS_PER_SECOND;
use crate::track::{AudioHeaders, TrackInfo, TrackType, codec_id};

/// Re-segments container chunks into MPEG audio frames.
///
/// Container chunk boundaries rarely coincide with frame boundaries, so
/// input is accumulated and frames are cut along the sync pattern. Each
/// frame is timestamped from the running sample counter.
#[derive(Debug)]
pub struct Mp3Packetizer {
    pub(super) common: Common,
    buffer: BytesMut,
    samples_output: u64,
    sampling_frequency: u32,
    channels: u32,
    params_checked: bool,
    bytes_skipped: u64,
}

impl Mp3Packetizer {
    /// Create an MP3 packetizer with the stream parameters the container
    /// claims. The first parsed frame header is checked against them;
    /// on mismatch the bitstream values win.
    pub fn new(info: TrackInfo, samples_per_sec: u32, channels: u32) -> Result<Self> {
        let mut common = Common::new(info, codec_id::A_MP3, TrackType::Audio);
        if channels == 0 {
            return Err(common.error_invalid_config("channel count is zero"));
        }
        if samples_per_sec == 0 {
            return Err(common.error_invalid_config("sampling frequency is zero"));
        }
        common.set_audio_params(AudioHeaders {
            sampling_freq: f64::from(samples_per_sec),
            output_sampling_freq: None,
            channels,
            bit_depth: None,
        });
        Ok(Self {
            common,
            buffer: BytesMut::new(),
            samples_output: 0,
            sampling_frequency: samples_per_sec,
            channels,
            params_checked: false,
            bytes_skipped: 0,
        })
    }

    fn check_params(&mut self, header: &MpegAudioHeader) {
        self.params_checked = true;
        if header.sampling_frequency == self.sampling_frequency && header.channels == self.channels {
            return;
        }
        let info = self.common.info();
        log::warn!(
            "'{}' track {}: the MPEG audio stream parameters ({} Hz, {} channels) differ from the \
             container's ({} Hz, {} channels); using the bitstream values",
            info.file_name,
            info.id,
            header.sampling_frequency,
            header.channels,
            self.sampling_frequency,
            self.channels,
        );
        self.sampling_frequency = header.sampling_frequency;
        self.channels = header.channels;
        if let Some(audio) = self.common.audio_params_mut() {
            audio.sampling_freq = f64::from(header.sampling_frequency);
            audio.channels = header.channels;
        }
        self.common.rerender_track_headers();
    }

    /// Accept one container chunk.
    pub fn process(&mut self, frame: Frame) -> Result<ReadStatus> {
        self.common.clear_avi_block_sizes();
        self.buffer.extend_from_slice(&frame.payload);

        while let Some((offset, header)) = mpeg_audio::find_frame(&self.buffer) {
            if offset > 0 {
                self.bytes_skipped += offset as u64;
                log::debug!(
                    "'{}' track {}: skipped {offset} bytes to the next MPEG audio sync",
                    self.common.info().file_name,
                    self.common.info().id,
                );
                let _ = self.buffer.split_to(offset);
            }
            if self.buffer.len() < header.frame_size {
                break;
            }

            if !self.params_checked {
                self.check_params(&header);
            }

            let payload = self.buffer.split_to(header.frame_size).freeze();
            let rate = i128::from(header.sampling_frequency);
            let timecode = (self.samples_output as i128 * NANOS_PER_SECOND as i128 / rate) as i64;
            let duration = (i128::from(header.samples_per_frame) * NANOS_PER_SECOND as i128 / rate) as i64;
            self.common.add_packet(Packet::key(payload, timecode, duration));
            self.samples_output += u64::from(header.samples_per_frame);
        }

        Ok(ReadStatus::MoreData)
    }

    /// Drop any trailing partial frame.
    pub fn flush(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            log::debug!(
                "'{}' track {}: discarding {} trailing bytes that do not form a complete MPEG audio frame",
                self.common.info().file_name,
                self.common.info().id,
                self.buffer.len(),
            );
            self.buffer.clear();
        }
        Ok(())
    }
}
