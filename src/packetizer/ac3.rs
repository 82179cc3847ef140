use bytes::BytesMut;

use super::Common;
use crate::codec::ac3::{self, Ac3Header, SAMPLES_PER_FRAME};
use crate::error::Result;
use crate::frame::Frame;
use crate::packet::Packet;
use crate::reader::ReadStatus;
use crate::timecode::NANOS_PER_SECOND;
use crate::track::{AudioHeaders, TrackInfo, TrackType, codec_id};

/// Re-segments container chunks into AC-3 synchronization frames along
/// the `0x0B77` sync pattern. One packet per frame, 1536 samples each.
#[derive(Debug)]
pub struct Ac3Packetizer {
    pub(super) common: Common,
    buffer: BytesMut,
    frames_output: u64,
    sampling_frequency: u32,
    channels: u32,
    params_checked: bool,
}

impl Ac3Packetizer {
    /// Create an AC-3 packetizer with the stream parameters the container
    /// claims. The first parsed frame header is checked against them;
    /// on mismatch the bitstream values win.
    pub fn new(info: TrackInfo, samples_per_sec: u32, channels: u32) -> Result<Self> {
        let mut common = Common::new(info, codec_id::A_AC3, TrackType::Audio);
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
            frames_output: 0,
            sampling_frequency: samples_per_sec,
            channels,
            params_checked: false,
        })
    }

    fn check_params(&mut self, header: &Ac3Header) {
        self.params_checked = true;
        if header.sampling_frequency == self.sampling_frequency && header.channels == self.channels {
            return;
        }
        let info = self.common.info();
        log::warn!(
            "'{}' track {}: the AC-3 stream parameters ({} Hz, {} channels) differ from the \
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

        while let Some((offset, header)) = ac3::find_frame(&self.buffer) {
            if offset > 0 {
                log::debug!(
                    "'{}' track {}: skipped {offset} bytes to the next AC-3 sync",
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
            let samples = self.frames_output as i128 * i128::from(SAMPLES_PER_FRAME);
            let timecode = (samples * NANOS_PER_SECOND as i128 / rate) as i64;
            let duration = (i128::from(SAMPLES_PER_FRAME) * NANOS_PER_SECOND as i128 / rate) as i64;
            self.common.add_packet(Packet::key(payload, timecode, duration));
            self.frames_output += 1;
        }

        Ok(ReadStatus::MoreData)
    }

    /// Drop any trailing partial frame.
    pub fn flush(&mut self) -> Result<()> {
        self.buffer.clear();
        Ok(())
    }
}
