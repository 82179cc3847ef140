use std::collections::VecDeque;

use bytes::Bytes;

use super::Common;
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameType};
use crate::mpeg4;
use crate::packet::{Packet, References};
use crate::reader::ReadStatus;
use crate::timecode::{FactoryMode, TimecodeFactory};
use crate::track::{TrackInfo, TrackType, VideoHeaders, codec_id};

/// A sub-frame queued for reordering. The payload is a deep copy of the
/// relevant slice of the originating frame, because sub-frames outlive
/// the `process` call that delivered them.
#[derive(Debug)]
struct QueuedFrame {
    payload: Bytes,
    frame_type: FrameType,
    is_coded: bool,
    timecode: Option<i64>,
    duration: Option<i64>,
}

/// The MPEG-4 part 2 video packetizer.
///
/// In passthrough mode (input layout equals output layout) frames are
/// forwarded like the generic video packetizer, with the keyframe flag
/// re-derived from the bitstream where the reader could not classify.
///
/// The core job is the non-native to native conversion: AVI-style sources
/// deliver frames in coded order with B frames interleaved and often
/// supply only a frame rate. This engine splits each chunk into VOPs,
/// holds up to two reference frames (the backward and the forward
/// reference) plus the B frames coded between them, assigns display
/// timecodes in display order and emits blocks with explicit reference
/// timecodes.
#[derive(Debug)]
pub struct Mpeg4P2Packetizer {
    pub(super) common: Common,
    fps: f64,
    factory: TimecodeFactory,
    time_increment_bits: u32,
    ref_frames: VecDeque<QueuedFrame>,
    b_frames: VecDeque<QueuedFrame>,
    input_is_native: bool,
    output_is_native: bool,
    size_extracted: bool,
    aspect_ratio_extracted: bool,
    frames_processed: u64,
    drop_nvops: bool,
    // Passthrough state.
    frames_output: u64,
    last_ref: Option<i64>,
}

impl Mpeg4P2Packetizer {
    /// Create an MPEG-4 part 2 packetizer.
    ///
    /// `input_is_native` describes the source layout; `output_native`
    /// requests native output regardless (it is implied when the input is
    /// already native). Non-native output keeps the container's
    /// BITMAPINFOHEADER private data and the `V_MS/VFW/FOURCC` codec id.
    pub fn new(
        info: TrackInfo,
        fps: f64,
        width: u32,
        height: u32,
        input_is_native: bool,
        output_native: bool,
    ) -> Result<Self> {
        let output_is_native = output_native || input_is_native;
        let mut common = Common::new(
            info,
            if output_is_native { codec_id::V_MPEG4_ASP } else { codec_id::V_MSCOMP },
            TrackType::Video,
        );
        if width == 0 || height == 0 {
            return Err(common.error_invalid_config(format!("impossible picture size {width}x{height}")));
        }

        if output_is_native && !input_is_native {
            // The container's private data describes the non-native
            // layout; it is replaced by the VOL headers extracted from
            // the first frame.
            common.info.private = None;
        }

        common.set_video_params(VideoHeaders {
            pixel_width: width,
            pixel_height: height,
            display_width: None,
            display_height: None,
        });
        common.set_factory_mode(FactoryMode::ShortQueueing);

        Ok(Self {
            common,
            fps,
            factory: TimecodeFactory::new(FactoryMode::ShortQueueing, fps),
            time_increment_bits: 0,
            ref_frames: VecDeque::new(),
            b_frames: VecDeque::new(),
            input_is_native,
            output_is_native,
            size_extracted: false,
            aspect_ratio_extracted: false,
            frames_processed: 0,
            drop_nvops: false,
            frames_output: 0,
            last_ref: None,
        })
    }

    /// Skip emission of not-coded dummy frames. Their queued timecodes
    /// are still consumed so the clock does not slip.
    pub fn set_drop_nvops(&mut self, drop: bool) {
        self.drop_nvops = drop;
    }

    /// Accept one demuxed chunk, which may contain several VOPs.
    pub fn process(&mut self, frame: Frame) -> Result<ReadStatus> {
        self.frames_processed += 1;
        if !self.size_extracted {
            self.extract_size(&frame.payload);
        }
        if !self.aspect_ratio_extracted {
            self.extract_aspect_ratio(&frame.payload);
        }

        if self.input_is_native == self.output_is_native {
            return self.process_passthrough(frame);
        }
        if self.input_is_native {
            // Native to non-native conversion is not implemented; the
            // frames are dropped.
            return Ok(ReadStatus::MoreData);
        }
        self.process_non_native(frame)
    }

    /// Drain the reorder queues at end of stream.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_frames(true)
    }

    fn process_passthrough(&mut self, frame: Frame) -> Result<ReadStatus> {
        let timecode = match frame.timecode.or_else(|| self.next_passthrough_timecode()) {
            Some(t) => t,
            None => return Err(self.common.error_no_timing()),
        };
        let duration = frame.duration.unwrap_or_else(|| self.default_duration());

        let key = match frame.frame_type {
            FrameType::I => true,
            FrameType::B | FrameType::P | FrameType::NVop => false,
            FrameType::Automatic => mpeg4::is_keyframe(&frame.payload).unwrap_or(false),
        };
        let references = if key || self.last_ref.is_none() {
            References::None
        } else {
            References::P {
                prev: self.last_ref.unwrap_or_default(),
            }
        };
        self.last_ref = Some(timecode);
        self.frames_output += 1;

        self.common
            .add_packet(Packet::with_references(frame.payload, timecode, duration, references));
        Ok(ReadStatus::MoreData)
    }

    fn next_passthrough_timecode(&self) -> Option<i64> {
        if self.fps > 0.0 {
            Some((self.frames_output as f64 * 1e9 / self.fps) as i64)
        } else {
            None
        }
    }

    fn default_duration(&self) -> i64 {
        if self.fps > 0.0 { (1e9 / self.fps) as i64 } else { 0 }
    }

    fn process_non_native(&mut self, frame: Frame) -> Result<ReadStatus> {
        if self.common.info().private.is_none() {
            match mpeg4::parse_config_data(&frame.payload) {
                Some(config) => {
                    let mut data = config.to_vec();
                    mpeg4::fix_codec_string(&mut data);
                    if let Some(vol) = mpeg4::parse_vol(&data) {
                        self.time_increment_bits = vol.time_increment_bits;
                    }
                    self.common.set_codec_private(Bytes::from(data));
                }
                None => return Err(self.common.error_missing_config()),
            }
        }

        let sub_frames = mpeg4::find_frame_types(&frame.payload, self.time_increment_bits);

        if let Some(timecode) = frame.timecode {
            self.factory.push_timecode(timecode);
        } else if self.fps <= 0.0 {
            return Err(self.common.error_no_timing());
        }
        if let Some(duration) = frame.duration {
            self.factory.push_duration(duration);
        }

        for sub in sub_frames {
            // Queued reference state can be flushed now, but only when
            // the new frame is not a B frame.
            if sub.frame_type != FrameType::B {
                self.flush_frames(false)?;
            }

            let queued = QueuedFrame {
                payload: Bytes::copy_from_slice(&frame.payload[sub.offset..sub.offset + sub.size]),
                frame_type: sub.frame_type,
                is_coded: sub.is_coded,
                timecode: None,
                duration: None,
            };
            if sub.frame_type == FrameType::B {
                self.b_frames.push_back(queued);
            } else {
                self.ref_frames.push_back(queued);
            }
        }

        Ok(ReadStatus::MoreData)
    }

    fn next_timecode(&mut self) -> Result<(i64, i64)> {
        self.factory.next().ok_or_else(|| self.common.error_no_timing())
    }

    /// Emit everything the queued reference state allows.
    ///
    /// With one queued reference this is the first I/P of the stream: it
    /// receives a timecode and goes out as a key packet, staying queued
    /// as the future backward reference. With two, every buffered B frame
    /// receives a timecode in FIFO (display) order, then the forward
    /// reference; the forward reference is emitted first (decode order),
    /// then the B frames with both reference timecodes. The backward
    /// reference is dropped and the forward one takes its place.
    fn flush_frames(&mut self, end_of_file: bool) -> Result<()> {
        if self.ref_frames.is_empty() {
            return Ok(());
        }

        if self.ref_frames.len() == 1 {
            let needs_timecode = self.ref_frames[0].timecode.is_none();
            if needs_timecode {
                let (timecode, duration) = self.next_timecode()?;
                let frame = &mut self.ref_frames[0];
                frame.timecode = Some(timecode);
                frame.duration = Some(duration);
                let packet = Packet::key(frame.payload.clone(), timecode, duration);
                self.common.add_packet(packet);
            }
            if end_of_file {
                self.ref_frames.clear();
            }
            return Ok(());
        }

        let bref_timecode = self.ref_frames[0]
            .timecode
            .ok_or_else(|| Error::Programming("backward reference frame was never assigned a timecode".into()))?;

        for index in 0..self.b_frames.len() {
            let (timecode, duration) = self.next_timecode()?;
            self.b_frames[index].timecode = Some(timecode);
            self.b_frames[index].duration = Some(duration);
        }
        let (fref_timecode, fref_duration) = self.next_timecode()?;

        let mut fref_packet = None;
        if let Some(fref) = self.ref_frames.back_mut() {
            fref.timecode = Some(fref_timecode);
            fref.duration = Some(fref_duration);

            if fref.is_coded || !self.drop_nvops {
                let references = if fref.frame_type == FrameType::I {
                    References::None
                } else {
                    References::P { prev: bref_timecode }
                };
                fref_packet = Some(Packet::with_references(
                    fref.payload.clone(),
                    fref_timecode,
                    fref_duration,
                    references,
                ));
            }
        }
        if let Some(packet) = fref_packet {
            self.common.add_packet(packet);
        }

        for b in self.b_frames.drain(..) {
            if b.is_coded || !self.drop_nvops {
                let packet = Packet::with_references(
                    b.payload,
                    b.timecode.unwrap_or_default(),
                    b.duration.unwrap_or_default(),
                    References::B {
                        prev: bref_timecode,
                        next: fref_timecode,
                    },
                );
                self.common.add_packet(packet);
            }
        }

        self.ref_frames.pop_front();
        if end_of_file {
            self.ref_frames.clear();
        }
        Ok(())
    }

    /// Try to read the coded picture size from the bitstream. On success
    /// the extracted values override the container's; until then the
    /// attempt repeats, giving up after the 50th frame.
    fn extract_size(&mut self, payload: &[u8]) {
        match mpeg4::extract_size(payload) {
            Some((width, height)) => {
                self.size_extracted = true;

                let current = self
                    .common
                    .video_params()
                    .map(|v| (v.pixel_width, v.pixel_height));
                if current == Some((width, height)) {
                    return;
                }

                self.common.set_video_pixel_width(width);
                self.common.set_video_pixel_height(height);

                if !self.output_is_native {
                    self.patch_bitmap_info_header(width, height);
                }

                let info = self.common.info();
                log::info!(
                    "'{}' track {}: the extracted video width and height ({width}x{height}) differ \
                     from the values in the source container; the bitstream values will be used",
                    info.file_name,
                    info.id,
                );
            }
            None if self.frames_processed >= 50 => self.size_extracted = true,
            None => {}
        }
    }

    /// Rewrite the picture size inside a BITMAPINFOHEADER codec private
    /// blob so the non-native headers match the bitstream.
    fn patch_bitmap_info_header(&mut self, width: u32, height: u32) {
        let Some(private) = self.common.info().private.clone() else {
            return;
        };
        if private.len() < 12 {
            return;
        }
        let mut data = private.to_vec();
        data[4..8].copy_from_slice(&width.to_le_bytes());
        data[8..12].copy_from_slice(&height.to_le_bytes());
        self.common.set_codec_private(Bytes::from(data));
    }

    /// Try to read the pixel aspect ratio from the bitstream and derive
    /// the display dimensions. Skipped when the user or container already
    /// fixed them; gives up after the 50th frame.
    fn extract_aspect_ratio(&mut self, payload: &[u8]) {
        let info = self.common.info();
        if info.aspect_ratio.is_some() || info.display_width.is_some() || info.display_height.is_some() {
            self.aspect_ratio_extracted = true;
            return;
        }

        match mpeg4::extract_par(payload) {
            Some((num, den)) => {
                self.aspect_ratio_extracted = true;
                let Some((pixel_width, pixel_height)) = self
                    .common
                    .video_params()
                    .map(|v| (v.pixel_width, v.pixel_height))
                else {
                    return;
                };
                let aspect = pixel_width as f32 / pixel_height as f32 * num as f32 / den as f32;
                self.common.set_aspect_ratio(aspect);

                let info = self.common.info();
                log::info!(
                    "'{}' track {}: extracted the aspect ratio information from the MPEG-4 part 2 \
                     video data and set the display dimensions accordingly ({num}:{den} PAR)",
                    info.file_name,
                    info.id,
                );
            }
            None if self.frames_processed >= 50 => self.aspect_ratio_extracted = true,
            None => {}
        }
    }
}
