//! MPEG-4 part 2 bitstream services: start-code scanning, frame typing,
//! VOL header parsing (picture size, pixel aspect ratio, timing
//! resolution), codec configuration capture and the DivX packed-bitstream
//! marker patch.
//!
//! Everything here works on plain byte slices; the reordering packetizer
//! decides what to do with the results.

use bytes::Bytes;

use crate::bitread::BitReader;
use crate::frame::FrameType;

/// Start-code suffix of the visual object sequence header.
pub const START_CODE_VOS: u8 = 0xb0;
/// Start-code suffix of a group-of-VOPs header.
pub const START_CODE_GOP: u8 = 0xb3;
/// Start-code suffix of a user-data block.
pub const START_CODE_USER_DATA: u8 = 0xb2;
/// Start-code suffix of a VOP (one coded picture).
pub const START_CODE_VOP: u8 = 0xb6;

/// One sub-frame found inside a demuxed buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// Byte offset of the sub-frame within the scanned buffer.
    pub offset: usize,
    /// Size of the sub-frame in bytes.
    pub size: usize,
    /// Classification from the VOP coding type; [`FrameType::NVop`] for a
    /// not-coded VOP.
    pub frame_type: FrameType,
    /// The `vop_coded` bit. Not-coded VOPs are dummy placeholders.
    pub is_coded: bool,
}

/// Picture parameters extracted from a video object layer header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VolInfo {
    /// Coded picture width in pixels.
    pub width: u32,
    /// Coded picture height in pixels.
    pub height: u32,
    /// Number of bits in each VOP's `vop_time_increment` field.
    pub time_increment_bits: u32,
    /// Pixel aspect ratio as (numerator, denominator), when signalled.
    pub par: Option<(u32, u32)>,
}

/// Find the next `00 00 01 xx` start code at or after `from`. Returns the
/// offset of the `00 00 01` prefix and the code suffix.
fn next_start_code(buf: &[u8], from: usize) -> Option<(usize, u8)> {
    let mut i = from;
    while i + 3 < buf.len() {
        if buf[i] == 0x00 && buf[i + 1] == 0x00 && buf[i + 2] == 0x01 {
            return Some((i, buf[i + 3]));
        }
        i += 1;
    }
    None
}

fn is_vol_code(code: u8) -> bool {
    (0x20..=0x2f).contains(&code)
}

/// Split a demuxed buffer at VOP start codes and classify each sub-frame.
///
/// The first sub-frame starts at offset 0 so that configuration headers
/// preceding the first VOP stay attached to it. `time_increment_bits` is
/// needed to reach the `vop_coded` flag; pass 0 when no VOL has been seen
/// yet and every VOP is assumed coded.
pub fn find_frame_types(buf: &[u8], time_increment_bits: u32) -> Vec<VideoFrame> {
    let mut frames = Vec::new();
    let mut vop_starts = Vec::new();

    let mut pos = 0;
    while let Some((at, code)) = next_start_code(buf, pos) {
        if code == START_CODE_VOP {
            vop_starts.push(at);
        }
        pos = at + 3;
    }

    for (n, &at) in vop_starts.iter().enumerate() {
        let offset = if n == 0 { 0 } else { at };
        let end = vop_starts.get(n + 1).copied().unwrap_or(buf.len());
        let (frame_type, is_coded) = classify_vop(&buf[at + 4..end], time_increment_bits);
        frames.push(VideoFrame {
            offset,
            size: end - offset,
            frame_type,
            is_coded,
        });
    }

    frames
}

/// Read the VOP coding type and, when the timing resolution is known,
/// the `vop_coded` flag.
fn classify_vop(body: &[u8], time_increment_bits: u32) -> (FrameType, bool) {
    let mut r = BitReader::new(body);
    let frame_type = match r.read_bits(2) {
        Some(0) => FrameType::I,
        Some(2) => FrameType::B,
        // P and S(GMC) frames both carry a single backward reference.
        Some(_) => FrameType::P,
        None => return (FrameType::P, true),
    };

    if time_increment_bits == 0 {
        return (frame_type, true);
    }

    let coded = (|| {
        // modulo_time_base is coded in unary.
        loop {
            match r.read_bit()? {
                0 => break,
                _ => continue,
            }
        }
        r.skip(1)?; // marker
        r.skip(time_increment_bits as usize)?;
        r.skip(1)?; // marker
        r.flag()
    })();

    match coded {
        Some(false) => (FrameType::NVop, false),
        _ => (frame_type, true),
    }
}

/// Extract the codec configuration data (everything up to the first VOP
/// or GOP start code) from the first frame of a stream. Returns `None`
/// when the prefix is empty or contains no VOL header, in which case the
/// stream cannot be stored natively.
pub fn parse_config_data(buf: &[u8]) -> Option<Bytes> {
    let mut end = buf.len();
    let mut has_vol = false;

    let mut pos = 0;
    while let Some((at, code)) = next_start_code(buf, pos) {
        if code == START_CODE_VOP || code == START_CODE_GOP {
            end = at;
            break;
        }
        if is_vol_code(code) {
            has_vol = true;
        }
        pos = at + 3;
    }

    if end == 0 || !has_vol {
        return None;
    }
    Some(Bytes::copy_from_slice(&buf[..end]))
}

/// Parse the first video object layer header found in the buffer.
pub fn parse_vol(buf: &[u8]) -> Option<VolInfo> {
    let mut pos = 0;
    let vol_at = loop {
        let (at, code) = next_start_code(buf, pos)?;
        if is_vol_code(code) {
            break at;
        }
        pos = at + 3;
    };

    let mut r = BitReader::new(&buf[vol_at + 4..]);

    r.skip(1)?; // random_accessible_vol
    r.skip(8)?; // video_object_type_indication
    if r.flag()? {
        // is_object_layer_identifier
        r.skip(4)?; // video_object_layer_verid
        r.skip(3)?; // video_object_layer_priority
    }

    let aspect_ratio_info = r.read_bits(4)?;
    let par = match aspect_ratio_info {
        1 => Some((1, 1)),
        2 => Some((12, 11)),
        3 => Some((10, 11)),
        4 => Some((16, 11)),
        5 => Some((40, 33)),
        15 => {
            let num = r.read_bits(8)?;
            let den = r.read_bits(8)?;
            if num == 0 || den == 0 { None } else { Some((num, den)) }
        }
        _ => None,
    };

    if r.flag()? {
        // vol_control_parameters
        r.skip(2)?; // chroma_format
        r.skip(1)?; // low_delay
        if r.flag()? {
            // vbv_parameters
            r.skip(15 + 1 + 15 + 1)?; // bit rate halves + markers
            r.skip(15 + 1 + 3)?; // vbv buffer size halves
            r.skip(11 + 1 + 15 + 1)?; // vbv occupancy halves + markers
        }
    }

    let shape = r.read_bits(2)?;
    if shape != 0 {
        // Only rectangular VOLs carry the width/height fields parsed here.
        return None;
    }

    r.skip(1)?; // marker
    let resolution = r.read_bits(16)?;
    r.skip(1)?; // marker
    let time_increment_bits = time_increment_bits(resolution);
    if r.flag()? {
        // fixed_vop_rate
        r.skip(time_increment_bits as usize)?;
    }

    r.skip(1)?; // marker
    let width = r.read_bits(13)?;
    r.skip(1)?; // marker
    let height = r.read_bits(13)?;

    if width == 0 || height == 0 {
        return None;
    }

    Some(VolInfo {
        width,
        height,
        time_increment_bits,
        par,
    })
}

/// Number of bits used to code a VOP time increment for the given
/// `vop_time_increment_resolution`.
fn time_increment_bits(resolution: u32) -> u32 {
    if resolution < 2 {
        return 1;
    }
    32 - (resolution - 1).leading_zeros()
}

/// Extract the coded picture size from the bitstream, if a VOL header is
/// present.
pub fn extract_size(buf: &[u8]) -> Option<(u32, u32)> {
    parse_vol(buf).map(|vol| (vol.width, vol.height))
}

/// Extract the pixel aspect ratio from the bitstream, if a VOL header
/// with PAR information is present.
pub fn extract_par(buf: &[u8]) -> Option<(u32, u32)> {
    parse_vol(buf).and_then(|vol| vol.par)
}

/// Patch the trailing packed-bitstream marker inside a DivX user-data
/// string from `p` to `n`, signalling the unpacked (native) layout that
/// the reordering packetizer produces. A no-op when the configuration
/// data carries no such string.
pub fn fix_codec_string(data: &mut [u8]) {
    let mut pos = 0;
    while let Some((at, code)) = next_start_code(data, pos) {
        pos = at + 3;
        if code != START_CODE_USER_DATA {
            continue;
        }

        let body = at + 4;
        if data.len() < body + 4 || !data[body..body + 4].eq_ignore_ascii_case(b"divx") {
            continue;
        }

        let tail = &mut data[body + 4..];
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        if end > 0 && tail[end - 1] == b'p' {
            tail[end - 1] = b'n';
        }
        return;
    }
}

/// Keyframe test for DivX 3 payloads: the first four bytes, read as a
/// little-endian `u32`, have bit 30 clear for keyframes.
pub fn is_divx3_keyframe(data: &[u8]) -> bool {
    if data.len() < 4 {
        return false;
    }
    let word = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    word & 0x4000_0000 == 0
}

/// Keyframe test for MPEG-4 part 2 payloads, scanning for the first
/// meaningful start code. `None` when no start code is found and the
/// container's own flag should be trusted.
pub fn is_keyframe(data: &[u8]) -> Option<bool> {
    let mut pos = 0;
    while let Some((at, code)) = next_start_code(data, pos) {
        if code == 0x00 || code == START_CODE_VOS {
            return Some(true);
        }
        if code == START_CODE_VOP {
            let type_bits = *data.get(at + 4)? & 0xc0;
            return Some(type_bits == 0x00);
        }
        pos = at + 3;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// MSB-first bit assembler for synthesizing headers.
    struct BitWriter {
        bytes: Vec<u8>,
        bits: u32,
        acc: u64,
    }

    impl BitWriter {
        fn new() -> Self {
            Self {
                bytes: Vec::new(),
                bits: 0,
                acc: 0,
            }
        }

        fn put(&mut self, value: u32, n: u32) -> &mut Self {
            self.acc = (self.acc << n) | u64::from(value);
            self.bits += n;
            while self.bits >= 8 {
                self.bits -= 8;
                self.bytes.push((self.acc >> self.bits) as u8);
            }
            self
        }

        fn finish(mut self) -> Vec<u8> {
            if self.bits > 0 {
                let pad = 8 - self.bits;
                self.put(0, pad);
            }
            self.bytes
        }
    }

    /// A VOL header: 352x288, PAR 12:11, time increment resolution 25.
    fn sample_vol() -> Vec<u8> {
        let mut w = BitWriter::new();
        w.put(0, 1) // random_accessible_vol
            .put(1, 8) // video_object_type_indication
            .put(0, 1) // is_object_layer_identifier
            .put(2, 4) // aspect_ratio_info: 12:11
            .put(0, 1) // vol_control_parameters
            .put(0, 2) // shape: rectangular
            .put(1, 1) // marker
            .put(25, 16) // vop_time_increment_resolution
            .put(1, 1) // marker
            .put(0, 1) // fixed_vop_rate
            .put(1, 1) // marker
            .put(352, 13)
            .put(1, 1) // marker
            .put(288, 13);
        let mut out = vec![0x00, 0x00, 0x01, 0x20];
        out.extend(w.finish());
        out
    }

    fn vop(frame_type: u32, coded: bool) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.put(frame_type, 2)
            .put(0, 1) // modulo_time_base terminator
            .put(1, 1) // marker
            .put(0, 5) // vop_time_increment (resolution 25 -> 5 bits)
            .put(1, 1) // marker
            .put(u32::from(coded), 1)
            .put(0, 7); // filler
        let mut out = vec![0x00, 0x00, 0x01, 0xb6];
        out.extend(w.finish());
        out
    }

    #[test]
    fn test_parse_vol() {
        let vol = sample_vol();
        let info = parse_vol(&vol).unwrap();
        assert_eq!(info.width, 352);
        assert_eq!(info.height, 288);
        assert_eq!(info.par, Some((12, 11)));
        assert_eq!(info.time_increment_bits, 5);

        assert_eq!(extract_size(&vol), Some((352, 288)));
        assert_eq!(extract_par(&vol), Some((12, 11)));
        assert_eq!(parse_vol(&[0x00, 0x00, 0x01, 0xb6, 0x00]), None);
    }

    #[test]
    fn test_time_increment_bits() {
        let test_pair = [(1, 1), (2, 1), (3, 2), (25, 5), (30000, 15), (65535, 16)];
        for (resolution, bits) in test_pair {
            assert_eq!(time_increment_bits(resolution), bits, "resolution {resolution}");
        }
    }

    #[test]
    fn test_config_data_ends_at_first_vop() {
        let mut stream = vec![0x00, 0x00, 0x01, 0xb0, 0xf5];
        stream.extend(sample_vol());
        let config_len = stream.len();
        stream.extend(vop(0, true));

        let config = parse_config_data(&stream).unwrap();
        assert_eq!(&config[..], &stream[..config_len]);

        // A stream starting directly with a VOP has no config data.
        assert_eq!(parse_config_data(&vop(0, true)), None);
        // A prefix without a VOL does not count as config data.
        let mut no_vol = vec![0x00, 0x00, 0x01, 0xb0, 0xf5];
        no_vol.extend(vop(0, true));
        assert_eq!(parse_config_data(&no_vol), None);
    }

    #[test]
    fn test_find_frame_types() {
        let mut stream = sample_vol();
        let config_len = stream.len();
        stream.extend(vop(0, true)); // I
        let vop_len = stream.len() - config_len;
        stream.extend(vop(1, true)); // P
        stream.extend(vop(2, true)); // B
        stream.extend(vop(1, false)); // not coded

        let frames = find_frame_types(&stream, 5);
        assert_eq!(frames.len(), 4);

        // The config prefix stays glued to the first sub-frame.
        assert_eq!(frames[0].offset, 0);
        assert_eq!(frames[0].size, config_len + vop_len);
        assert_eq!(frames[0].frame_type, FrameType::I);

        assert_eq!(frames[1].frame_type, FrameType::P);
        assert_eq!(frames[2].frame_type, FrameType::B);
        assert_eq!(frames[3].frame_type, FrameType::NVop);
        assert!(!frames[3].is_coded);

        // Without the timing resolution the not-coded VOP reads as P.
        let frames = find_frame_types(&stream, 0);
        assert_eq!(frames[3].frame_type, FrameType::P);
        assert!(frames[3].is_coded);
    }

    #[test]
    fn test_fix_codec_string() {
        let mut data = vec![0x00, 0x00, 0x01, 0x20, 0xaa];
        data.extend(b"\x00\x00\x01\xb2DivX503b1393p\x00");
        fix_codec_string(&mut data);
        assert!(data.windows(13).any(|w| w == b"DivX503b1393n"));

        // Unterminated string, marker at the very end.
        let mut data = b"\x00\x00\x01\xb2divx42p".to_vec();
        fix_codec_string(&mut data);
        assert_eq!(&data[data.len() - 1..], b"n");

        // No user data: untouched.
        let mut data = sample_vol();
        let before = data.clone();
        fix_codec_string(&mut data);
        assert_eq!(data, before);
    }

    #[test]
    fn test_divx3_keyframe_bit() {
        assert!(is_divx3_keyframe(&[0x00, 0x00, 0x00, 0x00]));
        // Bit 30 of the little-endian word is byte 3, bit 6.
        assert!(!is_divx3_keyframe(&[0x00, 0x00, 0x00, 0x40]));
        assert!(is_divx3_keyframe(&[0xff, 0xff, 0xff, 0x80]));
        assert!(!is_divx3_keyframe(&[0x00]));
    }

    #[test]
    fn test_is_keyframe_scan() {
        assert_eq!(is_keyframe(&vop(0, true)), Some(true));
        assert_eq!(is_keyframe(&vop(1, true)), Some(false));
        assert_eq!(is_keyframe(&vop(2, true)), Some(false));
        // A VOL prefix is skipped; the VOP decides.
        let mut with_config = sample_vol();
        with_config.extend(vop(1, true));
        assert_eq!(is_keyframe(&with_config), Some(false));
        // A VOS/VO start code before any VOP marks a random access point.
        assert_eq!(is_keyframe(&[0x00, 0x00, 0x01, 0xb0, 0xf5]), Some(true));
        assert_eq!(is_keyframe(b"no start code here"), None);
    }
}
