//! MPEG-1/2/2.5 audio frame headers (MP3 and friends).

/// MPEG audio version, from the header's version id field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MpegVersion {
    /// MPEG-1.
    V1,
    /// MPEG-2.
    V2,
    /// The unofficial MPEG-2.5 low-sampling-rate extension.
    V2_5,
}

/// One parsed MPEG audio frame header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MpegAudioHeader {
    /// MPEG version.
    pub version: MpegVersion,
    /// Layer, 1 to 3.
    pub layer: u8,
    /// Bit rate in bits per second.
    pub bit_rate: u32,
    /// Sampling frequency in Hz.
    pub sampling_frequency: u32,
    /// Whether the padding bit is set (one extra slot in this frame).
    pub padding: bool,
    /// Channel count derived from the channel mode.
    pub channels: u32,
    /// Total frame size in bytes, header included.
    pub frame_size: usize,
    /// PCM samples one frame decodes to.
    pub samples_per_frame: u32,
}

const BIT_RATES_V1: [[u32; 14]; 3] = [
    // Layer I
    [32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    // Layer II
    [32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
    // Layer III
    [32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
];

const BIT_RATES_V2: [[u32; 14]; 3] = [
    // Layer I
    [32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
    // Layers II and III share one table in MPEG-2.
    [8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
    [8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
];

const SAMPLING_RATES: [[u32; 3]; 3] = [
    [44100, 48000, 32000], // MPEG-1
    [22050, 24000, 16000], // MPEG-2
    [11025, 12000, 8000],  // MPEG-2.5
];

/// Parse a 4-byte MPEG audio frame header. `None` when the sync pattern
/// is missing or any field is reserved/invalid.
pub fn parse_header(data: &[u8]) -> Option<MpegAudioHeader> {
    if data.len() < 4 {
        return None;
    }
    // 11-bit sync: 0xFFE.
    if data[0] != 0xff || data[1] & 0xe0 != 0xe0 {
        return None;
    }

    let version = match (data[1] >> 3) & 0x03 {
        0 => MpegVersion::V2_5,
        2 => MpegVersion::V2,
        3 => MpegVersion::V1,
        _ => return None,
    };
    let layer = match (data[1] >> 1) & 0x03 {
        1 => 3,
        2 => 2,
        3 => 1,
        _ => return None,
    };

    let bit_rate_index = (data[2] >> 4) as usize;
    if bit_rate_index == 0 || bit_rate_index == 15 {
        // Free-format and reserved bit rates are not supported.
        return None;
    }
    let table = match version {
        MpegVersion::V1 => &BIT_RATES_V1,
        _ => &BIT_RATES_V2,
    };
    let bit_rate = table[layer as usize - 1][bit_rate_index - 1] * 1000;

    let rate_index = ((data[2] >> 2) & 0x03) as usize;
    if rate_index == 3 {
        return None;
    }
    let version_row = match version {
        MpegVersion::V1 => 0,
        MpegVersion::V2 => 1,
        MpegVersion::V2_5 => 2,
    };
    let sampling_frequency = SAMPLING_RATES[version_row][rate_index];

    let padding = data[2] & 0x02 != 0;
    let channels = if (data[3] >> 6) & 0x03 == 3 { 1 } else { 2 };

    let samples_per_frame = match (layer, version) {
        (1, _) => 384,
        (2, _) => 1152,
        (3, MpegVersion::V1) => 1152,
        (3, _) => 576,
        _ => unreachable!("layer is constrained to 1..=3 above"),
    };

    let pad = usize::from(padding);
    let frame_size = match layer {
        1 => (12 * bit_rate as usize / sampling_frequency as usize + pad) * 4,
        _ => {
            let slots = samples_per_frame as usize / 8;
            slots * bit_rate as usize / sampling_frequency as usize + pad
        }
    };

    Some(MpegAudioHeader {
        version,
        layer,
        bit_rate,
        sampling_frequency,
        padding,
        channels,
        frame_size,
        samples_per_frame,
    })
}

/// Scan for the next position where a valid frame header parses. Returns
/// the byte offset and the parsed header.
pub fn find_frame(data: &[u8]) -> Option<(usize, MpegAudioHeader)> {
    for offset in 0..data.len().saturating_sub(3) {
        if let Some(header) = parse_header(&data[offset..]) {
            return Some((offset, header));
        }
    }
    None
}
