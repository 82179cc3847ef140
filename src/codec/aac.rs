//! AAC AudioSpecificConfig parsing (the 2- and 5-byte raw forms stored
//! as codec private data by AVI and similar containers).

use crate::bitread::BitReader;

/// AAC profile, from the audio object type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AacProfile {
    /// Main profile.
    Main,
    /// Low complexity.
    Lc,
    /// Scalable sampling rate.
    Ssr,
    /// Long term prediction.
    Ltp,
    /// High efficiency (LC with spectral band replication).
    Sbr,
}

/// Parameters decoded from an AudioSpecificConfig.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AacConfig {
    /// Profile; [`AacProfile::Sbr`] when SBR is signalled.
    pub profile: AacProfile,
    /// Channel count.
    pub channels: u32,
    /// Core sampling frequency in Hz.
    pub sampling_frequency: u32,
    /// Real output sampling frequency; twice the core rate with SBR.
    pub output_sampling_frequency: u32,
    /// Whether spectral band replication is present.
    pub sbr: bool,
}

impl AacConfig {
    /// PCM samples per access unit at the output rate.
    pub fn samples_per_frame(&self) -> u32 {
        if self.sbr { 2048 } else { 1024 }
    }

    /// The Matroska codec identifier for this configuration.
    pub fn codec_id(&self) -> String {
        let suffix = match self.profile {
            AacProfile::Main => "MAIN",
            AacProfile::Lc => "LC",
            AacProfile::Ssr => "SSR",
            AacProfile::Ltp => "LTP",
            AacProfile::Sbr => "LC/SBR",
        };
        format!("{}/{}", crate::track::codec_id::A_AAC_MPEG4, suffix)
    }
}

const SAMPLING_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

const SYNC_EXTENSION_TYPE: u32 = 0x2b7;

fn sampling_rate(r: &mut BitReader<'_>) -> Option<u32> {
    let index = r.read_bits(4)?;
    if index == 15 {
        // Escape: literal 24-bit frequency.
        return r.read_bits(24);
    }
    SAMPLING_RATES.get(index as usize).copied()
}

/// Parse an AudioSpecificConfig. Handles the plain 2-byte form and the
/// extended form with an SBR sync extension. `None` for unsupported
/// object types or malformed data.
pub fn parse_audio_specific_config(data: &[u8]) -> Option<AacConfig> {
    let mut r = BitReader::new(data);

    let object_type = r.read_bits(5)?;
    let profile = match object_type {
        1 => AacProfile::Main,
        2 => AacProfile::Lc,
        3 => AacProfile::Ssr,
        4 => AacProfile::Ltp,
        _ => return None,
    };

    let sampling_frequency = sampling_rate(&mut r)?;
    let channels = r.read_bits(4)?;
    if channels == 0 || channels > 8 {
        return None;
    }

    let mut sbr = false;
    let mut output_sampling_frequency = sampling_frequency;

    if r.remaining() >= 16 && r.read_bits(11)? == SYNC_EXTENSION_TYPE {
        let extension_object_type = r.read_bits(5)?;
        if extension_object_type == 5 && r.flag()? {
            sbr = true;
            output_sampling_frequency = sampling_rate(&mut r).unwrap_or(2 * sampling_frequency);
        }
    }

    Some(AacConfig {
        profile: if sbr { AacProfile::Sbr } else { profile },
        channels,
        sampling_frequency,
        output_sampling_frequency,
        sbr,
    })
}
