/// Error types for this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A packetizer was constructed with inconsistent parameters,
    /// e.g. zero audio channels or an unsupported sample depth.
    #[error("'{file}' track {id}: invalid configuration: {reason}")]
    InvalidConfig {
        /// Source file the track came from.
        file: String,
        /// Track id within the source file.
        id: i64,
        /// What exactly was inconsistent.
        reason: String,
    },

    /// The bitstream should have carried codec configuration data
    /// (e.g. the MPEG-4 part 2 VOL headers) but did not.
    #[error(
        "'{file}' track {id}: could not find the codec configuration data in the first \
         MPEG-4 part 2 video frame; this track cannot be stored in native mode"
    )]
    MissingConfig {
        /// Source file the track came from.
        file: String,
        /// Track id within the source file.
        id: i64,
    },

    /// A stream that needs reordering supplies neither timecodes nor a
    /// frame rate, so timecodes can be neither read nor synthesized.
    #[error(
        "'{file}' track {id}: cannot convert non-native MPEG-4 video frames into native ones \
         if the source container provides neither timecodes nor a number of frames per second"
    )]
    NoTimingInfo {
        /// Source file the track came from.
        file: String,
        /// Track id within the source file.
        id: i64,
    },

    /// I/O error, from `std::io::Error`. Normal at end of stream,
    /// fatal anywhere else.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed bitstream data, e.g. a bad AAC header or an impossible
    /// frame size. The muxer may degrade this to a warning and drop the
    /// offending frame.
    #[error("'{file}' track {id}: malformed bitstream: {reason}")]
    Format {
        /// Source file the track came from.
        file: String,
        /// Track id within the source file.
        id: i64,
        /// What was malformed.
        reason: String,
    },

    /// An internal invariant was violated.
    #[error("programming error: {0}; please file a bug report")]
    Programming(String),
}

impl Error {
    /// Whether the muxer may degrade this error to a warning, drop the
    /// affected frame and carry on. Only per-frame bitstream damage
    /// qualifies; everything else aborts the mux.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Format { .. })
    }
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
