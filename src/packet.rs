use bytes::Bytes;

use crate::timecode::ABSENT;

/// The reference timecodes of a packet: none for a key frame, the
/// backward reference for a P frame, both references for a B frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum References {
    /// Key frame. No references.
    None,
    /// Forward-predicted frame referencing one earlier packet.
    P {
        /// Timecode of the backward reference.
        prev: i64,
    },
    /// Bidirectionally predicted frame.
    B {
        /// Timecode of the backward reference.
        prev: i64,
        /// Timecode of the forward reference.
        next: i64,
    },
}

impl References {
    /// Whether this is a key frame (empty reference set).
    pub fn is_key(&self) -> bool {
        matches!(self, References::None)
    }

    /// The references in the external fixed-width form: absent slots
    /// hold `-1`.
    pub fn to_raw(&self) -> [i64; 2] {
        match *self {
            References::None => [ABSENT, ABSENT],
            References::P { prev } => [prev, ABSENT],
            References::B { prev, next } => [prev, next],
        }
    }

    /// The referenced timecodes, backward reference first.
    pub fn iter(&self) -> impl Iterator<Item = i64> {
        let raw = self.to_raw();
        raw.into_iter().filter(|&t| t != ABSENT)
    }
}

/// One fully-formed output unit handed to the block sink; becomes one
/// Matroska block.
#[derive(Debug)]
pub struct Packet {
    /// The payload bytes.
    pub payload: Bytes,
    /// Timecode in nanoseconds. Never negative.
    pub timecode: i64,
    /// Duration in nanoseconds. Never negative.
    pub duration: i64,
    /// Timecodes of the packets this packet's decode depends on.
    pub references: References,
}

impl Packet {
    /// A key packet.
    pub fn key(payload: Bytes, timecode: i64, duration: i64) -> Self {
        Self {
            payload,
            timecode,
            duration,
            references: References::None,
        }
    }

    /// A packet with the given reference set.
    pub fn with_references(payload: Bytes, timecode: i64, duration: i64, references: References) -> Self {
        Self {
            payload,
            timecode,
            duration,
            references,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_forms() {
        let test_pair = [
            (References::None, [-1, -1], true),
            (References::P { prev: 7 }, [7, -1], false),
            (References::B { prev: 7, next: 9 }, [7, 9], false),
        ];
        for (refs, raw, key) in test_pair {
            assert_eq!(refs.to_raw(), raw);
            assert_eq!(refs.is_key(), key);
        }
        assert_eq!(References::B { prev: 1, next: 2 }.iter().collect::<Vec<_>>(), vec![1, 2]);
    }
}
