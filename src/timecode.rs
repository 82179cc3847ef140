//! Nanosecond timecodes, the `-1` absence sentinel, and the timecode
//! factory that hands out timecode/duration pairs to reordering
//! packetizers.

use std::collections::VecDeque;

/// One second in timecode units.
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// The value readers use for "no timecode" / "no duration".
pub const ABSENT: i64 = -1;

/// Map the external `-1` sentinel to `Option`.
pub fn from_raw(raw: i64) -> Option<i64> {
    if raw < 0 { None } else { Some(raw) }
}

/// Map an optional timecode back to the external `-1` sentinel.
pub fn to_raw(timecode: Option<i64>) -> i64 {
    timecode.unwrap_or(ABSENT)
}

/// How much look-ahead a packetizer's timecode assignment needs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FactoryMode {
    /// Timecodes are applied in arrival order, no queueing.
    #[default]
    None,
    /// Emission order differs from timecode order by a small bounded
    /// lookahead (MPEG-4 part 2 B frames).
    ShortQueueing,
    /// Arbitrary reordering. No packetizer in this crate requires it.
    FullQueueing,
}

/// Queue of source-supplied timecodes and durations, with synthesis from
/// a frame rate when the source supplies neither.
///
/// Synthesized timecodes are linear from zero: the first one dispensed is
/// 0, each subsequent one advances by `1e9 / fps`. A source-supplied
/// timecode resets that clock, so late-arriving container timecodes and
/// synthesis can be mixed.
#[derive(Debug)]
pub struct TimecodeFactory {
    mode: FactoryMode,
    fps: f64,
    timecodes: VecDeque<i64>,
    durations: VecDeque<i64>,
    /// Timecode dispensed last, source-supplied or synthesized.
    previous: Option<i64>,
}

impl TimecodeFactory {
    /// Create a factory. `fps <= 0.0` means "no frame rate known"; such a
    /// factory can only dispense what the source queued.
    pub fn new(mode: FactoryMode, fps: f64) -> Self {
        Self {
            mode,
            fps,
            timecodes: VecDeque::new(),
            durations: VecDeque::new(),
            previous: None,
        }
    }

    /// The application mode this factory was created with.
    pub fn mode(&self) -> FactoryMode {
        self.mode
    }

    /// Queue a source-supplied timecode.
    pub fn push_timecode(&mut self, timecode: i64) {
        self.timecodes.push_back(timecode);
    }

    /// Queue a source-supplied duration.
    pub fn push_duration(&mut self, duration: i64) {
        self.durations.push_back(duration);
    }

    /// Number of source timecodes still queued.
    pub fn timecodes_queued(&self) -> usize {
        self.timecodes.len()
    }

    /// Dispense the next timecode/duration pair, synthesizing from the
    /// frame rate where the queues run dry. Returns `None` when synthesis
    /// is needed but no frame rate is known; the caller turns that into
    /// [`crate::Error::NoTimingInfo`].
    pub fn next(&mut self) -> Option<(i64, i64)> {
        if self.timecodes.is_empty() {
            let synthesized = match self.previous {
                None => 0,
                Some(t) => t + self.frame_duration()?,
            };
            self.timecodes.push_back(synthesized);
            log::debug!("timecode factory: synthesized timecode {synthesized}");
        }
        if self.durations.is_empty() {
            let duration = self.frame_duration()?;
            self.durations.push_back(duration);
            log::debug!("timecode factory: synthesized duration {duration}");
        }

        let timecode = self.timecodes.pop_front()?;
        let duration = self.durations.pop_front()?;
        self.previous = Some(timecode);
        Some((timecode, duration))
    }

    fn frame_duration(&self) -> Option<i64> {
        if self.fps > 0.0 {
            Some((NANOS_PER_SECOND as f64 / self.fps) as i64)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel() {
        assert_eq!(from_raw(-1), None);
        assert_eq!(from_raw(0), Some(0));
        assert_eq!(from_raw(42), Some(42));
        assert_eq!(to_raw(None), -1);
        assert_eq!(to_raw(Some(7)), 7);
    }

    #[test]
    fn test_synthesis_is_linear_from_zero() {
        let mut f = TimecodeFactory::new(FactoryMode::ShortQueueing, 25.0);
        let expected = [0, 40_000_000, 80_000_000, 120_000_000, 160_000_000];
        for want in expected {
            let (tc, dur) = f.next().unwrap();
            assert_eq!(tc, want);
            assert_eq!(dur, 40_000_000);
        }
    }

    #[test]
    fn test_source_timecodes_win_and_reset_the_clock() {
        let mut f = TimecodeFactory::new(FactoryMode::ShortQueueing, 25.0);
        f.push_timecode(1_000_000_000);
        f.push_duration(20_000_000);
        assert_eq!(f.next().unwrap(), (1_000_000_000, 20_000_000));
        // Queue dry again: synthesis continues from the source timecode.
        assert_eq!(f.next().unwrap(), (1_040_000_000, 40_000_000));
    }

    #[test]
    fn test_no_fps_no_timecodes_is_an_error() {
        let mut f = TimecodeFactory::new(FactoryMode::ShortQueueing, 0.0);
        assert_eq!(f.next(), None);

        // Queued source data still flows without an fps.
        f.push_timecode(5);
        f.push_duration(6);
        assert_eq!(f.next(), Some((5, 6)));
        assert_eq!(f.next(), None);
    }
}
