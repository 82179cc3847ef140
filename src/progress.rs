//! Progress accounting for readers.

use std::fmt;
use std::ops::{Add, AddAssign};

use crate::error::{Error, Result};

/// A done/total pair with derived percentage, used by readers to report
/// how far through their input they are. Values add up, so the muxer can
/// aggregate progress across files.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Progress {
    done: i64,
    total: i64,
    initialized: bool,
}

impl Progress {
    /// A progress value that has not been initialized yet; it displays as
    /// 0% and is ignored when aggregating.
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// Zero out of zero.
    pub fn zero() -> Self {
        Self {
            done: 0,
            total: 0,
            initialized: true,
        }
    }

    /// Zero out of `total`.
    pub fn zero_of(total: i64) -> Self {
        Self {
            done: 0,
            total,
            initialized: true,
        }
    }

    /// `done` out of `total`. `done > total` is a programming error.
    pub fn of(done: i64, total: i64) -> Result<Self> {
        if done > total {
            return Err(Error::Programming(format!("progress: done > total ({done} > {total})")));
        }
        Ok(Self {
            done,
            total,
            initialized: true,
        })
    }

    /// All of `total`.
    pub fn complete(total: i64) -> Self {
        Self {
            done: total,
            total,
            initialized: true,
        }
    }

    /// Progress through a file of `file_size` bytes, measured in units
    /// (e.g. frames) of which `units_per_file` exist in total. Rounding
    /// may overshoot on the last unit; the result is clamped.
    pub fn scale(file_size: i64, units_read: i64, units_per_file: i64) -> Self {
        if units_per_file <= 0 {
            return Self::zero_of(file_size);
        }
        let bytes_done = (file_size as f64 * units_read as f64 / units_per_file as f64).round() as i64;
        Self {
            done: bytes_done.min(file_size),
            total: file_size,
            initialized: true,
        }
    }

    /// Units done.
    pub fn done(&self) -> i64 {
        self.done
    }

    /// Total units.
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Units remaining.
    pub fn remaining(&self) -> i64 {
        self.total - self.done
    }

    /// Percentage in `[0.0, 100.0]`.
    pub fn pct(&self) -> f64 {
        if self.total != 0 {
            100.0 * self.done as f64 / self.total as f64
        } else {
            0.0
        }
    }

    /// Whether all units are done.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.done == self.total
    }

    /// Whether this value carries real numbers.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl Add for Progress {
    type Output = Progress;

    fn add(self, other: Progress) -> Progress {
        Progress {
            done: self.done + other.done,
            total: self.total + other.total,
            initialized: self.initialized || other.initialized,
        }
    }
}

impl AddAssign for Progress {
    fn add_assign(&mut self, other: Progress) {
        *self = *self + other;
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({}%)", self.done, self.total, self.pct().round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_pct() {
        assert_eq!(Progress::of(25, 100).unwrap().pct(), 25.0);
        assert!(Progress::complete(10).is_complete());
        assert!(!Progress::zero_of(10).is_complete());
        assert!(!Progress::zero().is_complete());
        assert!(!Progress::uninitialized().is_initialized());
        assert!(Progress::of(100, 100).unwrap().is_complete());
    }

    #[test]
    fn test_done_beyond_total_is_a_programming_error() {
        assert!(matches!(Progress::of(2, 1), Err(Error::Programming(_))));
    }

    #[test]
    fn test_addition() {
        let mut p = Progress::of(1, 4).unwrap();
        p += Progress::of(3, 4).unwrap();
        assert_eq!(p.done(), 4);
        assert_eq!(p.total(), 8);
        assert_eq!(p.remaining(), 4);
        assert_eq!(p.pct(), 50.0);
        assert_eq!(p.to_string(), "4/8 (50%)");
    }

    #[test]
    fn test_scale_clamps() {
        let p = Progress::scale(1000, 3, 4);
        assert_eq!(p.done(), 750);
        let p = Progress::scale(999, 4, 4);
        assert_eq!(p.done(), 999);
        assert!(p.is_complete());
        let p = Progress::scale(1000, 0, 0);
        assert_eq!(p.done(), 0);
    }
}
