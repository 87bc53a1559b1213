// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A UTC instant as a whole-second datum plus a nanosecond offset.
///
/// The offset may lie outside `0..1e9` until [`Timecode::normalise`] folds it
/// into the datum. Comparison and subtraction work on either form.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Timecode {
    utc_datum: i64,
    offset_ns: i64,
}

impl Timecode {
    pub const ZERO: Timecode = Timecode {
        utc_datum: 0,
        offset_ns: 0,
    };

    pub const fn new(utc_datum: i64, offset_ns: i64) -> Self {
        Self {
            utc_datum,
            offset_ns,
        }
    }

    pub fn from_nanos(total_ns: i64) -> Self {
        Self::new(0, total_ns).normalise()
    }

    /// Fold the offset into the datum so that `0 <= offset_ns < 1e9`.
    pub fn normalise(self) -> Self {
        let carry = self.offset_ns.div_euclid(NANOS_PER_SECOND);
        Self {
            utc_datum: self.utc_datum + carry,
            offset_ns: self.offset_ns.rem_euclid(NANOS_PER_SECOND),
        }
    }

    #[inline]
    pub fn utc_datum(&self) -> i64 {
        self.utc_datum
    }

    #[inline]
    pub fn offset_ns(&self) -> i64 {
        self.offset_ns
    }

    /// Nanoseconds from `other` to `self`.
    pub fn subtract(&self, other: &Timecode) -> i64 {
        (self.utc_datum - other.utc_datum) * NANOS_PER_SECOND + (self.offset_ns - other.offset_ns)
    }

    pub fn is_zero(&self) -> bool {
        self.subtract(&Timecode::ZERO) == 0
    }

    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self::new(dt.timestamp(), i64::from(dt.timestamp_subsec_nanos()))
    }

    /// `None` when the datum is outside chrono's representable range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let n = self.normalise();
        Utc.timestamp_opt(n.utc_datum, n.offset_ns as u32).single()
    }
}

impl PartialEq for Timecode {
    fn eq(&self, other: &Self) -> bool {
        self.subtract(other) == 0
    }
}

impl Eq for Timecode {}

impl PartialOrd for Timecode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timecode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.subtract(other).cmp(&0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_carries_positive_offset() {
        let tc = Timecode::new(10, 2_500_000_000).normalise();
        assert_eq!(tc.utc_datum(), 12);
        assert_eq!(tc.offset_ns(), 500_000_000);
    }

    #[test]
    fn test_normalise_borrows_negative_offset() {
        let tc = Timecode::new(10, -1).normalise();
        assert_eq!(tc.utc_datum(), 9);
        assert_eq!(tc.offset_ns(), 999_999_999);
    }

    #[test]
    fn test_subtract_and_equality_ignore_normal_form() {
        let a = Timecode::new(5, 1_500_000_000);
        let b = Timecode::new(6, 500_000_000);
        assert_eq!(a, b);
        assert_eq!(Timecode::new(7, 0).subtract(&b), 500_000_000);
        assert!(Timecode::new(7, 0) > b);
    }

    #[test]
    fn test_datetime_round_trip() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(42);
        let tc = Timecode::from_datetime(&dt);
        assert_eq!(tc.offset_ns(), 42);
        assert_eq!(tc.to_datetime(), Some(dt));
    }
}
