//! Exact integer arithmetic for the in-circle predicate.
//!
//! A value is stored on two `i64` limbs as `hi * 2^62 + lo` with `0 <= lo < 2^62`. Operands are
//! split at 31 bits so that every partial product fits into a native `i64`.

use core::{cmp::Ordering, ops::Add};

const BITS31: i64 = (1 << 31) - 1;
const POW62: i64 = 1 << 62;

/// Largest magnitude accepted by [`LongLong::mul`].
pub const MAX_FACTOR: i64 = 1 << 61;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LongLong {
    hi: i64,
    lo: i64,
}

impl LongLong {
    pub const ZERO: Self = Self { hi: 0, lo: 0 };

    /// Exact product of `l1` in `[0, 2^61]` and `l2` in `[-2^61, 2^61]`.
    pub fn mul(l1: i64, l2: i64) -> Self {
        debug_assert!((0..=MAX_FACTOR).contains(&l1), "factor out of range: {l1}");
        debug_assert!(l2.abs() <= MAX_FACTOR, "factor out of range: {l2}");

        let negative = l2 < 0;
        let l2 = l2.abs();

        let (l1_hi, l1_lo) = (l1 >> 31, l1 & BITS31);
        let (l2_hi, l2_lo) = (l2 >> 31, l2 & BITS31);

        // cross terms are below 2^62
        let mid = l1_hi * l2_lo + l1_lo * l2_hi;
        let mut hi = (mid >> 31) + l1_hi * l2_hi;
        let mut lo = ((mid & BITS31) << 31) + l1_lo * l2_lo;
        if lo >= POW62 {
            hi += 1;
            lo -= POW62;
        }

        if negative {
            hi = -hi;
            if lo > 0 {
                hi -= 1;
                lo = POW62 - lo;
            }
        }

        Self { hi, lo }
    }

    /// Sign of the value as `Less`, `Equal` or `Greater` than zero.
    pub const fn sign(&self) -> Ordering {
        if self.hi < 0 {
            Ordering::Less
        } else if self.hi > 0 || self.lo > 0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    pub const fn is_positive(&self) -> bool {
        matches!(self.sign(), Ordering::Greater)
    }

    pub const fn is_negative(&self) -> bool {
        self.hi < 0
    }

    /// The exact value, for diagnostics.
    pub const fn to_i128(self) -> i128 {
        ((self.hi as i128) << 62) + self.lo as i128
    }
}

impl Add for LongLong {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let mut hi = self.hi + rhs.hi;
        let mut lo = self.lo + rhs.lo;
        if lo >= POW62 {
            hi += 1;
            lo -= POW62;
        }
        Self { hi, lo }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEFT: [i64; 8] = [
        0,
        1,
        7,
        BITS31,
        BITS31 + 1,
        (1 << 45) + 12345,
        MAX_FACTOR - 1,
        MAX_FACTOR,
    ];
    const RIGHT: [i64; 11] = [
        -MAX_FACTOR,
        -(1 << 40) - 3,
        -BITS31 - 1,
        -1,
        0,
        1,
        BITS31,
        BITS31 + 1,
        (1 << 50) + 99,
        MAX_FACTOR - 1,
        MAX_FACTOR,
    ];

    #[test]
    fn test_mul_matches_i128() {
        for l1 in LEFT {
            for l2 in RIGHT {
                let prod = LongLong::mul(l1, l2);
                assert_eq!(prod.to_i128(), l1 as i128 * l2 as i128, "{l1} * {l2}");
                assert_eq!(prod.sign(), (l1 as i128 * l2 as i128).cmp(&0));
            }
        }
    }

    #[test]
    fn test_mixed_sign_sums() {
        for l1 in LEFT {
            for l2 in RIGHT {
                for l3 in RIGHT {
                    let sum = LongLong::mul(l1, l2) + LongLong::mul(l1, l3) + LongLong::mul(l1, -l2);
                    let expected = l1 as i128 * l3 as i128;
                    assert_eq!(sum.to_i128(), expected);
                    assert_eq!(sum.is_negative(), expected < 0);
                    assert_eq!(sum.is_positive(), expected > 0);
                }
            }
        }
    }

    #[test]
    fn test_cancellation_gives_zero() {
        let a = LongLong::mul(MAX_FACTOR, MAX_FACTOR - 1);
        let b = LongLong::mul(MAX_FACTOR, -(MAX_FACTOR - 1));
        assert_eq!(a + b, LongLong::ZERO);
        assert_eq!((a + b).sign(), Ordering::Equal);
    }
}
