//! Sequence Number Handling
//!
//! RTP uses 16-bit sequence numbers that wrap at 65536. This module provides
//! a wrapped sequence number type whose comparisons hold across the wrap
//! boundary, plus helpers for the 48-bit SRTP packet index formed with the
//! rollover counter.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Number of distinct RTP sequence numbers
pub const SEQ_MODULUS: u32 = 1 << 16;

/// Half the sequence space, used to decide direction across a wrap
const HALF_SPACE: i32 = (SEQ_MODULUS / 2) as i32;

/// Sequence number with 16-bit wraparound semantics
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct SeqNumber(u16);

impl SeqNumber {
    #[inline]
    pub fn new(value: u16) -> Self {
        SeqNumber(value)
    }

    #[inline]
    pub fn as_raw(self) -> u16 {
        self.0
    }

    /// Get the next sequence number
    #[inline]
    pub fn next(self) -> Self {
        SeqNumber(self.0.wrapping_add(1))
    }

    /// Signed distance from this sequence number to another
    ///
    /// Positive values mean `other` is ahead of `self`.
    pub fn distance_to(self, other: SeqNumber) -> i32 {
        let diff = other.0.wrapping_sub(self.0) as i32;
        if diff >= HALF_SPACE {
            diff - SEQ_MODULUS as i32
        } else {
            diff
        }
    }

    /// Check if this sequence number is before another (accounting for wraparound)
    #[inline]
    pub fn lt(self, other: SeqNumber) -> bool {
        self.distance_to(other) > 0
    }

    #[inline]
    pub fn gt(self, other: SeqNumber) -> bool {
        self.distance_to(other) < 0
    }

    /// True when moving from `self` forward to `next` crosses the wrap point
    #[inline]
    pub fn wraps_to(self, next: SeqNumber) -> bool {
        self.lt(next) && next.0 < self.0
    }
}

/// 48-bit SRTP packet index: `roc * 2^16 + seq`
#[inline]
pub fn packet_index(roc: u32, seq: u16) -> u64 {
    ((roc as u64) << 16) | seq as u64
}

impl fmt::Debug for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNumber({})", self.0)
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for SeqNumber {
    fn from(value: u16) -> Self {
        SeqNumber(value)
    }
}

impl From<SeqNumber> for u16 {
    fn from(seq: SeqNumber) -> u16 {
        seq.0
    }
}

impl Add<u16> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: u16) -> SeqNumber {
        SeqNumber(self.0.wrapping_add(rhs))
    }
}

impl AddAssign<u16> for SeqNumber {
    fn add_assign(&mut self, rhs: u16) {
        self.0 = self.0.wrapping_add(rhs);
    }
}

impl Sub for SeqNumber {
    type Output = i32;

    /// Signed distance between two sequence numbers
    fn sub(self, rhs: SeqNumber) -> i32 {
        rhs.distance_to(self)
    }
}
