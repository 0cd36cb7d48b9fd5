//! # Byte Range Set
//!
//! A set of half-open `[lo, hi)` intervals over the stream offset space.
//!
//! ## Representation
//!
//! Intervals live in a `BTreeMap` keyed by their start offset, with the
//! exclusive end as the value. Stored intervals never overlap and never touch:
//! adding `[5, 10)` to `{[0, 5)}` yields the single interval `[0, 10)`.
//!
//! ```text
//! {[0,20) [50,100)}  add(20,30)        → {[0,30) [50,100)}
//! {[0,30) [50,100)}  difference(10,60) → {[0,10) [60,100)}
//! ```
//!
//! Every operation costs `O(log n + k)` where `k` is the number of stored
//! intervals it touches.

#![forbid(unsafe_code)]

use core::cmp::{max, min};
use core::fmt;
use core::ops::Range;
use std::collections::BTreeMap;

/// Ordered set of disjoint, non-adjacent byte ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteRangeSet {
    /// start offset → exclusive end offset
    ranges: BTreeMap<u64, u64>,
}

impl ByteRangeSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding the single range `[lo, hi)`
    pub fn from_range(lo: u64, hi: u64) -> Self {
        let mut set = Self::new();
        set.add(lo, hi);
        set
    }

    /// Check if the set holds no bytes
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of disjoint intervals in the set
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Lowest interval, if any
    pub fn first(&self) -> Option<Range<u64>> {
        self.ranges.iter().next().map(|(&lo, &hi)| lo..hi)
    }

    /// Iterate intervals in ascending order
    pub fn iter(&self) -> impl Iterator<Item = Range<u64>> + '_ {
        self.ranges.iter().map(|(&lo, &hi)| lo..hi)
    }

    /// Add `[lo, hi)`, merging with any overlapping or adjacent intervals.
    pub fn add(&mut self, lo: u64, hi: u64) {
        if lo >= hi {
            return;
        }

        let mut start = lo;
        let mut end = hi;

        // A predecessor that reaches `lo` absorbs the new range.
        if let Some((&prev_lo, &prev_hi)) = self.ranges.range(..=lo).next_back() {
            if prev_hi >= lo {
                start = prev_lo;
                end = max(end, prev_hi);
            }
        }

        // Everything starting inside (or right at the end of) the merged range.
        let absorbed: Vec<u64> = self.ranges.range(start..=end).map(|(&k, _)| k).collect();
        for key in absorbed {
            if let Some(old_hi) = self.ranges.remove(&key) {
                end = max(end, old_hi);
            }
        }

        self.ranges.insert(start, end);
    }

    /// Add every interval of `other`
    pub fn add_set(&mut self, other: &ByteRangeSet) {
        for range in other.iter() {
            self.add(range.start, range.end);
        }
    }

    /// Remove `[lo, hi)` from the set, splitting intervals that straddle it.
    pub fn difference(&mut self, lo: u64, hi: u64) {
        if lo >= hi {
            return;
        }

        let mut tail = None;

        // Predecessor starting before `lo` may overhang into the removed span.
        if let Some((&prev_lo, &prev_hi)) = self.ranges.range(..lo).next_back() {
            if prev_hi > lo {
                self.ranges.insert(prev_lo, lo);
                if prev_hi > hi {
                    tail = Some((hi, prev_hi));
                }
            }
        }

        let covered: Vec<u64> = self.ranges.range(lo..hi).map(|(&k, _)| k).collect();
        for key in covered {
            if let Some(old_hi) = self.ranges.remove(&key) {
                if old_hi > hi {
                    tail = Some((hi, old_hi));
                }
            }
        }

        if let Some((tail_lo, tail_hi)) = tail {
            self.ranges.insert(tail_lo, tail_hi);
        }
    }

    /// Remove every interval of `other` from the set
    pub fn difference_set(&mut self, other: &ByteRangeSet) {
        for range in other.iter() {
            if self.is_empty() {
                return;
            }
            self.difference(range.start, range.end);
        }
    }

    /// Keep only the bytes also present in `other`
    pub fn intersection(&mut self, other: &ByteRangeSet) {
        let mut kept = BTreeMap::new();
        for (&lo, &hi) in &self.ranges {
            for (other_lo, other_hi) in other.overlapping(lo, hi) {
                let s = max(lo, other_lo);
                let e = min(hi, other_hi);
                if s < e {
                    kept.insert(s, e);
                }
            }
        }
        self.ranges = kept;
    }

    /// Check if every byte of `[lo, hi)` is in the set.
    ///
    /// The empty range is contained in every set.
    pub fn contains(&self, lo: u64, hi: u64) -> bool {
        if lo >= hi {
            return true;
        }
        match self.ranges.range(..=lo).next_back() {
            Some((_, &prev_hi)) => prev_hi >= hi,
            None => false,
        }
    }

    /// Check if the set shares at least one byte with `other`
    pub fn intersects(&self, other: &ByteRangeSet) -> bool {
        self.ranges
            .iter()
            .any(|(&lo, &hi)| other.overlapping(lo, hi).next().is_some())
    }

    /// Stored intervals that overlap `[lo, hi)`, in ascending order.
    fn overlapping(&self, lo: u64, hi: u64) -> impl Iterator<Item = (u64, u64)> + '_ {
        let from = match self.ranges.range(..=lo).next_back() {
            Some((&prev_lo, &prev_hi)) if prev_hi > lo => prev_lo,
            _ => lo,
        };
        self.ranges
            .range(from..hi)
            .map(|(&s, &e)| (s, e))
            .filter(move |&(s, e)| s < hi && e > lo)
    }
}

impl From<Range<u64>> for ByteRangeSet {
    fn from(range: Range<u64>) -> Self {
        Self::from_range(range.start, range.end)
    }
}

impl<'a> IntoIterator for &'a ByteRangeSet {
    type Item = Range<u64>;
    type IntoIter = core::iter::Map<
        std::collections::btree_map::Iter<'a, u64, u64>,
        fn((&'a u64, &'a u64)) -> Range<u64>,
    >;

    fn into_iter(self) -> Self::IntoIter {
        fn to_range<'b>((lo, hi): (&'b u64, &'b u64)) -> Range<u64> {
            *lo..*hi
        }
        self.ranges
            .iter()
            .map(to_range as fn((&'a u64, &'a u64)) -> Range<u64>)
    }
}

impl fmt::Display for ByteRangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (&lo, &hi) in &self.ranges {
            write!(f, " [{}, {})", lo, hi)?;
        }
        write!(f, " }}")
    }
}
