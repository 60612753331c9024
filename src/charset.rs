//! Character set algebra over code-point ranges.
//!
//! A [`CharSet`] represents a subset of the alphabet `[0, maximum]` as a
//! sorted sequence of disjoint, non-adjacent, non-empty closed intervals.
//! Sets are immutable values; every operation returns a new set. Edge labels
//! in the automaton are `CharSet`s, so the whole engine leans on this module
//! for compact handling of large Unicode alphabets.

use std::fmt;

use crate::RenfaError;

/// A closed interval `[min, max]` of code points.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CharRange {
    pub min: u32,
    pub max: u32,
}

impl CharRange {
    #[inline]
    pub fn new(min: u32, max: u32) -> Self {
        CharRange { min, max }
    }

    /// The one-element range `[cp, cp]`.
    #[inline]
    pub fn single(cp: u32) -> Self {
        CharRange { min: cp, max: cp }
    }
}

/// A set of code points over the alphabet `[0, maximum]`.
///
/// Stored as sorted, disjoint, non-adjacent, non-empty intervals. The
/// `maximum` is part of the value: all sets flowing through one automaton
/// share the automaton's alphabet.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CharSet {
    maximum: u32,
    ranges: Vec<CharRange>,
}

impl CharSet {
    /// The empty set over `[0, maximum]`.
    #[inline]
    pub fn empty(maximum: u32) -> Self {
        CharSet {
            maximum,
            ranges: Vec::new(),
        }
    }

    /// The full alphabet `[0, maximum]`.
    #[inline]
    pub fn all(maximum: u32) -> Self {
        CharSet {
            maximum,
            ranges: vec![CharRange::new(0, maximum)],
        }
    }

    /// Build a set from arbitrary ranges over the same alphabet.
    ///
    /// Ranges may overlap or touch; the result is normalized. Fails with
    /// [`RenfaError::InvalidRange`] if any range has `min > max` or crosses
    /// the alphabet maximum.
    pub fn from_ranges<I>(maximum: u32, ranges: I) -> Result<Self, RenfaError>
    where
        I: IntoIterator<Item = CharRange>,
    {
        let mut collected = Vec::new();
        for r in ranges {
            validate_range(r, maximum)?;
            collected.push(r);
        }
        collected.sort_unstable_by_key(|r| r.min);
        Ok(CharSet {
            maximum,
            ranges: merge_sorted_in_place(collected),
        })
    }

    /// The singleton set `{cp}`.
    pub fn single(maximum: u32, cp: u32) -> Result<Self, RenfaError> {
        Self::from_ranges(maximum, [CharRange::single(cp)])
    }

    /// Inclusive upper bound of the alphabet.
    #[inline]
    pub fn maximum(&self) -> u32 {
        self.maximum
    }

    /// The stored intervals, sorted and disjoint.
    #[inline]
    pub fn ranges(&self) -> &[CharRange] {
        &self.ranges
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// True if the set is the whole alphabet.
    #[inline]
    pub fn is_all(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0].min == 0 && self.ranges[0].max == self.maximum
    }

    /// Membership test for a single code point.
    pub fn has(&self, cp: u32) -> bool {
        let idx = self.ranges.partition_point(|r| r.max < cp);
        idx < self.ranges.len() && self.ranges[idx].min <= cp
    }

    /// True if every code point of `range` is in the set.
    ///
    /// A contiguous range is covered iff it fits inside a single stored
    /// interval, since stored intervals are disjoint and non-adjacent.
    pub fn is_superset_of(&self, range: CharRange) -> bool {
        if range.min > range.max {
            return true;
        }
        let idx = self.ranges.partition_point(|r| r.max < range.min);
        idx < self.ranges.len()
            && self.ranges[idx].min <= range.min
            && range.max <= self.ranges[idx].max
    }

    /// Iterate over every member code point in ascending order.
    pub fn codepoints(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|r| r.min..=r.max)
    }

    /// Set union with another set over the same alphabet.
    pub fn union(&self, other: &CharSet) -> CharSet {
        debug_assert_eq!(self.maximum, other.maximum);
        CharSet {
            maximum: self.maximum,
            ranges: merge_two_sorted(&self.ranges, &other.ranges),
        }
    }

    /// Union with a sequence of ranges.
    ///
    /// Fails with [`RenfaError::InvalidRange`] on a malformed range or one
    /// crossing the alphabet maximum.
    pub fn union_ranges<I>(&self, ranges: I) -> Result<CharSet, RenfaError>
    where
        I: IntoIterator<Item = CharRange>,
    {
        let addition = CharSet::from_ranges(self.maximum, ranges)?;
        Ok(self.union(&addition))
    }

    /// Set intersection.
    pub fn intersect(&self, other: &CharSet) -> CharSet {
        debug_assert_eq!(self.maximum, other.maximum);
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let a = self.ranges[i];
            let b = other.ranges[j];
            let lo = a.min.max(b.min);
            let hi = a.max.min(b.max);
            if lo <= hi {
                out.push(CharRange::new(lo, hi));
            }
            // Advance whichever range ends first.
            if a.max < b.max {
                i += 1;
            } else {
                j += 1;
            }
        }
        CharSet {
            maximum: self.maximum,
            ranges: out,
        }
    }

    /// Set difference `self \ other`.
    pub fn without(&self, other: &CharSet) -> CharSet {
        debug_assert_eq!(self.maximum, other.maximum);
        let mut out = Vec::new();
        let mut j = 0;
        for &a in &self.ranges {
            let mut lo = a.min;
            while j < other.ranges.len() && other.ranges[j].max < lo {
                j += 1;
            }
            let mut k = j;
            let mut consumed = false;
            while k < other.ranges.len() && other.ranges[k].min <= a.max {
                let b = other.ranges[k];
                if b.min > lo {
                    out.push(CharRange::new(lo, b.min - 1));
                }
                if b.max >= a.max {
                    consumed = true;
                    break;
                }
                lo = b.max + 1;
                k += 1;
            }
            if !consumed && lo <= a.max {
                out.push(CharRange::new(lo, a.max));
            }
        }
        CharSet {
            maximum: self.maximum,
            ranges: out,
        }
    }

    /// Complement with respect to the alphabet: `[0, maximum] \ self`.
    pub fn negate(&self) -> CharSet {
        let mut out = Vec::new();
        let mut lo: u64 = 0;
        for &r in &self.ranges {
            if (r.min as u64) > lo {
                out.push(CharRange::new(lo as u32, r.min - 1));
            }
            lo = r.max as u64 + 1;
        }
        if lo <= self.maximum as u64 {
            out.push(CharRange::new(lo as u32, self.maximum));
        }
        CharSet {
            maximum: self.maximum,
            ranges: out,
        }
    }
}

fn validate_range(r: CharRange, maximum: u32) -> Result<(), RenfaError> {
    if r.min > r.max {
        return Err(RenfaError::InvalidRange(format!(
            "min {:#x} > max {:#x}",
            r.min, r.max
        )));
    }
    if r.max > maximum {
        return Err(RenfaError::InvalidRange(format!(
            "max {:#x} crosses alphabet maximum {:#x}",
            r.max, maximum
        )));
    }
    Ok(())
}

/// Merge a min-sorted range list into disjoint, non-adjacent form.
fn merge_sorted_in_place(ranges: Vec<CharRange>) -> Vec<CharRange> {
    let mut out: Vec<CharRange> = Vec::with_capacity(ranges.len());
    for r in ranges {
        match out.last_mut() {
            Some(last) if r.min as u64 <= last.max as u64 + 1 => {
                last.max = last.max.max(r.max);
            }
            _ => out.push(r),
        }
    }
    out
}

/// Merge two already-normalized range lists, merging adjacency as we go.
fn merge_two_sorted(a: &[CharRange], b: &[CharRange]) -> Vec<CharRange> {
    let mut out: Vec<CharRange> = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() || j < b.len() {
        let next = if j >= b.len() || (i < a.len() && a[i].min <= b[j].min) {
            i += 1;
            a[i - 1]
        } else {
            j += 1;
            b[j - 1]
        };
        match out.last_mut() {
            Some(last) if next.min as u64 <= last.max as u64 + 1 => {
                last.max = last.max.max(next.max);
            }
            _ => out.push(next),
        }
    }
    out
}

impl fmt::Display for CharSet {
    /// Render as comma-separated lower-case hex: `61` for singletons,
    /// `61..7a` for wider ranges.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if r.min == r.max {
                write!(f, "{:x}", r.min)?;
            } else {
                write!(f, "{:x}..{:x}", r.min, r.max)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const MAX: u32 = 0xFFFF;

    fn set(ranges: &[(u32, u32)]) -> CharSet {
        CharSet::from_ranges(MAX, ranges.iter().map(|&(lo, hi)| CharRange::new(lo, hi)))
            .unwrap()
    }

    #[test]
    fn test_empty_and_all() {
        let empty = CharSet::empty(MAX);
        assert!(empty.is_empty());
        assert!(!empty.is_all());
        assert!(!empty.has(0));

        let all = CharSet::all(MAX);
        assert!(all.is_all());
        assert!(all.has(0));
        assert!(all.has(MAX));
    }

    #[test]
    fn test_from_ranges_normalizes() {
        // Overlapping and adjacent input ranges collapse.
        let s = set(&[(0x61, 0x63), (0x64, 0x66), (0x62, 0x65), (0x70, 0x70)]);
        assert_eq!(
            s.ranges(),
            &[CharRange::new(0x61, 0x66), CharRange::new(0x70, 0x70)]
        );
    }

    #[test]
    fn test_from_ranges_rejects_invalid() {
        assert!(matches!(
            CharSet::from_ranges(MAX, [CharRange::new(5, 3)]),
            Err(RenfaError::InvalidRange(_))
        ));
        assert!(matches!(
            CharSet::from_ranges(MAX, [CharRange::new(0, MAX + 1)]),
            Err(RenfaError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_has() {
        let s = set(&[(0x61, 0x63), (0x70, 0x72)]);
        assert!(s.has(0x61));
        assert!(s.has(0x62));
        assert!(s.has(0x63));
        assert!(!s.has(0x64));
        assert!(!s.has(0x6f));
        assert!(s.has(0x70));
        assert!(!s.has(0x73));
    }

    #[test]
    fn test_union_merges_adjacent() {
        let a = set(&[(0x61, 0x63)]);
        let b = set(&[(0x64, 0x66)]);
        assert_eq!(a.union(&b).ranges(), &[CharRange::new(0x61, 0x66)]);
    }

    #[test]
    fn test_intersect() {
        let a = set(&[(0x61, 0x6a), (0x70, 0x7a)]);
        let b = set(&[(0x65, 0x75)]);
        assert_eq!(
            a.intersect(&b).ranges(),
            &[CharRange::new(0x65, 0x6a), CharRange::new(0x70, 0x75)]
        );
        assert!(a.intersect(&CharSet::empty(MAX)).is_empty());
    }

    #[test]
    fn test_without() {
        let a = set(&[(0x61, 0x6a)]);
        let b = set(&[(0x63, 0x65), (0x68, 0x68)]);
        assert_eq!(
            a.without(&b).ranges(),
            &[
                CharRange::new(0x61, 0x62),
                CharRange::new(0x66, 0x67),
                CharRange::new(0x69, 0x6a)
            ]
        );
    }

    #[test]
    fn test_negate() {
        let s = set(&[(0, 0x60), (0x62, MAX)]);
        assert_eq!(s.negate().ranges(), &[CharRange::new(0x61, 0x61)]);
        assert!(CharSet::all(MAX).negate().is_empty());
        assert!(CharSet::empty(MAX).negate().is_all());
    }

    #[test]
    fn test_negate_at_alphabet_edge() {
        let s = set(&[(0, 0)]);
        assert_eq!(s.negate().ranges(), &[CharRange::new(1, MAX)]);
        let t = set(&[(MAX, MAX)]);
        assert_eq!(t.negate().ranges(), &[CharRange::new(0, MAX - 1)]);
    }

    #[test]
    fn test_is_superset_of() {
        let s = set(&[(0x61, 0x6a), (0x70, 0x7a)]);
        assert!(s.is_superset_of(CharRange::new(0x62, 0x69)));
        assert!(s.is_superset_of(CharRange::new(0x61, 0x6a)));
        assert!(!s.is_superset_of(CharRange::new(0x62, 0x70)));
        assert!(!s.is_superset_of(CharRange::new(0x6b, 0x6b)));
    }

    #[test]
    fn test_union_ranges_rejects_crossing_maximum() {
        let s = set(&[(0x61, 0x61)]);
        assert!(matches!(
            s.union_ranges([CharRange::new(0, MAX + 1)]),
            Err(RenfaError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_display() {
        let s = set(&[(0x61, 0x61), (0x72, 0x7a)]);
        assert_eq!(s.to_string(), "61, 72..7a");
        assert_eq!(CharSet::empty(MAX).to_string(), "");
    }

    #[test]
    fn test_codepoints() {
        let s = set(&[(0x61, 0x63), (0x70, 0x70)]);
        let cps: Vec<u32> = s.codepoints().collect();
        assert_eq!(cps, vec![0x61, 0x62, 0x63, 0x70]);
    }

    fn random_set(rng: &mut StdRng) -> CharSet {
        let count = rng.gen_range(0..6);
        let ranges = (0..count).map(|_| {
            let lo = rng.gen_range(0..=MAX);
            let hi = rng.gen_range(lo..=MAX.min(lo.saturating_add(0x200)));
            CharRange::new(lo, hi)
        });
        CharSet::from_ranges(MAX, ranges).unwrap()
    }

    #[test]
    fn test_random_algebra_identities() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let a = random_set(&mut rng);
            let b = random_set(&mut rng);

            assert_eq!(a.negate().negate(), a);
            assert!(a.union(&a.negate()).is_all());
            assert!(a.intersect(&a.negate()).is_empty());
            assert_eq!(a.without(&b), a.intersect(&b.negate()));
            assert_eq!(a.union(&b), b.union(&a));
            assert_eq!(a.intersect(&b), b.intersect(&a));

            // Membership agrees with the set operations at sampled points.
            for _ in 0..16 {
                let cp = rng.gen_range(0..=MAX);
                assert_eq!(a.union(&b).has(cp), a.has(cp) || b.has(cp));
                assert_eq!(a.intersect(&b).has(cp), a.has(cp) && b.has(cp));
                assert_eq!(a.without(&b).has(cp), a.has(cp) && !b.has(cp));
                assert_eq!(a.negate().has(cp), !a.has(cp));
            }
        }
    }

    #[test]
    fn test_normalization_invariant_random() {
        let mut rng = StdRng::seed_from_u64(0xbeef);
        for _ in 0..200 {
            let s = random_set(&mut rng);
            let r = s.ranges();
            for w in r.windows(2) {
                // Sorted, disjoint, non-adjacent.
                assert!(w[0].max as u64 + 1 < w[1].min as u64);
            }
            for range in r {
                assert!(range.min <= range.max);
                assert!(range.max <= s.maximum());
            }
        }
    }
}
