//! Message sequence sets and UID sets.
//!
//! A set is a coalesced, ascending list of inclusive ranges. No two ranges
//! overlap or touch, so every set has exactly one canonical rendering such
//! as `1,3:5,9:*`. The `*` bound is stored as the largest representable
//! value of the element type.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Integer types usable as set elements.
pub trait SetNumber:
    Copy + Ord + fmt::Debug + fmt::Display + FromStr + Send + Sync + 'static
{
    /// Zero; never a valid element.
    const ZERO: Self;
    /// Value standing in for `*`.
    const MAX: Self;

    /// Value minus one, saturating.
    #[must_use]
    fn pred(self) -> Self;

    /// Value plus one, saturating.
    #[must_use]
    fn succ(self) -> Self;

    /// Number of values in `start..=end`.
    fn span(start: Self, end: Self) -> u64;
}

impl SetNumber for u32 {
    const ZERO: Self = 0;
    const MAX: Self = Self::MAX;

    fn pred(self) -> Self {
        self.saturating_sub(1)
    }

    fn succ(self) -> Self {
        self.saturating_add(1)
    }

    fn span(start: Self, end: Self) -> u64 {
        u64::from(end - start) + 1
    }
}

impl SetNumber for u64 {
    const ZERO: Self = 0;
    const MAX: Self = Self::MAX;

    fn pred(self) -> Self {
        self.saturating_sub(1)
    }

    fn succ(self) -> Self {
        self.saturating_add(1)
    }

    fn span(start: Self, end: Self) -> u64 {
        (end - start).saturating_add(1)
    }
}

/// Errors from building or parsing a set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetError {
    /// Zero is not a valid message number or UID.
    #[error("0 is not a valid set element")]
    Zero,
    /// The set specification was empty.
    #[error("empty set specification")]
    Empty,
    /// The set specification could not be parsed.
    #[error("malformed set element: {0:?}")]
    Malformed(String),
}

/// A coalesced set of message numbers or UIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NumberSet<T: SetNumber> {
    ranges: Vec<(T, T)>,
}

/// UID set (64-bit elements).
pub type UidSet = NumberSet<u64>;

/// Message sequence number set (32-bit elements).
pub type MessageSet = NumberSet<u32>;

impl<T: SetNumber> Default for NumberSet<T> {
    fn default() -> Self {
        Self { ranges: Vec::new() }
    }
}

impl<T: SetNumber> NumberSet<T> {
    /// Creates an empty set for incremental building.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set holding one element.
    pub fn single(n: T) -> Result<Self, SetError> {
        Self::range(n, n)
    }

    /// Creates a set holding an inclusive range; the bounds may be given in either order.
    pub fn range(start: T, end: T) -> Result<Self, SetError> {
        let mut set = Self::new();
        set.add_range(start, end)?;
        Ok(set)
    }

    /// The whole mailbox, `1:*`.
    #[must_use]
    pub fn all() -> Self {
        Self {
            ranges: vec![(T::ZERO.succ(), T::MAX)],
        }
    }

    /// Adds one element, merging with neighbouring ranges.
    pub fn add(&mut self, n: T) -> Result<(), SetError> {
        self.add_range(n, n)
    }

    /// Adds an inclusive range, merging with overlapping or adjacent ranges.
    pub fn add_range(&mut self, start: T, end: T) -> Result<(), SetError> {
        if start == T::ZERO || end == T::ZERO {
            return Err(SetError::Zero);
        }
        let (mut lo, mut hi) = if start <= end { (start, end) } else { (end, start) };

        let mut merged = Vec::with_capacity(self.ranges.len() + 1);
        let mut inserted = false;
        for &(a, b) in &self.ranges {
            if b.succ() < lo {
                merged.push((a, b));
            } else if a > hi.succ() {
                if !inserted {
                    merged.push((lo, hi));
                    inserted = true;
                }
                merged.push((a, b));
            } else {
                lo = lo.min(a);
                hi = hi.max(b);
            }
        }
        if !inserted {
            merged.push((lo, hi));
        }
        self.ranges = merged;
        Ok(())
    }

    /// Removes one element, splitting its range if needed.
    ///
    /// Returns false if the element is absent or is the only element left;
    /// a set built from server data never becomes empty.
    pub fn remove(&mut self, n: T) -> bool {
        let Some(idx) = self.ranges.iter().position(|&(a, b)| a <= n && n <= b) else {
            return false;
        };
        if self.size() == 1 {
            return false;
        }
        let (a, b) = self.ranges[idx];
        match (a == n, b == n) {
            (true, true) => {
                self.ranges.remove(idx);
            }
            (true, false) => self.ranges[idx] = (n.succ(), b),
            (false, true) => self.ranges[idx] = (a, n.pred()),
            (false, false) => {
                self.ranges[idx] = (a, n.pred());
                self.ranges.insert(idx + 1, (n.succ(), b));
            }
        }
        true
    }

    /// Returns true if the element is in the set.
    #[must_use]
    pub fn contains(&self, n: T) -> bool {
        self.ranges
            .binary_search_by(|&(a, b)| {
                if b < n {
                    std::cmp::Ordering::Less
                } else if a > n {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Number of elements, summed over all ranges. A `*` bound counts as the type's maximum.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.ranges
            .iter()
            .fold(0u64, |acc, &(a, b)| acc.saturating_add(T::span(a, b)))
    }

    /// Returns true if the set has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The coalesced ranges in ascending order.
    #[must_use]
    pub fn ranges(&self) -> &[(T, T)] {
        &self.ranges
    }

    /// Iterates over every element in ascending order, expanding ranges lazily.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ranges: self.ranges.iter(),
            current: None,
        }
    }
}

impl<'a, T: SetNumber> IntoIterator for &'a NumberSet<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy element iterator over a [`NumberSet`].
#[derive(Debug, Clone)]
pub struct Iter<'a, T: SetNumber> {
    ranges: std::slice::Iter<'a, (T, T)>,
    current: Option<(T, T)>,
}

impl<T: SetNumber> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let (next, end) = match self.current {
            Some(run) => run,
            None => *self.ranges.next()?,
        };
        self.current = if next == end {
            None
        } else {
            Some((next.succ(), end))
        };
        Some(next)
    }
}

fn write_bound<T: SetNumber>(f: &mut fmt::Formatter<'_>, n: T) -> fmt::Result {
    if n == T::MAX {
        f.write_str("*")
    } else {
        write!(f, "{n}")
    }
}

impl<T: SetNumber> fmt::Display for NumberSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, &(a, b)) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write_bound(f, a)?;
            if a != b {
                f.write_str(":")?;
                write_bound(f, b)?;
            }
        }
        Ok(())
    }
}

fn parse_bound<T: SetNumber>(s: &str) -> Result<T, SetError> {
    if s == "*" {
        return Ok(T::MAX);
    }
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SetError::Malformed(s.to_string()));
    }
    s.parse::<T>()
        .map_err(|_| SetError::Malformed(s.to_string()))
}

/// Parses `n`, `n:m` and comma-joined combinations, in any order.
impl<T: SetNumber> FromStr for NumberSet<T> {
    type Err = SetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(SetError::Empty);
        }
        let mut set = Self::new();
        for part in s.split(',') {
            match part.split_once(':') {
                Some((a, b)) => set.add_range(parse_bound(a)?, parse_bound(b)?)?,
                None => set.add(parse_bound(part)?)?,
            }
        }
        Ok(set)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_and_render() {
        let set: UidSet = "1,3:5,9".parse().unwrap();
        assert_eq!(set.to_string(), "1,3:5,9");
        assert_eq!(set.size(), 5);
    }

    #[test]
    fn test_parse_unordered_input_coalesces() {
        let set: UidSet = "9,4:5,3,1,2".parse().unwrap();
        assert_eq!(set.to_string(), "1:5,9");
        assert_eq!(set.ranges(), &[(1, 5), (9, 9)]);
    }

    #[test]
    fn test_reversed_range() {
        let set: MessageSet = "7:3".parse().unwrap();
        assert_eq!(set.to_string(), "3:7");
    }

    #[test]
    fn test_star_bound() {
        let set: MessageSet = "4:*".parse().unwrap();
        assert_eq!(set.to_string(), "4:*");
        assert!(set.contains(4));
        assert!(set.contains(u32::MAX));
        assert!(!set.contains(3));
        assert_eq!(MessageSet::all().to_string(), "1:*");
        let star: UidSet = "*".parse().unwrap();
        assert_eq!(star.to_string(), "*");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<UidSet>(), Err(SetError::Empty));
        assert_eq!("0".parse::<UidSet>(), Err(SetError::Zero));
        assert!(matches!("1,,2".parse::<UidSet>(), Err(SetError::Malformed(_))));
        assert!(matches!("a:3".parse::<UidSet>(), Err(SetError::Malformed(_))));
        assert!(matches!(
            "4294967296".parse::<MessageSet>(),
            Err(SetError::Malformed(_))
        ));
        assert!("4294967296".parse::<UidSet>().is_ok());
    }

    #[test]
    fn test_add_merges_adjacent() {
        let mut set = UidSet::new();
        set.add(5).unwrap();
        set.add(7).unwrap();
        assert_eq!(set.to_string(), "5,7");
        set.add(6).unwrap();
        assert_eq!(set.to_string(), "5:7");
        set.add_range(1, 4).unwrap();
        assert_eq!(set.ranges(), &[(1, 7)]);
        assert_eq!(set.add(0), Err(SetError::Zero));
    }

    #[test]
    fn test_add_bridges_multiple_ranges() {
        let mut set: UidSet = "1:2,5,8:9,20".parse().unwrap();
        set.add_range(3, 10).unwrap();
        assert_eq!(set.to_string(), "1:10,20");
    }

    #[test]
    fn test_remove_splits() {
        let mut set: UidSet = "1:5".parse().unwrap();
        assert!(set.remove(3));
        assert_eq!(set.to_string(), "1:2,4:5");
        assert!(set.remove(1));
        assert!(set.remove(5));
        assert_eq!(set.to_string(), "2,4");
        assert!(!set.remove(3));
    }

    #[test]
    fn test_remove_refuses_last_element() {
        let mut set = UidSet::single(42).unwrap();
        assert!(!set.remove(42));
        assert_eq!(set.to_string(), "42");
        assert_eq!(set.size(), 1);
    }

    #[test]
    fn test_iteration_is_lazy_and_ordered() {
        let set: MessageSet = "3,1:2,10:12".parse().unwrap();
        let all: Vec<u32> = set.iter().collect();
        assert_eq!(all, vec![1, 2, 3, 10, 11, 12]);

        let huge = UidSet::range(1, u64::MAX).unwrap();
        let first: Vec<u64> = huge.iter().take(3).collect();
        assert_eq!(first, vec![1, 2, 3]);
    }

    #[test]
    fn test_iteration_ends_at_max() {
        let set = MessageSet::range(u32::MAX - 1, u32::MAX).unwrap();
        let all: Vec<u32> = set.iter().collect();
        assert_eq!(all, vec![u32::MAX - 1, u32::MAX]);
    }

    fn canonical(ranges: &[(u64, u64)]) -> String {
        let mut parts = Vec::new();
        for &(a, b) in ranges {
            if a == b {
                parts.push(a.to_string());
            } else {
                parts.push(format!("{a}:{b}"));
            }
        }
        parts.join(",")
    }

    proptest! {
        #[test]
        fn prop_add_keeps_coalescing_invariant(
            ops in proptest::collection::vec((1u64..500, 0u64..20), 1..40)
        ) {
            let mut set = UidSet::new();
            for (start, len) in ops {
                set.add_range(start, start + len).unwrap();
            }
            let ranges = set.ranges();
            for pair in ranges.windows(2) {
                // strictly ascending with a gap of at least one
                prop_assert!(pair[0].1 + 1 < pair[1].0);
            }
            for &(a, b) in ranges {
                prop_assert!(a <= b);
            }
            let counted = set.iter().count() as u64;
            prop_assert_eq!(counted, set.size());
        }

        #[test]
        fn prop_render_parse_idempotent(
            ops in proptest::collection::vec((1u64..10_000, 0u64..50), 1..30)
        ) {
            let mut set = UidSet::new();
            for (start, len) in ops {
                set.add_range(start, start + len).unwrap();
            }
            let rendered = set.to_string();
            prop_assert_eq!(&rendered, &canonical(set.ranges()));
            let reparsed: UidSet = rendered.parse().unwrap();
            prop_assert_eq!(reparsed.to_string(), rendered);
            prop_assert_eq!(reparsed, set);
        }

        #[test]
        fn prop_contains_matches_iteration(
            ops in proptest::collection::vec((1u32..200, 0u32..10), 1..20),
            candidate in 1u32..250
        ) {
            let mut set = MessageSet::new();
            for (start, len) in ops {
                set.add_range(start, start + len).unwrap();
            }
            prop_assert_eq!(set.contains(candidate), set.iter().any(|n| n == candidate));
        }
    }
}
