//! Closed integer intervals written as `[start]` or `[start-end]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Il2Error, Result};

/// Closed interval `[start, end]`, used for reserved tag id ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LimitedRange {
    start: u64,
    end: u64,
}

impl LimitedRange {
    /// Interval starting at `start` holding `count` values.
    pub fn new(start: u64, count: u64) -> Result<Self> {
        if count == 0 {
            return Err(Il2Error::Validation("count is out of range".to_string()));
        }
        let end = start
            .checked_add(count - 1)
            .ok_or_else(|| Il2Error::Validation("range end overflows".to_string()))?;
        Ok(Self { start, end })
    }

    /// Interval holding only `value`.
    pub fn single(value: u64) -> Self {
        Self {
            start: value,
            end: value,
        }
    }

    /// Interval between `start` and `end`, both included.
    pub fn with_end(start: u64, end: u64) -> Result<Self> {
        if end < start {
            return Err(Il2Error::Validation(format!(
                "range end {} is before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse `[3]` or `[3-7]`.
    pub fn resolve(text: &str) -> Result<Self> {
        let invalid = || Il2Error::Format(format!("'{}' is not a valid range", text));
        let inner = text
            .trim()
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
            .ok_or_else(invalid)?;
        let parse = |part: &str| part.trim().parse::<u64>().map_err(|_| invalid());

        match inner.split_once('-') {
            None => Ok(Self::single(parse(inner)?)),
            Some((start, end)) => {
                Self::with_end(parse(start)?, parse(end)?).map_err(|_| invalid())
            }
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn count(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn contains(&self, value: u64) -> bool {
        self.start <= value && value <= self.end
    }

    pub fn contains_range(&self, other: &LimitedRange) -> bool {
        self.contains(other.start) && self.contains(other.end)
    }

    pub fn overlaps_with(&self, other: &LimitedRange) -> bool {
        self.contains(other.start) || self.contains(other.end) || other.contains_range(self)
    }
}

impl fmt::Display for LimitedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "[{}]", self.start)
        } else {
            write!(f, "[{}-{}]", self.start, self.end)
        }
    }
}

impl FromStr for LimitedRange {
    type Err = Il2Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::resolve(s)
    }
}

impl Serialize for LimitedRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LimitedRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::resolve(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_count_zero_rejected() {
        assert!(matches!(LimitedRange::new(5, 0), Err(Il2Error::Validation(_))));
    }

    #[test]
    fn test_new_and_count() {
        let range = LimitedRange::new(3, 5).unwrap();
        assert_eq!(range.end(), 7);
        assert_eq!(range.count(), 5);
        assert_eq!(range.to_string(), "[3-7]");
        assert_eq!(LimitedRange::single(3).to_string(), "[3]");
    }

    #[test]
    fn test_resolve() {
        assert_eq!(LimitedRange::resolve("[3]").unwrap(), LimitedRange::single(3));
        assert_eq!(
            LimitedRange::resolve("[3-7]").unwrap(),
            LimitedRange::with_end(3, 7).unwrap()
        );
        assert!(matches!(LimitedRange::resolve("[a-b]"), Err(Il2Error::Format(_))));
        assert!(matches!(LimitedRange::resolve("[7-3]"), Err(Il2Error::Format(_))));
        assert!(matches!(LimitedRange::resolve("[]"), Err(Il2Error::Format(_))));
        assert!(matches!(LimitedRange::resolve("[[3-4"), Err(Il2Error::Format(_))));
        assert!(matches!(LimitedRange::resolve("3-4]"), Err(Il2Error::Format(_))));
        assert!(matches!(LimitedRange::resolve("[3-4]]"), Err(Il2Error::Format(_))));
    }

    #[test]
    fn test_containment_and_overlap() {
        let outer = LimitedRange::with_end(10, 20).unwrap();
        assert!(outer.contains(10));
        assert!(outer.contains(20));
        assert!(!outer.contains(21));
        assert!(outer.contains_range(&LimitedRange::with_end(12, 15).unwrap()));
        assert!(!outer.contains_range(&LimitedRange::with_end(15, 25).unwrap()));

        assert!(outer.overlaps_with(&LimitedRange::with_end(15, 25).unwrap()));
        assert!(outer.overlaps_with(&LimitedRange::with_end(5, 10).unwrap()));
        assert!(LimitedRange::single(15).overlaps_with(&outer));
        assert!(!outer.overlaps_with(&LimitedRange::with_end(21, 30).unwrap()));
    }

    #[test]
    fn test_serde_as_string() {
        let range = LimitedRange::with_end(1, 4).unwrap();
        let json = serde_json::to_string(&range).unwrap();
        assert_eq!(json, "\"[1-4]\"");
        let back: LimitedRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, range);
    }

    proptest! {
        #[test]
        fn prop_resolve_display(start in 0u64..1_000_000, count in 1u64..1_000_000) {
            let range = LimitedRange::new(start, count).unwrap();
            prop_assert_eq!(LimitedRange::resolve(&range.to_string()).unwrap(), range);
            prop_assert_eq!(range.count(), count);
        }
    }
}
