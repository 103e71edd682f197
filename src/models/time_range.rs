use std::ops::{Bound, RangeBounds};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum RangeOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

impl RangeOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            RangeOrder::OldestFirst => "ASC",
            RangeOrder::NewestFirst => "DESC",
        }
    }
}

/// Timestamp interval (milliseconds) normalized to closed bounds.
///
/// Built from any `RangeBounds<i64>`: exclusive ends move one millisecond
/// inward and unbounded ends become `i64::MIN` / `i64::MAX`, so every
/// consumer only has to compare `lower <= t && t <= upper`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    lower: i64,
    upper: i64,
    order: RangeOrder,
}

impl TimeRange {
    pub fn new<R: RangeBounds<i64>>(bounds: R, order: RangeOrder) -> Self {
        let lower = match bounds.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start.saturating_add(1),
            Bound::Unbounded => i64::MIN,
        };
        let upper = match bounds.end_bound() {
            Bound::Included(&end) => end,
            Bound::Excluded(&end) => end.saturating_sub(1),
            Bound::Unbounded => i64::MAX,
        };

        // `(Excluded(i64::MAX), ..)` must stay empty instead of saturating back
        // onto a real timestamp.
        let lower_overflowed = matches!(bounds.start_bound(), Bound::Excluded(&i64::MAX));
        let upper_overflowed = matches!(bounds.end_bound(), Bound::Excluded(&i64::MIN));
        if lower_overflowed || upper_overflowed {
            return Self::empty(order);
        }

        Self {
            lower,
            upper,
            order,
        }
    }

    pub fn all(order: RangeOrder) -> Self {
        Self::new(.., order)
    }

    pub fn closed(start: i64, end: i64) -> Self {
        Self::new(start..=end, RangeOrder::OldestFirst)
    }

    pub fn empty(order: RangeOrder) -> Self {
        Self {
            lower: i64::MAX,
            upper: i64::MIN,
            order,
        }
    }

    pub fn with_order(mut self, order: RangeOrder) -> Self {
        self.order = order;
        self
    }

    pub fn lower(&self) -> i64 {
        self.lower
    }

    pub fn upper(&self) -> i64 {
        self.upper
    }

    pub fn order(&self) -> RangeOrder {
        self.order
    }

    pub fn is_empty(&self) -> bool {
        self.lower > self.upper
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.lower <= timestamp && timestamp <= self.upper
    }

    /// Narrows the range so it starts strictly after `timestamp`.
    pub fn starting_after(mut self, timestamp: i64) -> Self {
        if timestamp == i64::MAX {
            return Self::empty(self.order);
        }
        self.lower = self.lower.max(timestamp + 1);
        self
    }

    /// Narrows the range so it ends strictly before `timestamp`.
    pub fn ending_before(mut self, timestamp: i64) -> Self {
        if timestamp == i64::MIN {
            return Self::empty(self.order);
        }
        self.upper = self.upper.min(timestamp - 1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_bounds_shift_inward() {
        let range = TimeRange::new(10..20, RangeOrder::OldestFirst);
        assert_eq!(range.lower(), 10);
        assert_eq!(range.upper(), 19);
        assert!(range.contains(19));
        assert!(!range.contains(20));

        let range = TimeRange::new(
            (Bound::Excluded(10), Bound::Included(20)),
            RangeOrder::NewestFirst,
        );
        assert_eq!(range.lower(), 11);
        assert_eq!(range.upper(), 20);
        assert_eq!(range.order(), RangeOrder::NewestFirst);
    }

    #[test]
    fn unbounded_sides_cover_everything() {
        let range = TimeRange::all(RangeOrder::OldestFirst);
        assert!(range.contains(i64::MIN));
        assert!(range.contains(i64::MAX));
        assert!(!range.is_empty());
    }

    #[test]
    fn inverted_or_degenerate_ranges_are_empty() {
        assert!(TimeRange::closed(5, 4).is_empty());
        assert!(TimeRange::new(7..7, RangeOrder::OldestFirst).is_empty());
        assert!(!TimeRange::closed(7, 7).is_empty());
        let past_the_end = (Bound::Excluded(i64::MAX), Bound::Unbounded);
        assert!(TimeRange::new(past_the_end, RangeOrder::OldestFirst).is_empty());
        assert!(TimeRange::new(..i64::MIN, RangeOrder::OldestFirst).is_empty());
    }

    #[test]
    fn narrowing_never_widens() {
        let range = TimeRange::closed(0, 100);
        assert_eq!(range.starting_after(-5).lower(), 0);
        assert_eq!(range.starting_after(40).lower(), 41);
        assert_eq!(range.ending_before(60).upper(), 59);
        assert!(range.starting_after(100).is_empty());
        assert!(range.starting_after(i64::MAX).is_empty());
    }
}
