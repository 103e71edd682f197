use std::collections::VecDeque;
use std::ops::Range;

use super::label::interpolate;
use super::{CacheConfig, DataPoint, LabelMarker};

/// Which index to report when several points share the searched timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    First,
    Last,
}

/// Time-ordered window of chart points.
///
/// Points stay sorted ascending by `x` after every mutation. Live data is
/// appended at the back, scroll-back data is prepended at the front, and
/// both ends can be trimmed once the window grows past its thresholds.
/// Owned by the render thread; nothing here synchronizes.
#[derive(Debug, Clone, Default)]
pub struct ChartCache {
    points: VecDeque<DataPoint>,
    labels: Vec<LabelMarker>,
    config: CacheConfig,
}

impl ChartCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            points: VecDeque::new(),
            labels: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &VecDeque<DataPoint> {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&DataPoint> {
        self.points.get(index)
    }

    pub fn first(&self) -> Option<&DataPoint> {
        self.points.front()
    }

    pub fn last(&self) -> Option<&DataPoint> {
        self.points.back()
    }

    pub fn labels(&self) -> &[LabelMarker] {
        &self.labels
    }

    /// Inserts a point at its sorted position. Points landing on an
    /// existing timestamp go after the ones already there.
    pub fn add_point(&mut self, point: DataPoint) {
        match (self.points.front(), self.points.back()) {
            (_, Some(last)) if point.x >= last.x => self.points.push_back(point),
            (Some(first), _) if point.x < first.x => self.points.push_front(point),
            (None, None) => self.points.push_back(point),
            _ => {
                let index = self.points.partition_point(|p| p.x <= point.x);
                self.points.insert(index, point);
            }
        }
    }

    pub fn append_points<I: IntoIterator<Item = DataPoint>>(&mut self, points: I) {
        for point in points {
            self.add_point(point);
        }
    }

    /// Adds older points, e.g. a page loaded while scrolling back.
    /// Accepts them in either order.
    pub fn prepend_points<I: IntoIterator<Item = DataPoint>>(&mut self, points: I) {
        let mut older: Vec<DataPoint> = points.into_iter().collect();
        older.sort_by_key(|p| p.x);
        for point in older.into_iter().rev() {
            self.add_point(point);
        }
    }

    /// Replaces the whole window. Labels outside the new span are dropped.
    pub fn set_points(&mut self, mut points: Vec<DataPoint>) {
        points.sort_by_key(|p| p.x);
        self.points = points.into();
        self.prune_labels();
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.labels.clear();
    }

    pub fn x_bounds(&self) -> Option<(i64, i64)> {
        Some((self.points.front()?.x, self.points.back()?.x))
    }

    pub fn y_bounds(&self) -> Option<(f64, f64)> {
        let first = self.points.front()?;
        Some(
            self.points
                .iter()
                .fold((first.y, first.y), |(min, max), p| (min.min(p.y), max.max(p.y))),
        )
    }

    /// Index of the point at `target_x`, or of the last point before it.
    ///
    /// `None` when the cache is empty or every point is after `target_x`.
    pub fn exact_binary_search(&self, target_x: i64, tie_break: TieBreak) -> Option<usize> {
        let lower = self.points.partition_point(|p| p.x < target_x);
        match self.points.get(lower) {
            Some(point) if point.x == target_x => Some(match tie_break {
                TieBreak::First => lower,
                TieBreak::Last => self.points.partition_point(|p| p.x <= target_x) - 1,
            }),
            _ => lower.checked_sub(1),
        }
    }

    /// Cheap search for pixel positioning.
    ///
    /// Narrows `[lo, hi]` around the insertion point of `target_x` (first
    /// index whose `x >= target_x`) only until it is at most `approx_range`
    /// wide, then returns its low end if `prefer_start` and its high end
    /// otherwise. The result is within `approx_range` of the exact insertion
    /// point and may equal `len()`.
    pub fn approximate_binary_search(
        &self,
        target_x: i64,
        lo: usize,
        hi: usize,
        prefer_start: bool,
        approx_range: usize,
    ) -> usize {
        let mut hi = hi.min(self.points.len());
        let mut lo = lo.min(hi);

        while hi - lo > approx_range {
            let mid = lo + (hi - lo) / 2;
            if self.points[mid].x < target_x {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        if prefer_start {
            lo
        } else {
            hi
        }
    }

    /// Index range of the points with `x_min <= x <= x_max`.
    pub fn range_indices(&self, x_min: i64, x_max: i64) -> Range<usize> {
        if x_min > x_max {
            return 0..0;
        }
        let start = self.points.partition_point(|p| p.x < x_min);
        let end = self.points.partition_point(|p| p.x <= x_max);
        start..end.max(start)
    }

    pub fn points_in_range(&self, x_min: i64, x_max: i64) -> Vec<DataPoint> {
        self.points
            .range(self.range_indices(x_min, x_max))
            .copied()
            .collect()
    }

    /// Attaches a label if `timestamp` lies within the cached points.
    ///
    /// The label takes the value of the point at `timestamp` when one
    /// exists and the linear interpolation of its neighbours otherwise.
    /// Returns `false`, leaving the cache untouched, when out of range.
    pub fn try_adding_label(&mut self, timestamp: i64) -> bool {
        let Some((first_x, last_x)) = self.x_bounds() else {
            return false;
        };
        if timestamp < first_x || timestamp > last_x {
            return false;
        }

        let Some(index) = self.exact_binary_search(timestamp, TieBreak::First) else {
            return false;
        };
        let before = self.points[index];
        let value = match self.points.get(index + 1) {
            _ if before.x == timestamp => before.y,
            Some(after) => interpolate(before.x, before.y, after.x, after.y, timestamp),
            None => before.y,
        };

        let position = self.labels.partition_point(|l| l.timestamp <= timestamp);
        self.labels.insert(position, LabelMarker::finalized(timestamp, value));
        true
    }

    /// Evicts points older than `timestamp` once the window is both larger
    /// than `size_threshold` points and wider than `age_threshold_ms`.
    /// Always keeps at least the newest point. Returns how many were dropped.
    pub fn throw_away_before(&mut self, timestamp: i64) -> usize {
        if !self.exceeds_thresholds() {
            return 0;
        }

        let cut = self
            .points
            .partition_point(|p| p.x < timestamp)
            .min(self.points.len() - 1);
        self.points.drain(..cut);
        self.prune_labels();
        cut
    }

    /// Mirror of [`Self::throw_away_before`] for scrolling back in time:
    /// evicts points newer than `timestamp`, keeping at least the oldest.
    pub fn throw_away_after(&mut self, timestamp: i64) -> usize {
        if !self.exceeds_thresholds() {
            return 0;
        }

        let keep = self.points.partition_point(|p| p.x <= timestamp).max(1);
        let removed = self.points.len() - keep;
        self.points.truncate(keep);
        self.prune_labels();
        removed
    }

    fn exceeds_thresholds(&self) -> bool {
        let Some((first_x, last_x)) = self.x_bounds() else {
            return false;
        };
        self.points.len() > self.config.size_threshold
            && last_x.saturating_sub(first_x) > self.config.age_threshold_ms
    }

    fn prune_labels(&mut self) {
        match self.x_bounds() {
            Some((first_x, last_x)) => self
                .labels
                .retain(|l| first_x <= l.timestamp && l.timestamp <= last_x),
            None => self.labels.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn cache_from(xs: &[i64]) -> ChartCache {
        let mut cache = ChartCache::new(CacheConfig {
            size_threshold: 3,
            age_threshold_ms: 10,
        });
        cache.set_points(xs.iter().map(|&x| DataPoint::new(x, x as f64)).collect());
        cache
    }

    fn xs(cache: &ChartCache) -> Vec<i64> {
        cache.points().iter().map(|p| p.x).collect()
    }

    #[test]
    fn points_stay_sorted_when_added_at_either_end() {
        let mut cache = ChartCache::default();
        cache.add_point(DataPoint::new(20, 2.0));
        cache.add_point(DataPoint::new(30, 3.0));
        cache.prepend_points([DataPoint::new(0, 0.0), DataPoint::new(10, 1.0)]);
        cache.add_point(DataPoint::new(15, 1.5));
        cache.append_points([DataPoint::new(40, 4.0)]);

        assert_eq!(xs(&cache), vec![0, 10, 15, 20, 30, 40]);
        assert_eq!(cache.y_bounds(), Some((0.0, 4.0)));
    }

    #[test]
    fn exact_search_honours_tie_break_and_floors() {
        let cache = cache_from(&[0, 10, 10, 10, 20]);

        assert_eq!(cache.exact_binary_search(10, TieBreak::First), Some(1));
        assert_eq!(cache.exact_binary_search(10, TieBreak::Last), Some(3));
        assert_eq!(cache.exact_binary_search(15, TieBreak::First), Some(3));
        assert_eq!(cache.exact_binary_search(25, TieBreak::Last), Some(4));
        assert_eq!(cache.exact_binary_search(-1, TieBreak::First), None);
        assert_eq!(ChartCache::default().exact_binary_search(0, TieBreak::First), None);
    }

    #[test]
    fn coarse_approximate_search_returns_window_edges() {
        let cache = cache_from(&(0..100).map(|i| i * 10).collect::<Vec<_>>());

        assert_eq!(cache.approximate_binary_search(505, 0, 100, true, 0), 51);
        let start = cache.approximate_binary_search(505, 0, 100, true, 8);
        let end = cache.approximate_binary_search(505, 0, 100, false, 8);
        assert!(start <= 51 && 51 <= end);
        assert!(end - start <= 8);
    }

    #[test]
    fn range_query_is_inclusive() {
        let cache = cache_from(&[0, 10, 20, 30, 40]);

        let xs: Vec<_> = cache.points_in_range(10, 30).iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![10, 20, 30]);
        assert!(cache.points_in_range(11, 19).is_empty());
        assert!(cache.points_in_range(30, 10).is_empty());
        assert_eq!(cache.points_in_range(i64::MIN, i64::MAX).len(), 5);
    }

    #[test]
    fn range_query_reaches_the_extreme_timestamps() {
        let cache = cache_from(&[i64::MIN, 0, i64::MAX]);

        assert_eq!(cache.points_in_range(0, i64::MAX).len(), 2);
        assert_eq!(cache.points_in_range(i64::MAX, i64::MAX).len(), 1);
        assert_eq!(cache.points_in_range(i64::MIN, i64::MIN).len(), 1);
        assert_eq!(cache.points_in_range(i64::MIN, i64::MAX).len(), 3);
        assert!(cache.points_in_range(1, i64::MAX - 1).is_empty());
    }

    #[test]
    fn labels_attach_only_inside_the_window() {
        let mut cache = ChartCache::default();
        cache.set_points(vec![
            DataPoint::new(0, 0.0),
            DataPoint::new(10, 5.0),
            DataPoint::new(20, 1.0),
        ]);

        assert!(!cache.try_adding_label(-1));
        assert!(!cache.try_adding_label(21));
        assert!(cache.labels().is_empty());

        assert!(cache.try_adding_label(10));
        assert!(cache.try_adding_label(4));
        assert!(cache.try_adding_label(20));

        let labels = cache.labels();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels[0].timestamp, 4);
        assert_relative_eq!(labels[0].display_value.unwrap(), 2.0);
        assert_eq!(labels[1].display_value, Some(5.0));
        assert_eq!(labels[2].display_value, Some(1.0));
        assert!(labels.iter().all(|l| l.finalized));
    }

    #[test]
    fn label_on_empty_cache_is_rejected() {
        let mut cache = ChartCache::default();
        assert!(!cache.try_adding_label(0));
    }

    #[test]
    fn eviction_needs_both_thresholds() {
        // Four points but only 3 ms wide: too young to trim.
        let mut narrow = cache_from(&[0, 1, 2, 3]);
        assert_eq!(narrow.throw_away_before(2), 0);
        assert_eq!(narrow.len(), 4);

        // Wide but only three points: too small to trim.
        let mut sparse = cache_from(&[0, 100, 200]);
        assert_eq!(sparse.throw_away_before(150), 0);
        assert_eq!(sparse.len(), 3);

        let mut busy = cache_from(&[0, 10, 20, 30, 40]);
        assert_eq!(busy.throw_away_before(25), 3);
        assert_eq!(xs(&busy), vec![30, 40]);
    }

    #[test]
    fn eviction_never_empties_the_cache() {
        let mut cache = cache_from(&[0, 10, 20, 30, 40]);
        assert!(cache.try_adding_label(5));
        assert!(cache.try_adding_label(40));

        assert_eq!(cache.throw_away_before(1_000), 4);
        assert_eq!(xs(&cache), vec![40]);
        assert_eq!(cache.labels().len(), 1);
        assert_eq!(cache.labels()[0].timestamp, 40);
    }

    #[test]
    fn throw_away_after_trims_the_newest_end() {
        let mut cache = cache_from(&[0, 10, 20, 30, 40]);
        assert_eq!(cache.throw_away_after(15), 3);
        assert_eq!(xs(&cache), vec![0, 10]);

        let mut cache = cache_from(&[0, 10, 20, 30, 40]);
        assert_eq!(cache.throw_away_after(-5), 4);
        assert_eq!(xs(&cache), vec![0]);
    }

    /// Mostly small timestamps, with the representable extremes mixed in.
    fn timestamp() -> impl Strategy<Value = i64> {
        prop_oneof![
            8 => -600i64..600,
            1 => Just(i64::MIN),
            1 => Just(i64::MAX),
        ]
    }

    fn sorted(mut xs: Vec<i64>) -> Vec<i64> {
        xs.sort_unstable();
        xs
    }

    proptest! {
        #[test]
        fn exact_search_finds_every_inserted_timestamp(
            xs in prop::collection::vec(-500i64..500, 1..200),
            pick in any::<prop::sample::Index>(),
        ) {
            let target = xs[pick.index(xs.len())];
            let cache = cache_from(&xs);

            let first = cache.exact_binary_search(target, TieBreak::First).unwrap();
            let last = cache.exact_binary_search(target, TieBreak::Last).unwrap();
            prop_assert_eq!(cache.get(first).unwrap().x, target);
            prop_assert_eq!(cache.get(last).unwrap().x, target);
            prop_assert!(first == 0 || cache.get(first - 1).unwrap().x < target);
            prop_assert!(cache.get(last + 1).map_or(true, |p| p.x > target));
        }

        #[test]
        fn approximate_search_stays_within_range(
            xs in prop::collection::vec(-500i64..500, 0..200),
            target in -600i64..600,
            approx_range in 0usize..32,
            prefer_start in any::<bool>(),
        ) {
            let cache = cache_from(&xs);
            let truth = cache.points().partition_point(|p| p.x < target);
            let found =
                cache.approximate_binary_search(target, 0, cache.len(), prefer_start, approx_range);
            prop_assert!(found.abs_diff(truth) <= approx_range);
        }

        #[test]
        fn range_query_matches_a_linear_filter(
            xs in prop::collection::vec(timestamp(), 0..200),
            a in timestamp(),
            b in timestamp(),
        ) {
            let (lo, hi) = (a.min(b), a.max(b));
            let cache = cache_from(&xs);
            let expected: Vec<i64> = sorted(xs)
                .into_iter()
                .filter(|x| lo <= *x && *x <= hi)
                .collect();
            let found: Vec<i64> = cache.points_in_range(lo, hi).iter().map(|p| p.x).collect();
            prop_assert_eq!(found, expected);
        }

        #[test]
        fn eviction_keeps_order_and_bounds(
            xs in prop::collection::vec(-500i64..500, 1..200),
            cut in -600i64..600,
        ) {
            let mut cache = cache_from(&xs);
            let before = cache.len();
            let span_ok = cache.x_bounds().map_or(false, |(f, l)| l - f > 10);
            let removed = cache.throw_away_before(cut);

            prop_assert!(!cache.is_empty());
            prop_assert_eq!(cache.len() + removed, before);
            if !(before > 3 && span_ok) {
                prop_assert_eq!(removed, 0);
            } else if cache.len() > 1 {
                prop_assert!(cache.first().unwrap().x >= cut);
            }
            let remaining: Vec<i64> = cache.points().iter().map(|p| p.x).collect();
            prop_assert_eq!(remaining.clone(), sorted(remaining));
        }
    }
}
