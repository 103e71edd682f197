use std::ops::Range;

use crate::chart::label::interpolate;
use crate::chart::{DataPoint, LabelMarker};
use crate::smoothing::SmoothingKernel;

/// A growing series with an optional smoothed twin and labels.
///
/// `raw` is kept sorted by timestamp; `smoothed[i]` is always the kernel
/// applied to `raw[..=i]`. Samples may arrive late, in which case only the
/// smoothed points whose window reaches back to the new sample are redone.
#[derive(Debug, Clone)]
pub struct LiveSeries {
    kernel: Option<SmoothingKernel>,
    weights: Vec<f64>,
    raw: Vec<DataPoint>,
    smoothed: Vec<DataPoint>,
    labels: Vec<LabelMarker>,
}

impl Default for LiveSeries {
    fn default() -> Self {
        Self::new(None)
    }
}

impl LiveSeries {
    pub fn new(kernel: Option<SmoothingKernel>) -> Self {
        Self {
            weights: kernel.map_or_else(|| vec![1.0], |k| k.weights()),
            kernel,
            raw: Vec::new(),
            smoothed: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn kernel(&self) -> Option<SmoothingKernel> {
        self.kernel
    }

    /// Swaps the kernel and re-smooths everything held.
    pub fn set_kernel(&mut self, kernel: Option<SmoothingKernel>) {
        self.kernel = kernel;
        self.weights = kernel.map_or_else(|| vec![1.0], |k| k.weights());
        for index in 0..self.smoothed.len() {
            self.smoothed[index] = self.smooth_at(index);
        }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn raw_points(&self) -> &[DataPoint] {
        &self.raw
    }

    pub fn smoothed_points(&self) -> &[DataPoint] {
        &self.smoothed
    }

    pub fn labels(&self) -> &[LabelMarker] {
        &self.labels
    }

    pub fn add_sample(&mut self, point: DataPoint) {
        let index = self.raw.partition_point(|p| p.x <= point.x);
        self.raw.insert(index, point);
        self.smoothed.insert(index, point);

        let end = (index + self.weights.len()).min(self.raw.len());
        for affected in index..end {
            self.smoothed[affected] = self.smooth_at(affected);
        }

        self.resolve_pending();
    }

    /// Adds a label and resolves it against the samples seen so far.
    pub fn add_label(&mut self, timestamp: i64) -> LabelMarker {
        let mut label = LabelMarker::unresolved(timestamp);
        resolve(&self.raw, &mut label);

        let position = self.labels.partition_point(|l| l.timestamp <= timestamp);
        self.labels.insert(position, label);
        label
    }

    /// Smoothed points of the samples whose timestamp is in
    /// `[x_min, x_max]`.
    pub fn smoothed_in_range(&self, x_min: i64, x_max: i64) -> &[DataPoint] {
        &self.smoothed[self.raw_range(x_min, x_max)]
    }

    /// Drops samples older than `timestamp`, keeping the few the kernel
    /// still needs to smooth whatever arrives next. Finalized labels before
    /// `timestamp` go too. Returns how many samples were dropped.
    pub fn trim_before(&mut self, timestamp: i64) -> usize {
        let cut = self.raw.partition_point(|p| p.x < timestamp);
        let history = self.weights.len() - 1;
        let dropped = cut.saturating_sub(history);

        self.raw.drain(..dropped);
        self.smoothed.drain(..dropped);
        self.labels.retain(|label| label.is_pending() || label.timestamp >= timestamp);
        dropped
    }

    pub fn clear(&mut self) {
        self.raw.clear();
        self.smoothed.clear();
        self.labels.clear();
    }

    fn raw_range(&self, x_min: i64, x_max: i64) -> Range<usize> {
        if x_min > x_max {
            return 0..0;
        }
        let start = self.raw.partition_point(|p| p.x < x_min);
        let end = self.raw.partition_point(|p| p.x <= x_max);
        start..end.max(start)
    }

    /// Weighted mean of `raw[index]` and the samples before it. Weights for
    /// samples that do not exist are left out of the normalization.
    fn smooth_at(&self, index: usize) -> DataPoint {
        let newest = self.raw[index];
        let mut total_weight = 0.0;
        let mut dx = 0.0;
        let mut y = 0.0;

        for (distance, weight) in self.weights.iter().enumerate().take(index + 1) {
            let sample = self.raw[index - distance];
            total_weight += weight;
            dx += weight * (sample.x - newest.x) as f64;
            y += weight * sample.y;
        }

        if total_weight <= 0.0 {
            return newest;
        }
        DataPoint::new(
            newest.x + (dx / total_weight).round() as i64,
            y / total_weight,
        )
    }

    fn resolve_pending(&mut self) {
        for label in self.labels.iter_mut().filter(|l| l.is_pending()) {
            resolve(&self.raw, label);
        }
    }
}

/// Applies the label policy for one pending label.
///
/// With samples on both sides the label is finalized at the interpolated
/// value. Outside the sampled span it tracks the nearest end and stays
/// pending.
fn resolve(raw: &[DataPoint], label: &mut LabelMarker) {
    if label.finalized {
        return;
    }
    let (Some(first), Some(last)) = (raw.first(), raw.last()) else {
        return;
    };

    let t = label.timestamp;
    if t < first.x {
        label.display_value = Some(first.y);
        return;
    }
    if t > last.x {
        label.display_value = Some(last.y);
        return;
    }

    let index = raw.partition_point(|p| p.x < t);
    let value = match (index.checked_sub(1).and_then(|i| raw.get(i)), raw.get(index)) {
        (_, Some(at)) if at.x == t => at.y,
        (Some(before), Some(after)) => interpolate(before.x, before.y, after.x, after.y, t),
        _ => return,
    };
    *label = LabelMarker::finalized(t, value);
}
