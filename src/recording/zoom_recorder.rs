use anyhow::Result;

use crate::db::models::{ScalarReading, ZoomStats};
use crate::recording::RecordingConfig;

/// Extremes collected for one bucket of a higher tier.
#[derive(Debug, Clone, Default)]
struct Bucket {
    count: usize,
    min: Option<(i64, f64)>,
    max: Option<(i64, f64)>,
}

impl Bucket {
    fn push(&mut self, timestamp_ms: i64, value: f64) {
        self.count += 1;
        // Strict comparisons keep the earliest point among equal values.
        if self.min.map_or(true, |(_, min)| value < min) {
            self.min = Some((timestamp_ms, value));
        }
        if self.max.map_or(true, |(_, max)| value > max) {
            self.max = Some((timestamp_ms, value));
        }
    }

    /// Emits the minimum and maximum in timestamp order and empties the
    /// bucket. A single point comes out when both are the same sample.
    fn drain(&mut self) -> Vec<(i64, f64)> {
        let emitted = match (self.min, self.max) {
            (Some(min), Some(max)) if min.0 == max.0 => vec![min],
            (Some(min), Some(max)) if min.0 < max.0 => vec![min, max],
            (Some(min), Some(max)) => vec![max, min],
            _ => Vec::new(),
        };
        *self = Self::default();
        emitted
    }
}

/// Builds the decimated tiers for one sensor while it records.
///
/// Tier `n + 1` is fed the points tier `n` emits. Every `2 * decimation_factor`
/// inputs a tier emits the minimum and maximum of that run, so each tier holds
/// about `1 / decimation_factor` of the points below it and spikes survive.
#[derive(Debug, Clone)]
pub struct ZoomRecorder {
    trial_id: String,
    sensor_tag: String,
    config: RecordingConfig,
    /// Open bucket for tiers 1 and up; index 0 feeds tier 1.
    buckets: Vec<Bucket>,
    count: i64,
    first_ms: Option<i64>,
    last_ms: Option<i64>,
}

impl ZoomRecorder {
    pub fn new(trial_id: &str, sensor_tag: &str, config: RecordingConfig) -> Result<Self> {
        config.validate()?;
        let higher_tiers = config.tier_count as usize - 1;

        Ok(Self {
            trial_id: trial_id.to_string(),
            sensor_tag: sensor_tag.to_string(),
            config,
            buckets: vec![Bucket::default(); higher_tiers],
            count: 0,
            first_ms: None,
            last_ms: None,
        })
    }

    pub fn trial_id(&self) -> &str {
        &self.trial_id
    }

    pub fn sensor_tag(&self) -> &str {
        &self.sensor_tag
    }

    /// Records one sample. Returns its tier-0 reading followed by every
    /// higher-tier reading it completed, lowest tier first.
    pub fn add_sample(&mut self, timestamp_ms: i64, value: f64) -> Vec<ScalarReading> {
        self.count += 1;
        self.first_ms = Some(self.first_ms.map_or(timestamp_ms, |t| t.min(timestamp_ms)));
        self.last_ms = Some(self.last_ms.map_or(timestamp_ms, |t| t.max(timestamp_ms)));

        let mut readings = vec![self.reading(0, timestamp_ms, value)];
        let bucket_size = self.config.bucket_size();
        let mut carry = vec![(timestamp_ms, value)];

        for index in 0..self.buckets.len() {
            let mut emitted = Vec::new();
            for (ts, v) in carry {
                let bucket = &mut self.buckets[index];
                bucket.push(ts, v);
                if bucket.count >= bucket_size {
                    emitted.extend(bucket.drain());
                }
            }
            if emitted.is_empty() {
                break;
            }
            readings.extend(self.tier_readings(index + 1, &emitted));
            carry = emitted;
        }

        readings
    }

    /// Emits every partially filled bucket, bottom-up, so the tail of the
    /// recording is represented on every tier.
    pub fn flush(&mut self) -> Vec<ScalarReading> {
        let bucket_size = self.config.bucket_size();
        let mut readings = Vec::new();
        let mut carry: Vec<(i64, f64)> = Vec::new();

        for index in 0..self.buckets.len() {
            let mut emitted = Vec::new();
            for (ts, v) in carry {
                let bucket = &mut self.buckets[index];
                bucket.push(ts, v);
                if bucket.count >= bucket_size {
                    emitted.extend(bucket.drain());
                }
            }
            emitted.extend(self.buckets[index].drain());
            readings.extend(self.tier_readings(index + 1, &emitted));
            carry = emitted;
        }

        readings
    }

    pub fn stats(&self) -> ZoomStats {
        let total_duration_ms = match (self.first_ms, self.last_ms) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        };
        ZoomStats {
            total_duration_ms,
            num_data_points: self.count,
            tier_count: i32::try_from(self.config.tier_count).unwrap_or(i32::MAX),
            decimation_factor: i32::try_from(self.config.decimation_factor).unwrap_or(i32::MAX),
        }
    }

    fn tier_readings(&self, tier: usize, points: &[(i64, f64)]) -> Vec<ScalarReading> {
        points
            .iter()
            .map(|&(ts, v)| self.reading(tier as i32, ts, v))
            .collect()
    }

    fn reading(&self, tier: i32, timestamp_ms: i64, value: f64) -> ScalarReading {
        ScalarReading::new(
            self.trial_id.as_str(),
            self.sensor_tag.as_str(),
            tier,
            timestamp_ms,
            value,
        )
    }
}
