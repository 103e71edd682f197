use crate::db::models::ZoomStats;

/// How far the ideal tier may drift from the current one before switching.
pub const HYSTERESIS: f64 = 0.5;

/// Fractional tier whose density best matches `desired_point_count` points
/// across `visible_span_ms`.
///
/// Tier `n` holds roughly `num_data_points / decimation_factor^n` points, so
/// the ideal tier is the base-`decimation_factor` logarithm of how many times
/// too dense tier 0 would be. Degenerate stats or inputs give `0.0`.
pub fn compute_ideal_tier(
    desired_point_count: usize,
    stats: &ZoomStats,
    visible_span_ms: i64,
) -> f64 {
    if !stats.has_tiers()
        || stats.total_duration_ms <= 0
        || stats.num_data_points <= 0
        || desired_point_count == 0
        || visible_span_ms <= 0
    {
        return 0.0;
    }

    let visible_points =
        visible_span_ms as f64 * stats.num_data_points as f64 / stats.total_duration_ms as f64;
    let overdraw = visible_points / desired_point_count as f64;
    let ideal = overdraw.ln() / f64::from(stats.decimation_factor).ln();

    if ideal.is_finite() {
        ideal
    } else {
        0.0
    }
}

/// Integer tier to read, clamped to the tiers that exist.
///
/// Stays on `current_tier` while it is valid and within [`HYSTERESIS`] of
/// the ideal, so slow zooming does not flicker between densities.
pub fn compute_tier(
    current_tier: i32,
    desired_point_count: usize,
    stats: &ZoomStats,
    visible_span_ms: i64,
) -> i32 {
    if !stats.has_tiers() {
        return 0;
    }

    let max_tier = stats.tier_count - 1;
    let ideal = compute_ideal_tier(desired_point_count, stats, visible_span_ms);

    if (0..=max_tier).contains(&current_tier)
        && (ideal - f64::from(current_tier)).abs() <= HYSTERESIS
    {
        return current_tier;
    }

    (ideal.round() as i32).clamp(0, max_tier)
}

/// Tier choice for one chart, carried across zoom and scroll events.
#[derive(Debug, Clone)]
pub struct TierSelector {
    current_tier: i32,
    desired_point_count: usize,
}

impl TierSelector {
    pub fn new(desired_point_count: usize) -> Self {
        Self {
            current_tier: 0,
            desired_point_count,
        }
    }

    pub fn current_tier(&self) -> i32 {
        self.current_tier
    }

    pub fn desired_point_count(&self) -> usize {
        self.desired_point_count
    }

    pub fn set_desired_point_count(&mut self, desired_point_count: usize) {
        self.desired_point_count = desired_point_count;
    }

    /// Re-evaluates the tier for a new visible span. Returns the new tier
    /// when it changed, so the caller knows to reload its cache.
    pub fn update(&mut self, stats: &ZoomStats, visible_span_ms: i64) -> Option<i32> {
        let tier = compute_tier(
            self.current_tier,
            self.desired_point_count,
            stats,
            visible_span_ms,
        );
        if tier == self.current_tier {
            return None;
        }
        self.current_tier = tier;
        Some(tier)
    }

    pub fn reset(&mut self) {
        self.current_tier = 0;
    }
}
