//! Per-(trial, sensor) statistics that drive tier selection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shape of the stored tiers for one sensor in one trial.
///
/// A zeroed value means "no tier metadata": tier selection then always
/// resolves to tier 0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoomStats {
    pub total_duration_ms: i64,
    /// Tier-0 sample count.
    pub num_data_points: i64,
    pub tier_count: i32,
    /// Point-count ratio between adjacent tiers.
    pub decimation_factor: i32,
}

impl ZoomStats {
    pub fn has_tiers(&self) -> bool {
        self.tier_count > 0 && self.decimation_factor > 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorStats {
    pub trial_id: String,
    pub sensor_tag: String,
    pub zoom: ZoomStats,
    pub updated_at: DateTime<Utc>,
}
