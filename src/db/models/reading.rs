//! Scalar reading data model.
//!
//! One row of the tiered store: a single value of one sensor inside one
//! trial, recorded at a given resolution tier.

use serde::{Deserialize, Serialize};

/// Trial id given to readings recorded before readings were trial-scoped.
/// Must match the column default in `schema_v2.sql`.
pub const LEGACY_TRIAL_ID: &str = "__legacy_trial__";

/// Tier argument that disables tier filtering.
pub const ANY_TIER: i32 = -1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScalarReading {
    pub trial_id: String,
    pub sensor_tag: String,
    pub tier: i32,
    pub timestamp_ms: i64,
    pub value: f64,
}

impl ScalarReading {
    pub fn new(
        trial_id: impl Into<String>,
        sensor_tag: impl Into<String>,
        tier: i32,
        timestamp_ms: i64,
        value: f64,
    ) -> Self {
        Self {
            trial_id: trial_id.into(),
            sensor_tag: sensor_tag.into(),
            tier,
            timestamp_ms,
            value,
        }
    }
}
