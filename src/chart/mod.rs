//! In-memory chart windowing.
//!
//! Holds the points and labels a chart is currently showing, kept sorted by
//! timestamp so lookups are binary searches and eviction is a prefix or
//! suffix trim.

pub mod cache;
pub mod label;

use serde::{Deserialize, Serialize};

pub use cache::{ChartCache, TieBreak};
pub use label::LabelMarker;

/// A single chart point: timestamp (ms) and value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub x: i64,
    pub y: f64,
}

impl DataPoint {
    pub const fn new(x: i64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Eviction thresholds for [`ChartCache`]. Both must be exceeded before
/// anything is thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub size_threshold: usize,
    pub age_threshold_ms: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size_threshold: 100,
            age_threshold_ms: 20_000,
        }
    }
}
