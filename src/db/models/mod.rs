pub mod reading;
pub mod zoom_stats;

pub use reading::{ScalarReading, ANY_TIER, LEGACY_TRIAL_ID};
pub use zoom_stats::{SensorStats, ZoomStats};
