use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Upper bound on stored tiers. Twenty-fold decimation runs out of points
/// long before this.
pub const MAX_TIER_COUNT: u32 = 16;

/// How a recording is decimated into tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordingConfig {
    /// Point-count ratio between adjacent tiers.
    pub decimation_factor: u32,
    /// Number of tiers including tier 0.
    pub tier_count: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            decimation_factor: 20,
            tier_count: 6,
        }
    }
}

impl RecordingConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.decimation_factor >= 2,
            "decimation factor must be at least 2, got {}",
            self.decimation_factor
        );
        ensure!(
            (1..=MAX_TIER_COUNT).contains(&self.tier_count),
            "tier count must be between 1 and {MAX_TIER_COUNT}, got {}",
            self.tier_count
        );
        Ok(())
    }

    /// Inputs consumed by one bucket of the tier above.
    pub fn bucket_size(&self) -> usize {
        2 * self.decimation_factor as usize
    }
}
