//! Picks which stored resolution tier a chart should read.

pub mod selector;

pub use selector::{compute_ideal_tier, compute_tier, TierSelector, HYSTERESIS};
