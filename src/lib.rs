//! Tiered scalar sensor storage and chart windowing for long-running trials.
//!
//! Readings are written once per sample into a SQLite store at full
//! resolution plus a stack of decimated tiers ([`recording`]). Charts pick
//! a tier for the span on screen ([`zoom`]), keep the loaded window in a
//! sorted cache ([`chart`]) and draw live data through an optional
//! smoothing filter with interpolated labels ([`smoothing`]).

pub mod chart;
pub mod db;
pub mod export;
pub mod import;
pub mod models;
pub mod recording;
pub mod settings;
pub mod smoothing;
pub mod utils;
pub mod zoom;

pub use chart::{CacheConfig, ChartCache, DataPoint, LabelMarker, TieBreak};
pub use db::{Database, ReadingStream, ScalarReading, SensorStats, ZoomStats, LEGACY_TRIAL_ID};
pub use models::{RangeOrder, TimeRange};
pub use recording::{RecordingConfig, SensorRecorder, ZoomRecorder};
pub use settings::{Settings, SettingsStore};
pub use smoothing::{LiveSeries, SmoothingKernel};
pub use utils::logging::init_logging;
pub use zoom::{compute_ideal_tier, compute_tier, TierSelector};
