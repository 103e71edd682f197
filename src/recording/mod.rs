//! Write side of the tiered store: turns a live sample stream into tier-0
//! readings plus the decimated tiers above it.

pub mod config;
pub mod sensor_recorder;
pub mod zoom_recorder;

pub use config::RecordingConfig;
pub use sensor_recorder::SensorRecorder;
pub use zoom_recorder::ZoomRecorder;
