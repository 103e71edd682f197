//! Live smoothing of a recording series and the labels drawn on it.

pub mod kernel;
pub mod live_series;

pub use kernel::SmoothingKernel;
pub use live_series::LiveSeries;
