pub mod time_range;

pub use time_range::{RangeOrder, TimeRange};
