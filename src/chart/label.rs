use serde::{Deserialize, Serialize};

/// A label pinned to the chart timeline.
///
/// `display_value` is the y at which the label is drawn. It is `None` only
/// while no sample exists to derive it from. Once `finalized` is set the
/// value never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelMarker {
    pub timestamp: i64,
    pub display_value: Option<f64>,
    pub finalized: bool,
}

impl LabelMarker {
    pub fn unresolved(timestamp: i64) -> Self {
        Self {
            timestamp,
            display_value: None,
            finalized: false,
        }
    }

    pub fn finalized(timestamp: i64, value: f64) -> Self {
        Self {
            timestamp,
            display_value: Some(value),
            finalized: true,
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.finalized
    }
}

/// Linear interpolation of the value at `x` between two points.
pub(crate) fn interpolate(x0: i64, y0: f64, x1: i64, y1: f64, x: i64) -> f64 {
    if x1 == x0 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) as f64 / (x1 - x0) as f64
}
