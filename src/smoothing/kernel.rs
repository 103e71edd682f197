use serde::{Deserialize, Serialize};

/// Causal smoothing filters. Each smoothed point only looks at its own
/// sample and the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SmoothingKernel {
    /// Plain mean over the last `window` samples.
    MovingAverage { window: usize },
    /// Weights `exp(-d^2 / 2 sigma^2)` for the sample `d` steps back.
    GaussianBlur { window: usize, sigma: f64 },
}

impl SmoothingKernel {
    /// Weight for each look-back distance, newest sample first. Never empty.
    pub fn weights(&self) -> Vec<f64> {
        match *self {
            Self::MovingAverage { window } => vec![1.0; window.max(1)],
            Self::GaussianBlur { sigma, .. } if sigma.is_nan() || sigma <= 0.0 => vec![1.0],
            Self::GaussianBlur { window, sigma } => {
                let denominator = 2.0 * sigma * sigma;
                (0..window.max(1))
                    .map(|d| {
                        let d = d as f64;
                        (-(d * d) / denominator).exp()
                    })
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gaussian_weights_decay_from_the_newest_sample() {
        let weights = SmoothingKernel::GaussianBlur {
            window: 3,
            sigma: 1.0,
        }
        .weights();
        assert_eq!(weights.len(), 3);
        assert_relative_eq!(weights[0], 1.0);
        assert_relative_eq!(weights[1], (-0.5f64).exp());
        assert_relative_eq!(weights[2], (-2.0f64).exp());
    }

    #[test]
    fn degenerate_kernels_pass_samples_through() {
        let zero_sigma = SmoothingKernel::GaussianBlur {
            window: 9,
            sigma: 0.0,
        };
        assert_eq!(zero_sigma.weights(), vec![1.0]);
        let nan_sigma = SmoothingKernel::GaussianBlur {
            window: 9,
            sigma: f64::NAN,
        };
        assert_eq!(nan_sigma.weights(), vec![1.0]);
        assert_eq!(SmoothingKernel::MovingAverage { window: 0 }.weights(), vec![1.0]);
    }

    #[test]
    fn kernels_serialize_with_a_kind_tag() {
        let kernel = SmoothingKernel::GaussianBlur {
            window: 5,
            sigma: 1.5,
        };
        let json = serde_json::to_value(kernel).unwrap();
        assert_eq!(json["kind"], "gaussianBlur");
        assert_eq!(json["window"], 5);

        let parsed: SmoothingKernel =
            serde_json::from_str(r#"{ "kind": "movingAverage", "window": 4 }"#).unwrap();
        assert_eq!(parsed, SmoothingKernel::MovingAverage { window: 4 });
    }
}
