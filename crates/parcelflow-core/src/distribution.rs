//! Probability distributions for sampling particle sizes.

use rand::Rng;

use crate::ConfigError;

/// A distribution of particle diameters.
///
/// Deserialised from a JSON object with a `type` tag, e.g.
/// `{ "type": "rosinRammler", "min": 5e-5, "max": 1e-4, "d": 7.5e-5, "n": 0.5 }`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SizeDistribution {
    /// Every sample is the same.
    Fixed {
        /// The value.
        value: f64,
    },
    /// Uniformly distributed between `min` and `max`.
    Uniform {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// Rosin-Rammler (Weibull) distribution with
    /// cumulative distribution `1 - exp(-(x/d)^n)`,
    /// truncated to `[min, max]`.
    RosinRammler {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
        /// Scale parameter.
        d: f64,
        /// Shape parameter.
        n: f64,
    },
}

impl SizeDistribution {
    /// Check the distribution's parameters make sense.
    /// `key` names the configuration entry it was read from.
    pub fn validate(&self, key: &'static str) -> Result<(), ConfigError> {
        let invalid = |reason: String| Err(ConfigError::InvalidValue { key, reason });
        match *self {
            Self::Fixed { value } if !(value.is_finite() && value > 0.) => {
                invalid(format!("value must be positive, got {value}"))
            }
            Self::Uniform { min, max } | Self::RosinRammler { min, max, .. }
                if !(min >= 0. && max > min && max.is_finite()) =>
            {
                invalid(format!("need 0 <= min < max, got min = {min}, max = {max}"))
            }
            Self::RosinRammler { d, n, .. } if !(d > 0. && n > 0.) => {
                invalid(format!("d and n must be positive, got d = {d}, n = {n}"))
            }
            _ => Ok(()),
        }
    }

    /// Draw a sample from the distribution.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::Fixed { value } => value,
            Self::Uniform { min, max } => min + rng.random::<f64>() * (max - min),
            Self::RosinRammler { min, max, d, n } => {
                let cdf = |x: f64| 1. - (-(x / d).powf(n)).exp();
                let (f_min, f_max) = (cdf(min), cdf(max));
                let u = f_min + rng.random::<f64>() * (f_max - f_min);
                (d * (-(1. - u).ln()).powf(1. / n)).clamp(min, max)
            }
        }
    }

    /// The smallest possible sample.
    pub fn min_value(&self) -> f64 {
        match *self {
            Self::Fixed { value } => value,
            Self::Uniform { min, .. } | Self::RosinRammler { min, .. } => min,
        }
    }

    /// The largest possible sample.
    pub fn max_value(&self) -> f64 {
        match *self {
            Self::Fixed { value } => value,
            Self::Uniform { max, .. } | Self::RosinRammler { max, .. } => max,
        }
    }
}
