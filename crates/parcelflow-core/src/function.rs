//! Scalar functions of time, used for flow rates and injection profiles.

use itertools::Itertools;

use crate::ConfigError;

/// A scalar function of time.
///
/// Deserialised from a JSON object with a `type` tag, e.g.
/// `{ "type": "table", "values": [[0.0, 1.0], [0.5, 2.0]] }`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimeFunction {
    /// The same value at all times.
    Constant {
        /// The value.
        value: f64,
    },
    /// Linear interpolation between `(time, value)` pairs,
    /// held constant outside the tabulated range.
    Table {
        /// The `(time, value)` pairs, in ascending order of time.
        values: Vec<(f64, f64)>,
    },
    /// A sum of `coefficient * t^exponent` terms.
    /// An exponent of exactly -1 is integrated as a logarithm.
    Polynomial {
        /// The `(coefficient, exponent)` pairs.
        coeffs: Vec<(f64, f64)>,
    },
}

impl TimeFunction {
    /// Check the function is well-formed.
    /// `key` names the configuration entry it was read from.
    pub fn validate(&self, key: &'static str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key,
            reason: reason.to_string(),
        };
        match self {
            Self::Constant { value } if !value.is_finite() => Err(invalid("value must be finite")),
            Self::Table { values } if values.is_empty() => Err(invalid("table has no entries")),
            Self::Table { values } if values.iter().tuple_windows().any(|(a, b)| b.0 <= a.0) => {
                Err(invalid("table times must be strictly increasing"))
            }
            Self::Polynomial { coeffs } if coeffs.is_empty() => {
                Err(invalid("polynomial has no terms"))
            }
            _ => Ok(()),
        }
    }

    /// Evaluate the function at time `t`.
    pub fn value(&self, t: f64) -> f64 {
        match self {
            Self::Constant { value } => *value,
            Self::Table { values } => table_value(values, t),
            Self::Polynomial { coeffs } => coeffs.iter().map(|(c, e)| c * t.powf(*e)).sum(),
        }
    }

    /// Integrate the function over `[t0, t1]`.
    pub fn integral(&self, t0: f64, t1: f64) -> f64 {
        if t1 < t0 {
            return -self.integral(t1, t0);
        }
        match self {
            Self::Constant { value } => value * (t1 - t0),
            Self::Table { values } => {
                // the function is linear between the table's breakpoints,
                // so the trapezoidal rule over them is exact
                std::iter::once(t0)
                    .chain(values.iter().map(|(t, _)| *t).filter(|t| *t > t0 && *t < t1))
                    .chain(std::iter::once(t1))
                    .tuple_windows()
                    .map(|(a, b)| 0.5 * (b - a) * (table_value(values, a) + table_value(values, b)))
                    .sum()
            }
            Self::Polynomial { coeffs } => coeffs
                .iter()
                .map(|(c, e)| {
                    if *e == -1. {
                        c * (t1 / t0).ln()
                    } else {
                        c * (t1.powf(e + 1.) - t0.powf(e + 1.)) / (e + 1.)
                    }
                })
                .sum(),
        }
    }
}

fn table_value(values: &[(f64, f64)], t: f64) -> f64 {
    let (Some(first), Some(last)) = (values.first(), values.last()) else {
        return 0.;
    };
    if t <= first.0 {
        return first.1;
    }
    if t >= last.0 {
        return last.1;
    }
    values
        .iter()
        .tuple_windows()
        .find(|(_, b)| t <= b.0)
        .map_or(last.1, |(a, b)| a.1 + (t - a.0) / (b.0 - a.0) * (b.1 - a.1))
}
