//! Configuration of an injection model.

use crate::{ParcelBasis, StrategyConfig, TimeFunction};

/// Default relative offset used when constraining parcels onto the mesh centre plane.
pub const DEFAULT_CONSTRAINT_TOLERANCE: f64 = 1e-7;

/// Error in the configuration of an injection model or strategy.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A key required by the chosen settings is missing.
    #[error("Missing required configuration entry `{0}`")]
    MissingKey(&'static str),
    /// `parcelBasisType` isn't one of the known bases.
    #[error("Unknown parcelBasisType `{0}`. Valid types are: mass, number, fixed")]
    UnknownParcelBasis(String),
    /// A value is out of its allowed range or otherwise malformed.
    #[error("Invalid value for `{key}`: {reason}")]
    InvalidValue {
        /// The offending configuration key.
        key: &'static str,
        /// What was wrong with it.
        reason: String,
    },
    /// The configuration couldn't be parsed.
    #[error("Parsing configuration failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Whether the carrier solution is time-accurate or steady.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolutionMode {
    /// Time-accurate. Parcels are injected over the injection window
    /// and staggered through each timestep.
    Transient,
    /// Steady. A batch of parcels is injected every iteration
    /// at the current mass flow rate.
    Steady,
}

/// Configuration of an injection model, as read from JSON.
///
/// ```
/// # use parcelflow_core::InjectionConfig;
/// let config = InjectionConfig::from_json_str(r#"{
///     "name": "nozzle",
///     "massTotal": 1e-3,
///     "SOI": 0.01,
///     "parcelBasisType": "mass",
///     "model": {
///         "type": "manual",
///         "positions": [[0.5, 0.5, 0.5]],
///         "U0": [0.0, 0.0, -1.0],
///         "sizeDistribution": { "type": "fixed", "value": 1e-4 }
///     }
/// }"#).unwrap();
/// assert_eq!(config.soi, Some(0.01));
/// ```
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionConfig {
    /// Name of the injector, used in log output and restart keys.
    pub name: String,
    /// Total mass to inject. Required for transient injection.
    pub mass_total: Option<f64>,
    /// Start of injection. Required for transient injection.
    #[serde(rename = "SOI")]
    pub soi: Option<f64>,
    /// Mass flow rate over time. Required for steady injection.
    pub mass_flow_rate: Option<TimeFunction>,
    /// One of `mass`, `number` or `fixed`.
    pub parcel_basis_type: String,
    /// Particles per parcel. Required for the `fixed` basis.
    pub n_particle: Option<f64>,
    /// Relative offset used when constraining parcels onto the mesh centre plane.
    pub constraint_tolerance: Option<f64>,
    /// The injection strategy.
    /// May be left out if the strategy is provided programmatically.
    pub model: Option<StrategyConfig>,
}

impl InjectionConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve the parcel basis.
    pub fn parcel_basis(&self) -> Result<ParcelBasis, ConfigError> {
        ParcelBasis::from_config(&self.parcel_basis_type, self.n_particle)
    }

    /// The total mass and start of injection of a transient injector.
    pub fn transient_settings(&self) -> Result<(f64, f64), ConfigError> {
        let mass_total = self.mass_total.ok_or(ConfigError::MissingKey("massTotal"))?;
        let soi = self.soi.ok_or(ConfigError::MissingKey("SOI"))?;
        if !(mass_total.is_finite() && mass_total > 0.) {
            return Err(ConfigError::InvalidValue {
                key: "massTotal",
                reason: format!("must be positive, got {mass_total}"),
            });
        }
        if !(soi.is_finite() && soi >= 0.) {
            return Err(ConfigError::InvalidValue {
                key: "SOI",
                reason: format!("must be non-negative, got {soi}"),
            });
        }
        Ok((mass_total, soi))
    }

    /// The mass flow rate of a steady injector.
    pub fn steady_flow_rate(&self) -> Result<&TimeFunction, ConfigError> {
        let rate = self
            .mass_flow_rate
            .as_ref()
            .ok_or(ConfigError::MissingKey("massFlowRate"))?;
        rate.validate("massFlowRate")?;
        Ok(rate)
    }

    /// The position constraint tolerance, defaulting to [`DEFAULT_CONSTRAINT_TOLERANCE`].
    pub fn constraint_tolerance(&self) -> Result<f64, ConfigError> {
        match self.constraint_tolerance {
            None => Ok(DEFAULT_CONSTRAINT_TOLERANCE),
            Some(tol) if tol.is_finite() && tol >= 0. => Ok(tol),
            Some(tol) => Err(ConfigError::InvalidValue {
                key: "constraintTolerance",
                reason: format!("must be non-negative, got {tol}"),
            }),
        }
    }
}
