//! Pluggable strategies deciding how many parcels to inject, where, and what they're like.
//!
//! The injection engine owns the timing, bookkeeping and parcel creation;
//! a strategy only answers questions about the injector it describes.
//! Strategies are selected at runtime by the `type` tag of their configuration,
//! see [`new_strategy`].

mod cone;
pub use cone::{ConeConfig, ConeInjection};

mod manual;
pub use manual::{ManualConfig, ManualInjection};

use crate::{CellLocation, CellLocator, ConfigError, InjectionError, Parcel, Vec3};

/// The questions the injection engine asks of an injector.
///
/// Times passed to [`parcels_to_inject`][Self::parcels_to_inject]
/// and [`volume_to_inject`][Self::volume_to_inject]
/// are measured from the start of injection.
pub trait InjectionStrategy {
    /// The configuration tag this strategy is selected with.
    fn type_name(&self) -> &'static str;

    /// How long the injector is active for.
    fn duration(&self) -> f64;

    /// The total volume injected over the injector's lifetime.
    fn volume_total(&self) -> f64;

    /// Number of parcels to introduce over the interval `[t0, t1]`.
    fn parcels_to_inject(&self, t0: f64, t1: f64) -> usize;

    /// Volume of particles to introduce over the interval `[t0, t1]`.
    fn volume_to_inject(&self, t0: f64, t1: f64) -> f64;

    /// Check whether parcel `parcel_i` should be injected at all.
    ///
    /// This must give the same answer on every partition.
    fn valid_injection(&self, _parcel_i: usize) -> bool {
        true
    }

    /// Locate parcel `parcel_i` of `n_parcels` injected at `time`.
    ///
    /// This is a collective call; every partition calls it for every parcel.
    /// Returns the location if this partition owns it
    /// and None if the parcel should not be created here.
    fn set_position_and_cell(
        &mut self,
        parcel_i: usize,
        n_parcels: usize,
        time: f64,
        locator: &CellLocator,
    ) -> Result<Option<CellLocation>, InjectionError>;

    /// Set the properties of a new parcel.
    fn set_properties(&mut self, parcel_i: usize, n_parcels: usize, time: f64, parcel: &mut Parcel);

    /// Whether [`set_properties`][Self::set_properties] sets every parcel property,
    /// or leaves some for the cloud to fill in.
    fn fully_described(&self) -> bool;
}

/// Configuration of an injection strategy, tagged by its `type`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StrategyConfig {
    /// A fixed list of positions injected once. See [`ManualInjection`].
    Manual(ManualConfig),
    /// A point injector spraying into a cone. See [`ConeInjection`].
    Cone(ConeConfig),
}

/// Construct the strategy selected by a configuration.
pub fn new_strategy(config: &StrategyConfig) -> Result<Box<dyn InjectionStrategy>, ConfigError> {
    Ok(match config {
        StrategyConfig::Manual(c) => Box::new(ManualInjection::new(c)?),
        StrategyConfig::Cone(c) => Box::new(ConeInjection::new(c)?),
    })
}

#[inline]
fn to_vec3(v: [f64; 3]) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_by_type_tag() {
        let config: StrategyConfig = serde_json::from_str(
            r#"{
                "type": "manual",
                "positions": [[0.1, 0.1, 0.1], [0.5, 0.5, 0.5]],
                "U0": [0.0, 0.0, 1.0],
                "sizeDistribution": { "type": "fixed", "value": 1e-3 }
            }"#,
        )
        .unwrap();
        let strategy = new_strategy(&config).unwrap();
        assert_eq!(strategy.type_name(), "manual");
        assert_eq!(strategy.parcels_to_inject(0., 1.), 2);

        let unknown = serde_json::from_str::<StrategyConfig>(r#"{ "type": "patch" }"#);
        assert!(unknown.is_err());
    }
}
