use std::f64::consts::PI;

use rand::{rngs::StdRng, SeedableRng};

use super::{to_vec3, InjectionStrategy};
use crate::{
    CellLocation, CellLocator, ConfigError, InjectionError, Located, Parcel, SizeDistribution,
    Vec3,
};

/// Configuration of a [`ManualInjection`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualConfig {
    /// Where to inject parcels, one parcel per position.
    pub positions: Vec<[f64; 3]>,
    /// Initial velocity of every parcel.
    #[serde(rename = "U0")]
    pub u0: [f64; 3],
    /// Distribution the parcels' diameters are drawn from.
    pub size_distribution: SizeDistribution,
    /// Seed for sampling diameters.
    #[serde(default)]
    pub seed: u64,
    /// Skip positions outside the mesh instead of failing.
    #[serde(default)]
    pub ignore_out_of_bounds: bool,
}

/// Injects one parcel at each of a list of positions,
/// all at once at the start of injection.
#[derive(Clone, Debug)]
pub struct ManualInjection {
    positions: Vec<Vec3>,
    diameters: Vec<f64>,
    u0: Vec3,
    volume_total: f64,
    ignore_out_of_bounds: bool,
}

impl ManualInjection {
    /// Create the injector, sampling a diameter for every position.
    pub fn new(config: &ManualConfig) -> Result<Self, ConfigError> {
        if config.positions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "positions",
                reason: "no positions given".to_string(),
            });
        }
        config.size_distribution.validate("sizeDistribution")?;

        // sampled up front from a fixed seed
        // so every partition agrees on the diameters
        let mut rng = StdRng::seed_from_u64(config.seed);
        let diameters: Vec<f64> = config
            .positions
            .iter()
            .map(|_| config.size_distribution.sample(&mut rng))
            .collect();
        let volume_total = diameters.iter().map(|d| PI / 6. * d.powi(3)).sum();

        Ok(Self {
            positions: config.positions.iter().copied().map(to_vec3).collect(),
            diameters,
            u0: to_vec3(config.u0),
            volume_total,
            ignore_out_of_bounds: config.ignore_out_of_bounds,
        })
    }

    /// The diameters sampled for each position.
    pub fn diameters(&self) -> &[f64] {
        &self.diameters
    }

    /// Everything happens at the instant injection starts.
    #[inline]
    fn is_injecting(t0: f64, t1: f64) -> bool {
        0. >= t0 && 0. < t1
    }
}

impl InjectionStrategy for ManualInjection {
    fn type_name(&self) -> &'static str {
        "manual"
    }

    fn duration(&self) -> f64 {
        0.
    }

    fn volume_total(&self) -> f64 {
        self.volume_total
    }

    fn parcels_to_inject(&self, t0: f64, t1: f64) -> usize {
        if Self::is_injecting(t0, t1) {
            self.positions.len()
        } else {
            0
        }
    }

    fn volume_to_inject(&self, t0: f64, t1: f64) -> f64 {
        if Self::is_injecting(t0, t1) {
            self.volume_total
        } else {
            0.
        }
    }

    fn set_position_and_cell(
        &mut self,
        parcel_i: usize,
        _n_parcels: usize,
        _time: f64,
        locator: &CellLocator,
    ) -> Result<Option<CellLocation>, InjectionError> {
        let position = self.positions[parcel_i];
        let located = locator.find_cell_at_position(position, !self.ignore_out_of_bounds)?;
        if located == Located::NotFound {
            log::debug!("Ignoring out of bounds injection position {position:?}");
        }
        Ok(located.local())
    }

    fn set_properties(&mut self, parcel_i: usize, _n_parcels: usize, _time: f64, parcel: &mut Parcel) {
        parcel.u = self.u0;
        parcel.d = self.diameters[parcel_i];
    }

    fn fully_described(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mesh::box_mesh, LocateError, SerialCommunicator};
    use approx::assert_relative_eq;

    fn config(ignore_out_of_bounds: bool) -> ManualConfig {
        ManualConfig {
            positions: vec![[0.2, 0.3, 0.4], [0.8, 0.1, 0.6], [1.5, 0.5, 0.5]],
            u0: [1., 0., 0.],
            size_distribution: SizeDistribution::Uniform { min: 1e-4, max: 2e-4 },
            seed: 3,
            ignore_out_of_bounds,
        }
    }

    #[test]
    fn injects_once_at_start() {
        let manual = ManualInjection::new(&config(true)).unwrap();
        assert_eq!(manual.parcels_to_inject(0., 0.1), 3);
        assert_eq!(manual.parcels_to_inject(-0.1, 0.1), 3);
        assert_eq!(manual.parcels_to_inject(0.1, 0.2), 0);
        assert_eq!(manual.volume_to_inject(0.1, 0.2), 0.);

        let expected: f64 = manual.diameters().iter().map(|d| PI / 6. * d.powi(3)).sum();
        assert_relative_eq!(manual.volume_to_inject(0., 0.1), expected);
        assert_eq!(manual.volume_total(), manual.volume_to_inject(0., 0.1));

        // same seed, same diameters
        let again = ManualInjection::new(&config(true)).unwrap();
        assert_eq!(manual.diameters(), again.diameters());
    }

    #[test]
    fn out_of_bounds_positions() {
        let mesh = box_mesh(Vec3::zeros(), Vec3::new(1., 1., 1.), [2, 2, 2]);
        let comm = SerialCommunicator;
        let locator = CellLocator::new(&mesh, &comm);

        let mut lenient = ManualInjection::new(&config(true)).unwrap();
        assert!(lenient.set_position_and_cell(0, 3, 0., &locator).unwrap().is_some());
        assert!(lenient.set_position_and_cell(2, 3, 0., &locator).unwrap().is_none());

        let mut strict = ManualInjection::new(&config(false)).unwrap();
        let res = strict.set_position_and_cell(2, 3, 0., &locator);
        assert!(matches!(
            res,
            Err(InjectionError::Locate(LocateError::NotFound { .. }))
        ));
    }

    #[test]
    fn empty_positions_rejected() {
        let mut c = config(true);
        c.positions.clear();
        assert!(matches!(
            ManualInjection::new(&c),
            Err(ConfigError::InvalidValue { key: "positions", .. })
        ));
    }
}
