use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{to_vec3, InjectionStrategy};
use crate::{
    CellLocation, CellLocator, ConfigError, InjectionError, Parcel, SizeDistribution,
    TimeFunction, Vec3,
};

/// Configuration of a [`ConeInjection`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConeConfig {
    /// Location of the injector.
    pub position: [f64; 3],
    /// Axis of the cone. Doesn't need to be normalised.
    pub direction: [f64; 3],
    /// Speed of injected parcels.
    #[serde(rename = "Umag")]
    pub u_mag: f64,
    /// Inner half-angle of the cone, in degrees.
    pub theta_inner: f64,
    /// Outer half-angle of the cone, in degrees.
    pub theta_outer: f64,
    /// Number of parcels introduced per second.
    pub parcels_per_second: f64,
    /// How long the injector is active for.
    pub duration: f64,
    /// Relative volume flow rate over time.
    /// Only its shape matters; the total is set by the model's `massTotal`.
    pub flow_rate_profile: TimeFunction,
    /// Distribution the parcels' diameters are drawn from.
    pub size_distribution: SizeDistribution,
    /// Seed for sampling diameters and directions.
    #[serde(default)]
    pub seed: u64,
}

/// A point injector spraying parcels into a hollow cone
/// at a steady rate in time.
#[derive(Clone, Debug)]
pub struct ConeInjection {
    position: Vec3,
    direction: Vec3,
    /// two unit vectors completing `direction` to an orthonormal basis
    tangents: [Vec3; 2],
    u_mag: f64,
    theta_inner: f64,
    theta_outer: f64,
    parcels_per_second: f64,
    duration: f64,
    flow_rate_profile: TimeFunction,
    volume_total: f64,
    size_distribution: SizeDistribution,
    rng: StdRng,
}

impl ConeInjection {
    /// Create the injector.
    pub fn new(config: &ConeConfig) -> Result<Self, ConfigError> {
        let invalid = |key: &'static str, reason: &str| ConfigError::InvalidValue {
            key,
            reason: reason.to_string(),
        };

        let direction = to_vec3(config.direction)
            .try_normalize(f64::EPSILON)
            .ok_or_else(|| invalid("direction", "must be nonzero"))?;
        if !(config.duration > 0.) {
            return Err(invalid("duration", "must be positive"));
        }
        if !(config.parcels_per_second > 0.) {
            return Err(invalid("parcelsPerSecond", "must be positive"));
        }
        if !(0. <= config.theta_inner && config.theta_inner <= config.theta_outer) {
            return Err(invalid("thetaOuter", "need 0 <= thetaInner <= thetaOuter"));
        }
        if !(config.u_mag.is_finite() && config.u_mag >= 0.) {
            return Err(invalid("Umag", "must be non-negative and finite"));
        }
        config.flow_rate_profile.validate("flowRateProfile")?;
        config.size_distribution.validate("sizeDistribution")?;

        let volume_total = config.flow_rate_profile.integral(0., config.duration);
        if !(volume_total.is_finite() && volume_total > 0.) {
            return Err(invalid(
                "flowRateProfile",
                "must have a positive finite integral over the injection duration",
            ));
        }

        // any axis not parallel to the direction gives a valid basis
        let least_aligned = direction.iamin();
        let tangent_1 = direction.cross(&Vec3::ith(least_aligned, 1.)).normalize();
        let tangent_2 = direction.cross(&tangent_1);

        Ok(Self {
            position: to_vec3(config.position),
            direction,
            tangents: [tangent_1, tangent_2],
            u_mag: config.u_mag,
            theta_inner: config.theta_inner.to_radians(),
            theta_outer: config.theta_outer.to_radians(),
            parcels_per_second: config.parcels_per_second,
            duration: config.duration,
            flow_rate_profile: config.flow_rate_profile.clone(),
            volume_total,
            size_distribution: config.size_distribution.clone(),
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Check if any part of `[t0, t1]` lies within the injection duration.
    #[inline]
    fn is_injecting(&self, t0: f64, t1: f64) -> bool {
        t1 > 0. && t0.max(0.) < self.duration
    }

    /// A random direction between the inner and outer cone.
    fn sample_direction(&mut self) -> Vec3 {
        let frac: f64 = self.rng.random();
        let theta = self.theta_inner + frac * (self.theta_outer - self.theta_inner);
        let phi = 2. * std::f64::consts::PI * self.rng.random::<f64>();
        let [t1, t2] = self.tangents;
        theta.cos() * self.direction + theta.sin() * (phi.cos() * t1 + phi.sin() * t2)
    }
}

impl InjectionStrategy for ConeInjection {
    fn type_name(&self) -> &'static str {
        "cone"
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn volume_total(&self) -> f64 {
        self.volume_total
    }

    fn parcels_to_inject(&self, t0: f64, t1: f64) -> usize {
        if !self.is_injecting(t0, t1) {
            return 0;
        }
        // cumulative count since the start of injection,
        // so consecutive intervals always sum to the same total
        let injected_by = |t: f64| (self.parcels_per_second * t).floor();
        let n = injected_by(t1.min(self.duration)) - injected_by(t0.max(0.));
        n.max(0.) as usize
    }

    fn volume_to_inject(&self, t0: f64, t1: f64) -> f64 {
        if !self.is_injecting(t0, t1) {
            return 0.;
        }
        self.flow_rate_profile
            .integral(t0.max(0.), t1.min(self.duration))
    }

    fn set_position_and_cell(
        &mut self,
        _parcel_i: usize,
        _n_parcels: usize,
        _time: f64,
        locator: &CellLocator,
    ) -> Result<Option<CellLocation>, InjectionError> {
        Ok(locator.find_cell_at_position(self.position, false)?.local())
    }

    fn set_properties(&mut self, _parcel_i: usize, _n_parcels: usize, _time: f64, parcel: &mut Parcel) {
        parcel.u = self.u_mag * self.sample_direction();
        parcel.d = self.size_distribution.sample(&mut self.rng);
    }

    fn fully_described(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> ConeConfig {
        ConeConfig {
            position: [0.5, 0.5, 0.1],
            direction: [0., 0., 2.],
            u_mag: 10.,
            theta_inner: 10.,
            theta_outer: 20.,
            parcels_per_second: 100.,
            duration: 0.5,
            flow_rate_profile: TimeFunction::Constant { value: 1. },
            size_distribution: SizeDistribution::Fixed { value: 1e-4 },
            seed: 1,
        }
    }

    #[test]
    fn parcel_counts_add_up_over_any_split() {
        let cone = ConeInjection::new(&config()).unwrap();
        assert_eq!(cone.parcels_to_inject(0., 0.5), 50);
        assert_eq!(cone.parcels_to_inject(-1., 2.), 50);
        assert_eq!(cone.parcels_to_inject(0.5, 1.), 0);
        assert_eq!(cone.parcels_to_inject(-1., 0.), 0);

        let times = [0., 0.013, 0.04, 0.041, 0.2, 0.333, 0.49, 0.6];
        let total: usize = times
            .windows(2)
            .map(|w| cone.parcels_to_inject(w[0], w[1]))
            .sum();
        assert_eq!(total, 50);

        assert_relative_eq!(cone.volume_total(), 0.5);
        assert_relative_eq!(cone.volume_to_inject(0.4, 0.7), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn directions_lie_within_the_cone() {
        let mut cone = ConeInjection::new(&config()).unwrap();
        let mut parcel = Parcel::new(&CellLocation {
            position: Vec3::zeros(),
            cell: 0,
            coordinates: crate::Barycentric::new(0.25, 0.25, 0.25, 0.25),
            face: None,
        });
        for i in 0..100 {
            cone.set_properties(i, 100, 0., &mut parcel);
            assert_relative_eq!(parcel.u.norm(), 10., epsilon = 1e-9);
            let angle = parcel.u.angle(&Vec3::z()).to_degrees();
            assert!((10. - 1e-9..=20. + 1e-9).contains(&angle), "angle {angle}");
            assert_eq!(parcel.d, 1e-4);
        }
    }

    #[test]
    fn invalid_configs() {
        let mut c = config();
        c.direction = [0., 0., 0.];
        assert!(ConeInjection::new(&c).is_err());

        let mut c = config();
        c.theta_inner = 30.;
        assert!(matches!(
            ConeInjection::new(&c),
            Err(ConfigError::InvalidValue { key: "thetaOuter", .. })
        ));

        let mut c = config();
        c.flow_rate_profile = TimeFunction::Constant { value: 0. };
        assert!(ConeInjection::new(&c).is_err());

        // 1/t can't be integrated from the start of injection
        let mut c = config();
        c.flow_rate_profile = TimeFunction::Polynomial {
            coeffs: vec![(1., -1.)],
        };
        assert!(matches!(
            ConeInjection::new(&c),
            Err(ConfigError::InvalidValue { key: "flowRateProfile", .. })
        ));
        let mut c = config();
        c.flow_rate_profile = TimeFunction::Polynomial {
            coeffs: vec![(1., -2.)],
        };
        assert!(ConeInjection::new(&c).is_err());

        let mut c = config();
        c.u_mag = -10.;
        assert!(matches!(
            ConeInjection::new(&c),
            Err(ConfigError::InvalidValue { key: "Umag", .. })
        ));
    }
}
