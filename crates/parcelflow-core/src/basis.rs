//! How many physical particles each parcel represents.

use std::f64::consts::PI;

use crate::ConfigError;

/// The accounting convention used to derive the number of particles per parcel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParcelBasis {
    /// Parcels share the injected mass in proportion to their volume fraction.
    Mass,
    /// Every parcel carries the same global particle count.
    Number,
    /// Every parcel carries a configured particle count.
    Fixed {
        /// The configured particle count.
        n_particle: f64,
    },
}

impl ParcelBasis {
    /// Resolve the basis from its configuration tag.
    ///
    /// `n_particle` is required for, and only used by, the `fixed` basis.
    pub fn from_config(tag: &str, n_particle: Option<f64>) -> Result<Self, ConfigError> {
        match tag {
            "mass" => Ok(Self::Mass),
            "number" => Ok(Self::Number),
            "fixed" => {
                let n_particle = n_particle.ok_or(ConfigError::MissingKey("nParticle"))?;
                if !(n_particle.is_finite() && n_particle > 0.) {
                    return Err(ConfigError::InvalidValue {
                        key: "nParticle",
                        reason: format!("must be positive, got {n_particle}"),
                    });
                }
                Ok(Self::Fixed { n_particle })
            }
            other => Err(ConfigError::UnknownParcelBasis(other.to_string())),
        }
    }

    /// The configuration tag of this basis.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Mass => "mass",
            Self::Number => "number",
            Self::Fixed { .. } => "fixed",
        }
    }

    /// Compute the number of particles in one parcel.
    ///
    /// `parcels` and `volume_fraction` describe the injection the parcel is part of,
    /// `diameter` and `rho` the particles in it.
    /// The `number` basis ignores all of these
    /// and gives every parcel the same global count.
    pub fn number_of_particles(
        &self,
        parcels: usize,
        volume_fraction: f64,
        diameter: f64,
        rho: f64,
        mass_total: f64,
        volume_total: f64,
    ) -> f64 {
        match self {
            Self::Mass => {
                let volp = PI / 6. * diameter.powi(3);
                volume_fraction * (mass_total / rho) / (parcels as f64 * volp)
            }
            Self::Number => mass_total / (rho * volume_total),
            Self::Fixed { n_particle } => *n_particle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mass_basis() {
        let n = ParcelBasis::Mass.number_of_particles(5, 1.0, 1e-3, 1000., 10., 123.);
        let expected = 1.0 * (10. / 1000.) / (5. * (PI / 6.) * 1e-3f64.powi(3));
        assert_relative_eq!(n, expected, max_relative = 1e-14);

        // half the volume, half the particles
        let half = ParcelBasis::Mass.number_of_particles(5, 0.5, 1e-3, 1000., 10., 123.);
        assert_relative_eq!(half, 0.5 * expected, max_relative = 1e-14);
    }

    #[test]
    fn number_basis_is_global() {
        let basis = ParcelBasis::Number;
        let a = basis.number_of_particles(5, 1.0, 1e-3, 1000., 10., 2e-2);
        let b = basis.number_of_particles(17, 0.1, 5e-4, 1000., 10., 2e-2);
        assert_eq!(a, b);
        assert_relative_eq!(a, 10. / (1000. * 2e-2));
    }

    #[test]
    fn fixed_basis_is_constant() {
        let basis = ParcelBasis::from_config("fixed", Some(42.)).unwrap();
        assert_eq!(basis.number_of_particles(5, 1.0, 1e-3, 1000., 10., 1.), 42.);
        assert_eq!(basis.number_of_particles(1, 0.0, 1., 1., 0., 0.), 42.);
    }

    #[test]
    fn config_errors() {
        assert!(matches!(
            ParcelBasis::from_config("volume", None),
            Err(ConfigError::UnknownParcelBasis(tag)) if tag == "volume"
        ));
        assert!(matches!(
            ParcelBasis::from_config("fixed", None),
            Err(ConfigError::MissingKey("nParticle"))
        ));
        assert!(matches!(
            ParcelBasis::from_config("fixed", Some(-1.)),
            Err(ConfigError::InvalidValue { key: "nParticle", .. })
        ));
        // nParticle is ignored for other bases
        assert_eq!(ParcelBasis::from_config("mass", Some(-1.)).unwrap(), ParcelBasis::Mass);
    }
}
