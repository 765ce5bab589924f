//! The cloud of parcels injection adds to.

use crate::{InjectionError, Parcel};

/// Timestep information handed to injection from the cloud's evolve loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackingData {
    /// Length of the Lagrangian timestep being tracked.
    pub track_time: f64,
}

/// The interface injection uses to hand new parcels over to their cloud.
pub trait ParcelCloud {
    /// Name of the cloud, used in log output.
    fn name(&self) -> &str;

    /// Take ownership of a newly created parcel.
    fn add_particle(&mut self, parcel: Parcel);

    /// Set the default thermophysical state of a new parcel
    /// before the injection strategy sets its own properties.
    fn set_parcel_thermo_properties(&self, parcel: &mut Parcel);

    /// Fill in whatever a strategy left unset,
    /// and check the parcel is fit to be tracked.
    ///
    /// `fully_described` tells whether the strategy set every property itself.
    fn check_parcel_properties(
        &self,
        parcel: &mut Parcel,
        fully_described: bool,
    ) -> Result<(), InjectionError>;
}

/// Properties shared by every parcel of a cloud.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConstantProperties {
    /// Particle density.
    pub rho0: f64,
    /// Initial particle temperature.
    #[serde(rename = "T0")]
    pub t0: f64,
}

impl Default for ConstantProperties {
    fn default() -> Self {
        Self {
            rho0: 1000.,
            t0: 300.,
        }
    }
}

/// A cloud storing its parcels in a plain list.
#[derive(Clone, Debug)]
pub struct Cloud {
    name: String,
    constant_properties: ConstantProperties,
    parcels: Vec<Parcel>,
}

impl Cloud {
    /// Create an empty cloud.
    pub fn new(name: impl Into<String>, constant_properties: ConstantProperties) -> Self {
        Self {
            name: name.into(),
            constant_properties,
            parcels: Vec::new(),
        }
    }

    /// Properties shared by every parcel.
    #[inline]
    pub fn constant_properties(&self) -> &ConstantProperties {
        &self.constant_properties
    }

    /// All parcels in the cloud.
    #[inline]
    pub fn parcels(&self) -> &[Parcel] {
        &self.parcels
    }

    /// Number of parcels in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    /// Check if the cloud has no parcels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }

    /// Total mass of all the physical particles in the cloud.
    pub fn total_mass(&self) -> f64 {
        self.parcels.iter().map(Parcel::total_mass).sum()
    }
}

impl ParcelCloud for Cloud {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_particle(&mut self, parcel: Parcel) {
        self.parcels.push(parcel);
    }

    fn set_parcel_thermo_properties(&self, parcel: &mut Parcel) {
        parcel.rho = self.constant_properties.rho0;
        parcel.temperature = self.constant_properties.t0;
    }

    fn check_parcel_properties(
        &self,
        parcel: &mut Parcel,
        fully_described: bool,
    ) -> Result<(), InjectionError> {
        if !fully_described {
            parcel.rho = self.constant_properties.rho0;
        }

        let invalid = |what: &str, value: f64| InjectionError::InvalidParcel {
            reason: format!("{what} must be positive and finite, got {value}"),
        };
        if !(parcel.d.is_finite() && parcel.d > 0.) {
            return Err(invalid("diameter", parcel.d));
        }
        if !(parcel.rho.is_finite() && parcel.rho > 0.) {
            return Err(invalid("density", parcel.rho));
        }
        if !parcel.u.iter().all(|c| c.is_finite()) {
            return Err(InjectionError::InvalidParcel {
                reason: format!("velocity must be finite, got {:?}", parcel.u),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Barycentric, CellLocation, Vec3};

    fn blank_parcel() -> Parcel {
        Parcel::new(&CellLocation {
            position: Vec3::zeros(),
            cell: 0,
            coordinates: Barycentric::new(0.25, 0.25, 0.25, 0.25),
            face: None,
        })
    }

    #[test]
    fn density_defaults_unless_fully_described() {
        let cloud = Cloud::new("spray", ConstantProperties { rho0: 800., t0: 350. });

        let mut parcel = blank_parcel();
        cloud.set_parcel_thermo_properties(&mut parcel);
        assert_eq!(parcel.temperature, 350.);

        parcel.d = 1e-4;
        parcel.rho = 1200.;
        cloud.check_parcel_properties(&mut parcel, true).unwrap();
        assert_eq!(parcel.rho, 1200.);
        cloud.check_parcel_properties(&mut parcel, false).unwrap();
        assert_eq!(parcel.rho, 800.);
    }

    #[test]
    fn invalid_parcels_are_rejected() {
        let cloud = Cloud::new("spray", ConstantProperties::default());

        let mut parcel = blank_parcel();
        let res = cloud.check_parcel_properties(&mut parcel, false);
        assert!(matches!(res, Err(InjectionError::InvalidParcel { .. })));

        parcel.d = 1e-4;
        parcel.u = Vec3::new(f64::NAN, 0., 0.);
        let res = cloud.check_parcel_properties(&mut parcel, false);
        assert!(matches!(res, Err(InjectionError::InvalidParcel { .. })));
    }

    #[test]
    fn constant_properties_from_json() {
        let props: ConstantProperties =
            serde_json::from_str(r#"{ "rho0": 850.0, "T0": 293.0 }"#).unwrap();
        assert_eq!(props, ConstantProperties { rho0: 850., t0: 293. });
    }
}
