//! Computational parcels, each standing in for many physical particles.

use std::f64::consts::PI;

use crate::{mesh::TrackOutcome, Barycentric, CellLocation, TetMesh, Vec3};

/// A computational parcel:
/// `n_particle` identical spherical particles sharing one position and state.
#[derive(Clone, Debug, PartialEq)]
pub struct Parcel {
    /// Position in space.
    pub position: Vec3,
    /// The cell containing the position.
    pub cell: usize,
    /// Barycentric coordinates of the position within the cell.
    pub coordinates: Barycentric,
    /// The face of the cell the parcel is on, if any.
    pub face: Option<usize>,
    /// Diameter of one particle.
    pub d: f64,
    /// Density of one particle.
    pub rho: f64,
    /// Velocity.
    pub u: Vec3,
    /// Temperature.
    pub temperature: f64,
    /// Number of physical particles the parcel represents.
    pub n_particle: f64,
    /// Fraction of the current timestep the parcel has already used up.
    pub step_fraction: f64,
}

impl Parcel {
    /// Create a parcel at rest at a located position.
    /// Physical properties are all zero until set.
    pub fn new(location: &CellLocation) -> Self {
        Self {
            position: location.position,
            cell: location.cell,
            coordinates: location.coordinates,
            face: location.face,
            d: 0.,
            rho: 0.,
            u: Vec3::zeros(),
            temperature: 0.,
            n_particle: 0.,
            step_fraction: 0.,
        }
    }

    /// Volume of one particle.
    #[inline]
    pub fn volume(&self) -> f64 {
        PI / 6. * self.d.powi(3)
    }

    /// Mass of one particle.
    #[inline]
    pub fn mass(&self) -> f64 {
        self.rho * self.volume()
    }

    /// Mass of all the particles in the parcel.
    #[inline]
    pub fn total_mass(&self) -> f64 {
        self.n_particle * self.mass()
    }

    /// The offset of the parcel from the centre plane of the mesh
    /// along directions the solution isn't computed in.
    ///
    /// Zero for fully three-dimensional cases.
    pub fn deviation_from_mesh_centre(&self, mesh: &TetMesh) -> Vec3 {
        let solution_d = mesh.solution_directions();
        if solution_d.count() == 3 {
            return Vec3::zeros();
        }
        solution_d.suppressed(self.position - mesh.bounds().midpoint())
    }

    /// Move the parcel by `displacement`,
    /// following it through the cells of the mesh.
    pub fn track(&mut self, mesh: &TetMesh, displacement: Vec3) -> TrackOutcome {
        let res = mesh.track(self.position, self.cell, displacement);
        self.position = res.position;
        self.cell = res.cell;
        self.face = res.face;
        if let Some(coords) = mesh.barycentric_coordinates(res.cell, &res.position) {
            self.coordinates = coords;
        }
        res.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mesh::box_mesh, SolutionDirections};
    use approx::assert_relative_eq;

    fn parcel_at(mesh: &TetMesh, p: Vec3) -> Parcel {
        let cell = mesh.find_cell(&p).unwrap();
        let coordinates = mesh.barycentric_coordinates(cell, &p).unwrap();
        Parcel::new(&CellLocation {
            position: p,
            cell,
            coordinates,
            face: mesh.face_at(cell, &coordinates),
        })
    }

    #[test]
    fn sphere_mass() {
        let mesh = box_mesh(Vec3::zeros(), Vec3::new(1., 1., 1.), [1, 1, 1]);
        let mut parcel = parcel_at(&mesh, Vec3::new(0.5, 0.5, 0.2));
        parcel.d = 2e-3;
        parcel.rho = 1000.;
        parcel.n_particle = 10.;
        assert_relative_eq!(parcel.volume(), PI / 6. * 8e-9);
        assert_relative_eq!(parcel.mass(), 1000. * PI / 6. * 8e-9);
        assert_relative_eq!(parcel.total_mass(), 1e4 * PI / 6. * 8e-9);
    }

    #[test]
    fn deviation_along_suppressed_directions() {
        let mut mesh = box_mesh(Vec3::zeros(), Vec3::new(1., 1., 0.1), [2, 2, 1]);
        let parcel = parcel_at(&mesh, Vec3::new(0.3, 0.6, 0.08));
        assert_eq!(parcel.deviation_from_mesh_centre(&mesh), Vec3::zeros());

        mesh.set_solution_directions(SolutionDirections([true, true, false]));
        assert_relative_eq!(
            parcel.deviation_from_mesh_centre(&mesh),
            Vec3::new(0., 0., 0.03),
            epsilon = 1e-12
        );
    }

    #[test]
    fn tracking_updates_the_cell() {
        let mesh = box_mesh(Vec3::zeros(), Vec3::new(1., 1., 1.), [2, 2, 2]);
        let mut parcel = parcel_at(&mesh, Vec3::new(0.1, 0.15, 0.2));
        let outcome = parcel.track(&mesh, Vec3::new(0.7, 0.62, 0.51));

        assert_eq!(outcome, TrackOutcome::Completed);
        assert_relative_eq!(parcel.position, Vec3::new(0.8, 0.77, 0.71), epsilon = 1e-12);
        assert_relative_eq!(
            mesh.position(parcel.cell, &parcel.coordinates),
            parcel.position,
            epsilon = 1e-12
        );
    }
}
