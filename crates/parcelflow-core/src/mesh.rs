//! The carrier mesh parcels are injected into.
//!
//! Cells are tetrahedra, which gives every cell a natural
//! barycentric coordinate system used for locating and tracking parcels.

/// Low-level mesh construction and corresponding tests.
mod mesh_construction;
pub use mesh_construction::box_mesh;
#[cfg(test)]
pub(crate) use mesh_construction::tiny_mesh_3d;

mod tracking;
pub use tracking::{TrackOutcome, TrackResult};

mod cell_buckets;
use cell_buckets::CellBuckets;

//

use fixedbitset as fb;
use nalgebra as na;

use std::collections::HashMap;

use crate::{Barycentric, Vec3};

/// Tolerance in barycentric units for deciding
/// whether a point lies inside (or on the boundary of) a cell.
pub const CONTAINMENT_TOLERANCE: f64 = 1e-10;

/// A mesh made of tetrahedral cells.
///
/// On a decomposed domain, each partition owns one of these
/// describing its local portion of the carrier mesh.
#[derive(Clone, Debug)]
pub struct TetMesh {
    pub(crate) vertices: Vec<Vec3>,
    /// vertex indices of each cell, sorted in ascending order
    pub(crate) cells: Vec<[usize; 4]>,
    /// vertex indices of each face, sorted in ascending order
    pub(crate) faces: Vec<[usize; 3]>,
    /// for each cell, the face opposite each of its four vertices
    pub(crate) cell_faces: Vec<[usize; 4]>,
    /// the owner cell of each face and the neighbour on the other side,
    /// if the face is not on the mesh boundary
    pub(crate) face_cells: Vec<(usize, Option<usize>)>,
    /// faces on the boundary of the mesh
    pub(crate) boundary_faces: fb::FixedBitSet,
    pub(crate) centroids: Vec<Vec3>,
    pub(crate) volumes: Vec<f64>,
    /// maps `p - v0` to the barycentric weights of vertices 1..4.
    /// None for degenerate (zero-volume) cells, which contain nothing
    pub(crate) bary_transforms: Vec<Option<na::Matrix3<f64>>>,
    /// user-defined cell sets, e.g. physical groups from gmsh meshes
    pub(crate) cell_zones: HashMap<String, fb::FixedBitSet>,
    pub(crate) bounds: BoundingBox,
    /// spatial index for point queries
    pub(crate) cell_buckets: CellBuckets,
    pub(crate) solution_d: SolutionDirections,
}

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// The minimum corner of the box.
    pub min: Vec3,
    /// The maximum corner of the box.
    pub max: Vec3,
}

impl BoundingBox {
    /// The point halfway between the corners.
    #[inline]
    pub fn midpoint(&self) -> Vec3 {
        0.5 * (self.min + self.max)
    }

    /// Check whether a point is inside the box, boundary included.
    pub fn contains(&self, p: &Vec3) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
}

/// The coordinate directions a solution is computed in.
///
/// Two-dimensional and axisymmetric cases are run on a mesh
/// that is one cell thick in the suppressed direction;
/// parcels must be kept on the centre plane
/// and their velocity must have no component along it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SolutionDirections(pub [bool; 3]);

impl Default for SolutionDirections {
    fn default() -> Self {
        Self::ALL
    }
}

impl SolutionDirections {
    /// All three directions are solved.
    pub const ALL: Self = Self([true; 3]);

    /// Number of directions that are solved.
    #[inline]
    pub fn count(&self) -> usize {
        self.0.iter().filter(|solved| **solved).count()
    }

    /// Zero out the components of `v` along suppressed directions.
    pub fn constrain(&self, v: &mut Vec3) {
        for (solved, comp) in self.0.iter().zip(v.iter_mut()) {
            if !solved {
                *comp = 0.;
            }
        }
    }

    /// Keep only the components of `v` along suppressed directions.
    pub fn suppressed(&self, v: Vec3) -> Vec3 {
        Vec3::from_fn(|i, _| if self.0[i] { 0. } else { v[i] })
    }
}

impl TetMesh {
    /// Construct a mesh from raw vertices and indices.
    ///
    /// The indices are given as a flat array,
    /// where every 4 indices correspond to one tetrahedron.
    #[inline]
    pub fn new(vertices: Vec<Vec3>, indices: Vec<usize>) -> Self {
        mesh_construction::build_mesh(vertices, indices)
    }

    /// Get the number of cells in the mesh.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Get the number of faces in the mesh.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Get a slice of all vertices in the mesh.
    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Get the vertex indices of a cell.
    #[inline]
    pub fn cell_vertices(&self, cell: usize) -> [usize; 4] {
        self.cells[cell]
    }

    /// Get the centroid of a cell.
    #[inline]
    pub fn centroid(&self, cell: usize) -> Vec3 {
        self.centroids[cell]
    }

    /// Get a slice of all cell centroids.
    #[inline]
    pub fn centroids(&self) -> &[Vec3] {
        &self.centroids
    }

    /// Get the volume of a cell.
    #[inline]
    pub fn volume(&self, cell: usize) -> f64 {
        self.volumes[cell]
    }

    /// Get a slice of all cell volumes.
    #[inline]
    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    /// Get a bounding box enclosing the entire mesh.
    #[inline]
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Get the set of faces on the mesh boundary.
    #[inline]
    pub fn boundary_faces(&self) -> &fb::FixedBitSet {
        &self.boundary_faces
    }

    /// Get the cells on either side of a face.
    /// The second cell is None for boundary faces.
    #[inline]
    pub fn face_cells(&self, face: usize) -> (usize, Option<usize>) {
        self.face_cells[face]
    }

    /// Get the cell across `face` from `cell`, if there is one.
    pub fn neighbour_across(&self, cell: usize, face: usize) -> Option<usize> {
        match self.face_cells[face] {
            (owner, neighbour) if owner == cell => neighbour,
            (owner, _) => Some(owner),
        }
    }

    /// Get the directions the solution is computed in.
    #[inline]
    pub fn solution_directions(&self) -> SolutionDirections {
        self.solution_d
    }

    /// Set the directions the solution is computed in,
    /// e.g. `[true, true, false]` for a 2D case in the x,y plane.
    pub fn set_solution_directions(&mut self, directions: SolutionDirections) {
        self.solution_d = directions;
    }

    /// Number of geometric directions the solution is computed in.
    #[inline]
    pub fn n_geometric_d(&self) -> usize {
        self.solution_d.count()
    }

    /// Compute the barycentric coordinates of a point
    /// with respect to a cell.
    ///
    /// Returns None if the cell is degenerate.
    pub fn barycentric_coordinates(&self, cell: usize, p: &Vec3) -> Option<Barycentric> {
        let transform = self.bary_transforms[cell].as_ref()?;
        let v0 = self.vertices[self.cells[cell][0]];
        let w = transform * (p - v0);
        Some(Barycentric::new(1. - w.sum(), w.x, w.y, w.z))
    }

    /// Compute the absolute position of a point
    /// given in barycentric coordinates of a cell.
    pub fn position(&self, cell: usize, coordinates: &Barycentric) -> Vec3 {
        self.cells[cell]
            .iter()
            .zip(coordinates.iter())
            .fold(Vec3::zeros(), |acc, (vi, w)| acc + *w * self.vertices[*vi])
    }

    /// Find the cell containing a point.
    ///
    /// Points on faces shared by several cells
    /// are assigned to the one with the lowest index.
    /// Returns None if the point is outside the mesh.
    pub fn find_cell(&self, p: &Vec3) -> Option<usize> {
        if !self.bounds.contains(p) {
            // cheap early exit; points just outside the box
            // are still accepted by the per-cell tolerance,
            // so pad the check by the same amount relative to mesh size
            let pad = CONTAINMENT_TOLERANCE * (self.bounds.max - self.bounds.min).norm();
            let outside = (0..3)
                .any(|i| p[i] < self.bounds.min[i] - pad || p[i] > self.bounds.max[i] + pad);
            if outside {
                return None;
            }
        }

        self.cell_buckets.candidates(p).iter().copied().find(|cell| {
            self.barycentric_coordinates(*cell, p)
                .is_some_and(|coords| coords.iter().all(|w| *w >= -CONTAINMENT_TOLERANCE))
        })
    }

    /// Find the cell whose centroid is closest to a point.
    ///
    /// Returns None only if the mesh has no cells.
    pub fn find_nearest_cell(&self, p: &Vec3) -> Option<usize> {
        self.centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, (c - p).norm_squared()))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
    }

    /// Find the face of a cell a point given in its barycentric coordinates lies on.
    ///
    /// A point on an edge or vertex lies on several faces;
    /// the one opposite the lowest-numbered vertex is returned.
    pub fn face_at(&self, cell: usize, coordinates: &Barycentric) -> Option<usize> {
        coordinates
            .iter()
            .position(|w| w.abs() <= CONTAINMENT_TOLERANCE)
            .map(|local| self.cell_faces[cell][local])
    }

    /// Store a named set of cells,
    /// which can be looked up with [`cell_zone`][Self::cell_zone].
    pub fn store_cell_zone(&mut self, name: impl Into<String>, cells: fb::FixedBitSet) {
        self.cell_zones.insert(name.into(), cells);
    }

    /// Look up a named set of cells.
    ///
    /// Returns None if a zone with the name does not exist.
    /// No zones exist by default; they have to be created with
    /// [`store_cell_zone`][Self::store_cell_zone]
    /// or by defining physical groups in a `gmsh` file.
    pub fn cell_zone(&self, name: &str) -> Option<&fb::FixedBitSet> {
        self.cell_zones.get(name)
    }
}
