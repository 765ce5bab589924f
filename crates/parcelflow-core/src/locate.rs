//! Resolving injection positions to an owning partition and cell.

use crate::{Barycentric, Communicator, TetMesh, Vec3};

/// Default relative distance a position is moved towards
/// the nearest cell centre when it wasn't found on the first try.
pub const DEFAULT_NUDGE: f64 = 1e-6;

/// Error in locating an injection position.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LocateError {
    /// No partition contains the position, even after nudging it.
    #[error("Cannot find parcel injection cell. Parcel position = {position:?}")]
    NotFound {
        /// The position that was searched for.
        position: Vec3,
    },
}

/// A position resolved to a cell on this partition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellLocation {
    /// The position actually located.
    /// This differs slightly from the requested one
    /// if it had to be nudged into the mesh.
    pub position: Vec3,
    /// Index of the containing cell in this partition's mesh.
    pub cell: usize,
    /// Barycentric coordinates of the position within the cell.
    pub coordinates: Barycentric,
    /// The face of the cell the position lies on, if any.
    pub face: Option<usize>,
}

/// The result of locating a position across all partitions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Located {
    /// This partition owns the position.
    Local(CellLocation),
    /// Another partition owns the position.
    Remote {
        /// Rank of the owning partition.
        owner: usize,
    },
    /// No partition contains the position.
    NotFound,
}

impl Located {
    /// Get the location if this partition owns it.
    #[inline]
    pub fn local(self) -> Option<CellLocation> {
        match self {
            Located::Local(loc) => Some(loc),
            _ => None,
        }
    }

    /// Check if some partition owns the position.
    #[inline]
    pub fn is_found(&self) -> bool {
        !matches!(self, Located::NotFound)
    }
}

/// Finds the partition and cell owning a position in a decomposed mesh.
///
/// Every call is collective; all partitions must locate
/// the same sequence of positions.
#[derive(Clone, Copy)]
pub struct CellLocator<'a> {
    mesh: &'a TetMesh,
    comm: &'a dyn Communicator,
    nudge: f64,
}

impl std::fmt::Debug for CellLocator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellLocator")
            .field("rank", &self.comm.rank())
            .field("size", &self.comm.size())
            .field("cells", &self.mesh.cell_count())
            .field("nudge", &self.nudge)
            .finish()
    }
}

impl<'a> CellLocator<'a> {
    /// Create a locator for this partition's part of the mesh.
    pub fn new(mesh: &'a TetMesh, comm: &'a dyn Communicator) -> Self {
        Self {
            mesh,
            comm,
            nudge: DEFAULT_NUDGE,
        }
    }

    /// Set the relative distance positions are moved towards the nearest cell centre
    /// when they aren't found on the first try.
    pub fn with_nudge(mut self, nudge: f64) -> Self {
        self.nudge = nudge;
        self
    }

    /// This partition's mesh.
    #[inline]
    pub fn mesh(&self) -> &'a TetMesh {
        self.mesh
    }

    /// The communicator connecting the partitions.
    #[inline]
    pub fn comm(&self) -> &'a dyn Communicator {
        self.comm
    }

    /// Find the cell on this partition containing a position,
    /// and elect a single owner among partitions that found one.
    ///
    /// The highest-ranked candidate wins,
    /// so a position on a face between partitions has exactly one owner.
    fn find_proc_and_cell(&self, position: &Vec3) -> Option<(usize, Option<usize>)> {
        let cell = self.mesh.find_cell(position);
        let candidate = match cell {
            Some(_) => self.comm.rank() as i64,
            None => -1,
        };
        let owner = self.comm.reduce_max(candidate);
        if owner < 0 {
            return None;
        }
        let owner = owner as usize;
        Some((owner, cell.filter(|_| owner == self.comm.rank())))
    }

    /// Locate the partition and cell containing a position.
    ///
    /// A position that no partition contains is tried once more
    /// after nudging it slightly towards the nearest cell centre,
    /// which catches points sitting awkwardly on the outer boundary.
    /// If that fails too, the result is [`Located::NotFound`],
    /// or an error if `error_on_not_found` is set.
    pub fn find_cell_at_position(
        &self,
        position: Vec3,
        error_on_not_found: bool,
    ) -> Result<Located, LocateError> {
        let mut pos = position;
        let mut found = self.find_proc_and_cell(&pos);

        // the reduction result is the same everywhere,
        // so either every partition retries or none does
        if found.is_none() {
            if let Some(nearest) = self.mesh.find_nearest_cell(&pos) {
                pos += self.nudge * (self.mesh.centroid(nearest) - pos);
            }
            found = self.find_proc_and_cell(&pos);
        }

        let Some((owner, cell)) = found else {
            if error_on_not_found {
                return Err(LocateError::NotFound { position });
            }
            log::debug!("Injection position {position:?} is outside the mesh");
            return Ok(Located::NotFound);
        };

        let Some(cell) = cell else {
            return Ok(Located::Remote { owner });
        };

        // find_cell succeeded, so the cell can't be degenerate
        let Some(coordinates) = self.mesh.barycentric_coordinates(cell, &pos) else {
            unreachable!("found a position in a degenerate cell");
        };
        Ok(Located::Local(CellLocation {
            position: pos,
            cell,
            coordinates,
            face: self.mesh.face_at(cell, &coordinates),
        }))
    }
}
