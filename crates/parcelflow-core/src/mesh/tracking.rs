//! Straight-line tracking of points through the cells of a mesh.

use super::{TetMesh, CONTAINMENT_TOLERANCE};
use crate::Vec3;

/// How a track ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackOutcome {
    /// The full displacement was travelled.
    Completed,
    /// The track reached a boundary face of the mesh and stopped there.
    HitBoundary {
        /// Index of the boundary face that was hit.
        face: usize,
    },
    /// The track crossed more faces than the mesh could possibly require
    /// and was abandoned where it was.
    /// This only happens on broken meshes.
    Stalled,
}

/// The state of a point after tracking it through the mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackResult {
    /// Where the point ended up.
    pub position: Vec3,
    /// The cell containing the end position.
    pub cell: usize,
    /// The face the end position lies on, if any.
    pub face: Option<usize>,
    /// How the track ended.
    pub outcome: TrackOutcome,
}

impl TetMesh {
    /// Move a point starting at `start` in `cell` by `displacement`,
    /// following it from cell to cell across faces.
    ///
    /// Tracking stops early if the point reaches the mesh boundary.
    pub fn track(&self, start: Vec3, cell: usize, displacement: Vec3) -> TrackResult {
        let end = start + displacement;
        let mut cell = cell;
        let mut from = start;
        // the face we last crossed is never exited through again,
        // otherwise roundoff could bounce us back and forth across it
        let mut entered_through: Option<usize> = None;

        // each crossing enters a new cell,
        // so a straight line can't cross more faces than this
        let max_crossings = self.face_count() + 1;
        for _ in 0..max_crossings {
            let (Some(coords_from), Some(coords_end)) = (
                self.barycentric_coordinates(cell, &from),
                self.barycentric_coordinates(cell, &end),
            ) else {
                // degenerate cell, there's no sensible way to move through it
                return TrackResult {
                    position: from,
                    cell,
                    face: None,
                    outcome: TrackOutcome::Stalled,
                };
            };

            // the line leaves the cell where the first barycentric coordinate
            // that is negative at the end point crosses zero
            let mut exit: Option<(usize, f64)> = None;
            for local in 0..4 {
                let face = self.cell_faces[cell][local];
                if coords_end[local] >= -CONTAINMENT_TOLERANCE || Some(face) == entered_through {
                    continue;
                }
                let along = (coords_from[local] / (coords_from[local] - coords_end[local]))
                    .clamp(0., 1.);
                if exit.map_or(true, |(_, prev)| along < prev) {
                    exit = Some((local, along));
                }
            }

            let Some((local, along)) = exit else {
                return TrackResult {
                    position: end,
                    cell,
                    face: self.face_at(cell, &coords_end),
                    outcome: TrackOutcome::Completed,
                };
            };

            let hit = from + along * (end - from);
            let face = self.cell_faces[cell][local];
            match self.neighbour_across(cell, face) {
                Some(next) => {
                    cell = next;
                    from = hit;
                    entered_through = Some(face);
                }
                None => {
                    return TrackResult {
                        position: hit,
                        cell,
                        face: Some(face),
                        outcome: TrackOutcome::HitBoundary { face },
                    };
                }
            }
        }

        log::warn!("Tracking from {start:?} by {displacement:?} stalled in cell {cell}");
        TrackResult {
            position: from,
            cell,
            face: None,
            outcome: TrackOutcome::Stalled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::box_mesh;
    use approx::assert_relative_eq;

    #[test]
    fn track_across_cells() {
        let mesh = box_mesh(Vec3::zeros(), Vec3::new(1., 1., 1.), [3, 3, 3]);
        let start = Vec3::new(0.1, 0.2, 0.3);
        let cell = mesh.find_cell(&start).unwrap();

        let res = mesh.track(start, cell, Vec3::new(0.65, 0.45, 0.38));
        assert_eq!(res.outcome, TrackOutcome::Completed);
        assert_relative_eq!(res.position, Vec3::new(0.75, 0.65, 0.68), epsilon = 1e-12);
        let coords = mesh.barycentric_coordinates(res.cell, &res.position).unwrap();
        assert!(
            coords.iter().all(|w| *w >= -1e-9),
            "end cell {} doesn't contain the end point, coordinates {coords:?}",
            res.cell
        );
    }

    #[test]
    fn track_stops_at_boundary() {
        let mesh = box_mesh(Vec3::zeros(), Vec3::new(1., 1., 1.), [2, 2, 2]);
        let start = Vec3::new(0.3, 0.4, 0.6);
        let cell = mesh.find_cell(&start).unwrap();

        let res = mesh.track(start, cell, Vec3::new(0., 0., 1.));
        let TrackOutcome::HitBoundary { face } = res.outcome else {
            panic!("expected a boundary hit, got {:?}", res.outcome);
        };
        assert!(mesh.boundary_faces().contains(face));
        assert_eq!(res.face, Some(face));
        assert_relative_eq!(res.position, Vec3::new(0.3, 0.4, 1.), epsilon = 1e-12);
    }
}
