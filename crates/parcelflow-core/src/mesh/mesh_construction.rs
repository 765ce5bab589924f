use fixedbitset as fb;
use nalgebra as na;

use itertools::{iproduct, Itertools};
use std::collections::HashMap;

use super::{BoundingBox, CellBuckets, SolutionDirections, TetMesh};
use crate::Vec3;

/// Construct a mesh from raw vertices and indices.
///
/// The indices are given as a flat array,
/// where every 4 indices correspond to one tetrahedron.
pub fn build_mesh(vertices: Vec<Vec3>, indices: Vec<usize>) -> TetMesh {
    // by convention, sort cells to have their indices in ascending order.
    // this makes the faces of a cell come out sorted too,
    // giving a consistent way to identify a face with its vertices
    let cells: Vec<[usize; 4]> = indices
        .chunks_exact(4)
        .map(|c| {
            let mut cell = [c[0], c[1], c[2], c[3]];
            cell.sort_unstable();
            cell
        })
        .collect();

    //
    // faces
    //

    // every combination of three vertices in a cell is a face on its boundary.
    // collect them all with the cell they came from
    // and the local index of the vertex opposite them
    let mut cell_face_entries: Vec<([usize; 3], usize, usize)> =
        Vec::with_capacity(cells.len() * 4);
    for (cell_idx, cell) in cells.iter().enumerate() {
        for exclude_idx in 0..4 {
            let mut face = [0; 3];
            for (slot, vert_id) in face.iter_mut().zip(
                cell.iter()
                    .enumerate()
                    .filter(|(i, _)| *i != exclude_idx)
                    .map(|(_, v)| *v),
            ) {
                *slot = vert_id;
            }
            cell_face_entries.push((face, cell_idx, exclude_idx));
        }
    }

    // sort in lexicographic order by vertex indices to bring duplicates together
    cell_face_entries.sort_unstable_by_key(|(face, cell, _)| (*face, *cell));

    let mut faces: Vec<[usize; 3]> = Vec::new();
    let mut face_cells: Vec<(usize, Option<usize>)> = Vec::new();
    let mut cell_faces: Vec<[usize; 4]> = vec![[usize::MAX; 4]; cells.len()];

    for (face, group) in &cell_face_entries.iter().group_by(|(face, _, _)| *face) {
        let face_idx = faces.len();
        faces.push(face);

        let mut group_cells = group.map(|(_, cell, local)| (*cell, *local));
        // the iterator always yields at least one element here
        // since groups are only created for existing keys
        let Some((owner, owner_local)) = group_cells.next() else {
            unreachable!();
        };
        cell_faces[owner][owner_local] = face_idx;

        let neighbour = group_cells.next().map(|(cell, local)| {
            cell_faces[cell][local] = face_idx;
            cell
        });
        if let Some((extra, _)) = group_cells.next() {
            log::warn!(
                "Face {face:?} is shared by more than two cells (also cell {extra}); \
                 the mesh is not a manifold and tracking across it is undefined"
            );
        }
        face_cells.push((owner, neighbour));
    }

    // a face with only one adjacent cell is on the boundary of the mesh
    let mut boundary_faces = fb::FixedBitSet::with_capacity(faces.len());
    for (face_idx, (_, neighbour)) in face_cells.iter().enumerate() {
        if neighbour.is_none() {
            boundary_faces.insert(face_idx);
        }
    }

    //
    // cell geometry
    //

    let mut centroids = Vec::with_capacity(cells.len());
    let mut volumes = Vec::with_capacity(cells.len());
    let mut bary_transforms = Vec::with_capacity(cells.len());

    for cell in &cells {
        let [v0, v1, v2, v3] = cell.map(|i| vertices[i]);
        centroids.push(0.25 * (v0 + v1 + v2 + v3));

        let edges = na::Matrix3::from_columns(&[v1 - v0, v2 - v0, v3 - v0]);
        let det = edges.determinant();
        volumes.push(det.abs() / 6.);
        // treat cells that are flat relative to their size as degenerate
        let scale = edges.column_iter().map(|e| e.norm()).product::<f64>();
        let transform = if det.abs() > 1e-14 * scale {
            edges.try_inverse()
        } else {
            None
        };
        if transform.is_none() {
            log::warn!("Cell {cell:?} is degenerate and will never contain any parcels");
        }
        bary_transforms.push(transform);
    }

    //
    // compute bounding box of the mesh
    //

    let mut bounds = BoundingBox {
        min: Vec3::from_element(f64::MAX),
        max: Vec3::from_element(f64::MIN),
    };
    for vert in &vertices {
        bounds.min = bounds.min.inf(vert);
        bounds.max = bounds.max.sup(vert);
    }

    let cell_buckets = CellBuckets::new(&vertices, &cells, &bounds);

    TetMesh {
        vertices,
        cells,
        faces,
        cell_faces,
        face_cells,
        boundary_faces,
        centroids,
        volumes,
        bary_transforms,
        cell_zones: HashMap::new(),
        bounds,
        cell_buckets,
        solution_d: SolutionDirections::ALL,
    }
}

/// Generate a structured mesh filling an axis-aligned box.
///
/// The box is divided into `counts[0] * counts[1] * counts[2]` hexahedra,
/// each of which is split into six tetrahedra sharing its main diagonal.
/// Every hexahedron is split the same way,
/// so the faces of neighbouring hexahedra match up.
pub fn box_mesh(min: Vec3, max: Vec3, counts: [usize; 3]) -> TetMesh {
    let [nx, ny, nz] = counts;
    let step = (max - min).component_div(&Vec3::new(nx as f64, ny as f64, nz as f64));

    let vert_idx = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);

    let vertices: Vec<Vec3> = iproduct!(0..=nz, 0..=ny, 0..=nx)
        .map(|(k, j, i)| min + step.component_mul(&Vec3::new(i as f64, j as f64, k as f64)))
        .collect();

    let mut indices = Vec::with_capacity(nx * ny * nz * 24);
    for (k, j, i) in iproduct!(0..nz, 0..ny, 0..nx) {
        // walk from the lowest corner to the highest one
        // along the axes in every possible order;
        // each walk visits the four vertices of one tetrahedron
        for axis_order in (0..3).permutations(3) {
            let mut corner = [i, j, k];
            indices.push(vert_idx(corner[0], corner[1], corner[2]));
            for axis in axis_order {
                corner[axis] += 1;
                indices.push(vert_idx(corner[0], corner[1], corner[2]));
            }
        }
    }

    build_mesh(vertices, indices)
}

//
// tests
//

/// A small 3D mesh for testing basic functionality.
/// Four tetrahedra arranged into a diamond shape,
/// split like this down the x,y plane:
///
///    /\
///   /__\
///   \  /
///    \/
///
/// and with a single point both up and down the z-axis.
#[cfg(test)]
pub(crate) fn tiny_mesh_3d() -> TetMesh {
    let vertices = vec![
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(-0.5, 0.0, 0.0),
        Vec3::new(0.5, 0.0, 0.0),
        Vec3::new(0.0, -1.0, 0.0),
        Vec3::new(0.0, 0.0, -1.0),
        Vec3::new(0.0, 0.0, 1.0),
    ];
    #[rustfmt::skip]
    let indices = vec![
        0, 1, 2, 4,
        0, 1, 2, 5,
        1, 2, 3, 4,
        1, 2, 3, 5,
    ];

    TetMesh::new(vertices, indices)
}

// Tests here are concerned with the mesh structure being constructed correctly.
// For tests on locating and tracking, see `mesh.rs` and `tracking.rs`
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn tiny_3d_mesh_is_correct() {
        let mesh = tiny_mesh_3d();

        // 4 cells with 4 faces each, 4 interior faces shared by two cells
        assert_eq!(mesh.cell_count(), 4);
        assert_eq!(mesh.face_count(), 12);
        assert_eq!(mesh.boundary_faces().count_ones(..), 8);

        #[rustfmt::skip]
        let expected_interior = vec![
            [0, 1, 2],
            [1, 2, 3],
            [1, 2, 4],
            [1, 2, 5],
        ];
        let interior: Vec<[usize; 3]> = (0..mesh.face_count())
            .filter(|f| !mesh.boundary_faces().contains(*f))
            .map(|f| mesh.faces[f])
            .collect();
        assert_eq!(interior, expected_interior);

        // every cell references each of its faces,
        // and each face lists the cell as one of its sides
        for cell in 0..mesh.cell_count() {
            for (local, face) in mesh.cell_faces[cell].iter().enumerate() {
                let (owner, neighbour) = mesh.face_cells(*face);
                assert!(owner == cell || neighbour == Some(cell));
                assert!(!mesh.faces[*face].contains(&mesh.cells[cell][local]));
            }
        }

        // each tetrahedron spans a 1 x 1 triangle with height 1
        for vol in mesh.volumes() {
            assert_relative_eq!(*vol, 1. / 6., epsilon = 1e-12);
        }
        assert_eq!(mesh.bounds().min, Vec3::new(-0.5, -1., -1.));
        assert_eq!(mesh.bounds().max, Vec3::new(0.5, 1., 1.));
    }

    #[test]
    fn box_mesh_fills_the_box() {
        let mesh = box_mesh(Vec3::zeros(), Vec3::new(2., 1., 1.), [2, 2, 1]);

        assert_eq!(mesh.vertices().len(), 3 * 3 * 2);
        assert_eq!(mesh.cell_count(), 4 * 6);
        let total_volume: f64 = mesh.volumes().iter().sum();
        assert_relative_eq!(total_volume, 2., epsilon = 1e-12);

        // faces between hexahedra must match up,
        // so boundary faces are exactly the two triangles per outer quad
        let outer_quads = 2 * (2 * 2 + 2 * 1 + 2 * 1);
        assert_eq!(mesh.boundary_faces().count_ones(..), 2 * outer_quads);

        for centroid in mesh.centroids() {
            assert!(mesh.bounds().contains(centroid));
        }
    }
}
