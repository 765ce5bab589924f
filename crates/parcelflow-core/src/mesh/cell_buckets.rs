use itertools::iproduct;

use super::BoundingBox;
use crate::Vec3;

/// A uniform grid over the mesh bounds,
/// listing for each bucket the cells whose bounding boxes overlap it.
///
/// Point queries then only test the cells of one bucket
/// instead of every cell in the mesh.
#[derive(Clone, Debug)]
pub(crate) struct CellBuckets {
    origin: Vec3,
    bucket_size: Vec3,
    dims: [usize; 3],
    /// cell indices of each bucket, in ascending order
    buckets: Vec<Vec<usize>>,
}

impl CellBuckets {
    pub fn new(vertices: &[Vec3], cells: &[[usize; 4]], bounds: &BoundingBox) -> Self {
        // roughly one cell per bucket
        let per_axis = ((cells.len() as f64).cbrt().ceil() as usize).max(1);
        let dims = [per_axis; 3];
        let bucket_size = (bounds.max - bounds.min) / per_axis as f64;

        let mut grid = Self {
            origin: bounds.min,
            bucket_size,
            dims,
            buckets: vec![Vec::new(); per_axis.pow(3)],
        };

        for (cell_idx, cell) in cells.iter().enumerate() {
            let mut min = vertices[cell[0]];
            let mut max = min;
            for v in &cell[1..] {
                min = min.inf(&vertices[*v]);
                max = max.sup(&vertices[*v]);
            }
            // points are accepted slightly outside their cell,
            // so the cell must be listed in buckets just past its box too
            let pad = 1e-6 * (max - min).norm();
            let lo = grid.bucket_coords(&min.add_scalar(-pad));
            let hi = grid.bucket_coords(&max.add_scalar(pad));
            for (k, j, i) in iproduct!(lo[2]..=hi[2], lo[1]..=hi[1], lo[0]..=hi[0]) {
                let idx = grid.flat_index([i, j, k]);
                grid.buckets[idx].push(cell_idx);
            }
        }

        grid
    }

    /// Coordinates of the bucket a point falls in,
    /// clamped to the grid for points outside it.
    fn bucket_coords(&self, p: &Vec3) -> [usize; 3] {
        std::array::from_fn(|axis| {
            let f = (p[axis] - self.origin[axis]) / self.bucket_size[axis];
            // a flat axis gives NaN or infinity, which clamp to the ends
            (f.max(0.) as usize).min(self.dims[axis] - 1)
        })
    }

    #[inline]
    fn flat_index(&self, [i, j, k]: [usize; 3]) -> usize {
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    /// Cells that may contain a point, in ascending order.
    pub fn candidates(&self, p: &Vec3) -> &[usize] {
        &self.buckets[self.flat_index(self.bucket_coords(p))]
    }
}
