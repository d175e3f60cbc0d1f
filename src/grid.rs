//! Uniform bucket grids over the planet's bounding cube
//!
//! [`PointGrid`] buckets points with cells a little larger than the point
//! spacing, so the 3×3×3 block around a position holds every point that can
//! be its mesh neighbour. [`WedgeGrid`] is a coarse fixed-size grid of wedges
//! keyed by their first vertex, used to find the wedge under a position.

use glam::DVec3;

use crate::point::PointId;

/// Cells along each axis of the wedge grid
pub const WEDGE_GRID_SIZE: usize = 15;

/// Cell coordinates of a position, clamped into the grid
#[derive(Debug, Clone, Copy)]
struct Cells {
    size: usize,
    radius: f64,
}

impl Cells {
    #[inline]
    fn coord(&self, v: f64) -> usize {
        let scaled = (v + self.radius) * (self.size - 1) as f64 / (self.radius * 2.0);
        if !scaled.is_finite() || scaled <= 0.0 {
            return 0;
        }
        (scaled.round() as usize).min(self.size - 1)
    }

    #[inline]
    fn cell(&self, p: DVec3) -> [usize; 3] {
        [self.coord(p.x), self.coord(p.y), self.coord(p.z)]
    }

    #[inline]
    fn index(&self, c: [usize; 3]) -> usize {
        (c[0] * self.size + c[1]) * self.size + c[2]
    }

    /// Inclusive cell range covering `lo..=hi` grown by `pad` cells
    fn range(&self, lo: [usize; 3], hi: [usize; 3], pad: usize) -> ([usize; 3], [usize; 3]) {
        let mut min = [0; 3];
        let mut max = [0; 3];
        for axis in 0..3 {
            min[axis] = lo[axis].saturating_sub(pad);
            max[axis] = (hi[axis] + pad).min(self.size - 1);
        }
        (min, max)
    }
}

/// Spatial hash of crust points
#[derive(Debug, Clone)]
pub struct PointGrid {
    cells: Cells,
    buckets: Vec<Vec<PointId>>,
}

impl PointGrid {
    /// Grid sized so each cell spans a bit more than one point spacing
    pub fn new(planet_radius: f64, point_spacing: f64) -> Self {
        let size = (planet_radius / (point_spacing * 1.1) - 1.0).ceil().max(3.0) as usize;
        Self {
            cells: Cells {
                size,
                radius: planet_radius,
            },
            buckets: vec![Vec::new(); size * size * size],
        }
    }

    /// Cells along each axis
    #[inline]
    pub fn size(&self) -> usize {
        self.cells.size
    }

    /// Empty every bucket, keeping the allocation
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    pub fn insert(&mut self, id: PointId, pos: DVec3) {
        let i = self.cells.index(self.cells.cell(pos));
        self.buckets[i].push(id);
    }

    /// Remove a point previously inserted at `pos`
    pub fn remove(&mut self, id: PointId, pos: DVec3) -> bool {
        let i = self.cells.index(self.cells.cell(pos));
        let bucket = &mut self.buckets[i];
        match bucket.iter().position(|&p| p == id) {
            Some(j) => {
                bucket.swap_remove(j);
                true
            }
            None => false,
        }
    }

    /// Points in the 3×3×3 block of cells around `pos`
    pub fn around(&self, pos: DVec3) -> Vec<PointId> {
        let c = self.cells.cell(pos);
        self.collect(c, c, 1)
    }

    /// Points in the cells spanning the box between two positions, plus one
    /// cell of margin
    pub fn around_pair(&self, p1: DVec3, p2: DVec3) -> Vec<PointId> {
        let (lo, hi) = corners(&[self.cells.cell(p1), self.cells.cell(p2)]);
        self.collect(lo, hi, 1)
    }

    /// Points in the cells spanning the box between three positions, plus
    /// one cell of margin
    pub fn around_triple(&self, p1: DVec3, p2: DVec3, p3: DVec3) -> Vec<PointId> {
        let (lo, hi) = corners(&[
            self.cells.cell(p1),
            self.cells.cell(p2),
            self.cells.cell(p3),
        ]);
        self.collect(lo, hi, 1)
    }

    /// Points in the cells overlapping the axis-aligned box `min..=max`
    pub fn within_box(&self, min: DVec3, max: DVec3) -> Vec<PointId> {
        self.collect(self.cells.cell(min), self.cells.cell(max), 0)
    }

    fn collect(&self, lo: [usize; 3], hi: [usize; 3], pad: usize) -> Vec<PointId> {
        let (min, max) = self.cells.range(lo, hi, pad);
        let mut out = Vec::new();
        for x in min[0]..=max[0] {
            for y in min[1]..=max[1] {
                for z in min[2]..=max[2] {
                    out.extend_from_slice(&self.buckets[self.cells.index([x, y, z])]);
                }
            }
        }
        out
    }
}

fn corners(cells: &[[usize; 3]]) -> ([usize; 3], [usize; 3]) {
    let mut lo = [usize::MAX; 3];
    let mut hi = [0; 3];
    for c in cells {
        for axis in 0..3 {
            lo[axis] = lo[axis].min(c[axis]);
            hi[axis] = hi[axis].max(c[axis]);
        }
    }
    (lo, hi)
}

/// Coarse grid of wedge indices keyed by one vertex position
#[derive(Debug, Clone)]
pub struct WedgeGrid {
    cells: Cells,
    buckets: Vec<Vec<usize>>,
}

impl WedgeGrid {
    pub fn new(planet_radius: f64) -> Self {
        let size = WEDGE_GRID_SIZE;
        Self {
            cells: Cells {
                size,
                radius: planet_radius,
            },
            buckets: vec![Vec::new(); size * size * size],
        }
    }

    /// Rebuild from `(wedge index, key position)` pairs
    pub fn reset<I>(&mut self, wedges: I)
    where
        I: IntoIterator<Item = (usize, DVec3)>,
    {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        for (i, pos) in wedges {
            let cell = self.cells.index(self.cells.cell(pos));
            self.buckets[cell].push(i);
        }
    }

    /// Number of shells around a cell that cover the whole grid
    #[inline]
    pub fn shell_count(&self) -> usize {
        self.cells.size
    }

    /// Wedges in the cells at Chebyshev distance exactly `shell` from the
    /// cell of `pos`
    pub fn shell(&self, pos: DVec3, shell: usize) -> Vec<usize> {
        let c = self.cells.cell(pos);
        let (min, max) = self.cells.range(c, c, shell);
        let mut out = Vec::new();
        for x in min[0]..=max[0] {
            for y in min[1]..=max[1] {
                for z in min[2]..=max[2] {
                    let ring = x.abs_diff(c[0]).max(y.abs_diff(c[1])).max(z.abs_diff(c[2]));
                    if ring == shell {
                        out.extend_from_slice(&self.buckets[self.cells.index([x, y, z])]);
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_size_from_spacing() {
        let grid = PointGrid::new(6400.0, 360.0);
        assert_eq!(grid.size(), 16);
        // Never degenerate for coarse planets
        assert_eq!(PointGrid::new(6400.0, 5000.0).size(), 3);
    }

    #[test]
    fn test_around_finds_nearby_only() {
        let mut grid = PointGrid::new(6400.0, 360.0);
        grid.insert(PointId(0), DVec3::new(6400.0, 0.0, 0.0));
        grid.insert(PointId(1), DVec3::new(6350.0, 300.0, 0.0));
        grid.insert(PointId(2), DVec3::new(-6400.0, 0.0, 0.0));

        let near = grid.around(DVec3::new(6400.0, 10.0, 0.0));
        assert!(near.contains(&PointId(0)));
        assert!(near.contains(&PointId(1)));
        assert!(!near.contains(&PointId(2)));
    }

    #[test]
    fn test_pair_covers_box() {
        let mut grid = PointGrid::new(6400.0, 360.0);
        let a = DVec3::new(0.0, 0.0, 6400.0);
        let b = DVec3::new(2000.0, 0.0, 6080.0);
        let mid = (a + b) * 0.5;
        grid.insert(PointId(7), mid);
        assert!(grid.around_pair(a, b).contains(&PointId(7)));
        assert!(grid.around_triple(a, b, a).contains(&PointId(7)));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut grid = PointGrid::new(6400.0, 360.0);
        let p = DVec3::new(0.0, 6400.0, 0.0);
        grid.insert(PointId(1), p);
        assert!(grid.remove(PointId(1), p));
        assert!(!grid.remove(PointId(1), p));
        grid.insert(PointId(2), p);
        grid.clear();
        assert!(grid.around(p).is_empty());
    }

    #[test]
    fn test_out_of_range_positions_clamp() {
        let mut grid = PointGrid::new(100.0, 10.0);
        grid.insert(PointId(0), DVec3::splat(1.0e6));
        grid.insert(PointId(1), DVec3::splat(-1.0e6));
        assert_eq!(grid.within_box(DVec3::splat(-1e9), DVec3::splat(1e9)).len(), 2);
    }

    #[test]
    fn test_wedge_grid_shells_partition() {
        let mut grid = WedgeGrid::new(6400.0);
        grid.reset(vec![
            (0, DVec3::new(6400.0, 0.0, 0.0)),
            (1, DVec3::new(-6400.0, 0.0, 0.0)),
        ]);
        let query = DVec3::new(6400.0, 0.0, 0.0);
        assert_eq!(grid.shell(query, 0), vec![0]);
        let total: usize = (0..grid.shell_count()).map(|s| grid.shell(query, s).len()).sum();
        assert_eq!(total, 2);
    }
}
