//! Spatial indexing for fast position-to-point lookups
//!
//! This module is only available with the `spatial-index` feature.

#[cfg(feature = "spatial-index")]
use kiddo::immutable::float::kdtree::ImmutableKdTree;
#[cfg(feature = "spatial-index")]
use kiddo::SquaredEuclidean;
#[cfg(feature = "spatial-index")]
use glam::DVec3;

#[cfg(feature = "spatial-index")]
use crate::crust::Crust;
#[cfg(feature = "spatial-index")]
use crate::point::PointId;

/// KD-tree over the crust point positions
///
/// The tree is immutable, so the world rebuilds it whenever an epoch has
/// moved the points. Queries between rebuilds see the positions of the last
/// completed epoch.
///
/// # Performance
///
/// - Construction: O(n log n)
/// - Query: O(log n)
#[cfg(feature = "spatial-index")]
#[derive(Clone)]
pub struct PointIndex {
    tree: Option<ImmutableKdTree<f64, usize, 3, 32>>,
    ids: Vec<PointId>,
}

#[cfg(feature = "spatial-index")]
impl PointIndex {
    /// Build the index from every live point of `crust`
    ///
    /// # Example
    ///
    /// ```
    /// use tectonic_planet::*;
    /// use glam::DVec3;
    ///
    /// # #[cfg(feature = "spatial-index")]
    /// # {
    /// let mut crust = Crust::new();
    /// let plate = crust.add_plate(Plate::new(DVec3::X, Rgb::WHITE, 0.0));
    /// let a = crust.add_point(Point::new(DVec3::X * 10.0, plate, 1.0, 0)).unwrap();
    /// let b = crust.add_point(Point::new(DVec3::Y * 10.0, plate, 1.0, 0)).unwrap();
    ///
    /// let index = PointIndex::new(&crust);
    /// assert_eq!(index.find_nearest(DVec3::new(9.0, 1.0, 0.0)), Some(a));
    /// assert_eq!(index.find_nearest(DVec3::new(0.0, 9.0, 1.0)), Some(b));
    /// # }
    /// ```
    pub fn new(crust: &Crust) -> Self {
        let (ids, points): (Vec<PointId>, Vec<[f64; 3]>) = crust
            .points()
            .map(|(id, p)| (id, [p.pos.x, p.pos.y, p.pos.z]))
            .unzip();

        let tree = if points.is_empty() {
            None
        } else {
            Some(ImmutableKdTree::new_from_slice(&points))
        };
        Self { tree, ids }
    }

    /// The point closest to `position`, or `None` for an empty crust
    pub fn find_nearest(&self, position: DVec3) -> Option<PointId> {
        let tree = self.tree.as_ref()?;
        let query = [position.x, position.y, position.z];
        let result = tree.nearest_one::<SquaredEuclidean>(&query);
        self.ids.get(result.item).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
#[cfg(feature = "spatial-index")]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::plate::Plate;
    use crate::point::Point;

    fn crust_with(positions: &[DVec3]) -> (Crust, Vec<PointId>) {
        let mut crust = Crust::new();
        let plate = crust.add_plate(Plate::new(DVec3::X, Rgb::WHITE, 0.0));
        let ids = positions
            .iter()
            .map(|&p| crust.add_point(Point::new(p, plate, 1.0, 0)).unwrap())
            .collect();
        (crust, ids)
    }

    #[test]
    fn test_point_index_basic() {
        let (crust, ids) = crust_with(&[
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
            DVec3::new(-1.0, 0.0, 0.0),
        ]);
        let index = PointIndex::new(&crust);
        assert_eq!(index.len(), 4);

        assert_eq!(index.find_nearest(DVec3::new(0.9, 0.1, 0.0)), Some(ids[0]));
        assert_eq!(index.find_nearest(DVec3::new(0.0, 0.95, 0.0)), Some(ids[1]));
        assert_eq!(index.find_nearest(DVec3::new(0.0, 0.1, 0.9)), Some(ids[2]));
        assert_eq!(index.find_nearest(DVec3::new(-0.8, 0.0, 0.0)), Some(ids[3]));
    }

    #[test]
    fn test_point_index_skips_dead_points() {
        let (mut crust, ids) = crust_with(&[DVec3::new(10.0, 0.0, 0.0), DVec3::new(0.0, 10.0, 0.0)]);
        crust.kill_point(ids[0]).unwrap();

        let index = PointIndex::new(&crust);
        assert_eq!(index.find_nearest(DVec3::new(10.0, 0.0, 0.0)), Some(ids[1]));
    }

    #[test]
    fn test_empty_index() {
        let index = PointIndex::new(&Crust::new());
        assert!(index.is_empty());
        assert_eq!(index.find_nearest(DVec3::X), None);
    }
}
