//! Wedges: the planet center plus one surface triangle

use glam::DVec3;

use crate::point::PointId;

/// One facet of the crust mesh
///
/// The fourth vertex of every wedge is the planet center, so only the three
/// surface points are stored. The circumsphere of the tetrahedron is
/// approximated by the sphere centered on the facet normal at planet radius
/// and passing through the surface vertices; `inner_sq` and `outer_sq`
/// bracket its squared radius to absorb rounding.
#[derive(Debug, Clone, PartialEq)]
pub struct Wedge {
    /// Surface vertices
    pub points: [PointId; 3],
    /// Circumsphere center, on the planet surface
    pub center: DVec3,
    /// Squared circumsphere radius measured to the first vertex
    pub radius_sq: f64,
    /// Smallest squared distance from the center to a vertex
    pub inner_sq: f64,
    /// Largest squared distance from the center to a vertex
    pub outer_sq: f64,
    /// Area of the surface triangle
    pub area: f64,
    normals: [DVec3; 3],
}

impl Wedge {
    /// Build a wedge on the given vertices and positions
    ///
    /// Returns `None` for a degenerate facet (collinear vertices, or a plane
    /// through the planet center) that has no usable circumsphere.
    pub fn new(points: [PointId; 3], pos: [DVec3; 3], planet_radius: f64) -> Option<Self> {
        let [b, c, d] = pos;
        let mut normal = (b - c).cross(b - d);
        let side = normal.dot(b);
        if !(side.abs() > 0.0) {
            return None;
        }
        if side < 0.0 {
            normal = -normal;
        }
        let normal = normal.try_normalize()?;
        let center = normal * planet_radius;

        let dists = [
            center.distance_squared(b),
            center.distance_squared(c),
            center.distance_squared(d),
        ];
        let inner_sq = dists[0].min(dists[1]).min(dists[2]);
        let outer_sq = dists[0].max(dists[1]).max(dists[2]);
        if !outer_sq.is_finite() {
            return None;
        }

        Some(Self {
            points,
            center,
            radius_sq: dists[0],
            inner_sq,
            outer_sq,
            area: triangle_area(b, c, d),
            normals: [b.cross(c), c.cross(d), d.cross(b)],
        })
    }

    /// Whether `p` lies strictly inside the circumsphere
    ///
    /// Points in the band between the inner and outer radius are treated as
    /// outside. Callers must skip the wedge's own vertices.
    #[inline]
    pub fn contains(&self, p: DVec3) -> bool {
        let dist = p.distance_squared(self.center);
        if dist > self.outer_sq {
            return false;
        }
        dist < self.inner_sq
    }

    /// Whether the ray from the planet center through `p` passes through
    /// the surface triangle
    pub fn strictly_contains(&self, p: DVec3) -> bool {
        if p.dot(self.center) <= 0.0 {
            return false;
        }
        let v1 = self.normals[0].dot(p);
        let v2 = self.normals[1].dot(p);
        if (v1 < 0.0 && v2 > 0.0) || (v1 > 0.0 && v2 < 0.0) {
            return false;
        }
        let v3 = self.normals[2].dot(p);
        (v1 <= 0.0 && v2 <= 0.0 && v3 <= 0.0) || (v1 >= 0.0 && v2 >= 0.0 && v3 >= 0.0)
    }

    #[inline]
    pub fn uses(&self, id: PointId) -> bool {
        self.points.contains(&id)
    }

    /// The three surface edges
    #[inline]
    pub fn edges(&self) -> [(PointId, PointId); 3] {
        let [a, b, c] = self.points;
        [(a, b), (b, c), (a, c)]
    }

    /// The vertex not on edge `a`-`b`
    pub fn opposite(&self, a: PointId, b: PointId) -> Option<PointId> {
        self.points.iter().copied().find(|&p| p != a && p != b)
    }

    /// Axis-aligned bounds of the circumsphere
    pub fn bounds(&self) -> (DVec3, DVec3) {
        let r = self.outer_sq.sqrt();
        (self.center - DVec3::splat(r), self.center + DVec3::splat(r))
    }
}

/// Triangle area by Heron's formula
pub fn triangle_area(a: DVec3, b: DVec3, c: DVec3) -> f64 {
    let l1 = a.distance(b);
    let l2 = b.distance(c);
    let l3 = c.distance(a);
    let s = (l1 + l2 + l3) * 0.5;
    (s * (s - l1) * (s - l2) * (s - l3)).max(0.0).sqrt()
}
