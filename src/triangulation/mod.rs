//! Incremental spherical triangulation of the crust points
//!
//! The mesh is grown front-wise: starting from one wedge whose circumsphere
//! is empty, every edge still used by only one wedge is closed by the
//! nearest candidate point that gives another empty circumsphere. After the
//! points move, [`Mesh::repair`] keeps the wedges that are still valid and
//! regrows the holes, falling back to [`Mesh::rebuild`] if the front gets
//! stuck.
//!
//! # Example
//!
//! ```
//! use glam::DVec3;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use tectonic_planet::*;
//!
//! let mut crust = Crust::new();
//! let plate = crust.add_plate(Plate::new(DVec3::Z * 100.0, Rgb::WHITE, 0.0));
//! // An octahedron
//! for v in [DVec3::X, DVec3::NEG_X, DVec3::Y, DVec3::NEG_Y, DVec3::Z, DVec3::NEG_Z] {
//!     crust.add_point(Point::new(v * 100.0, plate, 10.0, 0)).unwrap();
//! }
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(1);
//! let mut mesh = Mesh::new(100.0, 40.0);
//! mesh.rebuild(&crust, &mut rng).unwrap();
//! assert_eq!(mesh.wedges().len(), 8);
//! assert_eq!(mesh.links().len(), 12);
//! ```

mod wedge;

pub use wedge::{triangle_area, Wedge};

use glam::DVec3;
use rand::Rng;
use tracing::{debug, warn};

use crate::crust::Crust;
use crate::error::{ConsistencyError, Result, TectonicError};
use crate::grid::{PointGrid, WedgeGrid};
use crate::links::{LinkSystem, MAX_EDGE_COUNT};
use crate::point::PointId;

/// Random picks of a starting triple before a rebuild gives up
pub const MAX_BOOTSTRAP_ATTEMPTS: usize = 10_000;

/// Attempts at reusing an existing wedge as the seed of a rebuild
const RESEED_ATTEMPTS: usize = 64;

/// Complete rebuilds tried before the triangulation is declared failed
const MAX_REBUILD_ATTEMPTS: usize = 4;

/// What a repair pass had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Invalid wedges were removed and the holes regrown
    Repaired { removed: usize, added: usize },
    /// The front got stuck and the mesh was rebuilt from scratch
    Rebuilt,
}

enum Expansion {
    Closed { added: usize },
    Stuck { wedge: usize },
}

/// The wedge mesh, its edges and the spatial indices used to build it
#[derive(Debug, Clone)]
pub struct Mesh {
    wedges: Vec<Wedge>,
    links: LinkSystem,
    grid: PointGrid,
    wedge_grid: WedgeGrid,
    planet_radius: f64,
}

impl Mesh {
    /// Empty mesh for a planet of the given radius and point spacing
    pub fn new(planet_radius: f64, point_spacing: f64) -> Self {
        Self {
            wedges: Vec::new(),
            links: LinkSystem::new(),
            grid: PointGrid::new(planet_radius, point_spacing),
            wedge_grid: WedgeGrid::new(planet_radius),
            planet_radius,
        }
    }

    #[inline]
    pub fn wedges(&self) -> &[Wedge] {
        &self.wedges
    }

    #[inline]
    pub fn links(&self) -> &LinkSystem {
        &self.links
    }

    #[inline]
    pub fn links_mut(&mut self) -> &mut LinkSystem {
        &mut self.links
    }

    /// Neighbours of a point in the mesh
    #[inline]
    pub fn neighbours(&self, p: PointId) -> &[PointId] {
        self.links.neighbours(p)
    }

    /// Points in the grid cells around `pos`, as of the last rebuild or repair
    pub fn points_near(&self, pos: DVec3) -> Vec<PointId> {
        self.grid.around(pos)
    }

    /// Triangulate all live points from scratch
    ///
    /// The seed wedge is taken from the previous mesh when one of its wedges
    /// is still empty, otherwise from the first three points, otherwise from
    /// random nearby triples.
    ///
    /// # Errors
    ///
    /// `Triangulation` if no seed wedge is found or every attempt gets
    /// stuck; `Consistency` if an edge overflows.
    pub fn rebuild<R: Rng + ?Sized>(&mut self, crust: &Crust, rng: &mut R) -> Result<()> {
        self.fill_grid(crust);
        for attempt in 0..MAX_REBUILD_ATTEMPTS {
            let seed = self.bootstrap(crust, rng, attempt == 0)?;
            self.wedges.clear();
            self.links.clear();
            self.add_wedge(seed)?;

            match self.expand(crust, vec![0])? {
                Expansion::Closed { added } if self.covers(crust) => {
                    debug!(wedges = added + 1, links = self.links.len(), "full triangulation");
                    self.reset_wedge_grid(crust);
                    return Ok(());
                }
                Expansion::Closed { .. } => {
                    warn!(attempt, "triangulation closed without reaching every point");
                }
                Expansion::Stuck { wedge } => {
                    warn!(attempt, wedge = ?self.wedges[wedge].points, "completely failed to expand from wedge");
                }
            }
        }
        Err(TectonicError::Triangulation(format!(
            "no closed mesh after {} attempts",
            MAX_REBUILD_ATTEMPTS
        )))
    }

    /// Bring the mesh up to date with moved, added and removed points
    ///
    /// Every wedge is recomputed from its vertices' current positions and
    /// checked against the point grid. Invalid wedges and the wedges next
    /// to them are removed, and the front is grown again from the rest.
    pub fn repair<R: Rng + ?Sized>(&mut self, crust: &Crust, rng: &mut R) -> Result<RepairOutcome> {
        self.fill_grid(crust);

        let old = std::mem::take(&mut self.wedges);
        let mut kept = Vec::with_capacity(old.len());
        let mut removed = 0;
        for wedge in old {
            match self.recalc(&wedge, crust) {
                Some(fresh) if self.is_valid(&fresh, crust) => kept.push(fresh),
                _ => {
                    self.drop_links(&wedge);
                    removed += 1;
                }
            }
        }

        let (closed, open): (Vec<Wedge>, Vec<Wedge>) = kept
            .into_iter()
            .partition(|w| w.edges().iter().all(|&(a, b)| self.links.count(a, b) >= MAX_EDGE_COUNT));
        for wedge in &open {
            self.drop_links(wedge);
        }
        removed += open.len();
        self.wedges = closed;

        let active: Vec<usize> = (0..self.wedges.len())
            .filter(|&i| self.is_open(i))
            .collect();
        debug!(removed, active = active.len(), "repairing mesh");

        match self.expand(crust, active)? {
            Expansion::Closed { added } if self.covers(crust) => {
                self.reset_wedge_grid(crust);
                Ok(RepairOutcome::Repaired { removed, added })
            }
            outcome => {
                if let Expansion::Stuck { wedge } = outcome {
                    warn!(wedge = ?self.wedges[wedge].points, "repair failed to expand, rebuilding mesh");
                } else {
                    warn!("repair left points outside the mesh, rebuilding mesh");
                }
                self.rebuild(crust, rng)?;
                Ok(RepairOutcome::Rebuilt)
            }
        }
    }

    /// Drop every wedge and edge that uses `id`
    ///
    /// Must be called while the point is still alive in `crust`.
    pub fn remove_point(&mut self, id: PointId, crust: &Crust) {
        let (gone, kept): (Vec<Wedge>, Vec<Wedge>) =
            std::mem::take(&mut self.wedges).into_iter().partition(|w| w.uses(id));
        self.wedges = kept;
        for wedge in &gone {
            self.drop_links(wedge);
        }
        self.links.remove_point(id);
        if let Some(pos) = crust.pos(id) {
            self.grid.remove(id, pos);
        }
        self.reset_wedge_grid(crust);
    }

    /// Set each point's area to a third of its wedges' areas
    ///
    /// Returns the total surface area of the mesh.
    pub fn apply_areas(&self, crust: &mut Crust) -> f64 {
        for (_, p) in crust.points_mut() {
            p.area = 0.0;
        }
        let mut total = 0.0;
        for wedge in &self.wedges {
            total += wedge.area;
            for &id in &wedge.points {
                if let Some(p) = crust.point_mut(id) {
                    p.area += wedge.area / 3.0;
                }
            }
        }
        total
    }

    /// Index of the wedge whose facet lies under `pos`
    pub fn wedge_at(&self, pos: DVec3) -> Option<usize> {
        for shell in 0..self.wedge_grid.shell_count() {
            for i in self.wedge_grid.shell(pos, shell) {
                if self.wedges.get(i).is_some_and(|w| w.strictly_contains(pos)) {
                    return Some(i);
                }
            }
        }
        self.wedges.iter().position(|w| w.strictly_contains(pos))
    }

    /// Verify every edge is used by exactly two wedges
    pub fn check_closed(&self) -> std::result::Result<(), ConsistencyError> {
        match self.links.first_open_edge() {
            Some(((a, b), count)) => Err(ConsistencyError::OpenEdge { a, b, count }),
            None => Ok(()),
        }
    }

    fn fill_grid(&mut self, crust: &Crust) {
        self.grid.clear();
        for (id, p) in crust.points() {
            self.grid.insert(id, p.pos);
        }
    }

    fn reset_wedge_grid(&mut self, crust: &Crust) {
        let keys: Vec<(usize, DVec3)> = self
            .wedges
            .iter()
            .enumerate()
            .filter_map(|(i, w)| crust.pos(w.points[0]).map(|pos| (i, pos)))
            .collect();
        self.wedge_grid.reset(keys);
    }

    fn recalc(&self, wedge: &Wedge, crust: &Crust) -> Option<Wedge> {
        let [a, b, c] = wedge.points;
        let pos = [crust.pos(a)?, crust.pos(b)?, crust.pos(c)?];
        Wedge::new(wedge.points, pos, self.planet_radius)
    }

    /// No grid point other than the wedge's own lies inside its circumsphere
    fn is_valid(&self, wedge: &Wedge, crust: &Crust) -> bool {
        let (min, max) = wedge.bounds();
        self.grid.within_box(min, max).into_iter().all(|id| {
            wedge.uses(id) || crust.pos(id).map_or(true, |pos| !wedge.contains(pos))
        })
    }

    fn is_open(&self, i: usize) -> bool {
        self.wedges[i]
            .edges()
            .iter()
            .any(|&(a, b)| self.links.count(a, b) < MAX_EDGE_COUNT)
    }

    /// Every live point is a vertex of the mesh
    fn covers(&self, crust: &Crust) -> bool {
        crust.points().all(|(id, _)| !self.links.neighbours(id).is_empty())
    }

    fn add_wedge(&mut self, wedge: Wedge) -> std::result::Result<usize, ConsistencyError> {
        for (a, b) in wedge.edges() {
            let count = self.links.count(a, b);
            if count >= MAX_EDGE_COUNT {
                return Err(ConsistencyError::EdgeOverflow { a, b, count: count + 1 });
            }
        }
        for (a, b) in wedge.edges() {
            self.links.add(a, b)?;
        }
        self.wedges.push(wedge);
        Ok(self.wedges.len() - 1)
    }

    fn drop_links(&mut self, wedge: &Wedge) {
        for (a, b) in wedge.edges() {
            self.links.remove(a, b);
        }
    }

    fn bootstrap<R: Rng + ?Sized>(&self, crust: &Crust, rng: &mut R, reuse: bool) -> Result<Wedge> {
        let ids = crust.point_ids();
        if ids.len() < 4 {
            return Err(TectonicError::Triangulation(format!(
                "need at least 4 points, have {}",
                ids.len()
            )));
        }

        if reuse && !self.wedges.is_empty() {
            for _ in 0..RESEED_ATTEMPTS {
                let old = &self.wedges[rng.gen_range(0..self.wedges.len())];
                if let Some(w) = self.recalc(old, crust) {
                    if self.is_valid(&w, crust) {
                        return Ok(w);
                    }
                }
            }
        }

        let first = [ids[0], ids[1], ids[2]];
        if let Some(w) = self.make_wedge(first, crust) {
            if self.is_valid(&w, crust) {
                return Ok(w);
            }
        }
        debug!("first wedge invalid, searching for a seed by brute force");

        for _ in 0..MAX_BOOTSTRAP_ATTEMPTS {
            let centre = ids[rng.gen_range(0..ids.len())];
            let Some(pos) = crust.pos(centre) else { continue };
            let nearby = self.grid.around(pos);
            if nearby.len() < 4 {
                continue;
            }
            let pick = rand::seq::index::sample(rng, nearby.len(), 3);
            let triple = [nearby[pick.index(0)], nearby[pick.index(1)], nearby[pick.index(2)]];
            if let Some(w) = self.make_wedge(triple, crust) {
                if self.is_valid(&w, crust) {
                    return Ok(w);
                }
            }
        }
        Err(TectonicError::Triangulation(format!(
            "no empty seed wedge in {} attempts",
            MAX_BOOTSTRAP_ATTEMPTS
        )))
    }

    fn make_wedge(&self, ids: [PointId; 3], crust: &Crust) -> Option<Wedge> {
        let pos = [crust.pos(ids[0])?, crust.pos(ids[1])?, crust.pos(ids[2])?];
        Wedge::new(ids, pos, self.planet_radius)
    }

    /// Grow the mesh from the active wedges until every edge is closed
    fn expand(&mut self, crust: &Crust, mut active: Vec<usize>) -> std::result::Result<Expansion, ConsistencyError> {
        let mut added = 0;
        let mut next = 0;
        while next < active.len() {
            let w = active[next];
            let edges = self.wedges[w].edges();
            for (a, b) in edges {
                if self.links.count(a, b) >= MAX_EDGE_COUNT {
                    continue;
                }
                let closed = match self.close_edge(crust, w, a, b, false)? {
                    Some(i) => Some(i),
                    None => self.close_edge(crust, w, a, b, true)?,
                };
                if let Some(i) = closed {
                    active.push(i);
                    added += 1;
                }
            }
            if self.is_open(w) {
                return Ok(Expansion::Stuck { wedge: w });
            }
            next += 1;
        }
        Ok(Expansion::Closed { added })
    }

    /// Add the wedge on the far side of edge `a`-`b` of wedge `w`
    ///
    /// Candidates come from the grid cells around the edge, or from every
    /// point when `wide` is set, and are tried nearest to the edge first.
    fn close_edge(
        &mut self,
        crust: &Crust,
        w: usize,
        a: PointId,
        b: PointId,
        wide: bool,
    ) -> std::result::Result<Option<usize>, ConsistencyError> {
        let (Some(pa), Some(pb)) = (crust.pos(a), crust.pos(b)) else {
            return Ok(None);
        };
        let third = self.wedges[w].opposite(a, b);
        let plane = pa.cross(pb);
        let third_side = third
            .and_then(|t| crust.pos(t))
            .map_or(0.0, |pt| plane.dot(pt).signum());
        let mid = (pa + pb) * 0.5;

        let pool = if wide {
            crust.point_ids()
        } else {
            self.grid.around_pair(pa, pb)
        };
        let mut candidates: Vec<(f64, PointId, DVec3)> = pool
            .into_iter()
            .filter(|&c| c != a && c != b && Some(c) != third)
            .filter(|&c| {
                self.links.count(a, c) < MAX_EDGE_COUNT && self.links.count(b, c) < MAX_EDGE_COUNT
            })
            .filter_map(|c| crust.pos(c).map(|pc| (pc.distance_squared(mid), c, pc)))
            .filter(|&(_, _, pc)| plane.dot(pc).signum() != third_side)
            .collect();
        candidates.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));

        for (_, c, pc) in candidates {
            let Some(wedge) = Wedge::new([a, b, c], [pa, pb, pc], self.planet_radius) else {
                continue;
            };
            if self.is_valid(&wedge, crust) {
                return self.add_wedge(wedge).map(Some);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::plate::Plate;
    use crate::point::Point;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const R: f64 = 1000.0;

    /// Roughly uniform points from a jittered Fibonacci lattice
    fn sphere_crust(n: usize, seed: u64) -> Crust {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut crust = Crust::new();
        let plate = crust.add_plate(Plate::new(DVec3::Y * R, Rgb::WHITE, 0.0));
        let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
        for i in 0..n {
            let y = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
            let r = (1.0 - y * y).sqrt();
            let theta = golden * i as f64 + rng.gen_range(-0.05..0.05);
            let v = DVec3::new(theta.cos() * r, y, theta.sin() * r).normalize() * R;
            crust.add_point(Point::new(v, plate, 1.0, 0)).unwrap();
        }
        crust
    }

    fn spacing(n: usize) -> f64 {
        (4.0 * std::f64::consts::PI * R * R / n as f64).sqrt()
    }

    fn assert_delaunay(mesh: &Mesh, crust: &Crust) {
        for w in mesh.wedges() {
            for (id, p) in crust.points() {
                assert!(
                    w.uses(id) || !w.contains(p.pos),
                    "{} inside circumsphere of {:?}",
                    id,
                    w.points
                );
            }
        }
    }

    #[test]
    fn test_rebuild_is_closed_and_euler() {
        let n = 300;
        let crust = sphere_crust(n, 1);
        let mut mesh = Mesh::new(R, spacing(n));
        mesh.rebuild(&crust, &mut ChaCha8Rng::seed_from_u64(2)).unwrap();

        mesh.check_closed().unwrap();
        // V - E + F = 2 on a sphere
        assert_eq!(mesh.wedges().len(), 2 * n - 4);
        assert_eq!(mesh.links().len(), 3 * n - 6);
        assert_delaunay(&mesh, &crust);
    }

    #[test]
    fn test_areas_sum_to_mesh_area() {
        let n = 200;
        let mut crust = sphere_crust(n, 3);
        let mut mesh = Mesh::new(R, spacing(n));
        mesh.rebuild(&crust, &mut ChaCha8Rng::seed_from_u64(4)).unwrap();
        let total = mesh.apply_areas(&mut crust);
        let sum: f64 = crust.points().map(|(_, p)| p.area).sum();
        assert!((total - sum).abs() < 1e-6 * total);
        // Flat facets slightly undershoot the sphere
        let sphere = 4.0 * std::f64::consts::PI * R * R;
        assert!(total < sphere && total > 0.95 * sphere);
    }

    #[test]
    fn test_repair_after_motion() {
        let n = 250;
        let mut crust = sphere_crust(n, 5);
        let mut mesh = Mesh::new(R, spacing(n));
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        mesh.rebuild(&crust, &mut rng).unwrap();

        // Rotate the northern cap so it shears against the rest
        let rot = glam::DMat3::from_axis_angle(DVec3::Y, 0.15);
        for (_, p) in crust.points_mut() {
            if p.pos.y > 0.3 * R {
                p.pos = rot * p.pos;
            }
        }
        mesh.repair(&crust, &mut rng).unwrap();
        mesh.check_closed().unwrap();
        assert_eq!(mesh.wedges().len(), 2 * n - 4);
        assert_delaunay(&mesh, &crust);
    }

    #[test]
    fn test_repair_after_insert_and_remove() {
        let n = 250;
        let mut crust = sphere_crust(n, 7);
        let mut mesh = Mesh::new(R, spacing(n));
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        mesh.rebuild(&crust, &mut rng).unwrap();

        let victim = PointId(100);
        mesh.remove_point(victim, &crust);
        crust.kill_point(victim).unwrap();

        // Insert a point at the middle of an edge
        let ((a, b), _) = mesh.links().iter().next().unwrap();
        let mid = ((crust.pos(a).unwrap() + crust.pos(b).unwrap()) * 0.5).normalize() * R;
        let plate = crust.point(a).unwrap().plate;
        crust.add_point(Point::new(mid, plate, 1.0, 0)).unwrap();

        mesh.repair(&crust, &mut rng).unwrap();
        mesh.check_closed().unwrap();
        assert_eq!(mesh.wedges().len(), 2 * n - 4);
        assert_delaunay(&mesh, &crust);
    }

    #[test]
    fn test_wedge_at_finds_facet() {
        let n = 150;
        let crust = sphere_crust(n, 9);
        let mut mesh = Mesh::new(R, spacing(n));
        mesh.rebuild(&crust, &mut ChaCha8Rng::seed_from_u64(10)).unwrap();

        let query = DVec3::new(0.3, -0.2, 0.9).normalize() * R;
        let i = mesh.wedge_at(query).unwrap();
        assert!(mesh.wedges()[i].strictly_contains(query));
    }

    #[test]
    fn test_too_few_points() {
        let mut crust = Crust::new();
        let plate = crust.add_plate(Plate::new(DVec3::Y, Rgb::WHITE, 0.0));
        for v in [DVec3::X, DVec3::Y, DVec3::Z] {
            crust.add_point(Point::new(v * R, plate, 1.0, 0)).unwrap();
        }
        let mut mesh = Mesh::new(R, 300.0);
        let err = mesh.rebuild(&crust, &mut ChaCha8Rng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, TectonicError::Triangulation(_)));
    }
}
