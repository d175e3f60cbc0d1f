//! The simulated world and its epoch pipeline

use std::f64::consts::PI;
use std::path::Path;

use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, info, warn};

use crate::color::{ColorMap, ColorMapper, Rgb};
use crate::config::{WorldConfig, WorldConfigBuilder};
use crate::crust::Crust;
use crate::erosion::{self, ErosionOutcome};
use crate::error::{Result, TectonicError};
use crate::geology::{self, cross_plate_links};
use crate::kinematics::{apply_force, move_plate, recenter};
use crate::links::LinkSystem;
use crate::mantle::{self, random_unit_vector, update_mantle_force, Upwelling};
use crate::persistence::{self, PointRecord, Snapshot};
use crate::plate::{Plate, PlateId};
use crate::point::{Point, PointId};
use crate::sealevel;
use crate::stress;
use crate::triangulation::{Mesh, RepairOutcome, Wedge};

#[cfg(feature = "spatial-index")]
use crate::spatial::PointIndex;

/// Highest density tweak given to a new plate
const MAX_DENSITY_TWEAK: f64 = 0.15;

/// Largest random offset of an initial point from its ring position, degrees
const MAX_JITTER: f64 = 1.0;

/// Thickness of the crust on an initial continental plate, km
const CONTINENT_THICKNESS: f64 = 20.8;

/// Density of the crust on an initial continental plate
const CONTINENT_DENSITY: f64 = 2.6;

/// Everything that happened during one epoch
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpochReport {
    /// The epoch that was simulated
    pub epoch: i32,
    /// Plates split because they came apart
    pub fragmentations: usize,
    /// Landmasses moved onto another plate
    pub obductions: usize,
    /// Boundaries crumpled by colliding continents
    pub deformations: usize,
    /// Points destroyed by subduction
    pub subductions: usize,
    /// Points created by rifting
    pub rifted_points: usize,
    /// Plates split by the stress solver
    pub stress_splits: usize,
    /// Links broken by the stress solver
    pub broken_links: usize,
    /// Times the stress solver had to raise a breaking threshold
    pub stress_retries: usize,
    /// Enclosed plates captured by their neighbour
    pub captures: usize,
    /// Tiny plates merged into a neighbour
    pub accretions: usize,
    /// Huge plates cut in two
    pub huge_splits: usize,
    /// The mesh had to be rebuilt from scratch
    pub rebuilt_mesh: bool,
    /// Rock destroyed by subduction, km³
    pub subducted_volume: f64,
    /// Volcanic rock added over subduction zones, km³
    pub volcanic_volume: f64,
    /// Rock change from rescaling deformed columns, km³
    pub deformation_volume: f64,
    /// New ocean floor created by rifting, km³
    pub rifted_volume: f64,
    /// Rock change from the new point areas after the mesh repair, km³
    ///
    /// Points that moved or lost neighbours cover a different share of
    /// the surface afterwards; rifted points are counted separately.
    pub remesh_volume: f64,
    /// Erosion, smoothing and melting totals
    pub erosion: ErosionOutcome,
    /// Sea level at the end of the epoch, km
    pub sea_level: f64,
}

impl EpochReport {
    /// Net rock volume change of the epoch, summed over every process
    /// that adds or removes rock
    ///
    /// Erosion and smoothing only move rock around and do not count.
    pub fn volume_change(&self) -> f64 {
        self.volcanic_volume + self.deformation_volume + self.rifted_volume + self.remesh_volume
            - self.subducted_volume
            - self.erosion.melted
    }
}

/// A planet of moving crust plates
///
/// # Example
///
/// ```
/// use tectonic_planet::*;
///
/// let config = WorldConfigBuilder::new()
///     .seed(3)
///     .point_spacing(1200.0)
///     .unwrap()
///     .plate_count(4)
///     .unwrap()
///     .build()
///     .unwrap();
///
/// let mut world = World::new(config).unwrap();
/// let report = world.step().unwrap();
/// assert_eq!(report.epoch, 0);
/// assert_eq!(world.epoch(), 1);
/// world.check_invariants().unwrap();
/// ```
#[derive(Clone)]
pub struct World {
    config: WorldConfig,
    crust: Crust,
    mesh: Mesh,
    upwellings: Vec<Upwelling>,
    color_map: ColorMap,
    sea_level: f64,
    surface_area: f64,
    epoch: i32,
    rng: ChaCha8Rng,
    #[cfg(feature = "spatial-index")]
    index: PointIndex,
}

impl World {
    /// Build a fresh planet
    ///
    /// Plates are scattered at random; crust points are laid out on
    /// latitude rings and join the nearest plate. Each plate is oceanic with
    /// the configured probability, continental otherwise.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a configuration without plates, `Triangulation`
    /// if the initial mesh cannot be built.
    pub fn new(config: WorldConfig) -> Result<Self> {
        if config.plate_count == 0 {
            return Err(TectonicError::InvalidConfig("a world needs at least one plate".into()));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let radius = config.planet_radius;
        let spacing = config.point_spacing;

        let mut crust = Crust::new();
        for _ in 0..config.plate_count {
            let center = random_unit_vector(&mut rng) * radius;
            let tweak = rng.gen_range(0.0..MAX_DENSITY_TWEAK);
            crust.add_plate(Plate::with_random_color(center, tweak, &mut rng));
        }
        let centers: Vec<(PlateId, DVec3)> = crust.plates().map(|(id, p)| (id, p.center)).collect();

        let rings = ((2.0 * PI * radius / (2.0 * spacing)).floor() as usize).max(1);
        for k in 0..=rings {
            let lat = -90.0 + 180.0 * k as f64 / rings as f64;
            let circumference = 2.0 * PI * radius * lat.to_radians().cos();
            let count = (circumference / spacing).max(0.0).floor() as usize;
            for i in 0..=count {
                let lon = i as f64 / (count + 1) as f64 * 360.0;
                let jlat = rng.gen_range(-MAX_JITTER..MAX_JITTER);
                let jlon = rng.gen_range(-MAX_JITTER..MAX_JITTER);
                let lat = (lat + jlat).clamp(-90.0, 90.0);
                let mut point = Point::from_lat_lon(lat, lon + jlon, radius, centers[0].0, spacing / 2.0, 0);
                point.plate = nearest_center(&centers, point.pos);
                crust.add_point(point)?;
            }
        }

        for (id, _) in &centers {
            let ocean = rng.gen::<f64>() < config.ocean_plate_probability;
            let Some(plate) = crust.plate(*id) else {
                continue;
            };
            let (members, tweak) = (plate.points.clone(), plate.density_tweak);
            for p in members {
                let point = crust.get_mut(p)?;
                if ocean {
                    point.make_new_ocean_floor(tweak);
                } else {
                    let thickness = CONTINENT_THICKNESS * (0.9 + 0.1 * rng.gen::<f64>());
                    point.add_rock(p, thickness, CONTINENT_DENSITY)?;
                }
            }
        }
        let dropped = crust.drop_empty_plates();
        if dropped > 0 {
            debug!(dropped, "plates without points dropped");
        }

        let mut upwellings = vec![Upwelling::new(DVec3::ZERO); config.mantle_point_count];
        mantle::randomize_upwellings(&mut upwellings, radius, &mut rng);

        let world = Self::assemble(config, crust, upwellings, ColorMap::default(), 0, rng)?;
        info!(
            points = world.point_count(),
            plates = world.plate_count(),
            sea_level = world.sea_level,
            "world created"
        );
        Ok(world)
    }

    /// Derive everything that is not persisted: plate centers, the mesh,
    /// areas, mantle forces, sea level, colors and the point index
    fn assemble(
        config: WorldConfig,
        mut crust: Crust,
        upwellings: Vec<Upwelling>,
        color_map: ColorMap,
        epoch: i32,
        mut rng: ChaCha8Rng,
    ) -> Result<Self> {
        for id in crust.plate_ids() {
            recenter(&mut crust, id)?;
        }
        let mut mesh = Mesh::new(config.planet_radius, config.point_spacing);
        mesh.rebuild(&crust, &mut rng)?;
        let surface_area = mesh.apply_areas(&mut crust);
        for id in crust.plate_ids() {
            recenter(&mut crust, id)?;
        }
        for (_, p) in crust.points_mut() {
            p.valid = true;
            update_mantle_force(&upwellings, p);
        }

        let mut world = Self {
            config,
            #[cfg(feature = "spatial-index")]
            index: PointIndex::new(&crust),
            crust,
            mesh,
            upwellings,
            color_map,
            sea_level: 0.0,
            surface_area,
            epoch,
            rng,
        };
        world.update_sea_level();
        world.update_colors();
        Ok(world)
    }

    /// Load a world saved by [`World::save`]
    ///
    /// The file is read and validated completely before anything is built.
    /// The random source is seeded from the file's contents, so stepping a
    /// loaded world is reproducible.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `CorruptSnapshot` if its contents
    /// are truncated or invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let snapshot = persistence::load(path.as_ref())?;
        Self::from_snapshot(&snapshot)
    }

    /// Build a world from a decoded snapshot
    ///
    /// Water volume and ocean plate probability take their defaults; plate
    /// colors are random and density tweaks are zero since neither is
    /// persisted.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self> {
        let seed = ((snapshot.epoch as u32 as u64) << 32) | snapshot.points.len() as u64;
        let config = WorldConfigBuilder::new()
            .seed(seed)
            .plate_count(snapshot.plate_count.max(1) as usize)
            .and_then(|b| b.mantle_point_count(snapshot.upwellings.len()))
            .and_then(|b| b.planet_radius(snapshot.planet_radius))
            .and_then(|b| b.point_spacing(snapshot.point_spacing as f64))
            .and_then(|b| b.build())
            .map_err(|e| TectonicError::CorruptSnapshot(e.to_string()))?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut crust = Crust::new();
        let plates: Vec<PlateId> = (0..snapshot.plate_count)
            .map(|_| crust.add_plate(Plate::with_random_color(DVec3::ZERO, 0.0, &mut rng)))
            .collect();
        for record in &snapshot.points {
            let plate = plates
                .get(record.plate as usize)
                .copied()
                .ok_or_else(|| TectonicError::CorruptSnapshot(format!("unknown plate {}", record.plate)))?;
            let mut point = Point::new(record.pos, plate, record.size, record.creation_epoch);
            point.bulk_density = record.bulk_density;
            point.base_depth_offset = record.base_depth_offset;
            point.thickness = record.thickness;
            point.density = record.density;
            crust.add_point(point)?;
        }
        crust.drop_empty_plates();

        let world = Self::assemble(
            config,
            crust,
            snapshot.upwellings.clone(),
            snapshot.color_map.clone(),
            snapshot.epoch,
            rng,
        )?;
        info!(points = world.point_count(), plates = world.plate_count(), epoch = world.epoch, "world restored");
        Ok(world)
    }

    /// The persisted state of the world
    ///
    /// Plates are renumbered densely in id order; the point spacing is
    /// rounded to whole kilometres.
    pub fn snapshot(&self) -> Snapshot {
        let plate_ids = self.crust.plate_ids();
        let points = self
            .crust
            .points()
            .map(|(_, p)| PointRecord {
                pos: p.pos,
                creation_epoch: p.creation_epoch,
                size: p.size,
                plate: plate_ids.binary_search(&p.plate).map_or(0, |i| i as u32),
                bulk_density: p.bulk_density,
                base_depth_offset: p.base_depth_offset,
                thickness: p.thickness,
                density: p.density,
            })
            .collect();
        Snapshot {
            epoch: self.epoch,
            planet_radius: self.config.planet_radius,
            point_spacing: (self.config.point_spacing.round() as i32).max(1),
            upwellings: self.upwellings.clone(),
            color_map: self.color_map.clone(),
            plate_count: plate_ids.len() as u32,
            points,
        }
    }

    /// Save the world to `path`, keeping the previous file as `<path>.bak`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        persistence::save(&self.snapshot(), path.as_ref())
    }

    /// Advance the simulation by one epoch
    ///
    /// # Errors
    ///
    /// Any error is fatal: the world is left part way through the epoch and
    /// must not be stepped again. The error is logged before it is returned.
    pub fn step(&mut self) -> Result<EpochReport> {
        let epoch = self.epoch;
        self.advance().inspect_err(|err| self.log_fatal(epoch, err))
    }

    fn log_fatal(&self, epoch: i32, err: &TectonicError) {
        if err.is_fatal() {
            error!(
                epoch,
                points = self.crust.point_count(),
                plates = self.crust.plate_count(),
                error = %err,
                "world is inconsistent"
            );
        }
    }

    fn advance(&mut self) -> Result<EpochReport> {
        let mut report = EpochReport {
            epoch: self.epoch,
            ..Default::default()
        };
        let radius = self.config.planet_radius;

        self.crust.drop_empty_plates();
        for (_, p) in self.crust.points_mut() {
            update_mantle_force(&self.upwellings, p);
        }
        report.fragmentations = geology::split_disconnected_plates(&mut self.crust, self.mesh.links(), &mut self.rng)?;

        debug!(epoch = self.epoch, "moving plates");
        self.move_plates()?;
        for (a, b) in cross_plate_links(&self.crust, self.mesh.links()) {
            for p in [a, b] {
                self.crust.get_mut(p)?.valid = false;
            }
        }

        debug!(epoch = self.epoch, "colliding plates");
        let landmasses = geology::find_landmasses(&mut self.crust, self.mesh.links());
        let collisions = geology::collide(&mut self.crust, &self.mesh, &landmasses, radius)?;
        report.obductions = collisions.obductions;
        report.deformations = collisions.deformations;
        report.deformation_volume = collisions.deformation_volume;
        let subduction = geology::subduct(&mut self.crust, &mut self.mesh, &collisions.subductions)?;
        report.subductions = subduction.subducted;
        report.subducted_volume = subduction.volume_lost;
        report.volcanic_volume = subduction.volcanic_volume;
        geology::decay_base_depth(&mut self.crust);
        let rifted = geology::rift(
            &mut self.crust,
            self.mesh.links(),
            &self.upwellings,
            radius,
            self.config.point_spacing,
            self.epoch,
        )?;
        report.rifted_points = rifted.len();

        debug!(epoch = self.epoch, "repairing mesh");
        let volume = self.crust.rock_volume();
        self.remesh(&mut report)?;
        report.rifted_volume = rifted.iter().filter_map(|&p| self.crust.point(p)).map(Point::volume).sum();
        report.remesh_volume = self.crust.rock_volume() - volume - report.rifted_volume;
        self.update_sea_level();

        debug!(epoch = self.epoch, "relaxing stress");
        let stress = stress::solve(&mut self.crust, self.mesh.links_mut(), &mut self.rng)?;
        report.stress_splits = stress.splits;
        report.broken_links = stress.broken_links;
        report.stress_retries = stress.retries;

        report.captures = geology::capture_enclosed_plates(&mut self.crust, self.mesh.links_mut())?;
        report.accretions = geology::accrete_tiny_plates(&mut self.crust, self.mesh.links_mut())?;
        report.huge_splits = geology::split_huge_plates(&mut self.crust, &mut self.rng)?;

        debug!(epoch = self.epoch, "eroding");
        self.update_sea_level();
        let links = self.mesh.links();
        report.erosion = erosion::erode(&mut self.crust, links, self.sea_level, self.surface_area)?;
        report.erosion += erosion::smooth(&mut self.crust, links, self.sea_level, &mut self.rng)?;
        report.erosion += erosion::melt_roots(&mut self.crust)?;
        self.update_sea_level();
        self.update_colors();

        self.crust.check_finite()?;
        #[cfg(feature = "spatial-index")]
        {
            self.index = PointIndex::new(&self.crust);
        }
        report.sea_level = self.sea_level;
        self.epoch += 1;
        info!(
            epoch = report.epoch,
            points = self.crust.point_count(),
            plates = self.crust.plate_count(),
            sea_level = self.sea_level,
            "epoch finished"
        );
        Ok(report)
    }

    /// Push every plate with the mantle drag and collision forces on its
    /// points, then move it
    fn move_plates(&mut self) -> Result<()> {
        for id in self.crust.plate_ids() {
            let Some(plate) = self.crust.plate(id) else {
                continue;
            };
            let forces: Vec<(DVec3, DVec3, DVec3)> = plate
                .points
                .iter()
                .filter_map(|&p| self.crust.point(p))
                .map(|p| (p.pos, p.mantle_force, p.collision_force))
                .collect();
            let plate = self.crust.get_plate_mut(id)?;
            for (pos, mantle_force, collision_force) in forces {
                apply_force(plate, pos, mantle_force);
                apply_force(plate, pos, collision_force);
            }
            move_plate(&mut self.crust, id)?;
            self.crust.get_plate_mut(id)?.reset_forces();
        }
        Ok(())
    }

    /// Repair the mesh around moved, new and destroyed points and refresh
    /// the point areas
    fn remesh(&mut self, report: &mut EpochReport) -> Result<()> {
        match self.mesh.repair(&self.crust, &mut self.rng)? {
            RepairOutcome::Repaired { removed, added } => debug!(removed, added, "mesh repaired"),
            RepairOutcome::Rebuilt => {
                warn!(epoch = self.epoch, "mesh rebuilt from scratch");
                report.rebuilt_mesh = true;
            }
        }
        self.mesh.check_closed()?;
        self.surface_area = self.mesh.apply_areas(&mut self.crust);
        for (_, p) in self.crust.points_mut() {
            p.valid = true;
        }
        Ok(())
    }

    fn update_sea_level(&mut self) {
        self.sea_level = sealevel::sea_level(&self.crust, self.config.water_volume);
    }

    /// Color points by height above sea level and links by their ends
    fn update_colors(&mut self) {
        for (_, p) in self.crust.points_mut() {
            p.color = self.color_map.map(p.height_above(self.sea_level));
        }
        let crust = &self.crust;
        for ((a, b), link) in self.mesh.links_mut().iter_mut() {
            if let (Some(pa), Some(pb)) = (crust.point(a), crust.point(b)) {
                link.color = pa.color.average(pb.color);
            }
        }
    }

    /// Scatter the mantle upwellings at new random sites
    pub fn randomize_upwellings(&mut self) {
        mantle::randomize_upwellings(&mut self.upwellings, self.config.planet_radius, &mut self.rng);
        info!("mantle upwellings moved");
    }

    /// Move the mantle upwellings under thick continental crust
    pub fn break_up_supercontinents(&mut self) {
        mantle::break_up_supercontinents(&mut self.upwellings, &self.crust, self.config.planet_radius, &mut self.rng);
        info!("mantle upwellings moved under the continents");
    }

    /// Verify the plate partition, the closed mesh and finite positions
    ///
    /// # Errors
    ///
    /// The first broken invariant found, as a fatal `Consistency` error.
    pub fn check_invariants(&self) -> Result<()> {
        self.crust
            .check_partition()
            .and_then(|_| self.mesh.check_closed())
            .and_then(|_| self.crust.check_finite())
            .map_err(TectonicError::from)
            .inspect_err(|err| self.log_fatal(self.epoch, err))
    }

    /// Total rock volume of the crust, km³
    pub fn rock_volume(&self) -> f64 {
        self.crust.rock_volume()
    }

    #[inline]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Number of epochs simulated so far
    #[inline]
    pub fn epoch(&self) -> i32 {
        self.epoch
    }

    #[inline]
    pub fn planet_radius(&self) -> f64 {
        self.config.planet_radius
    }

    #[inline]
    pub fn point_spacing(&self) -> f64 {
        self.config.point_spacing
    }

    /// Current sea level relative to the datum, km
    #[inline]
    pub fn sea_level(&self) -> f64 {
        self.sea_level
    }

    /// Summed area of all points, km²
    #[inline]
    pub fn surface_area(&self) -> f64 {
        self.surface_area
    }

    #[inline]
    pub fn crust(&self) -> &Crust {
        &self.crust
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.crust.point_count()
    }

    #[inline]
    pub fn point(&self, id: PointId) -> Option<&Point> {
        self.crust.point(id)
    }

    pub fn points(&self) -> impl Iterator<Item = (PointId, &Point)> + '_ {
        self.crust.points()
    }

    #[inline]
    pub fn plate_count(&self) -> usize {
        self.crust.plate_count()
    }

    #[inline]
    pub fn plate(&self, id: PlateId) -> Option<&Plate> {
        self.crust.plate(id)
    }

    pub fn plates(&self) -> impl Iterator<Item = (PlateId, &Plate)> + '_ {
        self.crust.plates()
    }

    #[inline]
    pub fn wedges(&self) -> &[Wedge] {
        self.mesh.wedges()
    }

    #[inline]
    pub fn links(&self) -> &LinkSystem {
        self.mesh.links()
    }

    #[inline]
    pub fn upwellings(&self) -> &[Upwelling] {
        &self.upwellings
    }

    #[inline]
    pub fn color_map(&self) -> &ColorMap {
        &self.color_map
    }

    /// Replace the color map and recolor the planet
    pub fn set_color_map(&mut self, color_map: ColorMap) {
        self.color_map = color_map;
        self.update_colors();
    }

    /// Display color of a point, as of the last completed epoch
    pub fn point_color(&self, id: PointId) -> Option<Rgb> {
        self.crust.point(id).map(|p| p.color)
    }

    /// Color of a point under another color mapper
    pub fn point_color_with<M: ColorMapper>(&self, id: PointId, mapper: &M) -> Option<Rgb> {
        self.height_above_sea_level(id).map(|h| mapper.map_color(h))
    }

    pub fn height_above_sea_level(&self, id: PointId) -> Option<f64> {
        self.crust.point(id).map(|p| p.height_above(self.sea_level))
    }

    /// Mantle flow velocity at an arbitrary position
    pub fn mantle_flow_at(&self, pos: DVec3) -> DVec3 {
        mantle::flow_at(&self.upwellings, pos)
    }

    /// Index of the wedge lying under `pos`
    pub fn wedge_at(&self, pos: DVec3) -> Option<usize> {
        self.mesh.wedge_at(pos)
    }

    /// The point closest to `pos`
    ///
    /// # Example
    ///
    /// ```
    /// use tectonic_planet::*;
    /// use glam::DVec3;
    ///
    /// let config = WorldConfigBuilder::new()
    ///     .seed(1)
    ///     .point_spacing(1500.0)
    ///     .unwrap()
    ///     .build()
    ///     .unwrap();
    /// let world = World::new(config).unwrap();
    ///
    /// let id = world.nearest_point(DVec3::Y * 7000.0).unwrap();
    /// let pos = world.point(id).unwrap().pos;
    /// assert!(pos.y > 0.0);
    /// ```
    pub fn nearest_point(&self, pos: DVec3) -> Option<PointId> {
        #[cfg(feature = "spatial-index")]
        {
            self.index.find_nearest(pos)
        }
        #[cfg(not(feature = "spatial-index"))]
        {
            let closest = |ids: &mut dyn Iterator<Item = PointId>| {
                ids.filter_map(|id| self.crust.pos(id).map(|p| (id, p.distance_squared(pos))))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(id, _)| id)
            };
            let nearby = self.mesh.points_near(pos);
            closest(&mut nearby.into_iter()).or_else(|| closest(&mut self.crust.point_ids().into_iter()))
        }
    }

    /// Area (km²) per height band above sea level
    ///
    /// `bins` equal bands span `low..high`; heights outside the range are
    /// counted in the first or last band.
    pub fn elevation_histogram(&self, bins: usize, low: f64, high: f64) -> Vec<f64> {
        let mut histogram = vec![0.0; bins];
        if bins == 0 || !(high > low) {
            return histogram;
        }
        let width = (high - low) / bins as f64;
        for (_, p) in self.crust.points() {
            let h = p.height_above(self.sea_level);
            let bin = ((h - low) / width).floor().clamp(0.0, (bins - 1) as f64) as usize;
            histogram[bin] += p.area;
        }
        histogram
    }
}

fn nearest_center(centers: &[(PlateId, DVec3)], pos: DVec3) -> PlateId {
    centers
        .iter()
        .min_by(|a, b| a.1.distance_squared(pos).total_cmp(&b.1.distance_squared(pos)))
        .map_or(PlateId(0), |&(id, _)| id)
}
