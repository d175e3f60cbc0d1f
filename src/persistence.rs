//! Binary world snapshots
//!
//! All numbers are big-endian: 32-bit signed integers and IEEE-754 doubles.
//!
//! ```text
//! epoch i32, planet radius f64, point spacing i32
//! upwelling count i32, then per upwelling: strength f64, x f64, y f64, z f64
//! color stop count i32, then per stop: value f64, ARGB i32
//! plate count i32
//! point count i32, then per point:
//!     x f64, y f64, z f64, creation epoch i32, size f64, plate index i32,
//!     bulk density f64, base depth offset f64, thickness f64, density f64
//! ```
//!
//! Only the persisted fields are kept; everything else (mesh, areas, sea
//! level, colors) is re-derived when a world is built from a snapshot.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use glam::DVec3;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::color::{ColorMap, Rgb};
use crate::error::{Result, TectonicError};
use crate::mantle::Upwelling;

/// Counts above this are treated as corruption rather than allocated
const MAX_COUNT: i32 = 1 << 26;

/// Persisted fields of one point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRecord {
    pub pos: DVec3,
    pub creation_epoch: i32,
    pub size: f64,
    /// Index into the snapshot's dense plate numbering
    pub plate: u32,
    pub bulk_density: f64,
    pub base_depth_offset: f64,
    pub thickness: f64,
    pub density: f64,
}

/// Everything a world needs to be rebuilt
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub epoch: i32,
    pub planet_radius: f64,
    pub point_spacing: i32,
    pub upwellings: Vec<Upwelling>,
    pub color_map: ColorMap,
    pub plate_count: u32,
    pub points: Vec<PointRecord>,
}

fn write_i32<W: Write>(w: &mut W, v: i32) -> io::Result<()> {
    w.write_all(&v.to_be_bytes())
}

fn write_f64<W: Write>(w: &mut W, v: f64) -> io::Result<()> {
    w.write_all(&v.to_be_bytes())
}

fn write_vec<W: Write>(w: &mut W, v: DVec3) -> io::Result<()> {
    write_f64(w, v.x)?;
    write_f64(w, v.y)?;
    write_f64(w, v.z)
}

fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_f64<R: Read>(r: &mut R) -> io::Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_be_bytes(buf))
}

fn read_vec<R: Read>(r: &mut R) -> io::Result<DVec3> {
    Ok(DVec3::new(read_f64(r)?, read_f64(r)?, read_f64(r)?))
}

fn count_to_i32(what: &str, n: usize) -> Result<i32> {
    i32::try_from(n).map_err(|_| TectonicError::InvalidConfig(format!("too many {what} to save: {n}")))
}

fn read_count<R: Read>(r: &mut R, what: &str) -> Result<usize> {
    let n = read_i32(r)?;
    if !(0..=MAX_COUNT).contains(&n) {
        return Err(TectonicError::CorruptSnapshot(format!("{what} count {n}")));
    }
    Ok(n as usize)
}

fn corrupt(msg: String) -> TectonicError {
    TectonicError::CorruptSnapshot(msg)
}

impl Snapshot {
    /// Encode the snapshot
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<()> {
        write_i32(&mut w, self.epoch)?;
        write_f64(&mut w, self.planet_radius)?;
        write_i32(&mut w, self.point_spacing)?;

        write_i32(&mut w, count_to_i32("upwellings", self.upwellings.len())?)?;
        for up in &self.upwellings {
            write_f64(&mut w, up.strength)?;
            write_vec(&mut w, up.pos)?;
        }

        write_i32(&mut w, count_to_i32("color stops", self.color_map.len())?)?;
        for &(value, color) in self.color_map.stops() {
            write_f64(&mut w, value)?;
            write_i32(&mut w, color.to_argb())?;
        }

        write_i32(&mut w, count_to_i32("plates", self.plate_count as usize)?)?;

        write_i32(&mut w, count_to_i32("points", self.points.len())?)?;
        for p in &self.points {
            write_vec(&mut w, p.pos)?;
            write_i32(&mut w, p.creation_epoch)?;
            write_f64(&mut w, p.size)?;
            write_i32(&mut w, count_to_i32("plates", p.plate as usize)?)?;
            write_f64(&mut w, p.bulk_density)?;
            write_f64(&mut w, p.base_depth_offset)?;
            write_f64(&mut w, p.thickness)?;
            write_f64(&mut w, p.density)?;
        }
        w.flush()?;
        Ok(())
    }

    /// Decode and validate a snapshot
    ///
    /// # Errors
    ///
    /// `CorruptSnapshot` for a truncated stream or values no world could
    /// have written, `Io` for any other read failure.
    pub fn read_from<R: Read>(mut r: R) -> Result<Self> {
        Self::decode(&mut r).map_err(|e| match e {
            TectonicError::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
                corrupt("file ends early".to_string())
            }
            other => other,
        })
    }

    fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let epoch = read_i32(r)?;
        let planet_radius = read_f64(r)?;
        if !(planet_radius.is_finite() && planet_radius > 0.0) {
            return Err(corrupt(format!("planet radius {planet_radius}")));
        }
        let point_spacing = read_i32(r)?;
        if point_spacing <= 0 {
            return Err(corrupt(format!("point spacing {point_spacing}")));
        }

        let n = read_count(r, "upwelling")?;
        let mut upwellings = Vec::with_capacity(n.min(1024));
        for i in 0..n {
            let strength = read_f64(r)?;
            let pos = read_vec(r)?;
            if !strength.is_finite() || !pos.is_finite() {
                return Err(corrupt(format!("upwelling {i} is not finite")));
            }
            upwellings.push(Upwelling { pos, strength });
        }

        let n = read_count(r, "color stop")?;
        let mut color_map = ColorMap::empty();
        for i in 0..n {
            let value = read_f64(r)?;
            let argb = read_i32(r)?;
            if !value.is_finite() {
                return Err(corrupt(format!("color stop {i} is not finite")));
            }
            color_map.add(value, Rgb::from_argb(argb));
        }

        let plate_count = read_count(r, "plate")? as u32;

        let n = read_count(r, "point")?;
        let mut points = Vec::with_capacity(n.min(1 << 16));
        for i in 0..n {
            let pos = read_vec(r)?;
            let creation_epoch = read_i32(r)?;
            let size = read_f64(r)?;
            let plate = read_i32(r)?;
            let record = PointRecord {
                pos,
                creation_epoch,
                size,
                plate: u32::try_from(plate).map_err(|_| corrupt(format!("point {i} has plate {plate}")))?,
                bulk_density: read_f64(r)?,
                base_depth_offset: read_f64(r)?,
                thickness: read_f64(r)?,
                density: read_f64(r)?,
            };
            validate_point(i, &record, plate_count)?;
            points.push(record);
        }
        Ok(Self {
            epoch,
            planet_radius,
            point_spacing,
            upwellings,
            color_map,
            plate_count,
            points,
        })
    }
}

fn validate_point(i: usize, p: &PointRecord, plate_count: u32) -> Result<()> {
    if p.plate >= plate_count {
        return Err(corrupt(format!("point {i} has plate {} of {plate_count}", p.plate)));
    }
    if !p.pos.is_finite() || p.pos.length_squared() == 0.0 {
        return Err(corrupt(format!("point {i} has position {}", p.pos)));
    }
    let scalars = [p.size, p.bulk_density, p.base_depth_offset, p.thickness, p.density];
    if scalars.iter().any(|v| !v.is_finite()) {
        return Err(corrupt(format!("point {i} has a non-finite field")));
    }
    if p.thickness < 0.0 || p.density <= 0.0 || p.bulk_density <= 0.0 {
        return Err(corrupt(format!(
            "point {i} has thickness {} density {} bulk density {}",
            p.thickness, p.density, p.bulk_density
        )));
    }
    Ok(())
}

/// `<path>.bak`, keeping the original extension
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

/// Write a snapshot to `path` without ever leaving a half-written file
///
/// The snapshot goes to a temporary file next to `path` first. Once that is
/// complete, any existing file at `path` becomes `<path>.bak` (replacing an
/// older backup) and the temporary file is renamed into place.
pub fn save(snapshot: &Snapshot, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    snapshot.write_to(BufWriter::new(tmp.as_file_mut()))?;
    tmp.as_file().sync_all()?;

    if path.exists() {
        let backup = backup_path(path);
        fs::rename(path, &backup)?;
        debug!(backup = %backup.display(), "previous snapshot kept");
    }
    tmp.persist(path).map_err(|e| TectonicError::Io(e.error))?;
    info!(path = %path.display(), points = snapshot.points.len(), epoch = snapshot.epoch, "world saved");
    Ok(())
}

/// Read and validate a snapshot from `path`
pub fn load(path: &Path) -> Result<Snapshot> {
    let file = File::open(path)?;
    let snapshot = Snapshot::read_from(BufReader::new(file))?;
    info!(path = %path.display(), points = snapshot.points.len(), epoch = snapshot.epoch, "world loaded");
    Ok(snapshot)
}
