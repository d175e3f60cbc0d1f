//! Saving and restoring worlds through the filesystem

use std::fs;

use approx::assert_relative_eq;
use tectonic_planet::persistence::backup_path;
use tectonic_planet::*;

fn small_world(seed: u64) -> World {
    let config = WorldConfigBuilder::new()
        .seed(seed)
        .point_spacing(1100.0)
        .unwrap()
        .plate_count(4)
        .unwrap()
        .mantle_point_count(3)
        .unwrap()
        .build()
        .unwrap();
    World::new(config).unwrap()
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.tec");

    let mut world = small_world(4);
    world.step().unwrap();
    world.step().unwrap();
    world.save(&path).unwrap();

    let loaded = World::load(&path).unwrap();
    assert_eq!(loaded.epoch(), 2);
    assert_eq!(loaded.point_count(), world.point_count());
    assert_eq!(loaded.plate_count(), world.plate_count());
    assert_eq!(loaded.upwellings(), world.upwellings());
    assert_eq!(loaded.color_map(), world.color_map());
    assert_eq!(loaded.snapshot(), world.snapshot());
    assert_relative_eq!(loaded.sea_level(), world.sea_level(), max_relative = 1e-3);
    loaded.check_invariants().unwrap();
}

#[test]
fn test_loaded_world_keeps_running() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.tec");
    small_world(9).save(&path).unwrap();

    let mut a = World::load(&path).unwrap();
    let mut b = World::load(&path).unwrap();
    for _ in 0..2 {
        assert_eq!(a.step().unwrap(), b.step().unwrap());
        a.check_invariants().unwrap();
    }
    assert_eq!(a.epoch(), 2);
}

#[test]
fn test_second_save_keeps_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.tec");

    let mut world = small_world(12);
    world.save(&path).unwrap();
    let first = fs::read(&path).unwrap();
    world.step().unwrap();
    world.save(&path).unwrap();

    assert_eq!(fs::read(backup_path(&path)).unwrap(), first);
    assert_eq!(World::load(&path).unwrap().epoch(), 1);
    assert_eq!(World::load(backup_path(&path)).unwrap().epoch(), 0);
}

#[test]
fn test_truncated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.tec");
    small_world(2).save(&path).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    let err = World::load(&path).err().unwrap();
    assert!(matches!(err, TectonicError::CorruptSnapshot(_)), "{err}");
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = World::load(dir.path().join("nothing.tec")).err().unwrap();
    assert!(matches!(err, TectonicError::Io(_)), "{err}");
}
