//! Cross-check the crust mesh against an independent convex hull
//!
//! Crust points of a fresh world all lie on the sphere, where the empty
//! circumsphere triangulation is the convex hull.

use approx::assert_relative_eq;
use parry3d::math::Point;
use parry3d::transformation;
use tectonic_planet::*;

fn fresh(seed: u64, spacing: f64) -> World {
    let config = WorldConfigBuilder::new()
        .seed(seed)
        .point_spacing(spacing)
        .unwrap()
        .build()
        .unwrap();
    World::new(config).unwrap()
}

fn hull_area(world: &World) -> (usize, f64) {
    // Work on the unit sphere to keep f32 precise
    let radius = world.planet_radius();
    let points: Vec<Point<f32>> = world
        .points()
        .map(|(_, p)| {
            let v = p.pos / radius;
            Point::new(v.x as f32, v.y as f32, v.z as f32)
        })
        .collect();
    let (vertices, triangles) = transformation::convex_hull(&points);
    let area: f64 = triangles
        .iter()
        .map(|t| {
            let [a, b, c] = t.map(|i| {
                let v = vertices[i as usize];
                DVec3::new(v.x as f64, v.y as f64, v.z as f64)
            });
            (b - a).cross(c - a).length() / 2.0
        })
        .sum();
    (triangles.len(), area * radius * radius)
}

#[test]
fn test_mesh_matches_convex_hull() {
    for (seed, spacing) in [(1, 1000.0), (2, 700.0)] {
        let world = fresh(seed, spacing);
        let (faces, area) = hull_area(&world);
        assert_eq!(world.wedges().len(), faces);
        assert_eq!(faces, 2 * world.point_count() - 4);
        assert_relative_eq!(world.surface_area(), area, max_relative = 1e-4);
    }
}

#[test]
fn test_every_point_in_the_mesh() {
    let world = fresh(3, 800.0);
    let mut used = vec![false; world.crust().point_capacity()];
    for wedge in world.wedges() {
        for p in wedge.points {
            used[p.index()] = true;
        }
    }
    for (id, _) in world.points() {
        assert!(used[id.index()], "{id} not in any wedge");
    }
}
