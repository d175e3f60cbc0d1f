//! Example: Simulate a planet for a number of epochs
//!
//! Usage: `cargo run --example simulate -- [epochs] [seed] [save-path]`
//!
//! Without a save path the planet is written to `planet.tec` in the working
//! directory; an existing file there is resumed instead of starting over.

use std::env;
use std::path::PathBuf;

use tectonic_planet::*;

fn main() {
    let args: Vec<String> = env::args().collect();
    let epochs: i32 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(20);
    let seed: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(42);
    let path = PathBuf::from(args.get(3).map(String::as_str).unwrap_or("planet.tec"));

    println!("Tectonic Planet Simulation");
    println!("==========================\n");

    let mut world = if path.exists() {
        println!("Resuming {}", path.display());
        World::load(&path).expect("Failed to load planet")
    } else {
        let config = WorldConfigBuilder::new()
            .seed(seed)
            .point_spacing(500.0)
            .unwrap()
            .plate_count(8)
            .unwrap()
            .build()
            .unwrap();

        println!("Configuration:");
        println!("  Seed: {}", config.seed);
        println!("  Planet Radius: {} km", config.planet_radius);
        println!("  Point Spacing: {} km", config.point_spacing);
        println!("  Approximate Points: {}", config.approximate_point_count());
        println!("  Plates: {}", config.plate_count);
        println!();

        World::new(config).expect("Failed to create planet")
    };

    println!(
        "Epoch {}: {} points on {} plates, sea level {:.2} km\n",
        world.epoch(),
        world.point_count(),
        world.plate_count(),
        world.sea_level()
    );

    for _ in 0..epochs {
        let report = world.step().expect("Simulation failed");
        println!(
            "  Epoch {:4}: {:3} subducted, {:3} rifted, {:2} obductions, {:2} splits, sea level {:6.2} km{}",
            report.epoch,
            report.subductions,
            report.rifted_points,
            report.obductions,
            report.fragmentations + report.stress_splits + report.huge_splits,
            report.sea_level,
            if report.rebuilt_mesh { " (mesh rebuilt)" } else { "" }
        );
        if (report.epoch + 1) % 50 == 0 {
            world.break_up_supercontinents();
        }
    }

    // Land and sea
    let histogram = world.elevation_histogram(8, -8.0, 8.0);
    let total: f64 = histogram.iter().sum();
    println!("\nHypsometry:");
    for (i, area) in histogram.iter().enumerate() {
        let low = -8.0 + 2.0 * i as f64;
        let bar = "#".repeat((area / total * 60.0).round() as usize);
        println!("  {:+3.0}..{:+3.0} km {:5.1}% {}", low, low + 2.0, area / total * 100.0, bar);
    }

    let largest = world
        .plates()
        .map(|(id, _)| (id, world.crust().plate_area(id)))
        .max_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((id, area)) = largest {
        println!("\nLargest plate: {} covering {:.1}% of the surface", id, area / world.surface_area() * 100.0);
    }

    world.save(&path).expect("Failed to save planet");
    println!("\nSaved epoch {} to {}", world.epoch(), path.display());
}
