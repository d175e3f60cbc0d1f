//! Sea level from a fixed water volume

use crate::crust::Crust;

/// Level at which `water_volume` km³ fills the basins of the given columns
///
/// Each column is `(surface height, area)`. Water rises from the lowest
/// column; each column it reaches widens the covered area. If the planet is
/// covered completely the remaining water stacks evenly over every column.
/// Without water, or without any area, the level is the lowest surface.
pub fn level_for(columns: &[(f64, f64)], water_volume: f64) -> f64 {
    let mut sorted: Vec<(f64, f64)> = columns
        .iter()
        .copied()
        .filter(|(h, a)| h.is_finite() && a.is_finite())
        .collect();
    sorted.sort_by(|x, y| x.0.total_cmp(&y.0));
    let Some(&(lowest, _)) = sorted.first() else {
        return 0.0;
    };
    let total_area: f64 = sorted.iter().map(|&(_, a)| a.max(0.0)).sum();
    if water_volume <= 0.0 || total_area <= 0.0 {
        return lowest;
    }

    let mut level = lowest;
    let mut covered = 0.0;
    let mut poured = 0.0;
    for &(height, area) in &sorted {
        if covered > 0.0 {
            let depth = (water_volume - poured) / covered;
            if level + depth <= height {
                return level + depth;
            }
            poured += covered * (height - level);
        }
        level = height;
        covered += area.max(0.0);
    }
    level + (water_volume - poured) / covered
}

/// Sea level of a crust holding `water_volume` km³ of water
pub fn sea_level(crust: &Crust, water_volume: f64) -> f64 {
    let columns: Vec<(f64, f64)> = crust.points().map(|(_, p)| (p.surface_height(), p.area)).collect();
    level_for(&columns, water_volume)
}
