//! Height-to-color mapping for crust points and links

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 8-bit RGB color
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pack as opaque ARGB, the layout used in world snapshots
    pub fn to_argb(self) -> i32 {
        (0xFF00_0000u32 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32) as i32
    }

    /// Unpack from ARGB, ignoring alpha
    pub fn from_argb(argb: i32) -> Self {
        let v = argb as u32;
        Self::new((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }

    /// Channel-wise integer average of two colors
    pub fn average(self, other: Rgb) -> Rgb {
        Rgb::new(
            ((self.r as u16 + other.r as u16) / 2) as u8,
            ((self.g as u16 + other.g as u16) / 2) as u8,
            ((self.b as u16 + other.b as u16) / 2) as u8,
        )
    }

    /// Linear blend, `t` = 0 gives `self`, `t` = 1 gives `other`
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

/// Trait for mapping a height above sea level (km) to a color
pub trait ColorMapper {
    fn map_color(&self, height_above_sea: f64) -> Rgb;
}

/// Piecewise-linear color ramp over height above sea level
///
/// Stops are kept sorted by value. Heights outside the ramp take the color
/// of the nearest end stop.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMap {
    stops: Vec<(f64, Rgb)>,
}

impl ColorMap {
    /// An empty ramp; maps everything to black until stops are added
    pub fn empty() -> Self {
        Self { stops: Vec::new() }
    }

    /// Insert a stop, replacing any stop with the same value
    pub fn add(&mut self, value: f64, color: Rgb) {
        match self
            .stops
            .binary_search_by(|(v, _)| v.total_cmp(&value))
        {
            Ok(i) => self.stops[i].1 = color,
            Err(i) => self.stops.insert(i, (value, color)),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// The stops in ascending order of value
    pub fn stops(&self) -> &[(f64, Rgb)] {
        &self.stops
    }

    /// Interpolated color at `value`
    pub fn map(&self, value: f64) -> Rgb {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Rgb::BLACK,
        };
        if value <= first.0 {
            return first.1;
        }
        if value >= last.0 {
            return last.1;
        }
        let upper = self.stops.partition_point(|(v, _)| *v <= value);
        let (v0, c0) = self.stops[upper - 1];
        let (v1, c1) = self.stops[upper];
        c0.lerp(c1, (value - v0) / (v1 - v0))
    }
}

impl Default for ColorMap {
    /// Deep ocean black through blue, lowland greens, browns, snow white
    fn default() -> Self {
        let mut map = Self::empty();
        map.add(-5.6, Rgb::BLACK);
        map.add(-0.01, Rgb::BLUE);
        map.add(0.0, Rgb::new(50, 70, 25));
        map.add(1.5, Rgb::new(75, 155, 74));
        map.add(2.5, Rgb::new(125, 190, 80));
        map.add(4.0, Rgb::new(175, 140, 100));
        map.add(7.0, Rgb::new(213, 185, 135));
        map.add(10.0, Rgb::WHITE);
        map
    }
}

impl ColorMapper for ColorMap {
    fn map_color(&self, height_above_sea: f64) -> Rgb {
        self.map(height_above_sea)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map_ends_clamp() {
        let map = ColorMap::default();
        assert_eq!(map.len(), 8);
        assert_eq!(map.map(-100.0), Rgb::BLACK);
        assert_eq!(map.map(50.0), Rgb::WHITE);
    }

    #[test]
    fn test_interpolates_between_stops() {
        let mut map = ColorMap::empty();
        map.add(0.0, Rgb::new(0, 0, 0));
        map.add(10.0, Rgb::new(100, 200, 50));
        assert_eq!(map.map(5.0), Rgb::new(50, 100, 25));
        assert_eq!(map.map(0.0), Rgb::new(0, 0, 0));
    }

    #[test]
    fn test_add_replaces_same_value() {
        let mut map = ColorMap::empty();
        map.add(1.0, Rgb::BLACK);
        map.add(-1.0, Rgb::BLUE);
        map.add(1.0, Rgb::WHITE);
        assert_eq!(map.len(), 2);
        assert_eq!(map.stops()[0].0, -1.0);
        assert_eq!(map.stops()[1].1, Rgb::WHITE);
    }

    #[test]
    fn test_argb_packing() {
        let c = Rgb::new(12, 34, 56);
        let packed = c.to_argb();
        assert!(packed < 0); // alpha bit set
        assert_eq!(Rgb::from_argb(packed), c);
    }

    #[test]
    fn test_average() {
        assert_eq!(
            Rgb::new(10, 20, 255).average(Rgb::new(20, 21, 255)),
            Rgb::new(15, 20, 255)
        );
    }

    #[test]
    fn test_empty_map_is_black() {
        assert_eq!(ColorMap::empty().map_color(3.0), Rgb::BLACK);
    }
}
