//! Map surface, overlay layers and supporting geometry math
//!
//! The surface lives in web-mercator fractions (0..1 on both axes) so tile
//! images and vector overlays share one coordinate system.

pub mod bounds;
pub mod colors;
pub mod engine;
pub mod layers;

pub use bounds::GeoBounds;
pub use colors::Color;
pub use engine::MapEngine;
pub use layers::{LayerSpec, LayerStyle, Overlay, Shape};

/// Web-mercator X fraction (0..1) for a longitude in degrees.
pub fn mercator_x(lon: f64) -> f64 {
    (lon + 180.0) / 360.0
}

/// Web-mercator Y fraction (0..1, 0 at the north edge) for a latitude in degrees.
pub fn mercator_y(lat: f64) -> f64 {
    // Clamp to the mercator singularity limits
    let lat = lat.clamp(-85.051_128_78, 85.051_128_78).to_radians();
    (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0
}

/// Longitude in degrees for a mercator X fraction.
pub fn lon_of_x(x: f64) -> f64 {
    x * 360.0 - 180.0
}

/// Latitude in degrees for a mercator Y fraction.
pub fn lat_of_y(y: f64) -> f64 {
    let n = std::f64::consts::PI * (1.0 - 2.0 * y);
    n.sinh().atan().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mercator_round_trip() {
        for &(lon, lat) in &[(0.0, 0.0), (-5.5, 7.5), (179.0, -60.0), (-179.0, 80.0)] {
            let (x, y) = (mercator_x(lon), mercator_y(lat));
            assert!((lon_of_x(x) - lon).abs() < 1e-9);
            assert!((lat_of_y(y) - lat).abs() < 1e-9);
        }
    }

    #[test]
    fn test_mercator_orientation() {
        // Greenwich sits at the middle of the X axis, north maps to small Y
        assert!((mercator_x(0.0) - 0.5).abs() < 1e-12);
        assert!(mercator_y(60.0) < mercator_y(0.0));
    }
}
