//! Geographic and projected coordinates.
//!
//! # Responsibility
//! - Hold point positions in geographic (`LatLon`) space.
//! - Project geographic positions into planar (`EastNorth`) space.
//!
//! # Invariants
//! - Two positions are considered equal when both axes differ by less than
//!   the matcher epsilon; exact float equality is never used for identity.
//! - Projection never yields infinities: latitude is clamped to the
//!   Mercator limit before projecting.

use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_4;

/// Default tolerance, in degrees, for treating two positions as the same.
pub const COORDINATE_EPSILON: f64 = 1e-6;

/// Largest latitude representable in spherical Mercator.
pub const MERCATOR_MAX_LAT: f64 = 85.051_128_78;

/// Geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Returns whether both axes differ by less than `epsilon`.
    pub fn equals_epsilon(&self, other: &LatLon, epsilon: f64) -> bool {
        (self.lat - other.lat).abs() < epsilon && (self.lon - other.lon).abs() < epsilon
    }

    /// Returns whether the position is finite and inside the WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Projects into spherical Mercator (radians on the unit sphere).
    pub fn project(&self) -> EastNorth {
        let lat = self.lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
        EastNorth {
            east: self.lon.to_radians(),
            north: (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln(),
        }
    }
}

/// Planar position produced by [`LatLon::project`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EastNorth {
    pub east: f64,
    pub north: f64,
}

#[cfg(test)]
mod tests {
    use super::{LatLon, COORDINATE_EPSILON};

    #[test]
    fn equals_epsilon_tolerates_sub_epsilon_drift() {
        let a = LatLon::new(10.0, 20.0);
        let b = LatLon::new(10.000_000_1, 20.000_000_1);
        assert!(a.equals_epsilon(&b, COORDINATE_EPSILON));
        assert!(b.equals_epsilon(&a, COORDINATE_EPSILON));
        assert!(!a.equals_epsilon(&LatLon::new(10.001, 20.0), COORDINATE_EPSILON));
    }

    #[test]
    fn projection_maps_origin_to_origin() {
        let en = LatLon::new(0.0, 0.0).project();
        assert!(en.east.abs() < 1e-12);
        assert!(en.north.abs() < 1e-12);
    }

    #[test]
    fn projection_clamps_poles() {
        let en = LatLon::new(90.0, 180.0).project();
        assert!(en.north.is_finite());
        assert!((en.east - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn is_valid_rejects_out_of_range() {
        assert!(LatLon::new(45.0, 7.0).is_valid());
        assert!(!LatLon::new(91.0, 7.0).is_valid());
        assert!(!LatLon::new(0.0, f64::NAN).is_valid());
    }
}
