//! Great-circle distance and hidden-zone classification.
//!
//! Distances are computed with the Haversine formula on a spherical earth of
//! radius [`EARTH_RADIUS_KM`]. All coordinates are decimal degrees; nothing
//! here validates geographic range, and NaN inputs propagate as NaN.

use serde::{Deserialize, Serialize};

/// Mean earth radius used by [`distance_km`].
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to `other` in kilometers.
    #[must_use]
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance_km(self.lat, self.lon, other.lat, other.lon)
    }
}

/// Haversine distance between two points, in kilometers.
///
/// Symmetric in its arguments and zero for identical points.
#[must_use]
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// A named circular geofence. Inside it, the zone name is reported instead of
/// a nearby point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenZone {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Radius in kilometers.
    pub radius: f64,
}

impl HiddenZone {
    #[must_use]
    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }

    /// True when `point` lies within the radius, boundary included.
    #[must_use]
    pub fn contains(&self, point: &Coordinate) -> bool {
        point.distance_to(&self.center()) <= self.radius
    }
}

/// First zone in list order that contains `point`.
///
/// Overlapping zones resolve to whichever is listed first.
#[must_use]
pub fn find_hidden_zone<'a>(point: &Coordinate, zones: &'a [HiddenZone]) -> Option<&'a HiddenZone> {
    zones.iter().find(|zone| zone.contains(point))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(name: &str, lat: f64, lon: f64, radius: f64) -> HiddenZone {
        HiddenZone {
            name: name.to_string(),
            lat,
            lon,
            radius,
        }
    }

    #[test]
    fn test_distance_one_degree_longitude_at_equator() {
        let d = distance_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_distance_is_symmetric() {
        let pairs = [
            ((48.8566, 2.3522), (51.5074, -0.1278)),
            ((-33.8688, 151.2093), (35.6762, 139.6503)),
            ((45.502, -73.567), (45.503, -73.566)),
        ];
        for ((lat1, lon1), (lat2, lon2)) in pairs {
            let ab = distance_km(lat1, lon1, lat2, lon2);
            let ba = distance_km(lat2, lon2, lat1, lon1);
            assert!((ab - ba).abs() < 1e-9, "{ab} != {ba}");
        }
    }

    #[test]
    fn test_distance_same_point_is_zero() {
        assert!(distance_km(48.8566, 2.3522, 48.8566, 2.3522).abs() < 1e-12);
        assert!(distance_km(-89.9, 179.9, -89.9, 179.9).abs() < 1e-12);
    }

    #[test]
    fn test_distance_paris_london() {
        let paris = Coordinate::new(48.8566, 2.3522);
        let london = Coordinate::new(51.5074, -0.1278);
        let d = paris.distance_to(&london);
        assert!(d > 340.0 && d < 345.0, "got {d}");
    }

    #[test]
    fn test_distance_nan_propagates() {
        assert!(distance_km(f64::NAN, 0.0, 0.0, 0.0).is_nan());
    }

    #[test]
    fn test_zone_center_matches() {
        let zones = vec![zone("Home", 48.8566, 2.3522, 0.001)];
        let hit = find_hidden_zone(&Coordinate::new(48.8566, 2.3522), &zones);
        assert_eq!(hit.map(|z| z.name.as_str()), Some("Home"));
    }

    #[test]
    fn test_zone_outside_radius_does_not_match() {
        let zones = vec![zone("Home", 0.0, 0.0, 100.0)];
        assert!(find_hidden_zone(&Coordinate::new(0.0, 1.0), &zones).is_none());
    }

    #[test]
    fn test_zone_boundary_is_inclusive() {
        let d = distance_km(0.0, 1.0, 0.0, 0.0);
        let zones = vec![zone("Edge", 0.0, 0.0, d)];
        assert!(find_hidden_zone(&Coordinate::new(0.0, 1.0), &zones).is_some());
    }

    #[test]
    fn test_overlapping_zones_first_wins() {
        let zones = vec![
            zone("Z1", 48.8566, 2.3522, 1.0),
            zone("Z2", 48.8570, 2.3525, 5.0),
        ];
        let hit = find_hidden_zone(&Coordinate::new(48.8567, 2.3523), &zones);
        assert_eq!(hit.map(|z| z.name.as_str()), Some("Z1"));
    }

    #[test]
    fn test_no_zones_no_match() {
        assert!(find_hidden_zone(&Coordinate::new(1.0, 1.0), &[]).is_none());
    }
}
