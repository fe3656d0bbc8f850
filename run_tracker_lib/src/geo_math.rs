use serde::Serialize;

use crate::geo_point::GeoPoint;

pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8; // Mean radius

/// Great-circle distance in meters.
pub fn haversine_distance(p1: GeoPoint, p2: GeoPoint) -> f64 {
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lon = (p2.longitude - p1.longitude).to_radians();
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();

    let a = f64::sin(d_lat / 2.).powi(2)
        + f64::cos(lat1) * f64::cos(lat2) * f64::sin(d_lon / 2.).powi(2);
    // Rounding can push a slightly above 1 for antipodal points
    let c = 2. * f64::asin(f64::sqrt(a.min(1.)));

    EARTH_RADIUS_METERS * c
}

/// Sum of all segment lengths. The live tracker never calls this, it accumulates instead.
pub fn path_distance(path: &[GeoPoint]) -> f64 {
    path.windows(2)
        .map(|pair| haversine_distance(pair[0], pair[1]))
        .sum()
}

/// Smallest latitude/longitude box around a set of points, used to fit a map view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Bounds {
            south: first.latitude,
            west: first.longitude,
            north: first.latitude,
            east: first.longitude,
        };

        for point in &points[1..] {
            bounds.south = bounds.south.min(point.latitude);
            bounds.north = bounds.north.max(point.latitude);
            bounds.west = bounds.west.min(point.longitude);
            bounds.east = bounds.east.max(point.longitude);
        }

        Some(bounds)
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new((self.south + self.north) / 2., (self.west + self.east) / 2.)
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        point.latitude >= self.south
            && point.latitude <= self.north
            && point.longitude >= self.west
            && point.longitude <= self.east
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equator_hundredth_degree() {
        let d = haversine_distance(GeoPoint::new(0., 0.), GeoPoint::new(0., 0.01));
        assert!((d - 1111.95).abs() < 0.1, "{d}");
    }

    #[test]
    fn known_city_distance() {
        // Aarhus to Copenhagen is roughly 157 km as the crow flies
        let aarhus = GeoPoint::new(56.1629, 10.2039);
        let copenhagen = GeoPoint::new(55.6761, 12.5683);
        let d = haversine_distance(aarhus, copenhagen);
        assert!((d - 157_000.).abs() < 2_000., "{d}");
    }

    #[test]
    fn same_point_is_zero() {
        let p = GeoPoint::new(40.6642, 44.8730);
        assert_eq!(haversine_distance(p, p), 0.);
    }

    #[test]
    fn path_distance_sums_segments() {
        let path = [GeoPoint::new(0., 0.), GeoPoint::new(0., 0.01), GeoPoint::new(0., 0.02)];
        let d = path_distance(&path);
        assert!((d - 2223.9).abs() < 0.5, "{d}");
        assert_eq!(path_distance(&path[..1]), 0.);
    }

    #[test]
    fn bounds_envelope() {
        assert!(Bounds::from_points(&[]).is_none());

        let bounds = Bounds::from_points(&[
            GeoPoint::new(55.0, 9.0),
            GeoPoint::new(56.5, 8.0),
            GeoPoint::new(55.5, 10.5),
        ])
        .unwrap();

        assert_eq!(bounds, Bounds { south: 55.0, west: 8.0, north: 56.5, east: 10.5 });
        assert_eq!(bounds.center(), GeoPoint::new(55.75, 9.25));
        assert!(bounds.contains(GeoPoint::new(56.0, 9.0)));
        assert!(!bounds.contains(GeoPoint::new(57.0, 9.0)));
    }
}
