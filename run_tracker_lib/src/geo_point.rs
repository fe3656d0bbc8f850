use geo_types::Point;
use serde::{Deserialize, Serialize};

/// Ordered sequence of points, in the order they were recorded or planned.
pub type Path = Vec<GeoPoint>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<GeoPoint> for Point {
    fn from(value: GeoPoint) -> Self {
        Point::new(value.longitude, value.latitude)
    }
}

impl From<Point> for GeoPoint {
    fn from(value: Point) -> Self {
        GeoPoint::new(value.y(), value.x())
    }
}

/// Paths are stored as a JSON list of `{latitude, longitude}` objects.
pub fn path_to_json(path: &[GeoPoint]) -> Result<String, serde_json::Error> {
    serde_json::to_string(path)
}

pub fn path_from_json(json: &str) -> Result<Path, serde_json::Error> {
    if json.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json)
}
