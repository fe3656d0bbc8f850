use crate::{geo_math::haversine_distance, geo_point::GeoPoint};

/// Path buffer of the active session together with its running distance.
#[derive(Debug, Default, Clone)]
pub struct TrackAccumulator {
    path: Vec<GeoPoint>,
    total_distance: f64,
}

impl TrackAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.path.clear();
        self.total_distance = 0.;
    }

    /// Appends the sample and adds the segment from the previous last point.
    /// Identical consecutive points are kept and add a zero length segment.
    pub fn add_sample(&mut self, point: GeoPoint) {
        if let Some(&last) = self.path.last() {
            self.total_distance += haversine_distance(last, point);
        }
        self.path.push(point);
    }

    pub fn total_distance_meters(&self) -> f64 {
        self.total_distance
    }

    pub fn current_path(&self) -> &[GeoPoint] {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Hands the path over to the caller and leaves the accumulator reset.
    pub fn take(&mut self) -> (Vec<GeoPoint>, f64) {
        let distance = self.total_distance;
        self.total_distance = 0.;
        (std::mem::take(&mut self.path), distance)
    }
}
