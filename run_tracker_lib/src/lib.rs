pub mod geo_point;
pub mod geo_math;
pub mod polyline;
pub mod track;
pub mod timer;
pub mod run_record;
pub mod planned_route;
pub mod stats;

pub use geo_point::{GeoPoint, Path};
