use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlx")]
use sqlx::{prelude::*, sqlite::SqliteRow};

use crate::geo_point::Path;

/// A finished run. Immutable once the store has assigned `run_id`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RunRecord {
    pub run_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub distance_meters: f64,
    pub duration_millis: i64,
    pub elevation_gain_meters: Option<f64>,
    pub path: Path,
}

impl RunRecord {
    pub fn new(started_at: DateTime<Utc>, distance_meters: f64, duration_millis: i64, path: Path) -> Self {
        Self {
            run_id: None,
            started_at,
            distance_meters: distance_meters.max(0.),
            duration_millis: duration_millis.max(0),
            elevation_gain_meters: None,
            path,
        }
    }

    pub fn with_elevation_gain(mut self, gain_meters: f64) -> Self {
        self.elevation_gain_meters = Some(gain_meters.max(0.));
        self
    }

    pub fn with_id(mut self, run_id: i64) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

#[cfg(feature = "sqlx")]
impl FromRow<'_, SqliteRow> for RunRecord {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let path: String = row.try_get("path")?;
        let path = crate::geo_point::path_from_json(&path).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self {
            run_id: row.try_get("run_id")?,
            started_at: row.try_get("started_at")?,
            distance_meters: row.try_get("distance_meters")?,
            duration_millis: row.try_get("duration_millis")?,
            elevation_gain_meters: row.try_get("elevation_gain_meters")?,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeoPoint;

    #[test]
    fn negative_inputs_are_clamped() {
        let record = RunRecord::new(Utc::now(), -1., -5, vec![GeoPoint::new(0., 0.)]).with_elevation_gain(-3.);
        assert_eq!(record.distance_meters, 0.);
        assert_eq!(record.duration_millis, 0);
        assert_eq!(record.elevation_gain_meters, Some(0.));
        assert_eq!(record.run_id, None);
    }
}
