use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlx")]
use sqlx::{prelude::*, sqlite::SqliteRow};

use crate::geo_point::{GeoPoint, Path};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlannedRoute {
    pub id: Option<i64>,
    pub name: String,
    pub distance_meters: f64,
    pub path: Path,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub created_at: DateTime<Utc>,
}

impl PlannedRoute {
    pub fn new(name: String, distance_meters: f64, path: Path, start: GeoPoint, end: GeoPoint) -> Self {
        Self {
            id: None,
            name,
            distance_meters,
            path,
            start,
            end,
            created_at: Utc::now(),
        }
    }

    /// Renaming is only allowed until the route has been stored.
    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), &'static str> {
        if self.id.is_some() {
            return Err("Stored routes can not be renamed");
        }
        self.name = name.into();
        Ok(())
    }

    pub fn is_stored(&self) -> bool {
        self.id.is_some()
    }
}

#[cfg(feature = "sqlx")]
impl FromRow<'_, SqliteRow> for PlannedRoute {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let decode = |column: &str| -> sqlx::Result<String> { row.try_get(column) };
        let path = crate::geo_point::path_from_json(&decode("path")?)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let start: GeoPoint = serde_json::from_str(&decode("start_point")?)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let end: GeoPoint = serde_json::from_str(&decode("end_point")?)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self {
            id: row.try_get("route_id")?,
            name: row.try_get("name")?,
            distance_meters: row.try_get("distance_meters")?,
            path,
            start,
            end,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[test]
fn rename_only_before_storing() {
    let mut route = PlannedRoute::new("Park".into(), 1200., Vec::new(), GeoPoint::new(0., 0.), GeoPoint::new(0., 0.01));
    route.rename("Park loop").unwrap();
    assert_eq!(route.name, "Park loop");

    route.id = Some(4);
    assert!(route.rename("Other").is_err());
    assert_eq!(route.name, "Park loop");
}
