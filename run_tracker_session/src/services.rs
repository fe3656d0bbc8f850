use async_trait::async_trait;
use run_tracker_lib::{planned_route::PlannedRoute, run_record::RunRecord, GeoPoint};
use serde::{Deserialize, Serialize};

use crate::{ServiceError, SessionError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub distance_meters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsRoute {
    pub encoded_polyline: String,
    pub legs: Vec<RouteLeg>,
}

#[async_trait]
pub trait DirectionsService: Send + Sync {
    /// Routes in preference order. An empty list means no route exists.
    async fn directions(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Vec<DirectionsRoute>, ServiceError>;
}

#[async_trait]
pub trait ElevationService: Send + Sync {
    /// One elevation in meters per input point, in input order.
    async fn elevations(&self, points: &[GeoPoint]) -> Result<Vec<f64>, ServiceError>;
}

/// Owner of the stored records, e.g. a user id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserScope(pub String);

impl UserScope {
    pub fn new(user: impl Into<String>) -> Self {
        Self(user.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserScope {
    fn default() -> Self {
        Self::new("local")
    }
}

/// Addressable store for finished runs and planned routes.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn save_run(&self, user: &UserScope, run: &RunRecord) -> Result<i64, SessionError>;
    async fn save_route(&self, user: &UserScope, route: &PlannedRoute) -> Result<i64, SessionError>;
    async fn list_runs(&self, user: &UserScope) -> Result<Vec<RunRecord>, SessionError>;
    async fn list_routes(&self, user: &UserScope) -> Result<Vec<PlannedRoute>, SessionError>;
    /// `SessionError::NotFound` for unknown ids.
    async fn get_run(&self, run_id: i64) -> Result<RunRecord, SessionError>;
    async fn get_route(&self, route_id: i64) -> Result<PlannedRoute, SessionError>;
}
