//! In-memory collaborators for tests and offline runs.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use run_tracker_lib::{planned_route::PlannedRoute, run_record::RunRecord, GeoPoint};

use crate::{
    services::{DirectionsRoute, DirectionsService, ElevationService, PersistenceGateway, RouteLeg, UserScope},
    ServiceError, SessionError,
};

#[derive(Default)]
pub struct MemoryStore {
    next_id: AtomicI64,
    runs: Mutex<Vec<(UserScope, RunRecord)>>,
    routes: Mutex<Vec<(UserScope, PlannedRoute)>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following save fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn runs(&self) -> Vec<RunRecord> {
        self.runs.lock().unwrap().iter().map(|(_, run)| run.clone()).collect()
    }

    pub fn routes(&self) -> Vec<PlannedRoute> {
        self.routes.lock().unwrap().iter().map(|(_, route)| route.clone()).collect()
    }

    fn check(&self) -> Result<i64, SessionError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SessionError::Persistence("Store is unavailable".into()));
        }
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl PersistenceGateway for MemoryStore {
    async fn save_run(&self, user: &UserScope, run: &RunRecord) -> Result<i64, SessionError> {
        let id = self.check()?;
        self.runs.lock().unwrap().push((user.clone(), run.clone().with_id(id)));
        Ok(id)
    }

    async fn save_route(&self, user: &UserScope, route: &PlannedRoute) -> Result<i64, SessionError> {
        let id = self.check()?;
        let mut route = route.clone();
        route.id = Some(id);
        self.routes.lock().unwrap().push((user.clone(), route));
        Ok(id)
    }

    async fn list_runs(&self, user: &UserScope) -> Result<Vec<RunRecord>, SessionError> {
        Ok(self.runs.lock().unwrap().iter().filter(|(owner, _)| owner == user).map(|(_, run)| run.clone()).collect())
    }

    async fn list_routes(&self, user: &UserScope) -> Result<Vec<PlannedRoute>, SessionError> {
        Ok(self.routes.lock().unwrap().iter().filter(|(owner, _)| owner == user).map(|(_, route)| route.clone()).collect())
    }

    async fn get_run(&self, run_id: i64) -> Result<RunRecord, SessionError> {
        self.runs.lock().unwrap().iter()
            .find(|(_, run)| run.run_id == Some(run_id))
            .map(|(_, run)| run.clone())
            .ok_or(SessionError::NotFound)
    }

    async fn get_route(&self, route_id: i64) -> Result<PlannedRoute, SessionError> {
        self.routes.lock().unwrap().iter()
            .find(|(_, route)| route.id == Some(route_id))
            .map(|(_, route)| route.clone())
            .ok_or(SessionError::NotFound)
    }
}

/// Answers every request with the same result, optionally after a delay.
pub struct StaticDirections {
    result: Result<Vec<DirectionsRoute>, ServiceError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StaticDirections {
    pub fn route(encoded_polyline: &str, distance_meters: f64) -> Self {
        Self::with_result(Ok(vec![DirectionsRoute {
            encoded_polyline: encoded_polyline.to_string(),
            legs: vec![RouteLeg { distance_meters }],
        }]))
    }

    pub fn with_result(result: Result<Vec<DirectionsRoute>, ServiceError>) -> Self {
        Self {
            result,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectionsService for StaticDirections {
    async fn directions(&self, _origin: GeoPoint, _destination: GeoPoint) -> Result<Vec<DirectionsRoute>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

/// Elevation derived from the point itself, or a fixed failure.
pub struct FnElevation {
    elevation: Box<dyn Fn(GeoPoint) -> f64 + Send + Sync>,
    failure: Option<ServiceError>,
}

impl FnElevation {
    pub fn new(elevation: impl Fn(GeoPoint) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            elevation: Box::new(elevation),
            failure: None,
        }
    }

    pub fn failing(failure: ServiceError) -> Self {
        Self {
            elevation: Box::new(|_| 0.),
            failure: Some(failure),
        }
    }
}

#[async_trait]
impl ElevationService for FnElevation {
    async fn elevations(&self, points: &[GeoPoint]) -> Result<Vec<f64>, ServiceError> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        Ok(points.iter().map(|point| (self.elevation)(*point)).collect())
    }
}
