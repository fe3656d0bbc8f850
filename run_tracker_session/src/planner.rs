use run_tracker_lib::{planned_route::PlannedRoute, polyline::decode_polyline, GeoPoint, Path};
use serde::Serialize;

use crate::{services::DirectionsService, SessionError};

/// Identifies the selection a directions request was made for.
pub type PlanToken = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum DirectionsOutcome {
    Found { path: Path, distance_meters: f64 },
    /// The lookup worked but there is no usable route. Not an error.
    NoRouteFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsRequest {
    pub token: PlanToken,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectOutcome {
    StartSet,
    RequestDirections(DirectionsRequest),
    Reset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanStatus {
    AwaitingStart,
    AwaitingEnd,
    Calculating,
    Resolved { distance_meters: f64 },
    NoRouteFound,
    Failed { message: String },
}

#[derive(Debug, Clone)]
enum Selection {
    AwaitingStart,
    AwaitingEnd { start: GeoPoint },
    Calculating { start: GeoPoint, end: GeoPoint },
    Resolved { start: GeoPoint, end: GeoPoint, path: Path, distance_meters: f64 },
    NoRoute { start: GeoPoint, end: GeoPoint },
    Failed { start: GeoPoint, end: GeoPoint, message: String },
}

/// Two tap route selection. Every reset bumps the generation so late directions answers are dropped.
#[derive(Debug)]
pub struct RoutePlanner {
    selection: Selection,
    generation: PlanToken,
}

impl Default for RoutePlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutePlanner {
    pub fn new() -> Self {
        Self {
            selection: Selection::AwaitingStart,
            generation: 0,
        }
    }

    pub fn select_point(&mut self, point: GeoPoint) -> SelectOutcome {
        match self.selection {
            Selection::AwaitingStart => {
                self.selection = Selection::AwaitingEnd { start: point };
                SelectOutcome::StartSet
            }
            Selection::AwaitingEnd { start } => SelectOutcome::RequestDirections(self.begin_request(start, point)),
            _ => {
                self.reset();
                SelectOutcome::Reset
            }
        }
    }

    /// Asks for the current endpoints again after a failed or empty lookup.
    pub fn retry(&mut self) -> Option<DirectionsRequest> {
        match self.selection {
            Selection::Failed { start, end, .. } | Selection::NoRoute { start, end } => Some(self.begin_request(start, end)),
            _ => None,
        }
    }

    fn begin_request(&mut self, start: GeoPoint, end: GeoPoint) -> DirectionsRequest {
        self.generation += 1;
        self.selection = Selection::Calculating { start, end };
        DirectionsRequest {
            token: self.generation,
            origin: start,
            destination: end,
        }
    }

    /// Returns false when the outcome belongs to a selection that no longer exists.
    pub fn apply_directions(&mut self, token: PlanToken, outcome: DirectionsOutcome) -> bool {
        let Selection::Calculating { start, end } = self.selection else {
            return false;
        };
        if token != self.generation {
            return false;
        }

        self.selection = match outcome {
            DirectionsOutcome::Found { path, distance_meters } => Selection::Resolved { start, end, path, distance_meters },
            DirectionsOutcome::NoRouteFound => Selection::NoRoute { start, end },
            DirectionsOutcome::Failed(message) => Selection::Failed { start, end, message },
        };
        true
    }

    /// Shows a stored route as the resolved selection.
    pub fn load_plan(&mut self, route: &PlannedRoute) {
        self.generation += 1;
        self.selection = Selection::Resolved {
            start: route.start,
            end: route.end,
            path: route.path.clone(),
            distance_meters: route.distance_meters,
        };
    }

    pub fn reset(&mut self) {
        self.generation += 1;
        self.selection = Selection::AwaitingStart;
    }

    pub fn build_plan(&self, name: &str) -> Result<PlannedRoute, SessionError> {
        match &self.selection {
            Selection::Resolved { start, end, path, distance_meters } => {
                Ok(PlannedRoute::new(name.to_string(), *distance_meters, path.clone(), *start, *end))
            }
            _ => Err(SessionError::IncompletePlan),
        }
    }

    pub fn status(&self) -> PlanStatus {
        match &self.selection {
            Selection::AwaitingStart => PlanStatus::AwaitingStart,
            Selection::AwaitingEnd { .. } => PlanStatus::AwaitingEnd,
            Selection::Calculating { .. } => PlanStatus::Calculating,
            Selection::Resolved { distance_meters, .. } => PlanStatus::Resolved { distance_meters: *distance_meters },
            Selection::NoRoute { .. } => PlanStatus::NoRouteFound,
            Selection::Failed { message, .. } => PlanStatus::Failed { message: message.clone() },
        }
    }

    pub fn generation(&self) -> PlanToken {
        self.generation
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.selection, Selection::Resolved { .. })
    }

    pub fn start(&self) -> Option<GeoPoint> {
        match self.selection {
            Selection::AwaitingStart => None,
            Selection::AwaitingEnd { start }
            | Selection::Calculating { start, .. }
            | Selection::Resolved { start, .. }
            | Selection::NoRoute { start, .. }
            | Selection::Failed { start, .. } => Some(start),
        }
    }

    pub fn end(&self) -> Option<GeoPoint> {
        match self.selection {
            Selection::AwaitingStart | Selection::AwaitingEnd { .. } => None,
            Selection::Calculating { end, .. }
            | Selection::Resolved { end, .. }
            | Selection::NoRoute { end, .. }
            | Selection::Failed { end, .. } => Some(end),
        }
    }

    pub fn path(&self) -> Option<&[GeoPoint]> {
        match &self.selection {
            Selection::Resolved { path, .. } => Some(path.as_slice()),
            _ => None,
        }
    }

    pub fn distance_meters(&self) -> Option<f64> {
        match self.selection {
            Selection::Resolved { distance_meters, .. } => Some(distance_meters),
            _ => None,
        }
    }
}

/// Looks up directions and reduces the answer to the first route and its first leg.
pub async fn request_directions(service: &dyn DirectionsService, origin: GeoPoint, destination: GeoPoint) -> DirectionsOutcome {
    let routes = match service.directions(origin, destination).await {
        Ok(routes) => routes,
        Err(err) => return DirectionsOutcome::Failed(err.to_string()),
    };

    let Some(route) = routes.first() else {
        return DirectionsOutcome::NoRouteFound;
    };
    let Some(leg) = route.legs.first() else {
        return DirectionsOutcome::NoRouteFound;
    };

    match decode_polyline(&route.encoded_polyline) {
        Ok(path) => DirectionsOutcome::Found { path, distance_meters: leg.distance_meters },
        Err(err) => DirectionsOutcome::Failed(format!("Failed to decode route: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{services::{DirectionsRoute, RouteLeg}, ServiceError};

    const A: GeoPoint = GeoPoint { latitude: 56.15, longitude: 10.20 };
    const B: GeoPoint = GeoPoint { latitude: 56.16, longitude: 10.21 };
    const C: GeoPoint = GeoPoint { latitude: 56.17, longitude: 10.22 };

    fn found() -> DirectionsOutcome {
        DirectionsOutcome::Found { path: vec![A, B], distance_meters: 1500. }
    }

    #[test]
    fn two_taps_request_directions() {
        let mut planner = RoutePlanner::new();
        assert_eq!(planner.select_point(A), SelectOutcome::StartSet);
        assert_eq!(planner.status(), PlanStatus::AwaitingEnd);

        let SelectOutcome::RequestDirections(request) = planner.select_point(B) else {
            panic!("second tap should request directions");
        };
        assert_eq!((request.origin, request.destination), (A, B));
        assert_eq!(planner.status(), PlanStatus::Calculating);
    }

    #[test]
    fn third_tap_resets_everything() {
        let mut planner = RoutePlanner::new();
        planner.select_point(A);
        let SelectOutcome::RequestDirections(request) = planner.select_point(B) else { panic!() };
        planner.apply_directions(request.token, found());

        assert_eq!(planner.select_point(C), SelectOutcome::Reset);
        assert_eq!(planner.status(), PlanStatus::AwaitingStart);
        assert_eq!(planner.start(), None);
        assert_eq!(planner.end(), None);
        assert_eq!(planner.path(), None);
        assert_eq!(planner.build_plan("x"), Err(SessionError::IncompletePlan));
    }

    #[test]
    fn stale_outcome_is_dropped() {
        let mut planner = RoutePlanner::new();
        planner.select_point(A);
        let SelectOutcome::RequestDirections(old) = planner.select_point(B) else { panic!() };

        // Third tap while the request is in flight, then a fresh selection
        planner.select_point(C);
        planner.select_point(B);
        let SelectOutcome::RequestDirections(new) = planner.select_point(C) else { panic!() };

        assert!(!planner.apply_directions(old.token, found()));
        assert_eq!(planner.status(), PlanStatus::Calculating);
        assert!(planner.apply_directions(new.token, DirectionsOutcome::NoRouteFound));
        assert_eq!(planner.status(), PlanStatus::NoRouteFound);
    }

    #[test]
    fn build_plan_needs_resolved_directions() {
        let mut planner = RoutePlanner::new();
        assert_eq!(planner.build_plan("Loop"), Err(SessionError::IncompletePlan));

        planner.select_point(A);
        let SelectOutcome::RequestDirections(request) = planner.select_point(B) else { panic!() };
        assert_eq!(planner.build_plan("Loop"), Err(SessionError::IncompletePlan));

        planner.apply_directions(request.token, found());
        let plan = planner.build_plan("Loop").unwrap();
        assert_eq!(plan.name, "Loop");
        assert_eq!(plan.distance_meters, 1500.);
        assert_eq!((plan.start, plan.end), (A, B));
        assert_eq!(plan.path, vec![A, B]);
        assert_eq!(plan.id, None);
    }

    #[test]
    fn failure_keeps_selection_for_retry() {
        let mut planner = RoutePlanner::new();
        planner.select_point(A);
        let SelectOutcome::RequestDirections(request) = planner.select_point(B) else { panic!() };
        planner.apply_directions(request.token, DirectionsOutcome::Failed("offline".into()));

        assert_eq!(planner.status(), PlanStatus::Failed { message: "offline".into() });
        assert_eq!(planner.end(), Some(B));

        let retry = planner.retry().unwrap();
        assert!(retry.token > request.token);
        assert_eq!((retry.origin, retry.destination), (A, B));
        assert!(planner.retry().is_none());
    }

    #[test]
    fn loaded_plan_is_resolved() {
        let mut planner = RoutePlanner::new();
        let mut route = PlannedRoute::new("Harbour".into(), 900., vec![A, C], A, C);
        route.id = Some(3);

        planner.load_plan(&route);

        assert!(planner.is_resolved());
        assert_eq!(planner.distance_meters(), Some(900.));
    }

    struct FixedDirections(Result<Vec<DirectionsRoute>, ServiceError>);

    #[async_trait]
    impl DirectionsService for FixedDirections {
        async fn directions(&self, _origin: GeoPoint, _destination: GeoPoint) -> Result<Vec<DirectionsRoute>, ServiceError> {
            self.0.clone()
        }
    }

    fn route(polyline: &str, legs: Vec<f64>) -> DirectionsRoute {
        DirectionsRoute {
            encoded_polyline: polyline.into(),
            legs: legs.into_iter().map(|distance_meters| RouteLeg { distance_meters }).collect(),
        }
    }

    #[tokio::test]
    async fn first_route_and_leg_are_used() {
        let service = FixedDirections(Ok(vec![
            route("_p~iF~ps|U_ulLnnqC", vec![2500., 100.]),
            route("_p~iF~ps|U", vec![10.]),
        ]));

        let outcome = request_directions(&service, A, B).await;

        let DirectionsOutcome::Found { path, distance_meters } = outcome else { panic!("expected a route") };
        assert_eq!(path.len(), 2);
        assert_eq!(distance_meters, 2500.);
    }

    #[tokio::test]
    async fn empty_routes_or_legs_mean_no_route() {
        let none = FixedDirections(Ok(Vec::new()));
        assert_eq!(request_directions(&none, A, B).await, DirectionsOutcome::NoRouteFound);

        let no_legs = FixedDirections(Ok(vec![route("_p~iF~ps|U", Vec::new())]));
        assert_eq!(request_directions(&no_legs, A, B).await, DirectionsOutcome::NoRouteFound);
    }

    #[tokio::test]
    async fn failures_pass_the_message_through() {
        let failing = FixedDirections(Err(ServiceError::Network("connection refused".into())));
        assert_eq!(
            request_directions(&failing, A, B).await,
            DirectionsOutcome::Failed("Network error: connection refused".into())
        );

        let garbage = FixedDirections(Ok(vec![route("_p~iF", vec![10.])]));
        assert!(matches!(request_directions(&garbage, A, B).await, DirectionsOutcome::Failed(_)));
    }
}
