use run_tracker_lib::{GeoPoint, Path};
use serde::Serialize;

use crate::{machine::SessionState, planner::PlanStatus};

/// Everything the UI gets told. Sent fire-and-forget over a broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    Stats {
        distance_meters: f64,
        elapsed_millis: i64,
        points: usize,
        target_distance_meters: Option<f64>,
    },
    LocationSubscription {
        active: bool,
    },
    Plan {
        status: PlanStatus,
        start: Option<GeoPoint>,
        end: Option<GeoPoint>,
        path: Option<Path>,
    },
    /// Stop with fewer than two points; nothing is stored.
    RunDiscarded {
        points: usize,
    },
    RunSaved {
        run_id: i64,
        distance_meters: f64,
        duration_millis: i64,
        elevation_gain_meters: Option<f64>,
    },
    RunSaveFailed {
        message: String,
    },
    PlanSaved {
        route_id: i64,
        name: String,
    },
    PlanSaveFailed {
        message: String,
    },
    Message {
        text: String,
    },
}
