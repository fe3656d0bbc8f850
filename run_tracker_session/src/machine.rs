//! Session transition table.
//!
//! `transition` is a pure function of the current state and an input. It
//! never touches accumulators, timers or services; it only names the effects
//! the controller has to carry out, in order.

use run_tracker_lib::{planned_route::PlannedRoute, GeoPoint};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Tracking,
    Paused,
    Planning,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    StartTracking,
    Pause,
    Resume,
    Stop,
    EnterPlanning,
    CancelPlanning,
    ResetSelection,
    SelectPoint(GeoPoint),
    RetryDirections,
    SavePlan(String),
    LoadPlan(PlannedRoute),
    StartPlannedRun,
    /// The plan requested by `SavePlan` has been stored.
    PlanSaved,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ResetAccumulators,
    StartTimer,
    PauseTimer,
    ResumeTimer,
    SubscribeLocation,
    UnsubscribeLocation,
    /// Turn the accumulators into a run and hand it to the save task.
    FinalizeRun,
    ClearPlan,
    SelectPoint(GeoPoint),
    RetryDirections,
    SavePlan(String),
    LoadPlan(PlannedRoute),
    /// Keep the resolved plan as the target of the run about to start.
    FollowPlan,
}

/// Facts the table needs that live outside the state itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionContext {
    pub plan_resolved: bool,
}

/// Inputs that make no sense in the current state return the same state and no effects.
pub fn transition(state: SessionState, input: &SessionInput, context: TransitionContext) -> (SessionState, Vec<Effect>) {
    use Effect::*;
    use SessionState::*;

    match (state, input) {
        (Idle, SessionInput::StartTracking) => (Tracking, vec![ResetAccumulators, StartTimer, SubscribeLocation]),
        (Tracking, SessionInput::Pause) => (Paused, vec![PauseTimer, UnsubscribeLocation]),
        (Paused, SessionInput::Resume) => (Tracking, vec![ResumeTimer, SubscribeLocation]),
        (Tracking, SessionInput::Stop) => (Idle, vec![UnsubscribeLocation, PauseTimer, FinalizeRun, ResetAccumulators]),
        (Paused, SessionInput::Stop) => (Idle, vec![FinalizeRun, ResetAccumulators]),

        (Idle, SessionInput::EnterPlanning) => (Planning, vec![ClearPlan]),
        (Planning, SessionInput::CancelPlanning) => (Idle, vec![ClearPlan]),
        (Planning, SessionInput::ResetSelection) => (Planning, vec![ClearPlan]),
        (Planning, SessionInput::SelectPoint(point)) => (Planning, vec![SelectPoint(*point)]),
        (Planning, SessionInput::RetryDirections) => (Planning, vec![RetryDirections]),
        (Planning, SessionInput::SavePlan(name)) => (Planning, vec![SavePlan(name.clone())]),
        (Planning, SessionInput::LoadPlan(route)) => (Planning, vec![LoadPlan(route.clone())]),
        (Planning, SessionInput::PlanSaved) => (Idle, vec![ClearPlan]),
        (Planning, SessionInput::StartPlannedRun) if context.plan_resolved => (
            Tracking,
            vec![FollowPlan, ClearPlan, ResetAccumulators, StartTimer, SubscribeLocation],
        ),

        (state, _) => (state, Vec::new()),
    }
}
