use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use run_tracker_lib::{
    geo_math::Bounds,
    run_record::RunRecord,
    timer::{Clock, ElapsedTimer},
    track::TrackAccumulator,
    GeoPoint, Path,
};
use serde::Serialize;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::SessionConfig,
    elevation::ElevationAggregator,
    events::SessionEvent,
    machine::{transition, Effect, SessionInput, SessionState, TransitionContext},
    planner::{request_directions, DirectionsOutcome, DirectionsRequest, PlanStatus, PlanToken, RoutePlanner, SelectOutcome},
    services::{DirectionsService, ElevationService, PersistenceGateway, UserScope},
    ServiceError, SessionError,
};

#[derive(Clone)]
pub struct SessionServices {
    pub directions: Arc<dyn DirectionsService>,
    pub elevation: Arc<dyn ElevationService>,
    pub persistence: Arc<dyn PersistenceGateway>,
}

/// Results of background work, fed back into the controller.
enum Completion {
    Directions { token: PlanToken, outcome: DirectionsOutcome },
    RunFinished(Result<RunRecord, SessionError>),
    PlanStored { token: PlanToken, name: String, result: Result<i64, SessionError> },
}

/// The plan a running session is following.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunTarget {
    pub distance_meters: f64,
    pub path: Path,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSnapshot {
    pub status: PlanStatus,
    pub start: Option<GeoPoint>,
    pub end: Option<GeoPoint>,
    pub path: Option<Path>,
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub distance_meters: f64,
    pub elapsed_millis: i64,
    pub path: Path,
    pub location_active: bool,
    pub plan: PlanSnapshot,
    pub target: Option<RunTarget>,
}

/// Owns every piece of mutable session state. Driven either directly or as an actor via [`SessionController::spawn`].
pub struct SessionController {
    config: SessionConfig,
    state: SessionState,
    track: TrackAccumulator,
    timer: ElapsedTimer,
    planner: RoutePlanner,
    services: SessionServices,
    aggregator: Arc<ElevationAggregator>,
    events: broadcast::Sender<SessionEvent>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    started_at: Option<DateTime<Utc>>,
    target: Option<RunTarget>,
    location_active: bool,
    directions_task: Option<JoinHandle<()>>,
}

impl SessionController {
    pub fn new(config: SessionConfig, services: SessionServices, clock: Arc<dyn Clock>) -> Self {
        let aggregator = ElevationAggregator::with_chunk_size(services.elevation.clone(), config.elevation_chunk_size);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        Self {
            config,
            state: SessionState::Idle,
            track: TrackAccumulator::new(),
            timer: ElapsedTimer::new(clock),
            planner: RoutePlanner::new(),
            services,
            aggregator: Arc::new(aggregator),
            events,
            completions_tx,
            completions_rx,
            started_at: None,
            target: None,
            location_active: false,
            directions_task: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Runs one input through the transition table and carries out its effects in order.
    pub fn handle(&mut self, input: SessionInput) -> SessionState {
        let context = TransitionContext { plan_resolved: self.planner.is_resolved() };
        let (next, effects) = transition(self.state, &input, context);

        if next == self.state && effects.is_empty() {
            debug!("Ignoring input while {:?}", self.state);
            return self.state;
        }

        let previous = self.state;
        self.state = next;
        if previous != next {
            info!("Session {:?} -> {:?}", previous, next);
            self.emit(SessionEvent::StateChanged { from: previous, to: next });
        }

        for effect in effects {
            self.apply_effect(effect);
        }

        self.state
    }

    fn apply_effect(&mut self, effect: Effect) {
        match effect {
            Effect::ResetAccumulators => {
                self.track.reset();
                self.timer.reset();
                self.started_at = None;
            }
            Effect::StartTimer => {
                self.timer.start();
                self.started_at = Some(Utc::now());
                self.emit_stats();
            }
            Effect::PauseTimer => self.timer.pause(),
            Effect::ResumeTimer => self.timer.resume(),
            Effect::SubscribeLocation => self.set_location_active(true),
            Effect::UnsubscribeLocation => self.set_location_active(false),
            Effect::FinalizeRun => self.finalize(),
            Effect::ClearPlan => {
                self.abort_directions();
                self.planner.reset();
                self.emit_plan();
            }
            Effect::SelectPoint(point) => {
                if let SelectOutcome::RequestDirections(request) = self.planner.select_point(point) {
                    self.spawn_directions(request);
                }
                self.emit_plan();
            }
            Effect::RetryDirections => match self.planner.retry() {
                Some(request) => {
                    self.spawn_directions(request);
                    self.emit_plan();
                }
                None => self.message("There is no failed route to retry"),
            },
            Effect::SavePlan(name) => self.save_plan(name),
            Effect::LoadPlan(route) => {
                self.abort_directions();
                self.planner.load_plan(&route);
                self.emit_plan();
            }
            Effect::FollowPlan => {
                self.target = match (self.planner.distance_meters(), self.planner.path()) {
                    (Some(distance_meters), Some(path)) => Some(RunTarget { distance_meters, path: path.to_vec() }),
                    _ => None,
                };
            }
        }
    }

    /// Adds a location sample. Samples outside of active tracking are dropped.
    pub fn on_location(&mut self, point: GeoPoint) {
        if self.state != SessionState::Tracking {
            debug!("Dropping location sample while {:?}", self.state);
            return;
        }
        self.track.add_sample(point);
        self.emit_stats();
    }

    pub fn on_tick(&mut self) {
        if self.state == SessionState::Tracking {
            self.timer.tick();
            self.emit_stats();
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            distance_meters: self.track.total_distance_meters(),
            elapsed_millis: self.timer.elapsed_millis(),
            path: self.track.current_path().to_vec(),
            location_active: self.location_active,
            plan: self.plan_snapshot(),
            target: self.target.clone(),
        }
    }

    /// Waits for the next background result and applies it.
    pub async fn apply_next_completion(&mut self) -> bool {
        match self.completions_rx.recv().await {
            Some(completion) => {
                self.apply_completion(completion);
                true
            }
            None => false,
        }
    }

    fn apply_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Directions { token, outcome } => {
                if self.state != SessionState::Planning {
                    debug!("Dropping directions result outside of planning");
                    return;
                }
                let failure = match &outcome {
                    DirectionsOutcome::Failed(message) => Some(message.clone()),
                    _ => None,
                };
                if !self.planner.apply_directions(token, outcome) {
                    debug!("Dropping stale directions result {}", token);
                    return;
                }
                if let Some(message) = failure {
                    warn!("Directions lookup failed: {}", message);
                    self.message(&message);
                }
                self.emit_plan();
            }
            Completion::RunFinished(Ok(run)) => {
                let run_id = run.run_id.unwrap_or_default();
                info!("Saved run {} ({:.0} m, {} ms)", run_id, run.distance_meters, run.duration_millis);
                self.emit(SessionEvent::RunSaved {
                    run_id,
                    distance_meters: run.distance_meters,
                    duration_millis: run.duration_millis,
                    elevation_gain_meters: run.elevation_gain_meters,
                });
            }
            Completion::RunFinished(Err(err)) => {
                error!("Failed to save run: {}", err);
                self.emit(SessionEvent::RunSaveFailed { message: err.to_string() });
            }
            Completion::PlanStored { token, name, result: Ok(route_id) } => {
                info!("Saved planned route {} as {}", name, route_id);
                self.emit(SessionEvent::PlanSaved { route_id, name });
                if self.state == SessionState::Planning && self.planner.generation() == token {
                    self.handle(SessionInput::PlanSaved);
                }
            }
            Completion::PlanStored { result: Err(err), .. } => {
                error!("Failed to save planned route: {}", err);
                self.emit(SessionEvent::PlanSaveFailed { message: err.to_string() });
            }
        }
    }

    fn finalize(&mut self) {
        self.target = None;
        let duration_millis = self.timer.elapsed_millis();
        let started_at = self.started_at.take().unwrap_or_else(Utc::now);
        let (path, distance_meters) = self.track.take();

        if path.len() < 2 {
            info!("Discarding run with {} location samples", path.len());
            self.emit(SessionEvent::RunDiscarded { points: path.len() });
            return;
        }

        let record = RunRecord::new(started_at, distance_meters, duration_millis, path);
        let aggregator = self.aggregator.clone();
        let persistence = self.services.persistence.clone();
        let user = self.config.user.clone();
        let timeout = self.config.request_timeout;
        let completions = self.completions_tx.clone();

        tokio::spawn(async move {
            let result = finalize_run(record, &aggregator, persistence.as_ref(), &user, timeout).await;
            let _ = completions.send(Completion::RunFinished(result));
        });
    }

    fn save_plan(&mut self, name: String) {
        let name = name.trim().to_string();
        if name.is_empty() {
            self.message("A planned route needs a name");
            return;
        }
        let plan = match self.planner.build_plan(&name) {
            Ok(plan) => plan,
            Err(err) => {
                self.message(&err.to_string());
                return;
            }
        };

        let token = self.planner.generation();
        let persistence = self.services.persistence.clone();
        let user = self.config.user.clone();
        let timeout = self.config.request_timeout;
        let completions = self.completions_tx.clone();

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, persistence.save_route(&user, &plan)).await {
                Ok(result) => result,
                Err(_) => Err(SessionError::Persistence(ServiceError::Timeout(timeout.as_millis() as u64).to_string())),
            };
            let _ = completions.send(Completion::PlanStored { token, name, result });
        });
    }

    fn spawn_directions(&mut self, request: DirectionsRequest) {
        self.abort_directions();

        let service = self.services.directions.clone();
        let timeout = self.config.request_timeout;
        let completions = self.completions_tx.clone();

        debug!("Requesting directions for selection {}", request.token);
        self.directions_task = Some(tokio::spawn(async move {
            let lookup = request_directions(service.as_ref(), request.origin, request.destination);
            let outcome = match tokio::time::timeout(timeout, lookup).await {
                Ok(outcome) => outcome,
                Err(_) => DirectionsOutcome::Failed(ServiceError::Timeout(timeout.as_millis() as u64).to_string()),
            };
            let _ = completions.send(Completion::Directions { token: request.token, outcome });
        }));
    }

    fn abort_directions(&mut self) {
        if let Some(task) = self.directions_task.take() {
            task.abort();
        }
    }

    fn set_location_active(&mut self, active: bool) {
        if self.location_active != active {
            self.location_active = active;
            self.emit(SessionEvent::LocationSubscription { active });
        }
    }

    fn plan_snapshot(&self) -> PlanSnapshot {
        PlanSnapshot {
            status: self.planner.status(),
            start: self.planner.start(),
            end: self.planner.end(),
            path: self.planner.path().map(<[GeoPoint]>::to_vec),
            bounds: self.planner.path().and_then(Bounds::from_points),
        }
    }

    fn emit_plan(&self) {
        let PlanSnapshot { status, start, end, path, .. } = self.plan_snapshot();
        self.emit(SessionEvent::Plan { status, start, end, path });
    }

    fn emit_stats(&self) {
        self.emit(SessionEvent::Stats {
            distance_meters: self.track.total_distance_meters(),
            elapsed_millis: self.timer.elapsed_millis(),
            points: self.track.len(),
            target_distance_meters: self.target.as_ref().map(|target| target.distance_meters),
        });
    }

    fn message(&self, text: &str) {
        self.emit(SessionEvent::Message { text: text.to_string() });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let (commands, receiver) = mpsc::channel(64);
        let handle = SessionHandle {
            commands,
            events: self.events.clone(),
        };
        (handle, tokio::spawn(self.run(receiver)))
    }

    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
                Some(completion) = self.completions_rx.recv() => self.apply_completion(completion),
                _ = ticker.tick() => self.on_tick(),
            }
        }

        self.abort_directions();
        info!("Session controller stopped");
    }

    fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Input(input, reply) => {
                let state = self.handle(input);
                let _ = reply.send(state);
            }
            SessionCommand::Location(point) => self.on_location(point),
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }
}

/// Computes the elevation gain of a finished run and stores it.
///
/// A failed or timed out elevation lookup still saves the run, with a gain of zero.
/// Persistence failures are returned.
pub async fn finalize_run(
    record: RunRecord,
    aggregator: &ElevationAggregator,
    persistence: &dyn PersistenceGateway,
    user: &UserScope,
    timeout: Duration,
) -> Result<RunRecord, SessionError> {
    let gain = match tokio::time::timeout(timeout, aggregator.compute_elevation_gain(&record.path)).await {
        Ok(Ok(gain)) => gain,
        Ok(Err(err)) => {
            warn!("Saving run without elevation gain: {}", err);
            0.
        }
        Err(_) => {
            warn!("Elevation lookup timed out after {} ms, saving run without elevation gain", timeout.as_millis());
            0.
        }
    };

    let record = record.with_elevation_gain(gain);
    let run_id = match tokio::time::timeout(timeout, persistence.save_run(user, &record)).await {
        Ok(result) => result?,
        Err(_) => return Err(SessionError::Persistence(ServiceError::Timeout(timeout.as_millis() as u64).to_string())),
    };

    Ok(record.with_id(run_id))
}

pub enum SessionCommand {
    Input(SessionInput, oneshot::Sender<SessionState>),
    Location(GeoPoint),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Cloneable front door to a spawned controller.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Returns the state after the input has been handled.
    pub async fn send(&self, input: SessionInput) -> Result<SessionState, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands.send(SessionCommand::Input(input, reply)).await
            .map_err(|_| SessionError::ControllerStopped)?;
        response.await.map_err(|_| SessionError::ControllerStopped)
    }

    pub async fn location(&self, point: GeoPoint) -> Result<(), SessionError> {
        self.commands.send(SessionCommand::Location(point)).await
            .map_err(|_| SessionError::ControllerStopped)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands.send(SessionCommand::Snapshot(reply)).await
            .map_err(|_| SessionError::ControllerStopped)?;
        response.await.map_err(|_| SessionError::ControllerStopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
