use std::{sync::Arc, time::Duration};

use run_tracker_lib::{timer::ManualClock, GeoPoint};
use run_tracker_session::{
    controller::finalize_run,
    elevation::ElevationAggregator,
    fakes::{FnElevation, MemoryStore, StaticDirections},
    planner::PlanStatus,
    services::{PersistenceGateway, UserScope},
    ServiceError, SessionConfig, SessionController, SessionError, SessionEvent, SessionInput, SessionServices, SessionState,
};
use tokio::sync::broadcast;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("run_tracker_session=debug"))
        .with_test_writer()
        .try_init();
}

fn services(directions: StaticDirections, elevation: FnElevation, store: Arc<MemoryStore>) -> SessionServices {
    SessionServices {
        directions: Arc::new(directions),
        elevation: Arc::new(elevation),
        persistence: store,
    }
}

async fn next_matching(events: &mut broadcast::Receiver<SessionEvent>, matches: impl Fn(&SessionEvent) -> bool) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("event did not arrive in time")
}

#[tokio::test]
async fn run_is_tracked_and_stored() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::new();
    let controller = SessionController::new(
        SessionConfig::default(),
        services(StaticDirections::with_result(Ok(Vec::new())), FnElevation::new(|_| 12.), store.clone()),
        Arc::new(clock.clone()),
    );
    let (handle, _task) = controller.spawn();
    let mut events = handle.subscribe();

    handle.send(SessionInput::StartTracking).await.unwrap();
    for point in [GeoPoint::new(0., 0.), GeoPoint::new(0., 0.01), GeoPoint::new(0., 0.02)] {
        handle.location(point).await.unwrap();
    }
    clock.advance(61_000);
    assert_eq!(handle.send(SessionInput::Stop).await.unwrap(), SessionState::Idle);

    let SessionEvent::RunSaved { run_id, distance_meters, duration_millis, elevation_gain_meters } =
        next_matching(&mut events, |event| matches!(event, SessionEvent::RunSaved { .. })).await
    else {
        unreachable!()
    };
    assert!((distance_meters - 2223.9).abs() < 1.);
    assert_eq!(duration_millis, 61_000);
    assert_eq!(elevation_gain_meters, Some(0.));

    let stored = store.get_run(run_id).await.unwrap();
    assert_eq!(stored.path.len(), 3);
    assert_eq!(store.list_runs(&UserScope::default()).await.unwrap().len(), 1);
    assert!(store.list_runs(&UserScope::new("someone else")).await.unwrap().is_empty());
}

#[tokio::test]
async fn elevation_failure_still_saves_the_run() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let controller = SessionController::new(
        SessionConfig::default(),
        services(
            StaticDirections::with_result(Ok(Vec::new())),
            FnElevation::failing(ServiceError::Quota("daily limit".into())),
            store.clone(),
        ),
        Arc::new(ManualClock::new()),
    );
    let (handle, _task) = controller.spawn();
    let mut events = handle.subscribe();

    handle.send(SessionInput::StartTracking).await.unwrap();
    handle.location(GeoPoint::new(56.15, 10.20)).await.unwrap();
    handle.location(GeoPoint::new(56.16, 10.21)).await.unwrap();
    handle.send(SessionInput::Pause).await.unwrap();
    handle.send(SessionInput::Stop).await.unwrap();

    let saved = next_matching(&mut events, |event| matches!(event, SessionEvent::RunSaved { .. })).await;
    assert!(matches!(saved, SessionEvent::RunSaved { elevation_gain_meters: Some(gain), .. } if gain == 0.));
    assert_eq!(store.runs().len(), 1);
}

#[tokio::test]
async fn persistence_failure_is_reported() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    store.set_failing(true);
    let controller = SessionController::new(
        SessionConfig::default(),
        services(StaticDirections::with_result(Ok(Vec::new())), FnElevation::new(|_| 0.), store.clone()),
        Arc::new(ManualClock::new()),
    );
    let (handle, _task) = controller.spawn();
    let mut events = handle.subscribe();

    handle.send(SessionInput::StartTracking).await.unwrap();
    handle.location(GeoPoint::new(0., 0.)).await.unwrap();
    handle.location(GeoPoint::new(0., 0.01)).await.unwrap();
    handle.send(SessionInput::Stop).await.unwrap();

    next_matching(&mut events, |event| matches!(event, SessionEvent::RunSaveFailed { .. })).await;
    assert!(store.runs().is_empty());
    assert_eq!(handle.snapshot().await.unwrap().state, SessionState::Idle);
}

#[tokio::test]
async fn planning_to_planned_run() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let controller = SessionController::new(
        SessionConfig::default(),
        services(StaticDirections::route("_p~iF~ps|U_ulLnnqC_mqNvxq`@", 3100.), FnElevation::new(|_| 0.), store.clone()),
        Arc::new(ManualClock::new()),
    );
    let (handle, _task) = controller.spawn();
    let mut events = handle.subscribe();

    handle.send(SessionInput::EnterPlanning).await.unwrap();
    handle.send(SessionInput::SelectPoint(GeoPoint::new(38.5, -120.2))).await.unwrap();
    handle.send(SessionInput::SelectPoint(GeoPoint::new(43.252, -126.453))).await.unwrap();

    next_matching(&mut events, |event| {
        matches!(event, SessionEvent::Plan { status: PlanStatus::Resolved { .. }, .. })
    })
    .await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.plan.path.map(|path| path.len()), Some(3));

    assert_eq!(handle.send(SessionInput::StartPlannedRun).await.unwrap(), SessionState::Tracking);
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.target.map(|target| target.distance_meters), Some(3100.));
}

#[tokio::test]
async fn directions_timeout_becomes_a_failed_plan() {
    init_tracing();
    let config = SessionConfig {
        request_timeout: Duration::from_millis(50),
        ..SessionConfig::default()
    };
    let directions = StaticDirections::route("_p~iF~ps|U", 10.).delayed(Duration::from_secs(10));
    let controller = SessionController::new(
        config,
        services(directions, FnElevation::new(|_| 0.), Arc::new(MemoryStore::new())),
        Arc::new(ManualClock::new()),
    );
    let (handle, _task) = controller.spawn();
    let mut events = handle.subscribe();

    handle.send(SessionInput::EnterPlanning).await.unwrap();
    handle.send(SessionInput::SelectPoint(GeoPoint::new(1., 1.))).await.unwrap();
    handle.send(SessionInput::SelectPoint(GeoPoint::new(1., 2.))).await.unwrap();

    let failed = next_matching(&mut events, |event| {
        matches!(event, SessionEvent::Plan { status: PlanStatus::Failed { .. }, .. })
    })
    .await;
    let SessionEvent::Plan { status: PlanStatus::Failed { message }, .. } = failed else { unreachable!() };
    assert_eq!(message, "Timed out after 50 ms");
}

#[tokio::test]
async fn finalize_run_surfaces_persistence_errors_only() {
    let store = MemoryStore::new();
    let aggregator = ElevationAggregator::new(Arc::new(FnElevation::failing(ServiceError::Network("offline".into()))));
    let path = vec![GeoPoint::new(0., 0.), GeoPoint::new(0., 0.01)];
    let record = run_tracker_lib::run_record::RunRecord::new(chrono::Utc::now(), 1111.95, 1000, path);

    let saved = finalize_run(record.clone(), &aggregator, &store, &UserScope::default(), Duration::from_secs(1)).await.unwrap();
    assert_eq!(saved.elevation_gain_meters, Some(0.));
    assert_eq!(saved.run_id, Some(1));

    store.set_failing(true);
    let failed = finalize_run(record, &aggregator, &store, &UserScope::default(), Duration::from_secs(1)).await;
    assert!(matches!(failed, Err(SessionError::Persistence(_))));
}

#[tokio::test]
async fn malformed_route_fails_and_can_be_retried() {
    init_tracing();
    let directions = Arc::new(StaticDirections::route(&"~~~~~~~~~~~~B".repeat(10), 500.));
    let controller = SessionController::new(
        SessionConfig::default(),
        SessionServices {
            directions: directions.clone(),
            elevation: Arc::new(FnElevation::new(|_| 0.)),
            persistence: Arc::new(MemoryStore::new()),
        },
        Arc::new(ManualClock::new()),
    );
    let (handle, _task) = controller.spawn();
    let mut events = handle.subscribe();

    handle.send(SessionInput::EnterPlanning).await.unwrap();
    handle.send(SessionInput::SelectPoint(GeoPoint::new(1., 1.))).await.unwrap();
    handle.send(SessionInput::SelectPoint(GeoPoint::new(1., 2.))).await.unwrap();

    let is_failed = |event: &SessionEvent| matches!(event, SessionEvent::Plan { status: PlanStatus::Failed { .. }, .. });
    let failed = next_matching(&mut events, is_failed).await;
    let SessionEvent::Plan { status: PlanStatus::Failed { message }, .. } = failed else { unreachable!() };
    assert!(message.starts_with("Failed to decode route"), "{message}");

    assert_eq!(handle.send(SessionInput::RetryDirections).await.unwrap(), SessionState::Planning);
    next_matching(&mut events, is_failed).await;
    assert_eq!(directions.calls(), 2);
    assert_eq!(handle.snapshot().await.unwrap().state, SessionState::Planning);
}
