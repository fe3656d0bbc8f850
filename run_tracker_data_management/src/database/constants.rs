pub const RUNS_TABLE_NAME: &str = "Runs";
pub const RUN_ID: &str = "run_id";
pub const USER_ID: &str = "user_id";
pub const STARTED_AT: &str = "started_at";
pub const DISTANCE_METERS: &str = "distance_meters";
pub const DURATION_MILLIS: &str = "duration_millis";
pub const ELEVATION_GAIN_METERS: &str = "elevation_gain_meters";
pub const PATH: &str = "path";

pub const PLANNED_ROUTES_TABLE_NAME: &str = "PlannedRoutes";
pub const ROUTE_ID: &str = "route_id";
// User id
pub const NAME: &str = "name";
// Distance, path
pub const START_POINT: &str = "start_point";
pub const END_POINT: &str = "end_point";
pub const CREATED_AT: &str = "created_at";
