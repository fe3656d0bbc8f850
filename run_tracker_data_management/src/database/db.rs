use std::path::Path as FsPath;

use const_format::concatcp;
use run_tracker_lib::{geo_point::path_to_json, planned_route::PlannedRoute, run_record::RunRecord};
use sqlx::{query_as, sqlite::{SqliteConnectOptions, SqlitePoolOptions}, Executor, Pool, Sqlite, SqlitePool};

use crate::DataManagerError;

use super::constants::*;

#[derive(Clone)]
pub struct RunDatabase {
    pool: Pool<Sqlite>,
}

impl RunDatabase {
    pub async fn connect(path: &FsPath) -> Result<Self, DataManagerError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await
            .map_err(|err| DataManagerError::Database(format!("Failed to connect to database {}: {err}", path.display())))?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Private database living as long as the returned handle.
    pub async fn in_memory() -> Result<Self, DataManagerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:").await
            .map_err(|err| DataManagerError::Database(format!("Failed to open in-memory database: {err}")))?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> Result<(), DataManagerError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", RUNS_TABLE_NAME, "(",
                RUN_ID,                " INTEGER PRIMARY KEY AUTOINCREMENT,",
                USER_ID,               " TEXT NOT NULL,",
                STARTED_AT,            " TIMESTAMP NOT NULL,",
                DISTANCE_METERS,       " REAL NOT NULL,",
                DURATION_MILLIS,       " INTEGER NOT NULL,",
                ELEVATION_GAIN_METERS, " REAL,",
                PATH,                  " TEXT NOT NULL);

            CREATE TABLE IF NOT EXISTS ", PLANNED_ROUTES_TABLE_NAME, "(",
                ROUTE_ID,        " INTEGER PRIMARY KEY AUTOINCREMENT,",
                USER_ID,         " TEXT NOT NULL,",
                NAME,            " TEXT NOT NULL,",
                DISTANCE_METERS, " REAL NOT NULL,",
                PATH,            " TEXT NOT NULL,",
                START_POINT,     " TEXT NOT NULL,",
                END_POINT,       " TEXT NOT NULL,",
                CREATED_AT,      " TIMESTAMP NOT NULL);

            CREATE INDEX IF NOT EXISTS runs_by_user ON ", RUNS_TABLE_NAME, "(", USER_ID, ", ", STARTED_AT, ");
            CREATE INDEX IF NOT EXISTS routes_by_user ON ", PLANNED_ROUTES_TABLE_NAME, "(", USER_ID, ");
        ")).await
            .map_err(|err| DataManagerError::Database(format!("Failed to create tables: {err}")))?;
        Ok(())
    }

    pub async fn insert_run(&self, user_id: &str, run: &RunRecord) -> Result<i64, DataManagerError> {
        let path = path_to_json(&run.path).map_err(|err| DataManagerError::Serialization(err.to_string()))?;

        query_as::<_, (i64,)>(concatcp!("
            INSERT INTO ", RUNS_TABLE_NAME, "(",
            RUN_ID, ", ", USER_ID, ", ", STARTED_AT, ", ", DISTANCE_METERS, ", ", DURATION_MILLIS, ", ", ELEVATION_GAIN_METERS, ", ", PATH, ")
            VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6) RETURNING ", RUN_ID))
                .bind(user_id)
                .bind(run.started_at)
                .bind(run.distance_meters)
                .bind(run.duration_millis)
                .bind(run.elevation_gain_meters)
                .bind(path)
                .fetch_one(&self.pool).await
                .map_err(|err| DataManagerError::Database(format!("Failed to insert run: {err}")))
                .map(|row| row.0)
    }

    pub async fn get_run(&self, run_id: i64) -> Result<RunRecord, DataManagerError> {
        query_as::<_, RunRecord>(concatcp!("SELECT * FROM ", RUNS_TABLE_NAME, " WHERE ", RUN_ID, " = ?1"))
            .bind(run_id)
            .fetch_optional(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get run: {err}")))?
            .ok_or(DataManagerError::NotFound)
    }

    /// Newest first.
    pub async fn get_user_runs(&self, user_id: &str) -> Result<Vec<RunRecord>, DataManagerError> {
        query_as::<_, RunRecord>(concatcp!("SELECT * FROM ", RUNS_TABLE_NAME, " WHERE ", USER_ID, " = ?1 ORDER BY ", STARTED_AT, " DESC"))
            .bind(user_id)
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get runs: {err}")))
    }

    pub async fn insert_route(&self, user_id: &str, route: &PlannedRoute) -> Result<i64, DataManagerError> {
        let serialize = |err: serde_json::Error| DataManagerError::Serialization(err.to_string());
        let path = path_to_json(&route.path).map_err(serialize)?;
        let start = serde_json::to_string(&route.start).map_err(serialize)?;
        let end = serde_json::to_string(&route.end).map_err(serialize)?;

        query_as::<_, (i64,)>(concatcp!("
            INSERT INTO ", PLANNED_ROUTES_TABLE_NAME, "(",
            ROUTE_ID, ", ", USER_ID, ", ", NAME, ", ", DISTANCE_METERS, ", ", PATH, ", ", START_POINT, ", ", END_POINT, ", ", CREATED_AT, ")
            VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING ", ROUTE_ID))
                .bind(user_id)
                .bind(&route.name)
                .bind(route.distance_meters)
                .bind(path)
                .bind(start)
                .bind(end)
                .bind(route.created_at)
                .fetch_one(&self.pool).await
                .map_err(|err| DataManagerError::Database(format!("Failed to insert planned route: {err}")))
                .map(|row| row.0)
    }

    pub async fn get_route(&self, route_id: i64) -> Result<PlannedRoute, DataManagerError> {
        query_as::<_, PlannedRoute>(concatcp!("SELECT * FROM ", PLANNED_ROUTES_TABLE_NAME, " WHERE ", ROUTE_ID, " = ?1"))
            .bind(route_id)
            .fetch_optional(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get planned route: {err}")))?
            .ok_or(DataManagerError::NotFound)
    }

    pub async fn get_user_routes(&self, user_id: &str) -> Result<Vec<PlannedRoute>, DataManagerError> {
        query_as::<_, PlannedRoute>(concatcp!("SELECT * FROM ", PLANNED_ROUTES_TABLE_NAME, " WHERE ", USER_ID, " = ?1 ORDER BY ", CREATED_AT, " DESC"))
            .bind(user_id)
            .fetch_all(&self.pool).await
            .map_err(|err| DataManagerError::Database(format!("Failed to get planned routes: {err}")))
    }
}
