use std::path::{Path as FsPath, PathBuf};

use async_trait::async_trait;
use run_tracker_lib::{planned_route::PlannedRoute, run_record::RunRecord};
use run_tracker_session::{services::{PersistenceGateway, UserScope}, SessionError};

use crate::{database::db::RunDatabase, DataManagerError, DATABASE_PATH};

#[derive(Clone)]
pub struct DataManager {
    pub(crate) database: RunDatabase,
}

/// The public interface for all stored runs and planned routes.
impl DataManager {
    /// Opens the database in the project data directory.
    pub async fn start() -> Result<Self, DataManagerError> {
        let root: PathBuf = project_root::get_project_root()
            .map_err(|err| DataManagerError::Database(format!("Failed to locate project root: {err}")))?;
        Self::open(&root.join(DATABASE_PATH)).await
    }

    pub async fn open(database_path: &FsPath) -> Result<Self, DataManagerError> {
        // Create data dir if it doesn't exist
        if let Some(data_dir) = database_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            if !data_dir.exists() {
                std::fs::create_dir_all(data_dir)
                    .map_err(|_| DataManagerError::Database(format!("Failed to create data directory: {:?}", data_dir)))?;
            }
        }

        tracing::info!("Opening run database at {}", database_path.display());
        Ok(DataManager {
            database: RunDatabase::connect(database_path).await?,
        })
    }

    pub async fn in_memory() -> Result<Self, DataManagerError> {
        Ok(DataManager {
            database: RunDatabase::in_memory().await?,
        })
    }

    pub async fn store_run(&self, user: &UserScope, run: &RunRecord) -> Result<i64, DataManagerError> {
        let run_id = self.database.insert_run(user.as_str(), run).await?;
        tracing::debug!("Stored run {} for {}", run_id, user.as_str());
        Ok(run_id)
    }

    pub async fn store_route(&self, user: &UserScope, route: &PlannedRoute) -> Result<i64, DataManagerError> {
        let route_id = self.database.insert_route(user.as_str(), route).await?;
        tracing::debug!("Stored planned route {} for {}", route_id, user.as_str());
        Ok(route_id)
    }

    pub async fn get_runs(&self, user: &UserScope) -> Result<Vec<RunRecord>, DataManagerError> {
        self.database.get_user_runs(user.as_str()).await
    }

    pub async fn get_routes(&self, user: &UserScope) -> Result<Vec<PlannedRoute>, DataManagerError> {
        self.database.get_user_routes(user.as_str()).await
    }

    pub async fn get_run(&self, run_id: i64) -> Result<RunRecord, DataManagerError> {
        self.database.get_run(run_id).await
    }

    pub async fn get_route(&self, route_id: i64) -> Result<PlannedRoute, DataManagerError> {
        self.database.get_route(route_id).await
    }
}

#[async_trait]
impl PersistenceGateway for DataManager {
    async fn save_run(&self, user: &UserScope, run: &RunRecord) -> Result<i64, SessionError> {
        Ok(self.store_run(user, run).await?)
    }

    async fn save_route(&self, user: &UserScope, route: &PlannedRoute) -> Result<i64, SessionError> {
        Ok(self.store_route(user, route).await?)
    }

    async fn list_runs(&self, user: &UserScope) -> Result<Vec<RunRecord>, SessionError> {
        Ok(self.get_runs(user).await?)
    }

    async fn list_routes(&self, user: &UserScope) -> Result<Vec<PlannedRoute>, SessionError> {
        Ok(self.get_routes(user).await?)
    }

    async fn get_run(&self, run_id: i64) -> Result<RunRecord, SessionError> {
        Ok(DataManager::get_run(self, run_id).await?)
    }

    async fn get_route(&self, route_id: i64) -> Result<PlannedRoute, SessionError> {
        Ok(DataManager::get_route(self, route_id).await?)
    }
}
