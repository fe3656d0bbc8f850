use std::fmt::Display;

use const_format::concatcp;
use run_tracker_session::SessionError;

pub mod database;
pub mod gpx_util;
mod data_manager;

pub use data_manager::*;

pub const DATA_DIR: &str = "data/";
pub const DATABASE_PATH: &str = concatcp!(DATA_DIR, "runs.db");
pub const GPX_DIR: &str = concatcp!(DATA_DIR, "gpx");

#[derive(Debug, Clone, PartialEq)]
pub enum DataManagerError {
    Database(String),
    Serialization(String),
    Gpx(String),
    NotFound,
}

impl Display for DataManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataManagerError::Database(message) => write!(f, "Database error: {message}"),
            DataManagerError::Serialization(message) => write!(f, "Serialization error: {message}"),
            DataManagerError::Gpx(message) => write!(f, "GPX error: {message}"),
            DataManagerError::NotFound => write!(f, "Record not found"),
        }
    }
}

impl std::error::Error for DataManagerError {}

impl From<DataManagerError> for SessionError {
    fn from(value: DataManagerError) -> Self {
        match value {
            DataManagerError::NotFound => SessionError::NotFound,
            other => SessionError::Persistence(other.to_string()),
        }
    }
}
