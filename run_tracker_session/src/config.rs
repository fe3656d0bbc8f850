use std::time::Duration;

use crate::{elevation::ELEVATION_CHUNK_SIZE, services::UserScope};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Owner of every run and plan stored by this session.
    pub user: UserScope,
    pub elevation_chunk_size: usize,
    /// Upper bound for a single directions or elevation computation.
    pub request_timeout: Duration,
    pub tick_interval: Duration,
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user: UserScope::default(),
            elevation_chunk_size: ELEVATION_CHUNK_SIZE,
            request_timeout: Duration::from_secs(30),
            tick_interval: Duration::from_secs(1),
            event_capacity: 256,
        }
    }
}
