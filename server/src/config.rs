use std::{net::SocketAddr, path::{Path, PathBuf}, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use run_tracker_session::{services::UserScope, SessionConfig};

/// Server settings read from a `key = value` file. Lines starting with `#` are comments.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub bind: SocketAddr,
    pub database: PathBuf,
    pub directions_url: String,
    pub elevation_url: String,
    pub request_timeout_secs: u64,
    pub elevation_chunk_size: usize,
    pub tick_millis: u64,
    pub user: String,
    pub log_file: PathBuf,
    /// Keys that were ignored, logged once tracing is up
    pub unknown_keys: Vec<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database: PathBuf::from("data/runs.db"),
            directions_url: "http://127.0.0.1:8080".into(),
            elevation_url: "http://127.0.0.1:8080".into(),
            request_timeout_secs: 30,
            elevation_chunk_size: 500,
            tick_millis: 1000,
            user: "local".into(),
            log_file: PathBuf::from("server/log/server.log"),
            unknown_keys: Vec::new(),
        }
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err| anyhow!("Invalid value for {key}: {err}"))
}

impl Configuration {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut config = Self::default();

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=')
                .ok_or_else(|| anyhow!("Line {} is not a key = value pair", number + 1))?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                "bind" => config.bind = parse_value(key, value)?,
                "database" => config.database = PathBuf::from(value),
                "directions_url" => config.directions_url = value.to_string(),
                "elevation_url" => config.elevation_url = value.to_string(),
                "request_timeout_secs" => config.request_timeout_secs = parse_value(key, value)?,
                "elevation_chunk_size" => config.elevation_chunk_size = parse_value(key, value)?,
                "tick_millis" => config.tick_millis = parse_value(key, value)?,
                "user" => config.user = value.to_string(),
                "log_file" => config.log_file = PathBuf::from(value),
                _ => config.unknown_keys.push(key.to_string()),
            }
        }

        if config.elevation_chunk_size == 0 {
            return Err(anyhow!("elevation_chunk_size must be at least 1"));
        }
        if config.tick_millis == 0 {
            return Err(anyhow!("tick_millis must be at least 1"));
        }

        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            user: UserScope::new(&self.user),
            elevation_chunk_size: self.elevation_chunk_size,
            request_timeout: self.request_timeout(),
            tick_interval: Duration::from_millis(self.tick_millis),
            ..SessionConfig::default()
        }
    }
}
