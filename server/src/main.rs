use std::{fs::OpenOptions, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use run_tracker_data_management::DataManager;
use run_tracker_lib::timer::SystemClock;
use run_tracker_session::{
    http::{HttpDirectionsService, HttpElevationService},
    services::UserScope,
    SessionController, SessionServices,
};
use server::{config::Configuration, routes, server_state::ServerState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "run_tracker_server")]
#[command(about = "Drives a run tracking session over HTTP", long_about = None)]
struct Cli {
    /// key = value configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Configuration::load(path)?,
        None => Configuration::default(),
    };

    if let Some(log_dir) = config.log_file.parent() {
        std::fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=trace,run_tracker_session=debug,run_tracker_data_management=debug", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
        .init();

    tracing::info!("Starting server...");
    for key in &config.unknown_keys {
        tracing::warn!("Unknown config key: {}", key);
    }

    let data_manager = DataManager::open(&config.database).await?;
    let services = SessionServices {
        directions: Arc::new(HttpDirectionsService::new(&config.directions_url, config.request_timeout())?),
        elevation: Arc::new(HttpElevationService::new(&config.elevation_url, config.request_timeout())?),
        persistence: Arc::new(data_manager.clone()),
    };

    let controller = SessionController::new(config.session_config(), services, Arc::new(SystemClock::new()));
    let (session, _controller_task) = controller.spawn();

    let server_state = Arc::new(ServerState {
        session,
        data_manager,
        user: UserScope::new(&config.user),
    });

    let app = routes::router(server_state);

    let listener = tokio::net::TcpListener::bind(config.bind).await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
