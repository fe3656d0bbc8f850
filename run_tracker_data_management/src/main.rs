use std::path::PathBuf;

use chrono::{Local, NaiveDate, Offset};
use clap::{Parser, Subcommand};
use run_tracker_data_management::{gpx_util::default_export_path, DataManager, DataManagerError};
use run_tracker_lib::stats::{average_pace_secs_per_km, format_distance_km, format_duration, WeeklySummary};
use run_tracker_session::services::UserScope;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "RunCLI")]
#[command(about = "A CLI to inspect and move stored runs and planned routes", long_about = None)]
struct Cli {
    /// Database file, defaults to the project data directory
    #[arg(long)]
    database: Option<PathBuf>,
    /// Owner of the listed and imported records
    #[arg(long, default_value = "local")]
    user: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List runs, newest first
    ListRuns,
    /// List planned routes
    ListRoutes,
    /// Print a single run
    ShowRun { run_id: i64 },
    /// Write a run as GPX, by default to data/gpx/run_<id>.gpx
    ExportGpx { run_id: i64, target: Option<PathBuf> },
    /// Store the track of a GPX file as a run
    ImportGpx { source: PathBuf },
    /// Totals for the ISO week containing the date (YYYY-MM-DD), default this week
    Week { date: Option<NaiveDate> },
}

fn format_pace(distance_meters: f64, duration_millis: i64) -> String {
    match average_pace_secs_per_km(distance_meters, duration_millis) {
        Some(pace) => format!("{} /km", format_duration((pace * 1000.) as i64)),
        None => "-".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), DataManagerError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let user = UserScope::new(cli.user);

    let data_manager = match &cli.database {
        Some(path) => DataManager::open(path).await?,
        None => DataManager::start().await?,
    };

    match &cli.command {
        Commands::ListRuns => {
            for run in data_manager.get_runs(&user).await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    run.run_id.unwrap_or_default(),
                    run.started_at.with_timezone(&Local).format("%d/%m/%Y %H:%M"),
                    format_distance_km(run.distance_meters),
                    format_duration(run.duration_millis),
                    format_pace(run.distance_meters, run.duration_millis),
                );
            }
        },
        Commands::ListRoutes => {
            for route in data_manager.get_routes(&user).await? {
                println!("{}\t{}\t{}", route.id.unwrap_or_default(), format_distance_km(route.distance_meters), route.name);
            }
        },
        Commands::ShowRun { run_id } => {
            let run = data_manager.get_run(*run_id).await?;
            println!("Run {}", run_id);
            println!("Started:   {}", run.started_at.with_timezone(&Local).format("%d/%m/%Y %H:%M:%S"));
            println!("Distance:  {}", format_distance_km(run.distance_meters));
            println!("Duration:  {}", format_duration(run.duration_millis));
            println!("Pace:      {}", format_pace(run.distance_meters, run.duration_millis));
            match run.elevation_gain_meters {
                Some(gain) => println!("Elevation: {:.0} m", gain),
                None => println!("Elevation: -"),
            }
            println!("Points:    {}", run.path.len());
        },
        Commands::ExportGpx { run_id, target } => {
            let target = target.clone().unwrap_or_else(|| default_export_path(*run_id));
            data_manager.export_run_gpx(*run_id, &target).await?;
            println!("Wrote {}", target.display());
        },
        Commands::ImportGpx { source } => {
            let run_id = data_manager.import_gpx(source, &user).await?;
            println!("Created run with id: {run_id}");
        },
        Commands::Week { date } => {
            let now = Local::now();
            let day = date.unwrap_or_else(|| now.date_naive());
            let runs = data_manager.get_runs(&user).await?;
            let summary = WeeklySummary::for_week(&runs, day, now.offset().fix());

            println!("Week {} of {}", summary.iso_week, summary.iso_year);
            println!("Runs:      {}", summary.run_count);
            println!("Distance:  {}", format_distance_km(summary.distance_meters));
            println!("Duration:  {}", format_duration(summary.duration_millis));
            println!("Elevation: {:.0} m", summary.elevation_gain_meters);
        },
    }

    println!("Success!");
    Ok(())
}
