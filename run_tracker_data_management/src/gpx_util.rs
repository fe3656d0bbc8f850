use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path as FsPath, PathBuf},
    time::SystemTime,
};

use chrono::{DateTime, Utc};
use gpx::{Gpx, GpxVersion, Time, Track, TrackSegment, Waypoint};
use run_tracker_lib::{run_record::RunRecord, track::TrackAccumulator, GeoPoint};
use run_tracker_session::services::UserScope;
use time::OffsetDateTime;

use crate::{DataManager, DataManagerError, GPX_DIR};

/// Where a run is exported when no target is given.
pub fn default_export_path(run_id: i64) -> PathBuf {
    FsPath::new(GPX_DIR).join(format!("run_{run_id}.gpx"))
}

impl DataManager {
    /// Writes a stored run to `target` as a GPX 1.1 track.
    pub async fn export_run_gpx(&self, run_id: i64, target: &FsPath) -> Result<(), DataManagerError> {
        let run = self.get_run(run_id).await?;
        if let Some(parent) = target.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|err| DataManagerError::Gpx(format!("Failed to create {}: {err}", parent.display())))?;
        }
        let file = File::create(target)
            .map_err(|err| DataManagerError::Gpx(format!("Failed to create {}: {err}", target.display())))?;
        write_gpx(&run, &format!("Run {run_id}"), BufWriter::new(file))
    }

    /// Stores the track of a GPX file as a finished run and returns its id.
    pub async fn import_gpx(&self, source: &FsPath, user: &UserScope) -> Result<i64, DataManagerError> {
        let file = File::open(source)
            .map_err(|err| DataManagerError::Gpx(format!("Failed to open {}: {err}", source.display())))?;
        let run = read_gpx(BufReader::new(file))?;
        tracing::info!("Importing {} points from {}", run.path.len(), source.display());
        self.store_run(user, &run).await
    }
}

fn to_gpx_time(time: DateTime<Utc>) -> Time {
    let time: SystemTime = time.into();
    let time: OffsetDateTime = time.into();
    Time::from(time)
}

fn from_gpx_time(time: &Time) -> Option<DateTime<Utc>> {
    let formatted = time.format().ok()?;
    DateTime::parse_from_rfc3339(&formatted).ok().map(|time| time.with_timezone(&Utc))
}

pub fn write_gpx(run: &RunRecord, name: &str, writer: impl Write) -> Result<(), DataManagerError> {
    let mut gpx = Gpx::default();
    gpx.version = GpxVersion::Gpx11;
    gpx.metadata = Some(gpx::Metadata {
        name: Some(name.to_string()),
        time: Some(to_gpx_time(run.started_at)),
        ..Default::default()
    });

    // Only the start time is known, so the points carry no timestamps
    let mut segment = TrackSegment::new();
    segment.points.extend(run.path.iter().map(|point| Waypoint::new((*point).into())));

    let mut track = Track::new();
    track.name = Some(name.to_string());
    track.segments.push(segment);
    gpx.tracks.push(track);

    gpx::write(&gpx, writer).map_err(|err| DataManagerError::Gpx(err.to_string()))
}

/// Turns every track point of a GPX document into one run.
///
/// Distance is the haversine sum over the points. Duration spans the first and last
/// timestamped point, and the start time falls back to the metadata time.
pub fn read_gpx(reader: impl Read) -> Result<RunRecord, DataManagerError> {
    let gpx = gpx::read(reader).map_err(|err| DataManagerError::Gpx(err.to_string()))?;

    let mut track = TrackAccumulator::new();
    let mut first_time = None;
    let mut last_time = None;

    for point in gpx.tracks.iter().flat_map(|track| &track.segments).flat_map(|segment| &segment.points) {
        track.add_sample(GeoPoint::from(point.point()));
        if let Some(time) = point.time.as_ref().and_then(from_gpx_time) {
            first_time.get_or_insert(time);
            last_time = Some(time);
        }
    }

    if track.len() < 2 {
        return Err(DataManagerError::Gpx(format!("A run needs at least two track points, found {}", track.len())));
    }

    let metadata_time = gpx.metadata.as_ref().and_then(|meta| meta.time.as_ref()).and_then(from_gpx_time);
    let started_at = first_time.or(metadata_time).unwrap_or_else(Utc::now);
    let duration_millis = match (first_time, last_time) {
        (Some(first), Some(last)) => (last - first).num_milliseconds(),
        _ => 0,
    };

    let (path, distance_meters) = track.take();
    Ok(RunRecord::new(started_at, distance_meters, duration_millis, path))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const TRACK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata><name>Morning</name><time>2025-04-01T06:00:00Z</time></metadata>
  <trk><trkseg>
    <trkpt lat="0" lon="0"><time>2025-04-01T06:00:05Z</time></trkpt>
    <trkpt lat="0" lon="0.01"><time>2025-04-01T06:05:05Z</time></trkpt>
    <trkpt lat="0" lon="0.02"><time>2025-04-01T06:10:35Z</time></trkpt>
  </trkseg></trk>
</gpx>"#;

    #[test]
    fn reads_distance_and_duration() {
        let run = read_gpx(TRACK.as_bytes()).unwrap();

        assert_eq!(run.path.len(), 3);
        assert!((run.distance_meters - 2223.9).abs() < 1.);
        assert_eq!(run.duration_millis, 630_000);
        assert_eq!(run.started_at, Utc.with_ymd_and_hms(2025, 4, 1, 6, 0, 5).unwrap());
        assert_eq!(run.elevation_gain_meters, None);
    }

    #[test]
    fn untimed_points_fall_back_to_metadata() {
        let untimed = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="test">
  <metadata><time>2025-04-01T06:00:00Z</time></metadata>
  <trk><trkseg><trkpt lat="0" lon="0"></trkpt><trkpt lat="0" lon="0.01"></trkpt></trkseg></trk>
</gpx>"#;
        let run = read_gpx(untimed.as_bytes()).unwrap();

        assert_eq!(run.duration_millis, 0);
        assert_eq!(run.started_at, Utc.with_ymd_and_hms(2025, 4, 1, 6, 0, 0).unwrap());
    }

    #[test]
    fn single_point_is_rejected() {
        let single = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="test"><trk><trkseg><trkpt lat="1" lon="1"></trkpt></trkseg></trk></gpx>"#;
        assert!(matches!(read_gpx(single.as_bytes()), Err(DataManagerError::Gpx(_))));
    }

    #[test]
    fn written_track_reads_back() {
        let started_at = Utc.with_ymd_and_hms(2025, 4, 1, 6, 0, 0).unwrap();
        let run = RunRecord::new(started_at, 1111.95, 1000, vec![GeoPoint::new(0., 0.), GeoPoint::new(0., 0.01)]);

        let mut buffer = Vec::new();
        write_gpx(&run, "Run 1", &mut buffer).unwrap();
        let read = read_gpx(buffer.as_slice()).unwrap();

        assert_eq!(read.path, run.path);
        assert_eq!(read.started_at, started_at);
    }

    #[tokio::test]
    async fn import_then_export() {
        let dir = std::env::temp_dir().join(format!("run_tracker_gpx_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let source = dir.join("morning.gpx");
        std::fs::write(&source, TRACK).unwrap();

        let data_manager = DataManager::in_memory().await.unwrap();
        let run_id = data_manager.import_gpx(&source, &UserScope::default()).await.unwrap();
        let target = dir.join("exports").join("export.gpx");
        data_manager.export_run_gpx(run_id, &target).await.unwrap();

        let exported = read_gpx(File::open(&target).unwrap()).unwrap();
        assert_eq!(exported.path.len(), 3);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn exports_default_to_the_gpx_dir() {
        assert_eq!(default_export_path(7), FsPath::new("data/gpx/run_7.gpx"));
    }
}
