use chrono::{Datelike, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::run_record::RunRecord;

/// "2.22 km"
pub fn format_distance_km(distance_meters: f64) -> String {
    format!("{:.2} km", distance_meters / 1000.)
}

/// "mm:ss", minutes keep counting past the hour.
pub fn format_duration(duration_millis: i64) -> String {
    let seconds = duration_millis.max(0) / 1000;
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Seconds per kilometer, `None` until some distance has been covered.
pub fn average_pace_secs_per_km(distance_meters: f64, duration_millis: i64) -> Option<f64> {
    if distance_meters <= 0. || duration_millis <= 0 {
        return None;
    }
    Some((duration_millis as f64 / 1000.) / (distance_meters / 1000.))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub iso_year: i32,
    pub iso_week: u32,
    pub run_count: usize,
    pub distance_meters: f64,
    pub duration_millis: i64,
    pub elevation_gain_meters: f64,
}

impl WeeklySummary {
    /// Totals of the runs that started in the ISO week containing `day`, with
    /// start times read in the given offset.
    pub fn for_week<'a>(runs: impl IntoIterator<Item = &'a RunRecord>, day: NaiveDate, offset: FixedOffset) -> Self {
        let week = day.iso_week();
        let mut summary = WeeklySummary {
            iso_year: week.year(),
            iso_week: week.week(),
            run_count: 0,
            distance_meters: 0.,
            duration_millis: 0,
            elevation_gain_meters: 0.,
        };

        for run in runs {
            let local_day = run.started_at.with_timezone(&offset).date_naive();
            if local_day.iso_week() != week {
                continue;
            }
            summary.run_count += 1;
            summary.distance_meters += run.distance_meters;
            summary.duration_millis += run.duration_millis;
            summary.elevation_gain_meters += run.elevation_gain_meters.unwrap_or(0.);
        }

        summary
    }
}
