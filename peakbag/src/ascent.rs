use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::{Peak, PeakId, Track, TrackBounds};

/// An ascent the catalog already has on file for the climber.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExistingAscent {
    pub peak_id: PeakId,
    pub date: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AscentList(Vec<ExistingAscent>);

impl AscentList {
    pub fn new(ascents: Vec<ExistingAscent>) -> Self {
        Self(ascents)
    }

    pub fn has(&self, peak_id: PeakId, date: &DateTime<Utc>) -> bool {
        is_duplicate(peak_id, date, &self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<ExistingAscent>> for AscentList {
    fn from(ascents: Vec<ExistingAscent>) -> Self {
        Self(ascents)
    }
}

/// True when the same peak is already logged at exactly this instant.
pub fn is_duplicate(peak_id: PeakId, date: &DateTime<Utc>, existing: &[ExistingAscent]) -> bool {
    existing
        .iter()
        .any(|a| a.peak_id == peak_id && a.date == *date)
}

/// Payload submitted to the catalog for a new ascent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AscentRecord {
    pub peak_id: PeakId,
    pub date: DateTime<Utc>,
    pub geometry: Track,
    pub trip_report: String,
    #[serde(rename = "time_up_s", serialize_with = "duration_seconds")]
    pub time_up: Duration,
    #[serde(rename = "time_down_s", serialize_with = "duration_seconds")]
    pub time_down: Duration,
    pub start_elevation: Option<f64>,
    pub end_elevation: Option<f64>,
}

fn duration_seconds<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(value.num_seconds())
}

/// Assemble the submission for a validated track and its matched peak.
///
/// Time up and down are measured against the whole track's time span, so
/// every segment counts even when the start or end point is untimed.
pub fn build_ascent(
    track: &Track,
    bounds: &TrackBounds,
    peak: &Peak,
    now: DateTime<Utc>,
) -> AscentRecord {
    let summit = bounds.summit_time;
    let (start, end) = track.time_bounds();
    let start = start.unwrap_or(summit);
    let end = end.unwrap_or(summit);

    AscentRecord {
        peak_id: peak.id,
        date: summit,
        geometry: track.clone(),
        trip_report: trip_report(now),
        time_up: summit - start,
        time_down: end - summit,
        start_elevation: bounds.start.elevation,
        end_elevation: bounds.end.elevation,
    }
}

fn trip_report(now: DateTime<Utc>) -> String {
    format!(
        "[i]Uploaded by peakbag on {}[/i]",
        now.to_rfc3339_opts(SecondsFormat::Nanos, true)
    )
}
