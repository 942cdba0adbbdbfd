//! Match recorded GPS tracks to catalogued peaks and log the resulting ascents.
//!
//! The pipeline for one track is [`analyze`] → [`match_peak`] →
//! [`AscentList::has`] → [`build_ascent`] → [`PeakCatalog::submit_ascent`].
//! [`BatchRunner`] drives it over a directory of track files and keeps a
//! [`HistoryStore`] next to them so reruns skip finished work.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod ascent;
pub mod batch;
pub mod bounds;
pub mod catalog;
pub mod convert;
pub mod history;
pub mod http;
pub mod peaks;

#[cfg(test)]
mod testing;

pub use ascent::{build_ascent, is_duplicate, AscentList, AscentRecord, ExistingAscent};
pub use batch::{BatchRunner, Config, Input, RunSummary};
pub use bounds::{analyze, TrackBounds};
pub use catalog::{CatalogError, ClimberId, Credentials, PeakCatalog, SubmissionId};
pub use convert::{ConvertError, GpsBabel, TrackConverter, TrackFormat};
pub use history::{HistoryEntry, HistoryError, HistoryStore};
pub use http::HttpCatalog;
pub use peaks::{match_peak, GeoBoundingBox, Peak, PeakId, PeakMatch};

/// Why a track cannot be used as an ascent.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing points")]
    MissingPoints,
    #[error("missing elevation")]
    MissingElevation,
    #[error("missing timestamp")]
    MissingTimestamp,
}

/// Failure of the per-track pipeline. Recoverable: siblings keep going.
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("highest point {0}")]
    Validation(#[from] ValidationError),
    #[error("find peaks {0}")]
    FindPeaks(#[source] CatalogError),
    #[error("no peaks found")]
    NoPeaksFound,
    #[error("list ascents {0}")]
    ListAscents(#[source] CatalogError),
    #[error("already have ascent logged for {peak:?} on {date}")]
    DuplicateAscent { peak: String, date: DateTime<Utc> },
    #[error("failed to add ascent {0}")]
    Upload(#[source] CatalogError),
}

impl TrackError {
    /// Splits out catalog errors that mean the login is gone, which no
    /// further track in the run can recover from.
    pub fn into_session_lost(self) -> Result<CatalogError, TrackError> {
        match self {
            TrackError::FindPeaks(err) | TrackError::ListAscents(err) | TrackError::Upload(err)
                if err.is_unauthorized() =>
            {
                Ok(err)
            }
            other => Err(other),
        }
    }
}

/// A track-level failure tagged with the track it came from.
#[derive(Debug)]
pub struct TrackFailure {
    pub track: String,
    pub error: TrackError,
}

impl fmt::Display for TrackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} processing track {:?}", self.error, self.track)
    }
}

/// Failure of one input file. Recorded in history; the batch continues.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("ToGPX failed {0}")]
    Conversion(#[from] ConvertError),
    #[error("read gpx file {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse gpx bytes {0}")]
    Parse(String),
    #[error("{}", join_failures(.0))]
    Tracks(Vec<TrackFailure>),
    #[error("catalog session lost processing track {track:?}: {source}")]
    SessionLost { track: String, source: CatalogError },
}

fn join_failures(failures: &[TrackFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that stop a run.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("catalog login {0}")]
    Authentication(#[source] CatalogError),
    #[error("failed to read directory {}: {}", .path.display(), .source)]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("{}: {}", .path.display(), .source)]
    File { path: PathBuf, source: FileError },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
            time: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Great-circle distance in meters.
    pub fn distance_to(&self, latitude: f64, longitude: f64) -> f64 {
        haversine_distance(self.latitude, self.longitude, latitude, longitude)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: Option<String>,
    pub segments: Vec<Vec<GeoPoint>>,
}

impl Track {
    pub fn new(name: impl Into<String>, segments: Vec<Vec<GeoPoint>>) -> Self {
        Self {
            name: Some(name.into()),
            segments,
        }
    }

    /// Every point of every segment, in recorded order.
    pub fn points(&self) -> impl Iterator<Item = &GeoPoint> {
        self.segments.iter().flatten()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// First and last timestamps present anywhere in the track.
    pub fn time_bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let start = self.points().find_map(|p| p.time);
        let end = self.points().filter_map(|p| p.time).last();
        (start, end)
    }
}

/// Parse every track out of a GPX document.
pub fn parse_gpx(input: &[u8]) -> Result<Vec<Track>, FileError> {
    use std::io::Cursor;

    let mut cursor = Cursor::new(input);
    let gpx = gpx::read(&mut cursor).map_err(|e| FileError::Parse(e.to_string()))?;
    let mut tracks = Vec::with_capacity(gpx.tracks.len());

    for track in gpx.tracks {
        let mut segments = Vec::with_capacity(track.segments.len());
        for segment in track.segments {
            let mut points = Vec::with_capacity(segment.points.len());
            for point in segment.points {
                let time = match point.time {
                    Some(time) => {
                        let iso = time.format().map_err(|e| FileError::Parse(e.to_string()))?;
                        let utc = DateTime::parse_from_rfc3339(&iso)
                            .map_err(|e| FileError::Parse(e.to_string()))?
                            .with_timezone(&Utc);
                        Some(utc)
                    }
                    None => None,
                };
                let geo = point.point();
                points.push(GeoPoint {
                    latitude: geo.y(),
                    longitude: geo.x(),
                    elevation: point.elevation,
                    time,
                });
            }
            segments.push(points);
        }
        tracks.push(Track {
            name: track.name,
            segments,
        });
    }
    Ok(tracks)
}

pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let r = 6_371_000.0_f64;
    let to_rad = |deg: f64| deg.to_radians();
    let dlat = to_rad(lat2 - lat1);
    let dlon = to_rad(lon2 - lon1);
    let a = (dlat / 2.0).sin().powi(2)
        + to_rad(lat1).cos() * to_rad(lat2).cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    r * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{gpx_document, summit_hike, ts};

    #[test]
    fn test_haversine_distance() {
        let dist = haversine_distance(0.0, 0.0, 0.0, 1.0);
        assert!((dist - 111_195.0).abs() < 200.0);
    }

    #[test]
    fn parse_gpx_keeps_tracks_segments_and_optional_fields() {
        let sparse = vec![GeoPoint::new(45.0, -121.0), GeoPoint::new(45.1, -121.1).with_elevation(10.0)];
        let doc = gpx_document(&[("Summit day", summit_hike()), ("Sparse", sparse)]);
        let tracks = parse_gpx(doc.as_bytes()).unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].name.as_deref(), Some("Summit day"));
        assert_eq!(tracks[0].points().count(), 3);
        let peak = &tracks[0].segments[0][1];
        assert_eq!(peak.latitude, 44.1);
        assert_eq!(peak.longitude, -71.1);
        assert_eq!(peak.elevation, Some(2000.0));
        assert_eq!(peak.time, Some(ts(11, 30)));

        let first = &tracks[1].segments[0][0];
        assert_eq!(first.elevation, None);
        assert_eq!(first.time, None);
    }

    #[test]
    fn parse_gpx_rejects_garbage() {
        let err = parse_gpx(b"definitely not xml").unwrap_err();
        assert!(matches!(err, FileError::Parse(_)));
        assert!(err.to_string().starts_with("parse gpx bytes"));
    }

    #[test]
    fn time_bounds_span_all_segments() {
        let track = Track::new(
            "two legs",
            vec![
                vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(1.0, 1.1).with_time(ts(9, 0))],
                vec![GeoPoint::new(1.0, 1.2).with_time(ts(12, 15)), GeoPoint::new(1.0, 1.3)],
            ],
        );
        assert_eq!(track.time_bounds(), (Some(ts(9, 0)), Some(ts(12, 15))));
        assert_eq!(Track::default().time_bounds(), (None, None));
    }

    #[test]
    fn track_failures_join_in_order() {
        let err = FileError::Tracks(vec![
            TrackFailure {
                track: "A".into(),
                error: TrackError::Validation(ValidationError::MissingElevation),
            },
            TrackFailure {
                track: "B".into(),
                error: TrackError::NoPeaksFound,
            },
        ]);
        assert_eq!(
            err.to_string(),
            "highest point missing elevation processing track \"A\", no peaks found processing track \"B\""
        );
    }

    #[test]
    fn unauthorized_catalog_errors_end_the_session() {
        let lost = TrackError::ListAscents(CatalogError::Unauthorized(401));
        assert!(lost.into_session_lost().is_ok());

        let rejected = TrackError::Upload(CatalogError::Status {
            status: 500,
            body: "boom".into(),
        });
        assert!(rejected.into_session_lost().is_err());
        assert!(TrackError::NoPeaksFound.into_session_lost().is_err());
    }
}
