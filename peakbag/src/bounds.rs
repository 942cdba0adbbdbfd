use chrono::{DateTime, Utc};

use crate::{GeoPoint, Track, ValidationError};

/// Start, summit and end of a track that passed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackBounds {
    pub start: GeoPoint,
    pub highest: GeoPoint,
    pub end: GeoPoint,
    /// Elevation of `highest`, guaranteed present.
    pub summit_elevation: f64,
    /// Timestamp of `highest`, guaranteed present.
    pub summit_time: DateTime<Utc>,
}

/// Scan a track once for its first, highest and last points.
///
/// The highest point is the first point carrying the greatest elevation;
/// points without an elevation never displace one that has it. A missing
/// elevation is not read as zero, so a track whose first point lacks one and
/// whose remaining points sit at or below sea level still gets a summit. The
/// summit must carry both an elevation and a timestamp.
pub fn analyze(track: &Track) -> Result<TrackBounds, ValidationError> {
    let mut start: Option<&GeoPoint> = None;
    let mut highest: Option<&GeoPoint> = None;
    let mut end: Option<&GeoPoint> = None;

    for point in track.points() {
        if start.is_none() {
            start = Some(point);
        }
        end = Some(point);

        highest = match (highest, point.elevation) {
            (None, _) => Some(point),
            (Some(current), Some(elevation)) => match current.elevation {
                Some(best) if elevation <= best => Some(current),
                _ => Some(point),
            },
            (Some(current), None) => Some(current),
        };
    }

    let (Some(start), Some(highest), Some(end)) = (start, highest, end) else {
        return Err(ValidationError::MissingPoints);
    };
    let summit_elevation = highest.elevation.ok_or(ValidationError::MissingElevation)?;
    let summit_time = highest.time.ok_or(ValidationError::MissingTimestamp)?;

    Ok(TrackBounds {
        start: start.clone(),
        highest: highest.clone(),
        end: end.clone(),
        summit_elevation,
        summit_time,
    })
}
