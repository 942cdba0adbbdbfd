use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{GeoPoint, PeakCatalog, TrackError};

pub type PeakId = u64;

/// Ground distance searched around a summit, in feet.
pub const SEARCH_RADIUS_FEET: f64 = 1000.0;

const FEET_PER_MILE: f64 = 5280.0;
const MILES_PER_DEGREE: f64 = 69.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub id: PeakId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl GeoBoundingBox {
    /// Zero-area box on a single coordinate.
    pub fn around(latitude: f64, longitude: f64) -> Self {
        Self {
            min_lat: latitude,
            max_lat: latitude,
            min_lng: longitude,
            max_lng: longitude,
        }
    }

    /// Grow every side by `margin` degrees. Negative margins are ignored.
    pub fn extend(self, margin: f64) -> Self {
        let margin = margin.max(0.0);
        Self {
            min_lat: self.min_lat - margin,
            max_lat: self.max_lat + margin,
            min_lng: self.min_lng - margin,
            max_lng: self.max_lng + margin,
        }
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lng..=self.max_lng).contains(&longitude)
    }
}

/// Degrees of latitude spanned by `feet` of ground distance.
pub fn margin_for_feet(feet: f64) -> f64 {
    feet / (MILES_PER_DEGREE * FEET_PER_MILE)
}

/// The peak chosen for a summit and how many candidates were in range.
#[derive(Clone, Debug, PartialEq)]
pub struct PeakMatch {
    pub peak: Peak,
    pub candidates: usize,
}

impl PeakMatch {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates > 1
    }
}

/// Look up the catalogued peak nearest to a summit point.
pub fn match_peak<C: PeakCatalog + ?Sized>(
    summit: &GeoPoint,
    catalog: &C,
) -> Result<PeakMatch, TrackError> {
    let bounds = GeoBoundingBox::around(summit.latitude, summit.longitude)
        .extend(margin_for_feet(SEARCH_RADIUS_FEET));
    let peaks = catalog.search_peaks(&bounds).map_err(TrackError::FindPeaks)?;
    nearest_peak(summit, peaks)
}

/// Rank candidates by great-circle distance; equal distances keep catalog order.
pub fn nearest_peak(summit: &GeoPoint, peaks: Vec<Peak>) -> Result<PeakMatch, TrackError> {
    let candidates = peaks.len();
    info!("Found {} matching peaks", candidates);

    let mut ranked: Vec<(f64, Peak)> = peaks
        .into_iter()
        .map(|p| (summit.distance_to(p.latitude, p.longitude), p))
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

    if candidates > 1 {
        let names: Vec<String> = ranked
            .iter()
            .map(|(d, p)| format!("{:?} ({:.0} m)", p.name, d))
            .collect();
        warn!(
            "expected 1 matching peak, found {}: {}. Using nearest.",
            candidates,
            names.join(", ")
        );
    }

    let (_, peak) = ranked.into_iter().next().ok_or(TrackError::NoPeaksFound)?;
    Ok(PeakMatch { peak, candidates })
}
