//! Fixtures shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::{
    AscentList, AscentRecord, CatalogError, ClimberId, ConvertError, Credentials,
    ExistingAscent, GeoBoundingBox, GeoPoint, Peak, PeakCatalog, SubmissionId, TrackConverter,
    TrackFormat,
};

pub(crate) fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 7, 4, hour, minute, 0).unwrap()
}

pub(crate) fn point(lat: f64, lng: f64, elevation: f64, time: DateTime<Utc>) -> GeoPoint {
    GeoPoint::new(lat, lng).with_elevation(elevation).with_time(time)
}

/// Up to 44.1,-71.1 at 2000 m and back down to 1800 m.
pub(crate) fn summit_hike() -> Vec<GeoPoint> {
    vec![
        point(44.0, -71.0, 1000.0, ts(10, 0)),
        point(44.1, -71.1, 2000.0, ts(11, 30)),
        point(44.05, -71.05, 1800.0, ts(13, 0)),
    ]
}

pub(crate) fn summit_peak() -> Peak {
    Peak {
        id: 7,
        name: "Mount Summit".into(),
        latitude: 44.1,
        longitude: -71.1,
    }
}

/// Render single-segment tracks as a GPX 1.1 document.
pub(crate) fn gpx_document(tracks: &[(&str, Vec<GeoPoint>)]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <gpx version=\"1.1\" creator=\"peakbag-tests\" xmlns=\"http://www.topografix.com/GPX/1/1\">\n",
    );
    for (name, points) in tracks {
        let _ = write!(out, "  <trk>\n    <name>{name}</name>\n    <trkseg>\n");
        for p in points {
            let _ = write!(out, "      <trkpt lat=\"{}\" lon=\"{}\">", p.latitude, p.longitude);
            if let Some(ele) = p.elevation {
                let _ = write!(out, "<ele>{ele}</ele>");
            }
            if let Some(time) = p.time {
                let _ = write!(out, "<time>{}</time>", time.to_rfc3339_opts(SecondsFormat::Secs, true));
            }
            out.push_str("</trkpt>\n");
        }
        out.push_str("    </trkseg>\n  </trk>\n");
    }
    out.push_str("</gpx>\n");
    out
}

pub(crate) fn write_track_file(dir: &Path, name: &str, tracks: &[(&str, Vec<GeoPoint>)]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, gpx_document(tracks)).unwrap();
    path
}

/// In-memory catalog. Submissions are appended to the ascent list the way the
/// real service would report them on the next listing.
#[derive(Debug, Default)]
pub(crate) struct FakeCatalog {
    pub peaks: Vec<Peak>,
    pub ascents: Vec<ExistingAscent>,
    pub submitted: Vec<AscentRecord>,
    pub reject_login: bool,
    pub reject_uploads: bool,
    pub session_expired: bool,
    /// Session drops once this many listings have been answered.
    pub expire_after_listings: Option<usize>,
    pub listings: Cell<usize>,
    pub logged_in: bool,
}

impl FakeCatalog {
    pub fn with_peaks(peaks: Vec<Peak>) -> Self {
        Self {
            peaks,
            ..Self::default()
        }
    }
}

impl PeakCatalog for FakeCatalog {
    fn authenticate(&mut self, credentials: &Credentials) -> Result<ClimberId, CatalogError> {
        if self.reject_login {
            return Err(CatalogError::Unauthorized(401));
        }
        assert!(!credentials.username.is_empty());
        self.logged_in = true;
        Ok(42)
    }

    fn search_peaks(&self, bounds: &GeoBoundingBox) -> Result<Vec<Peak>, CatalogError> {
        Ok(self
            .peaks
            .iter()
            .filter(|p| bounds.contains(p.latitude, p.longitude))
            .cloned()
            .collect())
    }

    fn list_ascents(&self) -> Result<AscentList, CatalogError> {
        if !self.logged_in {
            return Err(CatalogError::NotAuthenticated);
        }
        let answered = self.listings.get();
        if self.session_expired || self.expire_after_listings.is_some_and(|n| answered >= n) {
            return Err(CatalogError::Unauthorized(401));
        }
        self.listings.set(answered + 1);
        Ok(AscentList::new(self.ascents.clone()))
    }

    fn submit_ascent(&mut self, ascent: &AscentRecord) -> Result<SubmissionId, CatalogError> {
        if self.reject_uploads {
            return Err(CatalogError::Status {
                status: 500,
                body: "upload rejected".into(),
            });
        }
        self.ascents.push(ExistingAscent {
            peak_id: ascent.peak_id,
            date: ascent.date,
        });
        self.submitted.push(ascent.clone());
        Ok(1000 + self.submitted.len() as SubmissionId)
    }
}

/// Treats `.gpx` inputs as already normalized and copies them; every other
/// format fails the way an external converter would.
#[derive(Debug, Default)]
pub(crate) struct CopyConverter {
    pub outputs: RefCell<Vec<PathBuf>>,
}

impl TrackConverter for CopyConverter {
    fn convert(&self, input: &Path, format: TrackFormat, output: &Path) -> Result<(), ConvertError> {
        self.outputs.borrow_mut().push(output.to_path_buf());
        if format != TrackFormat::Gpx {
            return Err(ConvertError::Failed {
                status: "exit status: 1".into(),
                output: format!("cannot read {}", input.display()),
            });
        }
        fs::copy(input, output).map_err(ConvertError::TempFile)?;
        Ok(())
    }
}
