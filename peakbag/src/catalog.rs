use std::fmt;

use thiserror::Error;

use crate::{AscentList, AscentRecord, GeoBoundingBox, Peak};

pub type ClimberId = u64;
pub type SubmissionId = u64;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("catalog refused access (status {0})")]
    Unauthorized(u16),
    #[error("not logged in")]
    NotAuthenticated,
}

impl CatalogError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CatalogError::Unauthorized(_))
    }
}

/// Remote peak catalog holding the climber's ascent log.
pub trait PeakCatalog {
    fn authenticate(&mut self, credentials: &Credentials) -> Result<ClimberId, CatalogError>;

    fn search_peaks(&self, bounds: &GeoBoundingBox) -> Result<Vec<Peak>, CatalogError>;

    /// Ascents already logged by the authenticated climber.
    fn list_ascents(&self) -> Result<AscentList, CatalogError>;

    fn submit_ascent(&mut self, ascent: &AscentRecord) -> Result<SubmissionId, CatalogError>;
}

impl<C: PeakCatalog + ?Sized> PeakCatalog for &mut C {
    fn authenticate(&mut self, credentials: &Credentials) -> Result<ClimberId, CatalogError> {
        (**self).authenticate(credentials)
    }

    fn search_peaks(&self, bounds: &GeoBoundingBox) -> Result<Vec<Peak>, CatalogError> {
        (**self).search_peaks(bounds)
    }

    fn list_ascents(&self) -> Result<AscentList, CatalogError> {
        (**self).list_ascents()
    }

    fn submit_ascent(&mut self, ascent: &AscentRecord) -> Result<SubmissionId, CatalogError> {
        (**self).submit_ascent(ascent)
    }
}
