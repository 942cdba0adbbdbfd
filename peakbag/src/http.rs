use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    AscentList, AscentRecord, CatalogError, ClimberId, Credentials, GeoBoundingBox, Peak,
    PeakCatalog, SubmissionId,
};

/// Peak catalog spoken to over HTTP with JSON bodies. The login sets a
/// session cookie that later calls reuse.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
    climber: Option<ClimberId>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    climber_id: ClimberId,
}

#[derive(Deserialize)]
struct SubmitResponse {
    ascent_id: SubmissionId,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(concat!("peakbag/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            climber: None,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn climber(&self) -> Result<ClimberId, CatalogError> {
        self.climber.ok_or(CatalogError::NotAuthenticated)
    }
}

fn check(response: Response) -> Result<Response, CatalogError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(CatalogError::Unauthorized(status.as_u16()));
    }
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(CatalogError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

impl PeakCatalog for HttpCatalog {
    fn authenticate(&mut self, credentials: &Credentials) -> Result<ClimberId, CatalogError> {
        let request = LoginRequest {
            username: &credentials.username,
            password: &credentials.password,
        };
        let response = self.client.post(self.url("login")).json(&request).send()?;
        let login: LoginResponse = check(response)?.json()?;
        self.climber = Some(login.climber_id);
        Ok(login.climber_id)
    }

    fn search_peaks(&self, bounds: &GeoBoundingBox) -> Result<Vec<Peak>, CatalogError> {
        debug!("Searching peaks in {:?}", bounds);
        let response = self
            .client
            .get(self.url("peaks"))
            .query(&[
                ("min_lat", bounds.min_lat),
                ("max_lat", bounds.max_lat),
                ("min_lng", bounds.min_lng),
                ("max_lng", bounds.max_lng),
            ])
            .send()?;
        Ok(check(response)?.json()?)
    }

    fn list_ascents(&self) -> Result<AscentList, CatalogError> {
        let climber = self.climber()?;
        let response = self
            .client
            .get(self.url(&format!("climbers/{climber}/ascents")))
            .send()?;
        Ok(check(response)?.json()?)
    }

    fn submit_ascent(&mut self, ascent: &AscentRecord) -> Result<SubmissionId, CatalogError> {
        self.climber()?;
        let response = self.client.post(self.url("ascents")).json(ascent).send()?;
        let submitted: SubmitResponse = check(response)?.json()?;
        Ok(submitted.ascent_id)
    }
}
