//! Remote directory API client.

use checkin_core::{PersonRecord, ScanId};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use super::DirectoryError;

/// Client for the campus directory's student endpoint.
#[derive(Debug, Clone)]
pub struct RemoteDirectory {
    client: reqwest::Client,
    base_url: Url,
}

impl RemoteDirectory {
    /// Create a new directory client.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(base_url: Url, token: &SecretString) -> Result<Self, DirectoryError> {
        let mut headers = HeaderMap::new();

        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| DirectoryError::NotConfigured("CSGWEBADMIN_TOKEN is not a valid header value"))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self { client, base_url })
    }

    /// URL of the student record for a scan identifier.
    fn student_url(&self, scan_id: &ScanId) -> String {
        format!(
            "{}/api/student/{}",
            self.base_url.as_str().trim_end_matches('/'),
            urlencoding::encode(scan_id.as_str())
        )
    }

    /// Fetch the student record for a scan identifier.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, on any non-success status other
    /// than 404, or if the body lacks a name or short id.
    pub async fn lookup(&self, scan_id: &ScanId) -> Result<Option<PersonRecord>, DirectoryError> {
        let response = self.client.get(self.student_url(scan_id)).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Directory lookup failed");
            return Err(DirectoryError::Api {
                status: status.as_u16(),
            });
        }

        let student: StudentResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::MalformedResponse(e.to_string()))?;

        student.into_person().map(Some)
    }
}

/// Student resource from the directory API.
///
/// Deployments disagree on field names, so both spellings are accepted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudentResponse {
    display_name: Option<String>,
    name: Option<String>,
    andrew_id: Option<String>,
    username: Option<String>,
}

impl StudentResponse {
    fn into_person(self) -> Result<PersonRecord, DirectoryError> {
        let name = self
            .display_name
            .filter(|s| !s.is_empty())
            .or(self.name.filter(|s| !s.is_empty()))
            .ok_or_else(|| DirectoryError::MalformedResponse("missing displayName/name".into()))?;
        let short_id = self
            .andrew_id
            .filter(|s| !s.is_empty())
            .or(self.username.filter(|s| !s.is_empty()))
            .ok_or_else(|| DirectoryError::MalformedResponse("missing andrewId/username".into()))?;

        Ok(PersonRecord::new(name, short_id))
    }
}
