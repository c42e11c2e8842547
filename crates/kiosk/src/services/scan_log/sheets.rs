//! Google Sheets scan log.
//!
//! Authenticates as a service account (RS256 JWT bearer grant), then talks to
//! the Sheets v4 values API:
//!
//! - `GET  spreadsheets/{id}` - startup probe
//! - `GET  values/'{sheet}'!A1:F1` - header check
//! - `PUT  values/'{sheet}'!A1:F1` - header write when the sheet is empty
//! - `POST values/'{sheet}'!A:F:append` - one row per scan

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use checkin_core::{SCAN_LOG_HEADER, ScanLogEntry};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::ScanLogConfig;

/// Production Sheets API base.
const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com/";

/// OAuth scope granting read/write access to spreadsheets.
const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Grant type for the JWT bearer flow.
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each signed assertion.
const ASSERTION_LIFETIME: Duration = Duration::from_secs(3600);

/// Refresh access tokens this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Errors from the spreadsheet sink.
#[derive(Debug, Error)]
pub enum SheetsError {
    /// A required setting is missing.
    #[error("spreadsheet not configured: {0}")]
    NotConfigured(&'static str),

    /// The service-account key file could not be read.
    #[error("failed to read service-account key: {0}")]
    KeyFile(#[from] std::io::Error),

    /// The key file is not a valid service-account key.
    #[error("invalid service-account key: {0}")]
    InvalidKey(String),

    /// Signing the bearer assertion failed.
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token endpoint rejected the assertion.
    #[error("token exchange failed with status {status}: {message}")]
    TokenExchange { status: u16, message: String },

    /// Sheets API answered with a non-success status.
    #[error("Sheets API error {status}: {message}")]
    Api { status: u16, message: String },
}

/// The fields of a service-account key file that the sink needs.
#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

impl ServiceAccountKey {
    async fn from_file(path: &Path) -> Result<Self, SheetsError> {
        let raw = tokio::fs::read(path).await?;
        serde_json::from_slice(&raw).map_err(|e| SheetsError::InvalidKey(e.to_string()))
    }
}

/// JWT claims for the bearer assertion.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Service-account credentials with a cached access token.
struct ServiceAccountAuth {
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("signing_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ServiceAccountAuth {
    fn new(key: ServiceAccountKey) -> Result<Self, SheetsError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        Ok(Self {
            client_email: key.client_email,
            token_uri: key.token_uri,
            signing_key,
            token: Mutex::new(None),
        })
    }

    /// Return a valid access token, exchanging a fresh assertion if needed.
    async fn access_token(&self, client: &reqwest::Client) -> Result<String, SheetsError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(token.value.clone());
        }

        let token = self.exchange(client).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn exchange(&self, client: &reqwest::Client) -> Result<CachedToken, SheetsError> {
        let assertion = self.sign_assertion()?;

        let response = client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SheetsError::TokenExchange {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        tracing::debug!(expires_in = token.expires_in, "Spreadsheet access token refreshed");

        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }

    fn sign_assertion(&self) -> Result<String, SheetsError> {
        let iat = chrono::Utc::now().timestamp();
        #[allow(clippy::cast_possible_wrap)] // One hour always fits in i64
        let exp = iat + ASSERTION_LIFETIME.as_secs() as i64;

        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &self.token_uri,
            iat,
            exp,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.signing_key,
        )?)
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Appends scan rows to one sheet of a spreadsheet.
#[derive(Debug, Clone)]
pub struct SheetsSink {
    client: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    sheet_name: String,
    auth: Arc<ServiceAccountAuth>,
}

impl SheetsSink {
    /// Authenticate, probe the spreadsheet and make sure the header row exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the key file is missing or invalid, the token
    /// exchange fails, or the spreadsheet cannot be read. A failed header
    /// check is logged and tolerated.
    pub async fn connect(spreadsheet_id: &str, config: &ScanLogConfig) -> Result<Self, SheetsError> {
        Self::connect_to(DEFAULT_API_BASE, spreadsheet_id, config).await
    }

    /// [`SheetsSink::connect`] against an alternative API base URL.
    ///
    /// # Errors
    ///
    /// Same as [`SheetsSink::connect`].
    pub async fn connect_to(
        api_base: &str,
        spreadsheet_id: &str,
        config: &ScanLogConfig,
    ) -> Result<Self, SheetsError> {
        let key_path = config
            .service_account_path
            .as_deref()
            .ok_or(SheetsError::NotConfigured("GOOGLE_SERVICE_ACCOUNT_PATH"))?;
        let key = ServiceAccountKey::from_file(key_path).await?;

        let sink = Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_name: config.sheet_name.clone(),
            auth: Arc::new(ServiceAccountAuth::new(key)?),
        };

        sink.probe().await?;
        if let Err(e) = sink.ensure_header().await {
            tracing::warn!(error = %e, sheet = %sink.sheet_name, "Spreadsheet header check failed");
        }

        Ok(sink)
    }

    /// Append one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be obtained or the API rejects
    /// the append.
    pub async fn append(&self, entry: &ScanLogEntry) -> Result<(), SheetsError> {
        let url = format!(
            "{}:append?valueInputOption=RAW",
            self.values_url(&a1_range(&self.sheet_name, "A:F"))
        );
        let body = json!({ "values": [entry.to_row()] });

        let response = self
            .client
            .post(url)
            .bearer_auth(self.auth.access_token(&self.client).await?)
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn probe(&self) -> Result<(), SheetsError> {
        let response = self
            .client
            .get(self.spreadsheet_url())
            .query(&[("fields", "spreadsheetId")])
            .bearer_auth(self.auth.access_token(&self.client).await?)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn ensure_header(&self) -> Result<(), SheetsError> {
        let url = self.values_url(&a1_range(&self.sheet_name, "A1:F1"));
        let token = self.auth.access_token(&self.client).await?;

        let response = self.client.get(&url).bearer_auth(&token).send().await?;
        let existing: ValueRange = check_status(response).await?.json().await?;
        if existing.values.first().is_some_and(|row| !row.is_empty()) {
            return Ok(());
        }

        let response = self
            .client
            .put(&url)
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&token)
            .json(&json!({ "values": [SCAN_LOG_HEADER] }))
            .send()
            .await?;
        check_status(response).await?;
        tracing::info!(sheet = %self.sheet_name, "Spreadsheet header row written");
        Ok(())
    }

    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}",
            self.api_base,
            urlencoding::encode(&self.spreadsheet_id)
        )
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/values/{}",
            self.spreadsheet_url(),
            urlencoding::encode(range)
        )
    }
}

/// A1 notation for `cells` on `sheet`, with the sheet name quoted so names
/// containing spaces or punctuation resolve.
fn a1_range(sheet: &str, cells: &str) -> String {
    format!("'{}'!{cells}", sheet.replace('\'', "''"))
}

/// Turn a non-success response into [`SheetsError::Api`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(SheetsError::Api {
        status: status.as_u16(),
        message: if message.is_empty() {
            status.canonical_reason().unwrap_or("unknown").to_string()
        } else {
            message
        },
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn config(key: Option<PathBuf>) -> ScanLogConfig {
        ScanLogConfig {
            spreadsheet_id: Some("sheet-id".to_string()),
            service_account_path: key,
            sheet_name: "Check-ins".to_string(),
            csv_path: PathBuf::from("unused.csv"),
        }
    }

    fn write_key(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sa-key-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_missing_key_path_is_not_configured() {
        let err = SheetsSink::connect("sheet-id", &config(None)).await.unwrap_err();
        assert!(matches!(err, SheetsError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_unreadable_key_file() {
        let missing = std::env::temp_dir().join(format!("absent-{}.json", uuid::Uuid::new_v4()));
        let err = SheetsSink::connect("sheet-id", &config(Some(missing)))
            .await
            .unwrap_err();
        assert!(matches!(err, SheetsError::KeyFile(_)));
    }

    #[tokio::test]
    async fn test_key_without_required_fields() {
        let path = write_key(r#"{"type":"service_account","client_email":"a@b"}"#);
        let err = SheetsSink::connect("sheet-id", &config(Some(path.clone())))
            .await
            .unwrap_err();
        assert!(matches!(err, SheetsError::InvalidKey(_)));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_key_with_bad_pem() {
        let path = write_key(
            r#"{"client_email":"a@b","private_key":"not a pem","token_uri":"http://127.0.0.1:9/token"}"#,
        );
        let err = SheetsSink::connect("sheet-id", &config(Some(path.clone())))
            .await
            .unwrap_err();
        assert!(matches!(err, SheetsError::Jwt(_)));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_values_url_encodes_range() {
        let sink = SheetsSink {
            client: reqwest::Client::new(),
            api_base: "https://sheets.example.test".to_string(),
            spreadsheet_id: "abc123".to_string(),
            sheet_name: "Check-ins".to_string(),
            auth: Arc::new(ServiceAccountAuth {
                client_email: "a@b".to_string(),
                token_uri: "https://oauth.example.test/token".to_string(),
                signing_key: EncodingKey::from_secret(b"unused"),
                token: Mutex::new(None),
            }),
        };
        assert_eq!(
            sink.values_url(&a1_range(&sink.sheet_name, "A:F")),
            "https://sheets.example.test/v4/spreadsheets/abc123/values/%27Check-ins%27%21A%3AF"
        );
    }

    #[test]
    fn test_a1_range_quotes_sheet_name() {
        assert_eq!(a1_range("Sheet1", "A1:F1"), "'Sheet1'!A1:F1");
        assert_eq!(a1_range("Check In", "A:F"), "'Check In'!A:F");
        assert_eq!(a1_range("O'Brien's Desk", "A:F"), "'O''Brien''s Desk'!A:F");
    }
}
