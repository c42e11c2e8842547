//! Integration tests for the badge check-in kiosk.
//!
//! Each test spawns the real router (full middleware stack, in-memory
//! sessions) on an ephemeral local port and drives it over HTTP with a
//! cookie-aware client. Upstream services (directory API, spreadsheet API)
//! are replaced by small local axum servers.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p checkin-integration-tests
//! ```

#![allow(clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use checkin_kiosk::config::{
    AuthConfig, DirectoryConfig, Environment, KioskConfig, SamlConfig, ScanLogConfig,
};
use checkin_kiosk::services::directory::{Directory, StaticDirectory};
use checkin_kiosk::services::identity::{BypassProvider, IdentityProvider};
use checkin_kiosk::services::scan_log::{ActivityLogger, CsvSink, ScanLogSink};
use checkin_kiosk::state::AppState;
use reqwest::{Client, StatusCode, redirect};
use secrecy::SecretString;
use serde_json::Value;
use tokio::task::JoinHandle;

/// Serve a router on an ephemeral local port.
///
/// Returns the base URL (no trailing slash) and the server task.
pub async fn serve(router: axum::Router) -> (String, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr: SocketAddr = listener.local_addr().expect("Listener has no address");
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Test server error");
    });
    (format!("http://{addr}"), handle)
}

/// A unique CSV path under the system temp directory.
#[must_use]
pub fn temp_log_path() -> PathBuf {
    std::env::temp_dir().join(format!("checkin-it-{}.csv", uuid::Uuid::new_v4()))
}

/// Configuration for a local kiosk with both mocks enabled.
#[must_use]
pub fn test_config(log_path: &Path) -> KioskConfig {
    KioskConfig {
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://localhost".to_string(),
        environment: Environment::Development,
        session_secret: SecretString::from(format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        )),
        auth: AuthConfig {
            mock: true,
            saml: SamlConfig {
                entry_point: None,
                issuer: "rfid-checkin-app".to_string(),
                callback_url: "http://localhost/auth/saml/callback".to_string(),
                idp_cert: None,
                clock_skew: None,
            },
        },
        directory: DirectoryConfig {
            mock: true,
            base_url: None,
            token: None,
        },
        scan_log: ScanLogConfig {
            spreadsheet_id: None,
            service_account_path: None,
            sheet_name: "Sheet1".to_string(),
            csv_path: log_path.to_path_buf(),
        },
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Builder for a [`TestKiosk`].
pub struct KioskBuilder {
    identity: Arc<dyn IdentityProvider>,
    directory: Directory,
    logger: Option<ActivityLogger>,
    log_path: PathBuf,
}

impl Default for KioskBuilder {
    fn default() -> Self {
        Self {
            identity: Arc::new(BypassProvider),
            directory: Directory::Static(StaticDirectory::builtin()),
            logger: None,
            log_path: temp_log_path(),
        }
    }
}

impl KioskBuilder {
    /// Use a different identity provider.
    #[must_use]
    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    /// Use a different directory.
    #[must_use]
    pub fn directory(mut self, directory: Directory) -> Self {
        self.directory = directory;
        self
    }

    /// Use a different activity logger instead of the per-test CSV file.
    #[must_use]
    pub fn logger(mut self, logger: ActivityLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Start the kiosk.
    pub async fn spawn(self) -> TestKiosk {
        let config = test_config(&self.log_path);
        let logger = self
            .logger
            .unwrap_or_else(|| ActivityLogger::new(ScanLogSink::Csv(CsvSink::new(&self.log_path))));
        let state = AppState::new(config, self.identity, self.directory, logger);

        let (base_url, server) = serve(checkin_kiosk::app(state)).await;

        TestKiosk {
            client: client(redirect::Policy::default()),
            base_url,
            log_path: self.log_path,
            server,
        }
    }
}

/// A running kiosk plus a browser-like client with its own cookie jar.
pub struct TestKiosk {
    /// Base URL of the running server.
    pub base_url: String,
    /// Client that follows redirects and keeps cookies.
    pub client: Client,
    /// CSV scan log written by this kiosk.
    pub log_path: PathBuf,
    server: JoinHandle<()>,
}

impl TestKiosk {
    /// Kiosk with the development bypass, the built-in table and a CSV log.
    pub async fn spawn() -> Self {
        KioskBuilder::default().spawn().await
    }

    /// Absolute URL for a path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A fresh client that does not follow redirects (separate cookie jar).
    #[must_use]
    pub fn manual_client(&self) -> Client {
        client(redirect::Policy::none())
    }

    /// Sign in through `/auth/login` and land on the kiosk page.
    pub async fn login(&self) {
        let response = self
            .client
            .get(self.url("/auth/login"))
            .send()
            .await
            .expect("Login request failed");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.url().path(), "/");
    }

    /// POST a raw body to `/scan`.
    pub async fn scan_raw(&self, body: impl Into<reqwest::Body>) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url("/scan"))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("Scan request failed");
        let status = response.status();
        let json = response.json().await.expect("Scan response is not JSON");
        (status, json)
    }

    /// POST `{ "rfidId": id }` to `/scan`.
    pub async fn scan(&self, id: &str) -> (StatusCode, Value) {
        self.scan_raw(serde_json::json!({ "rfidId": id }).to_string())
            .await
    }

    /// Data rows of the CSV log (header excluded); empty if the file does not exist.
    #[must_use]
    pub fn log_rows(&self) -> Vec<Vec<String>> {
        if !self.log_path.exists() {
            return Vec::new();
        }
        let mut reader = csv::Reader::from_path(&self.log_path).expect("Failed to open scan log");
        reader
            .records()
            .map(|record| {
                record
                    .expect("Malformed scan log row")
                    .iter()
                    .map(String::from)
                    .collect()
            })
            .collect()
    }
}

impl Drop for TestKiosk {
    fn drop(&mut self) {
        self.server.abort();
        let _ = std::fs::remove_file(&self.log_path);
    }
}

fn client(policy: redirect::Policy) -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(policy)
        .build()
        .expect("Failed to create HTTP client")
}
