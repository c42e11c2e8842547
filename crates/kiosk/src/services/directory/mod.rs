//! Directory lookup: scan identifier to person record.
//!
//! Two interchangeable strategies, chosen once from configuration:
//!
//! - [`StaticDirectory`] - fixed in-memory table for local/offline operation
//! - [`RemoteDirectory`] - bearer-authenticated call to the campus directory API
//!
//! Neither strategy caches or retries; every call is independent.

mod remote;
mod static_table;

pub use remote::RemoteDirectory;
pub use static_table::StaticDirectory;

use std::time::Duration;

use checkin_core::{PersonRecord, ScanId};
use thiserror::Error;

use crate::config::DirectoryConfig;

/// Delay applied to static lookups so the kiosk behaves like it does against the real API.
const SIMULATED_LATENCY: Duration = Duration::from_millis(300);

/// Errors that can occur when resolving a scan identifier.
///
/// "Not found" is not an error: [`Directory::lookup`] returns `Ok(None)`.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// HTTP request failed (connection, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Directory API answered with a non-success, non-404 status.
    #[error("directory API error: {status}")]
    Api { status: u16 },

    /// Response body did not contain a name and short id.
    #[error("malformed directory response: {0}")]
    MalformedResponse(String),

    /// Remote strategy selected without its settings.
    #[error("directory not configured: {0}")]
    NotConfigured(&'static str),
}

/// The configured lookup strategy.
#[derive(Debug, Clone)]
pub enum Directory {
    /// Fixed table.
    Static(StaticDirectory),
    /// Remote directory API.
    Remote(RemoteDirectory),
}

impl Directory {
    /// Select the strategy described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote strategy is selected but its URL or
    /// token is missing, or if the HTTP client cannot be built.
    pub fn from_config(config: &DirectoryConfig) -> Result<Self, DirectoryError> {
        if config.mock {
            return Ok(Self::Static(
                StaticDirectory::builtin().with_latency(SIMULATED_LATENCY),
            ));
        }

        let base_url = config
            .base_url
            .clone()
            .ok_or(DirectoryError::NotConfigured("CSGWEBADMIN_URL"))?;
        let token = config
            .token
            .as_ref()
            .ok_or(DirectoryError::NotConfigured("CSGWEBADMIN_TOKEN"))?;

        Ok(Self::Remote(RemoteDirectory::new(base_url, token)?))
    }

    /// Resolve a scan identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote directory is unreachable or answers with
    /// anything other than success or 404.
    pub async fn lookup(&self, scan_id: &ScanId) -> Result<Option<PersonRecord>, DirectoryError> {
        match self {
            Self::Static(table) => Ok(table.lookup(scan_id).await),
            Self::Remote(client) => client.lookup(scan_id).await,
        }
    }

    /// Short name of the active strategy, for startup logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Static(_) => "static table",
            Self::Remote(_) => "remote directory",
        }
    }
}
