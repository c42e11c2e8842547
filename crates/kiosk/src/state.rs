//! Application state shared across handlers.
//!
//! Everything here is selected once at startup and read-only afterwards.

use std::sync::Arc;

use thiserror::Error;

use crate::config::KioskConfig;
use crate::services::directory::{Directory, DirectoryError};
use crate::services::identity::{AuthError, IdentityProvider, provider_from_config};
use crate::services::scan_log::ActivityLogger;

/// Errors that prevent the kiosk from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Identity provider could not be built.
    #[error("identity provider: {0}")]
    Auth(#[from] AuthError),

    /// Directory strategy could not be built.
    #[error("directory: {0}")]
    Directory(#[from] DirectoryError),
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: KioskConfig,
    identity: Arc<dyn IdentityProvider>,
    directory: Directory,
    logger: ActivityLogger,
}

impl AppState {
    /// Assemble state from already-selected components.
    #[must_use]
    pub fn new(
        config: KioskConfig,
        identity: Arc<dyn IdentityProvider>,
        directory: Directory,
        logger: ActivityLogger,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                identity,
                directory,
                logger,
            }),
        }
    }

    /// Select every component from configuration.
    ///
    /// The log sink probe may take a network round trip; its failure is not
    /// an error (the CSV sink is used instead).
    ///
    /// # Errors
    ///
    /// Returns an error if the identity provider or directory cannot be built.
    pub async fn from_config(config: KioskConfig) -> Result<Self, StartupError> {
        let identity = provider_from_config(&config.auth)?;
        let directory = Directory::from_config(&config.directory)?;
        let logger = ActivityLogger::initialize(&config.scan_log).await;

        Ok(Self::new(config, identity, directory, logger))
    }

    /// Get the kiosk configuration.
    #[must_use]
    pub fn config(&self) -> &KioskConfig {
        &self.inner.config
    }

    /// Get the identity provider.
    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.identity.as_ref()
    }

    /// Get the directory.
    #[must_use]
    pub fn directory(&self) -> &Directory {
        &self.inner.directory
    }

    /// Get the activity logger.
    #[must_use]
    pub fn logger(&self) -> &ActivityLogger {
        &self.inner.logger
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("identity", &self.inner.identity.name())
            .field("directory", &self.inner.directory.kind())
            .field("log_sink", &self.inner.logger.sink().kind())
            .finish_non_exhaustive()
    }
}
