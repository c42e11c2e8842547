//! Kiosk configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required (production)
//! - `SESSION_SECRET` - Session cookie signing secret (min 32 chars, high entropy)
//! - `SAML_ENTRY_POINT` - Identity provider SSO URL
//! - `CSGWEBADMIN_URL` - Directory API base URL
//! - `CSGWEBADMIN_TOKEN` - Directory API bearer token
//!
//! ## Optional
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 3000)
//! - `PUBLIC_BASE_URL` - Public URL (default: `http://localhost:{PORT}`)
//! - `APP_ENV` - `development` enables both mocks (default: production)
//! - `MOCK_AUTH` - Bypass SSO with a fixed development identity
//! - `MOCK_CSGWEBADMIN` - Use the built-in directory table
//! - `SAML_ISSUER` - Service provider entity id (default: rfid-checkin-app)
//! - `SAML_CALLBACK_URL` - Assertion consumer URL (default: `{PUBLIC_BASE_URL}/auth/saml/callback`)
//! - `SAML_CERT` - Identity provider signing certificate (PEM or bare base64)
//! - `SAML_CLOCK_SKEW_SECS` - Enforce assertion validity windows with this skew
//! - `GOOGLE_SPREADSHEET_ID` - Spreadsheet log sink
//! - `GOOGLE_SERVICE_ACCOUNT_PATH` - Service-account key file for the spreadsheet
//! - `GOOGLE_SHEET_NAME` - Sheet tab (default: Sheet1)
//! - `SCAN_LOG_PATH` - CSV fallback path (default: scan-log.csv)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "change-this",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Local development: SSO and directory are mocked.
    Development,
    /// Everything else.
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("development") || value.eq_ignore_ascii_case("dev") {
            Self::Development
        } else {
            Self::Production
        }
    }

    /// Returns true for [`Environment::Development`].
    #[must_use]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Kiosk application configuration.
#[derive(Debug, Clone)]
pub struct KioskConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the kiosk
    pub base_url: String,
    /// Deployment environment
    pub environment: Environment,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Identity gate configuration
    pub auth: AuthConfig,
    /// Directory lookup configuration
    pub directory: DirectoryConfig,
    /// Scan log sink configuration
    pub scan_log: ScanLogConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Identity gate configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Bypass SSO and log everyone in as the development identity.
    pub mock: bool,
    /// SAML service provider settings (ignored when `mock` is set).
    pub saml: SamlConfig,
}

/// SAML service provider settings.
#[derive(Debug, Clone)]
pub struct SamlConfig {
    /// Identity provider SSO URL (HTTP-Redirect binding).
    pub entry_point: Option<Url>,
    /// Our entity id.
    pub issuer: String,
    /// Assertion consumer service URL.
    pub callback_url: String,
    /// Identity provider signing certificate.
    pub idp_cert: Option<String>,
    /// Allowed clock skew for validity windows; `None` skips the checks.
    pub clock_skew: Option<Duration>,
}

/// Directory lookup configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct DirectoryConfig {
    /// Use the built-in table instead of the remote API.
    pub mock: bool,
    /// Remote directory API base URL.
    pub base_url: Option<Url>,
    /// Remote directory API bearer token.
    pub token: Option<SecretString>,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("mock", &self.mock)
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Scan log sink configuration.
#[derive(Debug, Clone)]
pub struct ScanLogConfig {
    /// Spreadsheet to append to; `None` selects the CSV sink.
    pub spreadsheet_id: Option<String>,
    /// Service-account key file used to authenticate to the spreadsheet.
    pub service_account_path: Option<PathBuf>,
    /// Sheet tab name.
    pub sheet_name: String,
    /// CSV fallback file.
    pub csv_path: PathBuf,
}

impl KioskConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the session secret fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;
        let base_url = get_optional_env("PUBLIC_BASE_URL")
            .map_or_else(|| format!("http://localhost:{port}"), |url| {
                url.trim_end_matches('/').to_string()
            });
        let environment = Environment::parse(&get_env_or_default("APP_ENV", "production"));

        let auth = AuthConfig::from_env(environment, &base_url)?;
        let session_secret = if auth.mock {
            match get_optional_env("SESSION_SECRET") {
                Some(value) => {
                    let secret = SecretString::from(value);
                    validate_session_secret(&secret, "SESSION_SECRET")?;
                    secret
                }
                // Bypass sessions carry no real identity; they may die with the process.
                None => ephemeral_secret(),
            }
        } else {
            let secret = get_validated_secret("SESSION_SECRET")?;
            validate_session_secret(&secret, "SESSION_SECRET")?;
            secret
        };

        let directory = DirectoryConfig::from_env(environment)?;
        let scan_log = ScanLogConfig::from_env();

        Ok(Self {
            host,
            port,
            base_url,
            environment,
            session_secret,
            auth,
            directory,
            scan_log,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl AuthConfig {
    fn from_env(environment: Environment, base_url: &str) -> Result<Self, ConfigError> {
        let mock = environment.is_development() || get_flag("MOCK_AUTH");

        let entry_point = get_optional_env("SAML_ENTRY_POINT")
            .map(|raw| parse_url("SAML_ENTRY_POINT", &raw))
            .transpose()?;
        if !mock && entry_point.is_none() {
            return Err(ConfigError::MissingEnvVar("SAML_ENTRY_POINT".to_string()));
        }

        let clock_skew = get_optional_env("SAML_CLOCK_SKEW_SECS")
            .map(|raw| {
                raw.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                    ConfigError::InvalidEnvVar("SAML_CLOCK_SKEW_SECS".to_string(), e.to_string())
                })
            })
            .transpose()?;

        Ok(Self {
            mock,
            saml: SamlConfig {
                entry_point,
                issuer: get_env_or_default("SAML_ISSUER", "rfid-checkin-app"),
                callback_url: get_optional_env("SAML_CALLBACK_URL")
                    .unwrap_or_else(|| format!("{base_url}/auth/saml/callback")),
                idp_cert: get_optional_env("SAML_CERT"),
                clock_skew,
            },
        })
    }
}

impl DirectoryConfig {
    fn from_env(environment: Environment) -> Result<Self, ConfigError> {
        let mock = environment.is_development() || get_flag("MOCK_CSGWEBADMIN");
        if mock {
            return Ok(Self {
                mock,
                base_url: None,
                token: None,
            });
        }

        let base_url = parse_url("CSGWEBADMIN_URL", &get_required_env("CSGWEBADMIN_URL")?)?;
        let token = get_required_secret("CSGWEBADMIN_TOKEN")?;

        Ok(Self {
            mock,
            base_url: Some(base_url),
            token: Some(token),
        })
    }
}

impl ScanLogConfig {
    fn from_env() -> Self {
        Self {
            spreadsheet_id: get_optional_env("GOOGLE_SPREADSHEET_ID").filter(|id| !id.is_empty()),
            service_account_path: get_optional_env("GOOGLE_SERVICE_ACCOUNT_PATH")
                .map(PathBuf::from),
            sheet_name: get_env_or_default("GOOGLE_SHEET_NAME", "Sheet1"),
            csv_path: PathBuf::from(get_env_or_default("SCAN_LOG_PATH", "scan-log.csv")),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a boolean toggle (`true`/`1`/`yes`).
fn get_flag(key: &str) -> bool {
    get_optional_env(key).is_some_and(|value| parse_flag(&value))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Random secret for development sessions; sessions do not survive restarts anyway.
fn ephemeral_secret() -> SecretString {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    let secret: String = (0..64)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            char::from(CHARSET.get(idx).copied().unwrap_or(b'x'))
        })
        .collect();
    SecretString::from(secret)
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
