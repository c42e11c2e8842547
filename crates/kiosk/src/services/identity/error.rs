//! Identity gate error types.

use thiserror::Error;

/// Errors that can occur while starting or completing a login.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required SSO setting is missing.
    #[error("SSO not configured: {0}")]
    NotConfigured(&'static str),

    /// The configured identity provider certificate could not be decoded.
    #[error("invalid identity provider certificate: {0}")]
    InvalidCertificate(String),

    /// The authentication request could not be encoded.
    #[error("failed to encode authentication request: {0}")]
    Encoding(#[from] std::io::Error),

    /// The posted response is not valid base64.
    #[error("invalid response encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The posted response is not a readable SAML document.
    #[error("malformed SAML response: {0}")]
    MalformedResponse(String),

    /// The identity provider reported a non-success status.
    #[error("identity provider returned status {0}")]
    Rejected(String),

    /// The response carries no XML signature.
    #[error("SAML response is not signed")]
    MissingSignature,

    /// The signing certificate is not the configured one.
    #[error("SAML response signed with an unexpected certificate")]
    CertificateMismatch,

    /// The XML signature does not cover or does not match the signed content.
    #[error("invalid SAML signature: {0}")]
    SignatureInvalid(String),

    /// The signature uses a canonicalization, digest or signature algorithm
    /// we do not accept.
    #[error("unsupported signature algorithm {0}")]
    UnsupportedAlgorithm(String),

    /// The assertion is addressed to a different service provider.
    #[error("SAML assertion audience does not match issuer {0}")]
    AudienceMismatch(String),

    /// The assertion's validity window has not started.
    #[error("SAML assertion is not yet valid")]
    NotYetValid,

    /// The assertion's validity window has ended.
    #[error("SAML assertion has expired")]
    Expired,

    /// The active provider does not accept callbacks.
    #[error("callback not supported by the {0} provider")]
    UnexpectedCallback(&'static str),
}
