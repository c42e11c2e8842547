//! SAML 2.0 service provider.
//!
//! Requests go out over the HTTP-Redirect binding (raw deflate, base64,
//! `SAMLRequest` query parameter). Responses come back over HTTP-POST as a
//! base64 `SAMLResponse` form field.
//!
//! Response validation:
//!
//! - top-level status must be `Success`
//! - the assertion, or the response carrying it, must hold an enveloped XML
//!   signature that verifies against the configured identity provider
//!   certificate
//! - claims are read only from the signed assertion
//! - any `Audience` restriction must name our issuer
//! - `NotBefore` / `NotOnOrAfter` are enforced only when a clock skew is configured

use std::io::Write;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use checkin_core::IdentityClaims;
use chrono::{DateTime, SecondsFormat, Utc};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use quick_xml::escape::escape;
use url::Url;

use super::xml::{Element, malformed};
use super::xmldsig::{self, SigningCertificate};
use super::{AuthError, AuthStart, IdentityProvider};
use crate::config::SamlConfig;

const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";
const BINDING_HTTP_POST: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST";
const NAMEID_UNSPECIFIED: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified";

// Attribute names, in lookup order.
const ATTR_UID: &str = "urn:oid:0.9.2342.19200300.100.1.1";
const ATTR_COMMON_NAME: &str = "urn:oid:2.5.4.3";
const ATTR_MAIL: &str = "urn:oid:0.9.2342.19200300.100.1.3";

/// SAML service provider.
#[derive(Debug, Clone)]
pub struct SamlProvider {
    entry_point: Url,
    issuer: String,
    callback_url: String,
    idp_cert: Option<SigningCertificate>,
    clock_skew: Option<Duration>,
}

impl SamlProvider {
    /// Build a provider from configuration.
    ///
    /// A missing certificate is allowed at startup; every callback is then rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry point is missing or the certificate is
    /// not a base64 X.509 certificate with an RSA key.
    pub fn from_config(config: &SamlConfig) -> Result<Self, AuthError> {
        let entry_point = config
            .entry_point
            .clone()
            .ok_or(AuthError::NotConfigured("SAML_ENTRY_POINT"))?;
        let idp_cert = config
            .idp_cert
            .as_deref()
            .map(|raw| decode_certificate(raw).and_then(SigningCertificate::from_der))
            .transpose()?;

        if idp_cert.is_none() {
            tracing::warn!("SAML_CERT not set, SSO callbacks will be rejected");
        }

        Ok(Self {
            entry_point,
            issuer: config.issuer.clone(),
            callback_url: config.callback_url.clone(),
            idp_cert,
            clock_skew: config.clock_skew,
        })
    }

    /// Serialize an `AuthnRequest`.
    fn authn_request(&self, request_id: &str, issue_instant: DateTime<Utc>) -> String {
        format!(
            concat!(
                r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" "#,
                r#"xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" "#,
                r#"ID="{id}" Version="2.0" IssueInstant="{instant}" "#,
                r#"ProtocolBinding="{binding}" AssertionConsumerServiceURL="{acs}" "#,
                r#"Destination="{destination}">"#,
                r#"<saml:Issuer>{issuer}</saml:Issuer>"#,
                r#"<samlp:NameIDPolicy Format="{nameid}" AllowCreate="true"/>"#,
                r#"</samlp:AuthnRequest>"#,
            ),
            id = request_id,
            instant = issue_instant.to_rfc3339_opts(SecondsFormat::Secs, true),
            binding = BINDING_HTTP_POST,
            acs = escape(self.callback_url.as_str()),
            destination = escape(self.entry_point.as_str()),
            issuer = escape(self.issuer.as_str()),
            nameid = NAMEID_UNSPECIFIED,
        )
    }

    /// URL of the identity provider carrying an encoded `AuthnRequest`.
    fn redirect_url(
        &self,
        request_id: &str,
        issue_instant: DateTime<Utc>,
        relay_state: Option<&str>,
    ) -> Result<Url, AuthError> {
        let xml = self.authn_request(request_id, issue_instant);

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(xml.as_bytes())?;
        let deflated = encoder.finish()?;

        let mut url = self.entry_point.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("SAMLRequest", &BASE64.encode(deflated));
            if let Some(relay_state) = relay_state {
                query.append_pair("RelayState", relay_state);
            }
        }
        Ok(url)
    }

    /// Check status and signature, returning the signed assertion's contents.
    fn verify(&self, root: &Element) -> Result<Assertion, AuthError> {
        if root.local_name() != "Response" {
            return Err(malformed("no Response element"));
        }

        let status = root
            .child("Status")
            .and_then(|s| s.child("StatusCode"))
            .and_then(|c| c.attribute("Value"))
            .unwrap_or("missing");
        if status != STATUS_SUCCESS {
            return Err(AuthError::Rejected(status.to_string()));
        }

        let certificate = self
            .idp_cert
            .as_ref()
            .ok_or(AuthError::NotConfigured("SAML_CERT"))?;
        let assertion = signed_assertion(root, certificate)?;
        Ok(Assertion::read(assertion))
    }

    fn check_conditions(
        &self,
        assertion: &Assertion,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        if !assertion.audiences.is_empty() && !assertion.audiences.contains(&self.issuer) {
            return Err(AuthError::AudienceMismatch(self.issuer.clone()));
        }

        if let Some(skew) = self.clock_skew {
            let skew = chrono::Duration::from_std(skew).unwrap_or(chrono::Duration::zero());
            if let Some(not_before) = assertion
                .not_before
                .as_deref()
                .map(parse_instant)
                .transpose()?
                && now + skew < not_before
            {
                return Err(AuthError::NotYetValid);
            }
            if let Some(not_after) = assertion
                .not_on_or_after
                .as_deref()
                .map(parse_instant)
                .transpose()?
                && now - skew >= not_after
            {
                return Err(AuthError::Expired);
            }
        }

        Ok(())
    }
}

impl IdentityProvider for SamlProvider {
    fn name(&self) -> &'static str {
        "SAML"
    }

    fn begin_auth(&self, relay_state: Option<&str>) -> Result<AuthStart, AuthError> {
        let request_id = format!("_{}", uuid::Uuid::new_v4().simple());
        let url = self.redirect_url(&request_id, Utc::now(), relay_state)?;
        tracing::debug!(request_id, "Redirecting to identity provider");
        Ok(AuthStart::Redirect(url.into()))
    }

    fn handle_callback(&self, saml_response: &str) -> Result<IdentityClaims, AuthError> {
        let compact: String = saml_response.split_whitespace().collect();
        let xml = BASE64.decode(compact)?;
        let xml = String::from_utf8(xml).map_err(malformed)?;

        let root = Element::parse(&xml)?;
        let assertion = self.verify(&root)?;
        self.check_conditions(&assertion, Utc::now())?;
        Ok(assertion.claims())
    }
}

/// The assertion covered by a valid signature.
///
/// A signed assertion is preferred; otherwise the response itself must be
/// signed and carry exactly one assertion. Unsigned sibling assertions are
/// never read.
fn signed_assertion<'a>(
    root: &'a Element,
    certificate: &SigningCertificate,
) -> Result<&'a Element, AuthError> {
    let assertions: Vec<&Element> = root.elements_named("Assertion").collect();

    if let Some(assertion) = assertions
        .iter()
        .copied()
        .find(|a| a.child("Signature").is_some())
    {
        xmldsig::verify(&[root, assertion], certificate)?;
        return Ok(assertion);
    }

    xmldsig::verify(&[root], certificate)?;
    match assertions.as_slice() {
        [assertion] => Ok(*assertion),
        [] => Err(malformed("no Assertion element")),
        _ => Err(malformed("signed response carries several assertions")),
    }
}

/// The parts of a signed `saml:Assertion` the provider looks at.
#[derive(Debug, Default)]
struct Assertion {
    name_id: Option<String>,
    not_before: Option<String>,
    not_on_or_after: Option<String>,
    audiences: Vec<String>,
    /// Attribute name and its first value, in document order.
    attributes: Vec<(String, String)>,
}

impl Assertion {
    fn read(assertion: &Element) -> Self {
        let name_id = assertion
            .child("Subject")
            .and_then(|s| s.child("NameID"))
            .map(|n| n.text().trim().to_string());

        let conditions = assertion.child("Conditions");
        let audiences = conditions
            .into_iter()
            .flat_map(|c| c.elements_named("AudienceRestriction"))
            .flat_map(|r| r.elements_named("Audience"))
            .map(|a| a.text().trim().to_string())
            .collect();

        let mut attributes: Vec<(String, String)> = Vec::new();
        for attribute in assertion
            .elements_named("AttributeStatement")
            .flat_map(|s| s.elements_named("Attribute"))
        {
            let Some(name) = attribute.attribute("Name") else {
                continue;
            };
            let Some(value) = attribute.child("AttributeValue") else {
                continue;
            };
            if !attributes.iter().any(|(n, _)| n == name) {
                attributes.push((name.to_string(), value.text().trim().to_string()));
            }
        }

        Self {
            name_id,
            not_before: conditions
                .and_then(|c| c.attribute("NotBefore"))
                .map(str::to_string),
            not_on_or_after: conditions
                .and_then(|c| c.attribute("NotOnOrAfter"))
                .map(str::to_string),
            audiences,
            attributes,
        }
    }

    fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, v)| n == name && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    /// Map the assertion to claims, first present value wins.
    fn claims(&self) -> IdentityClaims {
        let subject_id = self
            .name_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.attribute_value(ATTR_UID))
            .unwrap_or("unknown")
            .to_string();
        let display_name = self
            .attribute_value(ATTR_COMMON_NAME)
            .or_else(|| self.attribute_value("displayName"))
            .unwrap_or("Unknown User")
            .to_string();
        let email = self
            .attribute_value(ATTR_MAIL)
            .or_else(|| self.attribute_value("email"))
            .unwrap_or_default()
            .to_string();
        let local_id = self
            .attribute_value(ATTR_UID)
            .or_else(|| self.attribute_value("uid"))
            .map_or_else(|| subject_id.clone(), str::to_string);

        IdentityClaims {
            subject_id,
            display_name,
            email,
            local_id,
        }
    }
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, AuthError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AuthError::MalformedResponse(format!("bad timestamp {raw}: {e}")))
}

/// Decode a PEM or bare base64 certificate to DER bytes.
fn decode_certificate(raw: &str) -> Result<Vec<u8>, AuthError> {
    let body: String = raw
        .lines()
        .filter(|line| !line.trim_start().starts_with("-----"))
        .flat_map(str::split_whitespace)
        .collect();
    if body.is_empty() {
        return Err(AuthError::InvalidCertificate("empty certificate".to_string()));
    }
    BASE64
        .decode(body)
        .map_err(|e| AuthError::InvalidCertificate(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Read;

    use chrono::TimeZone;
    use flate2::read::DeflateDecoder;

    use super::*;

    /// A response whose assertion is signed by the key behind `IDP_CERT`.
    const SIGNED_RESPONSE: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/fixtures/saml/signed-response.xml"
    ));
    const IDP_CERT: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/fixtures/saml/idp-cert.pem"
    ));
    const OTHER_IDP_CERT: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/fixtures/saml/other-idp-cert.pem"
    ));

    fn provider_pinned_to(cert: &str, clock_skew: Option<Duration>) -> SamlProvider {
        SamlProvider::from_config(&SamlConfig {
            entry_point: Some(Url::parse("https://idp.example.edu/sso?tenant=cmu").unwrap()),
            issuer: "rfid-checkin-app".to_string(),
            callback_url: "https://kiosk.example.edu/auth/saml/callback".to_string(),
            idp_cert: Some(cert.to_string()),
            clock_skew,
        })
        .unwrap()
    }

    fn provider(clock_skew: Option<Duration>) -> SamlProvider {
        provider_pinned_to(IDP_CERT, clock_skew)
    }

    fn callback(provider: &SamlProvider, xml: &str) -> Result<IdentityClaims, AuthError> {
        provider.handle_callback(&BASE64.encode(xml))
    }

    /// The signed response with its `SignatureValue` replaced.
    fn with_signature_value(value: &str) -> String {
        let (head, rest) = SIGNED_RESPONSE.split_once("<ds:SignatureValue>").unwrap();
        let (_, tail) = rest.split_once("</ds:SignatureValue>").unwrap();
        format!("{head}<ds:SignatureValue>{value}</ds:SignatureValue>{tail}")
    }

    /// The signed response's `ds:Signature` element.
    fn signature_element() -> String {
        let (_, rest) = SIGNED_RESPONSE.split_once("<ds:Signature ").unwrap();
        let (inner, _) = rest.split_once("</ds:Signature>").unwrap();
        format!("<ds:Signature {inner}</ds:Signature>")
    }

    /// The signed response with an attacker's assertion placed before the
    /// signed one.
    fn with_injected_assertion(id: &str, signature: &str) -> String {
        let injected = format!(
            concat!(
                r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="{id}" Version="2.0">"#,
                "{signature}",
                "<saml:Subject><saml:NameID>admin</saml:NameID></saml:Subject>",
                r#"<saml:AttributeStatement><saml:Attribute Name="urn:oid:2.5.4.3">"#,
                "<saml:AttributeValue>Mallory as Admin</saml:AttributeValue>",
                "</saml:Attribute></saml:AttributeStatement></saml:Assertion>",
            ),
            id = id,
            signature = signature,
        );
        SIGNED_RESPONSE.replacen(
            "  <saml:Assertion ",
            &format!("  {injected}\n  <saml:Assertion "),
            1,
        )
    }

    /// Unsigned responses, for status handling and claim mapping.
    struct ResponseBuilder {
        status: &'static str,
        name_id: Option<&'static str>,
        audience: &'static str,
        not_before: &'static str,
        not_on_or_after: &'static str,
        attributes: Vec<(&'static str, &'static str)>,
    }

    impl Default for ResponseBuilder {
        fn default() -> Self {
            Self {
                status: STATUS_SUCCESS,
                name_id: Some("jsmith@andrew.cmu.edu"),
                audience: "rfid-checkin-app",
                not_before: "2026-03-07T13:55:00Z",
                not_on_or_after: "2026-03-07T14:05:00Z",
                attributes: vec![
                    (ATTR_UID, "jsmith"),
                    (ATTR_COMMON_NAME, "Jane Smith"),
                    (ATTR_MAIL, "jsmith@andrew.cmu.edu"),
                ],
            }
        }
    }

    impl ResponseBuilder {
        fn xml(&self) -> String {
            let name_id = self.name_id.map_or_else(String::new, |id| {
                format!(r#"<saml:Subject><saml:NameID>{id}</saml:NameID></saml:Subject>"#)
            });
            let attributes: String = self
                .attributes
                .iter()
                .map(|(name, value)| {
                    format!(
                        r#"<saml:Attribute Name="{name}"><saml:AttributeValue>{value}</saml:AttributeValue></saml:Attribute>"#
                    )
                })
                .collect();
            format!(
                r#"<?xml version="1.0"?>
<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_r1" Version="2.0">
  <saml:Issuer>https://idp.example.edu</saml:Issuer>
  <samlp:Status><samlp:StatusCode Value="{status}"/></samlp:Status>
  <saml:Assertion ID="_a1" Version="2.0">
    <saml:Issuer>https://idp.example.edu</saml:Issuer>
    {name_id}
    <saml:Conditions NotBefore="{not_before}" NotOnOrAfter="{not_on_or_after}">
      <saml:AudienceRestriction><saml:Audience>{audience}</saml:Audience></saml:AudienceRestriction>
    </saml:Conditions>
    <saml:AttributeStatement>{attributes}</saml:AttributeStatement>
  </saml:Assertion>
</samlp:Response>"#,
                status = self.status,
                not_before = self.not_before,
                not_on_or_after = self.not_on_or_after,
                audience = self.audience,
            )
        }

        fn parsed(&self) -> Assertion {
            let root = Element::parse(&self.xml()).unwrap();
            Assertion::read(root.child("Assertion").unwrap())
        }
    }

    fn inside_window() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 7, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_redirect_carries_deflated_request() {
        let provider = provider(None);
        let url = provider
            .redirect_url("_abc123", inside_window(), Some("/"))
            .unwrap();

        assert_eq!(url.host_str(), Some("idp.example.edu"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("tenant".to_string(), "cmu".to_string()));
        assert_eq!(pairs[2], ("RelayState".to_string(), "/".to_string()));

        let deflated = BASE64.decode(&pairs[1].1).unwrap();
        let mut xml = String::new();
        DeflateDecoder::new(deflated.as_slice())
            .read_to_string(&mut xml)
            .unwrap();

        assert!(xml.contains(r#"ID="_abc123""#));
        assert!(xml.contains(r#"IssueInstant="2026-03-07T14:00:00Z""#));
        assert!(xml.contains(
            r#"AssertionConsumerServiceURL="https://kiosk.example.edu/auth/saml/callback""#
        ));
        assert!(xml.contains(&format!(r#"ProtocolBinding="{BINDING_HTTP_POST}""#)));
        assert!(xml.contains("<saml:Issuer>rfid-checkin-app</saml:Issuer>"));
        assert!(!xml.contains("RequestedAuthnContext"));
    }

    #[test]
    fn test_begin_auth_redirects() {
        let start = provider(None).begin_auth(None).unwrap();
        let AuthStart::Redirect(location) = start else {
            panic!("expected redirect");
        };
        assert!(location.starts_with("https://idp.example.edu/sso?tenant=cmu&SAMLRequest="));
    }

    #[test]
    fn test_authn_request_escapes_attributes() {
        let mut provider = provider(None);
        provider.callback_url = "https://kiosk.example.edu/cb?a=1&b=2".to_string();
        let xml = provider.authn_request("_x", inside_window());
        assert!(xml.contains("cb?a=1&amp;b=2"));
    }

    #[test]
    fn test_callback_extracts_claims() {
        let claims = callback(&provider(None), SIGNED_RESPONSE).unwrap();
        assert_eq!(
            claims,
            IdentityClaims {
                subject_id: "jsmith@andrew.cmu.edu".to_string(),
                display_name: "Jane Smith".to_string(),
                email: "jsmith@andrew.cmu.edu".to_string(),
                local_id: "jsmith".to_string(),
            }
        );
    }

    #[test]
    fn test_claims_use_friendly_name_fallbacks() {
        let claims = ResponseBuilder {
            name_id: None,
            attributes: vec![
                ("displayName", "Bob Johnson"),
                ("email", "bob@example.edu"),
                ("uid", "bjohnson"),
            ],
            ..ResponseBuilder::default()
        }
        .parsed()
        .claims();

        assert_eq!(claims.subject_id, "unknown");
        assert_eq!(claims.display_name, "Bob Johnson");
        assert_eq!(claims.email, "bob@example.edu");
        assert_eq!(claims.local_id, "bjohnson");
    }

    #[test]
    fn test_claims_subject_falls_back_to_uid_attribute() {
        let claims = ResponseBuilder {
            name_id: None,
            attributes: vec![(ATTR_UID, "acooper")],
            ..ResponseBuilder::default()
        }
        .parsed()
        .claims();

        assert_eq!(claims.subject_id, "acooper");
        assert_eq!(claims.local_id, "acooper");
    }

    #[test]
    fn test_claims_defaults_when_nothing_released() {
        let claims = ResponseBuilder {
            attributes: Vec::new(),
            ..ResponseBuilder::default()
        }
        .parsed()
        .claims();

        assert_eq!(claims.display_name, "Unknown User");
        assert_eq!(claims.email, "");
        assert_eq!(claims.local_id, "jsmith@andrew.cmu.edu");
    }

    #[test]
    fn test_self_closing_attribute_captures_no_values() {
        let root = Element::parse(
            r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">
  <saml:AttributeStatement>
    <saml:Attribute Name="urn:oid:2.5.4.3"/>
    <saml:AttributeValue>Mallory</saml:AttributeValue>
    <saml:Attribute Name="urn:oid:0.9.2342.19200300.100.1.1"><saml:AttributeValue>jsmith</saml:AttributeValue></saml:Attribute>
  </saml:AttributeStatement>
</saml:Assertion>"#,
        )
        .unwrap();
        let assertion = Assertion::read(&root);

        assert_eq!(
            assertion.attributes,
            [(ATTR_UID.to_string(), "jsmith".to_string())]
        );
        assert_eq!(assertion.claims().display_name, "Unknown User");
    }

    #[test]
    fn test_non_success_status_is_rejected() {
        let err = callback(
            &provider(None),
            &ResponseBuilder {
                status: "urn:oasis:names:tc:SAML:2.0:status:Requester",
                ..ResponseBuilder::default()
            }
            .xml(),
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::Rejected(s) if s.ends_with(":Requester")));
    }

    #[test]
    fn test_unsigned_response_is_rejected() {
        let err = callback(&provider(None), &ResponseBuilder::default().xml()).unwrap_err();
        assert!(matches!(err, AuthError::MissingSignature));
    }

    #[test]
    fn test_tampered_assertion_is_rejected() {
        let xml = SIGNED_RESPONSE
            .replace(">jsmith@andrew.cmu.edu</saml:NameID>", ">admin</saml:NameID>")
            .replace(">Jane Smith<", ">Mallory as Admin<");

        let err = callback(&provider(None), &xml).unwrap_err();
        assert!(matches!(
            err,
            AuthError::SignatureInvalid(msg) if msg.starts_with("digest mismatch")
        ));

        let (head, rest) = xml.split_once("<ds:SignatureValue>").unwrap();
        let (_, tail) = rest.split_once("</ds:SignatureValue>").unwrap();
        let forged = format!("{head}<ds:SignatureValue>forged</ds:SignatureValue>{tail}");
        assert!(matches!(
            callback(&provider(None), &forged),
            Err(AuthError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn test_forged_signature_value_is_rejected() {
        let provider = provider(None);

        for value in ["forged", "Zm9yZ2Vk", "AAAA"] {
            let err = callback(&provider, &with_signature_value(value)).unwrap_err();
            assert!(matches!(err, AuthError::SignatureInvalid(_)), "{value}: {err}");
        }
    }

    #[test]
    fn test_unsigned_assertion_beside_signed_one_is_ignored() {
        let xml = with_injected_assertion("_injected", "");

        let claims = callback(&provider(None), &xml).unwrap();
        assert_eq!(claims.subject_id, "jsmith@andrew.cmu.edu");
        assert_eq!(claims.display_name, "Jane Smith");
    }

    #[test]
    fn test_signature_copied_to_another_assertion_is_rejected() {
        let xml = with_injected_assertion("_injected", &signature_element());

        let err = callback(&provider(None), &xml).unwrap_err();
        assert!(matches!(
            err,
            AuthError::SignatureInvalid(msg) if msg.starts_with("reference")
        ));
    }

    #[test]
    fn test_duplicate_assertion_id_is_rejected() {
        let xml = with_injected_assertion("_a7f3c2e1d9b84c6f", "");

        let err = callback(&provider(None), &xml).unwrap_err();
        assert!(matches!(
            err,
            AuthError::SignatureInvalid(msg) if msg.starts_with("duplicate ID")
        ));
    }

    #[test]
    fn test_unexpected_certificate_is_rejected() {
        let err =
            callback(&provider_pinned_to(OTHER_IDP_CERT, None), SIGNED_RESPONSE).unwrap_err();
        assert!(matches!(err, AuthError::CertificateMismatch));
    }

    #[test]
    fn test_signature_checked_against_pinned_key() {
        let (head, rest) = SIGNED_RESPONSE.split_once("<ds:KeyInfo>").unwrap();
        let (_, tail) = rest.split_once("</ds:KeyInfo>").unwrap();
        let without_key_info = format!("{head}{tail}");

        assert!(callback(&provider(None), &without_key_info).is_ok());
        let err = callback(&provider_pinned_to(OTHER_IDP_CERT, None), &without_key_info)
            .unwrap_err();
        assert!(matches!(err, AuthError::SignatureInvalid(_)));
    }

    #[test]
    fn test_missing_configured_certificate_rejects_callbacks() {
        let mut provider = provider(None);
        provider.idp_cert = None;
        let err = callback(&provider, SIGNED_RESPONSE).unwrap_err();
        assert!(matches!(err, AuthError::NotConfigured("SAML_CERT")));
    }

    #[test]
    fn test_non_certificate_is_rejected_at_startup() {
        let err = SamlProvider::from_config(&SamlConfig {
            entry_point: Some(Url::parse("https://idp.example.edu/sso").unwrap()),
            issuer: "rfid-checkin-app".to_string(),
            callback_url: "https://kiosk.example.edu/auth/saml/callback".to_string(),
            idp_cert: Some(BASE64.encode("not a certificate")),
            clock_skew: None,
        })
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCertificate(_)));
    }

    #[test]
    fn test_audience_mismatch_is_rejected() {
        let assertion = ResponseBuilder {
            audience: "some-other-app",
            ..ResponseBuilder::default()
        }
        .parsed();

        assert!(matches!(
            provider(None).check_conditions(&assertion, inside_window()),
            Err(AuthError::AudienceMismatch(_))
        ));
    }

    #[test]
    fn test_validity_window_ignored_without_skew() {
        // The signed assertion's window is in the past relative to the wall clock.
        assert!(callback(&provider(None), SIGNED_RESPONSE).is_ok());
        assert!(matches!(
            callback(&provider(Some(Duration::from_secs(30))), SIGNED_RESPONSE),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_validity_window_enforced_with_skew() {
        let provider = provider(Some(Duration::from_secs(30)));
        let assertion = ResponseBuilder::default().parsed();

        assert!(provider.check_conditions(&assertion, inside_window()).is_ok());

        let early = Utc.with_ymd_and_hms(2026, 3, 7, 13, 54, 0).unwrap();
        assert!(matches!(
            provider.check_conditions(&assertion, early),
            Err(AuthError::NotYetValid)
        ));

        let within_skew = Utc.with_ymd_and_hms(2026, 3, 7, 14, 5, 20).unwrap();
        assert!(provider.check_conditions(&assertion, within_skew).is_ok());

        let late = Utc.with_ymd_and_hms(2026, 3, 7, 14, 6, 0).unwrap();
        assert!(matches!(
            provider.check_conditions(&assertion, late),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_garbage_input_is_rejected() {
        let provider = provider(None);
        assert!(matches!(
            provider.handle_callback("%%% not base64 %%%"),
            Err(AuthError::Base64(_))
        ));
        assert!(callback(&provider, "<a><b></a>").is_err());
        assert!(matches!(
            callback(&provider, "plain text"),
            Err(AuthError::MalformedResponse(_))
        ));
        assert!(matches!(
            callback(&provider, "<samlp:AuthnRequest/>"),
            Err(AuthError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_decode_certificate_accepts_bare_base64() {
        assert_eq!(
            decode_certificate("dGVzdC1pZHAtY2VydGlmaWNhdGU=").unwrap(),
            b"test-idp-certificate".to_vec()
        );
        let bare: String = IDP_CERT
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect();
        assert_eq!(
            decode_certificate(IDP_CERT).unwrap(),
            decode_certificate(&bare).unwrap()
        );
        assert!(matches!(
            decode_certificate("-----BEGIN CERTIFICATE-----\n-----END CERTIFICATE-----"),
            Err(AuthError::InvalidCertificate(_))
        ));
        assert!(decode_certificate("not*base64").is_err());
    }
}
