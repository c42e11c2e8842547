//! Enveloped XML signatures, verified against the pinned identity provider
//! certificate.
//!
//! Only the profile SAML identity providers use is accepted: one `Reference`
//! pointing at the enveloping element by `ID`, the enveloped-signature and
//! exclusive canonicalization transforms, SHA-256/512 digests and
//! RSA PKCS#1 v1.5 signatures.

use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rsa::RsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use sha2::{Digest, Sha256, Sha512};
use x509_cert::Certificate;
use x509_cert::der::{Decode, Encode};

use super::AuthError;
use super::xml::{Element, canonicalize, in_scope, malformed};

const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";
const DIGEST_SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
const DIGEST_SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    fn from_digest_method(uri: &str) -> Result<Self, AuthError> {
        match uri {
            DIGEST_SHA256 => Ok(Self::Sha256),
            DIGEST_SHA512 => Ok(Self::Sha512),
            other => Err(AuthError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    fn from_signature_method(uri: &str) -> Result<Self, AuthError> {
        match uri {
            RSA_SHA256 => Ok(Self::Sha256),
            RSA_SHA512 => Ok(Self::Sha512),
            other => Err(AuthError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// The identity provider's signing certificate and its RSA key.
#[derive(Debug, Clone)]
pub(super) struct SigningCertificate {
    der: Vec<u8>,
    key: RsaPublicKey,
}

impl SigningCertificate {
    /// Parse a DER X.509 certificate carrying an RSA public key.
    pub(super) fn from_der(der: Vec<u8>) -> Result<Self, AuthError> {
        let certificate =
            Certificate::from_der(&der).map_err(|e| AuthError::InvalidCertificate(e.to_string()))?;
        let spki = certificate
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| AuthError::InvalidCertificate(e.to_string()))?;
        let key = RsaPublicKey::from_public_key_der(&spki)
            .map_err(|e| AuthError::InvalidCertificate(e.to_string()))?;
        Ok(Self { der, key })
    }

    fn verify(
        &self,
        hash: HashAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), AuthError> {
        let signature = Signature::try_from(signature)
            .map_err(|_| AuthError::SignatureInvalid("unreadable signature value".to_string()))?;
        let verified = match hash {
            HashAlgorithm::Sha256 => {
                VerifyingKey::<Sha256>::new(self.key.clone()).verify(message, &signature)
            }
            HashAlgorithm::Sha512 => {
                VerifyingKey::<Sha512>::new(self.key.clone()).verify(message, &signature)
            }
        };
        verified.map_err(|_| {
            AuthError::SignatureInvalid("signature value does not verify".to_string())
        })
    }
}

/// Verify the enveloped signature of the last element in `path`.
///
/// `path` runs from the document root down to the signed element; the
/// ancestors supply the namespaces inherited by the canonical form.
pub(super) fn verify(
    path: &[&Element],
    certificate: &SigningCertificate,
) -> Result<(), AuthError> {
    let (signed, ancestors) = path
        .split_last()
        .ok_or_else(|| malformed("nothing to verify"))?;
    if let Some(root) = path.first() {
        reject_duplicate_ids(root)?;
    }

    let mut signatures = signed.elements_named("Signature");
    let signature = signatures.next().ok_or(AuthError::MissingSignature)?;
    if signatures.next().is_some() {
        return Err(malformed(format!("multiple signatures on {}", signed.local_name())));
    }

    check_embedded_certificates(signature, certificate)?;

    let signed_info = required(signature, "SignedInfo")?;
    let c14n_method = required(signed_info, "CanonicalizationMethod")?;
    if algorithm(c14n_method)? != EXC_C14N {
        return Err(AuthError::UnsupportedAlgorithm(algorithm(c14n_method)?.to_string()));
    }
    let signature_hash =
        HashAlgorithm::from_signature_method(algorithm(required(signed_info, "SignatureMethod")?)?)?;

    let mut references = signed_info.elements_named("Reference");
    let reference = references
        .next()
        .ok_or_else(|| AuthError::SignatureInvalid("no reference".to_string()))?;
    if references.next().is_some() {
        return Err(AuthError::SignatureInvalid("more than one reference".to_string()));
    }

    let target = reference
        .attribute("URI")
        .and_then(|uri| uri.strip_prefix('#'))
        .filter(|id| !id.is_empty());
    if target.is_none() || target != signed.attribute("ID") {
        return Err(AuthError::SignatureInvalid(format!(
            "reference does not cover the signed {}",
            signed.local_name()
        )));
    }

    let mut prefixes = Vec::new();
    let mut canonicalized = false;
    for transform in reference
        .child("Transforms")
        .into_iter()
        .flat_map(|t| t.elements_named("Transform"))
    {
        match algorithm(transform)? {
            ENVELOPED_SIGNATURE => {}
            EXC_C14N => {
                canonicalized = true;
                prefixes = inclusive_prefixes(transform);
            }
            other => return Err(AuthError::UnsupportedAlgorithm(other.to_string())),
        }
    }
    if !canonicalized {
        return Err(AuthError::UnsupportedAlgorithm(
            "reference without exclusive canonicalization".to_string(),
        ));
    }
    let digest_hash =
        HashAlgorithm::from_digest_method(algorithm(required(reference, "DigestMethod")?)?)?;

    let expected = decode_base64(&required(reference, "DigestValue")?.text())?;
    let canonical = canonicalize(signed, &in_scope(ancestors), &prefixes, Some(signature))?;
    if digest_hash.digest(canonical.as_bytes()) != expected {
        return Err(AuthError::SignatureInvalid(format!(
            "digest mismatch on {}",
            signed.local_name()
        )));
    }

    let mut signature_path = path.to_vec();
    signature_path.push(signature);
    let canonical_signed_info = canonicalize(
        signed_info,
        &in_scope(&signature_path),
        &inclusive_prefixes(c14n_method),
        None,
    )?;
    let signature_value = decode_base64(&required(signature, "SignatureValue")?.text())?;
    certificate.verify(
        signature_hash,
        canonical_signed_info.as_bytes(),
        &signature_value,
    )
}

/// Any certificate carried in `KeyInfo` must be the pinned one.
fn check_embedded_certificates(
    signature: &Element,
    certificate: &SigningCertificate,
) -> Result<(), AuthError> {
    let embedded: Vec<Vec<u8>> = signature
        .child("KeyInfo")
        .into_iter()
        .flat_map(|k| k.elements_named("X509Data"))
        .flat_map(|d| d.elements_named("X509Certificate"))
        .map(|c| {
            let compact: String = c.text().split_whitespace().collect();
            BASE64.decode(compact)
        })
        .collect::<Result<_, _>>()?;

    if !embedded.is_empty() && !embedded.iter().any(|der| *der == certificate.der) {
        return Err(AuthError::CertificateMismatch);
    }
    Ok(())
}

fn reject_duplicate_ids(root: &Element) -> Result<(), AuthError> {
    let mut seen = HashSet::new();
    for id in root.descendants().iter().filter_map(|e| e.attribute("ID")) {
        if !seen.insert(id) {
            return Err(AuthError::SignatureInvalid(format!("duplicate ID {id}")));
        }
    }
    Ok(())
}

fn inclusive_prefixes(transform: &Element) -> Vec<&str> {
    transform
        .child("InclusiveNamespaces")
        .and_then(|n| n.attribute("PrefixList"))
        .map(|list| list.split_whitespace().collect())
        .unwrap_or_default()
}

fn required<'a>(parent: &'a Element, local_name: &str) -> Result<&'a Element, AuthError> {
    parent
        .child(local_name)
        .ok_or_else(|| malformed(format!("{} without {local_name}", parent.local_name())))
}

fn algorithm(element: &Element) -> Result<&str, AuthError> {
    element
        .attribute("Algorithm")
        .ok_or_else(|| malformed(format!("{} without Algorithm", element.local_name())))
}

fn decode_base64(text: &str) -> Result<Vec<u8>, AuthError> {
    let compact: String = text.split_whitespace().collect();
    BASE64
        .decode(compact)
        .map_err(|e| AuthError::SignatureInvalid(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SIGNED_RESPONSE: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/fixtures/saml/signed-response.xml"
    ));
    const IDP_CERT: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/fixtures/saml/idp-cert.pem"
    ));

    fn certificate() -> SigningCertificate {
        let body: String = IDP_CERT
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect();
        SigningCertificate::from_der(BASE64.decode(body).unwrap()).unwrap()
    }

    fn verify_assertion(xml: &str) -> Result<(), AuthError> {
        let root = Element::parse(xml).unwrap();
        let assertion = root.child("Assertion").unwrap();
        verify(&[&root, assertion], &certificate())
    }

    #[test]
    fn test_signed_assertion_verifies() {
        verify_assertion(SIGNED_RESPONSE).unwrap();
    }

    #[test]
    fn test_unsigned_element_reports_missing_signature() {
        let root = Element::parse(SIGNED_RESPONSE).unwrap();
        assert!(matches!(
            verify(&[&root], &certificate()),
            Err(AuthError::MissingSignature)
        ));
    }

    #[test]
    fn test_whitespace_change_breaks_digest() {
        let xml = SIGNED_RESPONSE.replacen("<saml:Subject>", "<saml:Subject> ", 1);
        assert!(matches!(
            verify_assertion(&xml),
            Err(AuthError::SignatureInvalid(msg)) if msg.starts_with("digest mismatch")
        ));
    }

    #[test]
    fn test_signed_info_change_breaks_signature() {
        // An extra inclusive prefix leaves the digest intact but changes SignedInfo.
        let xml = SIGNED_RESPONSE.replacen(r#"PrefixList="xs""#, r#"PrefixList="xs saml""#, 1);
        assert!(matches!(
            verify_assertion(&xml),
            Err(AuthError::SignatureInvalid(msg)) if msg == "signature value does not verify"
        ));
    }

    #[test]
    fn test_unsupported_digest_is_refused() {
        let xml = SIGNED_RESPONSE.replacen(
            DIGEST_SHA256,
            "http://www.w3.org/2000/09/xmldsig#sha1",
            1,
        );
        assert!(matches!(
            verify_assertion(&xml),
            Err(AuthError::UnsupportedAlgorithm(uri)) if uri.ends_with("#sha1")
        ));
    }

    #[test]
    fn test_certificate_must_be_x509_rsa() {
        assert!(matches!(
            SigningCertificate::from_der(b"not a certificate".to_vec()),
            Err(AuthError::InvalidCertificate(_))
        ));
    }
}
