//! X.509 certificates
//!
//! Certificates are kept as DER and the fields the pipeline needs (names,
//! serial, key identifier, public key, validity window) are extracted once
//! with `x509-parser`.

use crate::error::{Error, Result};
use crate::key::PublicKey;
use sha1::{Digest, Sha1};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::ParsedExtension;
use x509_parser::parse_x509_certificate;

/// Parsed X.509 certificate
#[derive(Debug, Clone)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
    subject_raw: Vec<u8>,
    issuer_raw: Vec<u8>,
    serial: String,
    subject_key_id: Vec<u8>,
    public_key: PublicKey,
    not_before: i64,
    not_after: i64,
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl Certificate {
    /// Parse a DER-encoded certificate
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let cert = parse(der)?;

        let subject_key_id = cert
            .extensions()
            .iter()
            .find_map(|ext| match ext.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(kid) => Some(kid.0.to_vec()),
                _ => None,
            })
            // RFC 5280 method 1 when the extension is absent
            .unwrap_or_else(|| {
                Sha1::digest(&*cert.public_key().subject_public_key.data).to_vec()
            });

        let validity = cert.validity();
        Ok(Self {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            subject_raw: cert.subject().as_raw().to_vec(),
            issuer_raw: cert.issuer().as_raw().to_vec(),
            serial: cert.tbs_certificate.serial.to_string(),
            subject_key_id,
            public_key: PublicKey::from_spki_der(cert.public_key().raw.to_vec()),
            not_before: validity.not_before.timestamp(),
            not_after: validity.not_after.timestamp(),
        })
    }

    /// DER encoding
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Subject DN in RFC 4514 form
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Issuer DN in RFC 4514 form
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Serial number in decimal
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Subject key identifier (extension value or SHA-1 of the public key)
    pub fn subject_key_id(&self) -> &[u8] {
        &self.subject_key_id
    }

    /// Subject public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Start of the validity window (Unix seconds)
    pub fn not_before(&self) -> i64 {
        self.not_before
    }

    /// End of the validity window (Unix seconds)
    pub fn not_after(&self) -> i64 {
        self.not_after
    }

    /// Whether `timestamp` lies inside the validity window
    pub fn is_valid_at(&self, timestamp: i64) -> bool {
        self.not_before <= timestamp && timestamp <= self.not_after
    }

    /// Whether this certificate names `issuer` as its issuer
    pub fn is_issued_by_name(&self, issuer: &Certificate) -> bool {
        self.issuer_raw == issuer.subject_raw
    }

    /// Whether subject and issuer are the same name
    pub fn is_self_issued(&self) -> bool {
        self.subject_raw == self.issuer_raw
    }

    /// Check this certificate's signature with `issuer`'s public key
    pub fn verify_issued_by(&self, issuer: &Certificate) -> Result<()> {
        let cert = parse(&self.der)?;
        let issuer_cert = parse(&issuer.der)?;
        cert.verify_signature(Some(issuer_cert.public_key()))
            .map_err(|e| {
                Error::Certificate(format!(
                    "signature of '{}' does not verify under '{}': {}",
                    self.subject, issuer.subject, e
                ))
            })
    }
}

fn parse(der: &[u8]) -> Result<X509Certificate<'_>> {
    let (rest, cert) = parse_x509_certificate(der)
        .map_err(|e| Error::Certificate(format!("cannot parse certificate: {}", e)))?;
    if !rest.is_empty() {
        return Err(Error::Certificate(format!(
            "{} trailing bytes after certificate",
            rest.len()
        )));
    }
    Ok(cert)
}

/// Current time in Unix seconds
pub(crate) fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
