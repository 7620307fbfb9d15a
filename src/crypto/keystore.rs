//! Key stores and credential callbacks
//!
//! A [`KeyStore`] holds private keys and certificates. Private keys may be
//! password protected; the password is requested through a
//! [`CredentialCallback`] at lookup time, never stored in configuration.

use crate::certificate::Certificate;
use crate::error::{Error, Result};
use crate::key::{PrivateKey, PublicKey};
use std::fmt;

/// Purpose a credential is requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialUsage {
    /// Decrypting or unwrapping
    Decryption,
    /// Signing or verifying
    Signature,
}

/// Supplies passwords for protected private keys
///
/// # Example
///
/// ```
/// use wssec_stream::{CredentialCallback, CredentialUsage};
///
/// struct Fixed;
///
/// impl CredentialCallback for Fixed {
///     fn password(&self, alias: &str, _usage: CredentialUsage) -> Option<String> {
///         (alias == "service").then(|| "changeit".to_string())
///     }
/// }
/// ```
pub trait CredentialCallback: Send + Sync {
    /// Password for the key stored under `alias`, if the caller knows it
    fn password(&self, alias: &str, usage: CredentialUsage) -> Option<String>;
}

/// Source of private keys and certificates
pub trait KeyStore: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Private key matching `public_key`
    ///
    /// Fails with a key resolution error when the store has no matching
    /// private key or the credential callback cannot unlock it.
    fn lookup_private_key(
        &self,
        public_key: &PublicKey,
        usage: CredentialUsage,
        callback: Option<&dyn CredentialCallback>,
    ) -> Result<PrivateKey>;

    /// Certificate with the given issuer DN and decimal serial number
    fn certificate_by_issuer_serial(&self, issuer: &str, serial: &str) -> Option<Certificate>;

    /// Certificate with the given subject key identifier
    fn certificate_by_subject_key_id(&self, ski: &[u8]) -> Option<Certificate>;
}

struct KeyEntry {
    alias: String,
    certificate: Option<Certificate>,
    public_key: PublicKey,
    private_key: Option<PrivateKey>,
    password: Option<String>,
}

/// Key store held in memory
///
/// # Example
///
/// ```ignore
/// let store = InMemoryKeyStore::new("service")
///     .with_private_key("service", public, private, Some("changeit"))
///     .with_certificate("ca", ca_cert);
/// ```
pub struct InMemoryKeyStore {
    name: String,
    entries: Vec<KeyEntry>,
}

impl InMemoryKeyStore {
    /// Create an empty store
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Add a certificate without a private key
    pub fn with_certificate(mut self, alias: impl Into<String>, certificate: Certificate) -> Self {
        self.entries.push(KeyEntry {
            alias: alias.into(),
            public_key: certificate.public_key().clone(),
            certificate: Some(certificate),
            private_key: None,
            password: None,
        });
        self
    }

    /// Add a bare key pair, optionally password protected
    pub fn with_private_key(
        mut self,
        alias: impl Into<String>,
        public_key: PublicKey,
        private_key: PrivateKey,
        password: Option<&str>,
    ) -> Self {
        self.entries.push(KeyEntry {
            alias: alias.into(),
            certificate: None,
            public_key,
            private_key: Some(private_key),
            password: password.map(str::to_string),
        });
        self
    }

    /// Add a certificate together with its private key
    pub fn with_key_pair_certificate(
        mut self,
        alias: impl Into<String>,
        certificate: Certificate,
        private_key: PrivateKey,
        password: Option<&str>,
    ) -> Self {
        self.entries.push(KeyEntry {
            alias: alias.into(),
            public_key: certificate.public_key().clone(),
            certificate: Some(certificate),
            private_key: Some(private_key),
            password: password.map(str::to_string),
        });
        self
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for InMemoryKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let aliases: Vec<&str> = self.entries.iter().map(|e| e.alias.as_str()).collect();
        f.debug_struct("InMemoryKeyStore")
            .field("name", &self.name)
            .field("aliases", &aliases)
            .finish()
    }
}

impl KeyStore for InMemoryKeyStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup_private_key(
        &self,
        public_key: &PublicKey,
        usage: CredentialUsage,
        callback: Option<&dyn CredentialCallback>,
    ) -> Result<PrivateKey> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.private_key.is_some() && &e.public_key == public_key)
            .ok_or_else(|| {
                Error::key_resolution(&self.name, "no private key for the presented public key")
            })?;

        if let Some(expected) = &entry.password {
            let supplied = callback
                .and_then(|cb| cb.password(&entry.alias, usage))
                .ok_or_else(|| {
                    Error::key_resolution(&entry.alias, "no password supplied for protected key")
                })?;
            if &supplied != expected {
                return Err(Error::key_resolution(
                    &entry.alias,
                    "wrong password for protected key",
                ));
            }
        }

        entry
            .private_key
            .clone()
            .ok_or_else(|| Error::key_resolution(&entry.alias, "entry has no private key"))
    }

    fn certificate_by_issuer_serial(&self, issuer: &str, serial: &str) -> Option<Certificate> {
        let wanted = normalize_dn(issuer);
        self.entries
            .iter()
            .filter_map(|e| e.certificate.as_ref())
            .find(|c| c.serial() == serial.trim() && normalize_dn(c.issuer()) == wanted)
            .cloned()
    }

    fn certificate_by_subject_key_id(&self, ski: &[u8]) -> Option<Certificate> {
        self.entries
            .iter()
            .filter_map(|e| e.certificate.as_ref())
            .find(|c| c.subject_key_id() == ski)
            .cloned()
    }
}

/// Canonical form of a distinguished name for comparison
///
/// RDNs are compared case-insensitively with surrounding whitespace removed.
pub(crate) fn normalize_dn(dn: &str) -> String {
    dn.split(',')
        .map(|rdn| {
            let mut parts = rdn.splitn(2, '=');
            let attr = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
            let value = parts.next().unwrap_or_default().trim().to_lowercase();
            format!("{}={}", attr, value)
        })
        .collect::<Vec<_>>()
        .join(",")
}
