use super::{KeyCache, SecurityToken, TokenKind, cached};
use crate::certificate::Certificate;
use crate::config::SecurityProperties;
use crate::crypto::{AlgorithmKind, CredentialUsage};
use crate::error::{Error, Result};
use crate::key::{Key, KeyUsage, PublicKey};
use crate::trust::TrustOutcome;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Identity backed by an X.509 certificate chain (leaf first)
pub struct X509Token {
    id: Option<String>,
    chain: Vec<Certificate>,
    properties: Arc<SecurityProperties>,
    keys: KeyCache,
}

impl X509Token {
    /// Create a token from a non-empty certificate chain
    pub fn new(
        id: Option<String>,
        chain: Vec<Certificate>,
        properties: Arc<SecurityProperties>,
    ) -> Result<Self> {
        if chain.is_empty() {
            return Err(Error::structural("BinarySecurityToken", "empty certificate chain"));
        }
        Ok(Self {
            id,
            chain,
            properties,
            keys: Mutex::new(HashMap::new()),
        })
    }

    /// Leaf certificate
    pub fn certificate(&self) -> &Certificate {
        &self.chain[0]
    }

    fn derive(&self, algorithm_uri: &str, usage: KeyUsage) -> Result<Key> {
        let capability = self.properties.crypto_provider().resolve_algorithm(algorithm_uri)?;
        let leaf = self.certificate();
        match (capability.kind, usage) {
            (AlgorithmKind::Signature, KeyUsage::SignatureVerification) => {
                Ok(Key::Public(leaf.public_key().clone()))
            }
            (AlgorithmKind::KeyTransport, KeyUsage::KeyUnwrap | KeyUsage::Decryption) => {
                let label = self.id.as_deref().unwrap_or(leaf.subject());
                let store = self.properties.decryption_key_store().ok_or_else(|| {
                    Error::key_resolution(label, "no decryption key store configured")
                })?;
                let private = store.lookup_private_key(
                    leaf.public_key(),
                    CredentialUsage::Decryption,
                    self.properties.credential_callback(),
                )?;
                debug!(token = label, store = store.name(), "resolved private key");
                Ok(Key::Private(private))
            }
            (kind, usage) => Err(Error::key_derivation(
                algorithm_uri,
                format!("{:?} algorithm cannot be used for {:?}", kind, usage),
            )),
        }
    }
}

impl SecurityToken for X509Token {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn kind(&self) -> TokenKind {
        TokenKind::X509
    }

    fn is_asymmetric(&self) -> bool {
        true
    }

    fn key(&self, algorithm_uri: &str, usage: KeyUsage) -> Result<Key> {
        cached(&self.keys, algorithm_uri, usage, || self.derive(algorithm_uri, usage))
    }

    fn public_key(&self) -> Option<PublicKey> {
        Some(self.certificate().public_key().clone())
    }

    fn verify(&self) -> TrustOutcome {
        self.properties
            .crypto_provider()
            .validate_trust(&self.chain, self.properties.trust_anchors())
    }

    fn certificates(&self) -> &[Certificate] {
        &self.chain
    }
}

impl fmt::Debug for X509Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("X509Token")
            .field("id", &self.id)
            .field("subject", &self.certificate().subject())
            .field("chain_length", &self.chain.len())
            .finish()
    }
}
