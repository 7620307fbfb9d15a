use super::{KeyCache, SecurityToken, TokenKind, cached};
use crate::crypto::{AlgorithmKind, CryptoProvider};
use crate::error::{Error, Result};
use crate::key::{Key, KeyUsage, PublicKey, SecretKey};
use crate::trust::TrustOutcome;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Symmetric key recovered by unwrapping an `xenc:EncryptedKey`
pub struct UnwrappedSymmetricToken {
    id: Option<String>,
    raw: Vec<u8>,
    wrapping_token: Arc<dyn SecurityToken>,
    wrapping_algorithm: String,
    provider: Arc<dyn CryptoProvider>,
    derived: KeyCache,
}

impl UnwrappedSymmetricToken {
    /// Create a token from unwrapped key bytes
    pub fn new(
        id: Option<String>,
        raw: Vec<u8>,
        wrapping_token: Arc<dyn SecurityToken>,
        wrapping_algorithm: String,
        provider: Arc<dyn CryptoProvider>,
    ) -> Self {
        Self {
            id,
            raw,
            wrapping_token,
            wrapping_algorithm,
            provider,
            derived: Mutex::new(HashMap::new()),
        }
    }

    /// Length of the unwrapped key in bytes
    pub fn key_length(&self) -> usize {
        self.raw.len()
    }

    /// Number of algorithm-shaped keys derived so far
    pub fn derived_key_count(&self) -> usize {
        self.derived.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn derive(&self, algorithm_uri: &str) -> Result<Key> {
        let capability = self.provider.resolve_algorithm(algorithm_uri)?;
        if capability.kind != AlgorithmKind::BlockEncryption {
            return Err(Error::key_derivation(
                algorithm_uri,
                "a symmetric token only serves block encryption algorithms",
            ));
        }
        if let Some(expected) = capability.key_length {
            if self.raw.len() != expected {
                return Err(Error::key_derivation(
                    algorithm_uri,
                    format!(
                        "unwrapped key is {} bytes, algorithm needs {}",
                        self.raw.len(),
                        expected
                    ),
                ));
            }
        }
        debug!(
            token = self.id.as_deref().unwrap_or("(anonymous)"),
            algorithm = algorithm_uri,
            "derived symmetric key"
        );
        Ok(Key::Secret(SecretKey::new(
            capability.key_family,
            self.raw.clone(),
        )))
    }
}

impl SecurityToken for UnwrappedSymmetricToken {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn kind(&self) -> TokenKind {
        TokenKind::UnwrappedSymmetric
    }

    fn is_asymmetric(&self) -> bool {
        false
    }

    fn key(&self, algorithm_uri: &str, usage: KeyUsage) -> Result<Key> {
        cached(&self.derived, algorithm_uri, usage, || self.derive(algorithm_uri))
    }

    fn public_key(&self) -> Option<PublicKey> {
        None
    }

    fn verify(&self) -> TrustOutcome {
        TrustOutcome::Accepted
    }

    fn wrapping_token(&self) -> Option<&Arc<dyn SecurityToken>> {
        Some(&self.wrapping_token)
    }

    fn wrapping_algorithm(&self) -> Option<&str> {
        Some(&self.wrapping_algorithm)
    }
}

impl fmt::Debug for UnwrappedSymmetricToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnwrappedSymmetricToken")
            .field("id", &self.id)
            .field("key_length", &self.raw.len())
            .field("wrapping_token", &self.wrapping_token.id())
            .field("wrapping_algorithm", &self.wrapping_algorithm)
            .finish()
    }
}
