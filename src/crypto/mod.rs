//! Crypto provider boundary
//!
//! The processing core never performs cryptography itself. It resolves an
//! algorithm URI to a [`CipherCapability`] and hands key material and bytes
//! to a [`CryptoProvider`]. Key stores (where private keys and certificates
//! live) are a separate collaborator, see [`keystore`].

pub mod algorithms;
pub mod keystore;
mod rust_crypto;

pub use algorithms::{AlgorithmKind, Cipher, CipherCapability, algorithm_mapping};
pub use keystore::{CredentialCallback, CredentialUsage, InMemoryKeyStore, KeyStore};
pub use rust_crypto::RustCryptoProvider;

use crate::certificate::Certificate;
use crate::error::Result;
use crate::key::{Key, PublicKey};
use crate::trust::{TrustAnchors, TrustOutcome, TrustValidator};
use thiserror::Error;

/// Failure reported by a crypto provider
///
/// Callers attach the element or token identifier before surfacing it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The key does not fit the algorithm (wrong type or length)
    #[error("key does not fit algorithm: {0}")]
    InvalidKey(String),
    /// The capability cannot be used for the requested operation
    #[error("algorithm cannot be used for {0}")]
    WrongOperation(&'static str),
    /// The primitive itself failed (bad padding, tag mismatch, truncated input)
    #[error("{0}")]
    Failure(String),
}

/// Capability the core calls for every cryptographic operation
///
/// # Example
///
/// ```ignore
/// struct HsmProvider { /* ... */ }
///
/// impl CryptoProvider for HsmProvider {
///     fn decrypt(&self, capability: &CipherCapability, key: &Key, ciphertext: &[u8])
///         -> Result<Vec<u8>, CryptoError> {
///         // forward to the HSM
///     }
///     // ...
/// }
/// ```
pub trait CryptoProvider: Send + Sync {
    /// Map an algorithm URI to a native capability
    fn resolve_algorithm(&self, uri: &str) -> Result<&'static CipherCapability> {
        algorithm_mapping(uri)
    }

    /// Decrypt `ciphertext` (key transport or block encryption)
    fn decrypt(
        &self,
        capability: &CipherCapability,
        key: &Key,
        ciphertext: &[u8],
    ) -> std::result::Result<Vec<u8>, CryptoError>;

    /// Encrypt `plaintext` (key transport or block encryption)
    fn encrypt(
        &self,
        capability: &CipherCapability,
        key: &Key,
        plaintext: &[u8],
    ) -> std::result::Result<Vec<u8>, CryptoError>;

    /// Verify `signature` over `data` with a public key
    fn verify_signature(
        &self,
        capability: &CipherCapability,
        public_key: &PublicKey,
        data: &[u8],
        signature: &[u8],
    ) -> std::result::Result<(), CryptoError>;

    /// Validate a certificate chain (leaf first) against trust anchors
    fn validate_trust(&self, chain: &[Certificate], anchors: &TrustAnchors) -> TrustOutcome {
        TrustValidator::new().validate(chain, anchors)
    }

    /// Validate a bare public key against trust anchors
    fn validate_key_trust(&self, public_key: &PublicKey, anchors: &TrustAnchors) -> TrustOutcome {
        TrustValidator::new().validate_public_key(public_key, anchors)
    }
}
