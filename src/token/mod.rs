//! Security tokens
//!
//! A security token is resolved key material plus its provenance. Every
//! variant exposes the same capability surface ([`SecurityToken`]); callers
//! never need to know which variant they hold.
//!
//! Tokens are shared as `Arc<dyn SecurityToken>`. A token unwrapped with
//! another token keeps a reference to it ([`SecurityToken::wrapping_token`]),
//! which forms a chain pointing back towards the identity that ultimately
//! holds a private key. The chain is acyclic; the registry rejects cycles
//! while resolving.

mod factory;
mod key_value;
mod symmetric;
mod x509;

pub use factory::resolve_key_info;
pub use key_value::KeyValueToken;
pub use symmetric::UnwrappedSymmetricToken;
pub use x509::X509Token;

use crate::certificate::Certificate;
use crate::crypto::{AlgorithmKind, CryptoProvider};
use crate::error::{Error, Result};
use crate::key::{Key, KeyUsage, PublicKey};
use crate::trust::TrustOutcome;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Variant of a security token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Symmetric key unwrapped from an `xenc:EncryptedKey`
    UnwrappedSymmetric,
    /// Bare RSA key from `ds:KeyValue`
    KeyValue,
    /// X.509 certificate identity
    X509,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::UnwrappedSymmetric => "unwrapped symmetric",
            TokenKind::KeyValue => "key value",
            TokenKind::X509 => "X.509",
        };
        f.write_str(name)
    }
}

/// Capability surface shared by all token variants
pub trait SecurityToken: Send + Sync + fmt::Debug {
    /// Identifier the token was registered under, if any
    fn id(&self) -> Option<&str>;

    /// Token variant
    fn kind(&self) -> TokenKind;

    /// Whether the token holds asymmetric key material
    fn is_asymmetric(&self) -> bool;

    /// Key material shaped for `algorithm_uri`
    ///
    /// Results are cached per algorithm URI for the token's lifetime.
    fn key(&self, algorithm_uri: &str, usage: KeyUsage) -> Result<Key>;

    /// Public key, absent for symmetric tokens
    fn public_key(&self) -> Option<PublicKey>;

    /// Validate the token's identity against the configured trust anchors
    ///
    /// Tokens derived purely from decryption accept unconditionally; their
    /// trust is that of their wrapping token.
    fn verify(&self) -> TrustOutcome;

    /// Token whose key unwrapped this one
    fn wrapping_token(&self) -> Option<&Arc<dyn SecurityToken>> {
        None
    }

    /// Algorithm this token was unwrapped with
    fn wrapping_algorithm(&self) -> Option<&str> {
        None
    }

    /// Certificate chain, leaf first (empty for non-certificate tokens)
    fn certificates(&self) -> &[Certificate] {
        &[]
    }
}

/// Follow the wrapping chain to the token that carries the identity
pub fn trust_root(token: &Arc<dyn SecurityToken>) -> Arc<dyn SecurityToken> {
    let mut current = Arc::clone(token);
    while let Some(parent) = current.wrapping_token().cloned() {
        current = parent;
    }
    current
}

/// Verify `signature` over `data` with a token's verification key
pub fn verify_signature(
    token: &dyn SecurityToken,
    provider: &dyn CryptoProvider,
    algorithm_uri: &str,
    data: &[u8],
    signature: &[u8],
) -> Result<()> {
    let capability = provider.resolve_algorithm(algorithm_uri)?;
    if capability.kind != AlgorithmKind::Signature {
        return Err(Error::key_derivation(algorithm_uri, "not a signature algorithm"));
    }
    let key = token.key(algorithm_uri, KeyUsage::SignatureVerification)?;
    let public = key.as_public().ok_or_else(|| {
        Error::key_derivation(algorithm_uri, "token has no public verification key")
    })?;
    provider
        .verify_signature(capability, public, data, signature)
        .map_err(|e| Error::SignatureVerification {
            algorithm: algorithm_uri.to_string(),
            message: e.to_string(),
        })
}

/// Derived keys by algorithm URI and usage
pub(crate) type KeyCache = Mutex<HashMap<(String, KeyUsage), Key>>;

/// Cache lookup that survives a poisoned lock
pub(crate) fn cached<F>(
    cache: &KeyCache,
    algorithm_uri: &str,
    usage: KeyUsage,
    derive: F,
) -> Result<Key>
where
    F: FnOnce() -> Result<Key>,
{
    let mut guard = cache.lock().unwrap_or_else(|e| e.into_inner());
    let entry = (algorithm_uri.to_string(), usage);
    if let Some(key) = guard.get(&entry) {
        return Ok(key.clone());
    }
    let key = derive()?;
    guard.insert(entry, key.clone());
    Ok(key)
}
