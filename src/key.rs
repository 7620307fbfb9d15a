//! Key material handed between tokens and the crypto provider
//!
//! Keys are kept in their standard DER encodings (SubjectPublicKeyInfo for
//! public keys, PKCS#8 for private keys) so any provider can interpret them.
//! `Debug` output never includes secret bytes.

use crate::error::{Error, Result};
use rsa::pkcs8::EncodePublicKey;
use rsa::{BigUint, RsaPublicKey};
use std::fmt;

/// What a key is requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyUsage {
    /// Unwrapping (decrypting) another key
    KeyUnwrap,
    /// Decrypting referenced content
    Decryption,
    /// Verifying a signature
    SignatureVerification,
}

/// Raw symmetric key bytes shaped for one algorithm family
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey {
    algorithm_family: String,
    bytes: Vec<u8>,
}

impl SecretKey {
    /// Create a secret key for an algorithm family (e.g. `"AES"`)
    pub fn new(algorithm_family: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            algorithm_family: algorithm_family.into(),
            bytes,
        }
    }

    /// Algorithm family this key was shaped for
    pub fn algorithm_family(&self) -> &str {
        &self.algorithm_family
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("algorithm_family", &self.algorithm_family)
            .field("length", &self.bytes.len())
            .finish()
    }
}

/// Public key as DER-encoded SubjectPublicKeyInfo
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    spki_der: Vec<u8>,
}

impl PublicKey {
    /// Wrap a DER-encoded SubjectPublicKeyInfo
    pub fn from_spki_der(spki_der: Vec<u8>) -> Self {
        Self { spki_der }
    }

    /// Build an RSA public key from big-endian modulus and exponent bytes
    pub fn from_rsa_components(modulus: &[u8], exponent: &[u8]) -> Result<Self> {
        let key = RsaPublicKey::new(
            BigUint::from_bytes_be(modulus),
            BigUint::from_bytes_be(exponent),
        )
        .map_err(|e| Error::structural("RSAKeyValue", format!("invalid RSA public key: {}", e)))?;
        Self::from_rsa(&key)
    }

    /// Encode an RSA public key
    pub fn from_rsa(key: &RsaPublicKey) -> Result<Self> {
        let der = key
            .to_public_key_der()
            .map_err(|e| Error::structural("RSAKeyValue", format!("cannot encode key: {}", e)))?;
        Ok(Self {
            spki_der: der.as_bytes().to_vec(),
        })
    }

    /// DER-encoded SubjectPublicKeyInfo
    pub fn as_der(&self) -> &[u8] {
        &self.spki_der
    }
}

/// Private key as DER-encoded PKCS#8
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    pkcs8_der: Vec<u8>,
}

impl PrivateKey {
    /// Wrap a DER-encoded PKCS#8 private key
    pub fn from_pkcs8_der(pkcs8_der: Vec<u8>) -> Self {
        Self { pkcs8_der }
    }

    /// DER-encoded PKCS#8
    pub fn as_der(&self) -> &[u8] {
        &self.pkcs8_der
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Key material returned by a security token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// Symmetric secret
    Secret(SecretKey),
    /// Public half of an asymmetric key pair
    Public(PublicKey),
    /// Private half of an asymmetric key pair
    Private(PrivateKey),
}

impl Key {
    /// Secret key, if this is one
    pub fn as_secret(&self) -> Option<&SecretKey> {
        match self {
            Key::Secret(secret) => Some(secret),
            _ => None,
        }
    }

    /// Private key, if this is one
    pub fn as_private(&self) -> Option<&PrivateKey> {
        match self {
            Key::Private(private) => Some(private),
            _ => None,
        }
    }

    /// Public key, if this is one
    pub fn as_public(&self) -> Option<&PublicKey> {
        match self {
            Key::Public(public) => Some(public),
            _ => None,
        }
    }
}
