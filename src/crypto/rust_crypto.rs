//! Default crypto provider on the RustCrypto stack
//!
//! Key transport uses `rsa`, content encryption uses `aes-gcm` with the
//! XML Encryption 1.1 layout (IV || ciphertext || tag), and signatures use
//! `rsa` (PKCS#1 v1.5) and `p256` (ECDSA).

use super::algorithms::{AlgorithmKind, Cipher, CipherCapability};
use super::{CryptoError, CryptoProvider};
use crate::key::{Key, PublicKey};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::Sha256;

/// Length of the AES-GCM initialization vector
const GCM_IV_LENGTH: usize = 12;

/// Length of the AES-GCM authentication tag
const GCM_TAG_LENGTH: usize = 16;

/// Crypto provider backed by pure-Rust primitives
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCryptoProvider;

impl RustCryptoProvider {
    /// Create the provider
    pub fn new() -> Self {
        Self
    }
}

impl CryptoProvider for RustCryptoProvider {
    fn decrypt(
        &self,
        capability: &CipherCapability,
        key: &Key,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        match capability.cipher {
            Cipher::RsaPkcs1v15 => rsa_private_key(key)?
                .decrypt(Pkcs1v15Encrypt, ciphertext)
                .map_err(|e| CryptoError::Failure(format!("RSA decryption failed: {}", e))),
            Cipher::RsaOaepSha1 => rsa_private_key(key)?
                .decrypt(Oaep::new::<Sha1>(), ciphertext)
                .map_err(|e| CryptoError::Failure(format!("RSA-OAEP decryption failed: {}", e))),
            Cipher::AesGcm => {
                let secret = secret_bytes(key, capability)?;
                match secret.len() {
                    16 => decrypt_aes_gcm::<Aes128Gcm>(secret, ciphertext),
                    32 => decrypt_aes_gcm::<Aes256Gcm>(secret, ciphertext),
                    n => Err(CryptoError::InvalidKey(format!("{}-byte AES key", n))),
                }
            }
            Cipher::RsaSha256 | Cipher::EcdsaP256Sha256 => {
                Err(CryptoError::WrongOperation("decryption"))
            }
        }
    }

    fn encrypt(
        &self,
        capability: &CipherCapability,
        key: &Key,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        match capability.cipher {
            Cipher::RsaPkcs1v15 => rsa_public_key(key)?
                .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
                .map_err(|e| CryptoError::Failure(format!("RSA encryption failed: {}", e))),
            Cipher::RsaOaepSha1 => rsa_public_key(key)?
                .encrypt(&mut OsRng, Oaep::new::<Sha1>(), plaintext)
                .map_err(|e| CryptoError::Failure(format!("RSA-OAEP encryption failed: {}", e))),
            Cipher::AesGcm => {
                let secret = secret_bytes(key, capability)?;
                match secret.len() {
                    16 => encrypt_aes_gcm::<Aes128Gcm>(secret, plaintext),
                    32 => encrypt_aes_gcm::<Aes256Gcm>(secret, plaintext),
                    n => Err(CryptoError::InvalidKey(format!("{}-byte AES key", n))),
                }
            }
            Cipher::RsaSha256 | Cipher::EcdsaP256Sha256 => {
                Err(CryptoError::WrongOperation("encryption"))
            }
        }
    }

    fn verify_signature(
        &self,
        capability: &CipherCapability,
        public_key: &PublicKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        if capability.kind != AlgorithmKind::Signature {
            return Err(CryptoError::WrongOperation("signature verification"));
        }
        match capability.cipher {
            Cipher::RsaSha256 => verify_rsa_sha256(public_key, data, signature),
            Cipher::EcdsaP256Sha256 => verify_ecdsa_p256(public_key, data, signature),
            _ => Err(CryptoError::WrongOperation("signature verification")),
        }
    }
}

fn rsa_private_key(key: &Key) -> Result<RsaPrivateKey, CryptoError> {
    let private = key
        .as_private()
        .ok_or_else(|| CryptoError::InvalidKey("RSA private key required".to_string()))?;
    RsaPrivateKey::from_pkcs8_der(private.as_der())
        .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA private key: {}", e)))
}

fn rsa_public_key(key: &Key) -> Result<RsaPublicKey, CryptoError> {
    let public = key
        .as_public()
        .ok_or_else(|| CryptoError::InvalidKey("RSA public key required".to_string()))?;
    RsaPublicKey::from_public_key_der(public.as_der())
        .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA public key: {}", e)))
}

fn secret_bytes<'k>(key: &'k Key, capability: &CipherCapability) -> Result<&'k [u8], CryptoError> {
    let secret = key
        .as_secret()
        .ok_or_else(|| CryptoError::InvalidKey("symmetric key required".to_string()))?;
    if let Some(expected) = capability.key_length {
        if secret.as_bytes().len() != expected {
            return Err(CryptoError::InvalidKey(format!(
                "expected {}-byte key, got {} bytes",
                expected,
                secret.as_bytes().len()
            )));
        }
    }
    Ok(secret.as_bytes())
}

/// Decrypt IV || ciphertext || tag
fn decrypt_aes_gcm<C: Aead + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < GCM_IV_LENGTH + GCM_TAG_LENGTH {
        return Err(CryptoError::Failure(format!(
            "cipher value too short for AES-GCM ({} bytes)",
            data.len()
        )));
    }

    let cipher = C::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(format!("Invalid key length: {}", e)))?;
    let (iv, payload) = data.split_at(GCM_IV_LENGTH);

    cipher
        .decrypt(GenericArray::from_slice(iv), payload)
        .map_err(|e| CryptoError::Failure(format!("AES-GCM decryption failed: {}", e)))
}

/// Encrypt into IV || ciphertext || tag with a fresh random IV
fn encrypt_aes_gcm<C: Aead + AeadCore + KeyInit>(
    key: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = C::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(format!("Invalid key length: {}", e)))?;
    let nonce = C::generate_nonce(&mut OsRng);

    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Failure(format!("AES-GCM encryption failed: {}", e)))?;

    let mut out = Vec::with_capacity(nonce.len() + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn verify_rsa_sha256(
    public_key: &PublicKey,
    data: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    use rsa::pkcs1v15::{Signature, VerifyingKey};
    use rsa::signature::Verifier as _;

    let key = RsaPublicKey::from_public_key_der(public_key.as_der())
        .map_err(|e| CryptoError::InvalidKey(format!("bad RSA public key: {}", e)))?;
    let verifying_key = VerifyingKey::<Sha256>::new(key);
    let signature = Signature::try_from(signature)
        .map_err(|e| CryptoError::Failure(format!("bad RSA signature bytes: {}", e)))?;
    verifying_key
        .verify(data, &signature)
        .map_err(|_| CryptoError::Failure("RSA signature does not verify".to_string()))
}

fn verify_ecdsa_p256(
    public_key: &PublicKey,
    data: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    use p256::ecdsa::signature::Verifier as _;
    use p256::ecdsa::{Signature, VerifyingKey};
    use p256::pkcs8::DecodePublicKey as _;

    let verifying_key = VerifyingKey::from_public_key_der(public_key.as_der())
        .map_err(|e| CryptoError::InvalidKey(format!("bad P-256 public key: {}", e)))?;
    // XML Signature uses the fixed r || s form; DER is accepted as well
    let signature = if signature.len() == 64 {
        Signature::from_slice(signature)
    } else {
        Signature::from_der(signature)
    }
    .map_err(|e| CryptoError::Failure(format!("bad ECDSA signature bytes: {}", e)))?;
    verifying_key
        .verify(data, &signature)
        .map_err(|_| CryptoError::Failure("ECDSA signature does not verify".to_string()))
}
