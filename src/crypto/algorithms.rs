//! Algorithm URI to native capability mapping
//!
//! Adding support for an algorithm means adding one row to [`ALGORITHMS`]
//! and teaching the provider the matching [`Cipher`].

use crate::error::{Error, Result};

/// RSA PKCS#1 v1.5 key transport
pub const RSA_V1_5: &str = "http://www.w3.org/2001/04/xmlenc#rsa-1_5";

/// RSA-OAEP key transport with MGF1/SHA-1 (XML Encryption 1.0)
pub const RSA_OAEP_MGF1P: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p";

/// RSA-OAEP key transport (XML Encryption 1.1, SHA-1 defaults)
pub const RSA_OAEP_11: &str = "http://www.w3.org/2009/xmlenc11#rsa-oaep";

/// AES-128 in GCM mode
pub const AES128_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes128-gcm";

/// AES-256 in GCM mode
pub const AES256_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes256-gcm";

/// RSA PKCS#1 v1.5 signature with SHA-256
pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

/// ECDSA P-256 signature with SHA-256
pub const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";

/// Operation class of an algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    /// Asymmetric encryption of a symmetric key
    KeyTransport,
    /// Symmetric encryption of content
    BlockEncryption,
    /// Digital signature
    Signature,
}

/// Native primitive selected for an algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cipher {
    /// RSAES-PKCS1-v1_5
    RsaPkcs1v15,
    /// RSAES-OAEP with SHA-1 digest and MGF1/SHA-1
    RsaOaepSha1,
    /// AES-GCM, 96-bit IV prepended, 128-bit tag appended
    AesGcm,
    /// RSASSA-PKCS1-v1_5 with SHA-256
    RsaSha256,
    /// ECDSA on P-256 with SHA-256
    EcdsaP256Sha256,
}

/// Native capability an algorithm URI maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherCapability {
    /// Algorithm URI
    pub uri: &'static str,
    /// Operation class
    pub kind: AlgorithmKind,
    /// Native primitive
    pub cipher: Cipher,
    /// Key algorithm family (`"RSA"`, `"AES"`, `"EC"`)
    pub key_family: &'static str,
    /// Required symmetric key length in bytes
    pub key_length: Option<usize>,
}

/// Algorithms understood by the default provider
pub static ALGORITHMS: &[CipherCapability] = &[
    CipherCapability {
        uri: RSA_V1_5,
        kind: AlgorithmKind::KeyTransport,
        cipher: Cipher::RsaPkcs1v15,
        key_family: "RSA",
        key_length: None,
    },
    CipherCapability {
        uri: RSA_OAEP_MGF1P,
        kind: AlgorithmKind::KeyTransport,
        cipher: Cipher::RsaOaepSha1,
        key_family: "RSA",
        key_length: None,
    },
    CipherCapability {
        uri: RSA_OAEP_11,
        kind: AlgorithmKind::KeyTransport,
        cipher: Cipher::RsaOaepSha1,
        key_family: "RSA",
        key_length: None,
    },
    CipherCapability {
        uri: AES128_GCM,
        kind: AlgorithmKind::BlockEncryption,
        cipher: Cipher::AesGcm,
        key_family: "AES",
        key_length: Some(16),
    },
    CipherCapability {
        uri: AES256_GCM,
        kind: AlgorithmKind::BlockEncryption,
        cipher: Cipher::AesGcm,
        key_family: "AES",
        key_length: Some(32),
    },
    CipherCapability {
        uri: RSA_SHA256,
        kind: AlgorithmKind::Signature,
        cipher: Cipher::RsaSha256,
        key_family: "RSA",
        key_length: None,
    },
    CipherCapability {
        uri: ECDSA_SHA256,
        kind: AlgorithmKind::Signature,
        cipher: Cipher::EcdsaP256Sha256,
        key_family: "EC",
        key_length: None,
    },
];

/// Look up the capability for an algorithm URI
pub fn algorithm_mapping(uri: &str) -> Result<&'static CipherCapability> {
    ALGORITHMS
        .iter()
        .find(|capability| capability.uri == uri)
        .ok_or_else(|| Error::unsupported_algorithm(uri))
}
