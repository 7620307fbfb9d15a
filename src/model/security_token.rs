//! Token and key locator structures

use super::EncryptedKey;

/// `ds:RSAKeyValue`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKeyValue {
    /// Big-endian modulus
    pub modulus: Vec<u8>,
    /// Big-endian public exponent
    pub exponent: Vec<u8>,
}

/// `ds:KeyValue` carried directly in the security header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// `Id` attribute
    pub id: Option<String>,
    /// Embedded RSA public key
    pub rsa: RsaKeyValue,
}

/// `wsse:BinarySecurityToken`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySecurityToken {
    /// `Id` attribute
    pub id: Option<String>,
    /// `ValueType` attribute
    pub value_type: Option<String>,
    /// `EncodingType` attribute
    pub encoding_type: Option<String>,
    /// Decoded token bytes
    pub value: Vec<u8>,
}

/// Key locator (`ds:KeyInfo`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInfo {
    /// `wsse:SecurityTokenReference/wsse:Reference` to a token in this message
    DirectReference {
        /// Token identifier without the leading `#`
        id: String,
        /// `ValueType` attribute
        value_type: Option<String>,
    },
    /// X.509 subject key identifier
    SubjectKeyIdentifier(Vec<u8>),
    /// X.509 issuer DN and serial number
    IssuerSerial {
        /// Issuer distinguished name
        issuer: String,
        /// Serial number in decimal
        serial: String,
    },
    /// Embedded DER certificate
    X509Certificate(Vec<u8>),
    /// Embedded RSA public key
    KeyValue(RsaKeyValue),
    /// Key wrapped inline inside the key locator
    EncryptedKey(Box<EncryptedKey>),
}
