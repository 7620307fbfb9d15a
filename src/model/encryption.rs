//! XML Encryption structures

use super::KeyInfo;

/// `xenc:EncryptionMethod`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionMethod {
    /// Algorithm URI
    pub algorithm: String,
    /// `ds:DigestMethod` algorithm (RSA-OAEP)
    pub digest_method: Option<String>,
    /// `xenc11:MGF` algorithm (RSA-OAEP, XML Encryption 1.1)
    pub mgf_algorithm: Option<String>,
}

impl EncryptionMethod {
    /// Encryption method with only an algorithm URI
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            digest_method: None,
            mgf_algorithm: None,
        }
    }
}

/// `xenc:EncryptedKey`: a symmetric key wrapped under another key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedKey {
    /// `Id` attribute
    pub id: Option<String>,
    /// Key transport algorithm
    pub encryption_method: EncryptionMethod,
    /// Locator of the wrapping key
    pub key_info: Option<KeyInfo>,
    /// Wrapped key bytes
    pub cipher_value: Vec<u8>,
    /// Elements encrypted under the wrapped key
    pub reference_list: Option<ReferenceList>,
    /// `xenc:CarriedKeyName`
    pub carried_key_name: Option<String>,
}

/// `xenc:EncryptedData`: ciphertext standing in for an element or its content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    /// `Id` attribute
    pub id: Option<String>,
    /// `Type` attribute (`#Element` or `#Content`)
    pub data_type: Option<String>,
    /// Block encryption algorithm
    pub encryption_method: EncryptionMethod,
    /// Locator of the content key
    pub key_info: Option<KeyInfo>,
    /// IV, ciphertext and tag
    pub cipher_value: Vec<u8>,
}

/// `xenc:ReferenceList`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceList {
    /// Identifiers named by `xenc:DataReference`, in document order
    pub data_references: Vec<String>,
}

impl ReferenceList {
    /// Whether `id` is referenced
    pub fn contains(&self, id: &str) -> bool {
        self.data_references.iter().any(|r| r == id)
    }
}
