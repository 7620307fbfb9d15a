//! Parsed security header structures
//!
//! Plain data parsed out of buffered header events. Binary payloads are
//! already base64-decoded; reference URIs have their leading `#` removed.

mod encryption;
mod security_token;

pub use encryption::{EncryptedData, EncryptedKey, EncryptionMethod, ReferenceList};
pub use security_token::{BinarySecurityToken, KeyInfo, KeyValue, RsaKeyValue};
