//! Error types for inbound WS-Security processing
//!
//! This module provides the classified errors surfaced by the processing
//! pipeline. Every error carries an error code for categorization and the
//! token identifier, element identifier or algorithm URI it concerns, so a
//! failure can be diagnosed without re-running the message.
//!
//! # Error Codes
//!
//! Error codes follow the pattern: `E<category><number>`
//!
//! Categories:
//! - **E1xxx**: XML and structural errors
//! - **E2xxx**: Algorithm and key material errors
//! - **E3xxx**: Decryption, reference and signature errors
//! - **E4xxx**: Trust and certificate errors
//!
//! ## Common Error Codes
//!
//! - `E1001`: XML parsing error
//! - `E1003`: Malformed or truncated security header structure
//! - `E2001`: Algorithm URI has no mapping
//! - `E2002`: Key material unobtainable from any configured store
//! - `E3001`: Cipher-level failure while decrypting an element
//! - `E3002`: Reference list names an element that never appeared
//! - `E4001`: Trust validation rejected a token

use crate::trust::RejectReason;
use thiserror::Error;

/// Result type for security processing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
///
/// Lets callers branch on the failure class without matching message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed XML or malformed/truncated security structure
    StructuralParse,
    /// Algorithm URI without a native mapping
    UnsupportedAlgorithm,
    /// Key unobtainable from any configured key store
    KeyResolution,
    /// Key material cannot be shaped for the requested algorithm
    KeyDerivation,
    /// Cipher-level decryption failure
    Decryption,
    /// Referenced element never appeared in the stream
    DanglingReference,
    /// Signature value does not verify
    SignatureVerification,
    /// Token identity not trusted
    TrustRejected,
}

/// Errors that can occur while processing a secured message
#[derive(Error, Debug)]
pub enum Error {
    /// XML parsing error
    ///
    /// **Error Code**: E1001
    ///
    /// **Common Causes**:
    /// - Malformed XML syntax
    /// - Invalid character encoding
    /// - Unclosed tags
    #[error("[E1001] XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// XML attribute error
    ///
    /// **Error Code**: E1002
    ///
    /// **Common Causes**:
    /// - Duplicate or malformed attribute
    /// - Invalid escape sequence in an attribute value
    #[error("[E1002] XML attribute error: {0}")]
    XmlAttr(String),

    /// Malformed or truncated security structure
    ///
    /// **Error Code**: E1003
    ///
    /// **Common Causes**:
    /// - Missing required child element (e.g. `CipherData`)
    /// - Stream ended inside a security header element
    /// - Undeclared namespace prefix
    /// - Circular key wrapping chain
    ///
    /// This error is fatal and aborts processing of the message.
    #[error("[E1003] Invalid structure in <{element}>: {message}")]
    StructuralParse {
        /// Element being parsed when the problem was found
        element: String,
        /// Description of the problem
        message: String,
    },

    /// XML writing error
    ///
    /// **Error Code**: E1004
    #[error("[E1004] XML writing error: {0}")]
    XmlWrite(String),

    /// Invalid base64 content in a binary-encoded element
    ///
    /// **Error Code**: E1005
    #[error("[E1005] Invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Algorithm URI has no native mapping
    ///
    /// **Error Code**: E2001
    ///
    /// Fatal for the affected token only.
    #[error("[E2001] Unsupported algorithm: {uri}")]
    UnsupportedAlgorithm {
        /// The unmapped algorithm URI
        uri: String,
    },

    /// Private or secret key unobtainable from any configured store
    ///
    /// **Error Code**: E2002
    ///
    /// **Common Causes**:
    /// - Key store does not contain the private key for the public key
    /// - Credential callback supplied no or a wrong password
    /// - Token reference names an identifier not present in the header
    #[error("[E2002] Key resolution failed for '{identifier}': {message}")]
    KeyResolution {
        /// Token identifier or key reference that failed to resolve
        identifier: String,
        /// Description of the failure
        message: String,
    },

    /// Key material cannot be shaped for the requested algorithm
    ///
    /// **Error Code**: E2003
    #[error("[E2003] Key derivation failed for algorithm {algorithm}: {message}")]
    KeyDerivation {
        /// Requested algorithm URI
        algorithm: String,
        /// Description of the failure
        message: String,
    },

    /// Cipher-level failure while decrypting an element or unwrapping a key
    ///
    /// **Error Code**: E3001
    ///
    /// **Common Causes**:
    /// - Wrong key (authentication tag mismatch, bad padding)
    /// - Truncated or malformed cipher value
    /// - Decrypted content is not well-formed XML
    #[error("[E3001] Decryption of '{element_id}' failed ({algorithm}): {message}")]
    Decryption {
        /// Identifier of the element (or encrypted key) being decrypted
        element_id: String,
        /// Algorithm URI in use
        algorithm: String,
        /// Description of the failure
        message: String,
    },

    /// A reference list names an element that never appeared
    ///
    /// **Error Code**: E3002
    #[error("[E3002] Dangling reference: element '{0}' never appeared in the stream")]
    DanglingReference(String),

    /// Signature value does not verify under the token's key
    ///
    /// **Error Code**: E3003
    #[error("[E3003] Signature verification failed ({algorithm}): {message}")]
    SignatureVerification {
        /// Signature algorithm URI
        algorithm: String,
        /// Description of the failure
        message: String,
    },

    /// Trust validation rejected a token's identity
    ///
    /// **Error Code**: E4001
    ///
    /// Only produced when a caller converts a [`crate::TrustOutcome`] into a
    /// `Result`; the pipeline itself reports trust as a typed outcome.
    #[error("[E4001] Trust rejected: {0}")]
    TrustRejected(RejectReason),

    /// Certificate could not be parsed
    ///
    /// **Error Code**: E4002
    ///
    /// Reported as [`ErrorKind::StructuralParse`].
    #[error("[E4002] Invalid certificate: {0}")]
    Certificate(String),
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlAttr(format!("Attribute parsing failed: {}", err))
    }
}

impl Error {
    /// Create a structural parse error for an element
    ///
    /// # Example
    /// ```ignore
    /// Error::structural("EncryptedKey", "missing CipherData")
    /// ```
    pub fn structural(element: &str, message: impl Into<String>) -> Self {
        Error::StructuralParse {
            element: element.to_string(),
            message: message.into(),
        }
    }

    /// Create a structural error for a missing required child element
    pub fn missing_child(element: &str, child: &str) -> Self {
        Error::StructuralParse {
            element: element.to_string(),
            message: format!("missing required child element <{}>", child),
        }
    }

    /// Create a key resolution error
    pub fn key_resolution(identifier: &str, message: impl Into<String>) -> Self {
        Error::KeyResolution {
            identifier: identifier.to_string(),
            message: message.into(),
        }
    }

    /// Create a key derivation error
    pub fn key_derivation(algorithm: &str, message: impl Into<String>) -> Self {
        Error::KeyDerivation {
            algorithm: algorithm.to_string(),
            message: message.into(),
        }
    }

    /// Create a decryption error for an element
    pub fn decryption(element_id: &str, algorithm: &str, message: impl Into<String>) -> Self {
        Error::Decryption {
            element_id: element_id.to_string(),
            algorithm: algorithm.to_string(),
            message: message.into(),
        }
    }

    /// Create an unsupported algorithm error
    pub fn unsupported_algorithm(uri: &str) -> Self {
        Error::UnsupportedAlgorithm {
            uri: uri.to_string(),
        }
    }

    /// Create an XmlWrite error
    pub fn xml_write(message: String) -> Self {
        Error::XmlWrite(message)
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Xml(_)
            | Error::XmlAttr(_)
            | Error::StructuralParse { .. }
            | Error::XmlWrite(_)
            | Error::Base64(_)
            | Error::Certificate(_) => ErrorKind::StructuralParse,
            Error::UnsupportedAlgorithm { .. } => ErrorKind::UnsupportedAlgorithm,
            Error::KeyResolution { .. } => ErrorKind::KeyResolution,
            Error::KeyDerivation { .. } => ErrorKind::KeyDerivation,
            Error::Decryption { .. } => ErrorKind::Decryption,
            Error::DanglingReference(_) => ErrorKind::DanglingReference,
            Error::SignatureVerification { .. } => ErrorKind::SignatureVerification,
            Error::TrustRejected(_) => ErrorKind::TrustRejected,
        }
    }
}
