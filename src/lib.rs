//! # wssec-stream
//!
//! Streaming inbound WS-Security processing for SOAP messages.
//!
//! A message is consumed as a forward-only sequence of parse events. The
//! security header is recognised as it streams past: wrapped keys, reference
//! lists, binary security tokens and key values register *lazy* tokens in a
//! per-message registry, and encrypted elements elsewhere in the message are
//! decrypted in place when they arrive. Key material is only unwrapped when
//! something needs it, and every token is resolved at most once.
//!
//! ## Features
//!
//! - Pure Rust implementation with no unsafe code
//! - Ordered, self-extending processor chain over any event source
//! - Lazy, memoized and cycle-checked token resolution
//! - Decrypt-on-reference with atomic splicing of plaintext
//! - Certificate and key trust validation with distinguished reject reasons
//! - Pluggable crypto provider and key stores
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wssec_stream::{InMemoryKeyStore, InboundSecurity, SecurityProperties};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryKeyStore::new("service");
//! let props = SecurityProperties::new().with_decryption_key_store(Arc::new(store));
//! let inbound = InboundSecurity::new(props);
//!
//! let message = std::fs::read("request.xml")?;
//! let mut stream = inbound.process_bytes(&message);
//! for event in stream.by_ref() {
//!     let event = event?;
//!     // hand the decrypted event to the application
//! #   let _ = event;
//! }
//! for recorded in stream.security_context().events() {
//!     println!("{:?}", recorded);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod certificate;
pub mod chain;
pub mod config;
pub mod constants;
pub mod context;
pub mod crypto;
pub mod decrypt;
pub mod error;
pub mod event;
pub mod header;
pub mod inbound;
pub mod key;
pub mod model;
pub mod parser;
pub mod registry;
pub mod streaming;
pub mod token;
pub mod trust;
pub mod writer;

pub use certificate::Certificate;
pub use chain::{Position, Processor, ProcessorChain, ProcessorContext};
pub use config::SecurityProperties;
pub use context::{SecurityContext, SecurityEvent};
pub use crypto::{
    CredentialCallback, CredentialUsage, CryptoError, CryptoProvider, InMemoryKeyStore, KeyStore,
    RustCryptoProvider,
};
pub use decrypt::{DecryptProcessor, KeySource};
pub use error::{Error, ErrorKind, Result};
pub use event::{QName, StartElement, XmlEvent};
pub use header::{HeaderElement, HeaderHandler, HeaderHandlerTable, SecurityHeaderProcessor};
pub use inbound::{InboundSecurity, InboundStream};
pub use key::{Key, KeyUsage, PrivateKey, PublicKey, SecretKey};
pub use registry::{LazyToken, TokenRegistry, TokenResolver};
pub use streaming::{EventSource, VecEventSource, XmlEventReader};
pub use token::{SecurityToken, TokenKind};
pub use trust::{RejectReason, TrustAnchors, TrustOutcome, TrustValidator};
pub use writer::EventWriter;
