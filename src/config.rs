//! Security configuration
//!
//! [`SecurityProperties`] is read-only for the pipeline. It is built once,
//! wrapped in an `Arc` and shared by every message processed with it.

use crate::crypto::{CredentialCallback, CryptoProvider, KeyStore, RustCryptoProvider};
use crate::trust::TrustAnchors;
use std::sync::Arc;

/// Default bound on events buffered for one security header child
pub const DEFAULT_MAX_PENDING_EVENTS: usize = 10_000;

/// Configuration for inbound security processing
///
/// # Example
///
/// ```ignore
/// let props = SecurityProperties::new()
///     .with_decryption_key_store(Arc::new(store))
///     .with_credential_callback(Arc::new(passwords))
///     .with_trust_anchors(anchors);
/// ```
#[derive(Clone)]
pub struct SecurityProperties {
    crypto_provider: Arc<dyn CryptoProvider>,
    signature_key_store: Option<Arc<dyn KeyStore>>,
    decryption_key_store: Option<Arc<dyn KeyStore>>,
    credential_callback: Option<Arc<dyn CredentialCallback>>,
    trust_anchors: TrustAnchors,
    key_store_fallback: bool,
    max_pending_events: usize,
}

impl SecurityProperties {
    /// Configuration with the default crypto provider and no key stores
    pub fn new() -> Self {
        Self {
            crypto_provider: Arc::new(RustCryptoProvider::new()),
            signature_key_store: None,
            decryption_key_store: None,
            credential_callback: None,
            trust_anchors: TrustAnchors::new(),
            key_store_fallback: true,
            max_pending_events: DEFAULT_MAX_PENDING_EVENTS,
        }
    }

    /// Use a different crypto provider
    pub fn with_crypto_provider(mut self, provider: Arc<dyn CryptoProvider>) -> Self {
        self.crypto_provider = provider;
        self
    }

    /// Key store consulted for signature verification keys
    pub fn with_signature_key_store(mut self, store: Arc<dyn KeyStore>) -> Self {
        self.signature_key_store = Some(store);
        self
    }

    /// Key store consulted for decryption keys
    pub fn with_decryption_key_store(mut self, store: Arc<dyn KeyStore>) -> Self {
        self.decryption_key_store = Some(store);
        self
    }

    /// Callback supplying passwords for protected keys
    pub fn with_credential_callback(mut self, callback: Arc<dyn CredentialCallback>) -> Self {
        self.credential_callback = Some(callback);
        self
    }

    /// Trust anchors for identity validation
    pub fn with_trust_anchors(mut self, anchors: TrustAnchors) -> Self {
        self.trust_anchors = anchors;
        self
    }

    /// Whether key-value tokens retry the decryption store after the
    /// signature store fails to produce a private key (default: on)
    pub fn with_key_store_fallback(mut self, enabled: bool) -> Self {
        self.key_store_fallback = enabled;
        self
    }

    /// Bound on events buffered for one security header child
    pub fn with_max_pending_events(mut self, max: usize) -> Self {
        self.max_pending_events = max;
        self
    }

    /// Crypto provider
    pub fn crypto_provider(&self) -> &Arc<dyn CryptoProvider> {
        &self.crypto_provider
    }

    /// Signature verification key store
    pub fn signature_key_store(&self) -> Option<&Arc<dyn KeyStore>> {
        self.signature_key_store.as_ref()
    }

    /// Decryption key store
    pub fn decryption_key_store(&self) -> Option<&Arc<dyn KeyStore>> {
        self.decryption_key_store.as_ref()
    }

    /// Credential callback
    pub fn credential_callback(&self) -> Option<&dyn CredentialCallback> {
        self.credential_callback.as_deref()
    }

    /// Trust anchors
    pub fn trust_anchors(&self) -> &TrustAnchors {
        &self.trust_anchors
    }

    /// Whether the decryption store fallback is enabled
    pub fn key_store_fallback(&self) -> bool {
        self.key_store_fallback
    }

    /// Bound on events buffered for one security header child
    pub fn max_pending_events(&self) -> usize {
        self.max_pending_events
    }
}

impl Default for SecurityProperties {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SecurityProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityProperties")
            .field(
                "signature_key_store",
                &self.signature_key_store.as_ref().map(|s| s.name().to_string()),
            )
            .field(
                "decryption_key_store",
                &self.decryption_key_store.as_ref().map(|s| s.name().to_string()),
            )
            .field("credential_callback", &self.credential_callback.is_some())
            .field("trust_anchors", &self.trust_anchors.len())
            .field("key_store_fallback", &self.key_store_fallback)
            .field("max_pending_events", &self.max_pending_events)
            .finish()
    }
}
