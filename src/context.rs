//! Per-message security state shared by all processors

use crate::config::SecurityProperties;
use crate::error::Result;
use crate::registry::TokenRegistry;
use crate::token::{self, SecurityToken, TokenKind};
use crate::trust::TrustOutcome;
use std::sync::Arc;

/// Something the pipeline did to the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    /// A header handler registered a token
    TokenRegistered {
        /// Token identifier
        id: String,
        /// Token variant
        kind: TokenKind,
    },
    /// An encrypted element was replaced by its plaintext
    ElementDecrypted {
        /// Identifier of the `xenc:EncryptedData`
        element_id: String,
        /// Block encryption algorithm
        algorithm: String,
        /// Registered token that supplied the key, if it had an identifier
        token_id: Option<String>,
    },
}

/// Registry, configuration and event log of one message
#[derive(Debug)]
pub struct SecurityContext {
    registry: TokenRegistry,
    events: Vec<SecurityEvent>,
}

impl SecurityContext {
    /// Fresh context for one message
    pub fn new(properties: Arc<SecurityProperties>) -> Self {
        Self {
            registry: TokenRegistry::new(properties),
            events: Vec::new(),
        }
    }

    /// Configuration
    pub fn properties(&self) -> &Arc<SecurityProperties> {
        self.registry.properties()
    }

    /// Token registry
    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// Token registry, for registration
    pub fn registry_mut(&mut self) -> &mut TokenRegistry {
        &mut self.registry
    }

    /// Record an event
    pub fn record(&mut self, event: SecurityEvent) {
        self.events.push(event);
    }

    /// Events recorded so far, in order
    pub fn events(&self) -> &[SecurityEvent] {
        &self.events
    }

    /// Resolve a token by identifier
    pub fn resolve_token(&self, id: &str) -> Result<Arc<dyn SecurityToken>> {
        self.registry.resolve(id)
    }

    /// Verify a signature with the verification key of a registered token
    pub fn verify_signature(
        &self,
        token_id: &str,
        algorithm_uri: &str,
        data: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        let token = self.registry.resolve(token_id)?;
        token::verify_signature(
            token.as_ref(),
            self.properties().crypto_provider().as_ref(),
            algorithm_uri,
            data,
            signature,
        )
    }

    /// Validate the identity behind a registered token
    ///
    /// Unwrapped keys are judged by the identity at the end of their
    /// wrapping chain.
    pub fn validate_trust(&self, token_id: &str) -> Result<TrustOutcome> {
        let token = self.registry.resolve(token_id)?;
        Ok(token::trust_root(&token).verify())
    }

    /// Tear down the registry and event log
    pub fn clear(&mut self) {
        self.registry.clear();
        self.events.clear();
    }
}
