//! Per-message token registry
//!
//! Header handlers register a [`TokenResolver`] under the identifier the
//! document assigns. Nothing is resolved at registration time; the first
//! [`TokenRegistry::resolve`] runs the resolver and memoizes the token, so
//! every later lookup (including lookups from other resolvers) returns the
//! same `Arc` without touching the crypto provider again.

use crate::config::SecurityProperties;
use crate::error::{Error, Result};
use crate::token::SecurityToken;
use std::cell::{Cell, OnceCell};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Deferred computation producing a security token
///
/// Resolvers own everything they need (algorithm URI, key locator, cipher
/// bytes). They may resolve other tokens through the registry they are
/// given; cycles are detected and reported as structural errors.
pub trait TokenResolver: Send {
    /// Produce the token
    fn resolve(&self, registry: &TokenRegistry) -> Result<Arc<dyn SecurityToken>>;
}

/// A resolver with a single-resolution memoization cell
pub struct LazyToken {
    label: String,
    resolver: Box<dyn TokenResolver>,
    token: OnceCell<Arc<dyn SecurityToken>>,
    resolving: Cell<bool>,
}

impl LazyToken {
    /// Wrap a resolver; `label` names it in diagnostics
    pub fn new(label: impl Into<String>, resolver: Box<dyn TokenResolver>) -> Self {
        Self {
            label: label.into(),
            resolver,
            token: OnceCell::new(),
            resolving: Cell::new(false),
        }
    }

    /// Resolve once and return the memoized token
    ///
    /// Failures are not memoized.
    pub fn get(&self, registry: &TokenRegistry) -> Result<Arc<dyn SecurityToken>> {
        if let Some(token) = self.token.get() {
            return Ok(Arc::clone(token));
        }
        if self.resolving.get() {
            return Err(Error::structural(
                "KeyInfo",
                format!("circular key wrapping chain through '{}'", self.label),
            ));
        }

        self.resolving.set(true);
        let resolved = self.resolver.resolve(registry);
        self.resolving.set(false);

        let token = resolved?;
        debug!(token = %self.label, kind = %token.kind(), "token resolved");
        Ok(Arc::clone(self.token.get_or_init(|| token)))
    }

    /// Whether the token has been resolved
    pub fn is_resolved(&self) -> bool {
        self.token.get().is_some()
    }
}

impl fmt::Debug for LazyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyToken")
            .field("label", &self.label)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Identifier to lazy token map for one message
pub struct TokenRegistry {
    properties: Arc<SecurityProperties>,
    entries: HashMap<String, LazyToken>,
}

impl TokenRegistry {
    /// Create an empty registry
    pub fn new(properties: Arc<SecurityProperties>) -> Self {
        Self {
            properties,
            entries: HashMap::new(),
        }
    }

    /// Configuration shared by every resolver
    pub fn properties(&self) -> &Arc<SecurityProperties> {
        &self.properties
    }

    /// Register a resolver under a document-assigned identifier
    ///
    /// Identifiers are unique per message; a second registration fails.
    pub fn register(&mut self, id: &str, resolver: Box<dyn TokenResolver>) -> Result<()> {
        if self.entries.contains_key(id) {
            return Err(Error::structural(
                "Security",
                format!("duplicate token identifier '{}'", id),
            ));
        }
        debug!(token = id, "token registered");
        self.entries
            .insert(id.to_string(), LazyToken::new(id, resolver));
        Ok(())
    }

    /// Resolve a token by identifier (a leading `#` is ignored)
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn SecurityToken>> {
        let id = id.strip_prefix('#').unwrap_or(id);
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| Error::key_resolution(id, "no token registered under this identifier"))?;
        entry.get(self)
    }

    /// Whether an identifier is registered
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id.strip_prefix('#').unwrap_or(id))
    }

    /// Whether the token under `id` has been resolved
    pub fn is_resolved(&self, id: &str) -> bool {
        self.entries
            .get(id.strip_prefix('#').unwrap_or(id))
            .is_some_and(LazyToken::is_resolved)
    }

    /// Registered identifiers
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered identifiers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and memoized token
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for TokenRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRegistry")
            .field("entries", &self.entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::key::PublicKey;
    use crate::token::KeyValueToken;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    impl TokenResolver for Counting {
        fn resolve(&self, registry: &TokenRegistry) -> Result<Arc<dyn SecurityToken>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(KeyValueToken::new(
                None,
                PublicKey::from_spki_der(vec![0x30]),
                Arc::clone(registry.properties()),
            )))
        }
    }

    struct Refers(&'static str);

    impl TokenResolver for Refers {
        fn resolve(&self, registry: &TokenRegistry) -> Result<Arc<dyn SecurityToken>> {
            registry.resolve(self.0)
        }
    }

    fn registry() -> TokenRegistry {
        TokenRegistry::new(Arc::new(SecurityProperties::new()))
    }

    #[test]
    fn test_resolution_is_lazy_and_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = registry();
        registry
            .register("T1", Box::new(Counting(Arc::clone(&calls))))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!registry.is_resolved("T1"));

        let first = registry.resolve("T1").unwrap();
        let second = registry.resolve("#T1").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.is_resolved("#T1"));
    }

    #[test]
    fn test_duplicate_identifier() {
        let mut registry = registry();
        registry.register("T1", Box::new(Refers("x"))).unwrap();
        let err = registry.register("T1", Box::new(Refers("y"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralParse);
    }

    #[test]
    fn test_unknown_identifier() {
        let err = registry().resolve("missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyResolution);
    }

    #[test]
    fn test_cycles_are_structural() {
        let mut registry = registry();
        registry.register("A", Box::new(Refers("A"))).unwrap();
        registry.register("B", Box::new(Refers("C"))).unwrap();
        registry.register("C", Box::new(Refers("B"))).unwrap();

        let direct = registry.resolve("A").unwrap_err();
        assert_eq!(direct.kind(), ErrorKind::StructuralParse);
        assert!(direct.to_string().contains("circular"));

        let transitive = registry.resolve("B").unwrap_err();
        assert!(transitive.to_string().contains("circular"));
        assert!(!registry.is_resolved("B"));
    }

    #[test]
    fn test_clear() {
        let mut registry = registry();
        registry.register("A", Box::new(Refers("A"))).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.contains("A"));
    }
}
