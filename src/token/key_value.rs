use super::{KeyCache, SecurityToken, TokenKind, cached};
use crate::config::SecurityProperties;
use crate::crypto::{AlgorithmKind, CipherCapability, CredentialUsage};
use crate::error::{Error, Result};
use crate::key::{Key, KeyUsage, PrivateKey, PublicKey};
use crate::trust::TrustOutcome;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Bare RSA public key carried in `ds:KeyValue`
///
/// The private half, when one is needed, is looked up in the signature
/// verification key store first. If that fails and a different decryption
/// key store is configured (and the fallback is enabled), the decryption
/// store is tried before the original failure is reported.
pub struct KeyValueToken {
    id: Option<String>,
    public_key: PublicKey,
    properties: Arc<SecurityProperties>,
    keys: KeyCache,
}

impl KeyValueToken {
    /// Create a token for a public key
    pub fn new(
        id: Option<String>,
        public_key: PublicKey,
        properties: Arc<SecurityProperties>,
    ) -> Self {
        Self {
            id,
            public_key,
            properties,
            keys: Mutex::new(HashMap::new()),
        }
    }

    fn label(&self) -> &str {
        self.id.as_deref().unwrap_or("KeyValue")
    }

    fn private_key(&self) -> Result<PrivateKey> {
        let props = &self.properties;
        let callback = props.credential_callback();

        let Some(primary) = props.signature_key_store() else {
            let original = Error::key_resolution(self.label(), "no signature key store configured");
            return match props.decryption_key_store() {
                Some(secondary) if props.key_store_fallback() => {
                    warn!(
                        token = self.label(),
                        store = secondary.name(),
                        "falling back to decryption key store"
                    );
                    secondary
                        .lookup_private_key(&self.public_key, CredentialUsage::Decryption, callback)
                        .map_err(|_| original)
                }
                _ => Err(original),
            };
        };

        match primary.lookup_private_key(&self.public_key, CredentialUsage::Signature, callback) {
            Ok(key) => Ok(key),
            Err(original) => match props.decryption_key_store() {
                Some(secondary) if props.key_store_fallback() && !Arc::ptr_eq(primary, secondary) => {
                    warn!(
                        token = self.label(),
                        primary = primary.name(),
                        store = secondary.name(),
                        "falling back to decryption key store"
                    );
                    secondary
                        .lookup_private_key(&self.public_key, CredentialUsage::Decryption, callback)
                        .map_err(|_| original)
                }
                _ => Err(original),
            },
        }
    }

    fn derive(&self, capability: &CipherCapability, usage: KeyUsage) -> Result<Key> {
        if capability.key_family != "RSA" {
            return Err(Error::key_derivation(
                capability.uri,
                format!("RSA key cannot serve {} algorithms", capability.key_family),
            ));
        }
        match (capability.kind, usage) {
            (AlgorithmKind::Signature, KeyUsage::SignatureVerification) => {
                Ok(Key::Public(self.public_key.clone()))
            }
            (AlgorithmKind::KeyTransport, KeyUsage::KeyUnwrap | KeyUsage::Decryption) => {
                let private = self.private_key()?;
                debug!(token = self.label(), algorithm = capability.uri, "resolved private key");
                Ok(Key::Private(private))
            }
            (kind, usage) => Err(Error::key_derivation(
                capability.uri,
                format!("{:?} algorithm cannot be used for {:?}", kind, usage),
            )),
        }
    }
}

impl SecurityToken for KeyValueToken {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn kind(&self) -> TokenKind {
        TokenKind::KeyValue
    }

    fn is_asymmetric(&self) -> bool {
        true
    }

    fn key(&self, algorithm_uri: &str, usage: KeyUsage) -> Result<Key> {
        let capability = self.properties.crypto_provider().resolve_algorithm(algorithm_uri)?;
        cached(&self.keys, algorithm_uri, usage, || self.derive(capability, usage))
    }

    fn public_key(&self) -> Option<PublicKey> {
        Some(self.public_key.clone())
    }

    fn verify(&self) -> TrustOutcome {
        self.properties
            .crypto_provider()
            .validate_key_trust(&self.public_key, self.properties.trust_anchors())
    }
}

impl fmt::Debug for KeyValueToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueToken")
            .field("id", &self.id)
            .field("public_key_length", &self.public_key.as_der().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::algorithms::{AES128_GCM, RSA_SHA256, RSA_V1_5};
    use crate::crypto::{InMemoryKeyStore, KeyStore};
    use crate::error::ErrorKind;
    use tracing_test::traced_test;

    fn public() -> PublicKey {
        PublicKey::from_spki_der(vec![0x30, 0x01, 0xAA])
    }

    fn store_with_key(name: &str) -> Arc<InMemoryKeyStore> {
        Arc::new(InMemoryKeyStore::new(name).with_private_key(
            "kv",
            public(),
            PrivateKey::from_pkcs8_der(name.as_bytes().to_vec()),
            None,
        ))
    }

    #[test]
    fn test_signature_store_first() {
        let props = SecurityProperties::new()
            .with_signature_key_store(store_with_key("sig"))
            .with_decryption_key_store(store_with_key("dec"));
        let token = KeyValueToken::new(None, public(), Arc::new(props));
        let key = token.key(RSA_V1_5, KeyUsage::KeyUnwrap).unwrap();
        assert_eq!(key.as_private().unwrap().as_der(), b"sig");
    }

    #[test]
    #[traced_test]
    fn test_fallback_to_decryption_store() {
        let props = SecurityProperties::new()
            .with_signature_key_store(Arc::new(InMemoryKeyStore::new("sig")))
            .with_decryption_key_store(store_with_key("dec"));
        let token = KeyValueToken::new(None, public(), Arc::new(props));
        let key = token.key(RSA_V1_5, KeyUsage::KeyUnwrap).unwrap();
        assert_eq!(key.as_private().unwrap().as_der(), b"dec");
        assert!(logs_contain("falling back to decryption key store"));
    }

    #[test]
    fn test_both_stores_failing_surfaces_primary_error() {
        let props = SecurityProperties::new()
            .with_signature_key_store(Arc::new(InMemoryKeyStore::new("sig")))
            .with_decryption_key_store(Arc::new(InMemoryKeyStore::new("dec")));
        let token = KeyValueToken::new(Some("KV".to_string()), public(), Arc::new(props));
        let err = token.key(RSA_V1_5, KeyUsage::KeyUnwrap).unwrap_err();
        assert!(err.to_string().contains("'sig'"));
        assert!(!err.to_string().contains("'dec'"));
    }

    #[test]
    #[traced_test]
    fn test_same_store_is_not_retried() {
        let store: Arc<dyn KeyStore> = Arc::new(InMemoryKeyStore::new("shared"));
        let props = SecurityProperties::new()
            .with_signature_key_store(Arc::clone(&store))
            .with_decryption_key_store(store);
        let token = KeyValueToken::new(None, public(), Arc::new(props));
        assert!(token.key(RSA_V1_5, KeyUsage::KeyUnwrap).is_err());
        assert!(!logs_contain("falling back"));
    }

    #[test]
    fn test_no_signature_store_uses_decryption_store() {
        let props = SecurityProperties::new().with_decryption_key_store(store_with_key("dec"));
        let token = KeyValueToken::new(None, public(), Arc::new(props.clone()));
        assert!(token.key(RSA_V1_5, KeyUsage::KeyUnwrap).is_ok());

        let strict =
            KeyValueToken::new(None, public(), Arc::new(props.with_key_store_fallback(false)));
        let err = strict.key(RSA_V1_5, KeyUsage::KeyUnwrap).unwrap_err();
        assert!(err.to_string().contains("no signature key store configured"));
    }

    #[test]
    fn test_fallback_disabled_surfaces_primary_error() {
        let props = SecurityProperties::new()
            .with_signature_key_store(Arc::new(InMemoryKeyStore::new("sig")))
            .with_decryption_key_store(store_with_key("dec"))
            .with_key_store_fallback(false);
        let token = KeyValueToken::new(None, public(), Arc::new(props));
        let err = token.key(RSA_V1_5, KeyUsage::KeyUnwrap).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyResolution);
        assert!(err.to_string().contains("'sig'"));
    }

    #[test]
    fn test_verification_key_is_public() {
        let token = KeyValueToken::new(None, public(), Arc::new(SecurityProperties::new()));
        let key = token.key(RSA_SHA256, KeyUsage::SignatureVerification).unwrap();
        assert_eq!(key.as_public(), Some(&public()));
        assert!(token.is_asymmetric());
    }

    #[test]
    fn test_cached_key_is_not_reused_for_another_usage() {
        let token = KeyValueToken::new(None, public(), Arc::new(SecurityProperties::new()));
        token.key(RSA_SHA256, KeyUsage::SignatureVerification).unwrap();
        let err = token.key(RSA_SHA256, KeyUsage::KeyUnwrap).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyDerivation);
    }

    #[test]
    fn test_symmetric_algorithm_rejected() {
        let token = KeyValueToken::new(None, public(), Arc::new(SecurityProperties::new()));
        let err = token.key(AES128_GCM, KeyUsage::Decryption).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyDerivation);
    }
}
