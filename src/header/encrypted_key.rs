//! `xenc:EncryptedKey` handling

use crate::chain::{Position, ProcessorContext};
use crate::context::SecurityEvent;
use crate::crypto::AlgorithmKind;
use crate::decrypt::{DecryptProcessor, KeySource};
use crate::error::{Error, Result};
use crate::key::KeyUsage;
use crate::model::{EncryptedKey, EncryptionMethod};
use crate::parser::{XmlElement, parse_encrypted_key};
use crate::registry::{LazyToken, TokenRegistry, TokenResolver};
use crate::token::{SecurityToken, TokenKind, UnwrappedSymmetricToken, resolve_key_info};
use std::sync::Arc;
use super::HeaderElement;
use tracing::debug;

const SHA1_DIGEST: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
const MGF1_SHA1: &str = "http://www.w3.org/2009/xmlenc11#mgf1sha1";

/// Parse a buffered `xenc:EncryptedKey`, register its lazy token and bind
/// its reference list to a new decrypt processor
pub fn handle_encrypted_key(
    element: HeaderElement<'_>,
    ctx: &mut ProcessorContext<'_>,
) -> Result<()> {
    let encrypted_key = parse_encrypted_key(&XmlElement::from_events(element.events)?)?;
    let id = encrypted_key.id.clone();
    let references = encrypted_key.reference_list.clone();

    if let Some(id) = &id {
        ctx.registry_mut()
            .register(id, Box::new(EncryptedKeyResolver::new(encrypted_key.clone())))?;
        ctx.record(SecurityEvent::TokenRegistered {
            id: id.clone(),
            kind: TokenKind::UnwrappedSymmetric,
        });
    }

    match references {
        Some(list) => {
            let source = match id {
                Some(id) => KeySource::Token(id),
                None => KeySource::Anonymous(LazyToken::new(
                    "EncryptedKey",
                    Box::new(EncryptedKeyResolver::new(encrypted_key)),
                )),
            };
            debug!(references = list.data_references.len(), "binding reference list");
            ctx.insert_processor(
                Box::new(
                    DecryptProcessor::new(list, source)
                        .with_ancestor_scopes(element.ancestor_scopes.to_vec()),
                ),
                Position::AfterCurrent,
            );
        }
        None if id.is_none() => {
            debug!("EncryptedKey without identifier or references ignored");
        }
        None => {}
    }
    Ok(())
}

/// Unwraps the key of an `xenc:EncryptedKey` on first use
#[derive(Debug, Clone)]
pub struct EncryptedKeyResolver {
    encrypted_key: EncryptedKey,
}

impl EncryptedKeyResolver {
    /// Resolver owning the parsed element
    pub fn new(encrypted_key: EncryptedKey) -> Self {
        Self { encrypted_key }
    }

    fn label(&self) -> &str {
        self.encrypted_key.id.as_deref().unwrap_or("EncryptedKey")
    }
}

impl TokenResolver for EncryptedKeyResolver {
    fn resolve(&self, registry: &TokenRegistry) -> Result<Arc<dyn SecurityToken>> {
        let provider = registry.properties().crypto_provider();
        let method = &self.encrypted_key.encryption_method;

        let capability = provider.resolve_algorithm(&method.algorithm)?;
        if capability.kind != AlgorithmKind::KeyTransport {
            return Err(Error::key_derivation(
                &method.algorithm,
                "not a key transport algorithm",
            ));
        }
        check_oaep_parameters(method)?;

        let key_info = self.encrypted_key.key_info.as_ref().ok_or_else(|| {
            Error::key_resolution(self.label(), "EncryptedKey carries no KeyInfo")
        })?;
        let wrapping = resolve_key_info(key_info, registry, KeyUsage::KeyUnwrap)?;
        let key = wrapping.key(&method.algorithm, KeyUsage::KeyUnwrap)?;

        let raw = provider
            .decrypt(capability, &key, &self.encrypted_key.cipher_value)
            .map_err(|e| Error::decryption(self.label(), &method.algorithm, e.to_string()))?;
        if raw.is_empty() {
            return Err(Error::decryption(
                self.label(),
                &method.algorithm,
                "unwrapped key is empty",
            ));
        }

        debug!(
            token = self.label(),
            wrapping = wrapping.id().unwrap_or("(inline)"),
            algorithm = %method.algorithm,
            "key unwrapped"
        );
        Ok(Arc::new(UnwrappedSymmetricToken::new(
            self.encrypted_key.id.clone(),
            raw,
            wrapping,
            method.algorithm.clone(),
            Arc::clone(provider),
        )))
    }
}

/// Only SHA-1 digests and MGF1/SHA-1 are mapped for RSA-OAEP
fn check_oaep_parameters(method: &EncryptionMethod) -> Result<()> {
    if let Some(digest) = &method.digest_method {
        if digest != SHA1_DIGEST {
            return Err(Error::unsupported_algorithm(digest));
        }
    }
    if let Some(mgf) = &method.mgf_algorithm {
        if mgf != MGF1_SHA1 {
            return Err(Error::unsupported_algorithm(mgf));
        }
    }
    Ok(())
}
