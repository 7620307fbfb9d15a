use super::{KeyValueToken, SecurityToken, X509Token};
use crate::certificate::Certificate;
use crate::crypto::KeyStore;
use crate::error::{Error, Result};
use crate::header::EncryptedKeyResolver;
use crate::key::{KeyUsage, PublicKey};
use crate::model::KeyInfo;
use crate::registry::{TokenRegistry, TokenResolver};
use std::sync::Arc;
use tracing::debug;

/// Resolve the token a key locator points at
///
/// Direct references go through the registry (memoized, cycle checked).
/// Certificate references are looked up in the key store matching `usage`
/// first and then in the other configured store.
pub fn resolve_key_info(
    key_info: &KeyInfo,
    registry: &TokenRegistry,
    usage: KeyUsage,
) -> Result<Arc<dyn SecurityToken>> {
    let props = registry.properties();
    match key_info {
        KeyInfo::DirectReference { id, .. } => registry.resolve(id),
        KeyInfo::SubjectKeyIdentifier(ski) => {
            let cert = find_certificate(registry, usage, |store| {
                store.certificate_by_subject_key_id(ski)
            })
            .ok_or_else(|| {
                Error::key_resolution(
                    &hex(ski),
                    "no certificate with this subject key identifier",
                )
            })?;
            certificate_token(cert, registry)
        }
        KeyInfo::IssuerSerial { issuer, serial } => {
            let cert = find_certificate(registry, usage, |store| {
                store.certificate_by_issuer_serial(issuer, serial)
            })
            .ok_or_else(|| {
                Error::key_resolution(
                    &format!("{} #{}", issuer, serial),
                    "no certificate with this issuer and serial number",
                )
            })?;
            certificate_token(cert, registry)
        }
        KeyInfo::X509Certificate(der) => certificate_token(Certificate::from_der(der)?, registry),
        KeyInfo::KeyValue(rsa) => {
            let public = PublicKey::from_rsa_components(&rsa.modulus, &rsa.exponent)?;
            Ok(Arc::new(KeyValueToken::new(None, public, Arc::clone(props))))
        }
        KeyInfo::EncryptedKey(encrypted_key) => {
            debug!("unwrapping inline EncryptedKey");
            EncryptedKeyResolver::new((**encrypted_key).clone()).resolve(registry)
        }
    }
}

fn find_certificate<F>(registry: &TokenRegistry, usage: KeyUsage, lookup: F) -> Option<Certificate>
where
    F: Fn(&dyn KeyStore) -> Option<Certificate>,
{
    let props = registry.properties();
    let (first, second) = match usage {
        KeyUsage::SignatureVerification => {
            (props.signature_key_store(), props.decryption_key_store())
        }
        KeyUsage::KeyUnwrap | KeyUsage::Decryption => {
            (props.decryption_key_store(), props.signature_key_store())
        }
    };
    first
        .into_iter()
        .chain(second)
        .find_map(|store| lookup(store.as_ref()))
}

fn certificate_token(
    cert: Certificate,
    registry: &TokenRegistry,
) -> Result<Arc<dyn SecurityToken>> {
    Ok(Arc::new(X509Token::new(
        None,
        vec![cert],
        Arc::clone(registry.properties()),
    )?))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
