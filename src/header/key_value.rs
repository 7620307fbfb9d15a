//! Header-level `ds:KeyValue` handling

use crate::chain::ProcessorContext;
use crate::context::SecurityEvent;
use crate::error::Result;
use crate::key::PublicKey;
use crate::model::RsaKeyValue;
use crate::parser::{XmlElement, parse_key_value};
use crate::registry::{TokenRegistry, TokenResolver};
use crate::token::{KeyValueToken, SecurityToken, TokenKind};
use std::sync::Arc;
use super::HeaderElement;
use tracing::debug;

/// Register a lazy key-value token for a buffered `ds:KeyValue`
pub fn handle_key_value(element: HeaderElement<'_>, ctx: &mut ProcessorContext<'_>) -> Result<()> {
    let key_value = parse_key_value(&XmlElement::from_events(element.events)?)?;
    let Some(id) = key_value.id else {
        debug!("KeyValue without identifier ignored");
        return Ok(());
    };

    ctx.registry_mut().register(
        &id,
        Box::new(KeyValueResolver {
            id: id.clone(),
            rsa: key_value.rsa,
        }),
    )?;
    ctx.record(SecurityEvent::TokenRegistered {
        id,
        kind: TokenKind::KeyValue,
    });
    Ok(())
}

struct KeyValueResolver {
    id: String,
    rsa: RsaKeyValue,
}

impl TokenResolver for KeyValueResolver {
    fn resolve(&self, registry: &TokenRegistry) -> Result<Arc<dyn SecurityToken>> {
        let public_key = PublicKey::from_rsa_components(&self.rsa.modulus, &self.rsa.exponent)?;
        Ok(Arc::new(KeyValueToken::new(
            Some(self.id.clone()),
            public_key,
            Arc::clone(registry.properties()),
        )))
    }
}
