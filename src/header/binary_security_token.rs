//! `wsse:BinarySecurityToken` handling

use crate::certificate::Certificate;
use crate::chain::ProcessorContext;
use crate::constants::X509_V3_TOKEN_TYPE;
use crate::context::SecurityEvent;
use crate::error::{Error, Result};
use crate::parser::{XmlElement, parse_binary_security_token};
use crate::registry::{TokenRegistry, TokenResolver};
use crate::token::{SecurityToken, TokenKind, X509Token};
use std::sync::Arc;
use super::HeaderElement;
use tracing::debug;

/// Register a lazy certificate token for a buffered binary security token
pub fn handle_binary_security_token(
    element: HeaderElement<'_>,
    ctx: &mut ProcessorContext<'_>,
) -> Result<()> {
    let token = parse_binary_security_token(&XmlElement::from_events(element.events)?)?;
    if let Some(value_type) = &token.value_type {
        if value_type != X509_V3_TOKEN_TYPE {
            return Err(Error::structural(
                "BinarySecurityToken",
                format!("unsupported value type '{}'", value_type),
            ));
        }
    }
    let Some(id) = token.id else {
        debug!("BinarySecurityToken without identifier ignored");
        return Ok(());
    };

    ctx.registry_mut().register(
        &id,
        Box::new(CertificateResolver {
            id: id.clone(),
            der: token.value,
        }),
    )?;
    ctx.record(SecurityEvent::TokenRegistered {
        id,
        kind: TokenKind::X509,
    });
    Ok(())
}

/// Parses the embedded certificate on first use
struct CertificateResolver {
    id: String,
    der: Vec<u8>,
}

impl TokenResolver for CertificateResolver {
    fn resolve(&self, registry: &TokenRegistry) -> Result<Arc<dyn SecurityToken>> {
        let certificate = Certificate::from_der(&self.der)?;
        debug!(token = %self.id, subject = certificate.subject(), "certificate token parsed");
        Ok(Arc::new(X509Token::new(
            Some(self.id.clone()),
            vec![certificate],
            Arc::clone(registry.properties()),
        )?))
    }
}
