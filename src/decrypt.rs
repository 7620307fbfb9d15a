//! Decrypt-on-reference processor
//!
//! A [`DecryptProcessor`] is bound to one reference list. Events flow
//! through untouched until an element carrying one of the referenced
//! identifiers starts. That subtree is held back, decrypted once complete,
//! and the plaintext is parsed and reinjected at the head of the chain in
//! its place, so every decrypt processor gets to see nested encrypted
//! elements whatever the order of the header blocks. Plaintext is parsed
//! inside the namespace declarations in scope at the encrypted element, so
//! prefixes declared by ancestors keep resolving.

use crate::chain::{Processor, ProcessorContext};
use crate::constants::XENC_NS;
use crate::context::SecurityEvent;
use crate::crypto::AlgorithmKind;
use crate::error::{Error, Result};
use crate::event::{Namespace, QName, StartElement, XmlEvent};
use crate::key::KeyUsage;
use crate::model::{EncryptedData, ReferenceList};
use crate::parser::{XmlElement, parse_encrypted_data};
use crate::registry::LazyToken;
use crate::streaming::read_events;
use crate::token::{SecurityToken, resolve_key_info};
use crate::writer::EventWriter;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Local name of the element plaintext is parsed inside
const PLAINTEXT_WRAPPER: &str = "plaintext";

/// Where the decryption key of the bound references comes from
#[derive(Debug)]
pub enum KeySource {
    /// Registered token (the `Id` of the enclosing `xenc:EncryptedKey`)
    Token(String),
    /// Unregistered token owned by this processor
    Anonymous(LazyToken),
    /// Each `xenc:EncryptedData` names its key in its own `ds:KeyInfo`
    PerElement,
}

#[derive(Debug)]
enum State {
    Idle,
    Buffering {
        id: String,
        depth: usize,
        events: Vec<XmlEvent>,
    },
    Done,
}

/// Processor replacing referenced ciphertext subtrees with plaintext
#[derive(Debug)]
pub struct DecryptProcessor {
    references: Vec<String>,
    key_source: KeySource,
    state: State,
    scopes: Vec<Vec<Namespace>>,
}

impl DecryptProcessor {
    /// Bind a reference list to a key source
    pub fn new(references: ReferenceList, key_source: KeySource) -> Self {
        Self {
            references: references.data_references,
            key_source,
            state: State::Idle,
            scopes: Vec::new(),
        }
    }

    /// Seed the namespace declarations of elements already open when the
    /// processor joins the chain, outermost first
    pub fn with_ancestor_scopes(mut self, scopes: Vec<Vec<Namespace>>) -> Self {
        self.scopes = scopes;
        self
    }

    /// References not seen yet
    pub fn remaining_references(&self) -> &[String] {
        &self.references
    }

    fn resolve_token(
        &self,
        element_id: &str,
        data: &EncryptedData,
        ctx: &ProcessorContext<'_>,
    ) -> Result<(Arc<dyn SecurityToken>, Option<String>)> {
        match &self.key_source {
            KeySource::Token(id) => Ok((ctx.registry().resolve(id)?, Some(id.clone()))),
            KeySource::Anonymous(lazy) => Ok((lazy.get(ctx.registry())?, None)),
            KeySource::PerElement => {
                let key_info = data.key_info.as_ref().ok_or_else(|| {
                    Error::key_resolution(element_id, "EncryptedData carries no KeyInfo")
                })?;
                let token = resolve_key_info(key_info, ctx.registry(), KeyUsage::Decryption)?;
                let id = token.id().map(str::to_string);
                Ok((token, id))
            }
        }
    }

    fn decrypt_and_emit(
        &mut self,
        element_id: &str,
        events: &[XmlEvent],
        ctx: &mut ProcessorContext<'_>,
    ) -> Result<()> {
        let data = XmlElement::from_events(events)
            .and_then(|element| parse_encrypted_data(&element))
            .map_err(|e| {
                Error::decryption(
                    element_id,
                    declared_algorithm(events),
                    format!("malformed ciphertext element: {}", e),
                )
            })?;
        let algorithm = data.encryption_method.algorithm.as_str();
        let (token, token_id) = self.resolve_token(element_id, &data, ctx)?;

        let provider = Arc::clone(ctx.properties().crypto_provider());
        let capability = provider.resolve_algorithm(algorithm)?;
        if capability.kind != AlgorithmKind::BlockEncryption {
            return Err(Error::key_derivation(
                algorithm,
                "not a block encryption algorithm",
            ));
        }
        let key = token.key(algorithm, KeyUsage::Decryption)?;
        let plaintext = provider
            .decrypt(capability, &key, &data.cipher_value)
            .map_err(|e| Error::decryption(element_id, algorithm, e.to_string()))?;
        let replacement = self.parse_plaintext(element_id, algorithm, &plaintext)?;

        debug!(
            element = element_id,
            algorithm,
            events = replacement.len(),
            "element decrypted"
        );
        ctx.record(SecurityEvent::ElementDecrypted {
            element_id: element_id.to_string(),
            algorithm: algorithm.to_string(),
            token_id,
        });

        // Plaintext may itself contain referenced elements, for any processor
        ctx.reinject(replacement);
        if self.references.is_empty() {
            self.state = State::Done;
        }
        Ok(())
    }

    fn parse_plaintext(
        &self,
        element_id: &str,
        algorithm: &str,
        plaintext: &[u8],
    ) -> Result<Vec<XmlEvent>> {
        let not_well_formed = |message: String| {
            Error::decryption(
                element_id,
                algorithm,
                format!("decrypted content is not well-formed: {}", message),
            )
        };

        let mut in_scope: BTreeMap<Option<String>, String> = BTreeMap::new();
        for ns in self.scopes.iter().flatten() {
            in_scope.insert(ns.prefix.clone(), ns.uri.clone());
        }
        let mut wrapper = StartElement::new(QName::new(None, PLAINTEXT_WRAPPER));
        wrapper.namespaces = in_scope
            .into_iter()
            .filter(|(prefix, uri)| prefix.is_some() || !uri.is_empty())
            .map(|(prefix, uri)| Namespace { prefix, uri })
            .collect();

        let mut writer = EventWriter::new(Vec::with_capacity(plaintext.len() + 64));
        writer.write(&XmlEvent::StartElement(wrapper))?;
        let mut document = writer.into_inner();
        document.extend_from_slice(plaintext);
        document.extend_from_slice(format!("</{}>", PLAINTEXT_WRAPPER).as_bytes());

        let mut events = read_events(&document).map_err(|e| not_well_formed(e.to_string()))?;

        // The wrapper must enclose everything: it closes exactly at the end
        let mut depth = 0usize;
        for (index, event) in events.iter().enumerate() {
            match event {
                XmlEvent::StartElement(_) => depth += 1,
                XmlEvent::EndElement(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 && index + 1 != events.len() {
                        return Err(not_well_formed(
                            "content closes the enclosing element".to_string(),
                        ));
                    }
                }
                _ => {}
            }
        }
        if events.len() < 2 {
            return Err(not_well_formed("no content".to_string()));
        }
        events.pop();
        events.remove(0);
        Ok(events)
    }
}

/// Algorithm URI named by the `xenc:EncryptionMethod` of a buffered element
fn declared_algorithm(events: &[XmlEvent]) -> &str {
    events
        .iter()
        .filter_map(XmlEvent::as_start)
        .find(|start| start.name.is(XENC_NS, "EncryptionMethod"))
        .and_then(|start| start.attribute("Algorithm"))
        .unwrap_or("unknown")
}

impl Processor for DecryptProcessor {
    fn name(&self) -> &str {
        "decrypt"
    }

    fn process_event(&mut self, event: XmlEvent, ctx: &mut ProcessorContext<'_>) -> Result<()> {
        if let State::Buffering { depth, events, .. } = &mut self.state {
            match &event {
                XmlEvent::StartElement(_) => *depth += 1,
                XmlEvent::EndElement(_) => *depth -= 1,
                _ => {}
            }
            events.push(event);
            if *depth > 0 {
                return Ok(());
            }
            let State::Buffering { id, events, .. } =
                std::mem::replace(&mut self.state, State::Idle)
            else {
                return Ok(());
            };
            return self.decrypt_and_emit(&id, &events, ctx);
        }

        if matches!(self.state, State::Idle) {
            let matched = event.as_start().and_then(|start| {
                let position = start
                    .id()
                    .and_then(|id| self.references.iter().position(|r| r == id))?;
                Some((position, start.name.is(XENC_NS, "EncryptedData"), start.name.to_string()))
            });
            if let Some((position, is_encrypted_data, name)) = matched {
                let id = self.references.remove(position);
                if !is_encrypted_data {
                    return Err(Error::structural(
                        "ReferenceList",
                        format!("reference '{}' names {}, not EncryptedData", id, name),
                    ));
                }
                trace!(element = %id, "buffering encrypted element");
                self.state = State::Buffering {
                    id,
                    depth: 1,
                    events: vec![event],
                };
                return Ok(());
            }
        }

        match &event {
            XmlEvent::StartElement(start) => self.scopes.push(start.namespaces.clone()),
            XmlEvent::EndElement(_) => {
                self.scopes.pop();
            }
            _ => {}
        }
        ctx.emit(event);
        Ok(())
    }

    fn finish(&mut self, _ctx: &mut ProcessorContext<'_>) -> Result<()> {
        if let State::Buffering { id, .. } = &self.state {
            return Err(Error::structural(
                "EncryptedData",
                format!("stream ended inside encrypted element '{}'", id),
            ));
        }
        if !self.references.is_empty() {
            return Err(Error::DanglingReference(self.references.join(", ")));
        }
        Ok(())
    }
}
