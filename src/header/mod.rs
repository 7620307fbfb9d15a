//! Security header processing
//!
//! [`SecurityHeaderProcessor`] watches for `wsse:Security` inside the SOAP
//! header. Each direct child is held in a pending buffer until its end tag
//! arrives, then handed to the handler registered for its element name in
//! the [`HeaderHandlerTable`]. Handlers parse the buffered subtree, register
//! lazy tokens and may insert processors. The buffered events are forwarded
//! unchanged afterwards.
//!
//! Recognising a new header element means adding one [`HeaderHandler`] to
//! the table.

mod binary_security_token;
mod encrypted_key;
mod key_value;
mod reference_list;

pub use binary_security_token::handle_binary_security_token;
pub use encrypted_key::{EncryptedKeyResolver, handle_encrypted_key};
pub use key_value::handle_key_value;
pub use reference_list::handle_reference_list;

use crate::chain::{Processor, ProcessorContext};
use crate::constants::{DSIG_NS, SOAP11_NS, SOAP12_NS, WSSE_NS, XENC_NS};
use crate::error::{Error, Result};
use crate::event::{Namespace, QName, XmlEvent};
use std::sync::Arc;
use tracing::trace;

/// A complete direct child of `wsse:Security`
#[derive(Debug, Clone, Copy)]
pub struct HeaderElement<'a> {
    /// The element's events, start tag to end tag
    pub events: &'a [XmlEvent],
    /// Namespace declarations of the open ancestors, outermost first
    pub ancestor_scopes: &'a [Vec<Namespace>],
}

/// Handler for one kind of security header element
pub type HandlerFn = fn(HeaderElement<'_>, &mut ProcessorContext<'_>) -> Result<()>;

/// Dispatch table entry
#[derive(Clone, Copy)]
pub struct HeaderHandler {
    /// Element namespace
    pub namespace: &'static str,
    /// Element local name
    pub local_name: &'static str,
    /// Handler receiving the element's complete event subtree
    pub handle: HandlerFn,
}

impl std::fmt::Debug for HeaderHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HeaderHandler({{{}}}{})", self.namespace, self.local_name)
    }
}

/// Handlers for the elements understood out of the box
pub static DEFAULT_HANDLERS: &[HeaderHandler] = &[
    HeaderHandler {
        namespace: XENC_NS,
        local_name: "EncryptedKey",
        handle: handle_encrypted_key,
    },
    HeaderHandler {
        namespace: XENC_NS,
        local_name: "ReferenceList",
        handle: handle_reference_list,
    },
    HeaderHandler {
        namespace: WSSE_NS,
        local_name: "BinarySecurityToken",
        handle: handle_binary_security_token,
    },
    HeaderHandler {
        namespace: DSIG_NS,
        local_name: "KeyValue",
        handle: handle_key_value,
    },
];

/// Element name to handler dispatch table
#[derive(Debug, Clone)]
pub struct HeaderHandlerTable {
    handlers: Vec<HeaderHandler>,
}

impl HeaderHandlerTable {
    /// Table without any handlers
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a handler, replacing one for the same element
    pub fn register(&mut self, handler: HeaderHandler) {
        self.handlers
            .retain(|h| !(h.namespace == handler.namespace && h.local_name == handler.local_name));
        self.handlers.push(handler);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_handler(mut self, handler: HeaderHandler) -> Self {
        self.register(handler);
        self
    }

    /// Handler for an element name
    pub fn get(&self, name: &QName) -> Option<&HeaderHandler> {
        self.handlers
            .iter()
            .find(|h| name.is(h.namespace, h.local_name))
    }

    /// Number of handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HeaderHandlerTable {
    fn default() -> Self {
        Self {
            handlers: DEFAULT_HANDLERS.to_vec(),
        }
    }
}

struct PendingBuffer {
    depth: usize,
    events: Vec<XmlEvent>,
}

/// Processor dispatching `wsse:Security` children to their handlers
pub struct SecurityHeaderProcessor {
    handlers: Arc<HeaderHandlerTable>,
    max_pending: usize,
    path: Vec<QName>,
    scopes: Vec<Vec<Namespace>>,
    security_depth: Option<usize>,
    buffer: Option<PendingBuffer>,
}

impl SecurityHeaderProcessor {
    /// Create the processor
    pub fn new(handlers: Arc<HeaderHandlerTable>, max_pending: usize) -> Self {
        Self {
            handlers,
            max_pending,
            path: Vec::new(),
            scopes: Vec::new(),
            security_depth: None,
            buffer: None,
        }
    }

    fn is_security_header(&self, name: &QName) -> bool {
        if !name.is(WSSE_NS, "Security") || self.path.len() != 2 {
            return false;
        }
        [SOAP11_NS, SOAP12_NS]
            .iter()
            .any(|ns| self.path[0].is(ns, "Envelope") && self.path[1].is(ns, "Header"))
    }

    fn directly_in_security(&self) -> bool {
        self.security_depth
            .is_some_and(|depth| self.path.len() == depth + 1)
    }

    fn check_bound(&self, buffer: &PendingBuffer) -> Result<()> {
        if buffer.events.len() > self.max_pending {
            let name = buffer
                .events
                .first()
                .and_then(XmlEvent::as_start)
                .map(|s| s.name.to_string())
                .unwrap_or_default();
            return Err(Error::structural(
                "Security",
                format!(
                    "header element {} exceeds the pending buffer bound of {} events",
                    name, self.max_pending
                ),
            ));
        }
        Ok(())
    }

    fn dispatch(&self, events: &[XmlEvent], ctx: &mut ProcessorContext<'_>) -> Result<()> {
        let Some(start) = events.first().and_then(XmlEvent::as_start) else {
            return Ok(());
        };
        match self.handlers.get(&start.name) {
            Some(handler) => {
                trace!(element = %start.name, "dispatching header element");
                let element = HeaderElement {
                    events,
                    ancestor_scopes: &self.scopes,
                };
                (handler.handle)(element, ctx)
            }
            None => {
                trace!(element = %start.name, "no handler for header element");
                Ok(())
            }
        }
    }
}

impl Processor for SecurityHeaderProcessor {
    fn name(&self) -> &str {
        "security-header"
    }

    fn process_event(&mut self, event: XmlEvent, ctx: &mut ProcessorContext<'_>) -> Result<()> {
        if let Some(mut buffer) = self.buffer.take() {
            match &event {
                XmlEvent::StartElement(_) => buffer.depth += 1,
                XmlEvent::EndElement(_) => buffer.depth -= 1,
                _ => {}
            }
            buffer.events.push(event);
            self.check_bound(&buffer)?;

            if buffer.depth > 0 {
                self.buffer = Some(buffer);
                return Ok(());
            }
            self.dispatch(&buffer.events, ctx)?;
            for event in buffer.events {
                ctx.emit(event);
            }
            return Ok(());
        }

        if event.is_start() && self.directly_in_security() {
            let buffer = PendingBuffer {
                depth: 1,
                events: vec![event],
            };
            self.check_bound(&buffer)?;
            self.buffer = Some(buffer);
            return Ok(());
        }

        match &event {
            XmlEvent::StartElement(start) => {
                if self.is_security_header(&start.name) {
                    self.security_depth = Some(self.path.len());
                }
                self.path.push(start.name.clone());
                self.scopes.push(start.namespaces.clone());
            }
            XmlEvent::EndElement(_) => {
                self.path.pop();
                self.scopes.pop();
                if self.security_depth == Some(self.path.len()) {
                    self.security_depth = None;
                }
            }
            _ => {}
        }
        ctx.emit(event);
        Ok(())
    }

    fn finish(&mut self, _ctx: &mut ProcessorContext<'_>) -> Result<()> {
        match &self.buffer {
            Some(buffer) => {
                let name = buffer
                    .events
                    .first()
                    .and_then(XmlEvent::as_start)
                    .map(|s| s.name.local_name.clone())
                    .unwrap_or_else(|| "Security".to_string());
                Err(Error::structural(
                    &name,
                    "stream ended inside a security header element",
                ))
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ProcessorChain;
    use crate::config::SecurityProperties;
    use crate::context::SecurityContext;
    use crate::error::ErrorKind;
    use crate::streaming::{VecEventSource, read_events};

    const HEADER: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"
        xmlns:wsse="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd">
        <s:Header><wsse:Security><wsse:Unknown><wsse:Inner>x</wsse:Inner></wsse:Unknown></wsse:Security></s:Header>
        <s:Body><wsse:Unknown/></s:Body></s:Envelope>"#;

    fn run(xml: &str, table: HeaderHandlerTable, max: usize) -> Result<Vec<XmlEvent>> {
        let events = read_events(xml.as_bytes())?;
        let mut chain = ProcessorChain::new(
            VecEventSource::new(events),
            SecurityContext::new(Arc::new(SecurityProperties::new())),
        )
        .with_processor(Box::new(SecurityHeaderProcessor::new(Arc::new(table), max)));
        let mut out = Vec::new();
        while let Some(event) = chain.process_next_event()? {
            out.push(event);
        }
        Ok(out)
    }

    fn fail_handler(element: HeaderElement<'_>, _ctx: &mut ProcessorContext<'_>) -> Result<()> {
        Err(Error::structural(
            "Unknown",
            format!(
                "{} events under {} scopes",
                element.events.len(),
                element.ancestor_scopes.len()
            ),
        ))
    }

    #[test]
    fn test_unknown_children_pass_through_unchanged() {
        let out = run(HEADER, HeaderHandlerTable::default(), 100).unwrap();
        assert_eq!(out, read_events(HEADER.as_bytes()).unwrap());
    }

    #[test]
    fn test_handler_receives_complete_subtree() {
        let table = HeaderHandlerTable::empty().with_handler(HeaderHandler {
            namespace: WSSE_NS,
            local_name: "Unknown",
            handle: fail_handler,
        });
        // Only the header child is dispatched, not the one in the body
        let err = run(HEADER, table, 100).unwrap_err();
        assert!(err.to_string().contains("5 events under 3 scopes"));
    }

    #[test]
    fn test_pending_buffer_bound() {
        let err = run(HEADER, HeaderHandlerTable::default(), 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralParse);
        assert!(err.to_string().contains("pending buffer bound"));
    }

    #[test]
    fn test_truncated_header_child() {
        let mut events = read_events(HEADER.as_bytes()).unwrap();
        let cut = events
            .iter()
            .position(|e| matches!(e, XmlEvent::Characters(t) if t == "x"))
            .unwrap();
        events.truncate(cut + 1);

        let mut chain = ProcessorChain::new(
            VecEventSource::new(events),
            SecurityContext::new(Arc::new(SecurityProperties::new())),
        )
        .with_processor(Box::new(SecurityHeaderProcessor::new(
            Arc::new(HeaderHandlerTable::default()),
            100,
        )));
        let mut result = Ok(None);
        for _ in 0..100 {
            result = chain.process_next_event();
            if !matches!(result, Ok(Some(_))) {
                break;
            }
        }
        let err = result.unwrap_err();
        assert!(err.to_string().contains("stream ended inside"));
    }

    #[test]
    fn test_table_replaces_by_name() {
        let mut table = HeaderHandlerTable::default();
        let before = table.len();
        table.register(HeaderHandler {
            namespace: XENC_NS,
            local_name: "EncryptedKey",
            handle: fail_handler,
        });
        assert_eq!(table.len(), before);
    }
}
