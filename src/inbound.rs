//! Inbound pipeline front end

use crate::chain::ProcessorChain;
use crate::config::SecurityProperties;
use crate::context::SecurityContext;
use crate::error::Result;
use crate::event::XmlEvent;
use crate::header::{HeaderHandlerTable, SecurityHeaderProcessor};
use crate::streaming::{EventSource, XmlEventReader};
use crate::writer::EventWriter;
use std::sync::Arc;
use tracing::debug;

/// Factory for per-message inbound pipelines
///
/// Holds only read-only configuration, so one instance can serve many
/// messages, also from several threads.
///
/// # Example
///
/// ```
/// use wssec_stream::{InboundSecurity, SecurityProperties};
///
/// # fn main() -> wssec_stream::Result<()> {
/// let inbound = InboundSecurity::new(SecurityProperties::new());
/// let xml = inbound.decrypt_document(b"<Envelope><Body>plain</Body></Envelope>")?;
/// assert_eq!(xml, b"<Envelope><Body>plain</Body></Envelope>");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InboundSecurity {
    properties: Arc<SecurityProperties>,
    handlers: Arc<HeaderHandlerTable>,
}

impl InboundSecurity {
    /// Pipeline factory with the default header handlers
    pub fn new(properties: SecurityProperties) -> Self {
        Self::from_shared(Arc::new(properties))
    }

    /// Pipeline factory over shared configuration
    pub fn from_shared(properties: Arc<SecurityProperties>) -> Self {
        Self {
            properties,
            handlers: Arc::new(HeaderHandlerTable::default()),
        }
    }

    /// Use a custom header handler table
    pub fn with_handler_table(mut self, handlers: HeaderHandlerTable) -> Self {
        self.handlers = Arc::new(handlers);
        self
    }

    /// Configuration
    pub fn properties(&self) -> &Arc<SecurityProperties> {
        &self.properties
    }

    /// Start processing one message
    pub fn process<S: EventSource>(&self, source: S) -> InboundStream<S> {
        let header = SecurityHeaderProcessor::new(
            Arc::clone(&self.handlers),
            self.properties.max_pending_events(),
        );
        let chain = ProcessorChain::new(source, SecurityContext::new(Arc::clone(&self.properties)))
            .with_processor(Box::new(header));
        InboundStream { chain, done: false }
    }

    /// Start processing one message held in memory
    pub fn process_bytes<'a>(&self, bytes: &'a [u8]) -> InboundStream<XmlEventReader<&'a [u8]>> {
        self.process(XmlEventReader::from_bytes(bytes))
    }

    /// Process a whole message and serialize the result
    pub fn decrypt_document(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut stream = self.process_bytes(bytes);
        let mut writer = EventWriter::new(Vec::with_capacity(bytes.len()));
        for event in stream.by_ref() {
            writer.write(&event?)?;
        }
        debug!(
            security_events = stream.security_context().events().len(),
            "message processed"
        );
        Ok(writer.into_inner())
    }
}

/// Processed events of one message
///
/// Yields `Err` at most once; the stream ends after an error. Once the
/// stream is exhausted every processor has been finished, so dangling
/// references have been reported and the security context is complete.
pub struct InboundStream<S> {
    chain: ProcessorChain<S>,
    done: bool,
}

impl<S: EventSource> InboundStream<S> {
    /// Per-message security state (registry and event log)
    pub fn security_context(&self) -> &SecurityContext {
        self.chain.security_context()
    }

    /// Consume the stream, keeping the security state
    pub fn into_security_context(self) -> SecurityContext {
        self.chain.into_security_context()
    }

    /// Drain the stream into a vector
    pub fn collect_events(&mut self) -> Result<Vec<XmlEvent>> {
        self.by_ref().collect()
    }

    /// Processor names in chain order
    pub fn processor_names(&self) -> Vec<&str> {
        self.chain.processor_names()
    }
}

impl<S: EventSource> Iterator for InboundStream<S> {
    type Item = Result<XmlEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.chain.process_next_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
