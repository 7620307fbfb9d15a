//! Processor chain
//!
//! Every event pulled from the source passes through the processors in
//! chain order. A processor consumes the event it is given and emits zero
//! or more events for the next processor, so it can hold events back
//! (buffering) or replace them (decryption).
//!
//! Processors may insert further processors while handling an event. The
//! insertion is queued and applied once the current event has left the
//! chain, so a new processor only ever sees events that come after the one
//! that created it.
//!
//! Events travel depth first: everything a processor emits for one event
//! reaches the end of the chain before it is handed the next one. Events a
//! processor reinjects start over at the first processor, so content that
//! turns up mid-chain (decrypted plaintext) is seen by every stage
//! regardless of where its producer sits.
//!
//! Events reach the caller only after the whole pass for a source event
//! succeeded; a failing pass emits nothing and ends the chain.

use crate::config::SecurityProperties;
use crate::context::{SecurityContext, SecurityEvent};
use crate::error::Result;
use crate::event::XmlEvent;
use crate::registry::TokenRegistry;
use crate::streaming::EventSource;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

/// Where an inserted processor goes relative to the inserting one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Directly before the inserting processor
    BeforeCurrent,
    /// After the inserting processor and everything it inserted before,
    /// so successive insertions keep their order
    AfterCurrent,
}

/// One stage of the chain
pub trait Processor: Send {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Handle one event, emitting whatever should flow downstream
    fn process_event(&mut self, event: XmlEvent, ctx: &mut ProcessorContext<'_>) -> Result<()>;

    /// Called once at end of stream; may emit held events or fail
    fn finish(&mut self, _ctx: &mut ProcessorContext<'_>) -> Result<()> {
        Ok(())
    }
}

struct PendingInsertion {
    anchor: usize,
    position: Position,
    processor: Box<dyn Processor>,
}

/// What a processor may touch while handling an event
pub struct ProcessorContext<'a> {
    security: &'a mut SecurityContext,
    output: &'a mut Vec<XmlEvent>,
    reinjected: &'a mut Vec<XmlEvent>,
    insertions: &'a mut Vec<PendingInsertion>,
    current: usize,
}

impl ProcessorContext<'_> {
    /// Pass an event to the next stage
    pub fn emit(&mut self, event: XmlEvent) {
        self.output.push(event);
    }

    /// Feed events back to the start of the chain
    ///
    /// They follow whatever this call emitted and pass through every
    /// processor, the current one included.
    pub fn reinject(&mut self, events: Vec<XmlEvent>) {
        self.reinjected.extend(events);
    }

    /// Insert a processor next to the current one
    ///
    /// Takes effect from the next source event on.
    pub fn insert_processor(&mut self, processor: Box<dyn Processor>, position: Position) {
        debug!(processor = processor.name(), ?position, "processor insertion queued");
        self.insertions.push(PendingInsertion {
            anchor: self.current,
            position,
            processor,
        });
    }

    /// Per-message security state
    pub fn security(&self) -> &SecurityContext {
        self.security
    }

    /// Per-message security state, mutable
    pub fn security_mut(&mut self) -> &mut SecurityContext {
        self.security
    }

    /// Token registry of this message
    pub fn registry(&self) -> &TokenRegistry {
        self.security.registry()
    }

    /// Token registry of this message, for registration
    pub fn registry_mut(&mut self) -> &mut TokenRegistry {
        self.security.registry_mut()
    }

    /// Configuration
    pub fn properties(&self) -> &Arc<SecurityProperties> {
        self.security.properties()
    }

    /// Record a security event
    pub fn record(&mut self, event: SecurityEvent) {
        self.security.record(event);
    }
}

struct Slot {
    id: usize,
    /// Processor that inserted this one
    parent: Option<usize>,
    processor: Box<dyn Processor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainState {
    Running,
    Finished,
    Failed,
}

/// Ordered, self-extending sequence of processors over one event source
pub struct ProcessorChain<S> {
    source: S,
    slots: Vec<Slot>,
    next_id: usize,
    ready: VecDeque<XmlEvent>,
    pending: Vec<PendingInsertion>,
    security: SecurityContext,
    state: ChainState,
}

impl<S: EventSource> ProcessorChain<S> {
    /// Create a chain with no processors
    pub fn new(source: S, security: SecurityContext) -> Self {
        Self {
            source,
            slots: Vec::new(),
            next_id: 0,
            ready: VecDeque::new(),
            pending: Vec::new(),
            security,
            state: ChainState::Running,
        }
    }

    /// Append a processor (construction time only)
    pub fn with_processor(mut self, processor: Box<dyn Processor>) -> Self {
        let id = self.allocate_id();
        self.slots.push(Slot {
            id,
            parent: None,
            processor,
        });
        self
    }

    /// Names of the processors in chain order
    pub fn processor_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.processor.name()).collect()
    }

    /// Per-message security state
    pub fn security_context(&self) -> &SecurityContext {
        &self.security
    }

    /// Per-message security state, mutable
    pub fn security_context_mut(&mut self) -> &mut SecurityContext {
        &mut self.security
    }

    /// Consume the chain, keeping the security state
    pub fn into_security_context(self) -> SecurityContext {
        self.security
    }

    /// Pull the next fully processed event
    ///
    /// Returns `Ok(None)` at end of stream, after every processor has been
    /// finished, and after a failure has been reported.
    pub fn process_next_event(&mut self) -> Result<Option<XmlEvent>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Ok(Some(event));
            }
            if self.state != ChainState::Running {
                return Ok(None);
            }

            let step = match self.source.next_event() {
                Ok(Some(event)) => {
                    trace!(?event, "source event");
                    self.run_stages(0, vec![event])
                }
                Ok(None) => {
                    self.state = ChainState::Finished;
                    self.finish_stages()
                }
                Err(e) => Err(e),
            };
            if let Err(e) = step {
                self.state = ChainState::Failed;
                self.ready.clear();
                return Err(e);
            }
        }
    }

    fn allocate_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Run `batch` through the stages starting at `start`
    fn run_stages(&mut self, start: usize, batch: Vec<XmlEvent>) -> Result<()> {
        let mut out = Vec::with_capacity(batch.len());
        for event in batch {
            self.run_from(start, event, &mut out)?;
        }
        self.ready.extend(out);
        self.apply_insertions();
        Ok(())
    }

    /// Run one event through the stages from `idx` on, collecting what
    /// leaves the last one
    fn run_from(&mut self, idx: usize, event: XmlEvent, out: &mut Vec<XmlEvent>) -> Result<()> {
        if idx >= self.slots.len() {
            out.push(event);
            return Ok(());
        }
        let mut emitted = Vec::new();
        let mut reinjected = Vec::new();
        let slot = &mut self.slots[idx];
        let mut ctx = ProcessorContext {
            security: &mut self.security,
            output: &mut emitted,
            reinjected: &mut reinjected,
            insertions: &mut self.pending,
            current: slot.id,
        };
        slot.processor.process_event(event, &mut ctx)?;
        self.forward(idx, emitted, reinjected, out)
    }

    fn forward(
        &mut self,
        idx: usize,
        emitted: Vec<XmlEvent>,
        reinjected: Vec<XmlEvent>,
        out: &mut Vec<XmlEvent>,
    ) -> Result<()> {
        for event in emitted {
            self.run_from(idx + 1, event, out)?;
        }
        if !reinjected.is_empty() {
            trace!(events = reinjected.len(), "events reinjected");
            for event in reinjected {
                self.run_from(0, event, out)?;
            }
        }
        Ok(())
    }

    /// Finish every processor in order, feeding what each emits downstream
    fn finish_stages(&mut self) -> Result<()> {
        let mut idx = 0;
        while idx < self.slots.len() {
            let mut emitted = Vec::new();
            let mut reinjected = Vec::new();
            let slot = &mut self.slots[idx];
            let mut ctx = ProcessorContext {
                security: &mut self.security,
                output: &mut emitted,
                reinjected: &mut reinjected,
                insertions: &mut self.pending,
                current: slot.id,
            };
            slot.processor.finish(&mut ctx)?;
            trace!(
                processor = slot.processor.name(),
                emitted = emitted.len(),
                "processor finished"
            );
            let mut out = Vec::new();
            self.forward(idx, emitted, reinjected, &mut out)?;
            self.ready.extend(out);
            self.apply_insertions();
            idx += 1;
        }
        Ok(())
    }

    fn apply_insertions(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        for insertion in std::mem::take(&mut self.pending) {
            let Some(anchor_idx) = self.slots.iter().position(|s| s.id == insertion.anchor)
            else {
                continue;
            };
            let at = match insertion.position {
                Position::BeforeCurrent => anchor_idx,
                Position::AfterCurrent => {
                    let mut at = anchor_idx + 1;
                    while at < self.slots.len() && self.descends_from(at, insertion.anchor) {
                        at += 1;
                    }
                    at
                }
            };
            let id = self.allocate_id();
            debug!(processor = insertion.processor.name(), index = at, "processor inserted");
            self.slots.insert(
                at,
                Slot {
                    id,
                    parent: Some(insertion.anchor),
                    processor: insertion.processor,
                },
            );
        }
    }

    /// Whether the processor at `idx` was inserted by `ancestor`, directly
    /// or through processors it inserted
    fn descends_from(&self, idx: usize, ancestor: usize) -> bool {
        let mut parent = self.slots[idx].parent;
        while let Some(id) = parent {
            if id == ancestor {
                return true;
            }
            parent = self.slots.iter().find(|s| s.id == id).and_then(|s| s.parent);
        }
        false
    }
}
