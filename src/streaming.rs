//! Raw event sources for the processor chain
//!
//! This module turns bytes into a lazy, forward-only sequence of
//! [`XmlEvent`]s without loading the whole document into a tree. Look-ahead
//! is never done by re-reading: a consumer that needs more context must hold
//! on to the events it has already been given.
//!
//! # Example
//!
//! ```
//! use wssec_stream::streaming::{EventSource, XmlEventReader};
//!
//! # fn main() -> wssec_stream::Result<()> {
//! let mut reader = XmlEventReader::from_bytes(b"<a xmlns='urn:x'><b/></a>");
//! let mut count = 0;
//! while let Some(_event) = reader.next_event()? {
//!     count += 1;
//! }
//! assert_eq!(count, 4);
//! # Ok(())
//! # }
//! ```

use crate::constants::XML_NS;
use crate::error::{Error, Result};
use crate::event::{Attribute, Namespace, QName, StartElement, XmlEvent};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::VecDeque;
use std::io::BufRead;

/// Default buffer capacity for XML parsing (4KB)
const XML_BUFFER_CAPACITY: usize = 4096;

/// A lazy, finite, forward-only producer of parse events
pub trait EventSource {
    /// Produce the next event, or `None` at end of stream
    fn next_event(&mut self) -> Result<Option<XmlEvent>>;
}

/// Event source over markup bytes backed by `quick-xml`
///
/// Prefixes are resolved against the namespace declarations in scope, empty
/// elements are expanded into a start and an end event, and adjacent text,
/// CDATA and entity references are coalesced into one character event.
pub struct XmlEventReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    scopes: Vec<Vec<Namespace>>,
    queued: VecDeque<XmlEvent>,
    text: String,
    done: bool,
}

impl<'a> XmlEventReader<&'a [u8]> {
    /// Create a reader over an in-memory document
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

impl<R: BufRead> XmlEventReader<R> {
    /// Create a reader over any buffered input
    pub fn new(reader: R) -> Self {
        Self {
            reader: Reader::from_reader(reader),
            buf: Vec::with_capacity(XML_BUFFER_CAPACITY),
            scopes: Vec::new(),
            queued: VecDeque::new(),
            text: String::new(),
            done: false,
        }
    }

    fn read_next(&mut self) -> Result<Option<XmlEvent>> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Ok(Some(event));
            }
            if self.done {
                return Ok(None);
            }

            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Text(e) => {
                    let text = e.decode().map_err(|e| Error::structural("#text", e.to_string()))?;
                    // Whitespace outside the document element carries nothing
                    if !self.scopes.is_empty() || !text.trim().is_empty() {
                        self.text.push_str(&text);
                    }
                }
                Event::CData(e) => {
                    self.text.push_str(&String::from_utf8_lossy(&e));
                }
                Event::GeneralRef(e) => {
                    let name = e
                        .decode()
                        .map_err(|e| Error::structural("#entity", e.to_string()))?;
                    self.text.push(resolve_entity(&name)?);
                }
                Event::Start(e) => {
                    let start = start_element(&mut self.scopes, &e)?;
                    flush_text(&mut self.text, &mut self.queued);
                    self.queued.push_back(XmlEvent::StartElement(start));
                }
                Event::Empty(e) => {
                    let start = start_element(&mut self.scopes, &e)?;
                    let end = start.name.clone();
                    self.scopes.pop();
                    flush_text(&mut self.text, &mut self.queued);
                    self.queued.push_back(XmlEvent::StartElement(start));
                    self.queued.push_back(XmlEvent::EndElement(end));
                }
                Event::End(e) => {
                    let raw = std::str::from_utf8(e.name().as_ref())
                        .map_err(|e| Error::structural("#end", e.to_string()))?
                        .to_string();
                    let name = resolve_name(&self.scopes, &raw, true)?;
                    self.scopes.pop();
                    flush_text(&mut self.text, &mut self.queued);
                    self.queued.push_back(XmlEvent::EndElement(name));
                }
                Event::Comment(e) => {
                    flush_text(&mut self.text, &mut self.queued);
                    self.queued
                        .push_back(XmlEvent::Comment(String::from_utf8_lossy(&e).into_owned()));
                }
                Event::PI(e) => {
                    flush_text(&mut self.text, &mut self.queued);
                    self.queued.push_back(XmlEvent::ProcessingInstruction(
                        String::from_utf8_lossy(&e).into_owned(),
                    ));
                }
                Event::Eof => {
                    self.done = true;
                    if !self.scopes.is_empty() {
                        return Err(Error::structural(
                            "document",
                            format!("stream ended with {} unclosed element(s)", self.scopes.len()),
                        ));
                    }
                    flush_text(&mut self.text, &mut self.queued);
                }
                // Declarations and doctypes are not part of the event model
                _ => {}
            }
        }
    }
}

impl<R: BufRead> EventSource for XmlEventReader<R> {
    fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        match self.read_next() {
            Ok(event) => Ok(event),
            Err(e) => {
                self.done = true;
                self.queued.clear();
                Err(e)
            }
        }
    }
}

/// Event source over events that are already in memory
#[derive(Debug, Clone, Default)]
pub struct VecEventSource {
    events: VecDeque<XmlEvent>,
}

impl VecEventSource {
    /// Create a source yielding `events` in order
    pub fn new(events: Vec<XmlEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }
}

impl From<Vec<XmlEvent>> for VecEventSource {
    fn from(events: Vec<XmlEvent>) -> Self {
        Self::new(events)
    }
}

impl EventSource for VecEventSource {
    fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        Ok(self.events.pop_front())
    }
}

/// Read a complete document into events
pub fn read_events(bytes: &[u8]) -> Result<Vec<XmlEvent>> {
    let mut reader = XmlEventReader::from_bytes(bytes);
    let mut events = Vec::new();
    while let Some(event) = reader.next_event()? {
        events.push(event);
    }
    Ok(events)
}

fn flush_text(text: &mut String, queued: &mut VecDeque<XmlEvent>) {
    if !text.is_empty() {
        queued.push_back(XmlEvent::Characters(std::mem::take(text)));
    }
}

fn start_element(scopes: &mut Vec<Vec<Namespace>>, e: &BytesStart<'_>) -> Result<StartElement> {
    let raw_name = std::str::from_utf8(e.name().as_ref())
        .map_err(|e| Error::structural("#start", e.to_string()))?
        .to_string();

    let mut namespaces = Vec::new();
    let mut raw_attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::XmlAttr(e.to_string()))?
            .to_string();
        let raw_value =
            std::str::from_utf8(&attr.value).map_err(|e| Error::XmlAttr(e.to_string()))?;
        let value = quick_xml::escape::unescape(raw_value)
            .map_err(|e| Error::XmlAttr(format!("Invalid value for '{}': {}", key, e)))?
            .into_owned();

        if key == "xmlns" {
            namespaces.push(Namespace {
                prefix: None,
                uri: value,
            });
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            namespaces.push(Namespace {
                prefix: Some(prefix.to_string()),
                uri: value,
            });
        } else {
            raw_attributes.push((key, value));
        }
    }

    scopes.push(namespaces.clone());

    let name = resolve_name(scopes, &raw_name, true)?;
    let mut attributes = Vec::with_capacity(raw_attributes.len());
    for (key, value) in raw_attributes {
        attributes.push(Attribute {
            name: resolve_name(scopes, &key, false)?,
            value,
        });
    }

    Ok(StartElement {
        name,
        attributes,
        namespaces,
    })
}

/// Resolve a raw `prefix:local` name against the namespaces in scope
///
/// Unprefixed attributes are in no namespace; unprefixed elements take the
/// default namespace.
fn resolve_name(scopes: &[Vec<Namespace>], raw: &str, is_element: bool) -> Result<QName> {
    let (prefix, local_name) = match raw.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, raw),
    };

    let namespace = match prefix {
        None if !is_element => None,
        Some("xml") => Some(XML_NS.to_string()),
        _ => lookup_namespace(scopes, prefix),
    };

    if let (Some(prefix), None) = (prefix, &namespace) {
        return Err(Error::structural(
            raw,
            format!("namespace prefix '{}' is not declared", prefix),
        ));
    }

    Ok(QName {
        namespace,
        local_name: local_name.to_string(),
        prefix: prefix.map(str::to_string),
    })
}

fn lookup_namespace(scopes: &[Vec<Namespace>], prefix: Option<&str>) -> Option<String> {
    scopes
        .iter()
        .rev()
        .flat_map(|scope| scope.iter().rev())
        .find(|ns| ns.prefix.as_deref() == prefix)
        .and_then(|ns| {
            if ns.uri.is_empty() {
                None
            } else {
                Some(ns.uri.clone())
            }
        })
}

fn resolve_entity(name: &str) -> Result<char> {
    let resolved = match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => name.strip_prefix('#').and_then(|reference| {
            let code = match reference.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => reference.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
        }),
    };

    resolved.ok_or_else(|| Error::structural("#entity", format!("undefined entity '&{};'", name)))
}
