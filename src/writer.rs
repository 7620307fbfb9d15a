//! Event serialization
//!
//! Turns parse events back into markup. Used to re-serialize a processed
//! (decrypted) message and to build the plaintext wrapper that decrypted
//! content is re-parsed in.

use crate::error::{Error, Result};
use crate::event::{StartElement, XmlEvent};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesPI, BytesStart, BytesText, Event};
use std::io::Write as IoWrite;

/// Streaming writer for [`XmlEvent`]s
pub struct EventWriter<W: IoWrite> {
    writer: Writer<W>,
}

impl<W: IoWrite> EventWriter<W> {
    /// Create a writer over any output
    pub fn new(inner: W) -> Self {
        Self {
            writer: Writer::new(inner),
        }
    }

    /// Write one event
    pub fn write(&mut self, event: &XmlEvent) -> Result<()> {
        match event {
            XmlEvent::StartElement(start) => {
                let qualified = start.name.qualified();
                let mut elem = BytesStart::new(qualified.as_str());
                push_namespaces_and_attributes(&mut elem, start);
                self.writer
                    .write_event(Event::Start(elem))
                    .map_err(|e| Error::xml_write(format!("Failed to write <{}>: {}", qualified, e)))
            }
            XmlEvent::EndElement(name) => {
                let qualified = name.qualified();
                self.writer
                    .write_event(Event::End(BytesEnd::new(qualified.as_str())))
                    .map_err(|e| Error::xml_write(format!("Failed to close <{}>: {}", qualified, e)))
            }
            XmlEvent::Characters(text) => self
                .writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| Error::xml_write(format!("Failed to write text: {}", e))),
            XmlEvent::Comment(text) => self
                .writer
                .write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
                .map_err(|e| Error::xml_write(format!("Failed to write comment: {}", e))),
            XmlEvent::ProcessingInstruction(content) => self
                .writer
                .write_event(Event::PI(BytesPI::new(content.as_str())))
                .map_err(|e| Error::xml_write(format!("Failed to write processing instruction: {}", e))),
        }
    }

    /// Recover the underlying output
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

fn push_namespaces_and_attributes(elem: &mut BytesStart<'_>, start: &StartElement) {
    for ns in &start.namespaces {
        let key = match &ns.prefix {
            Some(prefix) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        };
        elem.push_attribute((key.as_str(), ns.uri.as_str()));
    }
    for attr in &start.attributes {
        let key = attr.name.qualified();
        elem.push_attribute((key.as_str(), attr.value.as_str()));
    }
}

/// Serialize a sequence of events into markup bytes
pub fn write_events(events: &[XmlEvent]) -> Result<Vec<u8>> {
    let mut writer = EventWriter::new(Vec::new());
    for event in events {
        writer.write(event)?;
    }
    Ok(writer.into_inner())
}
