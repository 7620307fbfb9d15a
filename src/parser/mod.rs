//! Parsing of buffered security header substructures
//!
//! Header handlers receive the complete event subtree of one substructure.
//! [`XmlElement::from_events`] folds it into a small element tree, and the
//! functions in the submodules read the model types out of that tree.

mod encryption;
mod key_info;

pub use encryption::{parse_encrypted_data, parse_encrypted_key, parse_reference_list};
pub use key_info::{
    parse_binary_security_token, parse_key_info, parse_key_value, parse_rsa_key_value,
};

use crate::constants::{WSU_NS, XML_NS};
use crate::error::{Error, Result};
use crate::event::{Attribute, QName, XmlEvent};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Element tree of one buffered substructure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Element name
    pub name: QName,
    /// Attributes
    pub attributes: Vec<Attribute>,
    /// Child elements in document order
    pub children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    fn new(name: QName, attributes: Vec<Attribute>) -> Self {
        Self {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        }
    }

    /// Build the tree from a complete event subtree
    ///
    /// Fails with a structural error if the events are truncated, unbalanced
    /// or hold more than one root element.
    pub fn from_events(events: &[XmlEvent]) -> Result<Self> {
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        for event in events {
            match event {
                XmlEvent::StartElement(start) => {
                    if let Some(done) = &root {
                        return Err(Error::structural(
                            &done.name.local_name,
                            "unexpected content after the element end",
                        ));
                    }
                    stack.push(XmlElement::new(start.name.clone(), start.attributes.clone()));
                }
                XmlEvent::EndElement(name) => {
                    let element = stack.pop().ok_or_else(|| {
                        Error::structural(&name.local_name, "end tag without matching start")
                    })?;
                    if element.name.namespace != name.namespace
                        || element.name.local_name != name.local_name
                    {
                        return Err(Error::structural(
                            &element.name.local_name,
                            format!("closed by mismatched end tag </{}>", name),
                        ));
                    }
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }
                XmlEvent::Characters(text) => match stack.last_mut() {
                    Some(current) => current.text.push_str(text),
                    None if event.is_whitespace() => {}
                    None => {
                        return Err(Error::structural(
                            "(document)",
                            "character data outside the substructure",
                        ));
                    }
                },
                XmlEvent::Comment(_) | XmlEvent::ProcessingInstruction(_) => {}
            }
        }

        if let Some(open) = stack.first() {
            return Err(Error::structural(
                &open.name.local_name,
                "substructure truncated before its end tag",
            ));
        }
        root.ok_or_else(|| Error::structural("(document)", "no element in substructure"))
    }

    /// First child with the given name
    pub fn child(&self, namespace: &str, local_name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name.is(namespace, local_name))
    }

    /// First child with the given name, or a structural error
    pub fn required_child(&self, namespace: &str, local_name: &str) -> Result<&XmlElement> {
        self.child(namespace, local_name)
            .ok_or_else(|| Error::missing_child(&self.name.local_name, local_name))
    }

    /// All children with the given name
    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children
            .iter()
            .filter(move |c| c.name.is(namespace, local_name))
    }

    /// Unqualified attribute value
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.namespace.is_none() && a.name.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Unqualified attribute value, or a structural error
    pub fn required_attribute(&self, local_name: &str) -> Result<&str> {
        self.attribute(local_name).ok_or_else(|| {
            Error::structural(
                &self.name.local_name,
                format!("missing required attribute '{}'", local_name),
            )
        })
    }

    /// Identifier (`wsu:Id`, `Id` or `xml:id`)
    pub fn id(&self) -> Option<&str> {
        let qualified = |ns: &str, local: &str| {
            self.attributes
                .iter()
                .find(|a| a.name.is(ns, local))
                .map(|a| a.value.as_str())
        };
        qualified(WSU_NS, "Id")
            .or_else(|| self.attribute("Id"))
            .or_else(|| qualified(XML_NS, "id"))
    }

    /// Character data directly inside this element, trimmed
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Base64-decoded character data
    pub fn base64_text(&self) -> Result<Vec<u8>> {
        decode_base64(self.text())
    }
}

/// Decode base64 ignoring embedded whitespace (line-wrapped values)
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}

/// Strip the `#` of a same-document reference
pub(crate) fn local_reference(element: &str, uri: &str) -> Result<String> {
    uri.strip_prefix('#')
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::structural(
                element,
                format!("reference '{}' is not a same-document reference", uri),
            )
        })
}
