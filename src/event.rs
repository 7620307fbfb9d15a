//! Parse events flowing through the processor chain
//!
//! An [`XmlEvent`] is one step of document traversal. Events are immutable
//! values; each processor stage takes ownership of an event and either
//! forwards it, buffers it, or replaces it.

use crate::constants::{WSU_NS, XML_NS};
use std::fmt;

/// Namespace-resolved element or attribute name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace URI, `None` for names in no namespace
    pub namespace: Option<String>,
    /// Local part of the name
    pub local_name: String,
    /// Prefix used in the source document, kept for re-serialization
    pub prefix: Option<String>,
}

impl QName {
    /// Create a name in a namespace without a prefix
    pub fn new(namespace: Option<&str>, local_name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local_name: local_name.to_string(),
            prefix: None,
        }
    }

    /// Create a name with a prefix
    pub fn prefixed(namespace: &str, prefix: &str, local_name: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            local_name: local_name.to_string(),
            prefix: Some(prefix.to_string()),
        }
    }

    /// Check namespace and local name, ignoring the prefix
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == Some(namespace)
    }

    /// Name as written in markup (`prefix:local` or `local`)
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_name),
            None => self.local_name.clone(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => f.write_str(&self.local_name),
        }
    }
}

/// An attribute on a start element (namespace declarations excluded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name
    pub name: QName,
    /// Unescaped attribute value
    pub value: String,
}

/// A namespace declaration (`xmlns` or `xmlns:prefix`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// Declared prefix, `None` for the default namespace
    pub prefix: Option<String>,
    /// Namespace URI
    pub uri: String,
}

/// Start of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartElement {
    /// Element name
    pub name: QName,
    /// Attributes in document order
    pub attributes: Vec<Attribute>,
    /// Namespace declarations made on this element
    pub namespaces: Vec<Namespace>,
}

impl StartElement {
    /// Create a start element without attributes
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    /// Value of an unqualified attribute
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.namespace.is_none() && a.name.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Value of a namespace-qualified attribute
    pub fn attribute_ns(&self, namespace: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.is(namespace, local_name))
            .map(|a| a.value.as_str())
    }

    /// Element identifier: `wsu:Id`, `Id` or `xml:id`, in that order
    pub fn id(&self) -> Option<&str> {
        self.attribute_ns(WSU_NS, "Id")
            .or_else(|| self.attribute("Id"))
            .or_else(|| self.attribute_ns(XML_NS, "id"))
    }
}

/// One step of structured markup traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// Element start (empty elements produce a start and an end)
    StartElement(StartElement),
    /// Element end
    EndElement(QName),
    /// Unescaped character data
    Characters(String),
    /// Comment text
    Comment(String),
    /// Processing instruction content (target and data)
    ProcessingInstruction(String),
}

impl XmlEvent {
    /// Start element payload, if this is a start event
    pub fn as_start(&self) -> Option<&StartElement> {
        match self {
            XmlEvent::StartElement(start) => Some(start),
            _ => None,
        }
    }

    /// Whether this event starts an element
    pub fn is_start(&self) -> bool {
        matches!(self, XmlEvent::StartElement(_))
    }

    /// Whether this event ends an element
    pub fn is_end(&self) -> bool {
        matches!(self, XmlEvent::EndElement(_))
    }

    /// Whether this event is character data consisting only of whitespace
    pub fn is_whitespace(&self) -> bool {
        matches!(self, XmlEvent::Characters(text) if text.trim().is_empty())
    }
}
