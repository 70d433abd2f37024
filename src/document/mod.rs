//! # Source Document Module
//!
//! Parses uploaded XML documents into an in-memory element tree and exposes
//! the two read operations the mapping pipeline needs: enumerating the
//! addressable paths of a document and extracting the values found at one
//! path. Documents are parsed once, at registration; every later operation
//! works on the tree and cannot encounter a parse failure.

use crate::error::SheetFillError;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::match_xml_events;
use quick_xml::events::Event;
use thiserror::Error;

pub(crate) mod paths;
pub(crate) mod query;

/// Custom error types for source document operations.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The XML input is not a well-formed single-rooted document
    #[error("Malformed XML document: {0}")]
    MalformedDocument(String),

    /// A mapping path cannot be resolved to a valid search expression
    #[error("Cannot resolve XML path '{0}'")]
    PathResolutionError(String),
}

/// A single XML element: tag, attributes in document order, the text that
/// appears before the first child element, and child elements in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Looks up an attribute value by name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns true if the element has no child elements
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A parsed XML source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: Element,
}

impl XmlDocument {
    /// Parses a well-formed XML 1.0 document from raw bytes.
    ///
    /// Comments, processing instructions and the prolog are ignored. Text is
    /// captured per element up to its first child, mirroring how the path
    /// extractor and value extractor later interpret element text.
    pub fn parse(bytes: &[u8]) -> Result<XmlDocument, SheetFillError> {
        let mut reader = XmlReader::new(bytes);
        let mut stack = Vec::<Element>::new();
        let mut root = None::<Element>;

        match_xml_events!(reader => {
            Event::Start(event) => {
                if root.is_some() && stack.is_empty() {
                    Err(DocumentError::MalformedDocument("multiple root elements".to_owned()))?;
                }
                let tag = str::from_utf8(event.name().as_ref())?.to_owned();
                let mut attributes = Vec::new();
                for result in event.attributes() {
                    let attribute = result?;
                    let name = str::from_utf8(attribute.key.as_ref())?.to_owned();
                    attributes.push((name, attribute.get_value()?.into_owned()));
                }
                stack.push(Element {
                    tag,
                    attributes,
                    text: String::new(),
                    children: Vec::new(),
                });
            }
            Event::End(_) => {
                let element = stack.pop()
                    .ok_or_else(|| DocumentError::MalformedDocument("unexpected closing tag".to_owned()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(event) => {
                if let Some(element) = stack.last_mut() {
                    if element.children.is_empty() {
                        element.text.push_bytes_text(&event)?;
                    }
                }
            }
            Event::CData(event) => {
                if let Some(element) = stack.last_mut() {
                    if element.children.is_empty() {
                        element.text.push_str(&event.xml_content()?);
                    }
                }
            }
            Event::GeneralRef(event) => {
                if let Some(element) = stack.last_mut() {
                    if element.children.is_empty() {
                        element.text.push_bytes_ref(&event)?;
                    }
                }
            }
        });

        if !stack.is_empty() {
            Err(DocumentError::MalformedDocument("unexpected end of document".to_owned()))?;
        }
        let root = root
            .ok_or_else(|| DocumentError::MalformedDocument("missing root element".to_owned()))?;
        Ok(XmlDocument { root })
    }

    /// Returns the root element of the document
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Returns the sorted set of addressable paths in this document:
    /// leaf element text paths and attribute paths (see [`paths`]).
    pub fn paths(&self) -> Vec<String> {
        paths::collect(&self.root)
    }
}
