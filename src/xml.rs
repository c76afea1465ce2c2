//! Minimal owned XML tree over quick-xml's event interface.
//!
//! Alma's XML bodies are small documents read for a handful of fields
//! (record counts, error lists, ids) and occasionally stitched together
//! during pagination, so an element tree is a better fit than streaming.

use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::{NsReader, Writer};

use crate::Error;

/// One XML element: local name, resolved namespace, attributes in document
/// order, direct text content, and child elements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// An element with the given local name and no namespace.
    pub fn new(name: &str) -> Self {
        Element {
            name: name.to_string(),
            ..Element::default()
        }
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// First attribute with the given name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First child with the given local name, in any namespace.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    /// First child with the given local name in the given namespace.
    pub fn child_ns(&self, ns: &str, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|child| child.name == name && child.namespace.as_deref() == Some(ns))
    }

    pub fn append(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Parses a document and returns its root element. Whitespace-only text
    /// nodes are dropped; everything else accumulates into [`Element::text`].
    pub fn parse(text: &str) -> Result<Element, Error> {
        let mut reader = NsReader::from_str(text);
        let mut stack: Vec<Element> = Vec::new();
        loop {
            match reader.read_resolved_event()? {
                (ns, Event::Start(start)) => {
                    stack.push(element_from_start(ns, &start)?);
                }
                (ns, Event::Empty(start)) => {
                    let element = element_from_start(ns, &start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                (_, Event::Text(text)) => {
                    let unescaped = text.unescape().map_err(|e| Error::Xml(e.to_string()))?;
                    if let Some(open) = stack.last_mut() {
                        if !unescaped.trim().is_empty() {
                            open.text.push_str(&unescaped);
                        }
                    }
                }
                (_, Event::CData(data)) => {
                    if let Some(open) = stack.last_mut() {
                        open.text
                            .push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                (_, Event::End(_)) => {
                    let closed = stack
                        .pop()
                        .ok_or_else(|| Error::Xml("unbalanced closing tag".to_string()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(closed),
                        None => return Ok(closed),
                    }
                }
                (_, Event::Eof) => {
                    return Err(Error::Xml(
                        "document ended before the root element closed".to_string(),
                    ));
                }
                _ => {}
            }
        }
    }

    /// Renders the element as an XML string. Namespaces are written as
    /// default `xmlns` declarations wherever they differ from the parent.
    pub fn to_xml(&self) -> Result<String, Error> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        write_element(&mut writer, self, None)?;
        Ok(String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned())
    }
}

fn element_from_start(ns: ResolveResult<'_>, start: &BytesStart<'_>) -> Result<Element, Error> {
    let mut element = Element::new(&String::from_utf8_lossy(start.local_name().as_ref()));
    if let ResolveResult::Bound(namespace) = ns {
        element.namespace = Some(String::from_utf8_lossy(namespace.as_ref()).into_owned());
    }
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::Xml(e.to_string()))?;
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &Element,
    parent_ns: Option<&str>,
) -> Result<(), Error> {
    let mut start = BytesStart::new(element.name.as_str());
    if element.namespace.as_deref() != parent_ns {
        if let Some(ns) = &element.namespace {
            start.push_attribute(("xmlns", ns.as_str()));
        }
    }
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.text.is_empty() && element.children.is_empty() {
        writer
            .write_event(Event::Empty(start))
            .map_err(|e| Error::Xml(e.to_string()))?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| Error::Xml(e.to_string()))?;
    if !element.text.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(&element.text)))
            .map_err(|e| Error::Xml(e.to_string()))?;
    }
    for child in &element.children {
        write_element(writer, child, element.namespace.as_deref())?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| Error::Xml(e.to_string()))?;
    Ok(())
}
