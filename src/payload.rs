//! Request bodies as an explicit tagged union.

use crate::config::DataFormat;
use crate::xml::Element;
use crate::Error;

/// A request body, discriminated by representation up front rather than by
/// inspecting the value when the request goes out.
#[derive(Clone, Debug)]
pub enum Payload {
    /// A JSON value, sent with `content-type: application/json`.
    Json(serde_json::Value),
    /// An XML tree, sent with `content-type: application/xml`.
    Xml(Element),
    /// A pre-serialized body sent verbatim. Its content type follows the
    /// connection's preferred format, or an explicit `format` override.
    Text(String),
}

impl Payload {
    /// Content type implied by the payload itself, when it has one.
    pub(crate) fn implied_format(&self) -> Option<DataFormat> {
        match self {
            Payload::Json(_) => Some(DataFormat::Json),
            Payload::Xml(_) => Some(DataFormat::Xml),
            Payload::Text(_) => None,
        }
    }

    /// Serializes the body for the resolved content type. A mismatched
    /// combination (only reachable through an explicit `format` override) is
    /// an argument error, raised before anything is sent.
    pub(crate) fn serialize(&self, format: DataFormat) -> Result<String, Error> {
        match (self, format) {
            (Payload::Text(text), _) => Ok(text.clone()),
            (Payload::Json(value), DataFormat::Json) => Ok(serde_json::to_string(value)?),
            (Payload::Xml(element), DataFormat::Xml) => element.to_xml(),
            (Payload::Json(_), DataFormat::Xml) => Err(Error::InvalidArgument(
                "an XML request body must be pre-serialized text or an element tree".to_string(),
            )),
            (Payload::Xml(_), DataFormat::Json) => Err(Error::InvalidArgument(
                "a JSON request body must be pre-serialized text or a JSON value".to_string(),
            )),
        }
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Element> for Payload {
    fn from(element: Element) -> Self {
        Payload::Xml(element)
    }
}
