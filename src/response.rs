//! Response normalization: content-type negotiation and error extraction
//! across the service's two error envelope shapes.

use serde::Deserialize;
use serde_json::Value;

use crate::xml::Element;
use crate::Error;

/// Owned snapshot of a transport reply, available before (or instead of)
/// decoding.
#[derive(Clone, Debug)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Final request URL, for diagnostics.
    pub url: String,
    /// Declared `content-type` header, verbatim.
    pub content_type: Option<String>,
    /// Body text.
    pub body: String,
}

/// A decoded response body.
#[derive(Clone, Debug)]
pub enum Content {
    /// An `application/json` body.
    Json(Value),
    /// An `application/xml` body.
    Xml(Element),
    /// Anything else, passed through untouched.
    Other(RawResponse),
}

impl Content {
    /// Total record count of a paged response: the JSON `total_record_count`
    /// field, or the XML root attribute of the same name.
    pub fn total_record_count(&self) -> Option<i64> {
        match self {
            Content::Json(value) => match value.get("total_record_count")? {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            },
            Content::Xml(root) => root.attr("total_record_count")?.parse().ok(),
            Content::Other(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Content::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_xml(&self) -> Option<&Element> {
        match self {
            Content::Xml(root) => Some(root),
            _ => None,
        }
    }
}

/// Error envelope nested under a `web_service_result` wrapper.
#[derive(Debug, Deserialize)]
struct NestedErrorEnvelope {
    web_service_result: ErrorEnvelope,
}

/// Error envelope with the list at the top level.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(rename = "errorList")]
    error_list: RemoteErrorList,
}

#[derive(Debug, Deserialize)]
struct RemoteErrorList {
    #[serde(default)]
    error: Vec<RemoteError>,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    #[serde(rename = "errorCode")]
    code: Option<String>,
    #[serde(rename = "errorMessage")]
    message: Option<String>,
    #[serde(rename = "trackingID")]
    tracking_id: Option<String>,
}

const DOC_HINT: &str = " See Alma documentation for more information.";

/// Decodes a reply according to its declared content type, turning 4xx/5xx
/// statuses into [`Error::Api`] with the first remote error extracted.
///
/// A reply without a `content-type` header is always an error, whatever the
/// status: the service labels every body it produces.
pub(crate) fn normalize(raw: RawResponse, xml_ns: &str) -> Result<Content, Error> {
    let failed = matches!(raw.status / 100, 4 | 5);
    let media = raw
        .content_type
        .as_deref()
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_string());

    match media.as_deref() {
        None => Err(api_error(generic_message(&raw), &raw)),
        Some("application/json") => match serde_json::from_str::<Value>(&raw.body) {
            Ok(value) if failed => {
                let message = json_error_message(&value).unwrap_or_else(|| generic_message(&raw));
                Err(api_error(message, &raw))
            }
            Ok(value) => Ok(Content::Json(value)),
            Err(_) if failed => Err(api_error(generic_message(&raw), &raw)),
            Err(err) => Err(Error::Json(err)),
        },
        Some("application/xml") => match Element::parse(&raw.body) {
            Ok(root) if failed => {
                let message =
                    xml_error_message(&root, xml_ns).unwrap_or_else(|| generic_message(&raw));
                Err(api_error(message, &raw))
            }
            Ok(root) => Ok(Content::Xml(root)),
            Err(_) if failed => Err(api_error(generic_message(&raw), &raw)),
            Err(err) => Err(err),
        },
        Some(_) if failed => Err(api_error(generic_message(&raw), &raw)),
        Some(_) => Ok(Content::Other(raw)),
    }
}

fn api_error(message: String, raw: &RawResponse) -> Error {
    tracing::error!("Request to {} failed with status {}: {}", raw.url, raw.status, message);
    Error::Api {
        message,
        status: raw.status,
        url: raw.url.clone(),
    }
}

fn generic_message(raw: &RawResponse) -> String {
    format!("Error {} - {}", raw.status, truncate_body(&raw.body))
}

/// First error of either JSON envelope shape, the nested one attempted
/// first. Returns `None` when neither shape fits, or the entry is missing
/// its code or message.
fn json_error_message(value: &Value) -> Option<String> {
    let envelope = serde_json::from_value::<NestedErrorEnvelope>(value.clone())
        .map(|nested| nested.web_service_result)
        .or_else(|_| serde_json::from_value::<ErrorEnvelope>(value.clone()))
        .ok()?;
    let first = envelope.error_list.error.into_iter().next()?;
    let mut out = format!("{} - {}", first.code?, first.message?);
    if let Some(tracking_id) = first.tracking_id {
        out.push_str(" TrackingID: ");
        out.push_str(&tracking_id);
    }
    out.push_str(DOC_HINT);
    Some(out)
}

/// First `errorList/error` entry of a namespace-qualified XML error
/// document.
fn xml_error_message(root: &Element, ns: &str) -> Option<String> {
    let first = root.child_ns(ns, "errorList")?.children.first()?;
    let code = &first.child_ns(ns, "errorCode")?.text;
    let message = &first.child_ns(ns, "errorMessage")?.text;
    Some(format!("{} - {}{}", code, message, DOC_HINT))
}

fn truncate_body(body: &str) -> String {
    const MAX_BODY_LENGTH: usize = 2000;
    if body.len() <= MAX_BODY_LENGTH {
        body.to_string()
    } else {
        let mut end = MAX_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::ERROR_NS;

    fn raw(status: u16, content_type: Option<&str>, body: &str) -> RawResponse {
        RawResponse {
            status,
            url: "https://api-na.hosted.exlibrisgroup.com/almaws/v1/users?format=json".to_string(),
            content_type: content_type.map(str::to_string),
            body: body.to_string(),
        }
    }

    fn message_of(err: Error) -> String {
        match err {
            Error::Api { message, .. } => message,
            other => panic!("expected an API error, got {other:?}"),
        }
    }

    #[test]
    fn successful_json_decodes() {
        let body = json!({"total_record_count": 2, "user": [{}, {}]}).to_string();
        let content = normalize(
            raw(200, Some("application/json;charset=UTF-8"), &body),
            ERROR_NS,
        )
        .unwrap();
        assert_eq!(content.total_record_count(), Some(2));
    }

    #[test]
    fn successful_xml_reports_the_total_from_the_root_attribute() {
        let content = normalize(
            raw(
                200,
                Some("application/xml;charset=UTF-8"),
                r#"<users total_record_count="7"><user/></users>"#,
            ),
            ERROR_NS,
        )
        .unwrap();
        assert_eq!(content.total_record_count(), Some(7));
    }

    #[test]
    fn top_level_json_error_shape_is_extracted() {
        let body = json!({
            "errorsExist": true,
            "errorList": {"error": [{
                "errorCode": "401861",
                "errorMessage": "User with identifier X was not found.",
            }]},
        })
        .to_string();
        let message = message_of(normalize(raw(400, Some("application/json"), &body), ERROR_NS).unwrap_err());
        insta::assert_snapshot!(message, @"401861 - User with identifier X was not found. See Alma documentation for more information.");
    }

    #[test]
    fn nested_json_error_shape_is_extracted() {
        let body = json!({
            "web_service_result": {
                "errorList": {"error": [{
                    "errorCode": "UNAUTHORIZED",
                    "errorMessage": "API-key not defined.",
                    "trackingID": "E01-2608131056-VOBYO-AWAE1554913111",
                }]},
            },
        })
        .to_string();
        let message = message_of(normalize(raw(401, Some("application/json"), &body), ERROR_NS).unwrap_err());
        insta::assert_snapshot!(message, @"UNAUTHORIZED - API-key not defined. TrackingID: E01-2608131056-VOBYO-AWAE1554913111 See Alma documentation for more information.");
    }

    #[test]
    fn xml_error_list_is_extracted() {
        let body = concat!(
            r#"<web_service_result xmlns="http://com/exlibris/urm/general/xmlbeans">"#,
            "<errorsExist>true</errorsExist>",
            "<errorList><error>",
            "<errorCode>401861</errorCode>",
            "<errorMessage>User with identifier X was not found.</errorMessage>",
            "</error></errorList>",
            "</web_service_result>",
        );
        let message = message_of(normalize(raw(400, Some("application/xml"), body), ERROR_NS).unwrap_err());
        insta::assert_snapshot!(message, @"401861 - User with identifier X was not found. See Alma documentation for more information.");
    }

    #[test]
    fn unrecognized_error_shape_falls_back_to_status_and_body() {
        let err = normalize(raw(500, Some("application/json"), r#"{"oops": true}"#), ERROR_NS)
            .unwrap_err();
        let message = message_of(err);
        assert_eq!(message, r#"Error 500 - {"oops": true}"#);
    }

    #[test]
    fn undecodable_error_body_falls_back_instead_of_crashing() {
        let err = normalize(
            raw(502, Some("application/json"), "<html>Bad Gateway</html>"),
            ERROR_NS,
        )
        .unwrap_err();
        assert!(message_of(err).starts_with("Error 502 - "));
    }

    #[test]
    fn undecodable_success_body_is_a_decode_error() {
        let err = normalize(raw(200, Some("application/json"), "not json"), ERROR_NS).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn missing_content_type_is_an_error_even_on_success() {
        let err = normalize(raw(200, None, ""), ERROR_NS).unwrap_err();
        match err {
            Error::Api { status, .. } => assert_eq!(status, 200),
            other => panic!("expected an API error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_content_type_passes_through_on_success() {
        let content = normalize(raw(200, Some("text/plain"), "four words of text"), ERROR_NS)
            .unwrap();
        match content {
            Content::Other(raw) => assert_eq!(raw.body, "four words of text"),
            other => panic!("expected a passthrough, got {other:?}"),
        }
    }

    #[test]
    fn unknown_content_type_still_fails_on_error_statuses() {
        let err = normalize(raw(503, Some("text/html"), "<html>down</html>"), ERROR_NS)
            .unwrap_err();
        let message = message_of(err);
        assert!(message.contains("503"));
        assert!(message.contains("down"));
    }

    #[test]
    fn long_bodies_are_truncated_in_generic_messages() {
        let body = "x".repeat(5000);
        let message = message_of(
            normalize(raw(500, Some("text/plain"), &body), ERROR_NS).unwrap_err(),
        );
        assert!(message.ends_with("...[truncated]"));
        assert!(message.len() < 2100);
    }

    #[test]
    fn string_totals_are_parsed() {
        let content = Content::Json(json!({"total_record_count": "15"}));
        assert_eq!(content.total_record_count(), Some(15));
    }
}
