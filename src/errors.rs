//! Error types returned by this crate.

/// Errors that can occur when talking to the Alma APIs.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid configuration or request input, caught before any request is
    /// sent.
    #[error("{0}")]
    InvalidArgument(String),

    /// The service rejected the request with a 4xx/5xx status. Carries the
    /// remote error code and message where the reply included them, plus the
    /// status and final URL for diagnostics.
    #[error("{message} (status {status})")]
    Api {
        message: String,
        status: u16,
        url: String,
    },

    /// Transport-level failure in the underlying HTTP client.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A body declared as JSON could not be parsed.
    #[error("invalid JSON in response: {0}")]
    Json(#[from] serde_json::Error),

    /// A body declared as XML could not be parsed, or an XML payload could
    /// not be rendered.
    #[error("invalid XML: {0}")]
    Xml(String),

    /// A decoded reply was missing a field the operation relies on.
    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}
