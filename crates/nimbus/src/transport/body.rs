//! Request bodies.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

/// The body of an outgoing request.
///
/// In-memory payloads are sent with a `Content-Length`. Streams are sent
/// with chunked transfer encoding and are never buffered; because a retry
/// needs the stream again from the start, a stream body is a factory that
/// produces a fresh [`reqwest::Body`] for each attempt.
#[derive(Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Bytes(Bytes),
    Stream(StreamFactory),
}

/// Produces a fresh streaming body for every send attempt.
#[derive(Clone)]
pub struct StreamFactory(Arc<dyn Fn() -> reqwest::Body + Send + Sync>);

impl StreamFactory {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> reqwest::Body + Send + Sync + 'static,
    {
        Self(Arc::new(factory))
    }

    fn make(&self) -> reqwest::Body {
        (self.0)()
    }
}

impl RequestBody {
    /// Serialize a value as a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(RequestBody::Bytes(Bytes::from(serde_json::to_vec(value)?)))
    }

    /// A streaming body built by `factory` on each attempt.
    ///
    /// ```
    /// use nimbus::RequestBody;
    ///
    /// let body = RequestBody::stream(|| reqwest::Body::from("chunk"));
    /// assert!(body.is_stream());
    /// ```
    pub fn stream<F>(factory: F) -> Self
    where
        F: Fn() -> reqwest::Body + Send + Sync + 'static,
    {
        RequestBody::Stream(StreamFactory::new(factory))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Bytes(bytes) => bytes.is_empty(),
            RequestBody::Stream(_) => false,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, RequestBody::Stream(_))
    }

    pub(crate) fn to_reqwest(&self) -> Option<reqwest::Body> {
        match self {
            RequestBody::Empty => None,
            RequestBody::Bytes(bytes) => Some(reqwest::Body::from(bytes.clone())),
            RequestBody::Stream(factory) => Some(factory.make()),
        }
    }

    /// Text for wire tracing. Streams are not read.
    pub(crate) fn describe(&self) -> Cow<'_, str> {
        match self {
            RequestBody::Empty => Cow::Borrowed(""),
            RequestBody::Bytes(bytes) => String::from_utf8_lossy(bytes),
            RequestBody::Stream(_) => Cow::Borrowed("<stream>"),
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            RequestBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Bytes(Bytes::from(text))
    }
}

impl From<&'static str> for RequestBody {
    fn from(text: &'static str) -> Self {
        RequestBody::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_body_serializes() {
        let body = RequestBody::json(&json!({"server": {"name": "web1"}})).unwrap();
        assert_eq!(body.describe(), r#"{"server":{"name":"web1"}}"#);
        assert!(!body.is_empty());
    }

    #[test]
    fn stream_body_is_not_read_for_tracing() {
        let body = RequestBody::stream(|| reqwest::Body::from("payload"));
        assert_eq!(body.describe(), "<stream>");
        assert!(body.to_reqwest().is_some());
        assert!(body.to_reqwest().is_some());
    }

    #[test]
    fn empty_body_has_no_payload() {
        assert!(RequestBody::Empty.to_reqwest().is_none());
        assert!(RequestBody::from("").is_empty());
    }
}
