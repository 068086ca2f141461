//! Session and per-request options.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use crate::error::ConfigError;
use crate::transport::{RequestBody, TransportOptions};
use crate::types::Scheme;

/// Options for a [`Session`](super::Session).
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub transport: TransportOptions,
    /// Give up after this many consecutive 401-triggered re-authentications
    /// of one request. `None` keeps retrying for as long as authentication
    /// itself succeeds.
    pub max_reauth_attempts: Option<u32>,
}

/// Per-request overrides for [`Session::request`](super::Session::request).
///
/// Anything left unset falls back to the negotiated service endpoint.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub scheme: Option<Scheme>,
    /// Extra headers. They may replace the default `Content-Type` but never
    /// the auth, keep-alive, user-agent or accept headers.
    pub headers: HeaderMap,
    pub body: RequestBody,
    /// Reconnect allowance for transport failures of this request.
    pub max_reconnects: Option<u32>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a header from strings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name or value is not valid HTTP.
    pub fn try_header(self, name: &str, value: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidHeader {
            name: name.to_string(),
        };
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        Ok(self.header(name, value))
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `value` as the JSON request body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.body = RequestBody::json(value)?;
        Ok(self)
    }

    pub fn max_reconnects(mut self, max: u32) -> Self {
        self.max_reconnects = Some(max);
        self
    }
}
