//! Persistent per-host HTTP connections with reconnect-and-retry.
//!
//! The transport keeps one HTTP client per connection key (normally the
//! target host). A client is opened lazily, reused for every request to
//! the same key, and discarded whenever a send fails below the HTTP layer.
//! The next attempt opens a fresh one.

mod body;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::HeaderMap;
use tracing::{debug, trace, warn};

pub use body::{RequestBody, StreamFactory};

use crate::error::{ConnectionError, Error};
use crate::response::Response;
use crate::types::{Scheme, format_url};

/// Reconnect attempts allowed after the initial send of a request.
pub const MAX_RECONNECTS: u32 = 5;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Options applied to every connection the transport opens.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Route every connection through this HTTP proxy.
    pub proxy: Option<(String, u16)>,
    /// Per-request timeout; expiry counts as a transport failure.
    pub timeout: Duration,
    /// Pause between a failure and the next reconnect attempt.
    pub retry_delay: Duration,
    /// Trace every request/response pair on the `nimbus::wire` target.
    pub debug: bool,
    /// Skip TLS certificate and hostname verification.
    ///
    /// Some private clouds run self-signed endpoints; enabling this accepts
    /// them, and any impostor along with them.
    pub accept_invalid_certs: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: DEFAULT_TIMEOUT,
            retry_delay: Duration::ZERO,
            debug: false,
            accept_invalid_certs: false,
        }
    }
}

/// A request ready to be put on the wire.
#[derive(Debug, Clone)]
pub(crate) struct RawRequest {
    pub method: Method,
    pub host: String,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl RawRequest {
    pub fn new(
        method: Method,
        scheme: Scheme,
        host: &str,
        port: u16,
        path: &str,
        headers: HeaderMap,
        body: RequestBody,
    ) -> Self {
        Self {
            method,
            host: host.to_string(),
            url: format_url(scheme, host, port, path),
            headers,
            body,
        }
    }
}

/// Outcome of a single send attempt.
enum Attempt {
    Received(Response),
    Failed(reqwest::Error),
}

/// Owner of the per-host connections of one session.
#[derive(Debug)]
pub(crate) struct Transport {
    options: TransportOptions,
    connections: HashMap<String, reqwest::Client>,
}

impl Transport {
    pub fn new(options: TransportOptions) -> Self {
        Self {
            options,
            connections: HashMap::new(),
        }
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Returns true if a connection is currently held for `key`.
    pub fn is_open(&self, key: &str) -> bool {
        self.connections.contains_key(key)
    }

    /// Drop the connection held for `key`, if any.
    pub fn close(&mut self, key: &str) {
        if self.connections.remove(key).is_some() {
            trace!(key, "Closed connection");
        }
    }

    /// Send a request, reconnecting up to [`MAX_RECONNECTS`] times on
    /// transport failure.
    pub async fn send(&mut self, key: &str, request: &RawRequest) -> Result<Response, Error> {
        self.send_with_reconnects(key, request, MAX_RECONNECTS).await
    }

    /// Send a request, reconnecting at most `max_reconnects` times.
    ///
    /// Any HTTP response, whatever its status, ends the loop.
    pub async fn send_with_reconnects(
        &mut self,
        key: &str,
        request: &RawRequest,
        max_reconnects: u32,
    ) -> Result<Response, Error> {
        let mut reconnects = 0;

        loop {
            match self.attempt(key, request).await? {
                Attempt::Received(response) => return Ok(response),
                Attempt::Failed(err) => {
                    self.close(key);

                    if reconnects >= max_reconnects {
                        return Err(ConnectionError::RetriesExhausted {
                            host: request.host.clone(),
                            reconnects,
                            cause: err.to_string(),
                        }
                        .into());
                    }

                    reconnects += 1;
                    warn!(
                        host = %request.host,
                        reconnects,
                        error = %err,
                        "Transport failure, reconnecting"
                    );

                    if !self.options.retry_delay.is_zero() {
                        tokio::time::sleep(self.options.retry_delay).await;
                    }
                }
            }
        }
    }

    /// Send a request once; a transport failure is returned as
    /// [`ConnectionError::Unreachable`].
    pub async fn send_once(&mut self, key: &str, request: &RawRequest) -> Result<Response, Error> {
        match self.attempt(key, request).await? {
            Attempt::Received(response) => Ok(response),
            Attempt::Failed(err) => {
                self.close(key);
                Err(ConnectionError::Unreachable {
                    host: request.host.clone(),
                    cause: err.to_string(),
                }
                .into())
            }
        }
    }

    async fn attempt(&mut self, key: &str, request: &RawRequest) -> Result<Attempt, Error> {
        let client = self.connection(key)?.clone();

        let mut builder = client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        if let Some(body) = request.body.to_reqwest() {
            builder = builder.body(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => return Ok(Attempt::Failed(err)),
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => return Ok(Attempt::Failed(err)),
        };

        if self.options.debug {
            debug!(
                target: "nimbus::wire",
                method = %request.method,
                url = %request.url,
                request_body = %request.body.describe(),
                status = status.as_u16(),
                response_body = %String::from_utf8_lossy(&body),
                "HTTP exchange"
            );
        }

        Ok(Attempt::Received(Response::new(status, headers, body)))
    }

    fn connection(&mut self, key: &str) -> Result<&reqwest::Client, Error> {
        match self.connections.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let client = open_client(&self.options, key)?;
                debug!(key, "Opened connection");
                Ok(entry.insert(client))
            }
        }
    }
}

fn open_client(options: &TransportOptions, key: &str) -> Result<reqwest::Client, Error> {
    let setup_error = |err: reqwest::Error| ConnectionError::Setup {
        host: key.to_string(),
        cause: err.to_string(),
    };

    // Redirects are returned as responses, never followed.
    let mut builder = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(1)
        .timeout(options.timeout)
        .danger_accept_invalid_certs(options.accept_invalid_certs);

    if let Some((host, port)) = &options.proxy {
        let proxy = reqwest::Proxy::all(format!("http://{}:{}", host, port)).map_err(setup_error)?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(|err| setup_error(err).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connections_open_lazily_and_close_explicitly() {
        let mut transport = Transport::new(TransportOptions::default());
        assert!(!transport.is_open("compute.example.com"));

        transport.connection("compute.example.com").unwrap();
        assert!(transport.is_open("compute.example.com"));

        transport.connection("compute.example.com").unwrap();
        assert_eq!(transport.connections.len(), 1);

        transport.close("compute.example.com");
        assert!(!transport.is_open("compute.example.com"));
    }

    #[test]
    fn raw_request_builds_url() {
        let request = RawRequest::new(
            Method::GET,
            Scheme::Https,
            "compute.example.com",
            443,
            "/v1.1/123/servers",
            HeaderMap::new(),
            RequestBody::Empty,
        );
        assert_eq!(
            request.url,
            "https://compute.example.com:443/v1.1/123/servers"
        );
        assert_eq!(request.host, "compute.example.com");
    }

    #[tokio::test]
    async fn unreachable_host_exhausts_reconnects() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut transport = Transport::new(TransportOptions::default());
        let request = RawRequest::new(
            Method::GET,
            Scheme::Http,
            "127.0.0.1",
            port,
            "/",
            HeaderMap::new(),
            RequestBody::Empty,
        );

        let err = transport.send("127.0.0.1", &request).await.unwrap_err();
        match err {
            Error::Connection(ConnectionError::RetriesExhausted {
                host, reconnects, ..
            }) => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(reconnects, MAX_RECONNECTS);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!transport.is_open("127.0.0.1"));
    }
}
