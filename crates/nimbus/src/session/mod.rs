//! Authenticated sessions and the retrying request operation.

mod options;

use std::collections::BTreeMap;
use std::fmt;

use reqwest::header::{
    ACCEPT, CONNECTION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};
use reqwest::{Method, StatusCode};
use tracing::{debug, info, instrument, warn};

pub use options::{RequestOptions, SessionOptions};

use crate::Result;
use crate::auth::{AuthToken, AuthVersion, Credentials};
use crate::error::{AuthError, ConnectionError};
use crate::fault;
use crate::response::Response;
use crate::transport::{MAX_RECONNECTS, RawRequest, RequestBody, Transport};
use crate::types::{Endpoint, Scheme};

const X_AUTH_TOKEN: HeaderName = HeaderName::from_static("x-auth-token");
const X_STORAGE_TOKEN: HeaderName = HeaderName::from_static("x-storage-token");

/// A client session against one cloud account.
///
/// The session owns the credentials, the current token, the negotiated
/// service endpoint and every connection it opens. Requests go through
/// [`Session::request`], which reconnects on transport failures and
/// re-authenticates when the service rejects the token.
///
/// `request` takes `&mut self`, so a session carries at most one request
/// at a time. Use one session per worker, or wrap it in a lock.
///
/// # Example
///
/// ```no_run
/// use nimbus::{Credentials, RequestOptions, Session, SessionOptions};
/// use reqwest::Method;
///
/// # async fn example() -> Result<(), nimbus::Error> {
/// let creds = Credentials::builder()
///     .username("alice")
///     .api_key("secret")
///     .auth_url("https://identity.example.com/v2.0/")
///     .region("ORD")
///     .build()?;
///
/// let mut session = Session::connect(creds, SessionOptions::default()).await?;
/// let servers = session
///     .request(Method::GET, "/servers", RequestOptions::new())
///     .await?;
/// println!("{}", servers.text());
/// # Ok(())
/// # }
/// ```
pub struct Session {
    credentials: Credentials,
    auth_version: AuthVersion,
    token: Option<AuthToken>,
    service: Option<Endpoint>,
    regions: BTreeMap<String, Vec<String>>,
    transport: Transport,
    max_reauth_attempts: Option<u32>,
}

/// Where a request goes, fixed before the first attempt.
struct Target {
    scheme: Scheme,
    host: String,
    port: u16,
    path: String,
}

impl Session {
    /// Create an unauthenticated session. No network activity happens
    /// until the first request or [`Session::authenticate`].
    pub fn new(credentials: Credentials, options: SessionOptions) -> Self {
        let mut transport_options = options.transport;
        if transport_options.proxy.is_none() {
            transport_options.proxy = credentials
                .proxy()
                .map(|(host, port)| (host.to_string(), port));
        }

        let auth_version = AuthVersion::detect(credentials.auth_endpoint().path());

        Self {
            credentials,
            auth_version,
            token: None,
            service: None,
            regions: BTreeMap::new(),
            transport: Transport::new(transport_options),
            max_reauth_attempts: options.max_reauth_attempts,
        }
    }

    /// Create a session and authenticate it.
    pub async fn connect(credentials: Credentials, options: SessionOptions) -> Result<Self> {
        let mut session = Self::new(credentials, options);
        session.authenticate().await?;
        Ok(session)
    }

    /// Run the login handshake, replacing any current token and service
    /// endpoint.
    ///
    /// Any failure leaves the session unauthenticated.
    pub async fn authenticate(&mut self) -> Result<()> {
        let authenticator = self.auth_version.authenticator();
        let result = authenticator.authenticate(self).await;
        if result.is_err() {
            self.invalidate();
        }
        result
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn auth_endpoint(&self) -> &Endpoint {
        self.credentials.auth_endpoint()
    }

    pub fn auth_version(&self) -> AuthVersion {
        self.auth_version
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Returns the current token, if authenticated.
    pub fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    /// Returns the service endpoint negotiated by the last successful
    /// authentication.
    pub fn service_endpoint(&self) -> Option<&Endpoint> {
        self.service.as_ref()
    }

    /// Regions named in the V2 service catalog, with the service types
    /// offered in each. Empty for V1.
    pub fn regions(&self) -> &BTreeMap<String, Vec<String>> {
        &self.regions
    }

    /// Issue a request against the service endpoint.
    ///
    /// `path` is appended to the service path prefix. Transport failures
    /// are retried on a fresh connection; a 401 triggers re-authentication
    /// and a retry with the new token. Any final status outside 200-209 is
    /// returned as an error.
    #[instrument(skip(self, options), fields(service = %self.credentials.service_type()))]
    pub async fn request(
        &mut self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        let response = self.send_retrying(method, path, &options).await?;

        if response.is_success() {
            Ok(response)
        } else {
            debug!(status = response.status().as_u16(), "Mapping error response");
            Err(fault::map_response(&response))
        }
    }

    /// Issue a request whose body is streamed with chunked transfer
    /// encoding. `factory` is called once per attempt.
    pub async fn request_stream<F>(
        &mut self,
        method: Method,
        path: &str,
        factory: F,
        options: RequestOptions,
    ) -> Result<Response>
    where
        F: Fn() -> reqwest::Body + Send + Sync + 'static,
    {
        let options = RequestOptions {
            body: RequestBody::stream(factory),
            ..options
        };
        self.request(method, path, options).await
    }

    async fn send_retrying(
        &mut self,
        method: Method,
        path: &str,
        options: &RequestOptions,
    ) -> Result<Response> {
        if !self.is_authenticated() {
            self.authenticate().await?;
        }

        let target = self.target(path, options)?;
        let max_reconnects = options.max_reconnects.unwrap_or(MAX_RECONNECTS);
        let mut reauths = 0;

        loop {
            let request = RawRequest::new(
                method.clone(),
                target.scheme,
                &target.host,
                target.port,
                &target.path,
                self.headers(&options.headers)?,
                options.body.clone(),
            );

            debug!(method = %method, url = %request.url, "Sending request");
            let response = self
                .transport
                .send_with_reconnects(&target.host, &request, max_reconnects)
                .await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if !self.credentials.retry_auth() {
                return Err(ConnectionError::AuthExpired.into());
            }
            if let Some(limit) = self.max_reauth_attempts
                && reauths >= limit
            {
                return Err(ConnectionError::ReauthLimit { attempts: reauths }.into());
            }

            reauths += 1;
            warn!(reauths, "Service rejected token, re-authenticating");
            self.invalidate();
            self.authenticate().await?;
        }
    }

    fn target(&self, path: &str, options: &RequestOptions) -> Result<Target> {
        let service = self
            .service
            .as_ref()
            .ok_or_else(|| AuthError::MalformedResponse("no service endpoint".to_string()))?;

        Ok(Target {
            scheme: options.scheme.unwrap_or(service.scheme()),
            host: options
                .host
                .clone()
                .unwrap_or_else(|| service.host().to_string()),
            port: options.port.unwrap_or(service.port()),
            path: join_path(service.path(), path),
        })
    }

    /// Build the header map for one attempt.
    ///
    /// Caller headers go in first so the mandatory headers overwrite them.
    fn headers(&self, extra: &HeaderMap) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.extend(extra.clone());

        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(token.as_str()).map_err(|_| {
                AuthError::MalformedResponse("token is not a valid header value".to_string())
            })?;
            if self.credentials.is_object_store() {
                headers.insert(X_STORAGE_TOKEN, value.clone());
            }
            headers.insert(X_AUTH_TOKEN, value);
        }

        headers.insert(CONNECTION, HeaderValue::from_static("Keep-Alive"));
        headers.insert(USER_AGENT, HeaderValue::from_static(crate::USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub(crate) fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    pub(crate) fn set_authenticated(&mut self, token: AuthToken, service: Endpoint) {
        info!(service = %service, "Session authenticated");
        self.token = Some(token);
        self.service = Some(service);
    }

    pub(crate) fn set_regions(&mut self, regions: BTreeMap<String, Vec<String>>) {
        self.regions = regions;
    }

    /// Forget the current token.
    pub(crate) fn invalidate(&mut self) {
        self.token = None;
    }
}

/// Append a request path to the service path prefix.
fn join_path(prefix: &str, path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        format!("{}{}", prefix, path)
    } else {
        format!("{}/{}", prefix, path)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("credentials", &self.credentials)
            .field("auth_version", &self.auth_version)
            .field("authenticated", &self.is_authenticated())
            .field("service", &self.service)
            .field("transport", &self.transport.options())
            .finish()
    }
}
