//! Login credentials and the options that shape authentication.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::types::Endpoint;

/// Service type for compute endpoints.
pub const SERVICE_COMPUTE: &str = "compute";

/// Service type for object-storage endpoints.
pub const SERVICE_OBJECT_STORE: &str = "object-store";

/// Catalog field used when no endpoint type is configured.
pub const DEFAULT_ENDPOINT_TYPE: &str = "publicURL";

/// How the api-key is presented to a V2 auth endpoint.
///
/// V1 endpoints ignore this; they always send `X-Auth-Key`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AuthMethod {
    /// `passwordCredentials` with the api-key as password.
    #[default]
    Password,
    /// `RAX-KSKEY:apiKeyCredentials`.
    ApiKey,
}

impl FromStr for AuthMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "password" => Ok(AuthMethod::Password),
            "apikey" | "key" | "rax-kskey" => Ok(AuthMethod::ApiKey),
            _ => Err(ConfigError::UnknownAuthMethod(s.to_string())),
        }
    }
}

/// Login credentials and authentication options.
///
/// Built with [`Credentials::builder`]; immutable afterwards.
///
/// # Security
///
/// The api-key is never exposed in Debug output to prevent accidental logging.
///
/// # Example
///
/// ```
/// use nimbus::Credentials;
///
/// let creds = Credentials::builder()
///     .username("alice")
///     .api_key("secret")
///     .auth_url("https://identity.example.com/v2.0/")
///     .region("ORD")
///     .build()
///     .unwrap();
/// assert_eq!(creds.username(), "alice");
/// assert_eq!(creds.auth_endpoint().path(), "/v2.0");
/// ```
#[derive(Clone)]
pub struct Credentials {
    username: String,
    api_key: String,
    tenant: Option<String>,
    auth_method: AuthMethod,
    auth_endpoint: Endpoint,
    service_type: String,
    service_name: Option<String>,
    region: Option<String>,
    endpoint_type: String,
    proxy: Option<(String, u16)>,
    retry_auth: bool,
}

impl Credentials {
    /// Start building credentials.
    pub fn builder() -> CredentialsBuilder {
        CredentialsBuilder::default()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the api-key.
    ///
    /// # Security
    ///
    /// Use this only when constructing authentication requests.
    /// Never log or display this value.
    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    pub fn auth_method(&self) -> AuthMethod {
        self.auth_method
    }

    pub fn auth_endpoint(&self) -> &Endpoint {
        &self.auth_endpoint
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Catalog field holding the URL to use, e.g. `publicURL` or `internalURL`.
    pub fn endpoint_type(&self) -> &str {
        &self.endpoint_type
    }

    /// Proxy host and port, if requests should go through one.
    pub fn proxy(&self) -> Option<(&str, u16)> {
        self.proxy.as_ref().map(|(host, port)| (host.as_str(), *port))
    }

    /// Whether a 401 from the service triggers re-authentication.
    pub fn retry_auth(&self) -> bool {
        self.retry_auth
    }

    /// Returns true when the service is object storage.
    pub fn is_object_store(&self) -> bool {
        self.service_type == SERVICE_OBJECT_STORE
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &"[REDACTED]")
            .field("tenant", &self.tenant)
            .field("auth_method", &self.auth_method)
            .field("auth_endpoint", &self.auth_endpoint)
            .field("service_type", &self.service_type)
            .field("service_name", &self.service_name)
            .field("region", &self.region)
            .field("endpoint_type", &self.endpoint_type)
            .field("proxy", &self.proxy)
            .field("retry_auth", &self.retry_auth)
            .finish()
    }
}

/// Builder for [`Credentials`].
#[derive(Default)]
pub struct CredentialsBuilder {
    username: Option<String>,
    api_key: Option<String>,
    tenant: Option<String>,
    auth_method: Option<String>,
    auth_url: Option<String>,
    service_type: Option<String>,
    service_name: Option<String>,
    region: Option<String>,
    endpoint_type: Option<String>,
    proxy: Option<(String, u16)>,
    retry_auth: Option<bool>,
}

impl CredentialsBuilder {
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Auth method tag: `password`, or `apikey` (aliases `key`, `rax-kskey`).
    pub fn auth_method(mut self, method: impl Into<String>) -> Self {
        self.auth_method = Some(method.into());
        self
    }

    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }

    /// Service type to select from the catalog; defaults to `compute`.
    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn endpoint_type(mut self, endpoint_type: impl Into<String>) -> Self {
        self.endpoint_type = Some(endpoint_type.into());
        self
    }

    pub fn proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.proxy = Some((host.into(), port));
        self
    }

    /// Whether to re-authenticate when the service answers 401; defaults to true.
    pub fn retry_auth(mut self, retry: bool) -> Self {
        self.retry_auth = Some(retry);
        self
    }

    /// Validate and build the credentials.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if username, api-key or auth URL is
    /// missing or empty, if the auth URL does not parse, or if the auth
    /// method tag is not recognized.
    pub fn build(self) -> Result<Credentials, ConfigError> {
        let username = required(self.username, "username")?;
        let api_key = required(self.api_key, "api_key")?;
        let auth_url = required(self.auth_url, "auth_url")?;

        let auth_endpoint =
            Endpoint::parse(&auth_url).map_err(|reason| ConfigError::InvalidUrl {
                value: auth_url.clone(),
                reason,
            })?;

        let auth_method = match self.auth_method.as_deref() {
            Some(tag) => tag.parse()?,
            None => AuthMethod::default(),
        };

        Ok(Credentials {
            username,
            api_key,
            tenant: non_empty(self.tenant),
            auth_method,
            auth_endpoint,
            service_type: non_empty(self.service_type)
                .unwrap_or_else(|| SERVICE_COMPUTE.to_string()),
            service_name: non_empty(self.service_name),
            region: non_empty(self.region),
            endpoint_type: non_empty(self.endpoint_type)
                .unwrap_or_else(|| DEFAULT_ENDPOINT_TYPE.to_string()),
            proxy: self.proxy,
            retry_auth: self.retry_auth.unwrap_or(true),
        })
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    non_empty(value).ok_or(ConfigError::Missing(name))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
