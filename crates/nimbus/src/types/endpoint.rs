//! Network endpoint type.

use std::fmt;
use std::str::FromStr;
use url::Url;

/// URL scheme of an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Returns the scheme as it appears in a URL.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Returns the port used when a URL names none.
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    /// Returns true for the TLS-secured scheme.
    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Https)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(format!("unsupported scheme '{}'", other)),
        }
    }
}

/// A parsed `scheme://host:port/path` location.
///
/// Used for both the auth endpoint and the service endpoint negotiated by
/// authentication. The path never ends with a slash, so request paths that
/// start with `/` can be appended directly.
///
/// # Example
///
/// ```
/// use nimbus::Endpoint;
///
/// let ep = Endpoint::parse("https://compute.example.com/v1.1/12345/").unwrap();
/// assert_eq!(ep.host(), "compute.example.com");
/// assert_eq!(ep.port(), 443);
/// assert_eq!(ep.path(), "/v1.1/12345");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    /// Build an endpoint from its parts.
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
            path: normalize_path(&path.into()),
        }
    }

    /// Parse an absolute HTTP(S) URL.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the URL is not absolute, has
    /// no host, or uses a scheme other than http/https.
    pub fn parse(s: &str) -> Result<Self, String> {
        let url = Url::parse(s).map_err(|e| e.to_string())?;

        if url.cannot_be_a_base() {
            return Err("must be an absolute URL".to_string());
        }

        let scheme: Scheme = url.scheme().parse()?;
        let host = url
            .host_str()
            .ok_or_else(|| "must have a host".to_string())?
            .to_string();
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        Ok(Self::new(scheme, host, port, url.path()))
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the path prefix, empty for a root URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the full URL for a path relative to this endpoint's host.
    ///
    /// `path` is used as given; it is not joined with this endpoint's path.
    pub fn url_for(&self, path: &str) -> String {
        format_url(self.scheme, &self.host, self.port, path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url_for(&self.path))
    }
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Format a URL from its parts, bracketing IPv6 literals.
pub(crate) fn format_url(scheme: Scheme, host: &str, port: u16, path: &str) -> String {
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    let sep = if path.is_empty() || path.starts_with('/') {
        ""
    } else {
        "/"
    };
    format!("{}://{}:{}{}{}", scheme, host, port, sep, path)
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
