//! Auth token type.

use std::fmt;

/// A token issued by the auth endpoint.
///
/// Sent as `X-Auth-Token` (and `X-Storage-Token` for object storage) on
/// every service request until the service rejects it.
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - Treat as opaque; do not parse or inspect
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Create a new auth token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value for use in request headers.
    ///
    /// # Security
    ///
    /// Use only when constructing HTTP headers or handing the token to
    /// another client.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Hide token value in Debug output
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthToken").field(&"[REDACTED]").finish()
    }
}
