//! Authentication against the auth endpoint.
//!
//! Two incompatible protocols exist. V1 exchanges headers on a GET; V2
//! posts JSON credentials and receives a service catalog. The protocol is
//! chosen from the auth URL path alone, see [`AuthVersion::detect`].

mod credentials;
mod tokens;
mod v1;
mod v2;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};

pub use credentials::{
    AuthMethod, Credentials, CredentialsBuilder, DEFAULT_ENDPOINT_TYPE, SERVICE_COMPUTE,
    SERVICE_OBJECT_STORE,
};
pub use tokens::AuthToken;

use crate::Result;
use crate::response::Response;
use crate::session::Session;
use crate::transport::RawRequest;

use v1::V1Authenticator;
use v2::V2Authenticator;

/// The login handshake of one protocol version.
///
/// On success the session holds a fresh token and service endpoint; on
/// failure the session is left unauthenticated.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, session: &mut Session) -> Result<()>;
}

/// Auth protocol version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthVersion {
    V1,
    V2,
}

impl AuthVersion {
    /// Pick the protocol for an auth path.
    ///
    /// Paths ending in `v2.0` (a trailing slash is ignored) speak V2,
    /// everything else V1.
    pub fn detect(auth_path: &str) -> Self {
        if auth_path.trim_end_matches('/').ends_with("v2.0") {
            AuthVersion::V2
        } else {
            AuthVersion::V1
        }
    }

    pub(crate) fn authenticator(self) -> &'static dyn Authenticator {
        match self {
            AuthVersion::V1 => &V1Authenticator,
            AuthVersion::V2 => &V2Authenticator,
        }
    }
}

/// Connection key for the auth host, distinct from any service connection.
fn auth_key(host: &str) -> String {
    format!("auth:{}", host)
}

fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(crate::USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Send one request to the auth host and close the connection afterwards,
/// whatever the outcome.
async fn exchange(session: &mut Session, request: &RawRequest) -> Result<Response> {
    let key = auth_key(&request.host);
    let transport = session.transport_mut();
    let result = transport.send_once(&key, request).await;
    transport.close(&key);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_v2_by_path_suffix() {
        assert_eq!(AuthVersion::detect("/v2.0"), AuthVersion::V2);
        assert_eq!(AuthVersion::detect("/v2.0/"), AuthVersion::V2);
        assert_eq!(AuthVersion::detect("/identity/v2.0"), AuthVersion::V2);
    }

    #[test]
    fn everything_else_is_v1() {
        assert_eq!(AuthVersion::detect("/v1.0"), AuthVersion::V1);
        assert_eq!(AuthVersion::detect(""), AuthVersion::V1);
        assert_eq!(AuthVersion::detect("/v2.0/tokens/extra"), AuthVersion::V1);
    }
}
