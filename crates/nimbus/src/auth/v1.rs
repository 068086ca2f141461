//! V1 header handshake.

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderValue;
use tracing::{debug, info, instrument};

use crate::Result;
use crate::error::{AuthError, ConfigError};
use crate::response::Response;
use crate::session::Session;
use crate::transport::{RawRequest, RequestBody};
use crate::types::Endpoint;

use super::{AuthToken, Authenticator, Credentials, base_headers, exchange};

const X_AUTH_USER: &str = "x-auth-user";
const X_AUTH_KEY: &str = "x-auth-key";
const X_AUTH_TOKEN: &str = "x-auth-token";
const X_SERVER_MANAGEMENT_URL: &str = "x-server-management-url";
const X_STORAGE_URL: &str = "x-storage-url";

/// GETs the auth path with `X-Auth-User`/`X-Auth-Key` and reads the token
/// and service URL from the response headers.
pub(crate) struct V1Authenticator;

#[async_trait]
impl Authenticator for V1Authenticator {
    #[instrument(skip_all, fields(auth = %session.credentials().auth_endpoint()))]
    async fn authenticate(&self, session: &mut Session) -> Result<()> {
        info!("Authenticating (v1)");

        let request = build_request(session.credentials())?;
        let response = exchange(session, &request).await?;

        if !response.status().is_success() {
            session.invalidate();
            return Err(AuthError::Rejected {
                status: response.status().as_u16(),
                body: response.text(),
            }
            .into());
        }

        let (token, endpoint) = parse_response(&response, session.credentials())?;
        debug!(service = %endpoint, "Authenticated (v1)");
        session.set_authenticated(token, endpoint);
        Ok(())
    }
}

fn build_request(credentials: &Credentials) -> Result<RawRequest> {
    let endpoint = credentials.auth_endpoint();

    let mut headers = base_headers();
    headers.insert(X_AUTH_USER, header_value(X_AUTH_USER, credentials.username())?);
    headers.insert(X_AUTH_KEY, header_value(X_AUTH_KEY, credentials.api_key())?);

    Ok(RawRequest::new(
        Method::GET,
        endpoint.scheme(),
        endpoint.host(),
        endpoint.port(),
        endpoint.path(),
        headers,
        RequestBody::Empty,
    ))
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        ConfigError::InvalidHeader {
            name: name.to_string(),
        }
        .into()
    })
}

fn parse_response(response: &Response, credentials: &Credentials) -> Result<(AuthToken, Endpoint)> {
    let token = response
        .header(X_AUTH_TOKEN)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingHeader("X-Auth-Token"))?;

    let (header, label) = if credentials.is_object_store() {
        (X_STORAGE_URL, "X-Storage-Url")
    } else {
        (X_SERVER_MANAGEMENT_URL, "X-Server-Management-Url")
    };

    let url = response
        .header(header)
        .filter(|u| !u.is_empty())
        .ok_or(AuthError::MissingHeader(label))?;

    let endpoint = Endpoint::parse(url).map_err(|reason| AuthError::InvalidEndpoint {
        url: url.to_string(),
        reason,
    })?;

    Ok((AuthToken::new(token), endpoint))
}
