//! V2 token handshake with service catalog.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::Result;
use crate::error::AuthError;
use crate::session::Session;
use crate::transport::{RawRequest, RequestBody};
use crate::types::Endpoint;

use super::{AuthMethod, AuthToken, Authenticator, Credentials, base_headers, exchange};

/// Request body for `POST <auth_path>/tokens`.
#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    auth: AuthPayload<'a>,
}

#[derive(Debug, Serialize)]
struct AuthPayload<'a> {
    #[serde(rename = "passwordCredentials", skip_serializing_if = "Option::is_none")]
    password_credentials: Option<PasswordCredentials<'a>>,
    #[serde(
        rename = "RAX-KSKEY:apiKeyCredentials",
        skip_serializing_if = "Option::is_none"
    )]
    api_key_credentials: Option<ApiKeyCredentials<'a>>,
    #[serde(rename = "tenantName", skip_serializing_if = "Option::is_none")]
    tenant_name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct PasswordCredentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiKeyCredentials<'a> {
    username: &'a str,
    api_key: &'a str,
}

/// Response from `POST <auth_path>/tokens`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Access {
    token: Token,
    #[serde(default)]
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

/// One service in the V2 service catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

/// One endpoint of a catalog entry.
///
/// URLs are keyed by endpoint type (`publicURL`, `internalURL`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEndpoint {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(flatten)]
    pub fields: HashMap<String, serde_json::Value>,
}

impl CatalogEndpoint {
    /// Returns the URL for an endpoint type, if present.
    pub fn url(&self, endpoint_type: &str) -> Option<&str> {
        self.fields.get(endpoint_type).and_then(|v| v.as_str())
    }
}

/// POSTs JSON credentials to `<auth_path>/tokens` and picks the service
/// endpoint out of the returned catalog.
pub(crate) struct V2Authenticator;

#[async_trait]
impl Authenticator for V2Authenticator {
    #[instrument(skip_all, fields(auth = %session.credentials().auth_endpoint()))]
    async fn authenticate(&self, session: &mut Session) -> Result<()> {
        info!("Authenticating (v2)");

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

        let parsed: TokenResponse = serde_json::from_slice(response.bytes())
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        let credentials = session.credentials();
        let url = select_endpoint(
            &parsed.access.service_catalog,
            credentials.service_type(),
            credentials.service_name(),
            credentials.region(),
            credentials.endpoint_type(),
        )
        .ok_or_else(|| AuthError::NoEndpoint {
            service_type: credentials.service_type().to_string(),
            region: credentials.region().map(str::to_string),
        })?;

        let endpoint = Endpoint::parse(url).map_err(|reason| AuthError::InvalidEndpoint {
            url: url.to_string(),
            reason,
        })?;

        debug!(service = %endpoint, "Authenticated (v2)");
        session.set_regions(region_listing(&parsed.access.service_catalog));
        session.set_authenticated(AuthToken::new(parsed.access.token.id), endpoint);
        Ok(())
    }
}

fn build_request(credentials: &Credentials) -> Result<RawRequest> {
    let endpoint = credentials.auth_endpoint();
    let tenant_name = credentials.tenant();

    let payload = match credentials.auth_method() {
        AuthMethod::Password => AuthPayload {
            password_credentials: Some(PasswordCredentials {
                username: credentials.username(),
                password: credentials.api_key(),
            }),
            api_key_credentials: None,
            tenant_name,
        },
        AuthMethod::ApiKey => AuthPayload {
            password_credentials: None,
            api_key_credentials: Some(ApiKeyCredentials {
                username: credentials.username(),
                api_key: credentials.api_key(),
            }),
            tenant_name,
        },
    };

    let body = RequestBody::json(&TokenRequest { auth: payload })?;

    let mut headers = base_headers();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok(RawRequest::new(
        Method::POST,
        endpoint.scheme(),
        endpoint.host(),
        endpoint.port(),
        &format!("{}/tokens", endpoint.path()),
        headers,
        body,
    ))
}

/// Choose the service URL from a catalog.
///
/// Takes the first entry of the requested type (and name, if given). With a
/// region, the first endpoint of that entry whose region matches ignoring
/// case; without one, the entry's first endpoint.
pub(crate) fn select_endpoint<'a>(
    catalog: &'a [CatalogEntry],
    service_type: &str,
    service_name: Option<&str>,
    region: Option<&str>,
    endpoint_type: &str,
) -> Option<&'a str> {
    let entry = catalog.iter().find(|entry| {
        entry.service_type == service_type
            && service_name.is_none_or(|name| entry.name.as_deref() == Some(name))
    })?;

    let endpoint = match region {
        Some(region) => entry.endpoints.iter().find(|ep| {
            ep.region
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(region))
        })?,
        None => entry.endpoints.first()?,
    };

    endpoint.url(endpoint_type)
}

/// Map each region to the service types offered there.
fn region_listing(catalog: &[CatalogEntry]) -> BTreeMap<String, Vec<String>> {
    let mut regions: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in catalog {
        for region in entry.endpoints.iter().filter_map(|ep| ep.region.as_ref()) {
            let services = regions.entry(region.clone()).or_default();
            if !services.contains(&entry.service_type) {
                services.push(entry.service_type.clone());
            }
        }
    }
    regions
}
