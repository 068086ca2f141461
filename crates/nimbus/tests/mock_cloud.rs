//! Mock cloud tests for the nimbus library.
//!
//! These tests use wiremock to simulate auth and service endpoints, and raw
//! TCP listeners to simulate connections that die mid-request.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use nimbus::{
    AuthError, AuthVersion, ConfigError, ConnectionError, Credentials, Error, FaultKind,
    RequestOptions, Session, SessionOptions, TransportOptions,
};
use reqwest::Method;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Credentials pointing at a V1 auth path on the mock server.
fn v1_credentials(server: &MockServer) -> Credentials {
    Credentials::builder()
        .username("alice")
        .api_key("key123")
        .auth_url(format!("{}/v1.0", server.uri()))
        .build()
        .unwrap()
}

/// Mount a V1 auth endpoint handing out `token` and a service URL on `service`.
async fn mount_v1_auth(server: &MockServer, token: &str, service: &str) {
    Mock::given(method("GET"))
        .and(path("/v1.0"))
        .and(header("x-auth-user", "alice"))
        .and(header("x-auth-key", "key123"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("x-auth-token", token)
                .insert_header("x-server-management-url", service),
        )
        .mount(server)
        .await;
}

fn v2_catalog(server: &MockServer, token: &str) -> serde_json::Value {
    json!({
        "access": {
            "token": {"id": token, "expires": "2030-01-01T00:00:00Z"},
            "serviceCatalog": [
                {
                    "type": "object-store",
                    "name": "cloudFiles",
                    "endpoints": [
                        {"region": "DFW", "publicURL": format!("{}/files/dfw", server.uri())}
                    ]
                },
                {
                    "type": "compute",
                    "name": "cloudServers",
                    "endpoints": [
                        {"region": "DFW", "publicURL": format!("{}/v2/dfw", server.uri())},
                        {"region": "ORD", "publicURL": format!("{}/v2/ord", server.uri())}
                    ]
                }
            ]
        }
    })
}

fn v2_credentials(server: &MockServer, region: Option<&str>) -> Credentials {
    let mut builder = Credentials::builder()
        .username("alice")
        .api_key("key123")
        .tenant("acme")
        .auth_url(format!("{}/v2.0/", server.uri()));
    if let Some(region) = region {
        builder = builder.region(region);
    }
    builder.build().unwrap()
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_missing_mandatory_options_fail_before_network() {
    let err = Credentials::builder()
        .api_key("k")
        .auth_url("http://127.0.0.1:1/v1.0")
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::Missing("username")));

    let err = Credentials::builder()
        .username("u")
        .auth_url("http://127.0.0.1:1/v1.0")
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::Missing("api_key")));

    let err = Credentials::builder()
        .username("u")
        .api_key("k")
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::Missing("auth_url")));
}

// ============================================================================
// V1 Authentication
// ============================================================================

#[tokio::test]
async fn test_v1_auth_populates_token_and_endpoint() {
    let server = MockServer::start().await;
    mount_v1_auth(&server, "T", "http://h:80/p").await;

    let session = Session::connect(v1_credentials(&server), SessionOptions::default())
        .await
        .unwrap();

    assert_eq!(session.auth_version(), AuthVersion::V1);
    assert!(session.is_authenticated());
    assert_eq!(session.token().unwrap().as_str(), "T");

    let service = session.service_endpoint().unwrap();
    assert_eq!(service.host(), "h");
    assert_eq!(service.port(), 80);
    assert_eq!(service.path(), "/p");
}

#[tokio::test]
async fn test_v1_auth_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad username or key"))
        .mount(&server)
        .await;

    let err = Session::connect(v1_credentials(&server), SessionOptions::default())
        .await
        .unwrap_err();

    match err {
        Error::Auth(AuthError::Rejected { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "Bad username or key");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_v1_auth_missing_endpoint_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0"))
        .respond_with(ResponseTemplate::new(204).insert_header("x-auth-token", "T"))
        .mount(&server)
        .await;

    let err = Session::connect(v1_credentials(&server), SessionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Auth(AuthError::MissingHeader("X-Server-Management-Url"))
    ));
}

#[tokio::test]
async fn test_unreachable_auth_host_is_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let creds = Credentials::builder()
        .username("alice")
        .api_key("key123")
        .auth_url(format!("http://127.0.0.1:{}/v1.0", port))
        .build()
        .unwrap();

    let err = Session::connect(creds, SessionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::Unreachable { .. })
    ));
}

// ============================================================================
// V2 Authentication
// ============================================================================

#[tokio::test]
async fn test_v2_auth_selects_region_case_insensitively() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .and(body_json(json!({
            "auth": {
                "passwordCredentials": {"username": "alice", "password": "key123"},
                "tenantName": "acme"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(v2_catalog(&server, "tok-v2")))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::connect(v2_credentials(&server, Some("ord")), SessionOptions::default())
        .await
        .unwrap();

    assert_eq!(session.auth_version(), AuthVersion::V2);
    assert_eq!(session.token().unwrap().as_str(), "tok-v2");
    assert_eq!(session.service_endpoint().unwrap().path(), "/v2/ord");
    assert_eq!(session.regions()["DFW"], vec!["object-store", "compute"]);
    assert_eq!(session.regions()["ORD"], vec!["compute"]);
}

#[tokio::test]
async fn test_v2_auth_without_region_takes_first_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(v2_catalog(&server, "tok")))
        .mount(&server)
        .await;

    let session = Session::connect(v2_credentials(&server, None), SessionOptions::default())
        .await
        .unwrap();

    assert_eq!(session.service_endpoint().unwrap().path(), "/v2/dfw");
}

#[tokio::test]
async fn test_v2_auth_unknown_region() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(v2_catalog(&server, "tok")))
        .mount(&server)
        .await;

    let mut session = Session::new(v2_credentials(&server, Some("SYD")), SessionOptions::default());
    let err = session.authenticate().await.unwrap_err();

    match &err {
        Error::Auth(AuthError::NoEndpoint { region, .. }) => {
            assert_eq!(region.as_deref(), Some("SYD"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("SYD"));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_v2_reauth_without_matching_region_clears_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(v2_catalog(&server, "tok")))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    // Second login: the ORD endpoint is gone from the catalog.
    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": {
                "token": {"id": "tok2"},
                "serviceCatalog": [{
                    "type": "compute",
                    "endpoints": [
                        {"region": "DFW", "publicURL": format!("{}/v2/dfw", server.uri())}
                    ]
                }]
            }
        })))
        .mount(&server)
        .await;

    let mut session = Session::connect(v2_credentials(&server, Some("ORD")), SessionOptions::default())
        .await
        .unwrap();
    assert!(session.is_authenticated());

    let err = session.authenticate().await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::NoEndpoint { .. })));
    assert!(!session.is_authenticated());
    assert!(session.token().is_none());
}

#[tokio::test]
async fn test_v1_auth_without_endpoint_header_clears_session() {
    let server = MockServer::start().await;
    let service = format!("{}/v1.1/123", server.uri());

    Mock::given(method("GET"))
        .and(path("/v1.0"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("x-auth-token", "T1")
                .insert_header("x-server-management-url", service.as_str()),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0"))
        .respond_with(ResponseTemplate::new(204).insert_header("x-auth-token", "T2"))
        .mount(&server)
        .await;

    let mut session = Session::connect(v1_credentials(&server), SessionOptions::default())
        .await
        .unwrap();

    let err = session.authenticate().await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::MissingHeader(_))));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_v2_auth_rejected_invalidates_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(v2_catalog(&server, "tok")))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "unauthorized": {"code": 401, "message": "Username or api key is invalid"}
        })))
        .mount(&server)
        .await;

    let mut session = Session::connect(v2_credentials(&server, None), SessionOptions::default())
        .await
        .unwrap();
    assert!(session.is_authenticated());

    let err = session.authenticate().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Auth(AuthError::Rejected { status: 401, .. })
    ));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_v2_api_key_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .and(body_json(json!({
            "auth": {
                "RAX-KSKEY:apiKeyCredentials": {"username": "alice", "apiKey": "key123"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(v2_catalog(&server, "tok")))
        .expect(1)
        .mount(&server)
        .await;

    let creds = Credentials::builder()
        .username("alice")
        .api_key("key123")
        .auth_method("RAX-KSKEY")
        .auth_url(format!("{}/v2.0", server.uri()))
        .build()
        .unwrap();

    Session::connect(creds, SessionOptions::default())
        .await
        .unwrap();
}

// ============================================================================
// Requests
// ============================================================================

#[tokio::test]
async fn test_request_success_is_untouched() {
    let server = MockServer::start().await;
    mount_v1_auth(&server, "T", &format!("{}/v1.1/123", server.uri())).await;

    Mock::given(method("GET"))
        .and(path("/v1.1/123/servers"))
        .and(header("x-auth-token", "T"))
        .and(header("accept", "application/json"))
        .and(header("user-agent", nimbus::USER_AGENT))
        .respond_with(
            ResponseTemplate::new(203)
                .insert_header("x-compute-request-id", "req-1")
                .set_body_json(json!({"servers": [{"id": 1, "name": "web1"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let options = SessionOptions {
        transport: TransportOptions {
            debug: true,
            ..TransportOptions::default()
        },
        ..SessionOptions::default()
    };

    let mut session = Session::new(v1_credentials(&server), options);
    let response = session
        .request(Method::GET, "/servers", RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 203);
    assert_eq!(response.header("x-compute-request-id"), Some("req-1"));
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["servers"][0]["name"], "web1");
}

#[tokio::test]
async fn test_request_with_json_body() {
    let server = MockServer::start().await;
    mount_v1_auth(&server, "T", &format!("{}/v1.1/123", server.uri())).await;

    Mock::given(method("POST"))
        .and(path("/v1.1/123/servers"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"server": {"name": "web2", "flavorId": 1}})))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"server": {"id": 42}})))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::connect(v1_credentials(&server), SessionOptions::default())
        .await
        .unwrap();

    let options = RequestOptions::new()
        .json(&json!({"server": {"name": "web2", "flavorId": 1}}))
        .unwrap();
    let response = session
        .request(Method::POST, "/servers", options)
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 202);
}

#[tokio::test]
async fn test_error_response_is_mapped() {
    let server = MockServer::start().await;
    mount_v1_auth(&server, "T", &format!("{}/v1.1/123", server.uri())).await;

    Mock::given(method("GET"))
        .and(path("/v1.1/123/servers/999"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "itemNotFound": {"message": "Server not found", "code": 404}
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/v1.1/123/servers/1"))
        .respond_with(ResponseTemplate::new(409).set_body_string("busy"))
        .mount(&server)
        .await;

    let mut session = Session::connect(v1_credentials(&server), SessionOptions::default())
        .await
        .unwrap();

    let err = session
        .request(Method::GET, "/servers/999", RequestOptions::new())
        .await
        .unwrap_err();
    match err {
        Error::Service(fault) => {
            assert_eq!(fault.kind, FaultKind::ItemNotFound);
            assert_eq!(fault.message, "Server not found");
            assert_eq!(fault.status, 404);
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = session
        .request(Method::PUT, "/servers/1", RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.fault_kind(), Some(FaultKind::ResourceStateConflict));
}

#[tokio::test]
async fn test_redirect_is_mapped_not_followed() {
    let server = MockServer::start().await;
    let elsewhere = MockServer::start().await;
    mount_v1_auth(&server, "T", &format!("{}/v1.1/123", server.uri())).await;

    Mock::given(method("GET"))
        .and(path("/v1.1/123/servers"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/stolen", elsewhere.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/stolen"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&elsewhere)
        .await;

    let mut session = Session::connect(v1_credentials(&server), SessionOptions::default())
        .await
        .unwrap();
    let err = session
        .request(Method::GET, "/servers", RequestOptions::new())
        .await
        .unwrap_err();

    match err {
        Error::Service(fault) => {
            assert_eq!(fault.status, 302);
            assert_eq!(fault.kind, FaultKind::Other);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(elsewhere.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_object_store_sends_storage_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1.0"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("x-auth-token", "S")
                .insert_header("x-storage-url", format!("{}/v1/AUTH_acct", server.uri()).as_str()),
        )
        .mount(&server)
        .await;

    Mock::given(method("HEAD"))
        .and(path("/v1/AUTH_acct/photos"))
        .and(header("x-auth-token", "S"))
        .and(header("x-storage-token", "S"))
        .respond_with(ResponseTemplate::new(204).insert_header("x-container-object-count", "7"))
        .expect(1)
        .mount(&server)
        .await;

    let creds = Credentials::builder()
        .username("alice")
        .api_key("key123")
        .auth_url(format!("{}/auth/v1.0", server.uri()))
        .service_type("object-store")
        .build()
        .unwrap();

    let mut session = Session::connect(creds, SessionOptions::default())
        .await
        .unwrap();
    let response = session
        .request(Method::HEAD, "/photos", RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(response.header("x-container-object-count"), Some("7"));
}

#[tokio::test]
async fn test_streaming_upload() {
    let server = MockServer::start().await;
    mount_v1_auth(&server, "T", &format!("{}/v1/AUTH_acct", server.uri())).await;

    Mock::given(method("PUT"))
        .and(path("/v1/AUTH_acct/photos/cat.txt"))
        .and(body_string("hello streaming world"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::connect(v1_credentials(&server), SessionOptions::default())
        .await
        .unwrap();

    let options = RequestOptions::new()
        .try_header("content-type", "text/plain")
        .unwrap();
    let response = session
        .request_stream(
            Method::PUT,
            "/photos/cat.txt",
            || {
                let chunks = vec![
                    Ok::<_, std::io::Error>("hello "),
                    Ok("streaming "),
                    Ok("world"),
                ];
                reqwest::Body::wrap_stream(futures_util::stream::iter(chunks))
            },
            options,
        )
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 201);
}

// ============================================================================
// Re-authentication
// ============================================================================

#[tokio::test]
async fn test_401_reauthenticates_and_retries() {
    let server = MockServer::start().await;
    let service = format!("{}/v1.1/123", server.uri());

    Mock::given(method("GET"))
        .and(path("/v1.0"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("x-auth-token", "T1")
                .insert_header("x-server-management-url", service.as_str()),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("x-auth-token", "T2")
                .insert_header("x-server-management-url", service.as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.1/123/servers"))
        .and(header("x-auth-token", "T1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.1/123/servers"))
        .and(header("x-auth-token", "T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"servers": []})))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::connect(v1_credentials(&server), SessionOptions::default())
        .await
        .unwrap();
    let response = session
        .request(Method::GET, "/servers", RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(session.token().unwrap().as_str(), "T2");
}

#[tokio::test]
async fn test_failed_reauth_surfaces_auth_error() {
    let server = MockServer::start().await;
    let service = format!("{}/v1.1/123", server.uri());

    Mock::given(method("GET"))
        .and(path("/v1.0"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("x-auth-token", "T1")
                .insert_header("x-server-management-url", service.as_str()),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0"))
        .respond_with(ResponseTemplate::new(403).set_body_string("account suspended"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.1/123/servers"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::connect(v1_credentials(&server), SessionOptions::default())
        .await
        .unwrap();
    let err = session
        .request(Method::GET, "/servers", RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Auth(AuthError::Rejected { status: 403, .. })
    ));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_401_with_retry_disabled() {
    let server = MockServer::start().await;
    mount_v1_auth(&server, "T", &format!("{}/v1.1/123", server.uri())).await;

    Mock::given(method("GET"))
        .and(path("/v1.1/123/servers"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let creds = Credentials::builder()
        .username("alice")
        .api_key("key123")
        .auth_url(format!("{}/v1.0", server.uri()))
        .retry_auth(false)
        .build()
        .unwrap();

    let mut session = Session::connect(creds, SessionOptions::default())
        .await
        .unwrap();
    let err = session
        .request(Method::GET, "/servers", RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Connection(ConnectionError::AuthExpired)));
}

#[tokio::test]
async fn test_reauth_cap_stops_401_loop() {
    let server = MockServer::start().await;
    let service = format!("{}/v1.1/123", server.uri());

    Mock::given(method("GET"))
        .and(path("/v1.0"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("x-auth-token", "T")
                .insert_header("x-server-management-url", service.as_str()),
        )
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.1/123/servers"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&server)
        .await;

    let options = SessionOptions {
        max_reauth_attempts: Some(2),
        ..SessionOptions::default()
    };
    let mut session = Session::connect(v1_credentials(&server), options)
        .await
        .unwrap();
    let err = session
        .request(Method::GET, "/servers", RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Connection(ConnectionError::ReauthLimit { attempts: 2 })
    ));
}

// ============================================================================
// Transport failures
// ============================================================================

/// Spawn a server that drops the first `drops` connections without a reply
/// and answers later ones with a small JSON body. Returns its port and a
/// counter of accepted connections.
async fn flaky_server(drops: usize) -> (u16, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= drops {
                drop(socket);
                continue;
            }

            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(read) => request.extend_from_slice(&buf[..read]),
                    }
                }
                let body = r#"{"servers": []}"#;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    (port, accepted)
}

#[tokio::test]
async fn test_transport_failure_reconnects_and_succeeds() {
    let (port, accepted) = flaky_server(2).await;
    let server = MockServer::start().await;
    mount_v1_auth(&server, "T", &format!("http://127.0.0.1:{}/v1.1/123", port)).await;

    let mut session = Session::connect(v1_credentials(&server), SessionOptions::default())
        .await
        .unwrap();
    let response = session
        .request(Method::GET, "/servers", RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_transport_failure_gives_up_after_five_reconnects() {
    let (port, accepted) = flaky_server(usize::MAX).await;
    let server = MockServer::start().await;
    mount_v1_auth(&server, "T", &format!("http://127.0.0.1:{}/v1.1/123", port)).await;

    let mut session = Session::connect(v1_credentials(&server), SessionOptions::default())
        .await
        .unwrap();
    let err = session
        .request(Method::GET, "/servers", RequestOptions::new())
        .await
        .unwrap_err();

    match &err {
        Error::Connection(ConnectionError::RetriesExhausted {
            host, reconnects, ..
        }) => {
            assert_eq!(host, "127.0.0.1");
            assert_eq!(*reconnects, 5);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("after 5 attempts"));
    assert_eq!(accepted.load(Ordering::SeqCst), 6);
}
