//! Error types for the nimbus library.
//!
//! This module provides a unified error type with explicit variants for
//! configuration, connection, authentication and service-fault errors.

use std::fmt;
use thiserror::Error;

/// The unified error type for nimbus operations.
///
/// Transport failures and expired tokens are handled inside the session;
/// every variant here is terminal for the request that produced it.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration, raised before any network activity.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A connection could not be opened or kept alive.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The authentication handshake was rejected or returned no usable endpoint.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The service answered with a non-success status.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// A JSON body could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the service fault kind, if this is a service error.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Error::Service(err) => Some(err.kind),
            _ => None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A mandatory option was not supplied.
    #[error("missing required option: {0}")]
    Missing(&'static str),

    /// A URL option could not be parsed.
    #[error("invalid URL '{value}': {reason}")]
    InvalidUrl { value: String, reason: String },

    /// The auth method tag is not one of the known methods.
    #[error("unrecognized auth method '{0}'")]
    UnknownAuthMethod(String),

    /// A header name or value is not valid HTTP.
    #[error("invalid header '{name}'")]
    InvalidHeader { name: String },
}

/// Connection-level errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Every reconnect attempt failed.
    #[error("unable to reconnect to {host} after {reconnects} attempts: {cause}")]
    RetriesExhausted {
        host: String,
        reconnects: u32,
        cause: String,
    },

    /// A single-shot request (authentication) could not reach its host.
    #[error("unable to connect to {host}: {cause}")]
    Unreachable { host: String, cause: String },

    /// The service answered 401 and re-authentication is disabled.
    #[error("authentication token expired and retry on expiry is disabled")]
    AuthExpired,

    /// The service kept answering 401 after the configured number of re-authentications.
    #[error("authentication token still rejected after {attempts} re-authentication attempts")]
    ReauthLimit { attempts: u32 },

    /// The HTTP client for a host could not be constructed.
    #[error("failed to set up HTTP client for {host}: {cause}")]
    Setup { host: String, cause: String },
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The auth endpoint answered with a non-success status.
    #[error("authentication failed with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// A header the protocol requires was missing or empty.
    #[error("authentication response is missing the {0} header")]
    MissingHeader(&'static str),

    /// No catalog entry matched the configured service and region.
    #[error("no API endpoint for service '{service_type}' in region {}", .region.as_deref().unwrap_or("<any>"))]
    NoEndpoint {
        service_type: String,
        region: Option<String>,
    },

    /// The token response body did not have the expected shape.
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    /// The endpoint URL returned by the auth server could not be parsed.
    #[error("invalid service endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

/// The category of a service fault.
///
/// Fault bodies name their category with a single top-level key; see
/// [`FaultKind::from_fault_name`] for the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    ItemNotFound,
    OverLimit,
    BadRequest,
    ResourceStateConflict,
    ServiceUnavailable,
    BuildInProgress,
    ServerCapacityUnavailable,
    NotImplemented,
    Unauthorized,
    Forbidden,
    ComputeFault,
    BadMediaType,
    BadMethod,
    BackupOrResizeInProgress,
    ResizeNotAllowed,
    /// Unclassified fault, or a body that could not be interpreted.
    Other,
}

impl FaultKind {
    /// Look up the kind for a fault name, ignoring case.
    ///
    /// Returns `None` for names outside the known set.
    pub fn from_fault_name(name: &str) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "itemnotfound" => FaultKind::ItemNotFound,
            "overlimit" => FaultKind::OverLimit,
            "badrequest" => FaultKind::BadRequest,
            "resourcestateconflict" | "conflictingrequest" => FaultKind::ResourceStateConflict,
            "serviceunavailable" => FaultKind::ServiceUnavailable,
            "buildinprogress" => FaultKind::BuildInProgress,
            "servercapacityunavailable" => FaultKind::ServerCapacityUnavailable,
            "notimplemented" => FaultKind::NotImplemented,
            "unauthorized" => FaultKind::Unauthorized,
            "forbidden" => FaultKind::Forbidden,
            "computefault" => FaultKind::ComputeFault,
            "badmediatype" => FaultKind::BadMediaType,
            "badmethod" => FaultKind::BadMethod,
            "backuporresizeinprogress" => FaultKind::BackupOrResizeInProgress,
            "resizenotallowed" => FaultKind::ResizeNotAllowed,
            _ => return None,
        };
        Some(kind)
    }

    fn as_str(&self) -> &'static str {
        match self {
            FaultKind::ItemNotFound => "item not found",
            FaultKind::OverLimit => "over limit",
            FaultKind::BadRequest => "bad request",
            FaultKind::ResourceStateConflict => "resource state conflict",
            FaultKind::ServiceUnavailable => "service unavailable",
            FaultKind::BuildInProgress => "build in progress",
            FaultKind::ServerCapacityUnavailable => "server capacity unavailable",
            FaultKind::NotImplemented => "not implemented",
            FaultKind::Unauthorized => "unauthorized",
            FaultKind::Forbidden => "forbidden",
            FaultKind::ComputeFault => "compute fault",
            FaultKind::BadMediaType => "bad media type",
            FaultKind::BadMethod => "bad method",
            FaultKind::BackupOrResizeInProgress => "backup or resize in progress",
            FaultKind::ResizeNotAllowed => "resize not allowed",
            FaultKind::Other => "other",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fault returned by the service for a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// Fault category.
    pub kind: FaultKind,
    /// Human-readable message from the fault body, or a synthesized one.
    pub message: String,
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: String,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} [{}]: {}", self.status, self.kind, self.message)
    }
}

impl std::error::Error for ServiceError {}

impl ServiceError {
    /// Create a new service error.
    pub fn new(
        kind: FaultKind,
        message: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            status,
            body: body.into(),
        }
    }
}
