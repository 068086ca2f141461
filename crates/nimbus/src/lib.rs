//! nimbus - Authenticated HTTP client core for cloud compute and object-storage APIs
//!
//! This library handles the plumbing every service client needs: logging in
//! against a V1 or V2 auth endpoint, keeping one persistent connection per
//! host, reconnecting on transport failures, re-authenticating when a token
//! expires, and turning error responses into typed errors. All requests flow
//! through a [`Session`].
//!
//! # Example
//!
//! ```no_run
//! use nimbus::{Credentials, RequestOptions, Session, SessionOptions};
//! use reqwest::Method;
//!
//! # async fn example() -> Result<(), nimbus::Error> {
//! let creds = Credentials::builder()
//!     .username("alice")
//!     .api_key("secret")
//!     .auth_url("https://auth.example.com/v1.0")
//!     .build()?;
//!
//! let mut session = Session::connect(creds, SessionOptions::default()).await?;
//! let response = session
//!     .request(Method::GET, "/servers/detail", RequestOptions::new())
//!     .await?;
//!
//! let servers: serde_json::Value = response.json()?;
//! println!("{}", servers);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod fault;
pub mod response;
pub mod session;
pub mod transport;
pub mod types;

// Re-export primary types at crate root for convenience
pub use auth::{AuthMethod, AuthToken, AuthVersion, Credentials, CredentialsBuilder};
pub use error::{AuthError, ConfigError, ConnectionError, Error, FaultKind, ServiceError};
pub use response::Response;
pub use reqwest::{Method, StatusCode};
pub use session::{RequestOptions, Session, SessionOptions};
pub use transport::{RequestBody, TransportOptions};
pub use types::{Endpoint, Scheme};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("nimbus/", env!("CARGO_PKG_VERSION"));

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
