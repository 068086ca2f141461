//! Core value types.

mod endpoint;

pub(crate) use endpoint::format_url;
pub use endpoint::{Endpoint, Scheme};
