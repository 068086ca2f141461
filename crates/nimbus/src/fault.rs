//! Translation of non-success responses into typed errors.
//!
//! Error bodies look like `{"itemNotFound": {"message": "...", "code": 404}}`:
//! a single top-level key naming the fault, wrapping an object with a
//! message. When the body does not have that shape the status code decides.

use serde_json::Value;

use crate::error::{Error, FaultKind, ServiceError};
use crate::response::Response;

const NOT_FOUND_MESSAGE: &str = "The resource could not be found";
const CONFLICT_MESSAGE: &str = "The resource is in a conflicting state";

/// The fault named by an error body.
#[derive(Debug, PartialEq, Eq)]
struct FaultInfo {
    kind: String,
    message: String,
}

/// Build the error for a non-success response.
///
/// Pure: the same response always yields an equal error.
pub fn map_response(response: &Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text();

    if response.bytes().is_empty() && status == 404 {
        return ServiceError::new(FaultKind::ItemNotFound, NOT_FOUND_MESSAGE, status, body).into();
    }

    let error = match parse_fault(response.bytes()) {
        Ok(fault) => match FaultKind::from_fault_name(&fault.kind) {
            Some(kind) => ServiceError::new(kind, fault.message, status, body),
            None => ServiceError::new(
                FaultKind::Other,
                format!("{}: unrecognized fault '{}': {}", status, fault.kind, body),
                status,
                body,
            ),
        },
        Err(reason) => match status {
            404 => ServiceError::new(FaultKind::ItemNotFound, NOT_FOUND_MESSAGE, status, body),
            409 => ServiceError::new(FaultKind::ResourceStateConflict, CONFLICT_MESSAGE, status, body),
            _ => ServiceError::new(
                FaultKind::Other,
                format!("{}: {}", status, reason),
                status,
                body,
            ),
        },
    };

    error.into()
}

fn parse_fault(body: &[u8]) -> Result<FaultInfo, String> {
    let value: Value = serde_json::from_slice(body).map_err(|e| e.to_string())?;

    let object = value
        .as_object()
        .ok_or_else(|| "fault body is not a JSON object".to_string())?;

    let mut entries = object.iter();
    let (kind, detail) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => {
            return Err(format!(
                "expected a single fault key, found {}",
                object.len()
            ));
        }
    };

    let message = detail
        .get("message")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("fault '{}' has no message", kind))?;

    Ok(FaultInfo {
        kind: kind.clone(),
        message: message.to_string(),
    })
}
