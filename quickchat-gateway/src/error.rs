// ABOUTME: Typed error for non-success backend responses.
// ABOUTME: Carries the HTTP status and the backend's `detail` message.

use serde::Deserialize;
use thiserror::Error;

/// A backend answered with a non-2xx status
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{path} returned {status}: {detail}")]
pub struct BackendError {
    pub path: String,
    pub status: u16,
    /// The backend's `detail` field, or the raw body when there is none
    pub detail: String,
}

#[derive(Deserialize)]
struct DetailBody {
    detail: serde_json::Value,
}

impl BackendError {
    pub fn from_body(path: impl Into<String>, status: u16, body: &str) -> Self {
        let detail = match serde_json::from_str::<DetailBody>(body) {
            Ok(DetailBody {
                detail: serde_json::Value::String(s),
            }) => s,
            Ok(DetailBody { detail }) => detail.to_string(),
            Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
            Err(_) => body.trim().to_string(),
        };
        Self {
            path: path.into(),
            status,
            detail,
        }
    }
}
