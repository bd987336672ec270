//! API error types, including RFC7807 Problem Details parsing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// RFC7807 Problem Details (application/problem+json)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type", default)]
    pub type_url: Option<String>,
    pub title: String,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Plain `{ "error": ... }` / `{ "message": ... }` bodies some endpoints return.
#[derive(Debug, Deserialize)]
struct SimpleErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Pull a user-facing message out of an error body.
/// Prefers the problem `detail`, then `title`, then `error`/`message` fields.
pub fn try_problem_detail(body: &str) -> Option<String> {
    if let Ok(parsed) = serde_json::from_str::<ProblemDetails>(body) {
        if let Some(detail) = parsed.detail.filter(|d| !d.trim().is_empty()) {
            return Some(detail);
        }
        if !parsed.title.trim().is_empty() {
            return Some(parsed.title);
        }
    }
    let simple = serde_json::from_str::<SimpleErrorBody>(body).ok()?;
    simple
        .error
        .or(simple.message)
        .filter(|m| !m.trim().is_empty())
}

/// API error type for client-side use
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("deserialization error: {0}")]
    Deserialize(String),
    #[error("not authenticated")]
    Unauthenticated,
}

impl ApiError {
    /// Message suitable for showing to an operator.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http { status, body } => try_problem_detail(body)
                .unwrap_or_else(|| format!("request failed with status {status}")),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
