//! Unified application error model and mapping helpers.
//! `AggregationError` is what aggregators and the orchestrator raise internally;
//! `AppError` is the protocol-facing shape rendered by the HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Failure kinds of a single authority invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    #[error("authority '{authority}' is missing required input attribute '{attribute}'")]
    MissingRequiredInput { authority: String, attribute: String },
    #[error("authority '{authority}' unavailable: {reason}")]
    BackendUnavailable { authority: String, reason: String },
    #[error("authority '{authority}' returned a malformed response: {reason}")]
    MalformedResponse { authority: String, reason: String },
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AggregationError {
    pub fn unavailable(authority: &str, reason: impl Into<String>) -> Self {
        AggregationError::BackendUnavailable { authority: authority.to_string(), reason: reason.into() }
    }
    pub fn malformed(authority: &str, reason: impl Into<String>) -> Self {
        AggregationError::MalformedResponse { authority: authority.to_string(), reason: reason.into() }
    }

    /// Backend failures degrade to an empty contribution; everything else is a caller or setup bug.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, AggregationError::BackendUnavailable { .. } | AggregationError::MalformedResponse { .. })
    }

    pub fn authority(&self) -> Option<&str> {
        match self {
            AggregationError::MissingRequiredInput { authority, .. }
            | AggregationError::BackendUnavailable { authority, .. }
            | AggregationError::MalformedResponse { authority, .. } => Some(authority.as_str()),
            AggregationError::Configuration(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    Io { code: String, message: String },
    Config { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Io { code, .. }
            | AppError::Config { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Io { message, .. }
            | AppError::Config { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn config<S: Into<String>>(code: S, msg: S) -> Self { AppError::Config { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Io { .. } => 503,
            AppError::Config { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<AggregationError> for AppError {
    fn from(err: AggregationError) -> Self {
        let message = err.to_string();
        match err {
            AggregationError::MissingRequiredInput { .. } => AppError::user("missing_required_input".to_string(), message),
            AggregationError::BackendUnavailable { .. } => AppError::io("backend_unavailable".to_string(), message),
            AggregationError::MalformedResponse { .. } => AppError::io("malformed_response".to_string(), message),
            AggregationError::Configuration(_) => AppError::config("configuration".to_string(), message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({"status": "error", "error": self}))).into_response()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
