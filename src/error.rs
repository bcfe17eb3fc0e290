use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Error body the backend sends on non-2xx responses.
/// Some endpoints wrap it in `{ "error": {...} }`, others send a flat `{ "message": ... }`.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: Option<ErrorObject>,
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorObject {
    pub code: Option<String>,
    pub message: Option<String>,
}

impl ErrorResponse {
    /// Best-effort `(code, message)` pair out of either body shape.
    pub fn into_parts(self) -> (Option<String>, Option<String>) {
        match self.error {
            Some(obj) => (obj.code.or(self.code), obj.message.or(self.message)),
            None => (self.code, self.message),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("{1}")]
    Unauthenticated(&'static str, String),

    #[error("{field}: {message}")]
    Validation {
        code: &'static str,
        field: &'static str,
        message: String,
    },

    #[error("{1}")]
    NotPermitted(&'static str, String),

    #[error("{1}")]
    NotFound(&'static str, String),

    #[error("backend returned {status}: {message}")]
    Backend {
        status: u16,
        code: String,
        message: String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{1}")]
    ShapeMismatch(&'static str, String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn please_log_in() -> Self {
        ClientError::Unauthenticated("NOT_AUTHENTICATED", "Please log in to continue".into())
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ClientError::Validation {
            code: "VALIDATION_ERROR",
            field,
            message: message.into(),
        }
    }

    pub fn invalid_payment_url(body: &str) -> Self {
        ClientError::ShapeMismatch(
            "INVALID_PAYMENT_URL",
            format!("invalid payment URL in checkout response: {body:?}"),
        )
    }

    pub fn appointment_not_found(appointment_id: &str) -> Self {
        ClientError::NotFound(
            "APPOINTMENT_NOT_FOUND",
            format!("appointment {appointment_id} is not loaded"),
        )
    }

    /// Stable machine-readable code, for views that map errors to their own text.
    pub fn code(&self) -> &str {
        match self {
            ClientError::Unauthenticated(code, _)
            | ClientError::NotPermitted(code, _)
            | ClientError::NotFound(code, _)
            | ClientError::ShapeMismatch(code, _) => *code,
            ClientError::Validation { code, .. } => *code,
            ClientError::Backend { code, .. } => code.as_str(),
            ClientError::Network(_) => "NETWORK_ERROR",
            ClientError::Timeout(_) => "TIMEOUT",
            ClientError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// 4xx from the backend: the request itself was refused.
    pub fn is_client_rejection(&self) -> bool {
        matches!(self, ClientError::Backend { status, .. } if (400..500).contains(status))
    }

    /// Worth offering a retry button for.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(_) | ClientError::Timeout(_) => true,
            ClientError::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::ShapeMismatch("UNEXPECTED_RESPONSE", e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::ShapeMismatch("UNEXPECTED_RESPONSE", e.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
