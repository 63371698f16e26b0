use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    RateLimited,
    Storage,
    Deserialization,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Storage => "STORAGE_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network
            | Self::Timeout
            | Self::Conflict
            | Self::RateLimited
            | Self::Storage
            | Self::Internal => ErrorSeverity::Transient,

            Self::Authentication
            | Self::Authorization
            | Self::Validation
            | Self::NotFound
            | Self::Deserialization
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 => Self::NotFound,
            408 => Self::Timeout,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            500..=599 => Self::Internal,
            _ => Self::Unknown,
        }
    }
}

/// A failure that has been caught at a controller boundary and is ready to be
/// shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        self.context.get("http_status").and_then(|s| s.parse().ok())
    }

    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        self.kind == ErrorKind::Authentication && self.http_status() == Some(401)
    }

    /// Maps a failed remote call. The message is the response's `detail` field
    /// when it is a plain string, otherwise `fallback`.
    #[must_use]
    pub fn from_http(error: &crux_http::HttpError, fallback: &str) -> Self {
        match error {
            crux_http::HttpError::Http { code, body, .. } => {
                let status: u16 = (*code).into();
                let message = body
                    .as_deref()
                    .and_then(detail_from_body)
                    .unwrap_or_else(|| fallback.to_string());

                Self::new(ErrorKind::from_status(status), message)
                    .with_context("http_status", status.to_string())
            }
            crux_http::HttpError::Timeout => Self::new(ErrorKind::Timeout, fallback),
            crux_http::HttpError::Io(msg) => {
                Self::new(ErrorKind::Network, fallback).with_context("io", msg.clone())
            }
            crux_http::HttpError::Json(msg) => {
                Self::new(ErrorKind::Deserialization, fallback).with_context("json", msg.clone())
            }
            crux_http::HttpError::Url(msg) => {
                Self::new(ErrorKind::Internal, fallback).with_context("url", msg.clone())
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

fn detail_from_body(body: &[u8]) -> Option<String> {
    let response: ApiErrorResponse = serde_json::from_slice(body).ok()?;
    match response.detail? {
        serde_json::Value::String(detail) if !detail.trim().is_empty() => Some(detail),
        _ => None,
    }
}

/// Locally detected input problems. These never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Task title cannot be empty")]
    EmptyTaskTitle,
    #[error("Title cannot be empty")]
    EmptyTitle,
    #[error("Title required")]
    EmptyPlanTitle,
    #[error("Please confirm or cancel the current draft first.")]
    DraftPending,
    #[error("Email is required")]
    EmptyEmail,
    #[error("Password is required")]
    EmptyPassword,
    #[error("Confirm password is required")]
    EmptyConfirmPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least {min} characters long")]
    PasswordTooShort { min: usize },
    #[error("Password must be at most {max} characters long")]
    PasswordTooLong { max: usize },
    #[error("Please enter a question")]
    EmptyQuestion,
    #[error("Please select a valid PDF file")]
    NotAPdf,
    #[error("File size must be less than 10MB")]
    FileTooLarge { size: usize, max: usize },
    #[error("Please select a PDF file first")]
    NoFileSelected,
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::validation(e.to_string())
    }
}
