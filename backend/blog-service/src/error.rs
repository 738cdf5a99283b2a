/// Error types for Blog Service
///
/// Every failure a handler can hit maps onto one of four outcomes: a
/// validation error (400 with the submitted form echoed back), a login
/// redirect, a not-found page, or a generic server error whose details only
/// reach the log.
use actix_web::{error::ResponseError, http::header, http::StatusCode, HttpResponse};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::media::MediaError;

/// Result type for blog-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Message shown for a blank required field
pub const REQUIRED_FIELD: &str = "This field is required.";

/// Field-level validation messages, keyed by form field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, field_errors) in errors.field_errors() {
            for err in field_errors.iter() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                out.add(&field.to_string(), message);
            }
        }
        out
    }
}

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Submitted data failed validation; `form` echoes the caller's input
    #[error("Validation error")]
    Validation {
        errors: FieldErrors,
        form: serde_json::Value,
    },

    /// Authenticated-only action reached without a session
    #[error("Login required for {next}")]
    LoginRequired { login_url: String, next: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request the form layer could not read
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Media storage failed
    #[error("Media error: {0}")]
    Media(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Validation failure on a single field without a form to echo
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            errors: FieldErrors::single(field, message),
            form: serde_json::Value::Null,
        }
    }

    /// Field errors collected while validating a form, if any
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            AppError::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Login URL with the original action carried in `next`
    pub fn login_redirect_location(login_url: &str, next: &str) -> String {
        // slashes stay readable in `next`, like any login redirect
        let next = urlencoding::encode(next).replace("%2F", "/");
        format!("{}?next={}", login_url, next)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::LoginRequired { .. } => StatusCode::FOUND,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Media(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        match self {
            AppError::Validation { errors, form } => {
                HttpResponse::build(status).json(serde_json::json!({
                    "form": form,
                    "errors": errors,
                }))
            }
            AppError::LoginRequired { login_url, next } => HttpResponse::Found()
                .insert_header((
                    header::LOCATION,
                    Self::login_redirect_location(login_url, next),
                ))
                .finish(),
            AppError::NotFound(what) => HttpResponse::build(status).json(serde_json::json!({
                "error": format!("{} not found", what),
                "status": status.as_u16(),
            })),
            AppError::BadRequest(msg) => HttpResponse::build(status).json(serde_json::json!({
                "error": msg,
                "status": status.as_u16(),
            })),
            AppError::Database(_) | AppError::Media(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "Request failed");
                HttpResponse::build(status).json(serde_json::json!({
                    "error": "Internal server error",
                    "status": status.as_u16(),
                }))
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::InvalidImage(_) => {
                AppError::invalid_field("image", crate::media::INVALID_IMAGE_MESSAGE)
            }
            other => AppError::Media(other.to_string()),
        }
    }
}
