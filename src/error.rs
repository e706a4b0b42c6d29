use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Client-supplied field failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed timestamp or field during feature derivation
    #[error("Parse error: {0}")]
    Parse(String),

    /// No trained model and auto-fit is disabled
    #[error("Model is not trained and auto-fit is disabled")]
    NotTrained,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error.
    ///
    /// Every failure on the prediction path is reported to callers as a
    /// client error, including the ones caused by internal state.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Parse(_) => "PARSE_ERROR",
            AppError::NotTrained => "NOT_TRAINED",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Csv(_) => "CSV_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to hand back to HTTP callers
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(message) => message.clone(),
            _ => "An error occurred during prediction".to_string(),
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        let body = match &self {
            AppError::Validation(message) => {
                tracing::warn!(
                    error_code = error_code,
                    status_code = status.as_u16(),
                    message = %message,
                    "Request rejected"
                );
                json!({
                    "error": "Validation failed",
                    "message": message,
                })
            }
            other => {
                tracing::error!(
                    error_code = error_code,
                    status_code = status.as_u16(),
                    error = ?other,
                    message = %other,
                    "Request error"
                );
                json!({ "detail": other.public_message() })
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
///
/// Nested errors are flattened into `FIELD: reason` pairs joined by `; `.
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut messages = Vec::new();
        collect_validation_messages(&err, &mut messages);
        AppError::Validation(messages.join("; "))
    }
}

fn collect_validation_messages(errors: &validator::ValidationErrors, out: &mut Vec<String>) {
    use validator::ValidationErrorsKind;

    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let reason = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    out.push(format!("{}: {}", field.to_uppercase(), reason));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_validation_messages(inner, out),
            ValidationErrorsKind::List(items) => {
                for inner in items.values() {
                    collect_validation_messages(inner, out);
                }
            }
        }
    }
}

/// Conversion from chrono::ParseError
impl From<chrono::ParseError> for AppError {
    fn from(err: chrono::ParseError) -> Self {
        AppError::Parse(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
