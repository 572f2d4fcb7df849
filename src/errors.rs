use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AssentError {
    #[error("Validation error: {0}")]
    #[diagnostic(code(assent::validation))]
    Validation(String),

    #[error("{0} not found")]
    #[diagnostic(code(assent::not_found))]
    NotFound(String),

    #[error("Conflict: {0}")]
    #[diagnostic(code(assent::conflict))]
    Conflict(String),

    #[error("Database error: {0}")]
    #[diagnostic(code(assent::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(assent::serde))]
    Serde(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(assent::config))]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    #[diagnostic(code(assent::io))]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    #[diagnostic(code(assent::other))]
    Other(String),
}

impl AssentError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AssentError::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AssentError::NotFound(what.into())
    }

    /// Machine-readable error code carried in the HTTP body.
    pub fn code(&self) -> &'static str {
        match self {
            AssentError::Validation(_) => "CSE-4000",
            AssentError::NotFound(_) => "CSE-4004",
            AssentError::Conflict(_) => "CSE-4009",
            AssentError::Db(_) | AssentError::Serde(_) => "CSE-5000",
            AssentError::Config(_) | AssentError::Io(_) | AssentError::Other(_) => "CSE-5001",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AssentError::Validation(_) => StatusCode::BAD_REQUEST,
            AssentError::NotFound(_) => StatusCode::NOT_FOUND,
            AssentError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            AssentError::Validation(_) => "Invalid request",
            AssentError::NotFound(_) => "Resource not found",
            AssentError::Conflict(_) => "Resource conflict",
            AssentError::Db(_) | AssentError::Serde(_) => "Database error",
            _ => "Internal server error",
        }
    }
}

impl IntoResponse for AssentError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        // Store internals stay in the log, not in the response
        let details = if status.is_server_error() {
            "An unexpected error occurred while processing the request".to_string()
        } else {
            self.to_string()
        };
        let body = json!({
            "code": self.code(),
            "message": self.message(),
            "details": details,
        });
        (status, Json(body)).into_response()
    }
}
