use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Name is required")]
    InvalidInput,

    #[error("No credential provided")]
    MissingCredential,

    #[error("Invalid credential")]
    InvalidCredential,

    #[error("You already voted!")]
    AlreadyVoted,

    #[error("Invalid option")]
    InvalidOption,

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    /// Stable machine-readable code, distinct per failure kind.
    pub const fn code(&self) -> &'static str {
        match self {
            AppError::InvalidInput => "invalid_input",
            AppError::MissingCredential | AppError::InvalidCredential => "unauthenticated",
            AppError::AlreadyVoted => "already_voted",
            AppError::InvalidOption => "invalid_option",
            AppError::InternalError(_) => "internal",
        }
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput | AppError::InvalidOption => StatusCode::BAD_REQUEST,
            AppError::MissingCredential => StatusCode::UNAUTHORIZED,
            AppError::InvalidCredential | AppError::AlreadyVoted => StatusCode::FORBIDDEN,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // never echo internal details back to the client
        let message = match &self {
            AppError::InternalError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({ "error": self.code(), "message": message }))).into_response()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to read secret {name}: {source}")]
    Secret {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
