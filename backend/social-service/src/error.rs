/// Error types for social-service
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Failures raised by a content store implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures raised by the upload collaborator.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Upload I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid upload: {0}")]
    Invalid(String),

    #[error("Upload not found: {0}")]
    Missing(String),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Media failure: {0}")]
    Media(#[from] MediaError),
}

impl ServiceError {
    pub fn authentication(msg: impl Into<String>) -> Self {
        ServiceError::AuthenticationRequired(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ServiceError::AuthorizationDenied(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ServiceError::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::ValidationFailed(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ServiceError::Conflict(msg.into())
    }

    /// Stable machine-readable kind for API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::AuthenticationRequired(_) => "AUTHENTICATION_REQUIRED",
            ServiceError::AuthorizationDenied(_) => "AUTHORIZATION_DENIED",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::ValidationFailed(_) => "VALIDATION_FAILED",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::Store(_) | ServiceError::Media(_) => "INTERNAL",
        }
    }

    /// Message safe to hand back to the caller. Internal failures carry no detail.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::AuthenticationRequired(msg)
            | ServiceError::AuthorizationDenied(msg)
            | ServiceError::NotFound(msg)
            | ServiceError::ValidationFailed(msg)
            | ServiceError::Conflict(msg) => msg.clone(),
            ServiceError::Store(_) | ServiceError::Media(_) => {
                "Internal server error".to_string()
            }
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, ServiceError::Store(_) | ServiceError::Media(_))
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::AuthenticationRequired(_) => StatusCode::UNAUTHORIZED,
            ServiceError::AuthorizationDenied(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Store(_) | ServiceError::Media(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_internal() {
            tracing::error!(error = ?self, "request failed with internal error");
        }

        let status = self.status_code();
        HttpResponse::build(status).json(serde_json::json!({
            "error": self.public_message(),
            "kind": self.kind(),
            "status": status.as_u16(),
        }))
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
